//! SVG path emission.
//!
//! The y-axis is flipped (SVG grows downward) and a caller-chosen factor
//! scales coordinates into a comfortable pixel range.

use crate::element::ElementKind;
use crate::shape::Shape;

/// Path data for a shape boundary (`M … Z`), holes appended as sub-paths so
/// that the default even-odd fill leaves them empty.
pub fn shape_to_path_data(shape: &Shape, holes: &[Shape], factor: f64) -> String {
    let mut d = String::new();
    boundary_to_path_data(shape, factor, &mut d);
    for hole in holes {
        boundary_to_path_data(hole, factor, &mut d);
    }
    d
}

fn boundary_to_path_data(shape: &Shape, factor: f64, d: &mut String) {
    for (pos, element) in shape.elements.iter().enumerate() {
        if pos == 0 {
            d.push_str(&format!(
                "M{},{}",
                element.start.x * factor,
                -element.start.y * factor
            ));
        }
        match element.kind {
            ElementKind::LineSegment => {
                d.push_str(&format!(
                    "L{},{}",
                    element.end.x * factor,
                    -element.end.y * factor
                ));
            }
            ElementKind::CircularArc => {
                let radius = element.center.distance(element.start) * factor;
                if element.start == element.end {
                    // A full circle needs two arc commands.
                    let opposite_x = (2.0 * element.center.x - element.start.x) * factor;
                    let opposite_y = -(2.0 * element.center.y - element.start.y) * factor;
                    let sweep = if element.anticlockwise { 0 } else { 1 };
                    d.push_str(&format!(
                        "A{radius},{radius} 0 1 {sweep} {opposite_x},{opposite_y}"
                    ));
                    d.push_str(&format!(
                        "A{radius},{radius} 0 1 {sweep} {},{}",
                        element.start.x * factor,
                        -element.start.y * factor
                    ));
                } else {
                    let large = if element.swept_angle() > std::f64::consts::PI {
                        1
                    } else {
                        0
                    };
                    // SVG sweep flag 1 is clockwise in flipped-y coordinates.
                    let sweep = if element.anticlockwise { 0 } else { 1 };
                    d.push_str(&format!(
                        "A{radius},{radius} 0 {large} {sweep} {},{}",
                        element.end.x * factor,
                        -element.end.y * factor
                    ));
                }
            }
        }
    }
    d.push('Z');
}

/// A filled `<path>` element for a shape with holes.
pub fn shape_to_svg(shape: &Shape, holes: &[Shape], factor: f64, color: &str) -> String {
    format!(
        "<path d=\"{}\" fill=\"{}\" stroke=\"black\" stroke-width=\"0.5\" fill-rule=\"evenodd\"/>\n",
        shape_to_path_data(shape, holes, factor),
        color
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_path() {
        let d = shape_to_path_data(&Shape::rectangle(2.0, 1.0), &[], 1.0);
        assert!(d.starts_with("M0,"));
        assert!(d.ends_with('Z'));
        assert_eq!(d.matches('L').count(), 4);
    }

    #[test]
    fn hole_becomes_subpath() {
        let outer = Shape::rectangle(4.0, 4.0);
        let hole = Shape::rectangle(1.0, 1.0).translate(1.0, 1.0).reverse();
        let d = shape_to_path_data(&outer, &[hole], 1.0);
        assert_eq!(d.matches('M').count(), 2);
        assert_eq!(d.matches('Z').count(), 2);
    }
}
