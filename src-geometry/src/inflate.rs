//! Inflation and deflation by a disc.
//!
//! Growing a shape by radius `r` is a Minkowski sum with a disc: edges move
//! outward along their normal, convex corners are joined by arcs (emitted as
//! circumscribed polylines so the result stays conservative), reflex corners
//! by the intersection of the two shifted edges. Deflation is the inward
//! analogue; a hole that collapses is reported as such so that callers can
//! discard it.

use crate::clean::clean_shape;
use crate::element::ShapeElement;
use crate::eps::{equal, strictly_greater};
use crate::point::Point;
use crate::shape::Shape;
use crate::GeometryError;

/// Number of segments used for a full circle when corners are rounded.
const SEGMENTS_PER_CIRCLE: usize = 100;

/// Offset a shape by `r`: positive grows, negative shrinks.
///
/// Circles stay circles. Polygons (and general shapes, whose arcs are
/// approximated by line segments first) get their edges shifted by `r` along
/// the outward normal.
pub fn offset_shape(shape: &Shape, r: f64) -> Result<Shape, GeometryError> {
    if equal(r, 0.0) {
        return Ok(shape.clone());
    }
    if shape.is_circle() {
        let element = &shape.elements[0];
        let radius = element.center.distance(element.start) + r;
        if !strictly_greater(radius, 0.0) {
            return Err(GeometryError::OffsetCollapse(r));
        }
        return Ok(Shape::circle(radius).translate(element.center.x, element.center.y));
    }

    let polygon = if shape.is_polygon() {
        shape.clone()
    } else {
        shape.approximate_by_line_segments(SEGMENTS_PER_CIRCLE, r > 0.0)
    };
    offset_polygon(&polygon, r)
}

fn offset_polygon(polygon: &Shape, r: f64) -> Result<Shape, GeometryError> {
    let n = polygon.elements.len();
    if n < 3 {
        return Err(GeometryError::DegenerateShape(n));
    }

    // Each edge, shifted along its outward normal. For a counter-clockwise
    // boundary the interior is to the left, so the outward normal of
    // direction (dx, dy) is (dy, -dx).
    let mut shifted: Vec<(Point, Point)> = Vec::with_capacity(n);
    for element in &polygon.elements {
        let d = element.end - element.start;
        let len = d.norm();
        if equal(len, 0.0) {
            continue;
        }
        let normal = Point::new(d.y / len, -d.x / len);
        let offset = Point::new(normal.x * r, normal.y * r);
        shifted.push((element.start + offset, element.end + offset));
    }
    let n = shifted.len();
    if n < 3 {
        return Err(GeometryError::DegenerateShape(n));
    }

    let mut vertices: Vec<Point> = Vec::with_capacity(n + 8);
    for pos in 0..n {
        let (a_start, a_end) = shifted[pos];
        let (b_start, b_end) = shifted[(pos + 1) % n];
        let corner = polygon.elements[(pos + 1) % n].start;
        let d_a = a_end - a_start;
        let d_b = b_end - b_start;
        let turn = d_a.cross(d_b);
        vertices.push(a_end);
        if (turn > 0.0) == (r > 0.0) && !equal(turn, 0.0) {
            // The shifted edges leave a gap around the corner: bridge it
            // with an arc around the original vertex.
            let arc = ShapeElement::arc(a_end, b_start, corner, r > 0.0);
            for segment in arc.approximate_by_line_segments(SEGMENTS_PER_CIRCLE, r > 0.0) {
                vertices.push(segment.end);
            }
        } else if !equal(turn, 0.0) {
            // The shifted edges overlap: replace both endpoints by their
            // intersection (miter join).
            if let Some(p) = line_intersection(a_start, a_end, b_start, b_end) {
                vertices.pop();
                vertices.push(p);
            }
        }
    }
    // The vertex list ends where the next edge starts; close the loop.
    let vertex_pairs: Vec<(f64, f64)> = vertices.iter().map(|p| (p.x, p.y)).collect();
    let offset = clean_shape(&Shape::polygon(&vertex_pairs));
    if offset.elements.len() < 3 || !strictly_greater(offset.compute_area(), 0.0) {
        return Err(GeometryError::OffsetCollapse(r));
    }
    Ok(offset)
}

/// Intersection of the (infinite) lines through two segments.
fn line_intersection(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<Point> {
    let d_a = a2 - a1;
    let d_b = b2 - b1;
    let denom = d_a.cross(d_b);
    if equal(denom, 0.0) {
        return None;
    }
    let t = (b1 - a1).cross(d_b) / denom;
    Some(Point::new(a1.x + t * d_a.x, a1.y + t * d_a.y))
}

/// Deflate a hole by `r`; `None` when the hole collapses.
///
/// Holes are provided clockwise. Shrinking the hole means growing the
/// material around it, so the hole is offset as a counter-clockwise polygon
/// by `-r` and flipped back.
pub fn deflate_hole(hole: &Shape, r: f64) -> Option<Shape> {
    if equal(r, 0.0) {
        return Some(hole.clone());
    }
    let ccw = hole.reverse();
    match offset_shape(&ccw, -r) {
        Ok(shape) => Some(shape.reverse()),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_inflation_area() {
        let square = Shape::rectangle(2.0, 2.0);
        let inflated = offset_shape(&square, 0.5).unwrap();
        // 2x2 square grown by 0.5: core 4, four 2x0.5 flaps, four quarter
        // circles approximated from outside.
        let expected = 4.0 + 4.0 * 1.0 + std::f64::consts::PI * 0.25;
        let area = inflated.compute_area();
        assert!(area >= expected - 1e-3, "{area} vs {expected}");
        assert!(area <= expected + 0.05, "{area} vs {expected}");
    }

    #[test]
    fn square_deflation() {
        let square = Shape::rectangle(4.0, 4.0);
        let deflated = offset_shape(&square, -1.0).unwrap();
        assert!(equal(deflated.compute_area(), 4.0));
    }

    #[test]
    fn deflation_collapse() {
        let square = Shape::rectangle(2.0, 2.0);
        assert!(offset_shape(&square, -1.5).is_err());
    }

    #[test]
    fn circle_inflation() {
        let circle = Shape::circle(1.0);
        let inflated = offset_shape(&circle, 1.0).unwrap();
        assert!(inflated.is_circle());
        assert!((inflated.compute_area() - 4.0 * std::f64::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn hole_deflation_collapses_small_holes() {
        let hole = Shape::rectangle(1.0, 1.0).reverse();
        assert!(deflate_hole(&hole, 0.6).is_none());
        assert!(deflate_hole(&hole, 0.2).is_some());
    }
}
