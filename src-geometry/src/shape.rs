//! Closed shapes: areas, bounding boxes, transformations, classification.

use crate::element::{ElementKind, ShapeElement};
use crate::eps::{equal, strictly_greater, EPSILON};
use crate::point::{angle_between, angle_of, Point};
use crate::GeometryError;

/// A connected shape, provided in counter-clockwise direction.
///
/// The end point of an element must be the start point of the next element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    /// List of elements.
    pub elements: Vec<ShapeElement>,
}

/// A shape together with the holes it contains (holes are clockwise).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeWithHoles {
    pub shape: Shape,
    pub holes: Vec<Shape>,
}

/// Classification of a shape or of a whole item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    Circle,
    Square,
    Rectangle,
    Polygon,
    MultiPolygon,
    PolygonWithHoles,
    MultiPolygonWithHoles,
    GeneralShape,
}

impl ShapeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeType::Circle => "C",
            ShapeType::Square => "S",
            ShapeType::Rectangle => "R",
            ShapeType::Polygon => "P",
            ShapeType::MultiPolygon => "MP",
            ShapeType::PolygonWithHoles => "PH",
            ShapeType::MultiPolygonWithHoles => "MPH",
            ShapeType::GeneralShape => "G",
        }
    }
}

impl Shape {
    /// Build a polygon shape from its vertices (counter-clockwise).
    pub fn polygon(vertices: &[(f64, f64)]) -> Shape {
        let mut elements = Vec::with_capacity(vertices.len());
        for (pos, &(x, y)) in vertices.iter().enumerate() {
            let &(x_next, y_next) = &vertices[(pos + 1) % vertices.len()];
            elements.push(ShapeElement::line(
                Point::new(x, y),
                Point::new(x_next, y_next),
            ));
        }
        Shape { elements }
    }

    /// Build an axis-aligned rectangle with its bottom-left corner at the
    /// origin.
    pub fn rectangle(width: f64, height: f64) -> Shape {
        Shape::polygon(&[(0.0, 0.0), (width, 0.0), (width, height), (0.0, height)])
    }

    /// Build a circle of the given radius centered at the origin.
    pub fn circle(radius: f64) -> Shape {
        let start = Point::new(radius, 0.0);
        Shape {
            elements: vec![ShapeElement::arc(start, start, Point::default(), true)],
        }
    }

    /// Return true iff the shape is a circle.
    pub fn is_circle(&self) -> bool {
        self.elements.len() == 1 && self.elements[0].kind == ElementKind::CircularArc
    }

    /// Return true iff the shape is a square.
    pub fn is_square(&self) -> bool {
        if !self.is_rectangle() {
            return false;
        }
        equal(self.elements[0].length(), self.elements[1].length())
    }

    /// Return true iff the shape is a rectangle.
    pub fn is_rectangle(&self) -> bool {
        if self.elements.len() != 4 {
            return false;
        }
        let mut prev = &self.elements[3];
        for element in &self.elements {
            if element.kind != ElementKind::LineSegment {
                return false;
            }
            let theta = angle_between(prev.start - prev.end, element.end - element.start);
            if !equal(theta, std::f64::consts::FRAC_PI_2) {
                return false;
            }
            prev = element;
        }
        equal(self.elements[0].length(), self.elements[2].length())
            && equal(self.elements[1].length(), self.elements[3].length())
    }

    /// Return true iff the shape is a polygon.
    pub fn is_polygon(&self) -> bool {
        self.elements
            .iter()
            .all(|element| element.kind == ElementKind::LineSegment)
    }

    /// Compute the area of the shape (shoelace plus arc-sector corrections).
    pub fn compute_area(&self) -> f64 {
        let mut area = 0.0;
        for element in &self.elements {
            area += element.start.cross(element.end);
            if element.kind == ElementKind::CircularArc {
                let radius = element.center.distance(element.start);
                // The chord already closes the shoelace; the remaining
                // circular segment is the sector minus the center triangle.
                let theta = element.swept_angle();
                let segment = radius * radius * (theta - theta.sin());
                if element.anticlockwise {
                    area += segment;
                } else {
                    area -= segment;
                }
            }
        }
        area / 2.0
    }

    /// Compute the bounding box of the shape rotated by `angle` (radians),
    /// optionally mirrored about the y-axis first.
    pub fn compute_min_max(&self, angle: f64, mirror: bool) -> (Point, Point) {
        let mut x_min = f64::INFINITY;
        let mut x_max = f64::NEG_INFINITY;
        let mut y_min = f64::INFINITY;
        let mut y_max = f64::NEG_INFINITY;
        let transform = |p: Point| -> Point {
            let p = if mirror { p.axial_symmetry_y_axis() } else { p };
            p.rotate(angle)
        };
        for element in &self.elements {
            let start = transform(element.start);
            x_min = x_min.min(start.x);
            x_max = x_max.max(start.x);
            y_min = y_min.min(start.y);
            y_max = y_max.max(start.y);

            if element.kind == ElementKind::CircularArc {
                let center = transform(element.center);
                let radius = element.center.distance(element.start);
                let end = transform(element.end);
                let anticlockwise = element.anticlockwise != mirror;
                let mut a_start = angle_of(start - center);
                let mut a_end = angle_of(end - center);
                if !anticlockwise {
                    std::mem::swap(&mut a_start, &mut a_end);
                }
                if element.start == element.end {
                    a_start = 0.0;
                    a_end = 2.0 * std::f64::consts::PI;
                }
                // Cardinal directions swept by the arc give the extreme
                // points beyond the endpoints.
                let sweeps = |cardinal: f64| -> bool {
                    if a_start <= a_end {
                        a_start <= cardinal && cardinal <= a_end
                    } else {
                        cardinal >= a_start || cardinal <= a_end
                    }
                };
                if sweeps(0.0) || sweeps(2.0 * std::f64::consts::PI) {
                    x_max = x_max.max(center.x + radius);
                }
                if sweeps(std::f64::consts::FRAC_PI_2) {
                    y_max = y_max.max(center.y + radius);
                }
                if sweeps(std::f64::consts::PI) {
                    x_min = x_min.min(center.x - radius);
                }
                if sweeps(3.0 * std::f64::consts::FRAC_PI_2) {
                    y_min = y_min.min(center.y - radius);
                }
                x_min = x_min.min(end.x);
                x_max = x_max.max(end.x);
                y_min = y_min.min(end.y);
                y_max = y_max.max(end.y);
            }
        }
        (Point::new(x_min, y_min), Point::new(x_max, y_max))
    }

    /// Translate by `(dx, dy)`.
    pub fn translate(&self, dx: f64, dy: f64) -> Shape {
        Shape {
            elements: self
                .elements
                .iter()
                .map(|element| element.translate(dx, dy))
                .collect(),
        }
    }

    /// Rotate by `angle` radians around the origin.
    pub fn rotate(&self, angle: f64) -> Shape {
        Shape {
            elements: self
                .elements
                .iter()
                .map(|element| element.rotate(angle))
                .collect(),
        }
    }

    /// Axial symmetry about the y-axis; the element order is reversed to
    /// keep the boundary counter-clockwise.
    pub fn axial_symmetry_y_axis(&self) -> Shape {
        Shape {
            elements: self
                .elements
                .iter()
                .rev()
                .map(|element| element.axial_symmetry_y_axis())
                .collect(),
        }
    }

    /// Reverse the boundary direction.
    pub fn reverse(&self) -> Shape {
        Shape {
            elements: self
                .elements
                .iter()
                .rev()
                .map(|element| ShapeElement {
                    start: element.end,
                    end: element.start,
                    anticlockwise: !element.anticlockwise,
                    ..*element
                })
                .collect(),
        }
    }

    /// Replace every arc by a polyline.
    pub fn approximate_by_line_segments(&self, segments_per_circle: usize, outer: bool) -> Shape {
        Shape {
            elements: self
                .elements
                .iter()
                .flat_map(|element| element.approximate_by_line_segments(segments_per_circle, outer))
                .collect(),
        }
    }

    /// Check that the shape is closed, counter-clockwise and simple.
    ///
    /// Simplicity is tested on the line segments of the boundary: two
    /// non-adjacent segments must not cross (arcs are not tested against
    /// each other; the search operates on line-segment approximations).
    pub fn check(&self) -> Result<(), GeometryError> {
        if self.elements.len() < 3 && !self.is_circle() {
            return Err(GeometryError::DegenerateShape(self.elements.len()));
        }
        let n = self.elements.len();
        for pos in 0..n {
            let pos_next = (pos + 1) % n;
            if self.elements[pos].end != self.elements[pos_next].start {
                return Err(GeometryError::NotClosed(pos, pos_next));
            }
        }
        let area = self.compute_area();
        if !strictly_greater(area, 0.0) {
            return Err(GeometryError::NotCounterClockwise(area));
        }
        for pos_1 in 0..n {
            if self.elements[pos_1].kind != ElementKind::LineSegment {
                continue;
            }
            for pos_2 in (pos_1 + 2)..n {
                // Adjacent segments share an endpoint by construction.
                if pos_1 == 0 && pos_2 == n - 1 {
                    continue;
                }
                if self.elements[pos_2].kind != ElementKind::LineSegment {
                    continue;
                }
                if segments_intersect(
                    self.elements[pos_1].start,
                    self.elements[pos_1].end,
                    self.elements[pos_2].start,
                    self.elements[pos_2].end,
                ) {
                    return Err(GeometryError::SelfIntersecting(pos_1, pos_2));
                }
            }
        }
        Ok(())
    }
}

/// True when two segments cross, or are collinear and overlap with
/// positive length. A shared endpoint alone does not count.
fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let d1 = (a2 - a1).cross(b1 - a1);
    let d2 = (a2 - a1).cross(b2 - a1);
    let d3 = (b2 - b1).cross(a1 - b1);
    let d4 = (b2 - b1).cross(a2 - b1);

    let opposite = |u: f64, v: f64| {
        (u > EPSILON && v < -EPSILON)
            || (u < -EPSILON && v > EPSILON)
    };
    if opposite(d1, d2) && opposite(d3, d4) {
        return true;
    }

    // Collinear segments overlapping with positive length.
    if d1.abs() <= EPSILON && d2.abs() <= EPSILON {
        let overlap = |lo_1: f64, hi_1: f64, lo_2: f64, hi_2: f64| {
            hi_1.min(hi_2) - lo_1.max(lo_2) > EPSILON
        };
        let along_x = (a2.x - a1.x).abs() >= (a2.y - a1.y).abs();
        if along_x {
            return overlap(
                a1.x.min(a2.x),
                a1.x.max(a2.x),
                b1.x.min(b2.x),
                b1.x.max(b2.x),
            );
        }
        return overlap(
            a1.y.min(a2.y),
            a1.y.max(a2.y),
            b1.y.min(b2.y),
            b1.y.max(b2.y),
        );
    }
    false
}

impl ShapeWithHoles {
    /// Net area: shape area minus hole areas.
    pub fn compute_area(&self) -> f64 {
        let mut area = self.shape.compute_area();
        for hole in &self.holes {
            area -= hole.compute_area().abs();
        }
        area
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn classification() {
        assert!(Shape::circle(2.0).is_circle());
        assert!(Shape::rectangle(2.0, 2.0).is_square());
        assert!(Shape::rectangle(3.0, 2.0).is_rectangle());
        assert!(!Shape::rectangle(3.0, 2.0).is_square());
        assert!(Shape::polygon(&[(0.0, 0.0), (3.0, 0.0), (1.0, 3.0)]).is_polygon());
    }

    #[test]
    fn polygon_area() {
        let triangle = Shape::polygon(&[(0.0, 0.0), (3.0, 0.0), (1.0, 3.0)]);
        assert!(equal(triangle.compute_area(), 4.5));
        let square = Shape::rectangle(2.0, 2.0);
        assert!(equal(square.compute_area(), 4.0));
    }

    #[test]
    fn circle_area() {
        let circle = Shape::circle(2.0);
        assert!((circle.compute_area() - 4.0 * PI).abs() < 1e-6);
    }

    #[test]
    fn rotated_bounding_box() {
        let square = Shape::rectangle(2.0, 2.0);
        let (mn, mx) = square.compute_min_max(PI / 4.0, false);
        let sqrt2 = 2.0_f64.sqrt();
        assert!((mx.x - mn.x - 2.0 * sqrt2).abs() < 1e-9);
        assert!((mx.y - mn.y - 2.0 * sqrt2).abs() < 1e-9);
    }

    #[test]
    fn rotate_round_trip() {
        let shape = Shape::polygon(&[(0.0, 0.0), (3.0, 0.0), (1.0, 3.0)]);
        let back = shape.rotate(0.7).rotate(-0.7);
        assert_eq!(shape, back);
    }

    #[test]
    fn reverse_flips_orientation() {
        let shape = Shape::polygon(&[(0.0, 0.0), (3.0, 0.0), (1.0, 3.0)]);
        assert!(equal(shape.reverse().compute_area(), -4.5));
    }

    #[test]
    fn self_intersection_is_detected() {
        // A bowtie with positive signed area: the closure and orientation
        // checks pass, only the crossing of elements 1 and 3 fails.
        let bowtie = Shape::polygon(&[(0.0, 0.0), (4.0, 0.0), (1.0, 2.0), (3.0, 2.0)]);
        assert!(matches!(
            bowtie.check(),
            Err(GeometryError::SelfIntersecting(1, 3))
        ));

        let simple = Shape::polygon(&[(0.0, 0.0), (4.0, 0.0), (4.0, 2.0), (2.0, 1.0), (0.0, 2.0)]);
        assert!(simple.check().is_ok());
    }

    #[test]
    fn collinear_overlapping_edges_are_detected() {
        // A spike folded back onto the bottom edge.
        let shape = Shape::polygon(&[
            (0.0, 0.0),
            (4.0, 0.0),
            (4.0, 2.0),
            (3.0, 2.0),
            (3.0, 0.0),
            (1.0, 0.0),
            (1.0, 2.0),
            (0.0, 2.0),
        ]);
        assert!(matches!(
            shape.check(),
            Err(GeometryError::SelfIntersecting(..))
        ));
    }
}
