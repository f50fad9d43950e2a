//! Shape elements: line segments and circular arcs.

use crate::point::{angle_between, angle_of, Point};

/// Kind of a shape element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    LineSegment,
    CircularArc,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::LineSegment => "LineSegment",
            ElementKind::CircularArc => "CircularArc",
        }
    }
}

/// An elementary piece of a shape boundary.
///
/// `center` and `anticlockwise` are only meaningful for circular arcs. An
/// arc whose start equals its end is a full circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeElement {
    /// Kind of element.
    pub kind: ElementKind,

    /// Start point of the element.
    pub start: Point,

    /// End point of the element.
    pub end: Point,

    /// Center of the circle, for circular arcs.
    pub center: Point,

    /// Direction of the rotation, for circular arcs.
    pub anticlockwise: bool,
}

impl ShapeElement {
    /// Build a line segment.
    pub fn line(start: Point, end: Point) -> Self {
        ShapeElement {
            kind: ElementKind::LineSegment,
            start,
            end,
            center: Point::default(),
            anticlockwise: true,
        }
    }

    /// Build a circular arc.
    pub fn arc(start: Point, end: Point, center: Point, anticlockwise: bool) -> Self {
        ShapeElement {
            kind: ElementKind::CircularArc,
            start,
            end,
            center,
            anticlockwise,
        }
    }

    /// Length of the element. An arc's length uses the signed swept angle
    /// between start and end seen from the center.
    pub fn length(&self) -> f64 {
        match self.kind {
            ElementKind::LineSegment => self.start.distance(self.end),
            ElementKind::CircularArc => {
                let r = self.center.distance(self.start);
                r * self.swept_angle()
            }
        }
    }

    /// Swept angle of an arc, in `(0, 2π]`; `2π` for a full circle.
    pub fn swept_angle(&self) -> f64 {
        if self.start == self.end {
            return 2.0 * std::f64::consts::PI;
        }
        let theta = if self.anticlockwise {
            angle_between(self.end - self.center, self.start - self.center)
        } else {
            angle_between(self.start - self.center, self.end - self.center)
        };
        theta
    }

    /// Translate by `(dx, dy)`.
    pub fn translate(&self, dx: f64, dy: f64) -> ShapeElement {
        let d = Point::new(dx, dy);
        ShapeElement {
            start: self.start + d,
            end: self.end + d,
            center: self.center + d,
            ..*self
        }
    }

    /// Rotate by `angle` radians around the origin.
    pub fn rotate(&self, angle: f64) -> ShapeElement {
        ShapeElement {
            start: self.start.rotate(angle),
            end: self.end.rotate(angle),
            center: self.center.rotate(angle),
            ..*self
        }
    }

    /// Axial symmetry about the y-axis. Mirroring reverses the boundary
    /// direction, so start and end swap and arcs flip orientation.
    pub fn axial_symmetry_y_axis(&self) -> ShapeElement {
        ShapeElement {
            start: self.end.axial_symmetry_y_axis(),
            end: self.start.axial_symmetry_y_axis(),
            center: self.center.axial_symmetry_y_axis(),
            anticlockwise: !self.anticlockwise,
            ..*self
        }
    }

    /// Replace an arc by a polyline with roughly `segments_per_circle`
    /// segments on a full circle.
    ///
    /// With `outer` set, interior vertices are pushed onto the circumscribed
    /// polygon so that the approximation contains the arc; otherwise the
    /// vertices stay on the circle and the approximation is inscribed.
    pub fn approximate_by_line_segments(
        &self,
        segments_per_circle: usize,
        outer: bool,
    ) -> Vec<ShapeElement> {
        if self.kind == ElementKind::LineSegment {
            return vec![*self];
        }
        let r = self.center.distance(self.start);
        let sweep = self.swept_angle();
        let n = ((segments_per_circle as f64 * sweep / (2.0 * std::f64::consts::PI)).ceil()
            as usize)
            .max(2);
        let a_start = angle_of(self.start - self.center);
        let signed_sweep = if self.anticlockwise { sweep } else { -sweep };
        let step = signed_sweep / n as f64;
        let r_mid = if outer {
            r / (step.abs() / 2.0).cos()
        } else {
            r
        };
        let mut points = Vec::with_capacity(n + 2);
        points.push(self.start);
        if outer {
            // Interior vertices are the intersections of consecutive tangent
            // lines: half-step offsets on the circumscribed radius.
            for i in 1..=n {
                let a = a_start + (i as f64 - 0.5) * step;
                points.push(Point::new(
                    self.center.x + r_mid * a.cos(),
                    self.center.y + r_mid * a.sin(),
                ));
            }
        } else {
            for i in 1..n {
                let a = a_start + i as f64 * step;
                points.push(Point::new(
                    self.center.x + r * a.cos(),
                    self.center.y + r * a.sin(),
                ));
            }
        }
        points.push(self.end);
        points
            .windows(2)
            .map(|w| ShapeElement::line(w[0], w[1]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eps::equal;
    use std::f64::consts::PI;

    #[test]
    fn full_circle_length() {
        let e = ShapeElement::arc(
            Point::new(1.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 0.0),
            true,
        );
        assert!(equal(e.length(), 2.0 * PI));
    }

    #[test]
    fn quarter_arc_length() {
        let e = ShapeElement::arc(
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(0.0, 0.0),
            true,
        );
        assert!(equal(e.length(), PI / 2.0));
    }

    #[test]
    fn segment_approximation_endpoints() {
        let e = ShapeElement::arc(
            Point::new(2.0, 0.0),
            Point::new(0.0, 2.0),
            Point::new(0.0, 0.0),
            true,
        );
        for outer in [false, true] {
            let segments = e.approximate_by_line_segments(16, outer);
            assert!(segments.len() >= 2);
            assert_eq!(segments.first().unwrap().start, e.start);
            assert_eq!(segments.last().unwrap().end, e.end);
        }
    }
}
