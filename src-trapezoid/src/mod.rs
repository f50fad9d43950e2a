//! Generalized trapezoids.
//!
//! A generalized trapezoid has its two parallel sides parallel to the
//! x-axis; the left and right sides are arbitrary, possibly vertical. All
//! operations are pure and return new values.

use shapepack_geometry::eps::{equal, strictly_greater, strictly_lesser};
use shapepack_geometry::point::Point;

/// Polygon trapezoidation (sweep over classified vertices)
pub mod trapezoidation;

pub use trapezoidation::{polygon_trapezoidation, TrapezoidationError};

/// A quadrilateral with horizontal top and bottom sides.
#[derive(Debug, Clone, Copy)]
pub struct GeneralizedTrapezoid {
    /// y-coordinate of the bottom side.
    yb: f64,
    /// y-coordinate of the top side.
    yt: f64,
    /// x-coordinate of the bottom-left corner.
    xbl: f64,
    /// x-coordinate of the bottom-right corner.
    xbr: f64,
    /// x-coordinate of the top-left corner.
    xtl: f64,
    /// x-coordinate of the top-right corner.
    xtr: f64,

    height: f64,
    width_bottom: f64,
    width_top: f64,
    x_min: f64,
    x_max: f64,
    area: f64,
    /// Left slope dx/dy.
    a_left: f64,
    /// Right slope dx/dy.
    a_right: f64,
    left_side_increasing_not_vertical: bool,
    left_side_decreasing_not_vertical: bool,
    right_side_increasing_not_vertical: bool,
    right_side_decreasing_not_vertical: bool,
}

impl GeneralizedTrapezoid {
    /// Build a trapezoid from its two y-coordinates and four x-coordinates.
    ///
    /// Requires `yb < yt`, `xbl <= xbr` and `xtl <= xtr` (up to epsilon);
    /// violating them is a programming error.
    pub fn new(yb: f64, yt: f64, xbl: f64, xbr: f64, xtl: f64, xtr: f64) -> Self {
        assert!(
            yb < yt,
            "GeneralizedTrapezoid::new: yb {yb} must be lesser than yt {yt}"
        );
        assert!(
            !strictly_greater(xbl, xbr),
            "GeneralizedTrapezoid::new: xbl {xbl} must not exceed xbr {xbr}"
        );
        assert!(
            !strictly_greater(xtl, xtr),
            "GeneralizedTrapezoid::new: xtl {xtl} must not exceed xtr {xtr}"
        );

        let height = yt - yb;
        let width_top = xtr - xtl;
        let width_bottom = xbr - xbl;
        let a_left = (xtl - xbl) / height;
        let a_right = (xtr - xbr) / height;
        GeneralizedTrapezoid {
            yb,
            yt,
            xbl,
            xbr,
            xtl,
            xtr,
            height,
            width_bottom,
            width_top,
            x_min: xbl.min(xtl),
            x_max: xbr.max(xtr),
            area: (width_top + width_bottom) * height / 2.0,
            a_left,
            a_right,
            left_side_increasing_not_vertical: a_left > 0.0,
            left_side_decreasing_not_vertical: a_left < 0.0,
            right_side_increasing_not_vertical: a_right > 0.0,
            right_side_decreasing_not_vertical: a_right < 0.0,
        }
    }

    pub fn y_bottom(&self) -> f64 {
        self.yb
    }
    pub fn y_top(&self) -> f64 {
        self.yt
    }
    pub fn x_bottom_left(&self) -> f64 {
        self.xbl
    }
    pub fn x_bottom_right(&self) -> f64 {
        self.xbr
    }
    pub fn x_top_left(&self) -> f64 {
        self.xtl
    }
    pub fn x_top_right(&self) -> f64 {
        self.xtr
    }
    pub fn height(&self) -> f64 {
        self.height
    }
    pub fn width_bottom(&self) -> f64 {
        self.width_bottom
    }
    pub fn width_top(&self) -> f64 {
        self.width_top
    }
    pub fn x_min(&self) -> f64 {
        self.x_min
    }
    pub fn x_max(&self) -> f64 {
        self.x_max
    }
    pub fn area(&self) -> f64 {
        self.area
    }
    pub fn a_left(&self) -> f64 {
        self.a_left
    }
    pub fn a_right(&self) -> f64 {
        self.a_right
    }
    pub fn left_side_increasing_not_vertical(&self) -> bool {
        self.left_side_increasing_not_vertical
    }
    pub fn left_side_decreasing_not_vertical(&self) -> bool {
        self.left_side_decreasing_not_vertical
    }
    pub fn right_side_increasing_not_vertical(&self) -> bool {
        self.right_side_increasing_not_vertical
    }
    pub fn right_side_decreasing_not_vertical(&self) -> bool {
        self.right_side_decreasing_not_vertical
    }

    /// x-coordinate of the left side at height `y`.
    pub fn x_left(&self, y: f64) -> f64 {
        if equal(y, self.yb) {
            return self.xbl;
        }
        if equal(y, self.yt) {
            return self.xtl;
        }
        if equal(self.xbl, self.xtl) {
            return self.xbl;
        }
        self.xbl + (y - self.yb) * self.a_left
    }

    /// x-coordinate of the right side at height `y`.
    pub fn x_right(&self, y: f64) -> f64 {
        if equal(y, self.yb) {
            return self.xbr;
        }
        if equal(y, self.yt) {
            return self.xtr;
        }
        if equal(self.xbr, self.xtr) {
            return self.xbr;
        }
        self.xbr + (y - self.yb) * self.a_right
    }

    /// Translate horizontally.
    pub fn translate_x(&self, dx: f64) -> Self {
        GeneralizedTrapezoid {
            xbl: self.xbl + dx,
            xbr: self.xbr + dx,
            xtl: self.xtl + dx,
            xtr: self.xtr + dx,
            x_min: self.x_min + dx,
            x_max: self.x_max + dx,
            ..*self
        }
    }

    /// Translate vertically.
    pub fn translate_y(&self, dy: f64) -> Self {
        GeneralizedTrapezoid {
            yb: self.yb + dy,
            yt: self.yt + dy,
            ..*self
        }
    }

    /// Translate by `(dx, dy)`.
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        self.translate_x(dx).translate_y(dy)
    }

    /// Move the whole left side to `x` (used to close skyline pieces
    /// against the bin side).
    pub fn extend_left(&self, x: f64) -> Self {
        GeneralizedTrapezoid::new(self.yb, self.yt, x, self.xbr, x, self.xtr)
    }

    /// Clip to the vertical band `[yb, yt]`, interpolating the sides.
    pub fn clip_y(&self, yb: f64, yt: f64) -> Self {
        let yb = yb.max(self.yb);
        let yt = yt.min(self.yt);
        GeneralizedTrapezoid::new(
            yb,
            yt,
            self.x_left(yb),
            self.x_right(yb),
            self.x_left(yt),
            self.x_right(yt),
        )
    }

    /// Check whether this trapezoid intersects another with positive area.
    pub fn intersects(&self, other: &GeneralizedTrapezoid) -> bool {
        if !strictly_lesser(self.yb, other.yt) {
            return false;
        }
        if !strictly_greater(self.yt, other.yb) {
            return false;
        }

        let yb = self.yb.max(other.yb);
        let yt = self.yt.min(other.yt);

        let x1br = self.x_right(yb);
        let x1tr = self.x_right(yt);
        let x2bl = other.x_left(yb);
        let x2tl = other.x_left(yt);
        if !strictly_greater(x1br, x2bl) && !strictly_greater(x1tr, x2tl) {
            return false;
        }

        let x1bl = self.x_left(yb);
        let x1tl = self.x_left(yt);
        let x2br = other.x_right(yb);
        let x2tr = other.x_right(yt);
        if !strictly_lesser(x1bl, x2br) && !strictly_lesser(x1tl, x2tr) {
            return false;
        }

        true
    }

    /// Minimum shift to the right for this trapezoid to clear the other
    /// (its left side ends up against the other's right side).
    pub fn compute_right_shift(&self, other: &GeneralizedTrapezoid) -> f64 {
        if !strictly_lesser(self.yb, other.yt) {
            return 0.0;
        }
        if !strictly_greater(self.yt, other.yb) {
            return 0.0;
        }

        let yb = self.yb.max(other.yb);
        let yt = self.yt.min(other.yt);

        let x1bl = self.x_left(yb);
        let x1tl = self.x_left(yt);
        let x2br = other.x_right(yb);
        let x2tr = other.x_right(yt);
        if !strictly_lesser(x1bl, x2br) && !strictly_lesser(x1tl, x2tr) {
            return 0.0;
        }

        (x2br - x1bl).max(x2tr - x1tl)
    }

    /// Same as [`Self::compute_right_shift`] but returns 0 when the two
    /// trapezoids do not currently intersect (cheap dominance check).
    pub fn compute_right_shift_if_intersects(&self, other: &GeneralizedTrapezoid) -> f64 {
        if !strictly_lesser(self.yb, other.yt) {
            return 0.0;
        }
        if !strictly_greater(self.yt, other.yb) {
            return 0.0;
        }

        let yb = self.yb.max(other.yb);
        let yt = self.yt.min(other.yt);

        let x1br = self.x_right(yb);
        let x1tr = self.x_right(yt);
        let x2bl = other.x_left(yb);
        let x2tl = other.x_left(yt);
        if !strictly_greater(x1br, x2bl) && !strictly_greater(x1tr, x2tl) {
            return 0.0;
        }

        let x1bl = self.x_left(yb);
        let x1tl = self.x_left(yt);
        let x2br = other.x_right(yb);
        let x2tr = other.x_right(yt);
        if !strictly_lesser(x1bl, x2br) && !strictly_lesser(x1tl, x2tr) {
            return 0.0;
        }

        (x2br - x1bl).max(x2tr - x1tl)
    }

    /// Minimum shift `d` along a line of slope `a` (displacement
    /// `(d, a * d)`) for this trapezoid to stop overlapping the other.
    ///
    /// Used when a trapezoid slides along a sloped supporting edge: the
    /// candidates are the intersections of the line of slope `a` through
    /// each corner of one trapezoid with each side of the other.
    pub fn compute_top_right_shift(&self, other: &GeneralizedTrapezoid, a: f64) -> f64 {
        let mut x_shift: f64 = 0.0;

        let corners_self = [
            Point::new(self.xbl, self.yb),
            Point::new(self.xbr, self.yb),
            Point::new(self.xtl, self.yt),
            Point::new(self.xtr, self.yt),
        ];
        for p in corners_self {
            let b = p.y - p.x * a;

            // Bottom side of the other trapezoid.
            {
                let x = (other.yb - b) / a;
                if strictly_greater(x, p.x)
                    && !strictly_lesser(x, other.xbl)
                    && !strictly_greater(x, other.xbr)
                {
                    x_shift = x_shift.max(x - p.x);
                }
            }

            // Top side of the other trapezoid.
            {
                let x = (other.yt - b) / a;
                if strictly_greater(x, p.x)
                    && !strictly_lesser(x, other.xtl)
                    && !strictly_greater(x, other.xtr)
                {
                    x_shift = x_shift.max(x - p.x);
                }
            }

            // Left side of the other trapezoid.
            if let Some((x, y)) = side_intersection(a, b, other.yb, other.xbl, other.yt, other.xtl)
            {
                if strictly_greater(x, p.x)
                    && !strictly_lesser(y, other.yb)
                    && !strictly_greater(y, other.yt)
                {
                    x_shift = x_shift.max(x - p.x);
                }
            }

            // Right side of the other trapezoid.
            if let Some((x, y)) = side_intersection(a, b, other.yb, other.xbr, other.yt, other.xtr)
            {
                if strictly_greater(x, p.x)
                    && !strictly_lesser(y, other.yb)
                    && !strictly_greater(y, other.yt)
                {
                    x_shift = x_shift.max(x - p.x);
                }
            }
        }

        let corners_other = [
            Point::new(other.xbl, other.yb),
            Point::new(other.xbr, other.yb),
            Point::new(other.xtl, other.yt),
            Point::new(other.xtr, other.yt),
        ];
        for p in corners_other {
            let b = p.y - p.x * a;

            // Bottom side of this trapezoid.
            {
                let x = (self.yb - b) / a;
                if strictly_lesser(x, p.x)
                    && !strictly_lesser(x, self.xbl)
                    && !strictly_greater(x, self.xbr)
                {
                    x_shift = x_shift.max(p.x - x);
                }
            }

            // Top side of this trapezoid.
            {
                let x = (self.yt - b) / a;
                if strictly_lesser(x, p.x)
                    && !strictly_lesser(x, self.xtl)
                    && !strictly_greater(x, self.xtr)
                {
                    x_shift = x_shift.max(p.x - x);
                }
            }

            // Left side of this trapezoid.
            if let Some((x, y)) = side_intersection(a, b, self.yb, self.xbl, self.yt, self.xtl) {
                if strictly_lesser(x, p.x)
                    && !strictly_lesser(y, self.yb)
                    && !strictly_greater(y, self.yt)
                {
                    x_shift = x_shift.max(p.x - x);
                }
            }

            // Right side of this trapezoid.
            if let Some((x, y)) = side_intersection(a, b, self.yb, self.xbr, self.yt, self.xtr) {
                if strictly_lesser(x, p.x)
                    && !strictly_lesser(y, self.yb)
                    && !strictly_greater(y, self.yt)
                {
                    x_shift = x_shift.max(p.x - x);
                }
            }
        }

        x_shift
    }

    /// Area of the part of the trapezoid with `x >= x_left`.
    ///
    /// Piecewise quadratic in `x_left` depending on which sides the
    /// vertical cut crosses. `x_left` must not exceed both right corners.
    pub fn area_right_of(&self, x_left: f64) -> f64 {
        if strictly_greater(x_left, self.xbr) {
            assert!(
                !strictly_greater(x_left, self.xtr),
                "GeneralizedTrapezoid::area_right_of: x_left {x_left} beyond both right corners \
                 (xbr {}; xtr {})",
                self.xbr,
                self.xtr
            );
            let k = (self.xtr - self.xbr) / (self.xtr - x_left);
            return (self.xtr - self.xbr) * self.height / 2.0 / k / k;
        } else if strictly_greater(x_left, self.xtr) {
            let k = (self.xbr - self.xtr) / (self.xbr - x_left);
            return (self.xbr - self.xtr) * self.height / 2.0 / k / k;
        }
        let width_top = self.xtr - x_left;
        let width_bottom = self.xbr - x_left;
        (width_top + width_bottom) * self.height / 2.0
    }

    /// Round slopes close to 0 or infinity to avoid numerical cascades.
    pub fn clean(&self) -> Self {
        let mut xbl = self.xbl;
        let mut xbr = self.xbr;
        let mut xtl = self.xtl;
        let mut xtr = self.xtr;
        if self.a_left > 1e2 {
            xtl = self.xbl;
        } else if self.a_left < -1e2 {
            xbl = self.xtl;
        } else if self.a_left > 0.0 && self.a_left < 1e-2 {
            xtl = self.xbl;
        } else if self.a_left < 0.0 && self.a_left > -1e-2 {
            xbl = self.xtl;
        }
        if self.a_right > 1e2 {
            xbr = self.xtr;
        } else if self.a_right < -1e2 {
            xtr = self.xbr;
        } else if self.a_right > 0.0 && self.a_right < 1e-2 {
            xbr = self.xtr;
        } else if self.a_right < 0.0 && self.a_right > -1e-2 {
            xtr = self.xbr;
        }
        GeneralizedTrapezoid::new(self.yb, self.yt, xbl, xbr, xtl, xtr)
    }
}

/// Intersection of the line `y = a x + b` with a trapezoid side given by its
/// bottom and top points; `None` when parallel and not colinear.
fn side_intersection(
    a: f64,
    b: f64,
    y_bottom: f64,
    x_bottom: f64,
    y_top: f64,
    x_top: f64,
) -> Option<(f64, f64)> {
    if equal(x_bottom, x_top) {
        // Vertical side.
        let x = x_bottom;
        return Some((x, a * x + b));
    }
    let a_side = (y_top - y_bottom) / (x_top - x_bottom);
    let b_side = y_bottom - a_side * x_bottom;
    if equal(a, a_side) {
        if equal(b, b_side) {
            return Some((x_top, y_top));
        }
        return None;
    }
    let x = (b_side - b) / (a - a_side);
    Some((x, a * x + b))
}

impl PartialEq for GeneralizedTrapezoid {
    fn eq(&self, other: &Self) -> bool {
        equal(self.yb, other.yb)
            && equal(self.yt, other.yt)
            && equal(self.xbl, other.xbl)
            && equal(self.xbr, other.xbr)
            && equal(self.xtl, other.xtl)
            && equal(self.xtr, other.xtr)
    }
}

impl std::fmt::Display for GeneralizedTrapezoid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "yb {} yt {} xbl {} xbr {} xtl {} xtr {}",
            self.yb, self.yt, self.xbl, self.xbr, self.xtl, self.xtr
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_intersection_no_shift() {
        let trapezoid_1 = GeneralizedTrapezoid::new(-25.0, 175.0, 375.0, 775.0, 575.0, 975.0);
        let trapezoid_2 = GeneralizedTrapezoid::new(0.0, 200.0, 0.0, 400.0, 200.0, 600.0);
        assert_eq!(trapezoid_1.compute_right_shift(&trapezoid_2), 0.0);
        assert_eq!(trapezoid_1.compute_right_shift_if_intersects(&trapezoid_2), 0.0);
    }

    #[test]
    fn small_overlap_small_shift() {
        let trapezoid_1 = GeneralizedTrapezoid::new(-25.0, 175.0, 350.0, 750.0, 550.0, 950.0);
        let trapezoid_2 = GeneralizedTrapezoid::new(0.0, 200.0, 0.0, 400.0, 200.0, 600.0);
        assert_eq!(trapezoid_1.compute_right_shift(&trapezoid_2), 25.0);
        assert_eq!(
            trapezoid_1.compute_right_shift_if_intersects(&trapezoid_2),
            25.0
        );
    }

    #[test]
    fn left_of_needs_full_shift_but_does_not_intersect() {
        let trapezoid_1 = GeneralizedTrapezoid::new(-25.0, 175.0, -425.0, -25.0, -225.0, 175.0);
        let trapezoid_2 = GeneralizedTrapezoid::new(0.0, 200.0, 0.0, 400.0, 200.0, 600.0);
        assert_eq!(trapezoid_1.compute_right_shift(&trapezoid_2), 800.0);
        assert_eq!(trapezoid_1.compute_right_shift_if_intersects(&trapezoid_2), 0.0);
    }

    #[test]
    fn right_shift_resolves_intersection() {
        let trapezoid_1 = GeneralizedTrapezoid::new(-25.0, 175.0, 350.0, 750.0, 550.0, 950.0);
        let trapezoid_2 = GeneralizedTrapezoid::new(0.0, 200.0, 0.0, 400.0, 200.0, 600.0);
        assert!(trapezoid_1.intersects(&trapezoid_2));
        let shift = trapezoid_1.compute_right_shift(&trapezoid_2);
        let shifted = trapezoid_1.translate_x(shift);
        assert!(!shifted.intersects(&trapezoid_2));
    }

    #[test]
    fn area_right_of_cut() {
        // Rectangle 4 wide, 2 high.
        let rectangle = GeneralizedTrapezoid::new(0.0, 2.0, 0.0, 4.0, 0.0, 4.0);
        assert!(equal(rectangle.area_right_of(1.0), 6.0));
        assert!(equal(rectangle.area_right_of(4.0), 0.0));
        // Right triangle: right side from (4, 0) to (0, 2).
        let triangle = GeneralizedTrapezoid::new(0.0, 2.0, 0.0, 4.0, 0.0, 0.0);
        assert!(equal(triangle.area_right_of(0.0), 4.0));
        assert!(equal(triangle.area_right_of(2.0), 1.0));
    }

    #[test]
    fn interpolated_sides() {
        let trapezoid = GeneralizedTrapezoid::new(0.0, 2.0, 0.0, 4.0, 1.0, 3.0);
        assert!(equal(trapezoid.x_left(1.0), 0.5));
        assert!(equal(trapezoid.x_right(1.0), 3.5));
        assert!(equal(trapezoid.area(), (4.0 + 2.0) * 2.0 / 2.0));
    }

    #[test]
    fn clean_rounds_extreme_slopes() {
        let trapezoid = GeneralizedTrapezoid::new(0.0, 1.0, 0.0, 4.0, 1e-6, 4.0);
        let cleaned = trapezoid.clean();
        assert_eq!(cleaned.x_top_left(), 0.0);
        assert!(!cleaned.left_side_increasing_not_vertical());
    }
}
