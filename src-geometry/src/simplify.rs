//! Controlled shape simplification.
//!
//! Boundaries are approximated by dropping vertices one at a time, cheapest
//! first across all input shapes, until a global signed-area budget is
//! exhausted. Outer boundaries may only grow (feasibility stays
//! conservative) and inner boundaries may only shrink.

use crate::eps::equal;
use crate::point::Point;
use crate::shape::Shape;

/// One boundary to simplify.
#[derive(Debug, Clone)]
pub struct SimplifyInputShape {
    /// The boundary, as a counter-clockwise polygon.
    pub shape: Shape,
    /// Number of copies of the owning object; the area error is counted
    /// once per copy.
    pub copies: usize,
    /// With `outer` set the approximation must contain the original
    /// boundary; otherwise it must be contained in it.
    pub outer: bool,
}

/// A simplified boundary.
#[derive(Debug, Clone)]
pub struct SimplifyOutputShape {
    pub shape: Shape,
}

/// Area change caused by removing vertex `pos` (signed, counter-clockwise
/// convention: positive means the polygon grows).
fn removal_area(points: &[Point], pos: usize) -> f64 {
    let n = points.len();
    let prev = points[(pos + n - 1) % n];
    let cur = points[pos];
    let next = points[(pos + 1) % n];
    // Replacing (prev, cur, next) by (prev, next) adds the signed triangle.
    -((cur - prev).cross(next - prev)) / 2.0
}

/// Simplify a batch of boundaries under a global area budget.
///
/// The budget is the maximum total absolute signed-area error, copies
/// included, summed over all shapes.
pub fn simplify(
    inputs: &[SimplifyInputShape],
    maximum_approximation_area: f64,
) -> Vec<SimplifyOutputShape> {
    let mut polygons: Vec<Vec<Point>> = inputs
        .iter()
        .map(|input| {
            input
                .shape
                .elements
                .iter()
                .map(|element| element.start)
                .collect()
        })
        .collect();

    let mut budget = maximum_approximation_area;
    loop {
        // Pick the cheapest admissible removal over all shapes.
        let mut best: Option<(usize, usize, f64)> = None;
        for (shape_pos, points) in polygons.iter().enumerate() {
            if points.len() <= 4 {
                continue;
            }
            let input = &inputs[shape_pos];
            for pos in 0..points.len() {
                let delta = removal_area(points, pos);
                // Outer boundaries may only grow, inner ones only shrink.
                let admissible = if input.outer {
                    delta >= 0.0 || equal(delta, 0.0)
                } else {
                    delta <= 0.0 || equal(delta, 0.0)
                };
                if !admissible {
                    continue;
                }
                let cost = delta.abs() * input.copies as f64;
                if best.is_none() || cost < best.unwrap().2 {
                    best = Some((shape_pos, pos, cost));
                }
            }
        }
        match best {
            Some((shape_pos, pos, cost)) if cost <= budget => {
                budget -= cost;
                polygons[shape_pos].remove(pos);
            }
            _ => break,
        }
    }

    polygons
        .into_iter()
        .map(|points| {
            let vertices: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
            SimplifyOutputShape {
                shape: Shape::polygon(&vertices),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_budget_no_change() {
        let shape = Shape::polygon(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (2.0, 3.0), (0.0, 4.0)]);
        let outputs = simplify(
            &[SimplifyInputShape {
                shape: shape.clone(),
                copies: 1,
                outer: true,
            }],
            0.0,
        );
        assert_eq!(outputs[0].shape.elements.len(), shape.elements.len());
    }

    #[test]
    fn outer_simplification_grows() {
        // The concave notch at (2, 3) costs area 2 to flatten.
        let shape = Shape::polygon(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (2.0, 3.0), (0.0, 4.0)]);
        let area = shape.compute_area();
        let outputs = simplify(
            &[SimplifyInputShape {
                shape,
                copies: 1,
                outer: true,
            }],
            3.0,
        );
        let simplified = &outputs[0].shape;
        assert_eq!(simplified.elements.len(), 4);
        assert!(simplified.compute_area() >= area);
    }

    #[test]
    fn copies_scale_the_cost() {
        let shape = Shape::polygon(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (2.0, 3.0), (0.0, 4.0)]);
        let outputs = simplify(
            &[SimplifyInputShape {
                shape,
                copies: 10,
                outer: true,
            }],
            3.0,
        );
        // 10 copies make the notch cost 20, over budget.
        assert_eq!(outputs[0].shape.elements.len(), 5);
    }
}
