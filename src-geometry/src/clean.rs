//! Shape cleaning.
//!
//! Trapezoidation needs vertices that are distinct, non-collinear and whose
//! y-coordinates differ by more than the comparator epsilon. All cleaning
//! preserves the counter-clockwise orientation.

use crate::element::{ElementKind, ShapeElement};
use crate::eps::equal;
use crate::point::Point;
use crate::shape::Shape;

/// Drop consecutive identical vertices (zero-length line segments).
pub fn remove_redundant_vertices(shape: &Shape) -> (bool, Shape) {
    let mut elements: Vec<ShapeElement> = Vec::with_capacity(shape.elements.len());
    let mut changed = false;
    for element in &shape.elements {
        if element.kind == ElementKind::LineSegment && element.start == element.end {
            changed = true;
            continue;
        }
        elements.push(*element);
    }
    if changed {
        // Restitch the loop: each element must start where the previous one
        // ended.
        let n = elements.len();
        for pos in 0..n {
            let start = elements[(pos + n - 1) % n].end;
            elements[pos].start = start;
        }
    }
    (changed, Shape { elements })
}

/// Merge strictly-collinear adjacent line segments.
pub fn remove_aligned_vertices(shape: &Shape) -> (bool, Shape) {
    if !shape.is_polygon() || shape.elements.len() <= 3 {
        return (false, shape.clone());
    }
    let mut elements: Vec<ShapeElement> = Vec::new();
    let mut changed = false;
    for element in &shape.elements {
        if let Some(last) = elements.last_mut() {
            let d1 = last.end - last.start;
            let d2 = element.end - element.start;
            if equal(d1.cross(d2), 0.0) && d1.dot(d2) > 0.0 {
                last.end = element.end;
                changed = true;
                continue;
            }
        }
        elements.push(*element);
    }
    // The seam between the last and the first element.
    while elements.len() > 3 {
        let first = elements[0];
        let last = *elements.last().unwrap();
        let d1 = last.end - last.start;
        let d2 = first.end - first.start;
        if equal(d1.cross(d2), 0.0) && d1.dot(d2) > 0.0 {
            elements.last_mut().unwrap().end = first.end;
            elements.remove(0);
            changed = true;
        } else {
            break;
        }
    }
    (changed, Shape { elements })
}

/// Fuse vertices whose y-coordinates are closer than the comparator epsilon
/// so that the trapezoidation sweep sees clean horizontal bands.
pub fn equalize_close_y(shape: &Shape) -> (bool, Shape) {
    let mut ys: Vec<f64> = shape
        .elements
        .iter()
        .map(|element| element.start.y)
        .collect();
    ys.sort_by(|a, b| a.partial_cmp(b).unwrap());
    ys.dedup_by(|a, b| equal(*a, *b));

    let snap = |y: f64| -> f64 {
        for &y_ref in &ys {
            if equal(y, y_ref) {
                return y_ref;
            }
        }
        y
    };

    let mut changed = false;
    let elements = shape
        .elements
        .iter()
        .map(|element| {
            let start = Point::new(element.start.x, snap(element.start.y));
            let end = Point::new(element.end.x, snap(element.end.y));
            if start != element.start || end != element.end {
                changed = true;
            }
            ShapeElement {
                start,
                end,
                ..*element
            }
        })
        .collect();
    (changed, Shape { elements })
}

/// Run the cleaning passes until fixpoint.
pub fn clean_shape(shape: &Shape) -> Shape {
    let (_, mut shape) = equalize_close_y(shape);
    loop {
        let (changed_1, cleaned) = remove_redundant_vertices(&shape);
        let (changed_2, cleaned) = remove_aligned_vertices(&cleaned);
        shape = cleaned;
        if !changed_1 && !changed_2 {
            return shape;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eps::equal;

    #[test]
    fn redundant_vertices_are_dropped() {
        let shape = Shape::polygon(&[
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
        ]);
        let cleaned = clean_shape(&shape);
        assert_eq!(cleaned.elements.len(), 4);
        assert!(equal(cleaned.compute_area(), 1.0));
    }

    #[test]
    fn aligned_vertices_are_merged() {
        let shape = Shape::polygon(&[
            (0.0, 0.0),
            (0.5, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
        ]);
        let cleaned = clean_shape(&shape);
        assert_eq!(cleaned.elements.len(), 4);
        assert!(cleaned.is_square());
    }

    #[test]
    fn cleaning_is_idempotent() {
        let shape = Shape::polygon(&[
            (0.0, 0.0),
            (0.5, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (0.0, 1.0),
        ]);
        let once = clean_shape(&shape);
        let twice = clean_shape(&once);
        assert_eq!(once, twice);
    }
}
