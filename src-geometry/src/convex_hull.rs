//! Convex hulls of polygons (monotone chain).

use crate::point::Point;
use crate::shape::Shape;

/// Convex hull of the vertices of a polygon, as a counter-clockwise polygon.
pub fn polygon_convex_hull(shape: &Shape) -> Shape {
    let points: Vec<Point> = shape.elements.iter().map(|element| element.start).collect();
    points_convex_hull(&points)
}

/// Convex hull of the union of several polygons.
pub fn shapes_convex_hull(shapes: &[&Shape]) -> Shape {
    let points: Vec<Point> = shapes
        .iter()
        .flat_map(|shape| shape.elements.iter().map(|element| element.start))
        .collect();
    points_convex_hull(&points)
}

fn points_convex_hull(points: &[Point]) -> Shape {
    let mut points: Vec<Point> = points.to_vec();
    points.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap()
            .then(a.y.partial_cmp(&b.y).unwrap())
    });
    points.dedup_by(|a, b| a == b);
    if points.len() <= 2 {
        return Shape::default();
    }

    let turns_right = |o: Point, a: Point, b: Point| (a - o).cross(b - o) <= 0.0;

    let mut lower: Vec<Point> = Vec::new();
    for &p in &points {
        while lower.len() >= 2 && turns_right(lower[lower.len() - 2], lower[lower.len() - 1], p) {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Point> = Vec::new();
    for &p in points.iter().rev() {
        while upper.len() >= 2 && turns_right(upper[upper.len() - 2], upper[upper.len() - 1], p) {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);

    let vertices: Vec<(f64, f64)> = lower.iter().map(|p| (p.x, p.y)).collect();
    Shape::polygon(&vertices)
}

/// Area of the convex hull of the union of several polygons.
pub fn shapes_convex_hull_area(shapes: &[&Shape]) -> f64 {
    shapes_convex_hull(shapes).compute_area()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eps::equal;

    #[test]
    fn triangle_is_its_own_hull() {
        let shape = Shape::polygon(&[(0.0, 0.0), (3.0, 0.0), (1.0, 3.0)]);
        let hull = polygon_convex_hull(&shape);
        assert_eq!(hull.elements.len(), 3);
        assert!(equal(hull.compute_area(), shape.compute_area()));
    }

    #[test]
    fn concave_vertex_is_dropped() {
        let shape = Shape::polygon(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (2.0, 1.0), (0.0, 4.0)]);
        let hull = polygon_convex_hull(&shape);
        assert_eq!(hull.elements.len(), 4);
        assert!(equal(hull.compute_area(), 16.0));
        assert!(hull.check().is_ok());
    }

    #[test]
    fn hull_of_two_shapes() {
        let a = Shape::rectangle(1.0, 1.0);
        let b = Shape::rectangle(1.0, 1.0).translate(2.0, 0.0);
        let hull = shapes_convex_hull(&[&a, &b]);
        assert!(equal(hull.compute_area(), 3.0));
    }
}
