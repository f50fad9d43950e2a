//! Polygon trapezoidation.
//!
//! Decomposes a simple polygon (with optional holes) into generalized
//! trapezoids whose parallel sides are horizontal. The sweep processes
//! vertices from top to bottom and maintains the set of trapezoids
//! currently open; each vertex class opens, closes, splits or merges open
//! trapezoids. Callers are expected to clean shapes first
//! (`shapepack_geometry::clean`), otherwise the sweep fails loudly.

use shapepack_geometry::eps::{equal, strictly_greater, strictly_lesser};
use shapepack_geometry::point::Point;
use shapepack_geometry::shape::Shape;

use crate::GeneralizedTrapezoid;

/// Errors raised by the trapezoidation sweep.
#[derive(Debug, thiserror::Error)]
pub enum TrapezoidationError {
    #[error("trapezoidation requires a polygon (line segments only)")]
    NotAPolygon,

    #[error("polygon is degenerate ({0} vertices)")]
    Degenerate(usize),

    #[error("unsupported vertex pattern at ({0}, {1}); is the polygon simple and clean?")]
    UnsupportedVertexPattern(f64, f64),

    #[error("no open trapezoid contains vertex ({0}, {1}); is the polygon simple and clean?")]
    NoContainingTrapezoid(f64, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VertexTypeFlag {
    LocalMaximumConvex,
    LocalMinimumConvex,
    LocalMaximumConcave,
    LocalMinimumConcave,
    Inflection,
    HorizontalLocalMaximumConvex,
    HorizontalLocalMinimumConvex,
    HorizontalLocalMaximumConcave,
    HorizontalLocalMinimumConcave,
    StrictlyHorizontal,
}

#[derive(Debug, Clone, Copy)]
struct OpenTrapezoid {
    bottom_left: Point,
    bottom_right: Point,
    top_left: Point,
    top_right: Point,
}

/// x-coordinate at height `y` on the support line through `bottom` and
/// `top`.
fn x(bottom: Point, top: Point, y: f64) -> f64 {
    if equal(y, bottom.y) {
        return bottom.x;
    }
    if equal(y, top.y) {
        return top.x;
    }
    let a = (top.x - bottom.x) / (top.y - bottom.y);
    bottom.x + (y - bottom.y) * a
}

/// Open trapezoid(s) whose x-range contains the vertex at the vertex's
/// height; at most two can (at a merge vertex), ordered by their left side.
fn find_trapezoid_containing_vertex(
    open_trapezoids: &[OpenTrapezoid],
    vertex: Point,
) -> (Option<usize>, Option<usize>) {
    let mut first: Option<usize> = None;
    let mut x_left_first = 0.0;
    for (pos, open_trapezoid) in open_trapezoids.iter().enumerate() {
        let x_left = x(open_trapezoid.bottom_left, open_trapezoid.top_left, vertex.y);
        let x_right = x(
            open_trapezoid.bottom_right,
            open_trapezoid.top_right,
            vertex.y,
        );
        if !strictly_greater(x_left, vertex.x) && !strictly_lesser(x_right, vertex.x) {
            match first {
                None => {
                    first = Some(pos);
                    x_left_first = x_left;
                }
                Some(first_pos) => {
                    if strictly_lesser(x_left_first, x_left) {
                        return (Some(first_pos), Some(pos));
                    }
                    return (Some(pos), Some(first_pos));
                }
            }
        }
    }
    (first, None)
}

/// A flattened boundary vertex: which boundary it belongs to and its index
/// within that boundary.
#[derive(Debug, Clone, Copy)]
struct BoundaryVertex {
    boundary: usize,
    index: usize,
}

struct Boundaries {
    boundaries: Vec<Vec<shapepack_geometry::element::ShapeElement>>,
    flat: Vec<BoundaryVertex>,
}

impl Boundaries {
    /// Vertex `offset` positions after `vertex` along its own boundary.
    fn vertex(&self, vertex: BoundaryVertex, offset: i64) -> Point {
        let boundary = &self.boundaries[vertex.boundary];
        let n = boundary.len() as i64;
        let index = ((vertex.index as i64 + offset) % n + n) % n;
        boundary[index as usize].start
    }

    fn start(&self, pos: usize) -> Point {
        let v = self.flat[pos];
        self.boundaries[v.boundary][v.index].start
    }

    fn prev_element(&self, pos: usize) -> &shapepack_geometry::element::ShapeElement {
        let v = self.flat[pos];
        let boundary = &self.boundaries[v.boundary];
        let n = boundary.len();
        &boundary[(v.index + n - 1) % n]
    }

    fn element(&self, pos: usize) -> &shapepack_geometry::element::ShapeElement {
        let v = self.flat[pos];
        &self.boundaries[v.boundary][v.index]
    }
}

/// Decompose a polygon (with holes) into generalized trapezoids.
///
/// The outer boundary must be counter-clockwise; holes are normalized to
/// clockwise internally. Zero-height trapezoids are dropped.
pub fn polygon_trapezoidation(
    shape: &Shape,
    holes: &[Shape],
) -> Result<Vec<GeneralizedTrapezoid>, TrapezoidationError> {
    if !shape.is_polygon() || holes.iter().any(|hole| !hole.is_polygon()) {
        return Err(TrapezoidationError::NotAPolygon);
    }
    if shape.elements.len() < 3 {
        return Err(TrapezoidationError::Degenerate(shape.elements.len()));
    }

    let mut boundaries = vec![shape.elements.clone()];
    for hole in holes {
        let hole = if hole.compute_area() > 0.0 {
            hole.reverse()
        } else {
            hole.clone()
        };
        boundaries.push(hole.elements);
    }
    let mut flat = Vec::new();
    for (boundary_pos, boundary) in boundaries.iter().enumerate() {
        for index in 0..boundary.len() {
            flat.push(BoundaryVertex {
                boundary: boundary_pos,
                index,
            });
        }
    }
    let boundaries = Boundaries { boundaries, flat };
    let n = boundaries.flat.len();

    // Sort vertices from top to bottom (ties left to right).
    let mut sorted_vertices: Vec<usize> = (0..n).collect();
    sorted_vertices.sort_by(|&a, &b| {
        let pa = boundaries.start(a);
        let pb = boundaries.start(b);
        pb.y.partial_cmp(&pa.y)
            .unwrap()
            .then(pa.x.partial_cmp(&pb.x).unwrap())
    });

    // Classify the vertices. The convexity comes from the sign of the cross
    // product of the edges meeting at the vertex.
    let mut flags = vec![VertexTypeFlag::StrictlyHorizontal; n];
    for pos in 0..n {
        let element = boundaries.element(pos);
        let element_prev = boundaries.prev_element(pos);
        let v = (element_prev.end - element_prev.start).cross(element.end - element.start);
        let is_convex = v >= 0.0;

        let y = element.start.y;
        let y_prev = element_prev.start.y;
        let y_next = element.end.y;
        flags[pos] = if y_prev < y && y < y_next {
            VertexTypeFlag::Inflection
        } else if y_prev > y && y > y_next {
            VertexTypeFlag::Inflection
        } else if y < y_prev && y < y_next {
            if is_convex {
                VertexTypeFlag::LocalMinimumConvex
            } else {
                VertexTypeFlag::LocalMinimumConcave
            }
        } else if y > y_prev && y > y_next {
            if is_convex {
                VertexTypeFlag::LocalMaximumConvex
            } else {
                VertexTypeFlag::LocalMaximumConcave
            }
        } else if (y == y_prev && y < y_next) || (y < y_prev && y == y_next) {
            if is_convex {
                VertexTypeFlag::HorizontalLocalMinimumConvex
            } else {
                VertexTypeFlag::HorizontalLocalMinimumConcave
            }
        } else if (y == y_prev && y > y_next) || (y > y_prev && y == y_next) {
            if is_convex {
                VertexTypeFlag::HorizontalLocalMaximumConvex
            } else {
                VertexTypeFlag::HorizontalLocalMaximumConcave
            }
        } else {
            VertexTypeFlag::StrictlyHorizontal
        };
    }

    let mut trapezoids: Vec<GeneralizedTrapezoid> = Vec::new();
    let mut open_trapezoids: Vec<OpenTrapezoid> = Vec::new();

    let containing =
        |open_trapezoids: &[OpenTrapezoid], vertex: Point| -> Result<usize, TrapezoidationError> {
            find_trapezoid_containing_vertex(open_trapezoids, vertex)
                .0
                .ok_or(TrapezoidationError::NoContainingTrapezoid(vertex.x, vertex.y))
        };

    let mut vertex_pos = 0;
    while vertex_pos < n {
        let element_pos = sorted_vertices[vertex_pos];
        let element_pos_next = sorted_vertices[(vertex_pos + 1) % n];
        let bv = boundaries.flat[element_pos];
        let vertex = boundaries.start(element_pos);
        let vertex_next = boundaries.start(element_pos_next);

        match (flags[element_pos], flags[element_pos_next]) {
            (VertexTypeFlag::LocalMaximumConvex, _) => {
                // One more open trapezoid.
                open_trapezoids.push(OpenTrapezoid {
                    top_left: vertex,
                    top_right: vertex,
                    bottom_left: boundaries.vertex(bv, 1),
                    bottom_right: boundaries.vertex(bv, -1),
                });
            }
            (VertexTypeFlag::LocalMinimumConvex, _) => {
                // One less open trapezoid.
                let pos = containing(&open_trapezoids, vertex)?;
                let open_trapezoid = open_trapezoids[pos];
                if !equal(vertex.y, open_trapezoid.top_left.y) {
                    trapezoids.push(GeneralizedTrapezoid::new(
                        vertex.y,
                        open_trapezoid.top_left.y,
                        vertex.x,
                        vertex.x,
                        open_trapezoid.top_left.x,
                        open_trapezoid.top_right.x,
                    ));
                }
                open_trapezoids.swap_remove(pos);
            }
            (VertexTypeFlag::LocalMaximumConcave, _) => {
                // One open trapezoid becomes two.
                let pos = containing(&open_trapezoids, vertex)?;
                let open_trapezoid = open_trapezoids[pos];
                let x_left = x(open_trapezoid.bottom_left, open_trapezoid.top_left, vertex.y);
                let x_right = x(
                    open_trapezoid.bottom_right,
                    open_trapezoid.top_right,
                    vertex.y,
                );
                if !equal(vertex.y, open_trapezoid.top_left.y) {
                    trapezoids.push(GeneralizedTrapezoid::new(
                        vertex.y,
                        open_trapezoid.top_left.y,
                        x_left,
                        x_right,
                        open_trapezoid.top_left.x,
                        open_trapezoid.top_right.x,
                    ));
                }
                open_trapezoids.push(OpenTrapezoid {
                    top_left: Point::new(x_left, vertex.y),
                    top_right: vertex,
                    bottom_left: open_trapezoid.bottom_left,
                    bottom_right: boundaries.vertex(bv, -1),
                });
                open_trapezoids.push(OpenTrapezoid {
                    top_left: vertex,
                    top_right: Point::new(x_right, vertex.y),
                    bottom_left: boundaries.vertex(bv, 1),
                    bottom_right: open_trapezoid.bottom_right,
                });
                open_trapezoids.swap_remove(pos);
            }
            (VertexTypeFlag::LocalMinimumConcave, _) => {
                // Two open trapezoids merge into one.
                let (first, second) = find_trapezoid_containing_vertex(&open_trapezoids, vertex);
                let (pos_1, pos_2) = match (first, second) {
                    (Some(a), Some(b)) => (a, b),
                    _ => {
                        return Err(TrapezoidationError::NoContainingTrapezoid(
                            vertex.x, vertex.y,
                        ))
                    }
                };
                let open_trapezoid_1 = open_trapezoids[pos_1];
                let open_trapezoid_2 = open_trapezoids[pos_2];

                let x_left = x(
                    open_trapezoid_1.bottom_left,
                    open_trapezoid_1.top_left,
                    vertex.y,
                );
                if !equal(vertex.y, open_trapezoid_1.top_left.y) {
                    trapezoids.push(GeneralizedTrapezoid::new(
                        vertex.y,
                        open_trapezoid_1.top_left.y,
                        x_left,
                        vertex.x,
                        open_trapezoid_1.top_left.x,
                        open_trapezoid_1.top_right.x,
                    ));
                }

                let x_right = x(
                    open_trapezoid_2.bottom_right,
                    open_trapezoid_2.top_right,
                    vertex.y,
                );
                if !equal(vertex.y, open_trapezoid_2.top_left.y) {
                    trapezoids.push(GeneralizedTrapezoid::new(
                        vertex.y,
                        open_trapezoid_2.top_left.y,
                        vertex.x,
                        x_right,
                        open_trapezoid_2.top_left.x,
                        open_trapezoid_2.top_right.x,
                    ));
                }

                let merged = OpenTrapezoid {
                    top_left: Point::new(x_left, vertex.y),
                    top_right: Point::new(x_right, vertex.y),
                    bottom_left: open_trapezoid_1.bottom_left,
                    bottom_right: open_trapezoid_2.bottom_right,
                };
                remove_two(&mut open_trapezoids, pos_1, pos_2);
                open_trapezoids.push(merged);
            }
            (VertexTypeFlag::Inflection, _) => {
                // Close the current trapezoid, open its successor with the
                // passed edge replaced.
                let pos = containing(&open_trapezoids, vertex)?;
                let open_trapezoid = open_trapezoids[pos];
                let x_left = x(open_trapezoid.bottom_left, open_trapezoid.top_left, vertex.y);
                let x_right = x(
                    open_trapezoid.bottom_right,
                    open_trapezoid.top_right,
                    vertex.y,
                );
                if !equal(vertex.y, open_trapezoid.top_left.y) {
                    trapezoids.push(GeneralizedTrapezoid::new(
                        vertex.y,
                        open_trapezoid.top_left.y,
                        x_left,
                        x_right,
                        open_trapezoid.top_left.x,
                        open_trapezoid.top_right.x,
                    ));
                }
                let new_open = if vertex == open_trapezoid.bottom_left {
                    OpenTrapezoid {
                        top_left: Point::new(x_left, vertex.y),
                        top_right: Point::new(x_right, vertex.y),
                        bottom_left: boundaries.vertex(bv, 1),
                        bottom_right: open_trapezoid.bottom_right,
                    }
                } else {
                    OpenTrapezoid {
                        top_left: Point::new(x_left, vertex.y),
                        top_right: Point::new(x_right, vertex.y),
                        bottom_left: open_trapezoid.bottom_left,
                        bottom_right: boundaries.vertex(bv, -1),
                    }
                };
                open_trapezoids[pos] = new_open;
            }
            (
                VertexTypeFlag::HorizontalLocalMaximumConvex,
                VertexTypeFlag::HorizontalLocalMaximumConvex,
            ) => {
                // One more open trapezoid, below a horizontal top edge.
                open_trapezoids.push(OpenTrapezoid {
                    top_left: vertex,
                    top_right: boundaries.vertex(bv, -1),
                    bottom_left: boundaries.vertex(bv, 1),
                    bottom_right: boundaries.vertex(bv, -2),
                });
                vertex_pos += 1;
            }
            (
                VertexTypeFlag::HorizontalLocalMinimumConvex,
                VertexTypeFlag::HorizontalLocalMinimumConvex,
            ) => {
                // One less open trapezoid, above a horizontal bottom edge.
                let pos = containing(&open_trapezoids, vertex)?;
                let open_trapezoid = open_trapezoids[pos];
                trapezoids.push(GeneralizedTrapezoid::new(
                    vertex.y,
                    open_trapezoid.top_left.y,
                    boundaries.start(element_pos).x,
                    boundaries.vertex(bv, 1).x,
                    open_trapezoid.top_left.x,
                    open_trapezoid.top_right.x,
                ));
                open_trapezoids.swap_remove(pos);
                vertex_pos += 1;
            }
            (
                VertexTypeFlag::HorizontalLocalMaximumConcave,
                VertexTypeFlag::HorizontalLocalMaximumConcave,
            ) => {
                // One open trapezoid becomes two, under a horizontal edge.
                let pos = containing(&open_trapezoids, vertex)?;
                let open_trapezoid = open_trapezoids[pos];
                let x_left = x(open_trapezoid.bottom_left, open_trapezoid.top_left, vertex.y);
                let x_right = x(
                    open_trapezoid.bottom_right,
                    open_trapezoid.top_right,
                    vertex.y,
                );
                if !equal(vertex.y, open_trapezoid.top_left.y) {
                    trapezoids.push(GeneralizedTrapezoid::new(
                        vertex.y,
                        open_trapezoid.top_left.y,
                        x_left,
                        x_right,
                        open_trapezoid.top_left.x,
                        open_trapezoid.top_right.x,
                    ));
                }
                open_trapezoids.push(OpenTrapezoid {
                    top_left: Point::new(x_left, vertex.y),
                    top_right: vertex,
                    bottom_left: open_trapezoid.bottom_left,
                    bottom_right: boundaries.vertex(bv, -1),
                });
                open_trapezoids.push(OpenTrapezoid {
                    top_left: boundaries.vertex(bv, 1),
                    top_right: Point::new(x_right, vertex.y),
                    bottom_left: boundaries.vertex(bv, 2),
                    bottom_right: open_trapezoid.bottom_right,
                });
                open_trapezoids.swap_remove(pos);
                vertex_pos += 1;
            }
            (
                VertexTypeFlag::HorizontalLocalMinimumConcave,
                VertexTypeFlag::HorizontalLocalMinimumConcave,
            ) => {
                // Two open trapezoids merge over a horizontal edge.
                let pos_1 = containing(&open_trapezoids, vertex)?;
                let pos_2 = containing(&open_trapezoids, vertex_next)?;
                let open_trapezoid_1 = open_trapezoids[pos_1];
                let open_trapezoid_2 = open_trapezoids[pos_2];

                let x_left = x(
                    open_trapezoid_1.bottom_left,
                    open_trapezoid_1.top_left,
                    vertex.y,
                );
                if !equal(vertex.y, open_trapezoid_1.top_left.y) {
                    trapezoids.push(GeneralizedTrapezoid::new(
                        vertex.y,
                        open_trapezoid_1.top_left.y,
                        x_left,
                        vertex.x,
                        open_trapezoid_1.top_left.x,
                        open_trapezoid_1.top_right.x,
                    ));
                }

                let x_right = x(
                    open_trapezoid_2.bottom_right,
                    open_trapezoid_2.top_right,
                    vertex.y,
                );
                if !equal(vertex.y, open_trapezoid_2.top_left.y) {
                    trapezoids.push(GeneralizedTrapezoid::new(
                        vertex.y,
                        open_trapezoid_2.top_left.y,
                        boundaries.vertex(bv, -1).x,
                        x_right,
                        open_trapezoid_2.top_left.x,
                        open_trapezoid_2.top_right.x,
                    ));
                }

                let merged = OpenTrapezoid {
                    top_left: Point::new(x_left, vertex.y),
                    top_right: Point::new(x_right, vertex.y),
                    bottom_left: open_trapezoid_1.bottom_left,
                    bottom_right: open_trapezoid_2.bottom_right,
                };
                remove_two(&mut open_trapezoids, pos_1, pos_2);
                open_trapezoids.push(merged);
                vertex_pos += 1;
            }
            (
                VertexTypeFlag::HorizontalLocalMaximumConvex,
                VertexTypeFlag::HorizontalLocalMinimumConcave,
            ) => {
                let pos = containing(&open_trapezoids, vertex_next)?;
                let open_trapezoid = open_trapezoids[pos];
                let x_right = x(
                    open_trapezoid.bottom_right,
                    open_trapezoid.top_right,
                    vertex.y,
                );
                trapezoids.push(GeneralizedTrapezoid::new(
                    vertex.y,
                    open_trapezoid.top_left.y,
                    boundaries.vertex(bv, -1).x,
                    x_right,
                    open_trapezoid.top_left.x,
                    open_trapezoid.top_right.x,
                ));
                open_trapezoids[pos] = OpenTrapezoid {
                    top_left: vertex,
                    top_right: Point::new(x_right, vertex.y),
                    bottom_left: boundaries.vertex(bv, 1),
                    bottom_right: open_trapezoid.bottom_right,
                };
                vertex_pos += 1;
            }
            (
                VertexTypeFlag::HorizontalLocalMinimumConvex,
                VertexTypeFlag::HorizontalLocalMaximumConcave,
            ) => {
                let pos = containing(&open_trapezoids, vertex)?;
                let open_trapezoid = open_trapezoids[pos];
                let x_right = x(
                    open_trapezoid.bottom_right,
                    open_trapezoid.top_right,
                    vertex.y,
                );
                trapezoids.push(GeneralizedTrapezoid::new(
                    vertex.y,
                    open_trapezoid.top_left.y,
                    vertex.x,
                    x_right,
                    open_trapezoid.top_left.x,
                    open_trapezoid.top_right.x,
                ));
                open_trapezoids[pos] = OpenTrapezoid {
                    top_left: boundaries.vertex(bv, 1),
                    top_right: Point::new(x_right, vertex.y),
                    bottom_left: boundaries.vertex(bv, 2),
                    bottom_right: open_trapezoid.bottom_right,
                };
                vertex_pos += 1;
            }
            (
                VertexTypeFlag::HorizontalLocalMaximumConcave,
                VertexTypeFlag::HorizontalLocalMinimumConvex,
            ) => {
                let pos = containing(&open_trapezoids, vertex_next)?;
                let open_trapezoid = open_trapezoids[pos];
                let x_left = x(open_trapezoid.bottom_left, open_trapezoid.top_left, vertex.y);
                if !equal(vertex.y, open_trapezoid.top_left.y) {
                    trapezoids.push(GeneralizedTrapezoid::new(
                        vertex.y,
                        open_trapezoid.top_left.y,
                        x_left,
                        boundaries.vertex(bv, 1).x,
                        open_trapezoid.top_left.x,
                        open_trapezoid.top_right.x,
                    ));
                }
                open_trapezoids[pos] = OpenTrapezoid {
                    top_left: Point::new(x_left, vertex.y),
                    top_right: vertex,
                    bottom_left: open_trapezoid.bottom_left,
                    bottom_right: boundaries.vertex(bv, -1),
                };
                vertex_pos += 1;
            }
            (
                VertexTypeFlag::HorizontalLocalMinimumConcave,
                VertexTypeFlag::HorizontalLocalMaximumConvex,
            ) => {
                let pos = containing(&open_trapezoids, vertex)?;
                let open_trapezoid = open_trapezoids[pos];
                let x_left = x(open_trapezoid.bottom_left, open_trapezoid.top_left, vertex.y);
                if !equal(vertex.y, open_trapezoid.top_left.y) {
                    trapezoids.push(GeneralizedTrapezoid::new(
                        vertex.y,
                        open_trapezoid.top_left.y,
                        x_left,
                        vertex.x,
                        open_trapezoid.top_left.x,
                        open_trapezoid.top_right.x,
                    ));
                }
                open_trapezoids[pos] = OpenTrapezoid {
                    top_left: Point::new(x_left, vertex.y),
                    top_right: boundaries.vertex(bv, -1),
                    bottom_left: open_trapezoid.bottom_left,
                    bottom_right: boundaries.vertex(bv, -2),
                };
                vertex_pos += 1;
            }
            _ => {
                return Err(TrapezoidationError::UnsupportedVertexPattern(
                    vertex.x, vertex.y,
                ));
            }
        }
        vertex_pos += 1;
    }

    Ok(trapezoids)
}

/// Remove two elements by position (swap-remove, order-safe).
fn remove_two(open_trapezoids: &mut Vec<OpenTrapezoid>, pos_1: usize, pos_2: usize) {
    let (hi, lo) = if pos_1 > pos_2 {
        (pos_1, pos_2)
    } else {
        (pos_2, pos_1)
    };
    open_trapezoids.swap_remove(hi);
    open_trapezoids.swap_remove(lo);
}
