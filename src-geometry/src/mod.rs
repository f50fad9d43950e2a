//! Geometry primitives and shape preprocessing for irregular packing
//!
//! Copyright (C) 2025 Pierre Aubert pierre(at)spinorama(dot)org
//!
//! This program is free software: you can redistribute it and/or modify
//! it under the terms of the GNU General Public License as published by
//! the Free Software Foundation, either version 3 of the License, or
//! (at your option) any later version.
//!
//! This program is distributed in the hope that it will be useful,
//! but WITHOUT ANY WARRANTY; without even the implied warranty of
//! MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//! GNU General Public License for more details.
//!
//! You should have received a copy of the GNU General Public License
//! along with this program.  If not, see <https://www.gnu.org/licenses/>.
//!
//! Shapes are closed, counter-clockwise sequences of line segments and
//! circular arcs. Everything downstream (trapezoidation, the branching
//! scheme) relies on the same epsilon comparators exported from [`eps`], so
//! the predicates are defined once here and reused everywhere.

/// Epsilon comparators shared by the whole workspace
pub mod eps;
/// Points and vector algebra
pub mod point;
/// Shape elements: line segments and circular arcs
pub mod element;
/// Closed shapes, areas, bounding boxes, classification
pub mod shape;
/// Shape cleaning: redundant vertices, collinear edges, close y-coordinates
pub mod clean;
/// Inflation and deflation by a disc (minimum-spacing preprocessing)
pub mod inflate;
/// Convex hulls of polygons
pub mod convex_hull;
/// Controlled shape simplification under a global area budget
pub mod simplify;
/// SVG path emission for certificates
pub mod svg;

pub use eps::{equal, strictly_greater, strictly_lesser, EPSILON};
pub use element::{ElementKind, ShapeElement};
pub use point::Point;
pub use shape::{Shape, ShapeWithHoles};

/// Errors raised by geometric preprocessing.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("shape is degenerate after cleaning ({0} elements left)")]
    DegenerateShape(usize),

    #[error("shape is not closed: element {0} does not end where element {1} starts")]
    NotClosed(usize, usize),

    #[error("shape is not in counter-clockwise direction (signed area {0})")]
    NotCounterClockwise(f64),

    #[error("shape is self-intersecting: elements {0} and {1} cross")]
    SelfIntersecting(usize, usize),

    #[error("offset by {0} collapses the shape")]
    OffsetCollapse(f64),
}
