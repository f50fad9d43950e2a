//! Branching scheme for the irregular packing problem.
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
//! A node of the search tree is a partial packing: a skyline of uncovered
//! trapezoids maintained left to right, a set of extra obstacle trapezoids
//! and per-item-type copy counters. Children place one trapezoid set (one
//! item at one orientation) against a support of the skyline or of the
//! extra set.
//!
//! Every direction is an axis transform applied to the bin and the item
//! shapes so that the search always compacts left to right, bottom to top
//! in transformed coordinates; `to_solution` applies the inverse
//! transform.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

use rayon::prelude::*;

use shapepack_beam::BranchingScheme as BeamBranchingScheme;
use shapepack_geometry::clean::clean_shape;
use shapepack_geometry::eps::{equal, strictly_greater, strictly_lesser, EPSILON};
use shapepack_geometry::point::Point;
use shapepack_geometry::shape::Shape;
use shapepack_geometry::simplify::{simplify, SimplifyInputShape};
use shapepack_trapezoid::{polygon_trapezoidation, GeneralizedTrapezoid, TrapezoidationError};

use crate::instance::{Instance, Objective};
use crate::solution::{Solution, SolutionError};

/// Iteration caps of the placement walks.
const SETTLE_ITERATIONS: usize = 64;

/// Traversal orders; the first axis is the compaction axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    LeftToRightThenBottomToTop,
    LeftToRightThenTopToBottom,
    RightToLeftThenBottomToTop,
    RightToLeftThenTopToBottom,
    BottomToTopThenLeftToRight,
    BottomToTopThenRightToLeft,
    TopToBottomThenLeftToRight,
    TopToBottomThenRightToLeft,
    /// Direction chosen per bin when the instance has several bin types.
    Any,
}

pub const ALL_DIRECTIONS: [Direction; 8] = [
    Direction::LeftToRightThenBottomToTop,
    Direction::LeftToRightThenTopToBottom,
    Direction::RightToLeftThenBottomToTop,
    Direction::RightToLeftThenTopToBottom,
    Direction::BottomToTopThenLeftToRight,
    Direction::BottomToTopThenRightToLeft,
    Direction::TopToBottomThenLeftToRight,
    Direction::TopToBottomThenRightToLeft,
];

impl Direction {
    fn index(self) -> usize {
        match self {
            Direction::LeftToRightThenBottomToTop => 0,
            Direction::LeftToRightThenTopToBottom => 1,
            Direction::RightToLeftThenBottomToTop => 2,
            Direction::RightToLeftThenTopToBottom => 3,
            Direction::BottomToTopThenLeftToRight => 4,
            Direction::BottomToTopThenRightToLeft => 5,
            Direction::TopToBottomThenLeftToRight => 6,
            Direction::TopToBottomThenRightToLeft => 7,
            Direction::Any => 8,
        }
    }

    /// World to search coordinates.
    fn transform(self, p: Point) -> Point {
        match self {
            Direction::LeftToRightThenBottomToTop => Point::new(p.x, p.y),
            Direction::LeftToRightThenTopToBottom => Point::new(p.x, -p.y),
            Direction::RightToLeftThenBottomToTop => Point::new(-p.x, p.y),
            Direction::RightToLeftThenTopToBottom => Point::new(-p.x, -p.y),
            Direction::BottomToTopThenLeftToRight => Point::new(p.y, p.x),
            Direction::BottomToTopThenRightToLeft => Point::new(p.y, -p.x),
            Direction::TopToBottomThenLeftToRight => Point::new(-p.y, p.x),
            Direction::TopToBottomThenRightToLeft => Point::new(-p.y, -p.x),
            Direction::Any => p,
        }
    }

    /// Search to world coordinates.
    fn inverse_transform(self, p: Point) -> Point {
        match self {
            Direction::LeftToRightThenBottomToTop => Point::new(p.x, p.y),
            Direction::LeftToRightThenTopToBottom => Point::new(p.x, -p.y),
            Direction::RightToLeftThenBottomToTop => Point::new(-p.x, p.y),
            Direction::RightToLeftThenTopToBottom => Point::new(-p.x, -p.y),
            Direction::BottomToTopThenLeftToRight => Point::new(p.y, p.x),
            Direction::BottomToTopThenRightToLeft => Point::new(-p.y, p.x),
            Direction::TopToBottomThenLeftToRight => Point::new(p.y, -p.x),
            Direction::TopToBottomThenRightToLeft => Point::new(-p.y, -p.x),
            Direction::Any => p,
        }
    }

    /// True when the transform flips orientation.
    fn reverses_orientation(self) -> bool {
        matches!(
            self,
            Direction::LeftToRightThenTopToBottom
                | Direction::RightToLeftThenBottomToTop
                | Direction::BottomToTopThenLeftToRight
                | Direction::TopToBottomThenRightToLeft
        )
    }

    fn transform_shape(self, shape: &Shape) -> Shape {
        let mapped = Shape {
            elements: shape
                .elements
                .iter()
                .map(|element| shapepack_geometry::element::ShapeElement {
                    start: self.transform(element.start),
                    end: self.transform(element.end),
                    center: self.transform(element.center),
                    ..*element
                })
                .collect(),
        };
        if self.reverses_orientation() {
            mapped.reverse()
        } else {
            mapped
        }
    }
}

/// Contact configurations between an item-shape trapezoid and a supporting
/// trapezoid. The names identify which side or corner of each is in
/// contact; `Infeasible` is the sink of a placement walk that cannot
/// settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    ItemShapeTrapezoidRightSupportingTrapezoidBottomLeft,
    ItemShapeTrapezoidTopRightSupportingTrapezoidLeft,
    ItemShapeTrapezoidBottomRightSupportingTrapezoidLeft,
    ItemShapeTrapezoidRightSupportingTrapezoidTopLeft,
    ItemShapeTrapezoidBottomRightSupportingTrapezoidTop,
    ItemShapeTrapezoidLeftSupportingTrapezoidTopRight,
    ItemShapeTrapezoidTopLeftSupportingTrapezoidRight,
    ItemShapeTrapezoidBottomLeftSupportingTrapezoidRight,
    ItemShapeTrapezoidLeftSupportingTrapezoidBottomRight,
    Infeasible,
}

/// A skyline piece or an extra obstacle, tagged with its source.
#[derive(Debug, Clone, Copy)]
pub struct UncoveredTrapezoid {
    /// Item type of the inserted trapezoid, if any.
    pub item_type_id: Option<usize>,
    pub item_shape_pos: usize,
    pub item_shape_trapezoid_pos: usize,
    /// Defect of the bin, if any. Entries with neither tag come from the
    /// bin outline.
    pub defect_id: Option<usize>,
    pub trapezoid: GeneralizedTrapezoid,
}

impl UncoveredTrapezoid {
    fn wall(trapezoid: GeneralizedTrapezoid) -> Self {
        UncoveredTrapezoid {
            item_type_id: None,
            item_shape_pos: 0,
            item_shape_trapezoid_pos: 0,
            defect_id: None,
            trapezoid,
        }
    }

    fn defect(defect_id: usize, trapezoid: GeneralizedTrapezoid) -> Self {
        UncoveredTrapezoid {
            item_type_id: None,
            item_shape_pos: 0,
            item_shape_trapezoid_pos: 0,
            defect_id: Some(defect_id),
            trapezoid,
        }
    }

    fn item(
        item_type_id: usize,
        item_shape_pos: usize,
        item_shape_trapezoid_pos: usize,
        trapezoid: GeneralizedTrapezoid,
    ) -> Self {
        UncoveredTrapezoid {
            item_type_id: Some(item_type_id),
            item_shape_pos,
            item_shape_trapezoid_pos,
            defect_id: None,
            trapezoid,
        }
    }

    fn with_trapezoid(&self, trapezoid: GeneralizedTrapezoid) -> Self {
        UncoveredTrapezoid { trapezoid, ..*self }
    }
}

/// One item type at one orientation, decomposed into trapezoids in search
/// coordinates.
#[derive(Debug, Clone)]
pub struct TrapezoidSet {
    pub item_type_id: usize,
    /// Rotation angle in radians (world).
    pub angle: f64,
    pub mirror: bool,
    /// Non-inflated trapezoids, one list per item sub-region.
    pub shapes: Vec<Vec<GeneralizedTrapezoid>>,
    /// Inflated trapezoids, one list per item sub-region.
    pub shapes_inflated: Vec<Vec<GeneralizedTrapezoid>>,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

/// Bin data precomputed for one direction.
#[derive(Debug, Clone)]
struct BranchingSchemeBinType {
    /// Bounding box of the usable region in search coordinates.
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    /// Border and defect obstacles (defects carry their id).
    obstacles: Vec<UncoveredTrapezoid>,
    /// Defect types, indexed by defect id.
    defect_types: Vec<usize>,
}

/// All per-direction data.
#[derive(Debug, Clone)]
struct DirectionData {
    bin_types: Vec<BranchingSchemeBinType>,
    trapezoid_sets: Vec<TrapezoidSet>,
}

/// A placement: which trapezoid set, anchored where.
#[derive(Debug, Clone, Copy)]
pub struct Insertion {
    pub trapezoid_set_id: usize,
    pub item_shape_pos: usize,
    pub item_shape_trapezoid_pos: usize,
    /// `Some` when the placement opens a new bin in that direction.
    pub new_bin_direction: Option<Direction>,
    /// Translation applied to the trapezoid set, in search coordinates.
    pub x: f64,
    pub y: f64,
    /// Vertical extent of the inserted set.
    pub ys: f64,
    pub ye: f64,
    /// Contact configuration that produced the anchor.
    pub state: State,
}

/// A node of the branching tree.
pub struct Node {
    pub id: usize,
    pub parent: Option<Rc<Node>>,

    /// Insertion that produced this node (`None` for the root).
    pub insertion: Option<Insertion>,

    /// Direction of the bin currently being filled.
    pub last_bin_direction: Direction,

    /// Skyline of the current bin, ordered bottom to top.
    pub uncovered_trapezoids: Vec<UncoveredTrapezoid>,

    /// Obstacles of the current bin that are not part of the skyline.
    pub extra_trapezoids: Vec<UncoveredTrapezoid>,

    /// Skyline over all inserted item trapezoids, used by the guides.
    pub all_trapezoids_skyline: Vec<UncoveredTrapezoid>,

    /// Packed copies per item type.
    pub item_number_of_copies: Vec<usize>,

    pub number_of_bins: usize,
    pub number_of_items: usize,
    /// Scaled packed item area.
    pub item_area: f64,
    /// Scaled sum of the convex hull areas of the packed items.
    pub item_convex_hull_area: f64,
    pub profit: f64,
    pub cost: f64,
    /// Scaled leftover value of the current bin.
    pub leftover_value: f64,
    /// Scaled area used by the guides.
    pub guide_area: f64,
    pub xe_max: f64,
    pub ye_max: f64,
    pub xs_max: f64,

    /// Memoized children placements.
    children_insertions: RefCell<Option<Vec<Insertion>>>,
}

/// Branching scheme parameters.
#[derive(Debug, Clone)]
pub struct Parameters {
    pub guide_id: usize,
    pub direction: Direction,
    /// Area budget of the shape simplification, as a ratio of the smaller
    /// of total item area and total bin area. Zero disables it.
    pub maximum_approximation_ratio: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            guide_id: 0,
            direction: Direction::LeftToRightThenBottomToTop,
            maximum_approximation_ratio: 0.0,
        }
    }
}

/// The branching scheme: per-direction precomputed geometry plus the
/// placement machinery.
pub struct BranchingScheme {
    instance: Arc<Instance>,
    parameters: Parameters,
    directions: Vec<Direction>,
    data: Vec<Option<DirectionData>>,
    node_id: Cell<usize>,
}

impl BranchingScheme {
    pub fn new(
        instance: Arc<Instance>,
        parameters: Parameters,
    ) -> Result<Self, TrapezoidationError> {
        let directions: Vec<Direction> = if parameters.direction == Direction::Any {
            ALL_DIRECTIONS.to_vec()
        } else {
            vec![parameters.direction]
        };

        // Optionally simplify the inflated boundaries before decomposing
        // them; outer boundaries may only grow and the bin region only
        // shrink, so feasibility stays conservative.
        let simplified = simplified_polygons(&instance, parameters.maximum_approximation_ratio);

        let data_entries: Vec<(usize, DirectionData)> = directions
            .par_iter()
            .map(|&direction| {
                build_direction_data(&instance, &simplified, direction)
                    .map(|data| (direction.index(), data))
            })
            .collect::<Result<Vec<_>, TrapezoidationError>>()?;

        let mut data: Vec<Option<DirectionData>> = (0..8).map(|_| None).collect();
        for (index, entry) in data_entries {
            data[index] = Some(entry);
        }

        Ok(BranchingScheme {
            instance,
            parameters,
            directions,
            data,
            node_id: Cell::new(0),
        })
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    fn direction_data(&self, direction: Direction) -> &DirectionData {
        self.data[direction.index()]
            .as_ref()
            .expect("direction data was precomputed for every usable direction")
    }

    fn next_node_id(&self) -> usize {
        let id = self.node_id.get();
        self.node_id.set(id + 1);
        id
    }

    fn mean_item_area(&self, node: &Node) -> f64 {
        node.item_area / node.number_of_items as f64
    }

    /// Placements available from `parent`, memoized on first expansion.
    pub fn insertions(&self, parent: &Node) -> Vec<Insertion> {
        if let Some(insertions) = parent.children_insertions.borrow().as_ref() {
            return insertions.clone();
        }
        let mut insertions: Vec<Insertion> = Vec::new();
        let mut seen: HashSet<(usize, i64, i64)> = HashSet::new();

        if parent.number_of_bins > 0 {
            let direction = parent.last_bin_direction;
            let data = self.direction_data(direction);
            let bin_type_id = self.instance.bin_type_id(parent.number_of_bins - 1);
            let bin = &data.bin_types[bin_type_id];
            self.insertions_into_bin(
                parent,
                data,
                bin,
                &parent.uncovered_trapezoids,
                &parent.extra_trapezoids,
                None,
                &mut insertions,
                &mut seen,
            );
        }

        // Open a new bin when nothing fits in the last one (or for the
        // root).
        if insertions.is_empty() && parent.number_of_bins < self.instance.number_of_bins() {
            let bin_type_id = self.instance.bin_type_id(parent.number_of_bins);
            for &direction in &self.directions {
                let data = self.direction_data(direction);
                let bin = &data.bin_types[bin_type_id];
                let skyline = initial_skyline(bin);
                self.insertions_into_bin(
                    parent,
                    data,
                    bin,
                    &skyline,
                    &bin.obstacles,
                    Some(direction),
                    &mut insertions,
                    &mut seen,
                );
            }
        }

        *parent.children_insertions.borrow_mut() = Some(insertions.clone());
        insertions
    }

    #[allow(clippy::too_many_arguments)]
    fn insertions_into_bin(
        &self,
        parent: &Node,
        data: &DirectionData,
        bin: &BranchingSchemeBinType,
        skyline: &[UncoveredTrapezoid],
        extras: &[UncoveredTrapezoid],
        new_bin_direction: Option<Direction>,
        insertions: &mut Vec<Insertion>,
        seen: &mut HashSet<(usize, i64, i64)>,
    ) {
        let x_frontier_min = skyline_frontier_min(skyline);
        for (trapezoid_set_id, set) in data.trapezoid_sets.iter().enumerate() {
            let item_type = self.instance.item_type(set.item_type_id);
            if parent.item_number_of_copies[set.item_type_id] >= item_type.copies {
                continue;
            }
            for (item_shape_pos, trapezoids) in set.shapes_inflated.iter().enumerate() {
                for (trapezoid_pos, reference) in trapezoids.iter().enumerate() {
                    for support in skyline.iter().chain(extras.iter()) {
                        for (state, anchor) in self.candidate_anchors(
                            bin,
                            set,
                            reference,
                            support,
                            skyline,
                            extras,
                            x_frontier_min,
                        ) {
                            let key = (
                                trapezoid_set_id,
                                (anchor.x / 1e-4).round() as i64,
                                (anchor.y / 1e-4).round() as i64,
                            );
                            if !seen.insert(key) {
                                continue;
                            }
                            let (ys, ye) = set_extent(set, anchor);
                            insertions.push(Insertion {
                                trapezoid_set_id,
                                item_shape_pos,
                                item_shape_trapezoid_pos: trapezoid_pos,
                                new_bin_direction,
                                x: anchor.x,
                                y: anchor.y,
                                ys,
                                ye,
                                state,
                            });
                        }
                    }
                }
            }
        }
    }

    /// Anchors produced by the contact configurations of one
    /// (item-trapezoid, support) pair.
    ///
    /// No anchor may reach left of `x_frontier_min`: extra obstacles behind
    /// the frontier have been dropped, so that region is off limits.
    #[allow(clippy::too_many_arguments)]
    fn candidate_anchors(
        &self,
        bin: &BranchingSchemeBinType,
        set: &TrapezoidSet,
        reference: &GeneralizedTrapezoid,
        support: &UncoveredTrapezoid,
        skyline: &[UncoveredTrapezoid],
        extras: &[UncoveredTrapezoid],
        x_frontier_min: f64,
    ) -> Vec<(State, Point)> {
        let s = &support.trapezoid;
        let t = reference;
        let mut anchors: Vec<(State, Point)> = Vec::new();

        let try_settled = |state: State, dy: f64, dx0: f64, anchors: &mut Vec<(State, Point)>| {
            if !self.set_fits_vertically(bin, set, dy) {
                return;
            }
            let dx0 = dx0.max(x_frontier_min - set.x_min);
            if let Some(dx) =
                self.settle(bin, set, skyline, extras, dx0, dy)
            {
                anchors.push((state, Point::new(dx, dy)));
            }
        };

        let try_exact = |state: State, dy: f64, dx0: f64, anchors: &mut Vec<(State, Point)>| {
            if !self.set_fits_vertically(bin, set, dy) {
                return;
            }
            if dx0 + set.x_min < x_frontier_min - EPSILON {
                return;
            }
            if self.set_fits(bin, set, skyline, extras, dx0, dy) {
                anchors.push((state, Point::new(dx0, dy)));
            }
        };

        // Beside the support, resting against its right side.
        {
            let dy = s.y_bottom() - t.y_bottom();
            if let Some(dx0) = snap_left_to_right(t, s, dy) {
                try_settled(
                    State::ItemShapeTrapezoidLeftSupportingTrapezoidBottomRight,
                    dy,
                    dx0,
                    &mut anchors,
                );
            }
        }
        {
            let dy = s.y_top() - t.y_top();
            if let Some(dx0) = snap_left_to_right(t, s, dy) {
                try_settled(
                    State::ItemShapeTrapezoidTopLeftSupportingTrapezoidRight,
                    dy,
                    dx0,
                    &mut anchors,
                );
            }
        }

        // Sliding up the ascending right side of the support.
        if s.right_side_increasing_not_vertical() {
            let dy = s.y_bottom() - t.y_bottom();
            if let Some(dx0) = snap_left_to_right(t, s, dy) {
                let dx0 = dx0.max(x_frontier_min - set.x_min);
                let slope = 1.0 / s.a_right();
                if let Some(anchor) =
                    self.slide(bin, set, skyline, extras, dx0, dy, slope, s.y_top())
                {
                    anchors.push((
                        State::ItemShapeTrapezoidBottomLeftSupportingTrapezoidRight,
                        anchor,
                    ));
                }
            }
        }

        // On top of the support.
        {
            let dy = s.y_top() - t.y_bottom();
            try_settled(
                State::ItemShapeTrapezoidBottomRightSupportingTrapezoidTop,
                dy,
                s.x_top_left() - t.x_bottom_left(),
                &mut anchors,
            );
            try_settled(
                State::ItemShapeTrapezoidLeftSupportingTrapezoidTopRight,
                dy,
                s.x_top_right() - t.x_bottom_left(),
                &mut anchors,
            );
            try_exact(
                State::ItemShapeTrapezoidRightSupportingTrapezoidTopLeft,
                dy,
                s.x_top_left() - t.x_bottom_right(),
                &mut anchors,
            );
        }

        // Tucked left of the support, resting against its left side.
        {
            let dy = s.y_bottom() - t.y_bottom();
            if let Some(dx0) = snap_right_to_left(t, s, dy) {
                try_exact(
                    State::ItemShapeTrapezoidBottomRightSupportingTrapezoidLeft,
                    dy,
                    dx0,
                    &mut anchors,
                );
            }
        }
        {
            let dy = s.y_top() - t.y_top();
            if let Some(dx0) = snap_right_to_left(t, s, dy) {
                try_exact(
                    State::ItemShapeTrapezoidTopRightSupportingTrapezoidLeft,
                    dy,
                    dx0,
                    &mut anchors,
                );
            }
        }

        // Sliding up the ascending left side of the support (disabled when
        // the left side is vertical).
        if s.left_side_increasing_not_vertical() {
            let dy = s.y_bottom() - t.y_bottom();
            if let Some(dx0) = snap_right_to_left(t, s, dy) {
                if dx0 + set.x_min >= x_frontier_min - EPSILON {
                    let slope = 1.0 / s.a_left();
                    if let Some(anchor) =
                        self.slide(bin, set, skyline, extras, dx0, dy, slope, s.y_top())
                    {
                        anchors.push((
                            State::ItemShapeTrapezoidRightSupportingTrapezoidBottomLeft,
                            anchor,
                        ));
                    }
                }
            }
        }

        anchors
    }

    /// True when the whole translated set stays within the vertical range
    /// of the bin.
    fn set_fits_vertically(&self, bin: &BranchingSchemeBinType, set: &TrapezoidSet, dy: f64) -> bool {
        set.y_min + dy >= bin.y_min - EPSILON && set.y_max + dy <= bin.y_max + EPSILON
    }

    /// Fixed point of the push-to-the-right resolution: shift the set
    /// right until it overlaps no obstacle, or give up.
    fn settle(
        &self,
        bin: &BranchingSchemeBinType,
        set: &TrapezoidSet,
        skyline: &[UncoveredTrapezoid],
        extras: &[UncoveredTrapezoid],
        mut dx: f64,
        dy: f64,
    ) -> Option<f64> {
        for _ in 0..SETTLE_ITERATIONS {
            let shift = self.required_right_shift(bin, set, skyline, extras, dx, dy);
            if shift <= EPSILON {
                if set.x_max + dx > bin.x_max + EPSILON {
                    return None;
                }
                return Some(dx);
            }
            dx += shift;
            if set.x_min + dx > bin.x_max {
                return None;
            }
        }
        None
    }

    /// Slide the set along a line of the given slope until it overlaps no
    /// obstacle, staying below `y_limit`.
    #[allow(clippy::too_many_arguments)]
    fn slide(
        &self,
        bin: &BranchingSchemeBinType,
        set: &TrapezoidSet,
        skyline: &[UncoveredTrapezoid],
        extras: &[UncoveredTrapezoid],
        mut dx: f64,
        mut dy: f64,
        slope: f64,
        y_limit: f64,
    ) -> Option<Point> {
        for _ in 0..SETTLE_ITERATIONS {
            if !self.set_fits_vertically(bin, set, dy) {
                return None;
            }
            let mut shift: f64 = 0.0;
            for (item_shape_pos, trapezoids) in set.shapes_inflated.iter().enumerate() {
                for trapezoid in trapezoids {
                    let placed = trapezoid.translate(dx, dy);
                    for obstacle in skyline.iter().chain(extras.iter()) {
                        if self.obstacle_allowed(bin, set, item_shape_pos, obstacle) {
                            continue;
                        }
                        if placed.intersects(&obstacle.trapezoid) {
                            shift =
                                shift.max(placed.compute_top_right_shift(&obstacle.trapezoid, slope));
                        }
                    }
                }
            }
            if shift <= EPSILON {
                if set.x_max + dx > bin.x_max + EPSILON {
                    return None;
                }
                return Some(Point::new(dx, dy));
            }
            dx += shift;
            dy += shift * slope;
            // Contact with the sloped side is lost past its top.
            if set.y_min + dy > y_limit + EPSILON {
                return None;
            }
        }
        None
    }

    /// Largest right shift required to clear some obstacle, zero when the
    /// position is feasible.
    #[allow(clippy::too_many_arguments)]
    fn required_right_shift(
        &self,
        bin: &BranchingSchemeBinType,
        set: &TrapezoidSet,
        skyline: &[UncoveredTrapezoid],
        extras: &[UncoveredTrapezoid],
        dx: f64,
        dy: f64,
    ) -> f64 {
        let mut shift: f64 = 0.0;
        for (item_shape_pos, trapezoids) in set.shapes_inflated.iter().enumerate() {
            for trapezoid in trapezoids {
                let placed = trapezoid.translate(dx, dy);
                for obstacle in skyline.iter().chain(extras.iter()) {
                    if self.obstacle_allowed(bin, set, item_shape_pos, obstacle) {
                        continue;
                    }
                    shift = shift.max(placed.compute_right_shift_if_intersects(&obstacle.trapezoid));
                }
            }
        }
        shift
    }

    #[allow(clippy::too_many_arguments)]
    fn set_fits(
        &self,
        bin: &BranchingSchemeBinType,
        set: &TrapezoidSet,
        skyline: &[UncoveredTrapezoid],
        extras: &[UncoveredTrapezoid],
        dx: f64,
        dy: f64,
    ) -> bool {
        if set.x_max + dx > bin.x_max + EPSILON {
            return false;
        }
        self.required_right_shift(bin, set, skyline, extras, dx, dy) <= EPSILON
    }

    /// A defect obstacle does not constrain an item sub-region whose
    /// quality rule allows the defect type.
    fn obstacle_allowed(
        &self,
        bin: &BranchingSchemeBinType,
        set: &TrapezoidSet,
        item_shape_pos: usize,
        obstacle: &UncoveredTrapezoid,
    ) -> bool {
        let Some(defect_id) = obstacle.defect_id else {
            return false;
        };
        let item_type = self.instance.item_type(set.item_type_id);
        let quality_rule = item_type.shapes[item_shape_pos].quality_rule;
        self.instance
            .can_contain(quality_rule, bin.defect_types[defect_id])
    }

    /// Root node: nothing placed, no bin opened.
    pub fn root_node(&self) -> Node {
        Node {
            id: self.next_node_id(),
            parent: None,
            insertion: None,
            last_bin_direction: self.directions[0],
            uncovered_trapezoids: Vec::new(),
            extra_trapezoids: Vec::new(),
            all_trapezoids_skyline: Vec::new(),
            item_number_of_copies: vec![0; self.instance.number_of_item_types()],
            number_of_bins: 0,
            number_of_items: 0,
            item_area: 0.0,
            item_convex_hull_area: 0.0,
            profit: 0.0,
            cost: 0.0,
            leftover_value: 0.0,
            guide_area: 0.0,
            xe_max: f64::NEG_INFINITY,
            ye_max: f64::NEG_INFINITY,
            xs_max: f64::NEG_INFINITY,
            children_insertions: RefCell::new(None),
        }
    }

    /// Build the child node of `parent` for one insertion.
    pub fn child_node(&self, parent: &Rc<Node>, insertion: &Insertion) -> Node {
        let (direction, bin_pos, mut skyline, mut extras, mut all_skyline) =
            match insertion.new_bin_direction {
                Some(direction) => {
                    let data = self.direction_data(direction);
                    let bin_type_id = self.instance.bin_type_id(parent.number_of_bins);
                    let bin = &data.bin_types[bin_type_id];
                    (
                        direction,
                        parent.number_of_bins,
                        initial_skyline(bin),
                        bin.obstacles.clone(),
                        initial_skyline(bin),
                    )
                }
                None => (
                    parent.last_bin_direction,
                    parent.number_of_bins - 1,
                    parent.uncovered_trapezoids.clone(),
                    parent.extra_trapezoids.clone(),
                    parent.all_trapezoids_skyline.clone(),
                ),
            };
        let data = self.direction_data(direction);
        let bin_type_id = self.instance.bin_type_id(bin_pos);
        let bin = &data.bin_types[bin_type_id];
        let set = &data.trapezoid_sets[insertion.trapezoid_set_id];
        let item_type = self.instance.item_type(set.item_type_id);

        let new_bin = insertion.new_bin_direction.is_some();
        let mut xe_max = if new_bin {
            f64::NEG_INFINITY
        } else {
            parent.xe_max
        };
        let mut ye_max = if new_bin {
            f64::NEG_INFINITY
        } else {
            parent.ye_max
        };
        let mut xs = f64::INFINITY;

        for (item_shape_pos, trapezoids) in set.shapes_inflated.iter().enumerate() {
            for (trapezoid_pos, trapezoid) in trapezoids.iter().enumerate() {
                let placed = trapezoid.translate(insertion.x, insertion.y).clean();
                let piece = UncoveredTrapezoid::item(
                    set.item_type_id,
                    item_shape_pos,
                    trapezoid_pos,
                    placed,
                );
                let (new_skyline, bumped) = add_trapezoid_to_skyline(&skyline, &piece);
                skyline = new_skyline;
                // Truncated skyline pieces keep blocking placements; plain
                // outline walls have zero width and block nothing.
                extras.extend(
                    bumped
                        .into_iter()
                        .filter(|p| p.item_type_id.is_some() || p.defect_id.is_some()),
                );
                let (new_all, _) = add_trapezoid_to_skyline(&all_skyline, &piece);
                all_skyline = new_all;
                xe_max = xe_max.max(placed.x_max());
                ye_max = ye_max.max(placed.y_top());
                xs = xs.min(placed.x_min());
            }
        }

        // Extra obstacles now fully to the left of the uncovered frontier
        // are out of reach of any further placement in this direction:
        // candidate anchors never land left of the frontier minimum.
        let x_frontier_min = skyline_frontier_min(&skyline);
        extras.retain(|extra| strictly_greater(extra.trapezoid.x_max(), x_frontier_min));

        let mut item_number_of_copies = parent.item_number_of_copies.clone();
        item_number_of_copies[set.item_type_id] += 1;

        let number_of_bins = if new_bin {
            parent.number_of_bins + 1
        } else {
            parent.number_of_bins
        };
        let cost = if new_bin {
            parent.cost + self.instance.bin_type(bin_type_id).cost
        } else {
            parent.cost
        };

        let guide_area = self.instance.previous_bin_area(bin_pos)
            + swept_area(&all_skyline, bin.x_min);

        let bin_bbox_area = (bin.x_max - bin.x_min) * (bin.y_max - bin.y_min);
        let leftover_value =
            (bin_bbox_area - (xe_max - bin.x_min) * (bin.y_max - bin.y_min)).max(0.0);

        Node {
            id: self.next_node_id(),
            parent: Some(Rc::clone(parent)),
            insertion: Some(*insertion),
            last_bin_direction: direction,
            uncovered_trapezoids: skyline,
            extra_trapezoids: extras,
            all_trapezoids_skyline: all_skyline,
            item_number_of_copies,
            number_of_bins,
            number_of_items: parent.number_of_items + 1,
            item_area: parent.item_area + item_type.area_scaled,
            item_convex_hull_area: parent.item_convex_hull_area
                + item_type.convex_hull_area_scaled,
            profit: parent.profit + item_type.profit,
            cost,
            leftover_value,
            guide_area,
            xe_max,
            ye_max,
            xs_max: if new_bin {
                xs
            } else {
                parent.xs_max.max(xs)
            },
            children_insertions: RefCell::new(None),
        }
    }

    /// Convert the node into a solution by walking its path to the root.
    pub fn to_solution(&self, node: &Rc<Node>) -> Result<Solution, SolutionError> {
        let mut path: Vec<Rc<Node>> = Vec::new();
        let mut current = Some(Rc::clone(node));
        while let Some(n) = current {
            current = n.parent.clone();
            path.push(n);
        }
        path.reverse();

        let scale = self.instance.scale();
        let mut solution = Solution::new(Arc::clone(&self.instance));
        let mut bin_pos: Option<usize> = None;
        let mut bins_opened = 0;
        for n in &path {
            let Some(insertion) = &n.insertion else {
                continue;
            };
            if insertion.new_bin_direction.is_some() {
                let bin_type_id = self.instance.bin_type_id(bins_opened);
                bin_pos = Some(solution.add_bin(bin_type_id, 1)?);
                bins_opened += 1;
            }
            let direction = n.last_bin_direction;
            let data = self.direction_data(direction);
            let set = &data.trapezoid_sets[insertion.trapezoid_set_id];
            let translation_scaled =
                direction.inverse_transform(Point::new(insertion.x, insertion.y));
            let bl_corner = Point::new(
                translation_scaled.x / scale,
                translation_scaled.y / scale,
            );
            solution.add_item(
                bin_pos.expect("an item insertion always follows a bin opening"),
                set.item_type_id,
                bl_corner,
                set.angle,
                set.mirror,
            )?;
        }
        Ok(solution)
    }
}

/// Initial skyline of a bin: a zero-width wall along the left side of its
/// bounding box.
fn initial_skyline(bin: &BranchingSchemeBinType) -> Vec<UncoveredTrapezoid> {
    vec![UncoveredTrapezoid::wall(GeneralizedTrapezoid::new(
        bin.y_min, bin.y_max, bin.x_min, bin.x_min, bin.x_min, bin.x_min,
    ))]
}

/// Vertical extent of a translated set.
fn set_extent(set: &TrapezoidSet, anchor: Point) -> (f64, f64) {
    (set.y_min + anchor.y, set.y_max + anchor.y)
}

/// Leftmost x of the uncovered region: the minimum over the skyline of
/// the right (frontier) side of its pieces.
fn skyline_frontier_min(skyline: &[UncoveredTrapezoid]) -> f64 {
    skyline
        .iter()
        .map(|piece| {
            piece
                .trapezoid
                .x_bottom_right()
                .min(piece.trapezoid.x_top_right())
        })
        .fold(f64::INFINITY, f64::min)
}

/// Smallest translation that puts the left side of `t` (shifted
/// vertically by `dy`) against the right side of `s`; `None` when the
/// vertical bands do not overlap.
fn snap_left_to_right(t: &GeneralizedTrapezoid, s: &GeneralizedTrapezoid, dy: f64) -> Option<f64> {
    let yb = (t.y_bottom() + dy).max(s.y_bottom());
    let yt = (t.y_top() + dy).min(s.y_top());
    if !strictly_lesser(yb, yt) {
        return None;
    }
    let shift_bottom = s.x_right(yb) - t.x_left(yb - dy);
    let shift_top = s.x_right(yt) - t.x_left(yt - dy);
    Some(shift_bottom.max(shift_top))
}

/// Largest translation that keeps the right side of `t` against the left
/// side of `s`; `None` when the vertical bands do not overlap.
fn snap_right_to_left(t: &GeneralizedTrapezoid, s: &GeneralizedTrapezoid, dy: f64) -> Option<f64> {
    let yb = (t.y_bottom() + dy).max(s.y_bottom());
    let yt = (t.y_top() + dy).min(s.y_top());
    if !strictly_lesser(yb, yt) {
        return None;
    }
    let shift_bottom = s.x_left(yb) - t.x_right(yb - dy);
    let shift_top = s.x_left(yt) - t.x_right(yt - dy);
    Some(shift_bottom.min(shift_top))
}

/// Replace the vertical band of `piece` in the skyline; portions of older
/// pieces inside the band are returned for the caller to keep as extra
/// obstacles.
fn add_trapezoid_to_skyline(
    skyline: &[UncoveredTrapezoid],
    piece: &UncoveredTrapezoid,
) -> (Vec<UncoveredTrapezoid>, Vec<UncoveredTrapezoid>) {
    let nb = piece.trapezoid.y_bottom();
    let nt = piece.trapezoid.y_top();
    let mut result: Vec<UncoveredTrapezoid> = Vec::with_capacity(skyline.len() + 2);
    let mut bumped: Vec<UncoveredTrapezoid> = Vec::new();
    let mut inserted = false;

    for old in skyline {
        let p = &old.trapezoid;
        if p.y_top() <= nb + EPSILON {
            result.push(*old);
            continue;
        }
        if p.y_bottom() >= nt - EPSILON {
            if !inserted {
                result.push(*piece);
                inserted = true;
            }
            result.push(*old);
            continue;
        }
        // The old piece overlaps the band of the new one.
        if p.y_bottom() < nb - EPSILON {
            result.push(old.with_trapezoid(p.clip_y(p.y_bottom(), nb)));
        }
        if !inserted {
            result.push(*piece);
            inserted = true;
        }
        let overlap_bottom = p.y_bottom().max(nb);
        let overlap_top = p.y_top().min(nt);
        if overlap_top - overlap_bottom > EPSILON {
            bumped.push(old.with_trapezoid(p.clip_y(overlap_bottom, overlap_top)));
        }
        if p.y_top() > nt + EPSILON {
            result.push(old.with_trapezoid(p.clip_y(nt, p.y_top())));
        }
    }
    if !inserted {
        result.push(*piece);
    }
    (result, bumped)
}

/// Area between `x_ref` and the skyline profile.
fn swept_area(skyline: &[UncoveredTrapezoid], x_ref: f64) -> f64 {
    skyline
        .iter()
        .map(|piece| {
            let t = &piece.trapezoid;
            let width_bottom = t.x_bottom_right() - x_ref;
            let width_top = t.x_top_right() - x_ref;
            (width_bottom + width_top) * t.height() / 2.0
        })
        .sum()
}

/// Simplified inflated polygons of the instance, used to build the
/// trapezoid sets.
struct SimplifiedPolygons {
    /// Per item type, per sub-region: inflated outer boundary.
    item_shapes_inflated: Vec<Vec<Shape>>,
    /// Per bin type: usable region.
    bin_regions: Vec<Shape>,
    /// Per bin type, per defect: inflated outer boundary.
    defects_inflated: Vec<Vec<Shape>>,
}

fn simplified_polygons(instance: &Instance, maximum_approximation_ratio: f64) -> SimplifiedPolygons {
    let mut item_shapes_inflated: Vec<Vec<Shape>> = instance
        .item_types()
        .iter()
        .map(|item_type| {
            item_type
                .shapes
                .iter()
                .map(|item_shape| item_shape.shape_inflated.shape.clone())
                .collect()
        })
        .collect();
    let mut bin_regions: Vec<Shape> = instance
        .bin_types()
        .iter()
        .map(|bin_type| bin_type.shape_inflated.clone())
        .collect();
    let mut defects_inflated: Vec<Vec<Shape>> = instance
        .bin_types()
        .iter()
        .map(|bin_type| {
            bin_type
                .defects
                .iter()
                .map(|defect| defect.shape_inflated.shape.clone())
                .collect()
        })
        .collect();

    if maximum_approximation_ratio <= 0.0 {
        return SimplifiedPolygons {
            item_shapes_inflated,
            bin_regions,
            defects_inflated,
        };
    }

    // One flat batch, keyed back to its owner after simplification.
    let mut inputs: Vec<SimplifyInputShape> = Vec::new();
    let mut keys: Vec<(usize, usize, u8)> = Vec::new();
    for (item_type_id, shapes) in item_shapes_inflated.iter().enumerate() {
        let copies = instance.item_type(item_type_id).copies;
        for (shape_pos, shape) in shapes.iter().enumerate() {
            inputs.push(SimplifyInputShape {
                shape: shape.clone(),
                copies,
                outer: true,
            });
            keys.push((item_type_id, shape_pos, 0));
        }
    }
    for (bin_type_id, region) in bin_regions.iter().enumerate() {
        inputs.push(SimplifyInputShape {
            shape: region.clone(),
            copies: instance.bin_type(bin_type_id).copies,
            outer: false,
        });
        keys.push((bin_type_id, 0, 1));
    }
    for (bin_type_id, defects) in defects_inflated.iter().enumerate() {
        let copies = instance.bin_type(bin_type_id).copies;
        for (defect_id, defect) in defects.iter().enumerate() {
            inputs.push(SimplifyInputShape {
                shape: defect.clone(),
                copies,
                outer: true,
            });
            keys.push((bin_type_id, defect_id, 2));
        }
    }

    let budget = maximum_approximation_ratio
        * instance.item_area_scaled().min(instance.bin_area_scaled());
    let outputs = simplify(&inputs, budget);
    for (output, key) in outputs.into_iter().zip(keys) {
        let shape = clean_shape(&output.shape);
        match key.2 {
            0 => item_shapes_inflated[key.0][key.1] = shape,
            1 => bin_regions[key.0] = shape,
            _ => defects_inflated[key.0][key.1] = shape,
        }
    }

    SimplifiedPolygons {
        item_shapes_inflated,
        bin_regions,
        defects_inflated,
    }
}

/// Sampled discrete angles of an item type: a degenerate interval yields
/// its angle, a continuous interval four evenly spaced angles.
fn sampled_angles(item_type: &crate::instance::ItemType) -> Vec<f64> {
    let mut angles: Vec<f64> = Vec::new();
    for &(start, end) in &item_type.allowed_rotations {
        if start == end {
            angles.push(start);
        } else {
            for k in 0..4 {
                angles.push(start + (end - start) * k as f64 / 3.0);
            }
        }
    }
    angles.dedup_by(|a, b| equal(*a, *b));
    angles
}

fn build_direction_data(
    instance: &Instance,
    simplified: &SimplifiedPolygons,
    direction: Direction,
) -> Result<DirectionData, TrapezoidationError> {
    // Bin types.
    let mut bin_types: Vec<BranchingSchemeBinType> = Vec::new();
    for (bin_type_id, bin_type) in instance.bin_types().iter().enumerate() {
        let region = clean_shape(&direction.transform_shape(&simplified.bin_regions[bin_type_id]));
        let (mn, mx) = region.compute_min_max(0.0, false);

        let mut obstacles: Vec<UncoveredTrapezoid> = Vec::new();
        // Borders: the complement of the usable region within a slightly
        // grown bounding box.
        if !region.is_rectangle() {
            let margin = 10.0;
            let frame = Shape::polygon(&[
                (mn.x - margin, mn.y - margin),
                (mx.x + margin, mn.y - margin),
                (mx.x + margin, mx.y + margin),
                (mn.x - margin, mx.y + margin),
            ]);
            for trapezoid in polygon_trapezoidation(&frame, &[region.clone()])? {
                obstacles.push(UncoveredTrapezoid::wall(trapezoid.clean()));
            }
        }

        let mut defect_types: Vec<usize> = Vec::new();
        for (defect_id, defect) in bin_type.defects.iter().enumerate() {
            defect_types.push(defect.defect_type);
            let outer = clean_shape(
                &direction.transform_shape(&simplified.defects_inflated[bin_type_id][defect_id]),
            );
            let holes: Vec<Shape> = defect
                .shape_inflated
                .holes
                .iter()
                .map(|hole| clean_shape(&direction.transform_shape(hole)))
                .collect();
            for trapezoid in polygon_trapezoidation(&outer, &holes)? {
                obstacles.push(UncoveredTrapezoid::defect(defect_id, trapezoid.clean()));
            }
        }

        bin_types.push(BranchingSchemeBinType {
            x_min: mn.x,
            x_max: mx.x,
            y_min: mn.y,
            y_max: mx.y,
            obstacles,
            defect_types,
        });
    }

    // Trapezoid sets: one per (item type, angle, mirror).
    let mut trapezoid_sets: Vec<TrapezoidSet> = Vec::new();
    for (item_type_id, item_type) in instance.item_types().iter().enumerate() {
        let mirrors: &[bool] = if item_type.allow_mirroring {
            &[false, true]
        } else {
            &[false]
        };
        for angle in sampled_angles(item_type) {
            for &mirror in mirrors {
                let mut shapes: Vec<Vec<GeneralizedTrapezoid>> = Vec::new();
                let mut shapes_inflated: Vec<Vec<GeneralizedTrapezoid>> = Vec::new();
                let mut x_min = f64::INFINITY;
                let mut x_max = f64::NEG_INFINITY;
                let mut y_min = f64::INFINITY;
                let mut y_max = f64::NEG_INFINITY;
                for (shape_pos, item_shape) in item_type.shapes.iter().enumerate() {
                    // Non-inflated trapezoids, for the defect quality
                    // checks and the approximation accounting.
                    let scaled = item_shape
                        .shape_scaled
                        .shape
                        .approximate_by_line_segments(100, false);
                    let oriented =
                        orient_shape(&scaled, angle, mirror, direction);
                    let holes: Vec<Shape> = item_shape
                        .shape_scaled
                        .holes
                        .iter()
                        .map(|hole| {
                            orient_shape(
                                &hole.approximate_by_line_segments(100, false),
                                angle,
                                mirror,
                                direction,
                            )
                        })
                        .collect();
                    shapes.push(
                        polygon_trapezoidation(&oriented, &holes)?
                            .into_iter()
                            .map(|t| t.clean())
                            .collect(),
                    );

                    // Inflated trapezoids, the ones actually placed.
                    let inflated = orient_shape(
                        &simplified.item_shapes_inflated[item_type_id][shape_pos],
                        angle,
                        mirror,
                        direction,
                    );
                    let holes_inflated: Vec<Shape> = item_shape
                        .shape_inflated
                        .holes
                        .iter()
                        .map(|hole| orient_shape(hole, angle, mirror, direction))
                        .collect();
                    let trapezoids: Vec<GeneralizedTrapezoid> =
                        polygon_trapezoidation(&inflated, &holes_inflated)?
                            .into_iter()
                            .map(|t| t.clean())
                            .collect();
                    for trapezoid in &trapezoids {
                        x_min = x_min.min(trapezoid.x_min());
                        x_max = x_max.max(trapezoid.x_max());
                        y_min = y_min.min(trapezoid.y_bottom());
                        y_max = y_max.max(trapezoid.y_top());
                    }
                    shapes_inflated.push(trapezoids);
                }
                trapezoid_sets.push(TrapezoidSet {
                    item_type_id,
                    angle,
                    mirror,
                    shapes,
                    shapes_inflated,
                    x_min,
                    x_max,
                    y_min,
                    y_max,
                });
            }
        }
    }

    Ok(DirectionData {
        bin_types,
        trapezoid_sets,
    })
}

/// Mirror, rotate, transform and clean a polygon.
fn orient_shape(shape: &Shape, angle: f64, mirror: bool, direction: Direction) -> Shape {
    let mut shape = shape.clone();
    if mirror {
        shape = shape.axial_symmetry_y_axis();
    }
    if angle != 0.0 {
        shape = shape.rotate(angle);
    }
    clean_shape(&direction.transform_shape(&shape))
}

impl BeamBranchingScheme for BranchingScheme {
    type Node = Node;
    type DominanceKey = Vec<usize>;

    fn root(&self) -> Rc<Node> {
        Rc::new(self.root_node())
    }

    fn children(&self, parent: &Rc<Node>) -> Vec<Rc<Node>> {
        self.insertions(parent)
            .iter()
            .map(|insertion| Rc::new(self.child_node(parent, insertion)))
            .collect()
    }

    fn leaf(&self, node: &Node) -> bool {
        node.number_of_items == self.instance.number_of_items()
    }

    fn solution_candidate(&self, node: &Node) -> bool {
        match self.instance.objective() {
            Objective::Knapsack => node.number_of_items > 0,
            _ => node.number_of_items == self.instance.number_of_items(),
        }
    }

    fn guide_cmp(&self, node_1: &Node, node_2: &Node) -> Ordering {
        let ordering = match self.parameters.guide_id {
            0 => {
                if node_1.guide_area == 0.0 || node_2.guide_area == 0.0 {
                    node_1
                        .guide_area
                        .partial_cmp(&node_2.guide_area)
                        .unwrap_or(Ordering::Equal)
                } else {
                    let guide_1 = node_1.guide_area / node_1.item_convex_hull_area;
                    let guide_2 = node_2.guide_area / node_2.item_convex_hull_area;
                    guide_1.partial_cmp(&guide_2).unwrap_or(Ordering::Equal)
                }
            }
            1 => {
                if node_1.guide_area == 0.0
                    || node_2.guide_area == 0.0
                    || node_1.number_of_items == 0
                    || node_2.number_of_items == 0
                {
                    node_1
                        .guide_area
                        .partial_cmp(&node_2.guide_area)
                        .unwrap_or(Ordering::Equal)
                } else {
                    let guide_1 = node_1.guide_area
                        / node_1.item_convex_hull_area
                        / node_1.item_convex_hull_area;
                    let guide_2 = node_2.guide_area
                        / node_2.item_convex_hull_area
                        / node_2.item_convex_hull_area;
                    guide_1.partial_cmp(&guide_2).unwrap_or(Ordering::Equal)
                }
            }
            2 => {
                if node_1.number_of_items == 0 || node_2.number_of_items == 0 {
                    node_1
                        .number_of_items
                        .cmp(&node_2.number_of_items)
                } else {
                    let guide_1 = node_1.xe_max * node_1.ye_max / node_1.item_convex_hull_area;
                    let guide_2 = node_2.xe_max * node_2.ye_max / node_2.item_convex_hull_area;
                    guide_1.partial_cmp(&guide_2).unwrap_or(Ordering::Equal)
                }
            }
            3 => {
                if node_1.number_of_items == 0 || node_2.number_of_items == 0 {
                    node_1.number_of_items.cmp(&node_2.number_of_items)
                } else {
                    let guide_1 = node_1.xe_max * node_1.ye_max
                        / node_1.item_convex_hull_area
                        / node_1.item_convex_hull_area;
                    let guide_2 = node_2.xe_max * node_2.ye_max
                        / node_2.item_convex_hull_area
                        / node_2.item_convex_hull_area;
                    guide_1.partial_cmp(&guide_2).unwrap_or(Ordering::Equal)
                }
            }
            4 => {
                if node_1.profit == 0.0 || node_2.profit == 0.0 {
                    node_1
                        .profit
                        .partial_cmp(&node_2.profit)
                        .unwrap_or(Ordering::Equal)
                } else {
                    let guide_1 = node_1.guide_area / node_1.profit;
                    let guide_2 = node_2.guide_area / node_2.profit;
                    guide_1.partial_cmp(&guide_2).unwrap_or(Ordering::Equal)
                }
            }
            5 => {
                if node_1.profit == 0.0
                    || node_2.profit == 0.0
                    || node_1.number_of_items == 0
                    || node_2.number_of_items == 0
                {
                    node_1
                        .profit
                        .partial_cmp(&node_2.profit)
                        .unwrap_or(Ordering::Equal)
                } else {
                    let guide_1 =
                        node_1.guide_area / node_1.profit / self.mean_item_area(node_1);
                    let guide_2 =
                        node_2.guide_area / node_2.profit / self.mean_item_area(node_2);
                    guide_1.partial_cmp(&guide_2).unwrap_or(Ordering::Equal)
                }
            }
            6 => {
                let guide_1 = node_1.guide_area / (node_1.profit + 0.1);
                let guide_2 = node_2.guide_area / (node_2.profit + 0.1);
                guide_1.partial_cmp(&guide_2).unwrap_or(Ordering::Equal)
            }
            _ => {
                if node_1.number_of_items == 0 || node_2.number_of_items == 0 {
                    node_1.number_of_items.cmp(&node_2.number_of_items)
                } else {
                    let guide_1 = node_1.guide_area
                        / (node_1.profit + 0.1)
                        / self.mean_item_area(node_1);
                    let guide_2 = node_2.guide_area
                        / (node_2.profit + 0.1)
                        / self.mean_item_area(node_2);
                    guide_1.partial_cmp(&guide_2).unwrap_or(Ordering::Equal)
                }
            }
        };
        // Ties break by insertion order, giving deterministic expansion.
        ordering.then(node_1.id.cmp(&node_2.id))
    }

    fn bound(&self, node: &Node, best: &Node) -> bool {
        match self.instance.objective() {
            Objective::Knapsack => {
                let mut remaining = 0.0;
                for (item_type_id, item_type) in self.instance.item_types().iter().enumerate() {
                    remaining += (item_type.copies - node.item_number_of_copies[item_type_id])
                        as f64
                        * item_type.profit;
                }
                !strictly_greater(node.profit + remaining, best.profit)
            }
            Objective::BinPacking => node.number_of_bins >= best.number_of_bins,
            Objective::BinPackingWithLeftovers => {
                if node.number_of_bins > best.number_of_bins {
                    return true;
                }
                if node.number_of_bins < best.number_of_bins {
                    return false;
                }
                !strictly_greater(node.leftover_value, best.leftover_value)
            }
            Objective::OpenDimensionX | Objective::OpenDimensionXY => {
                !strictly_lesser(node.xe_max, best.xe_max)
            }
            Objective::OpenDimensionY => !strictly_lesser(node.ye_max, best.ye_max),
            Objective::VariableSizedBinPacking => !strictly_lesser(node.cost, best.cost),
        }
    }

    fn better(&self, node_1: &Node, node_2: &Node) -> bool {
        match self.instance.objective() {
            Objective::BinPacking => node_1.number_of_bins < node_2.number_of_bins,
            Objective::BinPackingWithLeftovers => {
                if node_1.number_of_bins != node_2.number_of_bins {
                    return node_1.number_of_bins < node_2.number_of_bins;
                }
                strictly_greater(node_1.leftover_value, node_2.leftover_value)
            }
            Objective::Knapsack => strictly_greater(node_1.profit, node_2.profit),
            Objective::OpenDimensionX | Objective::OpenDimensionXY => {
                strictly_lesser(node_1.xe_max, node_2.xe_max)
            }
            Objective::OpenDimensionY => strictly_lesser(node_1.ye_max, node_2.ye_max),
            Objective::VariableSizedBinPacking => strictly_lesser(node_1.cost, node_2.cost),
        }
    }

    fn comparable(&self, _node: &Node) -> bool {
        true
    }

    fn dominance_key(&self, node: &Node) -> Vec<usize> {
        node.item_number_of_copies.clone()
    }

    /// `node_1` dominates `node_2` iff it uses no more bins, its skyline is
    /// pointwise no further right and its extra trapezoids are identical.
    fn dominates(&self, node_1: &Node, node_2: &Node) -> bool {
        if node_1.number_of_bins < node_2.number_of_bins {
            return true;
        }
        if node_1.number_of_bins > node_2.number_of_bins {
            return false;
        }
        if node_1.last_bin_direction != node_2.last_bin_direction {
            return false;
        }
        if node_1.uncovered_trapezoids.is_empty() || node_2.uncovered_trapezoids.is_empty() {
            return false;
        }

        // Walk the two skylines in lockstep from top to bottom.
        let mut pos_1 = node_1.uncovered_trapezoids.len() - 1;
        let mut pos_2 = node_2.uncovered_trapezoids.len() - 1;
        loop {
            let trapezoid_1 = &node_1.uncovered_trapezoids[pos_1].trapezoid;
            let trapezoid_2 = &node_2.uncovered_trapezoids[pos_2].trapezoid;
            let yb = trapezoid_1.y_bottom().max(trapezoid_2.y_bottom());
            let yt = trapezoid_1.y_top().min(trapezoid_2.y_top());
            if strictly_greater(trapezoid_1.x_right(yb), trapezoid_2.x_right(yb)) {
                return false;
            }
            if strictly_greater(trapezoid_1.x_right(yt), trapezoid_2.x_right(yt)) {
                return false;
            }
            if pos_1 == 0 && pos_2 == 0 {
                break;
            }
            if equal(trapezoid_1.y_bottom(), trapezoid_2.y_bottom()) {
                if pos_1 == 0 || pos_2 == 0 {
                    break;
                }
                pos_1 -= 1;
                pos_2 -= 1;
            } else if strictly_lesser(trapezoid_1.y_bottom(), trapezoid_2.y_bottom()) {
                pos_2 -= 1;
            } else {
                pos_1 -= 1;
            }
        }

        // Extra trapezoids must be position-identical.
        if node_1.extra_trapezoids.len() != node_2.extra_trapezoids.len() {
            return false;
        }
        for (extra_1, extra_2) in node_1
            .extra_trapezoids
            .iter()
            .zip(node_2.extra_trapezoids.iter())
        {
            if extra_1.trapezoid != extra_2.trapezoid {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance_builder::InstanceBuilder;
    use shapepack_geometry::shape::ShapeWithHoles;

    fn small_instance() -> Arc<Instance> {
        let mut builder = InstanceBuilder::new();
        builder.set_objective(Objective::BinPacking);
        builder.add_bin_type(Shape::rectangle(2.0, 4.0), None, Some(1), 0);
        builder.add_item_type(
            vec![(
                ShapeWithHoles {
                    shape: Shape::rectangle(1.0, 1.0),
                    holes: Vec::new(),
                },
                None,
            )],
            None,
            4,
            Vec::new(),
        );
        Arc::new(builder.build().unwrap())
    }

    #[test]
    fn root_has_new_bin_insertions() {
        let instance = small_instance();
        let scheme = BranchingScheme::new(instance, Parameters::default()).unwrap();
        let root = Rc::new(scheme.root_node());
        let insertions = scheme.insertions(&root);
        assert!(!insertions.is_empty());
        assert!(insertions
            .iter()
            .all(|insertion| insertion.new_bin_direction.is_some()));
    }

    #[test]
    fn first_placement_lands_at_the_origin() {
        let instance = small_instance();
        let scale = instance.scale();
        let scheme = BranchingScheme::new(Arc::clone(&instance), Parameters::default()).unwrap();
        let root = Rc::new(scheme.root_node());
        let insertions = scheme.insertions(&root);
        let origin = insertions.iter().find(|insertion| {
            insertion.x.abs() < 1e-6 * scale && insertion.y.abs() < 1e-6 * scale
        });
        assert!(origin.is_some(), "insertions: {insertions:?}");
    }

    #[test]
    fn skyline_invariant_holds_along_a_path() {
        let instance = small_instance();
        let scheme = BranchingScheme::new(instance, Parameters::default()).unwrap();
        let mut node = Rc::new(scheme.root_node());
        for _ in 0..4 {
            let insertions = scheme.insertions(&node);
            assert!(!insertions.is_empty());
            node = Rc::new(scheme.child_node(&node, &insertions[0]));
            // The skyline is a staircase covering the bin's vertical
            // extent.
            for window in node.uncovered_trapezoids.windows(2) {
                assert!(equal(
                    window[0].trapezoid.y_top(),
                    window[1].trapezoid.y_bottom()
                ));
            }
        }
        assert_eq!(node.number_of_items, 4);
        assert_eq!(node.number_of_bins, 1);
    }

    #[test]
    fn no_two_placed_trapezoids_overlap() {
        let instance = small_instance();
        let scheme = BranchingScheme::new(instance, Parameters::default()).unwrap();
        let mut node = Rc::new(scheme.root_node());
        let mut placed: Vec<GeneralizedTrapezoid> = Vec::new();
        for _ in 0..4 {
            let insertions = scheme.insertions(&node);
            let insertion = insertions[0];
            node = Rc::new(scheme.child_node(&node, &insertion));
            let data = scheme.direction_data(node.last_bin_direction);
            let set = &data.trapezoid_sets[insertion.trapezoid_set_id];
            for trapezoids in &set.shapes_inflated {
                for trapezoid in trapezoids {
                    let new = trapezoid.translate(insertion.x, insertion.y);
                    for old in &placed {
                        assert!(!new.intersects(old), "{new} intersects {old}");
                    }
                    placed.push(new);
                }
            }
        }
    }

    #[test]
    fn extra_trapezoids_behind_the_frontier_are_dropped() {
        // A 2x2 bin: once a full-height column of squares is covered by a
        // second column, the first column's bumped pieces are unreachable.
        let mut builder = InstanceBuilder::new();
        builder.set_objective(Objective::BinPacking);
        builder.add_bin_type(Shape::rectangle(2.0, 2.0), None, Some(1), 0);
        builder.add_item_type(
            vec![(
                ShapeWithHoles {
                    shape: Shape::rectangle(1.0, 1.0),
                    holes: Vec::new(),
                },
                None,
            )],
            None,
            4,
            Vec::new(),
        );
        let instance = Arc::new(builder.build().unwrap());
        let scheme = BranchingScheme::new(instance, Parameters::default()).unwrap();

        let mut node = Rc::new(scheme.root_node());
        for _ in 0..2 {
            let insertions = scheme.insertions(&node);
            node = Rc::new(scheme.child_node(&node, &insertions[0]));
        }
        // Two squares side by side: the first one was bumped off the
        // skyline but still sticks out past the frontier minimum.
        assert_eq!(node.extra_trapezoids.len(), 1);

        let insertions = scheme.insertions(&node);
        node = Rc::new(scheme.child_node(&node, &insertions[0]));
        // The third square covers the remaining wall band; everything left
        // of the frontier is unreachable and trimmed.
        let frontier = skyline_frontier_min(&node.uncovered_trapezoids);
        assert!(node.extra_trapezoids.is_empty());
        for piece in &node.uncovered_trapezoids {
            assert!(piece.trapezoid.x_max() >= frontier);
        }
    }

    #[test]
    fn to_solution_round_trips_the_path() {
        let instance = small_instance();
        let scheme = BranchingScheme::new(Arc::clone(&instance), Parameters::default()).unwrap();
        let mut node = Rc::new(scheme.root_node());
        for _ in 0..4 {
            let insertions = scheme.insertions(&node);
            node = Rc::new(scheme.child_node(&node, &insertions[0]));
        }
        let solution = scheme.to_solution(&node).unwrap();
        assert!(solution.full());
        assert_eq!(solution.number_of_bins(), 1);
        assert_eq!(solution.number_of_items(), 4);
    }
}
