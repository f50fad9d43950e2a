//! Instance model for the irregular packing problem.
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
//! An [`Instance`] is immutable after construction (see
//! `InstanceBuilder`) and shared by reference across all search workers.
//! Every shape is kept in three forms: as read (`orig`), scaled to the
//! common numeric base (`scaled`) and with minimum-spacing inflation
//! applied (`inflated`).

use std::fmt;
use std::str::FromStr;

use shapepack_geometry::point::Point;
use shapepack_geometry::shape::{Shape, ShapeType, ShapeWithHoles};

/// Objective of the optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Minimize the number of bins used.
    BinPacking,
    /// Minimize the number of bins used, then maximize the trailing free
    /// area in the last bin.
    BinPackingWithLeftovers,
    /// Minimize the x-extent of a single bin.
    OpenDimensionX,
    /// Minimize the y-extent of a single bin.
    OpenDimensionY,
    /// Minimize both extents of a single bin at a fixed aspect ratio.
    OpenDimensionXY,
    /// Maximize the packed profit within the bin capacity.
    Knapsack,
    /// Minimize the total cost of the bins used.
    VariableSizedBinPacking,
}

impl FromStr for Objective {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bin-packing" | "binpacking" => Ok(Objective::BinPacking),
            "bin-packing-with-leftovers" | "binpackingwithleftovers" => {
                Ok(Objective::BinPackingWithLeftovers)
            }
            "open-dimension-x" | "opendimensionx" => Ok(Objective::OpenDimensionX),
            "open-dimension-y" | "opendimensiony" => Ok(Objective::OpenDimensionY),
            "open-dimension-xy" | "opendimensionxy" => Ok(Objective::OpenDimensionXY),
            "knapsack" => Ok(Objective::Knapsack),
            "variable-sized-bin-packing" | "variablesizedbinpacking" => {
                Ok(Objective::VariableSizedBinPacking)
            }
            _ => Err(format!("unknown objective: {}", s)),
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Objective::BinPacking => "bin-packing",
            Objective::BinPackingWithLeftovers => "bin-packing-with-leftovers",
            Objective::OpenDimensionX => "open-dimension-x",
            Objective::OpenDimensionY => "open-dimension-y",
            Objective::OpenDimensionXY => "open-dimension-xy",
            Objective::Knapsack => "knapsack",
            Objective::VariableSizedBinPacking => "variable-sized-bin-packing",
        };
        write!(f, "{}", s)
    }
}

/// How strategies are scheduled and solutions published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationMode {
    /// All strategies run concurrently and publish as they improve.
    Anytime,
    /// Fixed effort, concurrent, publication on improvement.
    NotAnytime,
    /// Fixed effort, strategies run one after another on the main thread.
    NotAnytimeSequential,
    /// Fixed effort, concurrent, publication deferred to the main thread
    /// in a fixed order: identical inputs give identical outputs.
    NotAnytimeDeterministic,
}

impl FromStr for OptimizationMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anytime" => Ok(OptimizationMode::Anytime),
            "not-anytime" => Ok(OptimizationMode::NotAnytime),
            "not-anytime-sequential" => Ok(OptimizationMode::NotAnytimeSequential),
            "not-anytime-deterministic" => Ok(OptimizationMode::NotAnytimeDeterministic),
            _ => Err(format!("unknown optimization mode: {}", s)),
        }
    }
}

/// Global instance parameters.
#[derive(Debug, Clone)]
pub struct Parameters {
    /// Minimum distance between two items.
    pub item_item_minimum_spacing: f64,

    /// Minimum distance between an item and the bin border or a defect.
    pub item_bin_minimum_spacing: f64,

    /// Aspect ratio y/x of the bin for the open-dimension-xy objective.
    pub open_dimension_xy_aspect_ratio: f64,

    /// `quality_rules[quality_rule][defect_type]` is true iff an item
    /// sub-region following `quality_rule` may cover a defect of that type.
    pub quality_rules: Vec<Vec<bool>>,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            item_item_minimum_spacing: 0.0,
            item_bin_minimum_spacing: 0.0,
            open_dimension_xy_aspect_ratio: 1.0,
            quality_rules: Vec::new(),
        }
    }
}

/// One connected sub-region of an item.
#[derive(Debug, Clone)]
pub struct ItemShape {
    /// Shape as read.
    pub shape_orig: ShapeWithHoles,

    /// Shape scaled to the common numeric base.
    pub shape_scaled: ShapeWithHoles,

    /// Scaled shape inflated by half the item-item spacing, holes deflated
    /// accordingly, arcs approximated by line segments.
    pub shape_inflated: ShapeWithHoles,

    /// Quality rule followed by this sub-region; `None` allows no defect.
    pub quality_rule: Option<usize>,
}

/// An item type.
#[derive(Debug, Clone)]
pub struct ItemType {
    /// Non-overlapping sub-regions composing the item.
    pub shapes: Vec<ItemShape>,

    /// Allowed rotations, as closed angle intervals in radians;
    /// `start == end` encodes a single discrete angle.
    pub allowed_rotations: Vec<(f64, f64)>,

    /// Whether the item may be mirrored.
    pub allow_mirroring: bool,

    /// Profit of the item type.
    pub profit: f64,

    /// Number of copies.
    pub copies: usize,

    /// Area as read (holes subtracted).
    pub area_orig: f64,

    /// Scaled area.
    pub area_scaled: f64,

    /// Area of the convex hull of the scaled sub-regions.
    pub convex_hull_area_scaled: f64,
}

impl ItemType {
    /// Bounding box of the scaled item at the given angle and mirror flag.
    pub fn compute_min_max_scaled(&self, angle: f64, mirror: bool) -> (Point, Point) {
        let mut mn = Point::new(f64::INFINITY, f64::INFINITY);
        let mut mx = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for item_shape in &self.shapes {
            let (a, b) = item_shape.shape_scaled.shape.compute_min_max(angle, mirror);
            mn.x = mn.x.min(a.x);
            mn.y = mn.y.min(a.y);
            mx.x = mx.x.max(b.x);
            mx.y = mx.y.max(b.y);
        }
        (mn, mx)
    }

    /// Bounding box of the original item at the given angle and mirror
    /// flag.
    pub fn compute_min_max_orig(&self, angle: f64, mirror: bool) -> (Point, Point) {
        let mut mn = Point::new(f64::INFINITY, f64::INFINITY);
        let mut mx = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for item_shape in &self.shapes {
            let (a, b) = item_shape.shape_orig.shape.compute_min_max(angle, mirror);
            mn.x = mn.x.min(a.x);
            mn.y = mn.y.min(a.y);
            mx.x = mx.x.max(b.x);
            mx.y = mx.y.max(b.y);
        }
        (mn, mx)
    }

    /// Shape classification of the whole item.
    pub fn shape_type(&self) -> ShapeType {
        let single = self.shapes.len() == 1;
        let no_holes = self.shapes.iter().all(|s| s.shape_scaled.holes.is_empty());
        if single && no_holes {
            let shape = &self.shapes[0].shape_scaled.shape;
            if shape.is_circle() {
                return ShapeType::Circle;
            }
            if shape.is_square() {
                return ShapeType::Square;
            }
            if shape.is_rectangle() {
                return ShapeType::Rectangle;
            }
            if shape.is_polygon() {
                return ShapeType::Polygon;
            }
        }
        let all_polygons = self
            .shapes
            .iter()
            .all(|s| s.shape_scaled.shape.is_polygon());
        let all_hole_polygons = self
            .shapes
            .iter()
            .all(|s| s.shape_scaled.holes.iter().all(|hole| hole.is_polygon()));
        if all_polygons && no_holes {
            return ShapeType::MultiPolygon;
        }
        if all_polygons && all_hole_polygons {
            if single {
                return ShapeType::PolygonWithHoles;
            }
            return ShapeType::MultiPolygonWithHoles;
        }
        ShapeType::GeneralShape
    }

    /// True iff the single allowed rotation interval covers the full
    /// circle.
    pub fn has_full_continuous_rotations(&self) -> bool {
        if self.allowed_rotations.len() != 1 {
            return false;
        }
        let (start, end) = self.allowed_rotations[0];
        start == 0.0 && end >= 2.0 * std::f64::consts::PI - 1e-9
    }

    /// True iff every allowed rotation interval is a single angle.
    pub fn has_only_discrete_rotations(&self) -> bool {
        self.allowed_rotations.iter().all(|(a, b)| a == b)
    }
}

/// A defect inside a bin.
#[derive(Debug, Clone)]
pub struct Defect {
    /// Shape as read.
    pub shape_orig: ShapeWithHoles,

    /// Shape scaled to the common numeric base.
    pub shape_scaled: ShapeWithHoles,

    /// Scaled shape with the item-bin spacing offset applied.
    pub shape_inflated: ShapeWithHoles,

    /// Type of the defect, matched against quality rules.
    pub defect_type: usize,
}

/// A bin type.
#[derive(Debug, Clone)]
pub struct BinType {
    /// Outer shape as read.
    pub shape_orig: Shape,

    /// Outer shape scaled to the common numeric base.
    pub shape_scaled: Shape,

    /// Usable region for inflated items: the scaled shape offset inward by
    /// the item-bin spacing (net of the item inflation), approximated by
    /// line segments.
    pub shape_inflated: Shape,

    /// Defects of the bin type.
    pub defects: Vec<Defect>,

    /// Cost of the bin type.
    pub cost: f64,

    /// Maximum number of copies.
    pub copies: usize,

    /// Minimum number of copies to use.
    pub copies_min: usize,

    /// Area as read.
    pub area_orig: f64,

    /// Scaled area.
    pub area_scaled: f64,

    /// Bounding box of the scaled shape.
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

/// An immutable problem instance.
#[derive(Debug, Clone)]
pub struct Instance {
    pub(crate) objective: Objective,
    pub(crate) parameters: Parameters,
    /// Common numeric base: scaled coordinates are orig * scale.
    pub(crate) scale: f64,
    pub(crate) item_types: Vec<ItemType>,
    pub(crate) bin_types: Vec<BinType>,

    pub(crate) number_of_items: usize,
    pub(crate) number_of_defects: usize,
    pub(crate) number_of_rectangular_items: usize,
    pub(crate) number_of_circular_items: usize,
    /// Bin position to bin type.
    pub(crate) bin_type_ids: Vec<usize>,
    /// Total area of the bins before each position (scaled).
    pub(crate) previous_bins_area: Vec<f64>,

    pub(crate) item_area_orig: f64,
    pub(crate) item_area_scaled: f64,
    pub(crate) bin_area_orig: f64,
    pub(crate) bin_area_scaled: f64,
    pub(crate) item_profit: f64,
    pub(crate) smallest_item_area_scaled: f64,
    pub(crate) largest_item_area_scaled: f64,
    pub(crate) largest_item_profit: f64,
    pub(crate) largest_item_copies: usize,
    pub(crate) largest_bin_cost: f64,
    pub(crate) max_efficiency_item_type_id: Option<usize>,
    pub(crate) all_item_types_infinite_copies: bool,
}

impl Instance {
    pub fn objective(&self) -> Objective {
        self.objective
    }
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
    pub fn scale(&self) -> f64 {
        self.scale
    }
    pub fn number_of_item_types(&self) -> usize {
        self.item_types.len()
    }
    pub fn number_of_items(&self) -> usize {
        self.number_of_items
    }
    pub fn number_of_bin_types(&self) -> usize {
        self.bin_types.len()
    }
    pub fn number_of_bins(&self) -> usize {
        self.bin_type_ids.len()
    }
    pub fn number_of_defects(&self) -> usize {
        self.number_of_defects
    }
    pub fn item_type(&self, item_type_id: usize) -> &ItemType {
        &self.item_types[item_type_id]
    }
    pub fn item_types(&self) -> &[ItemType] {
        &self.item_types
    }
    pub fn bin_type(&self, bin_type_id: usize) -> &BinType {
        &self.bin_types[bin_type_id]
    }
    pub fn bin_types(&self) -> &[BinType] {
        &self.bin_types
    }
    /// Type of the bin at a global position.
    pub fn bin_type_id(&self, bin_pos: usize) -> usize {
        self.bin_type_ids[bin_pos]
    }
    /// Total scaled area of the bins before `bin_pos`.
    pub fn previous_bin_area(&self, bin_pos: usize) -> f64 {
        self.previous_bins_area[bin_pos]
    }
    pub fn item_area(&self) -> f64 {
        self.item_area_orig
    }
    pub fn item_area_scaled(&self) -> f64 {
        self.item_area_scaled
    }
    pub fn bin_area(&self) -> f64 {
        self.bin_area_orig
    }
    pub fn bin_area_scaled(&self) -> f64 {
        self.bin_area_scaled
    }
    pub fn item_profit(&self) -> f64 {
        self.item_profit
    }
    pub fn smallest_item_area_scaled(&self) -> f64 {
        self.smallest_item_area_scaled
    }
    pub fn largest_item_area_scaled(&self) -> f64 {
        self.largest_item_area_scaled
    }
    pub fn largest_item_profit(&self) -> f64 {
        self.largest_item_profit
    }
    pub fn largest_item_copies(&self) -> usize {
        self.largest_item_copies
    }
    pub fn largest_bin_cost(&self) -> f64 {
        self.largest_bin_cost
    }
    pub fn max_efficiency_item_type_id(&self) -> Option<usize> {
        self.max_efficiency_item_type_id
    }
    pub fn all_item_types_infinite_copies(&self) -> bool {
        self.all_item_types_infinite_copies
    }

    /// Mean scaled item area.
    pub fn mean_item_area_scaled(&self) -> f64 {
        self.item_area_scaled / self.number_of_items as f64
    }

    /// True iff an item sub-region following `quality_rule` may cover a
    /// defect of type `defect_type`.
    pub fn can_contain(&self, quality_rule: Option<usize>, defect_type: usize) -> bool {
        let Some(quality_rule) = quality_rule else {
            return false;
        };
        match self.parameters.quality_rules.get(quality_rule) {
            None => false,
            Some(rule) => *rule.get(defect_type).unwrap_or(&false),
        }
    }

    /// Re-emit the instance as JSON (the inverse of the reader; shapes are
    /// written as `general` element lists).
    pub fn write(&self, instance_path: &std::path::Path) -> std::io::Result<()> {
        use serde_json::json;

        let shape_to_json = |shape: &Shape| -> serde_json::Value {
            let elements: Vec<serde_json::Value> = shape
                .elements
                .iter()
                .map(|element| {
                    let mut value = json!({
                        "type": element.kind.as_str(),
                        "start": { "x": element.start.x, "y": element.start.y },
                        "end": { "x": element.end.x, "y": element.end.y },
                    });
                    if element.kind == shapepack_geometry::element::ElementKind::CircularArc {
                        value["center"] =
                            json!({ "x": element.center.x, "y": element.center.y });
                        value["anticlockwise"] = json!(element.anticlockwise);
                    }
                    value
                })
                .collect();
            json!({ "type": "general", "elements": elements })
        };

        let mut bin_types: Vec<serde_json::Value> = Vec::new();
        for bin_type in &self.bin_types {
            let mut value = shape_to_json(&bin_type.shape_orig);
            value["cost"] = json!(bin_type.cost);
            value["copies"] = json!(bin_type.copies);
            value["copies_min"] = json!(bin_type.copies_min);
            let defects: Vec<serde_json::Value> = bin_type
                .defects
                .iter()
                .map(|defect| {
                    json!({
                        "type": defect.defect_type,
                        "shape": shape_to_json(&defect.shape_orig.shape),
                        "holes": defect
                            .shape_orig
                            .holes
                            .iter()
                            .map(shape_to_json)
                            .collect::<Vec<_>>(),
                    })
                })
                .collect();
            if !defects.is_empty() {
                value["defects"] = serde_json::Value::Array(defects);
            }
            bin_types.push(value);
        }

        let mut item_types: Vec<serde_json::Value> = Vec::new();
        for item_type in &self.item_types {
            let shapes: Vec<serde_json::Value> = item_type
                .shapes
                .iter()
                .map(|item_shape| {
                    let mut value = shape_to_json(&item_shape.shape_orig.shape);
                    value["holes"] = serde_json::Value::Array(
                        item_shape
                            .shape_orig
                            .holes
                            .iter()
                            .map(shape_to_json)
                            .collect(),
                    );
                    if let Some(quality_rule) = item_shape.quality_rule {
                        value["quality_rule"] = json!(quality_rule);
                    }
                    value
                })
                .collect();
            let allowed_rotations: Vec<serde_json::Value> = item_type
                .allowed_rotations
                .iter()
                .map(|&(start, end)| {
                    json!({ "start": start.to_degrees(), "end": end.to_degrees() })
                })
                .collect();
            item_types.push(json!({
                "shapes": shapes,
                "profit": item_type.profit,
                "copies": item_type.copies,
                "allowed_rotations": allowed_rotations,
                "allow_mirroring": item_type.allow_mirroring,
            }));
        }

        let json = json!({
            "objective": self.objective.to_string(),
            "parameters": {
                "item_item_minimum_spacing": self.parameters.item_item_minimum_spacing,
                "item_bin_minimum_spacing": self.parameters.item_bin_minimum_spacing,
            },
            "bin_types": bin_types,
            "item_types": item_types,
        });
        crate::output::write_text_atomic(
            instance_path,
            &serde_json::to_string_pretty(&json).unwrap(),
        )
    }

    /// Print a human-readable description.
    pub fn format(&self, os: &mut dyn std::io::Write, verbosity_level: u8) -> std::io::Result<()> {
        if verbosity_level >= 1 {
            writeln!(os, "Objective:                    {}", self.objective)?;
            writeln!(os, "Number of item types:         {}", self.number_of_item_types())?;
            writeln!(os, "Number of items:              {}", self.number_of_items())?;
            writeln!(os, "Number of bin types:          {}", self.number_of_bin_types())?;
            writeln!(os, "Number of bins:               {}", self.number_of_bins())?;
            writeln!(os, "Number of defects:            {}", self.number_of_defects())?;
            writeln!(os, "Number of rectangular items:  {}", self.number_of_rectangular_items)?;
            writeln!(os, "Number of circular items:     {}", self.number_of_circular_items)?;
            writeln!(
                os,
                "Item-bin minimum spacing:     {}",
                self.parameters.item_bin_minimum_spacing
            )?;
            writeln!(
                os,
                "Item-item minimum spacing:    {}",
                self.parameters.item_item_minimum_spacing
            )?;
            writeln!(os, "Total item area:              {}", self.item_area_orig)?;
            writeln!(os, "Total item profit:            {}", self.item_profit)?;
            writeln!(os, "Total bin area:               {}", self.bin_area_orig)?;
        }
        if verbosity_level >= 2 {
            writeln!(os)?;
            writeln!(
                os,
                "{:>12}{:>12}{:>12}{:>12}{:>12}",
                "Bin type", "Area", "Cost", "Copies", "Copies min"
            )?;
            writeln!(
                os,
                "{:>12}{:>12}{:>12}{:>12}{:>12}",
                "--------", "----", "----", "------", "----------"
            )?;
            for (bin_type_id, bin_type) in self.bin_types.iter().enumerate() {
                writeln!(
                    os,
                    "{:>12}{:>12}{:>12}{:>12}{:>12}",
                    bin_type_id, bin_type.area_orig, bin_type.cost, bin_type.copies, bin_type.copies_min
                )?;
            }
            writeln!(os)?;
            writeln!(
                os,
                "{:>12}{:>12}{:>12}{:>12}{:>12}{:>12}",
                "Item type", "Shape type", "Area", "Profit", "Copies", "# shapes"
            )?;
            writeln!(
                os,
                "{:>12}{:>12}{:>12}{:>12}{:>12}{:>12}",
                "---------", "----------", "----", "------", "------", "--------"
            )?;
            for (item_type_id, item_type) in self.item_types.iter().enumerate() {
                writeln!(
                    os,
                    "{:>12}{:>12}{:>12}{:>12}{:>12}{:>12}",
                    item_type_id,
                    item_type.shape_type().as_str(),
                    item_type.area_orig,
                    item_type.profit,
                    item_type.copies,
                    item_type.shapes.len()
                )?;
            }
        }
        Ok(())
    }
}
