//! Instance builder: validation, JSON reading and preprocessing.
//!
//! The builder owns the raw shapes as provided, and `build` runs the whole
//! preprocessing pipeline: scaling to the common numeric base, cleaning,
//! minimum-spacing inflation and aggregate computation. Search code only
//! ever sees the resulting immutable [`Instance`].

use std::path::Path;

use serde_json::Value;

use shapepack_geometry::clean::clean_shape;
use shapepack_geometry::convex_hull::shapes_convex_hull_area;
use shapepack_geometry::element::ShapeElement;
use shapepack_geometry::inflate::{deflate_hole, offset_shape};
use shapepack_geometry::point::Point;
use shapepack_geometry::shape::{Shape, ShapeType, ShapeWithHoles};

use crate::instance::{
    BinType, Defect, Instance, ItemShape, ItemType, Objective, Parameters,
};

/// Number of segments used when approximating arcs for the search.
const SEGMENTS_PER_CIRCLE: usize = 100;

/// Structural errors detected when building an instance.
#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("unable to open file \"{0}\": {1}")]
    File(String, std::io::Error),

    #[error("invalid JSON in \"{0}\": {1}")]
    Json(String, serde_json::Error),

    #[error("missing required key \"{0}\"")]
    MissingKey(&'static str),

    #[error("unknown shape type \"{0}\"")]
    UnknownShapeType(String),

    #[error("unknown objective \"{0}\"")]
    UnknownObjective(String),

    #[error("bin type {bin_type_id}: copies_min {copies_min} exceeds copies {copies}")]
    BinCopies {
        bin_type_id: usize,
        copies_min: usize,
        copies: usize,
    },

    #[error("item type {item_type_id} has no shape")]
    EmptyItemType { item_type_id: usize },

    #[error("item type {item_type_id} has non-positive area {area}")]
    NonPositiveItemArea { item_type_id: usize, area: f64 },

    #[error("item type {item_type_id}, shape {shape_pos}: {source}")]
    ItemShape {
        item_type_id: usize,
        shape_pos: usize,
        source: shapepack_geometry::GeometryError,
    },

    #[error("item type {item_type_id}, shape {shape_pos}: hole {hole_pos} is not strictly inside its shape")]
    HoleOutsideShape {
        item_type_id: usize,
        shape_pos: usize,
        hole_pos: usize,
    },

    #[error("bin type {bin_type_id}: {source}")]
    BinShape {
        bin_type_id: usize,
        source: shapepack_geometry::GeometryError,
    },

    #[error("bin type {bin_type_id}, defect {defect_id}: {source}")]
    DefectShape {
        bin_type_id: usize,
        defect_id: usize,
        source: shapepack_geometry::GeometryError,
    },

    #[error("bin type {bin_type_id}: defect {defect_id} is not strictly inside the bin")]
    DefectOutsideBin { bin_type_id: usize, defect_id: usize },

    #[error("bin type {bin_type_id}: the minimum spacing leaves no usable region")]
    BinCollapsed { bin_type_id: usize },

    #[error(
        "objective {objective} requires exactly one bin with one copy; \
         the instance has {number_of_bins} bins"
    )]
    OpenDimensionBins {
        objective: Objective,
        number_of_bins: usize,
    },

    #[error("the instance has no bin type")]
    NoBinType,
}

#[derive(Debug, Clone)]
struct RawItemShape {
    shape: ShapeWithHoles,
    quality_rule: Option<usize>,
}

#[derive(Debug, Clone)]
struct RawItemType {
    shapes: Vec<RawItemShape>,
    profit: Option<f64>,
    copies: usize,
    allowed_rotations: Vec<(f64, f64)>,
    allow_mirroring: bool,
}

#[derive(Debug, Clone)]
struct RawDefect {
    defect_type: usize,
    shape: ShapeWithHoles,
}

#[derive(Debug, Clone)]
struct RawBinType {
    shape: Shape,
    defects: Vec<RawDefect>,
    cost: Option<f64>,
    /// `None` means as many copies as there are items.
    copies: Option<usize>,
    copies_min: usize,
}

/// Builder for [`Instance`].
#[derive(Debug, Clone, Default)]
pub struct InstanceBuilder {
    objective: Option<Objective>,
    parameters: Parameters,
    item_types: Vec<RawItemType>,
    bin_types: Vec<RawBinType>,
}

impl InstanceBuilder {
    pub fn new() -> Self {
        InstanceBuilder::default()
    }

    pub fn set_objective(&mut self, objective: Objective) {
        self.objective = Some(objective);
    }

    pub fn set_parameters(&mut self, parameters: Parameters) {
        self.parameters = parameters;
    }

    pub fn set_item_item_minimum_spacing(&mut self, spacing: f64) {
        self.parameters.item_item_minimum_spacing = spacing;
    }

    pub fn set_item_bin_minimum_spacing(&mut self, spacing: f64) {
        self.parameters.item_bin_minimum_spacing = spacing;
    }

    pub fn set_open_dimension_xy_aspect_ratio(&mut self, ratio: f64) {
        self.parameters.open_dimension_xy_aspect_ratio = ratio;
    }

    /// Add a quality rule: one allowed/forbidden flag per defect type.
    pub fn add_quality_rule(&mut self, quality_rule: Vec<bool>) {
        self.parameters.quality_rules.push(quality_rule);
    }

    /// Add a bin type; `cost == None` defaults to the bin area and
    /// `copies == None` to one copy per item.
    pub fn add_bin_type(
        &mut self,
        shape: Shape,
        cost: Option<f64>,
        copies: Option<usize>,
        copies_min: usize,
    ) -> usize {
        self.bin_types.push(RawBinType {
            shape,
            defects: Vec::new(),
            cost,
            copies,
            copies_min,
        });
        self.bin_types.len() - 1
    }

    /// Add a bin type copied from an already-built instance (used by the
    /// decomposition strategies).
    pub fn add_bin_type_from(
        &mut self,
        bin_type: &BinType,
        copies: Option<usize>,
        copies_min: usize,
    ) -> usize {
        let bin_type_id = self.add_bin_type(
            bin_type.shape_orig.clone(),
            Some(bin_type.cost),
            copies,
            copies_min,
        );
        for defect in &bin_type.defects {
            self.add_defect(bin_type_id, defect.defect_type, defect.shape_orig.clone());
        }
        bin_type_id
    }

    /// Add a defect to a bin type.
    pub fn add_defect(&mut self, bin_type_id: usize, defect_type: usize, shape: ShapeWithHoles) {
        self.bin_types[bin_type_id].defects.push(RawDefect {
            defect_type,
            shape,
        });
    }

    /// Add an item type; `profit == None` defaults to the item area.
    /// Angles are radians; an empty rotation list means angle 0 only.
    pub fn add_item_type(
        &mut self,
        shapes: Vec<(ShapeWithHoles, Option<usize>)>,
        profit: Option<f64>,
        copies: usize,
        allowed_rotations: Vec<(f64, f64)>,
    ) -> usize {
        let allowed_rotations = if allowed_rotations.is_empty() {
            vec![(0.0, 0.0)]
        } else {
            allowed_rotations
        };
        self.item_types.push(RawItemType {
            shapes: shapes
                .into_iter()
                .map(|(shape, quality_rule)| RawItemShape {
                    shape,
                    quality_rule,
                })
                .collect(),
            profit,
            copies,
            allowed_rotations,
            allow_mirroring: false,
        });
        self.item_types.len() - 1
    }

    /// Add an item type copied from an already-built instance.
    pub fn add_item_type_from(
        &mut self,
        item_type: &ItemType,
        profit: Option<f64>,
        copies: usize,
    ) -> usize {
        let shapes = item_type
            .shapes
            .iter()
            .map(|item_shape| (item_shape.shape_orig.clone(), item_shape.quality_rule))
            .collect();
        let item_type_id = self.add_item_type(
            shapes,
            profit.or(Some(item_type.profit)),
            copies,
            item_type.allowed_rotations.clone(),
        );
        self.item_types[item_type_id].allow_mirroring = item_type.allow_mirroring;
        item_type_id
    }

    pub fn set_item_type_allow_mirroring(&mut self, item_type_id: usize, allow_mirroring: bool) {
        self.item_types[item_type_id].allow_mirroring = allow_mirroring;
    }

    /// Give every bin type as many copies as there are items.
    pub fn set_bin_types_infinite_copies(&mut self) {
        for bin_type in &mut self.bin_types {
            bin_type.copies = None;
        }
    }

    /// Set every item profit to the item area.
    pub fn set_item_types_unweighted(&mut self) {
        for item_type in &mut self.item_types {
            item_type.profit = None;
        }
    }

    /// Set every bin cost to the bin area.
    pub fn set_bin_types_unweighted(&mut self) {
        for bin_type in &mut self.bin_types {
            bin_type.cost = None;
        }
    }

    /// Read an instance from a JSON file.
    pub fn read(&mut self, instance_path: &Path) -> Result<(), InstanceError> {
        let content = std::fs::read_to_string(instance_path)
            .map_err(|e| InstanceError::File(instance_path.display().to_string(), e))?;
        let json: Value = serde_json::from_str(&content)
            .map_err(|e| InstanceError::Json(instance_path.display().to_string(), e))?;
        self.read_json(&json)
    }

    /// Read an instance from a parsed JSON document.
    pub fn read_json(&mut self, json: &Value) -> Result<(), InstanceError> {
        if let Some(objective) = json.get("objective").and_then(Value::as_str) {
            self.set_objective(
                objective
                    .parse()
                    .map_err(|_| InstanceError::UnknownObjective(objective.to_string()))?,
            );
        }

        if let Some(parameters) = json.get("parameters") {
            if let Some(spacing) = parameters
                .get("item_item_minimum_spacing")
                .and_then(Value::as_f64)
            {
                self.set_item_item_minimum_spacing(spacing);
            }
            if let Some(spacing) = parameters
                .get("item_bin_minimum_spacing")
                .and_then(Value::as_f64)
            {
                self.set_item_bin_minimum_spacing(spacing);
            }
            if let Some(ratio) = parameters
                .get("open_dimension_xy_aspect_ratio")
                .and_then(Value::as_f64)
            {
                self.set_open_dimension_xy_aspect_ratio(ratio);
            }
            if let Some(rules) = parameters.get("quality_rules").and_then(Value::as_array) {
                for rule in rules {
                    let flags = rule
                        .as_array()
                        .map(|row| {
                            row.iter()
                                .map(|v| v.as_bool().unwrap_or(v.as_i64() == Some(1)))
                                .collect()
                        })
                        .unwrap_or_default();
                    self.add_quality_rule(flags);
                }
            }
        }

        // Bin types.
        let bin_types = json
            .get("bin_types")
            .and_then(Value::as_array)
            .ok_or(InstanceError::MissingKey("bin_types"))?;
        for json_bin in bin_types {
            let shape = read_shape(json_bin)?;
            let cost = json_bin.get("cost").and_then(Value::as_f64).and_then(|c| {
                if c < 0.0 {
                    None
                } else {
                    Some(c)
                }
            });
            let copies = match json_bin.get("copies").and_then(Value::as_i64) {
                None => Some(1),
                Some(c) if c < 0 => None,
                Some(c) => Some(c as usize),
            };
            let copies_min = json_bin
                .get("copies_min")
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize;
            let bin_type_id = self.add_bin_type(shape, cost, copies, copies_min);

            if let Some(defects) = json_bin.get("defects").and_then(Value::as_array) {
                for json_defect in defects {
                    let defect_type = json_defect
                        .get("type")
                        .and_then(Value::as_u64)
                        .unwrap_or(0) as usize;
                    let shape = if let Some(inner) = json_defect.get("shape") {
                        read_shape(inner)?
                    } else {
                        read_shape(json_defect)?
                    };
                    let holes = read_holes(json_defect)?;
                    self.add_defect(bin_type_id, defect_type, ShapeWithHoles { shape, holes });
                }
            }
        }

        // Item types.
        let item_types = json
            .get("item_types")
            .and_then(Value::as_array)
            .ok_or(InstanceError::MissingKey("item_types"))?;
        for json_item in item_types {
            let mut shapes: Vec<(ShapeWithHoles, Option<usize>)> = Vec::new();
            if let Some(json_shapes) = json_item.get("shapes").and_then(Value::as_array) {
                // Multiple sub-regions.
                for json_shape in json_shapes {
                    let shape = read_shape(json_shape)?;
                    let holes = read_holes(json_shape)?;
                    let quality_rule = json_shape
                        .get("quality_rule")
                        .and_then(Value::as_u64)
                        .map(|q| q as usize);
                    shapes.push((ShapeWithHoles { shape, holes }, quality_rule));
                }
            } else {
                // Single sub-region.
                let shape = read_shape(json_item)?;
                let holes = read_holes(json_item)?;
                let quality_rule = json_item
                    .get("quality_rule")
                    .and_then(Value::as_u64)
                    .map(|q| q as usize);
                shapes.push((ShapeWithHoles { shape, holes }, quality_rule));
            }

            let profit = json_item.get("profit").and_then(Value::as_f64).and_then(|p| {
                if p < 0.0 {
                    None
                } else {
                    Some(p)
                }
            });
            let copies = json_item.get("copies").and_then(Value::as_u64).unwrap_or(1) as usize;

            // Angles are degrees in the file, radians internally.
            let mut allowed_rotations: Vec<(f64, f64)> = Vec::new();
            if let Some(rotations) = json_item.get("allowed_rotations").and_then(Value::as_array) {
                for json_angles in rotations {
                    let start = json_angles
                        .get("start")
                        .and_then(Value::as_f64)
                        .ok_or(InstanceError::MissingKey("allowed_rotations.start"))?;
                    let end = json_angles
                        .get("end")
                        .and_then(Value::as_f64)
                        .ok_or(InstanceError::MissingKey("allowed_rotations.end"))?;
                    allowed_rotations.push((start.to_radians(), end.to_radians()));
                }
            }

            let allow_mirroring = json_item
                .get("allow_mirroring")
                .and_then(Value::as_bool)
                .unwrap_or(false);

            let item_type_id = self.add_item_type(shapes, profit, copies, allowed_rotations);
            self.set_item_type_allow_mirroring(item_type_id, allow_mirroring);
        }

        Ok(())
    }

    /// Validate, preprocess and freeze the instance.
    pub fn build(self) -> Result<Instance, InstanceError> {
        let objective = self.objective.unwrap_or(Objective::BinPacking);

        if self.bin_types.is_empty() {
            return Err(InstanceError::NoBinType);
        }

        // Structural validation on the raw shapes.
        for (bin_type_id, bin_type) in self.bin_types.iter().enumerate() {
            bin_type
                .shape
                .check()
                .map_err(|source| InstanceError::BinShape {
                    bin_type_id,
                    source,
                })?;
            if let Some(copies) = bin_type.copies {
                if bin_type.copies_min > copies {
                    return Err(InstanceError::BinCopies {
                        bin_type_id,
                        copies_min: bin_type.copies_min,
                        copies,
                    });
                }
            }
            let (bin_min, bin_max) = bin_type.shape.compute_min_max(0.0, false);
            for (defect_id, defect) in bin_type.defects.iter().enumerate() {
                defect
                    .shape
                    .shape
                    .check()
                    .map_err(|source| InstanceError::DefectShape {
                        bin_type_id,
                        defect_id,
                        source,
                    })?;
                let (defect_min, defect_max) = defect.shape.shape.compute_min_max(0.0, false);
                if defect_min.x < bin_min.x
                    || defect_min.y < bin_min.y
                    || defect_max.x > bin_max.x
                    || defect_max.y > bin_max.y
                {
                    return Err(InstanceError::DefectOutsideBin {
                        bin_type_id,
                        defect_id,
                    });
                }
            }
        }
        for (item_type_id, item_type) in self.item_types.iter().enumerate() {
            if item_type.shapes.is_empty() {
                return Err(InstanceError::EmptyItemType { item_type_id });
            }
            let mut area = 0.0;
            for (shape_pos, item_shape) in item_type.shapes.iter().enumerate() {
                item_shape
                    .shape
                    .shape
                    .check()
                    .map_err(|source| InstanceError::ItemShape {
                        item_type_id,
                        shape_pos,
                        source,
                    })?;
                let (shape_min, shape_max) =
                    item_shape.shape.shape.compute_min_max(0.0, false);
                for (hole_pos, hole) in item_shape.shape.holes.iter().enumerate() {
                    let (hole_min, hole_max) = hole.compute_min_max(0.0, false);
                    if hole_min.x < shape_min.x
                        || hole_min.y < shape_min.y
                        || hole_max.x > shape_max.x
                        || hole_max.y > shape_max.y
                    {
                        return Err(InstanceError::HoleOutsideShape {
                            item_type_id,
                            shape_pos,
                            hole_pos,
                        });
                    }
                }
                area += item_shape.shape.compute_area();
            }
            if area <= 0.0 {
                return Err(InstanceError::NonPositiveItemArea { item_type_id, area });
            }
        }

        // Common numeric base: the largest bin dimension lands in
        // [1e3, 1e4).
        let mut max_dimension: f64 = 0.0;
        for bin_type in &self.bin_types {
            let (mn, mx) = bin_type.shape.compute_min_max(0.0, false);
            max_dimension = max_dimension.max(mx.x - mn.x).max(mx.y - mn.y);
        }
        let scale = if max_dimension > 0.0 {
            10f64.powf((1e3 / max_dimension).log10().ceil())
        } else {
            1.0
        };

        let r_item = self.parameters.item_item_minimum_spacing * scale / 2.0;
        let r_bin = self.parameters.item_bin_minimum_spacing * scale - r_item;

        // Build the item types.
        let mut item_types: Vec<ItemType> = Vec::with_capacity(self.item_types.len());
        for raw in &self.item_types {
            let mut shapes: Vec<ItemShape> = Vec::new();
            let mut area_orig = 0.0;
            for raw_shape in &raw.shapes {
                let shape_orig = raw_shape.shape.clone();
                area_orig += shape_orig.compute_area();
                let shape_scaled = ShapeWithHoles {
                    shape: scale_shape(&shape_orig.shape, scale),
                    holes: shape_orig
                        .holes
                        .iter()
                        .map(|hole| scale_shape(hole, scale))
                        .collect(),
                };
                let shape_inflated = inflate_item_shape(&shape_scaled, r_item);
                shapes.push(ItemShape {
                    shape_orig,
                    shape_scaled,
                    shape_inflated,
                    quality_rule: raw_shape.quality_rule,
                });
            }
            let scaled_shapes: Vec<&Shape> =
                shapes.iter().map(|s| &s.shape_scaled.shape).collect();
            let hull_polygons: Vec<Shape> = scaled_shapes
                .iter()
                .map(|shape| shape.approximate_by_line_segments(32, false))
                .collect();
            let convex_hull_area_scaled =
                shapes_convex_hull_area(&hull_polygons.iter().collect::<Vec<_>>());
            item_types.push(ItemType {
                shapes,
                allowed_rotations: raw.allowed_rotations.clone(),
                allow_mirroring: raw.allow_mirroring,
                profit: raw.profit.unwrap_or(area_orig),
                copies: raw.copies,
                area_orig,
                area_scaled: area_orig * scale * scale,
                convex_hull_area_scaled,
            });
        }

        let number_of_items: usize = item_types.iter().map(|item_type| item_type.copies).sum();

        // Build the bin types.
        let mut bin_types: Vec<BinType> = Vec::with_capacity(self.bin_types.len());
        for (bin_type_id, raw) in self.bin_types.iter().enumerate() {
            let shape_orig = raw.shape.clone();
            let area_orig = shape_orig.compute_area();
            let shape_scaled = scale_shape(&shape_orig, scale);
            let polygonal = clean_shape(
                &shape_scaled.approximate_by_line_segments(SEGMENTS_PER_CIRCLE, false),
            );
            let shape_inflated = offset_shape(&polygonal, -r_bin)
                .map(|shape| clean_shape(&shape))
                .map_err(|_| InstanceError::BinCollapsed { bin_type_id })?;
            let (mn, mx) = shape_scaled.compute_min_max(0.0, false);

            let mut defects: Vec<Defect> = Vec::new();
            for raw_defect in &raw.defects {
                let shape_orig = raw_defect.shape.clone();
                let shape_scaled = ShapeWithHoles {
                    shape: scale_shape(&shape_orig.shape, scale),
                    holes: shape_orig
                        .holes
                        .iter()
                        .map(|hole| scale_shape(hole, scale))
                        .collect(),
                };
                let shape_inflated = inflate_defect(&shape_scaled, r_bin);
                defects.push(Defect {
                    shape_orig,
                    shape_scaled,
                    shape_inflated,
                    defect_type: raw_defect.defect_type,
                });
            }

            bin_types.push(BinType {
                shape_orig,
                shape_scaled,
                shape_inflated,
                defects,
                cost: raw.cost.unwrap_or(area_orig),
                copies: raw.copies.unwrap_or(number_of_items.max(1)),
                copies_min: raw.copies_min,
                area_orig,
                area_scaled: area_orig * scale * scale,
                x_min: mn.x,
                x_max: mx.x,
                y_min: mn.y,
                y_max: mx.y,
            });
        }

        // Open-dimension objectives need exactly one bin.
        if matches!(
            objective,
            Objective::OpenDimensionX | Objective::OpenDimensionY | Objective::OpenDimensionXY
        ) {
            let number_of_bins: usize = bin_types.iter().map(|bin_type| bin_type.copies).sum();
            if number_of_bins != 1 {
                return Err(InstanceError::OpenDimensionBins {
                    objective,
                    number_of_bins,
                });
            }
        }

        // Aggregates.
        let mut number_of_defects = 0;
        let mut number_of_rectangular_items = 0;
        let mut number_of_circular_items = 0;
        let mut item_area_orig = 0.0;
        let mut item_profit = 0.0;
        let mut smallest_item_area_scaled = f64::INFINITY;
        let mut largest_item_area_scaled: f64 = 0.0;
        let mut largest_item_profit: f64 = 0.0;
        let mut largest_item_copies: usize = 0;
        let mut max_efficiency_item_type_id: Option<usize> = None;
        let mut all_item_types_infinite_copies = !item_types.is_empty();
        let bin_types_area_scaled_max = bin_types
            .iter()
            .map(|bin_type| bin_type.area_scaled)
            .fold(0.0, f64::max);
        for (item_type_id, item_type) in item_types.iter().enumerate() {
            match item_type.shape_type() {
                ShapeType::Square | ShapeType::Rectangle => {
                    number_of_rectangular_items += item_type.copies;
                }
                ShapeType::Circle => {
                    number_of_circular_items += item_type.copies;
                }
                _ => {}
            }
            item_area_orig += item_type.copies as f64 * item_type.area_orig;
            item_profit += item_type.copies as f64 * item_type.profit;
            smallest_item_area_scaled = smallest_item_area_scaled.min(item_type.area_scaled);
            largest_item_area_scaled = largest_item_area_scaled.max(item_type.area_scaled);
            largest_item_profit = largest_item_profit.max(item_type.profit);
            largest_item_copies = largest_item_copies.max(item_type.copies);
            let efficiency = item_type.profit / item_type.area_scaled;
            let better = match max_efficiency_item_type_id {
                None => true,
                Some(best) => {
                    item_types[best].profit / item_types[best].area_scaled < efficiency
                }
            };
            if better {
                max_efficiency_item_type_id = Some(item_type_id);
            }
            let infinite_threshold =
                ((bin_types_area_scaled_max - 1.0) / item_type.area_scaled + 1.0) as usize;
            if item_type.copies < infinite_threshold {
                all_item_types_infinite_copies = false;
            }
        }

        // Drop deflated holes smaller than the smallest item: nothing can
        // fit in them, so they need not constrain the search.
        if smallest_item_area_scaled.is_finite() {
            for item_type in &mut item_types {
                for item_shape in &mut item_type.shapes {
                    item_shape
                        .shape_inflated
                        .holes
                        .retain(|hole| hole.compute_area().abs() >= smallest_item_area_scaled);
                }
            }
        }

        let mut bin_area_orig = 0.0;
        let mut bin_area_scaled = 0.0;
        let mut largest_bin_cost: f64 = 0.0;
        let mut bin_type_ids: Vec<usize> = Vec::new();
        let mut previous_bins_area: Vec<f64> = Vec::new();
        let mut previous = 0.0;
        for (bin_type_id, bin_type) in bin_types.iter().enumerate() {
            bin_area_orig += bin_type.copies as f64 * bin_type.area_orig;
            bin_area_scaled += bin_type.copies as f64 * bin_type.area_scaled;
            largest_bin_cost = largest_bin_cost.max(bin_type.cost);
            number_of_defects += bin_type.defects.len();
            for _ in 0..bin_type.copies {
                bin_type_ids.push(bin_type_id);
                previous_bins_area.push(previous);
                previous += bin_type.area_scaled;
            }
        }

        let item_area_scaled = item_area_orig * scale * scale;
        Ok(Instance {
            objective,
            parameters: self.parameters,
            scale,
            item_types,
            bin_types,
            number_of_items,
            number_of_defects,
            number_of_rectangular_items,
            number_of_circular_items,
            bin_type_ids,
            previous_bins_area,
            item_area_orig,
            item_area_scaled,
            bin_area_orig,
            bin_area_scaled,
            item_profit,
            smallest_item_area_scaled,
            largest_item_area_scaled,
            largest_item_profit,
            largest_item_copies,
            largest_bin_cost,
            max_efficiency_item_type_id,
            all_item_types_infinite_copies,
        })
    }
}

/// Scale every coordinate of a shape.
fn scale_shape(shape: &Shape, scale: f64) -> Shape {
    if scale == 1.0 {
        return shape.clone();
    }
    Shape {
        elements: shape
            .elements
            .iter()
            .map(|element| ShapeElement {
                start: Point::new(element.start.x * scale, element.start.y * scale),
                end: Point::new(element.end.x * scale, element.end.y * scale),
                center: Point::new(element.center.x * scale, element.center.y * scale),
                ..*element
            })
            .collect(),
    }
}

/// Inflate a scaled item sub-region by `r` and deflate its holes; the
/// result is polygonal and cleaned.
fn inflate_item_shape(shape_scaled: &ShapeWithHoles, r: f64) -> ShapeWithHoles {
    let outer = offset_shape(&shape_scaled.shape, r)
        .unwrap_or_else(|_| shape_scaled.shape.clone())
        .approximate_by_line_segments(SEGMENTS_PER_CIRCLE, true);
    let outer = clean_shape(&outer);
    let holes = shape_scaled
        .holes
        .iter()
        .filter_map(|hole| deflate_hole(hole, r))
        .map(|hole| clean_shape(&hole.approximate_by_line_segments(SEGMENTS_PER_CIRCLE, false)))
        .collect();
    ShapeWithHoles {
        shape: outer,
        holes,
    }
}

/// Apply the item-bin spacing offset to a scaled defect; a negative offset
/// that collapses the defect falls back to the scaled shape.
fn inflate_defect(shape_scaled: &ShapeWithHoles, r: f64) -> ShapeWithHoles {
    let outer = offset_shape(&shape_scaled.shape, r)
        .unwrap_or_else(|_| shape_scaled.shape.clone())
        .approximate_by_line_segments(SEGMENTS_PER_CIRCLE, true);
    let outer = clean_shape(&outer);
    let holes = shape_scaled
        .holes
        .iter()
        .filter_map(|hole| deflate_hole(hole, r))
        .map(|hole| clean_shape(&hole.approximate_by_line_segments(SEGMENTS_PER_CIRCLE, false)))
        .collect();
    ShapeWithHoles {
        shape: outer,
        holes,
    }
}

/// Decode a `<Shape>` JSON object.
fn read_shape(json_item: &Value) -> Result<Shape, InstanceError> {
    let shape_type = json_item
        .get("type")
        .and_then(Value::as_str)
        .ok_or(InstanceError::MissingKey("type"))?;
    match shape_type {
        "circle" => {
            let radius = json_item
                .get("radius")
                .and_then(Value::as_f64)
                .ok_or(InstanceError::MissingKey("radius"))?;
            Ok(Shape::circle(radius))
        }
        "rectangle" => {
            let width = json_item
                .get("width")
                .and_then(Value::as_f64)
                .ok_or(InstanceError::MissingKey("width"))?;
            let height = json_item
                .get("height")
                .and_then(Value::as_f64)
                .ok_or(InstanceError::MissingKey("height"))?;
            Ok(Shape::rectangle(width, height))
        }
        "polygon" => {
            let vertices = json_item
                .get("vertices")
                .and_then(Value::as_array)
                .ok_or(InstanceError::MissingKey("vertices"))?;
            let mut points: Vec<(f64, f64)> = Vec::with_capacity(vertices.len());
            for vertex in vertices {
                let x = vertex
                    .get("x")
                    .and_then(Value::as_f64)
                    .ok_or(InstanceError::MissingKey("vertices.x"))?;
                let y = vertex
                    .get("y")
                    .and_then(Value::as_f64)
                    .ok_or(InstanceError::MissingKey("vertices.y"))?;
                points.push((x, y));
            }
            Ok(Shape::polygon(&points))
        }
        "general" => {
            let elements = json_item
                .get("elements")
                .and_then(Value::as_array)
                .ok_or(InstanceError::MissingKey("elements"))?;
            let mut shape = Shape::default();
            for json_element in elements {
                let kind = json_element
                    .get("type")
                    .and_then(Value::as_str)
                    .ok_or(InstanceError::MissingKey("elements.type"))?;
                let start = read_point(json_element.get("start"), "start")?;
                let end = read_point(json_element.get("end"), "end")?;
                match kind {
                    "LineSegment" => shape.elements.push(ShapeElement::line(start, end)),
                    "CircularArc" => {
                        let center = read_point(json_element.get("center"), "center")?;
                        let anticlockwise = json_element
                            .get("anticlockwise")
                            .and_then(Value::as_bool)
                            .unwrap_or(true);
                        shape
                            .elements
                            .push(ShapeElement::arc(start, end, center, anticlockwise));
                    }
                    other => return Err(InstanceError::UnknownShapeType(other.to_string())),
                }
            }
            Ok(shape)
        }
        other => Err(InstanceError::UnknownShapeType(other.to_string())),
    }
}

fn read_point(json: Option<&Value>, key: &'static str) -> Result<Point, InstanceError> {
    let json = json.ok_or(InstanceError::MissingKey(key))?;
    let x = json
        .get("x")
        .and_then(Value::as_f64)
        .ok_or(InstanceError::MissingKey(key))?;
    let y = json
        .get("y")
        .and_then(Value::as_f64)
        .ok_or(InstanceError::MissingKey(key))?;
    Ok(Point::new(x, y))
}

/// Decode the optional holes of a shape-bearing JSON object.
fn read_holes(json_item: &Value) -> Result<Vec<Shape>, InstanceError> {
    let mut holes = Vec::new();
    if let Some(json_holes) = json_item.get("holes").and_then(Value::as_array) {
        for json_hole in json_holes {
            holes.push(read_shape(json_hole)?);
        }
    }
    Ok(holes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square_item() -> Vec<(ShapeWithHoles, Option<usize>)> {
        vec![(
            ShapeWithHoles {
                shape: Shape::rectangle(1.0, 1.0),
                holes: Vec::new(),
            },
            None,
        )]
    }

    #[test]
    fn copies_min_validation() {
        let mut builder = InstanceBuilder::new();
        builder.set_objective(Objective::BinPacking);
        builder.add_bin_type(Shape::rectangle(10.0, 10.0), None, Some(1), 2);
        builder.add_item_type(unit_square_item(), None, 1, Vec::new());
        assert!(matches!(
            builder.build(),
            Err(InstanceError::BinCopies { .. })
        ));
    }

    #[test]
    fn open_dimension_needs_one_bin() {
        let mut builder = InstanceBuilder::new();
        builder.set_objective(Objective::OpenDimensionX);
        builder.add_bin_type(Shape::rectangle(10.0, 10.0), None, Some(2), 0);
        builder.add_item_type(unit_square_item(), None, 1, Vec::new());
        assert!(matches!(
            builder.build(),
            Err(InstanceError::OpenDimensionBins { .. })
        ));
    }

    #[test]
    fn self_intersecting_item_shape_is_rejected() {
        let bowtie = Shape::polygon(&[(0.0, 0.0), (4.0, 0.0), (1.0, 2.0), (3.0, 2.0)]);
        let mut builder = InstanceBuilder::new();
        builder.set_objective(Objective::BinPacking);
        builder.add_bin_type(Shape::rectangle(10.0, 10.0), None, Some(1), 0);
        builder.add_item_type(
            vec![(
                ShapeWithHoles {
                    shape: bowtie,
                    holes: Vec::new(),
                },
                None,
            )],
            None,
            1,
            Vec::new(),
        );
        assert!(matches!(
            builder.build(),
            Err(InstanceError::ItemShape { .. })
        ));
    }

    #[test]
    fn self_intersecting_bin_shape_is_rejected() {
        let bowtie = Shape::polygon(&[(0.0, 0.0), (4.0, 0.0), (1.0, 2.0), (3.0, 2.0)]);
        let mut builder = InstanceBuilder::new();
        builder.set_objective(Objective::BinPacking);
        builder.add_bin_type(bowtie, None, Some(1), 0);
        builder.add_item_type(unit_square_item(), None, 1, Vec::new());
        assert!(matches!(builder.build(), Err(InstanceError::BinShape { .. })));
    }

    #[test]
    fn self_intersecting_defect_shape_is_rejected() {
        let bowtie = Shape::polygon(&[(0.0, 0.0), (4.0, 0.0), (1.0, 2.0), (3.0, 2.0)])
            .translate(2.0, 2.0);
        let mut builder = InstanceBuilder::new();
        builder.set_objective(Objective::BinPacking);
        let bin_type_id = builder.add_bin_type(Shape::rectangle(10.0, 10.0), None, Some(1), 0);
        builder.add_defect(
            bin_type_id,
            0,
            ShapeWithHoles {
                shape: bowtie,
                holes: Vec::new(),
            },
        );
        builder.add_item_type(unit_square_item(), None, 1, Vec::new());
        assert!(matches!(
            builder.build(),
            Err(InstanceError::DefectShape { .. })
        ));
    }

    #[test]
    fn defaults_profit_to_area_and_cost_to_area() {
        let mut builder = InstanceBuilder::new();
        builder.set_objective(Objective::Knapsack);
        builder.add_bin_type(Shape::rectangle(10.0, 5.0), None, Some(1), 0);
        builder.add_item_type(unit_square_item(), None, 2, Vec::new());
        let instance = builder.build().unwrap();
        assert_eq!(instance.bin_type(0).cost, 50.0);
        assert_eq!(instance.item_type(0).profit, 1.0);
        assert_eq!(instance.number_of_items(), 2);
        assert_eq!(instance.item_profit(), 2.0);
    }

    #[test]
    fn scaling_lands_in_the_numeric_base() {
        let mut builder = InstanceBuilder::new();
        builder.set_objective(Objective::BinPacking);
        builder.add_bin_type(Shape::rectangle(4.0, 2.0), None, Some(1), 0);
        builder.add_item_type(unit_square_item(), None, 1, Vec::new());
        let instance = builder.build().unwrap();
        let max_dimension = (instance.bin_type(0).x_max - instance.bin_type(0).x_min)
            .max(instance.bin_type(0).y_max - instance.bin_type(0).y_min);
        assert!((1e3..1e4).contains(&max_dimension));
    }

    #[test]
    fn json_round_trip_of_a_small_instance() {
        let json: Value = serde_json::from_str(
            r#"{
                "objective": "bin-packing",
                "parameters": {
                    "item_item_minimum_spacing": 0.0,
                    "item_bin_minimum_spacing": 0.0
                },
                "bin_types": [
                    { "type": "rectangle", "width": 10, "height": 10, "copies": 2 }
                ],
                "item_types": [
                    { "type": "polygon",
                      "vertices": [
                          {"x": 0, "y": 0}, {"x": 2, "y": 0}, {"x": 1, "y": 2}],
                      "copies": 3,
                      "allowed_rotations": [{"start": 0, "end": 0}, {"start": 90, "end": 90}] },
                    { "type": "circle", "radius": 1.5 }
                ]
            }"#,
        )
        .unwrap();
        let mut builder = InstanceBuilder::new();
        builder.read_json(&json).unwrap();
        let instance = builder.build().unwrap();
        assert_eq!(instance.objective(), Objective::BinPacking);
        assert_eq!(instance.number_of_bin_types(), 1);
        assert_eq!(instance.number_of_bins(), 2);
        assert_eq!(instance.number_of_item_types(), 2);
        assert_eq!(instance.number_of_items(), 4);
        let rotations = &instance.item_type(0).allowed_rotations;
        assert_eq!(rotations.len(), 2);
        assert!((rotations[1].0 - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((instance.item_type(1).area_orig - std::f64::consts::PI * 2.25).abs() < 1e-3);
    }

    #[test]
    fn missing_required_key_is_reported() {
        let json: Value = serde_json::from_str(
            r#"{ "bin_types": [ { "type": "rectangle", "width": 10 } ], "item_types": [] }"#,
        )
        .unwrap();
        let mut builder = InstanceBuilder::new();
        let error = builder.read_json(&json).unwrap_err();
        assert!(error.to_string().contains("height"));
    }
}
