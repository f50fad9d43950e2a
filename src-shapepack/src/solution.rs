//! Solution container: populated bins with item placements.
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
//! Placements are stored in original (unscaled) coordinates so that the
//! certificate files are self-contained.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use shapepack_geometry::eps::{equal, strictly_greater, strictly_lesser};
use shapepack_geometry::point::Point;
use shapepack_geometry::shape::Shape;
use shapepack_geometry::svg::shape_to_svg;

use crate::instance::{Instance, Objective};
use crate::output::write_text_atomic;

/// Errors raised when assembling a solution.
#[derive(Debug, thiserror::Error)]
pub enum SolutionError {
    #[error("invalid item_type_id {0}")]
    InvalidItemTypeId(usize),

    #[error("invalid bin_type_id {0}")]
    InvalidBinTypeId(usize),

    #[error("invalid bin_pos {0}")]
    InvalidBinPos(usize),

    #[error("angle {angle} is not allowed for item type {item_type_id}")]
    AngleNotAllowed { item_type_id: usize, angle: f64 },

    #[error("mirroring is not allowed for item type {item_type_id}")]
    MirrorNotAllowed { item_type_id: usize },

    #[error("unable to open file \"{0}\": {1}")]
    File(String, std::io::Error),

    #[error("invalid JSON in \"{0}\": {1}")]
    Json(String, serde_json::Error),

    #[error("missing key \"{0}\" in certificate")]
    MissingKey(&'static str),
}

/// One placed item.
#[derive(Debug, Clone, Copy)]
pub struct SolutionItem {
    pub item_type_id: usize,
    /// Translation applied to the rotated (and possibly mirrored) item, in
    /// original coordinates.
    pub bl_corner: Point,
    /// Rotation angle in radians.
    pub angle: f64,
    pub mirror: bool,
}

/// One populated bin.
#[derive(Debug, Clone)]
pub struct SolutionBin {
    pub bin_type_id: usize,
    pub copies: usize,
    pub items: Vec<SolutionItem>,
}

/// A (possibly partial) solution.
#[derive(Clone)]
pub struct Solution {
    instance: Arc<Instance>,
    bins: Vec<SolutionBin>,

    bin_copies: Vec<usize>,
    item_copies: Vec<usize>,

    number_of_bins: usize,
    number_of_items: usize,
    bin_cost: f64,
    bin_area: f64,
    item_area: f64,
    item_profit: f64,

    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    leftover_value: f64,
}

impl Solution {
    pub fn new(instance: Arc<Instance>) -> Self {
        let number_of_item_types = instance.number_of_item_types();
        let number_of_bin_types = instance.number_of_bin_types();
        Solution {
            instance,
            bins: Vec::new(),
            bin_copies: vec![0; number_of_bin_types],
            item_copies: vec![0; number_of_item_types],
            number_of_bins: 0,
            number_of_items: 0,
            bin_cost: 0.0,
            bin_area: 0.0,
            item_area: 0.0,
            item_profit: 0.0,
            x_min: f64::INFINITY,
            x_max: f64::NEG_INFINITY,
            y_min: f64::INFINITY,
            y_max: f64::NEG_INFINITY,
            leftover_value: 0.0,
        }
    }

    /// Read a solution back from a certificate file.
    pub fn from_file(instance: Arc<Instance>, certificate_path: &Path) -> Result<Self, SolutionError> {
        let content = std::fs::read_to_string(certificate_path)
            .map_err(|e| SolutionError::File(certificate_path.display().to_string(), e))?;
        let json: Value = serde_json::from_str(&content)
            .map_err(|e| SolutionError::Json(certificate_path.display().to_string(), e))?;

        let mut solution = Solution::new(instance);
        let bins = json
            .get("bins")
            .and_then(Value::as_array)
            .ok_or(SolutionError::MissingKey("bins"))?;
        for json_bin in bins {
            let bin_type_id = json_bin
                .get("id")
                .and_then(Value::as_u64)
                .ok_or(SolutionError::MissingKey("bins.id"))? as usize;
            let copies = json_bin.get("copies").and_then(Value::as_u64).unwrap_or(1) as usize;
            let bin_pos = solution.add_bin(bin_type_id, copies)?;
            if let Some(items) = json_bin.get("items").and_then(Value::as_array) {
                for json_item in items {
                    let item_type_id = json_item
                        .get("id")
                        .and_then(Value::as_u64)
                        .ok_or(SolutionError::MissingKey("items.id"))?
                        as usize;
                    let x = json_item
                        .get("x")
                        .and_then(Value::as_f64)
                        .ok_or(SolutionError::MissingKey("items.x"))?;
                    let y = json_item
                        .get("y")
                        .and_then(Value::as_f64)
                        .ok_or(SolutionError::MissingKey("items.y"))?;
                    let angle = json_item.get("angle").and_then(Value::as_f64).unwrap_or(0.0);
                    let mirror = json_item
                        .get("mirror")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    solution.add_item(bin_pos, item_type_id, Point::new(x, y), angle, mirror)?;
                }
            }
        }
        Ok(solution)
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    /// Open a new bin; returns its position among the different bins.
    pub fn add_bin(&mut self, bin_type_id: usize, copies: usize) -> Result<usize, SolutionError> {
        if bin_type_id >= self.instance.number_of_bin_types() {
            return Err(SolutionError::InvalidBinTypeId(bin_type_id));
        }
        let bin_type = self.instance.bin_type(bin_type_id);
        self.bins.push(SolutionBin {
            bin_type_id,
            copies,
            items: Vec::new(),
        });
        self.bin_copies[bin_type_id] += copies;
        self.number_of_bins += copies;
        self.bin_cost += copies as f64 * bin_type.cost;
        self.bin_area += copies as f64 * bin_type.area_orig;
        self.x_min = f64::INFINITY;
        self.x_max = f64::NEG_INFINITY;
        self.y_min = f64::INFINITY;
        self.y_max = f64::NEG_INFINITY;
        Ok(self.bins.len() - 1)
    }

    /// Place an item into a bin; validates the id, the angle against the
    /// allowed rotations and the mirror flag.
    pub fn add_item(
        &mut self,
        bin_pos: usize,
        item_type_id: usize,
        bl_corner: Point,
        angle: f64,
        mirror: bool,
    ) -> Result<(), SolutionError> {
        if bin_pos >= self.bins.len() {
            return Err(SolutionError::InvalidBinPos(bin_pos));
        }
        if item_type_id >= self.instance.number_of_item_types() {
            return Err(SolutionError::InvalidItemTypeId(item_type_id));
        }
        let instance = Arc::clone(&self.instance);
        let item_type = instance.item_type(item_type_id);

        let angle_ok = item_type
            .allowed_rotations
            .iter()
            .any(|&(start, end)| {
                (start <= angle + 1e-9 && angle <= end + 1e-9)
                    || equal(start, angle)
                    || equal(end, angle)
            });
        if !angle_ok {
            return Err(SolutionError::AngleNotAllowed {
                item_type_id,
                angle,
            });
        }
        if mirror && !item_type.allow_mirroring {
            return Err(SolutionError::MirrorNotAllowed { item_type_id });
        }

        let bin_copies = self.bins[bin_pos].copies;
        self.bins[bin_pos].items.push(SolutionItem {
            item_type_id,
            bl_corner,
            angle,
            mirror,
        });
        self.item_area += bin_copies as f64 * item_type.area_orig;
        self.item_profit += bin_copies as f64 * item_type.profit;
        self.number_of_items += bin_copies;
        self.item_copies[item_type_id] += bin_copies;

        if bin_pos == self.bins.len() - 1 {
            let (mn, mx) = item_type.compute_min_max_orig(angle, mirror);
            self.x_min = self.x_min.min(bl_corner.x + mn.x);
            self.y_min = self.y_min.min(bl_corner.y + mn.y);
            self.x_max = self.x_max.max(bl_corner.x + mx.x);
            self.y_max = self.y_max.max(bl_corner.y + mx.y);

            let bin_type = instance.bin_type(self.bins[bin_pos].bin_type_id);
            let scale = instance.scale();
            let bin_x_min = bin_type.x_min / scale;
            let bin_x_max = bin_type.x_max / scale;
            let bin_y_min = bin_type.y_min / scale;
            let bin_y_max = bin_type.y_max / scale;
            self.leftover_value = (bin_x_max - bin_x_min) * (bin_y_max - bin_y_min)
                - (self.x_max - bin_x_min) * (bin_y_max - bin_y_min);
        }
        Ok(())
    }

    /// Append one bin of another solution, remapping ids when the other
    /// solution was built on a sub-instance.
    pub fn append(
        &mut self,
        other: &Solution,
        bin_pos: usize,
        copies: usize,
        bin_type_ids: &[usize],
        item_type_ids: &[usize],
    ) -> Result<(), SolutionError> {
        if bin_pos >= other.bins.len() {
            return Err(SolutionError::InvalidBinPos(bin_pos));
        }
        let other_bin = &other.bins[bin_pos];
        let bin_type_id = if bin_type_ids.is_empty() {
            other_bin.bin_type_id
        } else {
            bin_type_ids[other_bin.bin_type_id]
        };
        let new_bin_pos = self.add_bin(bin_type_id, copies)?;
        for item in &other_bin.items {
            let item_type_id = if item_type_ids.is_empty() {
                item.item_type_id
            } else {
                item_type_ids[item.item_type_id]
            };
            self.add_item(
                new_bin_pos,
                item_type_id,
                item.bl_corner,
                item.angle,
                item.mirror,
            )?;
        }
        Ok(())
    }

    /// Append all bins of another solution.
    pub fn append_all(
        &mut self,
        other: &Solution,
        bin_type_ids: &[usize],
        item_type_ids: &[usize],
    ) -> Result<(), SolutionError> {
        for bin_pos in 0..other.bins.len() {
            let copies = other.bins[bin_pos].copies;
            self.append(other, bin_pos, copies, bin_type_ids, item_type_ids)?;
        }
        Ok(())
    }

    pub fn bins(&self) -> &[SolutionBin] {
        &self.bins
    }
    pub fn bin(&self, bin_pos: usize) -> &SolutionBin {
        &self.bins[bin_pos]
    }
    pub fn number_of_different_bins(&self) -> usize {
        self.bins.len()
    }
    pub fn number_of_bins(&self) -> usize {
        self.number_of_bins
    }
    pub fn number_of_items(&self) -> usize {
        self.number_of_items
    }
    pub fn item_copies(&self, item_type_id: usize) -> usize {
        self.item_copies[item_type_id]
    }
    pub fn bin_copies(&self, bin_type_id: usize) -> usize {
        self.bin_copies[bin_type_id]
    }
    pub fn profit(&self) -> f64 {
        self.item_profit
    }
    pub fn cost(&self) -> f64 {
        self.bin_cost
    }
    pub fn item_area(&self) -> f64 {
        self.item_area
    }
    pub fn bin_area(&self) -> f64 {
        self.bin_area
    }
    pub fn leftover_value(&self) -> f64 {
        self.leftover_value
    }
    pub fn x_min(&self) -> f64 {
        self.x_min
    }
    pub fn x_max(&self) -> f64 {
        self.x_max
    }
    pub fn y_min(&self) -> f64 {
        self.y_min
    }
    pub fn y_max(&self) -> f64 {
        self.y_max
    }

    /// True when every item of the instance is placed.
    pub fn full(&self) -> bool {
        self.number_of_items == self.instance.number_of_items()
    }

    pub fn full_waste(&self) -> f64 {
        self.bin_area - self.item_area
    }

    pub fn full_waste_percentage(&self) -> f64 {
        if self.bin_area == 0.0 {
            return 0.0;
        }
        self.full_waste() / self.bin_area
    }

    /// Density of the used area when the last bin is cut at `x_max`.
    pub fn density_x(&self) -> f64 {
        let mut area = self.bin_area;
        if let Some(last) = self.bins.last() {
            let bin_type = self.instance.bin_type(last.bin_type_id);
            let scale = self.instance.scale();
            area -= bin_type.area_orig;
            area += (self.x_max - bin_type.x_min / scale) * (bin_type.y_max - bin_type.y_min)
                / scale;
        }
        if area == 0.0 {
            return 0.0;
        }
        self.item_area / area
    }

    /// Density of the used area when the last bin is cut at `y_max`.
    pub fn density_y(&self) -> f64 {
        let mut area = self.bin_area;
        if let Some(last) = self.bins.last() {
            let bin_type = self.instance.bin_type(last.bin_type_id);
            let scale = self.instance.scale();
            area -= bin_type.area_orig;
            area += (self.y_max - bin_type.y_min / scale) * (bin_type.x_max - bin_type.x_min)
                / scale;
        }
        if area == 0.0 {
            return 0.0;
        }
        self.item_area / area
    }

    /// True when this solution is strictly better than `other` under the
    /// instance objective.
    pub fn better_than(&self, other: &Solution) -> bool {
        match self.instance.objective() {
            Objective::BinPacking => {
                if !self.full() {
                    return false;
                }
                if !other.full() {
                    return true;
                }
                self.number_of_bins < other.number_of_bins
            }
            Objective::BinPackingWithLeftovers => {
                if !self.full() {
                    return false;
                }
                if !other.full() {
                    return true;
                }
                if self.number_of_bins != other.number_of_bins {
                    return self.number_of_bins < other.number_of_bins;
                }
                strictly_greater(self.leftover_value, other.leftover_value)
            }
            Objective::OpenDimensionX | Objective::OpenDimensionXY => {
                if !self.full() {
                    return false;
                }
                if !other.full() {
                    return true;
                }
                strictly_lesser(self.x_max, other.x_max)
            }
            Objective::OpenDimensionY => {
                if !self.full() {
                    return false;
                }
                if !other.full() {
                    return true;
                }
                strictly_lesser(self.y_max, other.y_max)
            }
            Objective::Knapsack => strictly_greater(self.profit(), other.profit()),
            Objective::VariableSizedBinPacking => {
                if !self.full() {
                    return false;
                }
                if !other.full() {
                    return true;
                }
                strictly_lesser(self.cost(), other.cost())
            }
        }
    }

    /// Key solution metrics as JSON.
    pub fn to_json(&self) -> Value {
        json!({
            "NumberOfItems": self.number_of_items,
            "ItemArea": self.item_area,
            "ItemProfit": self.item_profit,
            "NumberOfBins": self.number_of_bins,
            "BinArea": self.bin_area,
            "BinCost": self.bin_cost,
            "FullWaste": self.full_waste(),
            "FullWastePercentage": self.full_waste_percentage(),
            "XMin": finite_or_zero(self.x_min),
            "YMin": finite_or_zero(self.y_min),
            "XMax": finite_or_zero(self.x_max),
            "YMax": finite_or_zero(self.y_max),
            "DensityX": self.density_x(),
            "DensityY": self.density_y(),
            "LeftoverValue": self.leftover_value,
        })
    }

    /// Write the solution certificate; every shape element carries world
    /// coordinates so the file is self-contained.
    pub fn write(&self, certificate_path: &Path) -> Result<(), SolutionError> {
        let mut json_bins: Vec<Value> = Vec::new();
        for bin in &self.bins {
            let bin_type = self.instance.bin_type(bin.bin_type_id);

            let mut json_defects: Vec<Value> = Vec::new();
            for defect in &bin_type.defects {
                json_defects.push(json!({
                    "shape": shape_elements_to_json(&defect.shape_orig.shape, Point::default()),
                    "holes": defect
                        .shape_orig
                        .holes
                        .iter()
                        .map(|hole| shape_elements_to_json(hole, Point::default()))
                        .collect::<Vec<Value>>(),
                }));
            }

            let mut json_items: Vec<Value> = Vec::new();
            for item in &bin.items {
                let item_type = self.instance.item_type(item.item_type_id);
                let mut json_shapes: Vec<Value> = Vec::new();
                for item_shape in &item_type.shapes {
                    let mut shape = item_shape.shape_orig.shape.clone();
                    if item.mirror {
                        shape = shape.axial_symmetry_y_axis();
                    }
                    shape = shape.rotate(item.angle);
                    let holes: Vec<Value> = item_shape
                        .shape_orig
                        .holes
                        .iter()
                        .map(|hole| {
                            let mut hole = hole.clone();
                            if item.mirror {
                                hole = hole.axial_symmetry_y_axis();
                            }
                            hole = hole.rotate(item.angle);
                            shape_elements_to_json(&hole, item.bl_corner)
                        })
                        .collect();
                    json_shapes.push(json!({
                        "shape": shape_elements_to_json(&shape, item.bl_corner),
                        "holes": holes,
                    }));
                }
                json_items.push(json!({
                    "id": item.item_type_id,
                    "x": item.bl_corner.x,
                    "y": item.bl_corner.y,
                    "angle": item.angle,
                    "mirror": item.mirror,
                    "item_shapes": json_shapes,
                }));
            }

            json_bins.push(json!({
                "id": bin.bin_type_id,
                "copies": bin.copies,
                "shape": shape_elements_to_json(&bin_type.shape_orig, Point::default()),
                "defects": json_defects,
                "items": json_items,
            }));
        }
        let json = json!({ "bins": json_bins });
        write_text_atomic(certificate_path, &serde_json::to_string_pretty(&json).unwrap())
            .map_err(|e| SolutionError::File(certificate_path.display().to_string(), e))
    }

    /// Write one bin as SVG: white bin, red defects, blue items with the
    /// item type id at the centroid.
    pub fn write_svg(&self, file_path: &Path, bin_pos: usize) -> Result<(), SolutionError> {
        if bin_pos >= self.bins.len() {
            return Err(SolutionError::InvalidBinPos(bin_pos));
        }
        let bin = &self.bins[bin_pos];
        let bin_type = self.instance.bin_type(bin.bin_type_id);
        let scale = self.instance.scale();
        let x_min = bin_type.x_min / scale;
        let x_max = bin_type.x_max / scale;
        let y_min = bin_type.y_min / scale;
        let y_max = bin_type.y_max / scale;
        let width = x_max - x_min;
        let height = y_max - y_min;
        let factor = if width > 0.0 { 1000.0 / width } else { 1.0 };

        let mut svg = format!(
            "<svg viewBox=\"{} {} {} {}\" version=\"1.1\" xmlns=\"http://www.w3.org/2000/svg\">\n",
            x_min * factor,
            -y_min * factor - height * factor,
            width * factor,
            height * factor
        );

        svg.push_str("<g>\n");
        svg.push_str(&shape_to_svg(&bin_type.shape_orig, &[], factor, "white"));
        for defect in &bin_type.defects {
            svg.push_str(&shape_to_svg(
                &defect.shape_orig.shape,
                &defect.shape_orig.holes,
                factor,
                "red",
            ));
        }
        svg.push_str("</g>\n");

        for item in &bin.items {
            let item_type = self.instance.item_type(item.item_type_id);
            svg.push_str("<g>\n");
            let mut x_mid = 0.0;
            let mut y_mid = 0.0;
            let mut count = 0.0;
            for item_shape in &item_type.shapes {
                let mut shape = item_shape.shape_orig.shape.clone();
                let mut holes = item_shape.shape_orig.holes.clone();
                if item.mirror {
                    shape = shape.axial_symmetry_y_axis();
                    holes = holes.iter().map(Shape::axial_symmetry_y_axis).collect();
                }
                shape = shape.rotate(item.angle).translate(item.bl_corner.x, item.bl_corner.y);
                holes = holes
                    .iter()
                    .map(|hole| hole.rotate(item.angle).translate(item.bl_corner.x, item.bl_corner.y))
                    .collect();
                let (mn, mx) = shape.compute_min_max(0.0, false);
                x_mid += (mn.x + mx.x) / 2.0;
                y_mid += (mn.y + mx.y) / 2.0;
                count += 1.0;
                svg.push_str(&shape_to_svg(&shape, &holes, factor, "blue"));
            }
            svg.push_str(&format!(
                "<text x=\"{}\" y=\"{}\" dominant-baseline=\"middle\" \
                 text-anchor=\"middle\" fill=\"white\">{}</text>\n",
                x_mid / count * factor,
                -y_mid / count * factor,
                item.item_type_id
            ));
            svg.push_str("</g>\n");
        }
        svg.push_str("</svg>\n");

        write_text_atomic(file_path, &svg)
            .map_err(|e| SolutionError::File(file_path.display().to_string(), e))
    }

    /// Print a human-readable description.
    pub fn format(&self, os: &mut dyn std::io::Write, verbosity_level: u8) -> std::io::Result<()> {
        if verbosity_level >= 1 {
            writeln!(
                os,
                "Number of items:  {} / {}",
                self.number_of_items,
                self.instance.number_of_items()
            )?;
            writeln!(os, "Item area:        {}", self.item_area)?;
            writeln!(os, "Item profit:      {}", self.item_profit)?;
            writeln!(
                os,
                "Number of bins:   {} / {}",
                self.number_of_bins,
                self.instance.number_of_bins()
            )?;
            writeln!(os, "Bin cost:         {}", self.bin_cost)?;
            writeln!(os, "Full waste:       {}", self.full_waste())?;
            writeln!(os, "Full waste (%):   {}", 100.0 * self.full_waste_percentage())?;
            writeln!(os, "Leftover value:   {}", self.leftover_value)?;
        }
        if verbosity_level >= 2 {
            writeln!(os)?;
            writeln!(
                os,
                "{:>12}{:>12}{:>12}{:>12}",
                "Bin", "Type", "Copies", "# items"
            )?;
            writeln!(
                os,
                "{:>12}{:>12}{:>12}{:>12}",
                "---", "----", "------", "-------"
            )?;
            for (bin_pos, bin) in self.bins.iter().enumerate() {
                writeln!(
                    os,
                    "{:>12}{:>12}{:>12}{:>12}",
                    bin_pos,
                    bin.bin_type_id,
                    bin.copies,
                    bin.items.len()
                )?;
            }
        }
        Ok(())
    }
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// Shape elements with the anchor translation applied, as certificate
/// JSON.
fn shape_elements_to_json(shape: &Shape, anchor: Point) -> Value {
    let elements: Vec<Value> = shape
        .elements
        .iter()
        .map(|element| {
            let mut json = json!({
                "type": element.kind.as_str(),
                "xs": element.start.x + anchor.x,
                "ys": element.start.y + anchor.y,
                "xe": element.end.x + anchor.x,
                "ye": element.end.y + anchor.y,
            });
            if element.kind == shapepack_geometry::element::ElementKind::CircularArc {
                json["xc"] = json!(element.center.x + anchor.x);
                json["yc"] = json!(element.center.y + anchor.y);
                json["anticlockwise"] = json!(element.anticlockwise);
            }
            json
        })
        .collect();
    Value::Array(elements)
}
