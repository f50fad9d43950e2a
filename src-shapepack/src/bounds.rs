//! Area-relaxation bounds.
//!
//! The geometry is relaxed to one dimension: every item becomes a segment
//! of width `ceil(scaled area)` and every bin a segment of width
//! `floor(scaled area)`. The roundings keep the bounds valid for the
//! two-dimensional problem.

use crate::instance::{Instance, Objective};

/// Upper bound on the reachable profit: fractional knapsack on the areas.
pub fn knapsack_area_bound(instance: &Instance) -> f64 {
    let mut capacity: f64 = 0.0;
    for bin_type in instance.bin_types() {
        capacity += bin_type.copies as f64 * bin_type.area_scaled.floor();
    }
    // Most profitable per unit of area first.
    let mut item_type_ids: Vec<usize> = (0..instance.number_of_item_types()).collect();
    item_type_ids.sort_by(|&a, &b| {
        let ea = instance.item_type(a).profit / instance.item_type(a).area_scaled;
        let eb = instance.item_type(b).profit / instance.item_type(b).area_scaled;
        eb.partial_cmp(&ea).unwrap()
    });
    let mut bound = 0.0;
    for item_type_id in item_type_ids {
        let item_type = instance.item_type(item_type_id);
        let width = item_type.area_scaled.ceil();
        for _ in 0..item_type.copies {
            if capacity <= 0.0 {
                return bound;
            }
            if width <= capacity {
                capacity -= width;
                bound += item_type.profit;
            } else {
                bound += item_type.profit * capacity / width;
                return bound;
            }
        }
    }
    bound
}

/// Lower bound on the number of bins: total item area over the largest bin
/// area.
pub fn bin_packing_area_bound(instance: &Instance) -> usize {
    let item_width: f64 = instance
        .item_types()
        .iter()
        .map(|item_type| item_type.copies as f64 * item_type.area_scaled.ceil())
        .sum();
    let bin_width = instance
        .bin_types()
        .iter()
        .map(|bin_type| bin_type.area_scaled.floor())
        .fold(0.0, f64::max);
    if bin_width <= 0.0 {
        return 0;
    }
    (item_width / bin_width).ceil() as usize
}

/// Lower bound on the total bin cost: fractional covering of the item area
/// by the cheapest bins per unit of area.
pub fn variable_sized_bin_packing_area_bound(instance: &Instance) -> f64 {
    let mut remaining: f64 = instance
        .item_types()
        .iter()
        .map(|item_type| item_type.copies as f64 * item_type.area_scaled.ceil())
        .sum();
    // Cheapest per unit of area first.
    let mut bin_type_ids: Vec<usize> = (0..instance.number_of_bin_types()).collect();
    bin_type_ids.sort_by(|&a, &b| {
        let ca = instance.bin_type(a).cost / instance.bin_type(a).area_scaled;
        let cb = instance.bin_type(b).cost / instance.bin_type(b).area_scaled;
        ca.partial_cmp(&cb).unwrap()
    });
    let mut bound = 0.0;
    for bin_type_id in bin_type_ids {
        let bin_type = instance.bin_type(bin_type_id);
        let width = bin_type.area_scaled.floor();
        if width <= 0.0 {
            continue;
        }
        for _ in 0..bin_type.copies {
            if remaining <= 0.0 {
                return bound;
            }
            if width <= remaining {
                remaining -= width;
                bound += bin_type.cost;
            } else {
                bound += bin_type.cost * remaining / width;
                return bound;
            }
        }
    }
    bound
}

/// Bound for the instance objective, if the relaxation proves one.
pub fn area_bound(instance: &Instance) -> AreaBound {
    match instance.objective() {
        Objective::Knapsack => AreaBound::Knapsack(knapsack_area_bound(instance)),
        Objective::BinPacking | Objective::BinPackingWithLeftovers => {
            AreaBound::BinPacking(bin_packing_area_bound(instance))
        }
        Objective::VariableSizedBinPacking => {
            AreaBound::VariableSizedBinPacking(variable_sized_bin_packing_area_bound(instance))
        }
        _ => AreaBound::None,
    }
}

/// The bound kinds published by the orchestrator.
pub enum AreaBound {
    Knapsack(f64),
    BinPacking(usize),
    VariableSizedBinPacking(f64),
    None,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance_builder::InstanceBuilder;
    use shapepack_geometry::shape::{Shape, ShapeWithHoles};

    fn square_item(side: f64) -> Vec<(ShapeWithHoles, Option<usize>)> {
        vec![(
            ShapeWithHoles {
                shape: Shape::rectangle(side, side),
                holes: Vec::new(),
            },
            None,
        )]
    }

    #[test]
    fn bin_packing_bound_counts_bins() {
        let mut builder = InstanceBuilder::new();
        builder.set_objective(crate::instance::Objective::BinPacking);
        builder.add_bin_type(Shape::rectangle(2.0, 2.0), None, Some(10), 0);
        // 10 unit squares, 4 per 2x2 bin: at least 3 bins.
        builder.add_item_type(square_item(1.0), None, 10, Vec::new());
        let instance = builder.build().unwrap();
        assert!(bin_packing_area_bound(&instance) >= 3);
    }

    #[test]
    fn knapsack_bound_is_at_most_total_profit() {
        let mut builder = InstanceBuilder::new();
        builder.set_objective(crate::instance::Objective::Knapsack);
        builder.add_bin_type(Shape::rectangle(3.0, 1.0), None, Some(1), 0);
        builder.add_item_type(square_item(1.0), Some(1.0), 3, Vec::new());
        let instance = builder.build().unwrap();
        let bound = knapsack_area_bound(&instance);
        assert!(bound <= 3.0 + 1e-9);
        assert!(bound >= 3.0 - 1e-6);
    }
}
