//! Dichotomic search for variable-sized bin packing.
//!
//! Binary-search a target waste fraction `w`: draw bins from the cheapest
//! per unit of area until the drawn area reaches `item_area / (1 - w)`,
//! and solve the fixed bin-packing subproblem on that pool. Feasibility
//! halves the interval downward, infeasibility moves it up.

use std::sync::Arc;

use shapepack_beam::Timer;

use crate::instance::{Instance, Objective};
use crate::instance_builder::InstanceBuilder;
use crate::solution::Solution;
use crate::subproblem::{solve_fixed, StrategyError};

pub struct DichotomicSearchParameters {
    /// Queue size of the bin-packing subproblems.
    pub subproblem_queue_size: usize,

    /// Approximation ratio forwarded to the subproblems.
    pub maximum_approximation_ratio: f64,

    /// Initial upper bound on the waste fraction.
    pub initial_waste_percentage_upper_bound: f64,
}

/// Run the bisection; `on_solution` fires for every feasible subproblem.
pub fn dichotomic_search(
    instance: &Arc<Instance>,
    parameters: &DichotomicSearchParameters,
    timer: &Timer,
    mut on_solution: impl FnMut(&Solution, f64),
) -> Result<(), StrategyError> {
    // Cheapest bins per unit of area first.
    let mut bin_type_order: Vec<usize> = (0..instance.number_of_bin_types()).collect();
    bin_type_order.sort_by(|&a, &b| {
        let ca = instance.bin_type(a).cost / instance.bin_type(a).area_scaled;
        let cb = instance.bin_type(b).cost / instance.bin_type(b).area_scaled;
        ca.partial_cmp(&cb).unwrap()
    });

    let mut waste_low: f64 = 0.0;
    let mut waste_high: f64 = parameters.initial_waste_percentage_upper_bound.min(1.0);
    while waste_high - waste_low > 0.01 && !timer.needs_to_end() {
        let waste = (waste_low + waste_high) / 2.0;
        let target_area = instance.item_area_scaled() / (1.0 - waste).max(1e-6);

        // Draw the bin pool for this waste target.
        let mut pool: Vec<(usize, usize)> = Vec::new();
        let mut pool_area = 0.0;
        for &bin_type_id in &bin_type_order {
            let bin_type = instance.bin_type(bin_type_id);
            let mut copies = 0;
            for _ in 0..bin_type.copies {
                copies += 1;
                pool_area += bin_type.area_scaled;
                if pool_area >= target_area {
                    break;
                }
            }
            if copies > 0 {
                pool.push((bin_type_id, copies));
            }
            if pool_area >= target_area {
                break;
            }
        }
        if pool_area < instance.item_area_scaled() {
            // Even the whole pool cannot hold the items.
            waste_low = waste;
            continue;
        }

        // Fixed bin packing on the drawn pool.
        let mut bpp_builder = InstanceBuilder::new();
        bpp_builder.set_objective(Objective::BinPacking);
        bpp_builder.set_parameters(instance.parameters().clone());
        let mut bin_type_map: Vec<usize> = Vec::new();
        for &(bin_type_id, copies) in &pool {
            bpp_builder.add_bin_type_from(instance.bin_type(bin_type_id), Some(copies), 0);
            bin_type_map.push(bin_type_id);
        }
        for item_type in instance.item_types() {
            bpp_builder.add_item_type_from(item_type, None, item_type.copies);
        }
        let bpp_instance = Arc::new(bpp_builder.build()?);
        let bpp_solution = solve_fixed(
            &bpp_instance,
            parameters.subproblem_queue_size,
            parameters.maximum_approximation_ratio,
            timer,
        )?;

        if bpp_solution.full() {
            let mut solution = Solution::new(Arc::clone(instance));
            solution.append_all(&bpp_solution, &bin_type_map, &[])?;
            on_solution(&solution, waste);
            waste_high = waste;
        } else {
            waste_low = waste;
        }
    }
    Ok(())
}
