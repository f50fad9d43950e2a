//! Sequential value correction.
//!
//! Each outer iteration builds a complete solution by solving one
//! single-bin knapsack per bin on the remaining items, then re-weights the
//! item profits: items packed into wasteful bins gain weight so that they
//! are packed earlier in the next iteration. Capping the iteration count
//! at one gives the sequential-single-knapsack strategy.

use std::sync::Arc;

use shapepack_beam::Timer;

use crate::instance::{Instance, Objective};
use crate::instance_builder::InstanceBuilder;
use crate::solution::Solution;
use crate::subproblem::{solve_fixed, StrategyError};

/// Profit re-weighting smoothing factor.
const THETA: f64 = 0.5;

pub struct SequentialValueCorrectionParameters {
    /// Maximum number of outer iterations; one builds a single solution.
    pub maximum_number_of_iterations: usize,

    /// Queue size of the knapsack subproblems.
    pub subproblem_queue_size: usize,

    /// Approximation ratio forwarded to the subproblems.
    pub maximum_approximation_ratio: f64,
}

/// Run the outer loop; `on_solution` fires after each completed iteration.
pub fn sequential_value_correction(
    instance: &Arc<Instance>,
    parameters: &SequentialValueCorrectionParameters,
    timer: &Timer,
    mut on_solution: impl FnMut(&Solution, usize),
) -> Result<(), StrategyError> {
    let mut profits: Vec<f64> = instance
        .item_types()
        .iter()
        .map(|item_type| item_type.profit)
        .collect();
    let profit_floor = 1e-6
        * instance
            .item_types()
            .iter()
            .map(|item_type| item_type.profit)
            .fold(1.0, f64::max);

    for iteration in 0.. {
        if parameters.maximum_number_of_iterations > 0
            && iteration >= parameters.maximum_number_of_iterations
        {
            break;
        }
        if timer.needs_to_end() {
            break;
        }

        let mut solution = Solution::new(Arc::clone(instance));
        let mut remaining: Vec<usize> = instance
            .item_types()
            .iter()
            .map(|item_type| item_type.copies)
            .collect();

        let mut bin_pos = 0;
        while bin_pos < instance.number_of_bins()
            && remaining.iter().any(|&copies| copies > 0)
            && !timer.needs_to_end()
        {
            let bin_type_id = instance.bin_type_id(bin_pos);

            // Knapsack on the remaining items, one copy of the next bin.
            let mut kp_builder = InstanceBuilder::new();
            kp_builder.set_objective(Objective::Knapsack);
            kp_builder.set_parameters(instance.parameters().clone());
            kp_builder.add_bin_type_from(instance.bin_type(bin_type_id), Some(1), 0);
            let mut kp_to_orig: Vec<usize> = Vec::new();
            for (item_type_id, item_type) in instance.item_types().iter().enumerate() {
                if remaining[item_type_id] == 0 {
                    continue;
                }
                kp_builder.add_item_type_from(
                    item_type,
                    Some(profits[item_type_id]),
                    remaining[item_type_id],
                );
                kp_to_orig.push(item_type_id);
            }
            let kp_instance = Arc::new(kp_builder.build()?);
            let kp_solution = solve_fixed(
                &kp_instance,
                parameters.subproblem_queue_size,
                parameters.maximum_approximation_ratio,
                timer,
            )?;

            if kp_solution.number_of_items() == 0 {
                // Nothing fits into this bin; the remaining items may
                // still fit into a later bin of another type.
                bin_pos += 1;
                continue;
            }

            // Re-weight the profits of the items packed into this bin.
            let bin_area = instance.bin_type(bin_type_id).area_scaled;
            let used_area = kp_solution.item_area() * instance.scale() * instance.scale();
            let correction = bin_area / used_area.max(1.0);
            for (kp_item_type_id, &item_type_id) in kp_to_orig.iter().enumerate() {
                let packed = kp_solution.item_copies(kp_item_type_id);
                if packed == 0 {
                    continue;
                }
                remaining[item_type_id] -= packed.min(remaining[item_type_id]);
                profits[item_type_id] = ((1.0 - THETA) * profits[item_type_id]
                    + THETA * profits[item_type_id] * correction)
                    .max(profit_floor);
            }

            let bin_type_map: Vec<usize> = vec![bin_type_id];
            solution.append(&kp_solution, 0, 1, &bin_type_map, &kp_to_orig)?;
            bin_pos += 1;
        }

        on_solution(&solution, iteration);

        if parameters.maximum_number_of_iterations == 0 && timer.needs_to_end() {
            break;
        }
    }
    Ok(())
}
