//! Column generation with limited-discrepancy diving.
//!
//! Columns are single-bin packings produced by the pricing tree search in
//! knapsack mode; the restricted master is a linear relaxation solved with
//! clarabel (conic form with a zero quadratic term). For the bin-packing
//! objectives the master is a set cover (minimize cost, demands covered);
//! for knapsack it is a packing (maximize profit within the copies).
//! Integer solutions come from diving on the most fractional column, with
//! one discrepancy allowed at the top of the dive.

use std::sync::Arc;

use clarabel::algebra::CscMatrix;
use clarabel::solver::{DefaultSettings, DefaultSolver, IPSolver, NonnegativeConeT, SupportedConeT};

use shapepack_beam::Timer;

use crate::instance::{Instance, Objective};
use crate::instance_builder::InstanceBuilder;
use crate::solution::Solution;
use crate::subproblem::{solve_fixed, StrategyError};

const REDUCED_COST_TOLERANCE: f64 = 1e-6;
const MAX_PRICING_ROUNDS: usize = 30;

pub struct ColumnGenerationParameters {
    /// Queue size of the pricing knapsack subproblems.
    pub subproblem_queue_size: usize,

    /// Approximation ratio forwarded to the subproblems.
    pub maximum_approximation_ratio: f64,
}

/// One single-bin packing.
#[derive(Clone)]
struct Column {
    bin_type_id: usize,
    /// Packed copies per original item type.
    coefficients: Vec<usize>,
    /// Bin cost (cover) or packed profit (packing).
    objective: f64,
    /// The packing itself, remapped to the original instance.
    solution: Solution,
}

/// Run column generation; `on_solution` fires for each integer-feasible
/// incumbent found by the dives.
pub fn column_generation(
    instance: &Arc<Instance>,
    parameters: &ColumnGenerationParameters,
    timer: &Timer,
    mut on_solution: impl FnMut(&Solution, usize),
) -> Result<(), StrategyError> {
    // The LP_SOLVER environment variable selects the backend; only
    // clarabel is compiled in.
    if let Ok(name) = std::env::var("LP_SOLVER") {
        if !name.eq_ignore_ascii_case("clarabel") {
            eprintln!("shapepack: unknown LP_SOLVER \"{}\", using clarabel", name);
        }
    }

    let maximize = instance.objective() == Objective::Knapsack;
    let mut columns: Vec<Column> = Vec::new();

    // Seed one dense column per bin type (pricing with unit profits).
    let demands: Vec<usize> = instance
        .item_types()
        .iter()
        .map(|item_type| item_type.copies)
        .collect();
    for bin_type_id in 0..instance.number_of_bin_types() {
        let profits: Vec<f64> = vec![1.0; instance.number_of_item_types()];
        if let Some(column) =
            price_column(instance, parameters, timer, bin_type_id, &demands, &profits, maximize)?
        {
            columns.push(column);
        }
    }
    if columns.is_empty() {
        return Ok(());
    }

    // Two dives: the plain one and one discrepancy (skip the first fixed
    // column).
    let mut number_of_nodes = 0;
    for discrepancy in 0..2 {
        if timer.needs_to_end() {
            break;
        }
        if let Some(solution) = dive(
            instance,
            parameters,
            timer,
            &mut columns,
            maximize,
            discrepancy,
            &mut number_of_nodes,
        )? {
            on_solution(&solution, number_of_nodes);
        }
    }
    Ok(())
}

/// One dive to an integer solution; `skip_first` discrepancies skip the
/// best column at the top levels.
#[allow(clippy::too_many_arguments)]
fn dive(
    instance: &Arc<Instance>,
    parameters: &ColumnGenerationParameters,
    timer: &Timer,
    columns: &mut Vec<Column>,
    maximize: bool,
    mut discrepancy: usize,
    number_of_nodes: &mut usize,
) -> Result<Option<Solution>, StrategyError> {
    let mut demands: Vec<usize> = instance
        .item_types()
        .iter()
        .map(|item_type| item_type.copies)
        .collect();
    let mut bin_copies: Vec<usize> = instance
        .bin_types()
        .iter()
        .map(|bin_type| bin_type.copies)
        .collect();
    let mut fixed: Vec<Column> = Vec::new();

    loop {
        *number_of_nodes += 1;
        if timer.needs_to_end() {
            return Ok(None);
        }

        // Generate columns until none prices out.
        for _ in 0..MAX_PRICING_ROUNDS {
            let Some(lp) = solve_master(instance, columns, &demands, &bin_copies, maximize) else {
                return Err(StrategyError::LinearProgramming);
            };
            let mut improved = false;
            for bin_type_id in 0..instance.number_of_bin_types() {
                if bin_copies[bin_type_id] == 0 {
                    continue;
                }
                let profits: Vec<f64> = if maximize {
                    instance
                        .item_types()
                        .iter()
                        .zip(&lp.item_duals)
                        .map(|(item_type, &dual)| (item_type.profit - dual).max(0.0))
                        .collect()
                } else {
                    lp.item_duals.clone()
                };
                if profits.iter().all(|&p| p <= REDUCED_COST_TOLERANCE) {
                    continue;
                }
                if let Some(column) = price_column(
                    instance,
                    parameters,
                    timer,
                    bin_type_id,
                    &demands,
                    &profits,
                    maximize,
                )? {
                    let value: f64 = column
                        .coefficients
                        .iter()
                        .zip(&lp.item_duals)
                        .map(|(&a, &y)| a as f64 * y)
                        .sum();
                    let capacity_dual = lp.bin_duals[bin_type_id];
                    let reduced_cost = if maximize {
                        // Improving when the column profit beats its duals.
                        -(column.objective - value - capacity_dual)
                    } else {
                        instance.bin_type(bin_type_id).cost - value + capacity_dual
                    };
                    if reduced_cost < -REDUCED_COST_TOLERANCE {
                        columns.push(column);
                        improved = true;
                    }
                }
                if timer.needs_to_end() {
                    break;
                }
            }
            if !improved || timer.needs_to_end() {
                break;
            }
        }

        // Pick the most fractional usable column.
        let Some(lp) = solve_master(instance, columns, &demands, &bin_copies, maximize) else {
            return Err(StrategyError::LinearProgramming);
        };
        let mut best: Option<(usize, f64)> = None;
        for (column_pos, column) in columns.iter().enumerate() {
            if bin_copies[column.bin_type_id] == 0 {
                continue;
            }
            if column
                .coefficients
                .iter()
                .zip(&demands)
                .any(|(&a, &d)| a > d)
            {
                continue;
            }
            let x = lp.values[column_pos];
            if x <= REDUCED_COST_TOLERANCE {
                continue;
            }
            if best.is_none() || x > best.unwrap().1 {
                best = Some((column_pos, x));
            }
        }
        let Some((mut column_pos, _)) = best else {
            break;
        };
        if discrepancy > 0 {
            // The discrepancy: take the second-best column instead.
            let mut second: Option<(usize, f64)> = None;
            for (pos, column) in columns.iter().enumerate() {
                if pos == column_pos || bin_copies[column.bin_type_id] == 0 {
                    continue;
                }
                if column
                    .coefficients
                    .iter()
                    .zip(&demands)
                    .any(|(&a, &d)| a > d)
                {
                    continue;
                }
                let x = lp.values[pos];
                if x <= REDUCED_COST_TOLERANCE {
                    continue;
                }
                if second.is_none() || x > second.unwrap().1 {
                    second = Some((pos, x));
                }
            }
            match second {
                Some((pos, _)) => column_pos = pos,
                None => break,
            }
            discrepancy -= 1;
        }

        let column = columns[column_pos].clone();
        for (demand, &a) in demands.iter_mut().zip(&column.coefficients) {
            *demand -= a.min(*demand);
        }
        bin_copies[column.bin_type_id] -= 1;
        fixed.push(column);

        if maximize {
            if bin_copies.iter().all(|&c| c == 0) || demands.iter().all(|&d| d == 0) {
                break;
            }
        } else if demands.iter().all(|&d| d == 0) {
            break;
        }
    }

    if fixed.is_empty() {
        return Ok(None);
    }
    if !maximize && demands.iter().any(|&d| d > 0) {
        // The dive did not cover every item.
        return Ok(None);
    }

    let mut solution = Solution::new(Arc::clone(instance));
    for column in &fixed {
        solution.append(&column.solution, 0, 1, &[], &[])?;
    }
    Ok(Some(solution))
}

struct LpSolution {
    values: Vec<f64>,
    item_duals: Vec<f64>,
    bin_duals: Vec<f64>,
}

/// Solve the restricted master relaxation with clarabel.
fn solve_master(
    instance: &Instance,
    columns: &[Column],
    demands: &[usize],
    bin_copies: &[usize],
    maximize: bool,
) -> Option<LpSolution> {
    let number_of_item_types = instance.number_of_item_types();
    let number_of_bin_types = instance.number_of_bin_types();
    // One artificial variable per item type keeps the cover feasible.
    let artificial_cost = 2.0
        * instance.largest_item_copies() as f64
        * (instance.largest_bin_cost() + instance.largest_item_profit() + 1.0);
    let n = columns.len() + if maximize { 0 } else { number_of_item_types };

    let mut q = vec![0.0; n];
    for (column_pos, column) in columns.iter().enumerate() {
        q[column_pos] = if maximize {
            -column.objective
        } else {
            column.objective
        };
    }
    if !maximize {
        for artificial_pos in 0..number_of_item_types {
            q[columns.len() + artificial_pos] = artificial_cost;
        }
    }

    // Constraints: A x + s = b, s >= 0.
    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut b: Vec<f64> = Vec::new();
    for item_type_id in 0..number_of_item_types {
        let mut row = vec![0.0; n];
        for (column_pos, column) in columns.iter().enumerate() {
            row[column_pos] = column.coefficients[item_type_id] as f64;
        }
        if maximize {
            // Packing: coverage at most the demand.
            b.push(demands[item_type_id] as f64);
        } else {
            // Cover: at least the demand (negated row).
            row.iter_mut().for_each(|a| *a = -*a);
            row[columns.len() + item_type_id] = -1.0;
            b.push(-(demands[item_type_id] as f64));
        }
        rows.push(row);
    }
    for bin_type_id in 0..number_of_bin_types {
        let mut row = vec![0.0; n];
        for (column_pos, column) in columns.iter().enumerate() {
            if column.bin_type_id == bin_type_id {
                row[column_pos] = 1.0;
            }
        }
        rows.push(row);
        b.push(bin_copies[bin_type_id] as f64);
    }
    for variable_pos in 0..n {
        let mut row = vec![0.0; n];
        row[variable_pos] = -1.0;
        rows.push(row);
        b.push(0.0);
    }
    let cones: Vec<SupportedConeT<f64>> = vec![NonnegativeConeT(rows.len())];

    let p = CscMatrix::from(&vec![vec![0.0; n]; n]);
    let a = CscMatrix::from(&rows);
    let mut settings = DefaultSettings::default();
    settings.verbose = false;
    let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings).ok()?;
    solver.solve();

    let x = solver.solution.x.as_slice();
    let z = solver.solution.z.as_slice();
    let values = x[..columns.len()].to_vec();
    let item_duals: Vec<f64> = (0..number_of_item_types)
        .map(|item_type_id| z[item_type_id].max(0.0))
        .collect();
    let bin_duals: Vec<f64> = (0..number_of_bin_types)
        .map(|bin_type_id| z[number_of_item_types + bin_type_id].max(0.0))
        .collect();
    Some(LpSolution {
        values,
        item_duals,
        bin_duals,
    })
}

/// Pricing: pack one bin of `bin_type_id` with the given profits.
fn price_column(
    instance: &Arc<Instance>,
    parameters: &ColumnGenerationParameters,
    timer: &Timer,
    bin_type_id: usize,
    demands: &[usize],
    profits: &[f64],
    maximize: bool,
) -> Result<Option<Column>, StrategyError> {
    let mut kp_builder = InstanceBuilder::new();
    kp_builder.set_objective(Objective::Knapsack);
    kp_builder.set_parameters(instance.parameters().clone());
    kp_builder.add_bin_type_from(instance.bin_type(bin_type_id), Some(1), 0);
    let mut kp_to_orig: Vec<usize> = Vec::new();
    for (item_type_id, item_type) in instance.item_types().iter().enumerate() {
        if demands[item_type_id] == 0 || profits[item_type_id] <= REDUCED_COST_TOLERANCE {
            continue;
        }
        kp_builder.add_item_type_from(
            item_type,
            Some(profits[item_type_id]),
            demands[item_type_id],
        );
        kp_to_orig.push(item_type_id);
    }
    if kp_to_orig.is_empty() {
        return Ok(None);
    }
    let kp_instance = Arc::new(kp_builder.build()?);
    let kp_solution = solve_fixed(
        &kp_instance,
        parameters.subproblem_queue_size,
        parameters.maximum_approximation_ratio,
        timer,
    )?;
    if kp_solution.number_of_items() == 0 {
        return Ok(None);
    }

    let mut coefficients = vec![0; instance.number_of_item_types()];
    let mut packed_profit = 0.0;
    for (kp_item_type_id, &item_type_id) in kp_to_orig.iter().enumerate() {
        let copies = kp_solution.item_copies(kp_item_type_id);
        coefficients[item_type_id] = copies;
        packed_profit += copies as f64 * instance.item_type(item_type_id).profit;
    }

    let mut solution = Solution::new(Arc::clone(instance));
    solution.append(&kp_solution, 0, 1, &[bin_type_id], &kp_to_orig)?;

    Ok(Some(Column {
        bin_type_id,
        coefficients,
        objective: if maximize {
            packed_profit
        } else {
            instance.bin_type(bin_type_id).cost
        },
        solution,
    }))
}
