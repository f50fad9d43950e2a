//! Orchestrator: strategy selection, fan-out and the anytime loops.
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

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use parking_lot::Mutex;

use shapepack_beam::{beam_search, BeamSearchParameters, Timer};

use crate::algorithm_formatter::{AlgorithmFormatter, MessageStreams};
use crate::bounds::{area_bound, AreaBound};
use crate::branching_scheme::{
    BranchingScheme, Direction, Node, Parameters as SchemeParameters,
};
use crate::column_generation::{column_generation, ColumnGenerationParameters};
use crate::dichotomic_search::{dichotomic_search, DichotomicSearchParameters};
use crate::instance::{Instance, Objective, OptimizationMode};
use crate::instance_builder::InstanceBuilder;
use crate::output::Output;
use crate::sequential_value_correction::{
    sequential_value_correction, SequentialValueCorrectionParameters,
};
use crate::solution::Solution;
use crate::subproblem::{collapse_directions, default_directions, default_guides, StrategyError};

/// Orchestrator parameters.
pub struct OptimizeParameters {
    pub verbosity_level: u8,
    pub timer: Timer,
    pub optimization_mode: OptimizationMode,

    pub messages_to_stdout: bool,
    pub log_to_stderr: bool,
    pub log_path: Option<PathBuf>,

    /// Fired on every improving solution (used to write intermediate
    /// output files).
    pub new_solution_callback: Option<Box<dyn Fn(&Output) + Send + Sync>>,

    pub use_tree_search: bool,
    pub use_sequential_single_knapsack: bool,
    pub use_sequential_value_correction: bool,
    pub use_dichotomic_search: bool,
    pub use_column_generation: bool,
    pub use_open_dimension_sequential: bool,

    /// Initial maximum approximation ratio of the anytime loops.
    pub initial_maximum_approximation_ratio: f64,
    /// Decrease factor applied at each anytime iteration.
    pub maximum_approximation_ratio_factor: f64,

    /// Guides of the tree search; empty selects them by objective.
    pub tree_search_guides: Vec<usize>,

    /// Threshold to consider that a bin holds "many" items.
    pub many_items_in_bins_threshold: f64,
    /// Factor to consider that item copies are "high".
    pub many_item_type_copies_factor: f64,

    pub sequential_value_correction_subproblem_queue_size: usize,
    pub column_generation_subproblem_queue_size: usize,

    pub not_anytime_maximum_approximation_ratio: f64,
    pub not_anytime_tree_search_queue_size: usize,
    pub not_anytime_sequential_single_knapsack_subproblem_queue_size: usize,
    pub not_anytime_sequential_value_correction_number_of_iterations: usize,
    pub not_anytime_dichotomic_search_subproblem_queue_size: usize,
}

impl Default for OptimizeParameters {
    fn default() -> Self {
        OptimizeParameters {
            verbosity_level: 0,
            timer: Timer::new(),
            optimization_mode: OptimizationMode::Anytime,
            messages_to_stdout: false,
            log_to_stderr: false,
            log_path: None,
            new_solution_callback: None,
            use_tree_search: false,
            use_sequential_single_knapsack: false,
            use_sequential_value_correction: false,
            use_dichotomic_search: false,
            use_column_generation: false,
            use_open_dimension_sequential: false,
            initial_maximum_approximation_ratio: 0.20,
            maximum_approximation_ratio_factor: 0.75,
            tree_search_guides: Vec::new(),
            many_items_in_bins_threshold: 16.0,
            many_item_type_copies_factor: 1.0,
            sequential_value_correction_subproblem_queue_size: 128,
            column_generation_subproblem_queue_size: 128,
            not_anytime_maximum_approximation_ratio: 0.05,
            not_anytime_tree_search_queue_size: 512,
            not_anytime_sequential_single_knapsack_subproblem_queue_size: 512,
            not_anytime_sequential_value_correction_number_of_iterations: 32,
            not_anytime_dichotomic_search_subproblem_queue_size: 128,
        }
    }
}

/// Which strategies run, after the automatic selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrategyKind {
    TreeSearch,
    SequentialSingleKnapsack,
    SequentialValueCorrection,
    DichotomicSearch,
    ColumnGeneration,
    OpenDimensionSequential,
}

/// Optimize an instance: compute the area bound, select the strategies,
/// fan them out and keep the best published solution.
pub fn optimize(
    instance: &Arc<Instance>,
    parameters: OptimizeParameters,
) -> Result<Output, StrategyError> {
    let mut parameters = parameters;
    let streams = MessageStreams::new(
        parameters.messages_to_stdout,
        parameters.log_to_stderr,
        parameters.log_path.as_deref(),
    );
    let callback = parameters.new_solution_callback.take();
    let formatter = AlgorithmFormatter::new(
        Arc::clone(instance),
        parameters.verbosity_level,
        streams,
        parameters.timer.clone(),
        callback,
    );
    formatter.start();
    formatter.print_header();

    if instance.objective() == Objective::Knapsack {
        formatter.update_knapsack_bound(instance.item_profit());
    }
    match area_bound(instance) {
        AreaBound::Knapsack(bound) => formatter.update_knapsack_bound(bound),
        AreaBound::BinPacking(bound) => formatter.update_bin_packing_bound(bound),
        AreaBound::VariableSizedBinPacking(bound) => {
            formatter.update_variable_sized_bin_packing_bound(bound)
        }
        AreaBound::None => {}
    }

    if parameters.timer.needs_to_end() {
        return Ok(formatter.end());
    }

    let strategies = select_strategies(instance, &parameters);

    // Fan out: one thread per strategy, except in sequential mode.
    let errors: Mutex<Vec<StrategyError>> = Mutex::new(Vec::new());
    let errors_ref = &errors;
    let parameters_ref = &parameters;
    let formatter_ref = &formatter;
    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for &strategy in &strategies {
            let run = move || {
                let result = run_strategy(strategy, instance, parameters_ref, formatter_ref);
                if let Err(error) = result {
                    errors_ref.lock().push(error);
                }
            };
            if parameters_ref.optimization_mode == OptimizationMode::NotAnytimeSequential {
                run();
            } else {
                handles.push(scope.spawn(run));
            }
        }
        for handle in handles {
            let _ = handle.join();
        }
    });
    if let Some(error) = errors.into_inner().into_iter().next() {
        return Err(error);
    }

    // Bin-packing-with-leftovers post-processing: re-solve the last bin
    // with the leftover-oriented guides and replace it when full.
    if instance.objective() == Objective::BinPackingWithLeftovers
        && parameters.optimization_mode != OptimizationMode::Anytime
        && parameters.tree_search_guides != vec![2, 3]
    {
        post_process_leftovers(instance, &parameters, &formatter)?;
    }

    Ok(formatter.end())
}

/// The strategy selection table.
fn select_strategies(instance: &Instance, parameters: &OptimizeParameters) -> Vec<StrategyKind> {
    let mut use_tree_search = parameters.use_tree_search;
    let mut use_sequential_single_knapsack = parameters.use_sequential_single_knapsack;
    let mut use_sequential_value_correction = parameters.use_sequential_value_correction;
    let mut use_dichotomic_search = parameters.use_dichotomic_search;
    let mut use_column_generation = parameters.use_column_generation;
    let mut use_open_dimension_sequential = parameters.use_open_dimension_sequential;

    let largest_bin_space = instance
        .bin_types()
        .iter()
        .map(|bin_type| bin_type.area_scaled)
        .fold(0.0, f64::max);
    let mean_number_of_items_in_bins = largest_bin_space / instance.mean_item_area_scaled();
    let mean_item_type_copies =
        instance.number_of_items() as f64 / instance.number_of_item_types() as f64;
    let many_copies = mean_item_type_copies
        > parameters.many_item_type_copies_factor * mean_number_of_items_in_bins;
    let many_items = mean_number_of_items_in_bins > parameters.many_items_in_bins_threshold;

    match instance.objective() {
        Objective::OpenDimensionXY => {
            use_tree_search = false;
            use_sequential_single_knapsack = false;
            use_sequential_value_correction = false;
            use_dichotomic_search = false;
            use_column_generation = false;
            use_open_dimension_sequential = true;
        }
        _ if instance.number_of_bins() <= 1 => {
            use_tree_search = true;
            use_sequential_single_knapsack = false;
            use_sequential_value_correction = false;
            use_dichotomic_search = false;
            use_column_generation = false;
            use_open_dimension_sequential = false;
        }
        Objective::Knapsack => {
            use_dichotomic_search = false;
            use_open_dimension_sequential = false;
            if !use_tree_search
                && !use_sequential_single_knapsack
                && !use_sequential_value_correction
                && !use_column_generation
            {
                if many_copies {
                    if many_items {
                        use_sequential_single_knapsack = true;
                    } else {
                        use_sequential_value_correction = true;
                        use_column_generation = true;
                    }
                } else {
                    use_tree_search = true;
                    use_column_generation = true;
                }
            }
        }
        Objective::BinPacking | Objective::BinPackingWithLeftovers => {
            if instance.number_of_bin_types() > 1 {
                use_column_generation = false;
            }
            use_dichotomic_search = false;
            use_open_dimension_sequential = false;
            if !use_tree_search
                && !use_sequential_single_knapsack
                && !use_sequential_value_correction
                && !use_column_generation
            {
                if many_copies {
                    if many_items {
                        use_sequential_single_knapsack = true;
                    } else {
                        use_sequential_value_correction = true;
                        if instance.number_of_bin_types() == 1 {
                            use_column_generation = true;
                        }
                    }
                } else {
                    use_tree_search = true;
                    if many_items {
                        use_sequential_single_knapsack = true;
                    } else {
                        use_sequential_value_correction = true;
                        if instance.number_of_bin_types() == 1 {
                            use_column_generation = true;
                        }
                    }
                }
            }
        }
        Objective::VariableSizedBinPacking => {
            if instance.number_of_bin_types() == 1 {
                if use_dichotomic_search {
                    use_dichotomic_search = false;
                    use_tree_search = true;
                }
            } else {
                use_tree_search = false;
            }
            use_open_dimension_sequential = false;
            if !use_tree_search
                && !use_sequential_single_knapsack
                && !use_sequential_value_correction
                && !use_dichotomic_search
                && !use_column_generation
            {
                if many_copies {
                    if many_items {
                        use_sequential_single_knapsack = true;
                    } else {
                        use_sequential_value_correction = true;
                        use_column_generation = true;
                    }
                } else if many_items {
                    use_sequential_single_knapsack = true;
                    if instance.number_of_bin_types() > 1 {
                        use_dichotomic_search = true;
                    } else {
                        use_tree_search = true;
                    }
                } else {
                    use_sequential_value_correction = true;
                    use_column_generation = true;
                }
            }
        }
        _ => {
            // Open dimension x / y run the tree search directly.
            use_tree_search = true;
            use_sequential_single_knapsack = false;
            use_sequential_value_correction = false;
            use_dichotomic_search = false;
            use_column_generation = false;
            use_open_dimension_sequential = false;
        }
    }

    let mut strategies = Vec::new();
    if use_tree_search {
        strategies.push(StrategyKind::TreeSearch);
    }
    if use_sequential_single_knapsack {
        strategies.push(StrategyKind::SequentialSingleKnapsack);
    }
    if use_sequential_value_correction {
        strategies.push(StrategyKind::SequentialValueCorrection);
    }
    if use_dichotomic_search {
        strategies.push(StrategyKind::DichotomicSearch);
    }
    if use_column_generation {
        strategies.push(StrategyKind::ColumnGeneration);
    }
    if use_open_dimension_sequential {
        strategies.push(StrategyKind::OpenDimensionSequential);
    }
    strategies
}

fn run_strategy(
    strategy: StrategyKind,
    instance: &Arc<Instance>,
    parameters: &OptimizeParameters,
    formatter: &AlgorithmFormatter,
) -> Result<(), StrategyError> {
    match strategy {
        StrategyKind::TreeSearch => optimize_tree_search(instance, parameters, formatter),
        StrategyKind::SequentialSingleKnapsack => {
            optimize_sequential_single_knapsack(instance, parameters, formatter, None)
        }
        StrategyKind::SequentialValueCorrection => {
            optimize_sequential_value_correction(instance, parameters, formatter)
        }
        StrategyKind::DichotomicSearch => {
            optimize_dichotomic_search(instance, parameters, formatter)
        }
        StrategyKind::ColumnGeneration => {
            optimize_column_generation(instance, parameters, formatter)
        }
        StrategyKind::OpenDimensionSequential => {
            optimize_open_dimension_sequential(instance, parameters, formatter)
        }
    }
}

fn worker_timer(parameters: &OptimizeParameters, formatter: &AlgorithmFormatter) -> Timer {
    let mut timer = parameters.timer.clone();
    timer.add_end_boolean(formatter.end_boolean());
    timer
}

/// Iterative beam search: per (guide, direction, growth factor) worker,
/// growing queue sizes and shrinking approximation ratios.
fn optimize_tree_search(
    instance: &Arc<Instance>,
    parameters: &OptimizeParameters,
    formatter: &AlgorithmFormatter,
) -> Result<(), StrategyError> {
    let guides = if !parameters.tree_search_guides.is_empty() {
        parameters.tree_search_guides.clone()
    } else {
        default_guides(instance.objective())
    };
    let directions = collapse_directions(instance, default_directions(instance));

    let mut growth_factors = vec![1.5];
    if guides.len() * directions.len() * 2 <= 4 {
        growth_factors = vec![1.33, 1.5];
    }
    if parameters.optimization_mode != OptimizationMode::Anytime {
        growth_factors = vec![1.5];
    }
    if guides.len() * directions.len() * growth_factors.len() > num_cpus::get() {
        growth_factors = vec![1.5];
    }

    let mut workers: Vec<(usize, Direction, f64)> = Vec::new();
    for &growth_factor in &growth_factors {
        for &guide_id in &guides {
            for &direction in &directions {
                workers.push((guide_id, direction, growth_factor));
            }
        }
    }

    let deterministic =
        parameters.optimization_mode == OptimizationMode::NotAnytimeDeterministic;
    let errors: Mutex<Vec<StrategyError>> = Mutex::new(Vec::new());
    let deferred: Mutex<Vec<Option<(usize, Solution, String)>>> =
        Mutex::new((0..workers.len()).map(|_| None).collect());

    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for (worker_pos, &(guide_id, direction, growth_factor)) in workers.iter().enumerate() {
            let run = {
                let errors = &errors;
                let deferred = &deferred;
                move || {
                    let result = optimize_tree_search_worker(
                        instance,
                        parameters,
                        formatter,
                        guide_id,
                        direction,
                        growth_factor,
                        deterministic,
                    );
                    match result {
                        Ok(Some((solution, comment))) => {
                            deferred.lock()[worker_pos] = Some((worker_pos, solution, comment));
                        }
                        Ok(None) => {}
                        Err(error) => errors.lock().push(error),
                    }
                }
            };
            if parameters.optimization_mode == OptimizationMode::NotAnytimeSequential {
                run();
            } else {
                handles.push(scope.spawn(run));
            }
        }
        for handle in handles {
            let _ = handle.join();
        }
    });
    if let Some(error) = errors.into_inner().into_iter().next() {
        return Err(error);
    }

    if deterministic {
        // Publish in the fixed (guide, direction) order.
        for entry in deferred.into_inner().into_iter().flatten() {
            let (_, solution, comment) = entry;
            formatter.update_solution(&solution, &comment);
        }
    }
    Ok(())
}

/// One tree-search worker: restart the beam with a growing queue.
fn optimize_tree_search_worker(
    instance: &Arc<Instance>,
    parameters: &OptimizeParameters,
    formatter: &AlgorithmFormatter,
    guide_id: usize,
    direction: Direction,
    growth_factor: f64,
    deterministic: bool,
) -> Result<Option<(Solution, String)>, StrategyError> {
    let timer = worker_timer(parameters, formatter);
    let mut queue_size: usize = 1;
    let mut maximum_approximation_ratio = parameters.initial_maximum_approximation_ratio;
    let mut cutoff: Option<Rc<Node>> = None;
    let mut deferred_best: Option<(Solution, String)> = None;

    loop {
        if parameters.optimization_mode != OptimizationMode::Anytime {
            queue_size = parameters.not_anytime_tree_search_queue_size;
            maximum_approximation_ratio = parameters.not_anytime_maximum_approximation_ratio;
        }

        let scheme = BranchingScheme::new(
            Arc::clone(instance),
            SchemeParameters {
                guide_id,
                direction,
                maximum_approximation_ratio,
            },
        )?;
        let output = beam_search(
            &scheme,
            BeamSearchParameters {
                queue_size,
                timer: timer.clone(),
                cutoff: cutoff.clone(),
            },
        );

        if let Some(best) = &output.solution {
            let is_new = match &cutoff {
                Some(node) => !Rc::ptr_eq(node, best),
                None => true,
            };
            if is_new {
                let solution = scheme.to_solution(best)?;
                let comment =
                    format!("TS g {} d {} q {}", guide_id, direction as usize, queue_size);
                if deterministic {
                    let better = match &deferred_best {
                        None => true,
                        Some((incumbent, _)) => solution.better_than(incumbent),
                    };
                    if better {
                        deferred_best = Some((solution, comment));
                    }
                } else {
                    formatter.update_solution(&solution, &comment);
                }
            }
            cutoff = Some(Rc::clone(best));
        }

        if output.optimal || timer.needs_to_end() {
            break;
        }
        if parameters.optimization_mode != OptimizationMode::Anytime {
            break;
        }

        queue_size = (queue_size + 1).max((queue_size as f64 * growth_factor) as usize);
        maximum_approximation_ratio *= parameters.maximum_approximation_ratio_factor;
    }
    Ok(deferred_best)
}

/// Sequential single knapsack: the value-correction loop capped at one
/// iteration, restarted with doubling queue sizes in anytime mode.
fn optimize_sequential_single_knapsack(
    instance: &Arc<Instance>,
    parameters: &OptimizeParameters,
    formatter: &AlgorithmFormatter,
    queue_size_max: Option<usize>,
) -> Result<(), StrategyError> {
    let timer = worker_timer(parameters, formatter);
    let mut queue_size: usize = 1;
    let mut maximum_approximation_ratio = parameters.initial_maximum_approximation_ratio;
    loop {
        if parameters.optimization_mode != OptimizationMode::Anytime {
            queue_size =
                parameters.not_anytime_sequential_single_knapsack_subproblem_queue_size;
            maximum_approximation_ratio = parameters.not_anytime_maximum_approximation_ratio;
        }
        if let Some(max) = queue_size_max {
            if queue_size > max {
                break;
            }
        }

        let svc_parameters = SequentialValueCorrectionParameters {
            maximum_number_of_iterations: 1,
            subproblem_queue_size: queue_size,
            maximum_approximation_ratio,
        };
        sequential_value_correction(instance, &svc_parameters, &timer, |solution, _| {
            formatter.update_solution(solution, &format!("SSK q {}", queue_size));
        })?;

        if timer.needs_to_end() {
            break;
        }
        if parameters.optimization_mode != OptimizationMode::Anytime {
            break;
        }
        queue_size = (queue_size + 1).max(queue_size * 2);
        maximum_approximation_ratio *= parameters.maximum_approximation_ratio_factor;
    }
    Ok(())
}

fn optimize_sequential_value_correction(
    instance: &Arc<Instance>,
    parameters: &OptimizeParameters,
    formatter: &AlgorithmFormatter,
) -> Result<(), StrategyError> {
    if parameters.optimization_mode == OptimizationMode::Anytime {
        // Warm up with growing single-knapsack passes first.
        optimize_sequential_single_knapsack(
            instance,
            parameters,
            formatter,
            Some(parameters.sequential_value_correction_subproblem_queue_size - 1),
        )?;
    }

    let timer = worker_timer(parameters, formatter);
    let svc_parameters = SequentialValueCorrectionParameters {
        maximum_number_of_iterations: if parameters.optimization_mode
            == OptimizationMode::Anytime
        {
            0
        } else {
            parameters.not_anytime_sequential_value_correction_number_of_iterations
        },
        subproblem_queue_size: parameters.sequential_value_correction_subproblem_queue_size,
        maximum_approximation_ratio: parameters.not_anytime_maximum_approximation_ratio,
    };
    sequential_value_correction(instance, &svc_parameters, &timer, |solution, iteration| {
        formatter.update_solution(solution, &format!("SVC it {}", iteration));
    })
}

fn optimize_dichotomic_search(
    instance: &Arc<Instance>,
    parameters: &OptimizeParameters,
    formatter: &AlgorithmFormatter,
) -> Result<(), StrategyError> {
    let timer = worker_timer(parameters, formatter);
    let mut queue_size: usize = 1;
    let mut maximum_approximation_ratio = parameters.initial_maximum_approximation_ratio;
    let mut waste_percentage_upper_bound = f64::INFINITY;
    loop {
        if parameters.optimization_mode != OptimizationMode::Anytime {
            queue_size = parameters.not_anytime_dichotomic_search_subproblem_queue_size;
            maximum_approximation_ratio = parameters.not_anytime_maximum_approximation_ratio;
        }

        let ds_parameters = DichotomicSearchParameters {
            subproblem_queue_size: queue_size,
            maximum_approximation_ratio,
            initial_waste_percentage_upper_bound: waste_percentage_upper_bound,
        };
        let mut best_waste = waste_percentage_upper_bound;
        dichotomic_search(instance, &ds_parameters, &timer, |solution, waste| {
            best_waste = best_waste.min(waste);
            formatter.update_solution(
                solution,
                &format!("DS q {} w {:.4}", queue_size, waste),
            );
        })?;
        waste_percentage_upper_bound = best_waste;

        if timer.needs_to_end() {
            break;
        }
        if parameters.optimization_mode != OptimizationMode::Anytime {
            break;
        }
        queue_size = (queue_size + 1).max(queue_size * 2);
        maximum_approximation_ratio *= parameters.maximum_approximation_ratio_factor;
    }
    Ok(())
}

fn optimize_column_generation(
    instance: &Arc<Instance>,
    parameters: &OptimizeParameters,
    formatter: &AlgorithmFormatter,
) -> Result<(), StrategyError> {
    let timer = worker_timer(parameters, formatter);
    let cg_parameters = ColumnGenerationParameters {
        subproblem_queue_size: parameters.column_generation_subproblem_queue_size,
        maximum_approximation_ratio: parameters.not_anytime_maximum_approximation_ratio,
    };
    column_generation(instance, &cg_parameters, &timer, |solution, nodes| {
        formatter.update_solution(solution, &format!("CG n {}", nodes));
    })
}

/// Open-dimension-xy: shrink a square-ish bounding rectangle and re-pack
/// until infeasible.
fn optimize_open_dimension_sequential(
    instance: &Arc<Instance>,
    parameters: &OptimizeParameters,
    formatter: &AlgorithmFormatter,
) -> Result<(), StrategyError> {
    let timer = worker_timer(parameters, formatter);
    let ratio = instance.parameters().open_dimension_xy_aspect_ratio;

    let mut area = 0.0;
    for item_type in instance.item_types() {
        let (mn, mx) = item_type.compute_min_max_orig(0.0, false);
        area += (mx.x - mn.x) * (mx.y - mn.y) * item_type.copies as f64;
    }
    let mut x = (area / ratio).sqrt();
    let x_lower_bound = (instance.item_area() / ratio).sqrt();

    for iteration in 0.. {
        if timer.needs_to_end() {
            break;
        }
        let y = x * ratio;

        let mut sub_builder = InstanceBuilder::new();
        sub_builder.set_objective(Objective::BinPacking);
        sub_builder.set_parameters(instance.parameters().clone());
        sub_builder.add_bin_type(
            shapepack_geometry::shape::Shape::rectangle(x, y),
            None,
            Some(1),
            0,
        );
        for item_type in instance.item_types() {
            sub_builder.add_item_type_from(item_type, None, item_type.copies);
        }
        let sub_instance = Arc::new(sub_builder.build()?);

        let sub_solution = crate::subproblem::solve_fixed(
            &sub_instance,
            parameters.not_anytime_tree_search_queue_size,
            parameters.not_anytime_maximum_approximation_ratio,
            &timer,
        )?;
        if !sub_solution.full() {
            break;
        }

        let mut solution = Solution::new(Arc::clone(instance));
        solution.append_all(&sub_solution, &[], &[])?;
        formatter.update_solution(&solution, &format!("ODS it {}", iteration));

        let previous_x = x;
        let extent = (solution.x_max() - solution.x_min())
            .max(solution.y_max() - solution.y_min());
        x = (0.99 * extent).max(x_lower_bound);
        let used_area =
            (solution.x_max() - solution.x_min()) * (solution.y_max() - solution.y_min());
        let x_area = (used_area / ratio).sqrt();
        if x > x_area {
            x = x_area;
        }
        if x >= previous_x {
            break;
        }
    }
    Ok(())
}

/// Re-solve the last bin with the leftover-oriented guides and replace it
/// when the re-solve packs everything.
fn post_process_leftovers(
    instance: &Arc<Instance>,
    parameters: &OptimizeParameters,
    formatter: &AlgorithmFormatter,
) -> Result<(), StrategyError> {
    let best = formatter.output().solution;
    if best.number_of_different_bins() == 0 {
        return Ok(());
    }
    let last_bin_pos = best.number_of_different_bins() - 1;
    let last_bin = best.bin(last_bin_pos);
    if last_bin.copies != 1 {
        return Ok(());
    }

    let mut last_builder = InstanceBuilder::new();
    last_builder.set_objective(Objective::BinPackingWithLeftovers);
    last_builder.set_parameters(instance.parameters().clone());
    last_builder.add_bin_type_from(instance.bin_type(last_bin.bin_type_id), Some(1), 0);

    let mut last_bin_item_copies = vec![0; instance.number_of_item_types()];
    for item in &last_bin.items {
        last_bin_item_copies[item.item_type_id] += 1;
    }
    let mut last_to_orig: Vec<usize> = Vec::new();
    for (item_type_id, item_type) in instance.item_types().iter().enumerate() {
        if last_bin_item_copies[item_type_id] > 0 {
            last_builder.add_item_type_from(
                item_type,
                None,
                last_bin_item_copies[item_type_id],
            );
            last_to_orig.push(item_type_id);
        }
    }
    let last_instance = Arc::new(last_builder.build()?);

    let last_parameters = OptimizeParameters {
        verbosity_level: 0,
        timer: worker_timer(parameters, formatter),
        optimization_mode: parameters.optimization_mode,
        tree_search_guides: vec![2, 3],
        not_anytime_maximum_approximation_ratio: parameters
            .not_anytime_maximum_approximation_ratio,
        not_anytime_tree_search_queue_size: parameters.not_anytime_tree_search_queue_size,
        ..OptimizeParameters::default()
    };
    let last_output = optimize(&last_instance, last_parameters)?;
    if !last_output.solution.full() {
        return Ok(());
    }

    let mut solution = Solution::new(Arc::clone(instance));
    for bin_pos in 0..last_bin_pos {
        let copies = best.bin(bin_pos).copies;
        solution.append(&best, bin_pos, copies, &[], &[])?;
    }
    solution.append(
        &last_output.solution,
        0,
        last_bin.copies,
        &[last_bin.bin_type_id],
        &last_to_orig,
    )?;
    formatter.update_solution(&solution, "post-process");
    Ok(())
}
