//! shapepack - a solver for two-dimensional irregular cutting and packing
//! problems
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
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use shapepack::instance::{Objective, OptimizationMode};
use shapepack::{optimize, InstanceBuilder, OptimizeParameters};

/// Solve a two-dimensional irregular cutting and packing problem.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON instance.
    #[arg(short, long)]
    input: PathBuf,

    /// Objective; overrides the one of the instance file.
    #[arg(short = 'f', long)]
    objective: Option<String>,

    /// Minimum spacing between an item and the bin border or a defect.
    #[arg(long)]
    item_bin_minimum_spacing: Option<f64>,

    /// Minimum spacing between two items.
    #[arg(long)]
    item_item_minimum_spacing: Option<f64>,

    /// Set every item profit to the item area.
    #[arg(long, default_value_t = false)]
    unweighted: bool,

    /// Set every bin cost to the bin area.
    #[arg(long, default_value_t = false)]
    bin_unweighted: bool,

    /// Path of the JSON output summary.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path of the JSON solution certificate.
    #[arg(short, long)]
    certificate: Option<PathBuf>,

    /// Path of the log file.
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Time limit in seconds.
    #[arg(short, long)]
    time_limit: Option<f64>,

    /// Seed (the search itself is deterministic; accepted for tooling
    /// compatibility).
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Verbosity level (0 to 3).
    #[arg(short, long, default_value_t = 1)]
    verbosity_level: u8,

    /// Write the log to stderr.
    #[arg(long, default_value_t = false)]
    log2stderr: bool,

    /// Only write the output and certificate files at the end.
    #[arg(short = 'e', long, default_value_t = false)]
    only_write_at_the_end: bool,

    /// Optimization mode: anytime, not-anytime, not-anytime-sequential or
    /// not-anytime-deterministic.
    #[arg(long, default_value = "anytime")]
    optimization_mode: String,

    /// Enable the tree search algorithm.
    #[arg(long)]
    use_tree_search: Option<bool>,

    /// Enable the sequential single knapsack algorithm.
    #[arg(long)]
    use_sequential_single_knapsack: Option<bool>,

    /// Enable the sequential value correction algorithm.
    #[arg(long)]
    use_sequential_value_correction: Option<bool>,

    /// Enable the dichotomic search algorithm.
    #[arg(long)]
    use_dichotomic_search: Option<bool>,

    /// Enable the column generation algorithm.
    #[arg(long)]
    use_column_generation: Option<bool>,

    /// Queue size of the value-correction knapsack subproblems.
    #[arg(long)]
    sequential_value_correction_subproblem_queue_size: Option<usize>,

    /// Queue size of the column-generation pricing subproblems.
    #[arg(long)]
    column_generation_subproblem_queue_size: Option<usize>,

    /// Queue size of the tree search in not-anytime modes.
    #[arg(long)]
    not_anytime_tree_search_queue_size: Option<usize>,

    /// Queue size of the single-knapsack subproblems in not-anytime modes.
    #[arg(long)]
    not_anytime_sequential_single_knapsack_subproblem_queue_size: Option<usize>,

    /// Iterations of the value correction in not-anytime modes.
    #[arg(long)]
    not_anytime_sequential_value_correction_number_of_iterations: Option<usize>,

    /// Queue size of the dichotomic-search subproblems in not-anytime
    /// modes.
    #[arg(long)]
    not_anytime_dichotomic_search_subproblem_queue_size: Option<usize>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _ = args.seed;

    let mut instance_builder = InstanceBuilder::new();
    if let Err(error) = instance_builder.read(&args.input) {
        eprintln!("shapepack: {}", error);
        return ExitCode::FAILURE;
    }

    if let Some(objective) = &args.objective {
        match objective.parse::<Objective>() {
            Ok(objective) => instance_builder.set_objective(objective),
            Err(error) => {
                eprintln!("shapepack: {}", error);
                return ExitCode::FAILURE;
            }
        }
    }
    if let Some(spacing) = args.item_item_minimum_spacing {
        instance_builder.set_item_item_minimum_spacing(spacing);
    }
    if let Some(spacing) = args.item_bin_minimum_spacing {
        instance_builder.set_item_bin_minimum_spacing(spacing);
    }
    if args.unweighted {
        instance_builder.set_item_types_unweighted();
    }
    if args.bin_unweighted {
        instance_builder.set_bin_types_unweighted();
    }

    let instance = match instance_builder.build() {
        Ok(instance) => Arc::new(instance),
        Err(error) => {
            eprintln!("shapepack: {}", error);
            return ExitCode::FAILURE;
        }
    };

    let mut parameters = OptimizeParameters {
        verbosity_level: args.verbosity_level,
        messages_to_stdout: true,
        log_to_stderr: args.log2stderr,
        log_path: args.log.clone(),
        ..OptimizeParameters::default()
    };
    if let Some(time_limit) = args.time_limit {
        parameters.timer.set_time_limit(time_limit);
    }
    match args.optimization_mode.parse::<OptimizationMode>() {
        Ok(mode) => parameters.optimization_mode = mode,
        Err(error) => {
            eprintln!("shapepack: {}", error);
            return ExitCode::FAILURE;
        }
    }

    // SIGINT raises the cooperative end flag; the solver returns its best
    // solution so far.
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        let _ = ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::Relaxed);
        });
    }
    parameters.timer.add_end_boolean(&interrupted);

    if let Some(use_tree_search) = args.use_tree_search {
        parameters.use_tree_search = use_tree_search;
    }
    if let Some(use_ssk) = args.use_sequential_single_knapsack {
        parameters.use_sequential_single_knapsack = use_ssk;
    }
    if let Some(use_svc) = args.use_sequential_value_correction {
        parameters.use_sequential_value_correction = use_svc;
    }
    if let Some(use_ds) = args.use_dichotomic_search {
        parameters.use_dichotomic_search = use_ds;
    }
    if let Some(use_cg) = args.use_column_generation {
        parameters.use_column_generation = use_cg;
    }
    if let Some(queue_size) = args.sequential_value_correction_subproblem_queue_size {
        parameters.sequential_value_correction_subproblem_queue_size = queue_size;
    }
    if let Some(queue_size) = args.column_generation_subproblem_queue_size {
        parameters.column_generation_subproblem_queue_size = queue_size;
    }
    if let Some(queue_size) = args.not_anytime_tree_search_queue_size {
        parameters.not_anytime_tree_search_queue_size = queue_size;
    }
    if let Some(queue_size) = args.not_anytime_sequential_single_knapsack_subproblem_queue_size {
        parameters.not_anytime_sequential_single_knapsack_subproblem_queue_size = queue_size;
    }
    if let Some(iterations) = args.not_anytime_sequential_value_correction_number_of_iterations {
        parameters.not_anytime_sequential_value_correction_number_of_iterations = iterations;
    }
    if let Some(queue_size) = args.not_anytime_dichotomic_search_subproblem_queue_size {
        parameters.not_anytime_dichotomic_search_subproblem_queue_size = queue_size;
    }

    if !args.only_write_at_the_end {
        let output_path = args.output.clone();
        let certificate_path = args.certificate.clone();
        parameters.new_solution_callback = Some(Box::new(move |output| {
            if let Some(path) = &output_path {
                let _ = output.write_json_output(path);
            }
            if let Some(path) = &certificate_path {
                let _ = output.solution.write(path);
            }
        }));
    }

    let output = match optimize(&instance, parameters) {
        Ok(output) => output,
        Err(error) => {
            eprintln!("shapepack: {}", error);
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = &args.certificate {
        if let Err(error) = output.solution.write(path) {
            eprintln!("shapepack: {}", error);
        }
    }
    if let Some(path) = &args.output {
        if let Err(error) = output.write_json_output(path) {
            eprintln!("shapepack: {}", error);
        }
    }

    ExitCode::SUCCESS
}
