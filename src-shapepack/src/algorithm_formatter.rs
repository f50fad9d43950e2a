//! Incumbent management and progress reporting.
//!
//! All strategies publish through one `AlgorithmFormatter`; a mutex
//! serializes updates and callbacks that do not improve the incumbent under
//! the objective comparator are ignored.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use shapepack_beam::Timer;

use crate::instance::{Instance, Objective};
use crate::output::Output;
use crate::solution::Solution;

/// Where progress messages go.
pub struct MessageStreams {
    pub to_stdout: bool,
    pub to_stderr: bool,
    log_file: Option<Mutex<File>>,
}

impl MessageStreams {
    pub fn new(to_stdout: bool, to_stderr: bool, log_path: Option<&Path>) -> Self {
        let log_file = log_path
            .and_then(|path| File::create(path).ok())
            .map(Mutex::new);
        MessageStreams {
            to_stdout,
            to_stderr,
            log_file,
        }
    }

    fn print(&self, message: &str) {
        if self.to_stdout {
            println!("{}", message);
        }
        if self.to_stderr {
            eprintln!("{}", message);
        }
        if let Some(log_file) = &self.log_file {
            let _ = writeln!(log_file.lock(), "{}", message);
        }
    }
}

/// Shared by all strategy workers; owns the best solution and the bounds.
pub struct AlgorithmFormatter {
    instance: Arc<Instance>,
    verbosity_level: u8,
    streams: MessageStreams,
    timer: Timer,
    output: Mutex<Output>,
    end: Arc<AtomicBool>,
    new_solution_callback: Option<Box<dyn Fn(&Output) + Send + Sync>>,
}

impl AlgorithmFormatter {
    pub fn new(
        instance: Arc<Instance>,
        verbosity_level: u8,
        streams: MessageStreams,
        timer: Timer,
        new_solution_callback: Option<Box<dyn Fn(&Output) + Send + Sync>>,
    ) -> Self {
        let output = Output::new(Arc::clone(&instance));
        AlgorithmFormatter {
            instance,
            verbosity_level,
            streams,
            timer,
            output: Mutex::new(output),
            end: Arc::new(AtomicBool::new(false)),
            new_solution_callback,
        }
    }

    pub fn end_boolean(&self) -> &Arc<AtomicBool> {
        &self.end
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Print the instance description.
    pub fn start(&self) {
        if self.verbosity_level == 0 {
            return;
        }
        let mut buffer = Vec::new();
        let _ = self.instance.format(&mut buffer, self.verbosity_level);
        self.streams.print(String::from_utf8_lossy(&buffer).trim_end());
    }

    /// Print the progress table header.
    pub fn print_header(&self) {
        if self.verbosity_level == 0 {
            return;
        }
        let column = self.objective_column();
        self.streams.print("");
        self.streams
            .print(&format!("{:>10}{:>14}{:>14}  {}", "Time", column, "Bound", "Comment"));
        self.streams
            .print(&format!("{:>10}{:>14}{:>14}  {}", "----", "-".repeat(column.len()), "-----", "-------"));
    }

    fn objective_column(&self) -> &'static str {
        match self.instance.objective() {
            Objective::BinPacking => "Bins",
            Objective::BinPackingWithLeftovers => "Leftover",
            Objective::OpenDimensionX | Objective::OpenDimensionXY => "X max",
            Objective::OpenDimensionY => "Y max",
            Objective::Knapsack => "Profit",
            Objective::VariableSizedBinPacking => "Cost",
        }
    }

    fn objective_value(&self, output: &Output) -> String {
        let solution = &output.solution;
        match self.instance.objective() {
            Objective::BinPacking => format!("{}", solution.number_of_bins()),
            Objective::BinPackingWithLeftovers => format!("{:.6}", solution.leftover_value()),
            Objective::OpenDimensionX | Objective::OpenDimensionXY => {
                format!("{:.6}", solution.x_max())
            }
            Objective::OpenDimensionY => format!("{:.6}", solution.y_max()),
            Objective::Knapsack => format!("{:.6}", solution.profit()),
            Objective::VariableSizedBinPacking => format!("{:.6}", solution.cost()),
        }
    }

    fn bound_value(&self, output: &Output) -> String {
        match self.instance.objective() {
            Objective::BinPacking => output
                .bin_packing_bound
                .map(|b| b.to_string())
                .unwrap_or_default(),
            Objective::Knapsack => output
                .knapsack_bound
                .map(|b| format!("{:.6}", b))
                .unwrap_or_default(),
            Objective::VariableSizedBinPacking => output
                .variable_sized_bin_packing_bound
                .map(|b| format!("{:.6}", b))
                .unwrap_or_default(),
            _ => String::new(),
        }
    }

    fn print_line(&self, output: &Output, comment: &str) {
        if self.verbosity_level == 0 {
            return;
        }
        self.streams.print(&format!(
            "{:>10.3}{:>14}{:>14}  {}",
            output.time,
            self.objective_value(output),
            self.bound_value(output),
            comment
        ));
    }

    /// Publish a solution; keep it iff it improves the incumbent.
    /// Returns true when the incumbent changed.
    pub fn update_solution(&self, solution: &Solution, comment: &str) -> bool {
        let mut output = self.output.lock();
        if !solution.better_than(&output.solution) {
            return false;
        }
        output.solution = solution.clone();
        output.time = self.timer.elapsed().as_secs_f64();
        self.print_line(&output, comment);
        if let Some(callback) = &self.new_solution_callback {
            callback(&output);
        }
        true
    }

    /// Publish an upper bound on the reachable profit.
    pub fn update_knapsack_bound(&self, bound: f64) {
        let mut output = self.output.lock();
        let improved = match output.knapsack_bound {
            None => true,
            Some(current) => bound < current,
        };
        if improved {
            output.knapsack_bound = Some(bound);
            output.time = self.timer.elapsed().as_secs_f64();
            self.print_line(&output, "1D bound");
        }
    }

    /// Publish a lower bound on the number of bins.
    pub fn update_bin_packing_bound(&self, bound: usize) {
        let mut output = self.output.lock();
        let improved = match output.bin_packing_bound {
            None => true,
            Some(current) => bound > current,
        };
        if improved {
            output.bin_packing_bound = Some(bound);
            output.time = self.timer.elapsed().as_secs_f64();
            self.print_line(&output, "1D bound");
        }
    }

    /// Publish a lower bound on the total bin cost.
    pub fn update_variable_sized_bin_packing_bound(&self, bound: f64) {
        let mut output = self.output.lock();
        let improved = match output.variable_sized_bin_packing_bound {
            None => true,
            Some(current) => bound > current,
        };
        if improved {
            output.variable_sized_bin_packing_bound = Some(bound);
            output.time = self.timer.elapsed().as_secs_f64();
            self.print_line(&output, "1D bound");
        }
    }

    /// Snapshot of the current output.
    pub fn output(&self) -> Output {
        self.output.lock().clone()
    }

    /// Finalize: stamp the elapsed time and return the output.
    pub fn end(&self) -> Output {
        let mut output = self.output.lock();
        output.time = self.timer.elapsed().as_secs_f64();
        output.ended_by_timer = self.timer.needs_to_end();
        if self.verbosity_level >= 1 {
            let mut buffer = Vec::new();
            let _ = writeln!(buffer);
            let _ = writeln!(buffer, "Final statistics");
            let _ = writeln!(buffer, "----------------");
            let _ = writeln!(buffer, "Time (s):  {:.3}", output.time);
            let _ = output.solution.format(&mut buffer, self.verbosity_level);
            self.streams.print(String::from_utf8_lossy(&buffer).trim_end());
        }
        output.clone()
    }
}
