//! Optimization output: incumbent solution, bounds and timing.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use crate::instance::Instance;
use crate::solution::Solution;

/// The state published by the orchestrator: best solution so far plus the
/// bounds proved by the area relaxation.
#[derive(Clone)]
pub struct Output {
    /// Best solution found so far (possibly empty).
    pub solution: Solution,

    /// Upper bound on the reachable profit (knapsack).
    pub knapsack_bound: Option<f64>,

    /// Lower bound on the number of bins (bin packing).
    pub bin_packing_bound: Option<usize>,

    /// Lower bound on the total bin cost (variable-sized bin packing).
    pub variable_sized_bin_packing_bound: Option<f64>,

    /// Elapsed seconds when the output was produced.
    pub time: f64,

    /// True when the run was stopped by the timer.
    pub ended_by_timer: bool,
}

impl Output {
    pub fn new(instance: Arc<Instance>) -> Self {
        Output {
            solution: Solution::new(instance),
            knapsack_bound: None,
            bin_packing_bound: None,
            variable_sized_bin_packing_bound: None,
            time: 0.0,
            ended_by_timer: false,
        }
    }

    /// Write the JSON summary (solution metrics plus bounds).
    pub fn write_json_output(&self, output_path: &Path) -> std::io::Result<()> {
        let mut json = self.solution.to_json();
        json["Time"] = json!(self.time);
        json["EndedByTimer"] = json!(self.ended_by_timer);
        if let Some(bound) = self.knapsack_bound {
            json["KnapsackBound"] = json!(bound);
        }
        if let Some(bound) = self.bin_packing_bound {
            json["BinPackingBound"] = json!(bound);
        }
        if let Some(bound) = self.variable_sized_bin_packing_bound {
            json["VariableSizedBinPackingBound"] = json!(bound);
        }
        write_text_atomic(output_path, &serde_json::to_string_pretty(&json).unwrap())
    }
}

/// Write a file atomically: write a temporary sibling, then rename.
pub fn write_text_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_path);
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)
}
