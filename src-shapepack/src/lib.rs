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

// Re-export the workspace crates.
pub use shapepack_beam as beam;
pub use shapepack_geometry as geometry;
pub use shapepack_trapezoid as trapezoid;

/// Incumbent management and progress reporting
pub mod algorithm_formatter;
/// Area-relaxation bounds
pub mod bounds;
/// The branching scheme: skyline state, placements, guides, dominance
pub mod branching_scheme;
/// Column generation with limited-discrepancy diving
pub mod column_generation;
/// Dichotomic search on the waste percentage
pub mod dichotomic_search;
/// Instance model
pub mod instance;
/// Instance builder: validation, JSON reading, preprocessing
pub mod instance_builder;
/// Orchestrator and strategy loops
pub mod optimize;
/// Optimization output and JSON summary
pub mod output;
/// Sequential value correction and sequential single knapsack
pub mod sequential_value_correction;
/// Solution container and certificates
pub mod solution;
/// Fixed-effort tree search for the decomposition strategies
pub mod subproblem;

// Re-export commonly used items.
pub use instance::{Instance, Objective, OptimizationMode, Parameters};
pub use instance_builder::{InstanceBuilder, InstanceError};
pub use optimize::{optimize, OptimizeParameters};
pub use output::Output;
pub use solution::{Solution, SolutionError};
