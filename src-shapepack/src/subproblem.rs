//! Fixed-effort tree search used by the decomposition strategies.
//!
//! Sequential single knapsack, sequential value correction, dichotomic
//! search and column generation all need a "solve this small instance now"
//! primitive. This runs one beam-search pass per direction at a fixed
//! queue size and returns the best solution found.

use std::sync::Arc;

use shapepack_beam::{beam_search, BeamSearchParameters, Timer};
use shapepack_trapezoid::TrapezoidationError;

use crate::branching_scheme::{BranchingScheme, Direction, Parameters as SchemeParameters};
use crate::instance::{Instance, Objective};
use crate::instance_builder::InstanceError;
use crate::solution::{Solution, SolutionError};

/// Errors surfaced by the strategies.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("geometry preprocessing failed: {0}")]
    Geometry(#[from] TrapezoidationError),

    #[error("invalid sub-instance: {0}")]
    Instance(#[from] InstanceError),

    #[error("invalid placement: {0}")]
    Solution(#[from] SolutionError),

    #[error("linear programming solver failed")]
    LinearProgramming,
}

/// Default guides for an objective.
pub fn default_guides(objective: Objective) -> Vec<usize> {
    match objective {
        Objective::Knapsack => vec![4, 5],
        _ => vec![0, 1],
    }
}

/// Default directions for an instance.
pub fn default_directions(instance: &Instance) -> Vec<Direction> {
    match instance.objective() {
        Objective::OpenDimensionX => vec![
            Direction::LeftToRightThenBottomToTop,
            Direction::LeftToRightThenTopToBottom,
        ],
        Objective::OpenDimensionY => vec![
            Direction::BottomToTopThenLeftToRight,
            Direction::BottomToTopThenRightToLeft,
        ],
        _ => {
            if instance.number_of_bin_types() == 1 {
                if instance.objective() == Objective::BinPackingWithLeftovers {
                    vec![
                        Direction::LeftToRightThenBottomToTop,
                        Direction::BottomToTopThenLeftToRight,
                        Direction::LeftToRightThenTopToBottom,
                        Direction::BottomToTopThenRightToLeft,
                    ]
                } else {
                    vec![
                        Direction::LeftToRightThenBottomToTop,
                        Direction::BottomToTopThenLeftToRight,
                        Direction::RightToLeftThenTopToBottom,
                        Direction::TopToBottomThenRightToLeft,
                    ]
                }
            } else {
                vec![Direction::Any]
            }
        }
    }
}

/// Collapse to a single direction when rotational symmetry makes the
/// others redundant: all items freely rotatable and all bins square.
pub fn collapse_directions(instance: &Instance, directions: Vec<Direction>) -> Vec<Direction> {
    let all_items_full_rotation = instance
        .item_types()
        .iter()
        .all(|item_type| item_type.has_full_continuous_rotations());
    let all_bins_squared = instance
        .bin_types()
        .iter()
        .all(|bin_type| bin_type.shape_scaled.is_square());
    if all_items_full_rotation && all_bins_squared {
        vec![Direction::LeftToRightThenBottomToTop]
    } else {
        directions
    }
}

/// One beam-search pass per (first default guide, direction) at a fixed
/// queue size; returns the best solution found, possibly empty.
pub fn solve_fixed(
    instance: &Arc<Instance>,
    queue_size: usize,
    maximum_approximation_ratio: f64,
    timer: &Timer,
) -> Result<Solution, StrategyError> {
    let guide_id = default_guides(instance.objective())[0];
    let directions = collapse_directions(instance, default_directions(instance));

    let mut best = Solution::new(Arc::clone(instance));
    for direction in directions {
        if timer.needs_to_end() {
            break;
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
                cutoff: None,
            },
        );
        if let Some(node) = output.solution {
            let solution = scheme.to_solution(&node)?;
            if solution.better_than(&best) {
                best = solution;
            }
        }
    }
    Ok(best)
}
