//! Generic beam search over a branching scheme.
//!
//! The driver is intentionally small: one [`beam_search`] call runs a
//! single pass at a fixed queue size. Callers implement the iterative part
//! (growing queue sizes, restarts with a cutoff) themselves, which keeps
//! this crate independent from any particular problem.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

pub mod timer;

pub use timer::Timer;

/// A branching scheme: how to enumerate, order, compare and prune nodes.
///
/// Nodes are reference-counted and immutable once created; a child holds a
/// strong reference to its parent so that a retained best leaf keeps its
/// whole path alive.
pub trait BranchingScheme {
    type Node;
    type DominanceKey: Hash + Eq;

    /// The root node (no decision taken).
    fn root(&self) -> Rc<Self::Node>;

    /// All children of a node; an empty vector marks a dead end.
    fn children(&self, parent: &Rc<Self::Node>) -> Vec<Rc<Self::Node>>;

    /// True when the node cannot be expanded further.
    fn leaf(&self, node: &Self::Node) -> bool;

    /// True when the node is a valid solution on its own (a knapsack node
    /// is, a partial bin-packing node is not).
    fn solution_candidate(&self, node: &Self::Node) -> bool;

    /// Total order used to choose which nodes stay in the beam
    /// (lesser is better).
    fn guide_cmp(&self, node_1: &Self::Node, node_2: &Self::Node) -> Ordering;

    /// True when `node` provably cannot improve on the solution `best`.
    fn bound(&self, node: &Self::Node, best: &Self::Node) -> bool;

    /// True when solution `node_1` is strictly better than `node_2`.
    fn better(&self, node_1: &Self::Node, node_2: &Self::Node) -> bool;

    /// True when the node takes part in dominance checks.
    fn comparable(&self, node: &Self::Node) -> bool;

    /// Nodes with different keys are never compared for dominance.
    fn dominance_key(&self, node: &Self::Node) -> Self::DominanceKey;

    /// True when `node_1` dominates `node_2`: any completion of `node_2`
    /// is matched or beaten by a completion of `node_1`.
    fn dominates(&self, node_1: &Self::Node, node_2: &Self::Node) -> bool;
}

/// Parameters of a single beam-search pass.
pub struct BeamSearchParameters<B: BranchingScheme> {
    /// Queue size (beam width).
    pub queue_size: usize,

    /// Cooperative timer checked between expansions.
    pub timer: Timer,

    /// Best known solution; used both as the incumbent and for pruning.
    pub cutoff: Option<Rc<B::Node>>,
}

/// Result of a beam-search pass.
pub struct BeamSearchOutput<B: BranchingScheme> {
    /// Best solution found (or the cutoff if nothing beat it).
    pub solution: Option<Rc<B::Node>>,

    /// True when the pass explored the whole tree without truncation: the
    /// returned solution is optimal for the scheme.
    pub optimal: bool,

    /// True when the pass was interrupted by the timer.
    pub ended_by_timer: bool,

    /// Number of nodes expanded.
    pub number_of_nodes: usize,
}

/// Run one beam-search pass at a fixed queue size.
pub fn beam_search<B: BranchingScheme>(
    scheme: &B,
    parameters: BeamSearchParameters<B>,
) -> BeamSearchOutput<B> {
    let mut best = parameters.cutoff.clone();
    let mut truncated = false;
    let mut ended_by_timer = false;
    let mut number_of_nodes = 0;

    let mut queue: Vec<Rc<B::Node>> = vec![scheme.root()];
    while !queue.is_empty() {
        let mut next: Vec<Rc<B::Node>> = Vec::new();
        let mut history: HashMap<B::DominanceKey, Vec<Rc<B::Node>>> = HashMap::new();

        'expand: for node in &queue {
            if parameters.timer.needs_to_end() {
                ended_by_timer = true;
                break 'expand;
            }
            number_of_nodes += 1;
            for child in scheme.children(node) {
                if scheme.solution_candidate(&child) {
                    let improves = match &best {
                        None => true,
                        Some(best_node) => scheme.better(&child, best_node),
                    };
                    if improves {
                        best = Some(Rc::clone(&child));
                    }
                }
                if scheme.leaf(&child) {
                    continue;
                }
                if let Some(best_node) = &best {
                    if scheme.bound(&child, best_node) {
                        continue;
                    }
                }
                if scheme.comparable(&child) {
                    let bucket = history.entry(scheme.dominance_key(&child)).or_default();
                    if bucket
                        .iter()
                        .any(|other| scheme.dominates(other, &child))
                    {
                        continue;
                    }
                    bucket.retain(|other| !scheme.dominates(&child, other));
                    bucket.push(Rc::clone(&child));
                }
                next.push(child);
            }
        }

        // Drop nodes evicted from their dominance bucket by a later child.
        next.retain(|node| {
            if !scheme.comparable(node) {
                return true;
            }
            match history.get(&scheme.dominance_key(node)) {
                None => true,
                Some(bucket) => bucket.iter().any(|other| Rc::ptr_eq(other, node)),
            }
        });

        next.sort_by(|node_1, node_2| scheme.guide_cmp(node_1, node_2));
        if next.len() > parameters.queue_size {
            next.truncate(parameters.queue_size);
            truncated = true;
        }
        if ended_by_timer {
            break;
        }
        queue = next;
    }

    BeamSearchOutput {
        solution: best,
        optimal: !truncated && !ended_by_timer,
        ended_by_timer,
        number_of_nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Toy scheme: pick a subset of weights to get as close as possible to
    /// a capacity without exceeding it.
    struct SubsetSum {
        weights: Vec<u64>,
        capacity: u64,
    }

    struct SubsetNode {
        depth: usize,
        total: u64,
    }

    impl BranchingScheme for SubsetSum {
        type Node = SubsetNode;
        type DominanceKey = (usize, u64);

        fn root(&self) -> Rc<SubsetNode> {
            Rc::new(SubsetNode { depth: 0, total: 0 })
        }

        fn children(&self, parent: &Rc<SubsetNode>) -> Vec<Rc<SubsetNode>> {
            if parent.depth == self.weights.len() {
                return Vec::new();
            }
            let mut children = vec![Rc::new(SubsetNode {
                depth: parent.depth + 1,
                total: parent.total,
            })];
            let total = parent.total + self.weights[parent.depth];
            if total <= self.capacity {
                children.push(Rc::new(SubsetNode {
                    depth: parent.depth + 1,
                    total,
                }));
            }
            children
        }

        fn leaf(&self, node: &SubsetNode) -> bool {
            node.depth == self.weights.len()
        }

        fn solution_candidate(&self, _node: &SubsetNode) -> bool {
            true
        }

        fn guide_cmp(&self, node_1: &SubsetNode, node_2: &SubsetNode) -> Ordering {
            node_2.total.cmp(&node_1.total)
        }

        fn bound(&self, _node: &SubsetNode, _best: &SubsetNode) -> bool {
            false
        }

        fn better(&self, node_1: &SubsetNode, node_2: &SubsetNode) -> bool {
            node_1.total > node_2.total
        }

        fn comparable(&self, _node: &SubsetNode) -> bool {
            true
        }

        fn dominance_key(&self, node: &SubsetNode) -> (usize, u64) {
            (node.depth, node.total)
        }

        fn dominates(&self, _node_1: &SubsetNode, _node_2: &SubsetNode) -> bool {
            // Same depth and same total: the subtrees are identical.
            true
        }
    }

    #[test]
    fn finds_the_exact_subset() {
        let scheme = SubsetSum {
            weights: vec![7, 5, 3, 2],
            capacity: 10,
        };
        let output = beam_search(
            &scheme,
            BeamSearchParameters {
                queue_size: 16,
                timer: Timer::new(),
                cutoff: None,
            },
        );
        assert_eq!(output.solution.unwrap().total, 10);
        assert!(output.optimal);
    }

    #[test]
    fn narrow_beam_is_not_optimal() {
        let scheme = SubsetSum {
            weights: vec![6, 5, 5],
            capacity: 10,
        };
        let output = beam_search(
            &scheme,
            BeamSearchParameters {
                queue_size: 1,
                timer: Timer::new(),
                cutoff: None,
            },
        );
        // The greedy beam keeps the 6 first and misses 5 + 5.
        assert!(!output.optimal);
        assert!(output.solution.unwrap().total <= 10);
    }
}
