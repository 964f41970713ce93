//! Shortest-path alignment over (trace position, model node) states.

use super::{Alignment, AlignmentEngine, AlignmentMove};
use crate::assembler::FilteredDfg;
use crate::primitives::MAX_ALIGNMENT_TRACE_LENGTH;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

/// `(position in trace, model node)`
type State = (usize, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Synchronous,
    Log,
    Model,
    /// Silent transition into END.
    Close,
}

/// Aligns traces against a filtered DFG with Dijkstra's algorithm.
///
/// Activities map to DFG nodes; a model run starts at START, follows
/// edges, and ends with a silent step into END once the trace is consumed.
#[derive(Debug, Clone)]
pub struct DfgAligner {
    log_move_cost: u64,
    model_move_cost: u64,
    max_trace_length: usize,
}

impl Default for DfgAligner {
    fn default() -> Self {
        Self {
            log_move_cost: 1,
            model_move_cost: 1,
            max_trace_length: MAX_ALIGNMENT_TRACE_LENGTH,
        }
    }
}

impl DfgAligner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_costs(mut self, log_move_cost: u64, model_move_cost: u64) -> Self {
        self.log_move_cost = log_move_cost;
        self.model_move_cost = model_move_cost;
        self
    }

    /// Traces longer than this are left unaligned.
    #[must_use]
    pub fn with_max_trace_length(mut self, max_trace_length: usize) -> Self {
        self.max_trace_length = max_trace_length;
        self
    }
}

struct Search {
    dist: BTreeMap<State, u64>,
    prev: BTreeMap<State, (State, Step)>,
    frontier: BinaryHeap<Reverse<(u64, usize, usize)>>,
}

impl Search {
    fn new(origin: State) -> Self {
        let mut search = Self {
            dist: BTreeMap::new(),
            prev: BTreeMap::new(),
            frontier: BinaryHeap::new(),
        };
        search.dist.insert(origin, 0);
        search.frontier.push(Reverse((0, origin.0, origin.1)));
        search
    }

    fn relax(&mut self, from: State, to: State, cost: u64, step: Step) {
        if self.dist.get(&to).is_some_and(|&known| known <= cost) {
            return;
        }
        self.dist.insert(to, cost);
        self.prev.insert(to, (from, step));
        self.frontier.push(Reverse((cost, to.0, to.1)));
    }

    fn moves(
        &self,
        goal: State,
        origin: State,
        model: &FilteredDfg,
        activities: &[String],
    ) -> Vec<AlignmentMove> {
        let mut moves = Vec::new();
        let mut state = goal;
        while state != origin {
            let Some(&(from, step)) = self.prev.get(&state) else {
                break;
            };
            match step {
                Step::Synchronous => {
                    moves.push(AlignmentMove::synchronous(activities[from.0].clone()));
                }
                Step::Log => moves.push(AlignmentMove::log_only(activities[from.0].clone())),
                Step::Model => {
                    moves.push(AlignmentMove::model_only(model.labels[state.1].clone()));
                }
                Step::Close => {}
            }
            state = from;
        }
        moves.reverse();
        moves
    }
}

impl AlignmentEngine for DfgAligner {
    fn align(&self, model: &FilteredDfg, activities: &[String]) -> Option<Alignment> {
        if activities.len() > self.max_trace_length {
            return None;
        }
        let start = model.start()?;
        let end = model.end()?;
        let length = activities.len();
        let origin = (0, start);

        let mut search = Search::new(origin);
        while let Some(Reverse((cost, pos, node))) = search.frontier.pop() {
            if search.dist.get(&(pos, node)).is_some_and(|&known| known < cost) {
                continue;
            }
            if node == end {
                return Some(Alignment {
                    moves: search.moves((pos, node), origin, model, activities),
                    cost,
                });
            }

            let here = (pos, node);
            if pos < length {
                search.relax(here, (pos + 1, node), cost + self.log_move_cost, Step::Log);
            }
            let successors: Vec<usize> = model.successors(node).collect();
            for next in successors {
                if next == end {
                    if pos == length {
                        search.relax(here, (pos, end), cost, Step::Close);
                    }
                    continue;
                }
                if pos < length && model.labels[next] == activities[pos] {
                    search.relax(here, (pos + 1, next), cost, Step::Synchronous);
                }
                search.relax(here, (pos, next), cost + self.model_move_cost, Step::Model);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{END_TOKEN, START_TOKEN};
    use std::collections::BTreeSet;

    /// START -> a -> b -> c -> END
    fn model() -> FilteredDfg {
        FilteredDfg {
            labels: vec![
                START_TOKEN.to_string(),
                END_TOKEN.to_string(),
                "a".to_string(),
                "b".to_string(),
                "c".to_string(),
            ],
            edges: BTreeSet::from([(0, 2), (2, 3), (3, 4), (4, 1)]),
        }
    }

    fn trace(activities: &[&str]) -> Vec<String> {
        activities.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn fitting_trace_costs_nothing() {
        let alignment = DfgAligner::new()
            .align(&model(), &trace(&["a", "b", "c"]))
            .expect("alignment");
        assert_eq!(alignment.cost, 0);
        assert!(alignment.moves.iter().all(AlignmentMove::is_synchronous));
        assert_eq!(alignment.moves.len(), 3);
    }

    #[test]
    fn skipped_activity_is_a_model_move() {
        let alignment = DfgAligner::new()
            .align(&model(), &trace(&["a", "c"]))
            .expect("alignment");
        assert_eq!(alignment.cost, 1);
        assert_eq!(
            alignment.moves,
            vec![
                AlignmentMove::synchronous("a"),
                AlignmentMove::model_only("b"),
                AlignmentMove::synchronous("c"),
            ]
        );
    }

    #[test]
    fn unknown_activity_is_a_log_move() {
        let alignment = DfgAligner::new()
            .align(&model(), &trace(&["a", "b", "x", "c"]))
            .expect("alignment");
        assert_eq!(alignment.cost, 1);
        assert!(alignment.moves.contains(&AlignmentMove::log_only("x")));
    }

    #[test]
    fn empty_trace_walks_the_model() {
        let alignment = DfgAligner::new().align(&model(), &[]).expect("alignment");
        assert_eq!(alignment.cost, 3);
        assert!(alignment.moves.iter().all(|m| m.log.is_none()));
    }

    #[test]
    fn model_without_end_cannot_align() {
        let mut filtered = model();
        filtered.labels.truncate(1);
        filtered.edges.clear();
        assert!(DfgAligner::new().align(&filtered, &trace(&["a"])).is_none());
    }

    #[test]
    fn unreachable_end_cannot_align() {
        let mut filtered = model();
        filtered.edges.remove(&(4, 1));
        assert!(DfgAligner::new().align(&filtered, &trace(&["a"])).is_none());
    }

    #[test]
    fn overlong_traces_are_skipped() {
        let aligner = DfgAligner::new().with_max_trace_length(2);
        assert!(aligner.align(&model(), &trace(&["a", "b", "c"])).is_none());
    }

    #[test]
    fn costs_are_configurable() {
        let aligner = DfgAligner::new().with_costs(5, 1);
        let alignment = aligner
            .align(&model(), &trace(&["a", "x", "b", "c"]))
            .expect("alignment");
        assert_eq!(alignment.cost, 5);
    }
}
