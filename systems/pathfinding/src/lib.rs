#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Generic A* search over any graph whose nodes can measure distances and
//! enumerate successors.
//!
//! The search is deterministic: open-list ties are broken by estimation and
//! then by push order, never by container internals, and hash maps are only
//! used for lookups. Unreachable targets are not errors; the search returns
//! the route to the explored node estimated closest to the target instead.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
    hash::Hash,
    time::{Duration, Instant},
};

use tracing::debug;

pub use gridwalk_core::Cost;

/// Vertex of a searchable graph.
pub trait Node: Clone + Eq + Hash {
    /// Cost between two nodes.
    ///
    /// For adjacent nodes this is the edge cost; for any other pair it is
    /// used as the estimate toward the target and must never overestimate
    /// the true shortest-path cost.
    fn distance(&self, other: &Self) -> Cost;

    /// Appends the nodes reachable in one step by an object of the given size.
    fn successors(&self, object_size: u32, out: &mut Vec<Self>);
}

/// Outcome of a single search.
#[derive(Clone, Debug)]
pub struct SearchResult<N> {
    /// Nodes from the source to the terminal node, both inclusive.
    pub path: Vec<N>,
    /// Nodes closed by the search, in the order they were closed.
    pub explored: Vec<N>,
    /// Accumulated cost along `path`.
    pub cost: Cost,
    /// Indicates whether `path` ends at the requested target.
    pub reached_target: bool,
    /// Wall-clock duration of the search, for diagnostics only.
    pub elapsed: Duration,
}

impl<N> SearchResult<N> {
    /// Last node of the path, which is the target when it was reached.
    #[must_use]
    pub fn terminal(&self) -> Option<&N> {
        self.path.last()
    }

    /// Number of moves along the path.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

/// Reusable A* search workspace.
///
/// Buffers are kept between runs so repeated searches avoid reallocating.
#[derive(Debug)]
pub struct AStar<N> {
    arena: Vec<SearchNode<N>>,
    open: BinaryHeap<OpenEntry>,
    by_node: HashMap<N, usize>,
    scratch: Vec<N>,
    sequence: u64,
}

impl<N: Node> Default for AStar<N> {
    fn default() -> Self {
        Self {
            arena: Vec::new(),
            open: BinaryHeap::new(),
            by_node: HashMap::new(),
            scratch: Vec::new(),
            sequence: 0,
        }
    }
}

impl<N: Node> AStar<N> {
    /// Creates a search workspace with empty buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Searches for the cheapest route from `source` to `target`.
    ///
    /// `object_size` is handed unchanged to every successor enumeration so
    /// size-dependent blocking is evaluated consistently for the whole search.
    pub fn run(&mut self, source: N, target: N, object_size: u32) -> SearchResult<N> {
        let started = Instant::now();
        self.reset();

        let estimation = source.distance(&target);
        let source_index = self.open_new(source, None, 0, estimation);
        let mut best = source_index;
        let mut reached = None;
        let mut explored = Vec::new();

        while let Some(entry) = self.open.pop() {
            let index = entry.index;
            if self.arena[index].closed {
                continue;
            }
            self.arena[index].closed = true;
            explored.push(self.arena[index].node.clone());

            if self.arena[index].estimation_to_target < self.arena[best].estimation_to_target {
                best = index;
            }
            if self.arena[index].node == target {
                reached = Some(index);
                break;
            }

            self.expand(index, &target, object_size);
        }

        let terminal = reached.unwrap_or(best);
        let result = SearchResult {
            path: self.path_to(terminal),
            explored,
            cost: self.arena[terminal].distance_from_source,
            reached_target: reached.is_some(),
            elapsed: started.elapsed(),
        };
        debug!(
            explored = result.explored.len(),
            steps = result.steps(),
            cost = result.cost,
            reached = result.reached_target,
            elapsed_us = result.elapsed.as_micros() as u64,
            "a* search finished"
        );
        result
    }

    fn reset(&mut self) {
        self.arena.clear();
        self.open.clear();
        self.by_node.clear();
        self.sequence = 0;
    }

    fn expand(&mut self, index: usize, target: &N, object_size: u32) {
        let mut successors = std::mem::take(&mut self.scratch);
        successors.clear();
        let current = self.arena[index].node.clone();
        let current_distance = self.arena[index].distance_from_source;
        current.successors(object_size, &mut successors);

        for successor in successors.drain(..) {
            let distance = current_distance.saturating_add(current.distance(&successor));
            match self.by_node.get(&successor).copied() {
                Some(existing) => {
                    if self.arena[existing].closed {
                        continue;
                    }
                    if self.arena[existing].try_set_new_parent(index, distance) {
                        self.push_open(existing);
                    }
                }
                None => {
                    let estimation = successor.distance(target);
                    let _ = self.open_new(successor, Some(index), distance, estimation);
                }
            }
        }

        self.scratch = successors;
    }

    fn open_new(
        &mut self,
        node: N,
        parent: Option<usize>,
        distance_from_source: Cost,
        estimation_to_target: Cost,
    ) -> usize {
        let index = self.arena.len();
        let _ = self.by_node.insert(node.clone(), index);
        self.arena.push(SearchNode {
            node,
            parent,
            distance_from_source,
            estimation_to_target,
            closed: false,
        });
        self.push_open(index);
        index
    }

    /// Queues a fresh heap entry; entries already queued keep their old priority
    /// and are discarded when popped after the node closes.
    fn push_open(&mut self, index: usize) {
        let node = &self.arena[index];
        self.open.push(OpenEntry {
            priority: node.priority(),
            estimation: node.estimation_to_target,
            sequence: self.sequence,
            index,
        });
        self.sequence += 1;
    }

    fn path_to(&self, terminal: usize) -> Vec<N> {
        let mut path = Vec::new();
        let mut cursor = Some(terminal);
        while let Some(index) = cursor {
            let node = &self.arena[index];
            path.push(node.node.clone());
            cursor = node.parent;
        }
        path.reverse();
        path
    }
}

#[derive(Clone, Debug)]
struct SearchNode<N> {
    node: N,
    parent: Option<usize>,
    distance_from_source: Cost,
    estimation_to_target: Cost,
    closed: bool,
}

impl<N> SearchNode<N> {
    fn priority(&self) -> Cost {
        self.distance_from_source
            .saturating_add(self.estimation_to_target)
    }

    fn try_set_new_parent(&mut self, parent: usize, distance_from_source: Cost) -> bool {
        if distance_from_source >= self.distance_from_source {
            return false;
        }
        self.parent = Some(parent);
        self.distance_from_source = distance_from_source;
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct OpenEntry {
    priority: Cost,
    estimation: Cost,
    sequence: u64,
    index: usize,
}

impl Ord for OpenEntry {
    // BinaryHeap pops the maximum, so the comparison is reversed.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.estimation.cmp(&self.estimation))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Points on a line where only explicitly listed hops exist.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    struct LineNode {
        position: u32,
        hops: &'static [(u32, u32)],
    }

    impl Node for LineNode {
        fn distance(&self, other: &Self) -> Cost {
            self.position.abs_diff(other.position)
        }

        fn successors(&self, _object_size: u32, out: &mut Vec<Self>) {
            for (from, to) in self.hops {
                if *from == self.position {
                    out.push(LineNode {
                        position: *to,
                        hops: self.hops,
                    });
                }
            }
        }
    }

    const HOPS: &[(u32, u32)] = &[(0, 2), (2, 5), (0, 4), (4, 5), (5, 9), (9, 12)];

    fn node(position: u32) -> LineNode {
        LineNode {
            position,
            hops: HOPS,
        }
    }

    #[test]
    fn finds_route_to_reachable_target() {
        let mut search = AStar::new();
        let result = search.run(node(0), node(12), 1);
        assert!(result.reached_target);
        assert_eq!(result.cost, 12);
        assert_eq!(result.path.first(), Some(&node(0)));
        assert_eq!(result.terminal(), Some(&node(12)));
    }

    #[test]
    fn tie_breaking_follows_push_order() {
        let mut search = AStar::new();
        let first = search.run(node(0), node(5), 1);
        let second = search.run(node(0), node(5), 1);
        assert_eq!(first.path, second.path);
        assert_eq!(
            first.path,
            vec![node(0), node(4), node(5)],
            "equal priorities prefer the node estimated closer to the target"
        );
    }

    #[test]
    fn source_equal_to_target_yields_single_node_path() {
        let mut search = AStar::new();
        let result = search.run(node(5), node(5), 1);
        assert!(result.reached_target);
        assert_eq!(result.path, vec![node(5)]);
        assert_eq!(result.steps(), 0);
        assert_eq!(result.cost, 0);
    }

    #[test]
    fn unreachable_target_returns_nearest_explored_node() {
        let mut search = AStar::new();
        let result = search.run(node(0), node(20), 1);
        assert!(!result.reached_target);
        assert_eq!(result.terminal(), Some(&node(12)));
        assert_eq!(result.cost, 12);
    }

    #[test]
    fn shorter_route_replaces_parent() {
        let mut node = SearchNode {
            node: 3_u32,
            parent: Some(0),
            distance_from_source: 10,
            estimation_to_target: 4,
            closed: false,
        };
        assert!(!node.try_set_new_parent(1, 10), "equal cost keeps the parent");
        assert!(node.try_set_new_parent(2, 7));
        assert_eq!(node.parent, Some(2));
        assert_eq!(node.priority(), 11);
    }
}
