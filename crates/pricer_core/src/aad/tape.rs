//! Record/replay tape for reverse-mode adjoint differentiation.
//!
//! Every active operation records one [`Node`]. A node owns a slice of
//! [`Edge`]s (local partial derivatives pointing at its inputs) and one or
//! more adjoint slots. Propagation walks the recorded nodes backward and
//! pushes each node's adjoint into its inputs.
//!
//! Nodes, edges and adjoints live in three separate [`Arena`]s, and edges
//! refer to their targets by [`NodeId`] rather than by address.
//!
//! # Checkpointing
//!
//! The tape supports the Monte Carlo replay pattern:
//!
//! 1. record the model parameters and any path-independent setup;
//! 2. [`Tape::mark`];
//! 3. per path, [`Tape::rewind_to_mark`], record, seed the result and
//!    [`Tape::propagate_to_mark`];
//! 4. once at the end, [`Tape::propagate_mark_to_start`].
//!
//! Adjoints of nodes before the mark accumulate across paths, and the
//! storage after the mark is reused path after path.

use super::arena::{Arena, Position};
use crate::types::AadError;

/// Adjoints with magnitude below this are treated as zero during propagation.
const NEGLIGIBLE_ADJOINT: f64 = 1e-300;

/// Identifier of a recorded node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(Position);

impl NodeId {
    /// Arena position of the node.
    #[inline]
    pub fn position(self) -> Position {
        self.0
    }
}

/// Weighted dependency on an input.
///
/// A `target` of `None` marks a passive input. Such edges are accepted by the
/// recording functions and dropped before storage.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Edge {
    /// Partial derivative of the node with respect to the target.
    pub weight: f64,
    /// Input node, or `None` for a passive input.
    pub target: Option<NodeId>,
}

impl Edge {
    /// Creates an edge.
    #[inline]
    pub fn new(weight: f64, target: Option<NodeId>) -> Self {
        Self { weight, target }
    }
}

/// One recorded operation.
#[derive(Clone, Copy, Debug)]
pub struct Node {
    n_edges: usize,
    edges: Position,
    adjoints: Position,
}

impl Node {
    /// Number of active inputs. Zero for leaves.
    #[inline]
    pub fn n_edges(&self) -> usize {
        self.n_edges
    }
}

/// Computation tape.
///
/// # Examples
///
/// ```
/// use pricer_core::aad::{Edge, Tape};
///
/// let mut tape = Tape::new();
/// let x = tape.record_leaf();
/// // y = 3 x
/// let y = tape.record_node([Edge::new(3.0, Some(x))]);
///
/// tape.set_adjoint(y, 1.0);
/// tape.propagate_to_start(y);
/// assert_eq!(tape.adjoint(x), 3.0);
/// ```
#[derive(Debug, Clone)]
pub struct Tape {
    nodes: Arena<Node>,
    edges: Arena<Edge>,
    adjoints: Arena<f64>,
    n_adjoints: usize,
}

impl Default for Tape {
    fn default() -> Self {
        Self::new()
    }
}

impl Tape {
    /// Creates an empty single-adjoint tape.
    pub fn new() -> Self {
        Self::with_block_size(16_384)
    }

    /// Creates an empty tape whose node arena uses `block_size` elements per
    /// block. Edges get four times as much room.
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            nodes: Arena::new(block_size),
            edges: Arena::new(block_size * 4),
            adjoints: Arena::new(block_size),
            n_adjoints: 1,
        }
    }

    /// Number of adjoint slots per node.
    #[inline]
    pub fn num_adjoints(&self) -> usize {
        self.n_adjoints
    }

    /// Switches to `n` adjoints per node.
    ///
    /// # Errors
    ///
    /// Returns [`AadError::InvalidAdjointCount`] if `n` is zero and
    /// [`AadError::TapeNotEmpty`] if any node is already recorded.
    pub fn set_num_adjoints(&mut self, n: usize) -> Result<(), AadError> {
        if n == 0 {
            return Err(AadError::InvalidAdjointCount(n));
        }
        if !self.nodes.is_empty() {
            return Err(AadError::TapeNotEmpty);
        }
        self.n_adjoints = n;
        Ok(())
    }

    /// Number of recorded nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true when no node is recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns true when `id` refers to a node still on the tape.
    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id.0)
    }

    /// Position one past the most recent node.
    #[inline]
    pub fn position(&self) -> Position {
        self.nodes.end_position()
    }

    /// Position of the checkpoint.
    #[inline]
    pub fn mark_position(&self) -> Position {
        self.nodes.mark()
    }

    /// Recorded node.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes.get(id.0)
    }

    /// Active edges of a node.
    #[inline]
    pub fn edges(&self, id: NodeId) -> &[Edge] {
        let node = self.nodes.get(id.0);
        self.edges.slice(node.edges, node.n_edges)
    }

    /// Records an input with no dependencies.
    #[inline]
    pub fn record_leaf(&mut self) -> NodeId {
        self.record_node([])
    }

    /// Records a node with `N` candidate edges. Passive edges are dropped.
    #[inline]
    pub fn record_node<const N: usize>(&mut self, edges: [Edge; N]) -> NodeId {
        self.record_edges(&edges)
    }

    /// Records a node from a slice of candidate edges. Passive edges are
    /// dropped.
    pub fn record_edges(&mut self, edges: &[Edge]) -> NodeId {
        let count = edges.iter().filter(|e| e.target.is_some()).count();
        let pos = self.edges.emplace_back_multi(count);
        let slots = self.edges.slice_mut(pos, count);
        for (slot, edge) in slots
            .iter_mut()
            .zip(edges.iter().filter(|e| e.target.is_some()))
        {
            *slot = *edge;
        }
        self.push_node(count, pos)
    }

    /// Records a folded expression with `n` leaves.
    ///
    /// `fill` writes one edge per leaf into the reserved slots, in any order
    /// and possibly with repeated targets. Repeated targets are then merged
    /// by summing their weights, and passive edges are removed, so the stored
    /// node has exactly one edge per distinct active input.
    pub fn record_folded(&mut self, n: usize, fill: impl FnOnce(&mut [Edge])) -> NodeId {
        let pos = self.edges.emplace_back_multi(n);
        let slots = self.edges.slice_mut(pos, n);
        fill(slots);
        let kept = merge_edges(slots);
        self.edges.pop(n - kept);
        self.push_node(kept, pos)
    }

    fn push_node(&mut self, n_edges: usize, edges: Position) -> NodeId {
        let adjoints = if self.n_adjoints == 1 {
            self.adjoints.emplace_back(0.0)
        } else {
            self.adjoints.emplace_back_multi(self.n_adjoints)
        };
        NodeId(self.nodes.emplace_back(Node {
            n_edges,
            edges,
            adjoints,
        }))
    }

    /// First adjoint of a node.
    #[inline]
    pub fn adjoint(&self, id: NodeId) -> f64 {
        self.adjoint_k(id, 0)
    }

    /// `k`-th adjoint of a node.
    #[inline]
    pub fn adjoint_k(&self, id: NodeId, k: usize) -> f64 {
        let node = self.nodes.get(id.0);
        self.adjoints.slice(node.adjoints, self.n_adjoints)[k]
    }

    /// Checked adjoint read.
    ///
    /// # Errors
    ///
    /// Returns [`AadError::NotOnTape`] if the node was rewound away, and
    /// [`AadError::InvalidAdjointCount`] if `k` is out of range.
    pub fn try_adjoint(&self, id: NodeId, k: usize) -> Result<f64, AadError> {
        if !self.contains(id) {
            return Err(AadError::NotOnTape);
        }
        if k >= self.n_adjoints {
            return Err(AadError::InvalidAdjointCount(k));
        }
        Ok(self.adjoint_k(id, k))
    }

    /// Mutable `k`-th adjoint of a node.
    #[inline]
    pub fn adjoint_mut(&mut self, id: NodeId, k: usize) -> &mut f64 {
        let node = *self.nodes.get(id.0);
        &mut self.adjoints.slice_mut(node.adjoints, self.n_adjoints)[k]
    }

    /// Sets the first adjoint of a node.
    #[inline]
    pub fn set_adjoint(&mut self, id: NodeId, value: f64) {
        *self.adjoint_mut(id, 0) = value;
    }

    /// Zeroes every adjoint on the tape.
    pub fn reset_adjoints(&mut self) {
        self.adjoints.for_each_mut(|a| *a = 0.0);
    }

    /// Pushes the adjoints of one node into its inputs and zeroes them.
    ///
    /// Leaves and nodes with negligible adjoints are left untouched.
    #[inline]
    pub fn propagate_one(&mut self, id: NodeId) {
        let node = *self.nodes.get(id.0);
        Self::propagate_node(
            &self.nodes,
            &self.edges,
            &mut self.adjoints,
            self.n_adjoints,
            &node,
        );
    }

    /// Propagates from `from` back to `to`, both inclusive.
    ///
    /// # Panics
    ///
    /// Panics if `from` is not on the tape or if `to` was recorded after
    /// `from`.
    pub fn propagate(&mut self, from: NodeId, to: NodeId) {
        assert!(self.contains(from), "propagation start is not on the tape");
        assert!(to <= from, "propagation range runs forward");
        self.propagate_span(to.0, from.0.next());
    }

    /// Propagates from `from` back to the first node.
    pub fn propagate_to_start(&mut self, from: NodeId) {
        assert!(self.contains(from), "propagation start is not on the tape");
        self.propagate_span(Position::START, from.0.next());
    }

    /// Propagates from `from` back to the checkpoint.
    ///
    /// # Panics
    ///
    /// Panics if `from` was recorded before the checkpoint.
    pub fn propagate_to_mark(&mut self, from: NodeId) {
        assert!(self.contains(from), "propagation start is not on the tape");
        let mark = self.nodes.mark();
        assert!(from.0 >= mark, "propagation start precedes the mark");
        self.propagate_span(mark, from.0.next());
    }

    /// Propagates every node recorded before the checkpoint.
    pub fn propagate_mark_to_start(&mut self) {
        let mark = self.nodes.mark();
        self.propagate_span(Position::START, mark);
    }

    /// Walks the nodes in `[start, end)` backward.
    fn propagate_span(&mut self, start: Position, end: Position) {
        let n_adjoints = self.n_adjoints;
        for (_, node) in self.nodes.range(start, end).rev() {
            Self::propagate_node(
                &self.nodes,
                &self.edges,
                &mut self.adjoints,
                n_adjoints,
                node,
            );
        }
    }

    #[inline]
    fn propagate_node(
        nodes: &Arena<Node>,
        edges: &Arena<Edge>,
        adjoints: &mut Arena<f64>,
        n_adjoints: usize,
        node: &Node,
    ) {
        if node.n_edges == 0 {
            return;
        }
        if n_adjoints == 1 {
            let adjoint = *adjoints.get(node.adjoints);
            if adjoint.abs() <= NEGLIGIBLE_ADJOINT {
                return;
            }
            for edge in edges.slice(node.edges, node.n_edges) {
                if let Some(target) = edge.target {
                    let target_pos = nodes.get(target.0).adjoints;
                    *adjoints.get_mut(target_pos) += adjoint * edge.weight;
                }
            }
            *adjoints.get_mut(node.adjoints) = 0.0;
        } else {
            for k in 0..n_adjoints {
                let src = Position {
                    block: node.adjoints.block,
                    slot: node.adjoints.slot + k,
                };
                let adjoint = *adjoints.get(src);
                if adjoint.abs() <= NEGLIGIBLE_ADJOINT {
                    continue;
                }
                for edge in edges.slice(node.edges, node.n_edges) {
                    if let Some(target) = edge.target {
                        let base = nodes.get(target.0).adjoints;
                        let dst = Position {
                            block: base.block,
                            slot: base.slot + k,
                        };
                        *adjoints.get_mut(dst) += adjoint * edge.weight;
                    }
                }
                *adjoints.get_mut(src) = 0.0;
            }
        }
    }

    /// Sets the checkpoint at the current end of the tape.
    pub fn mark(&mut self) {
        self.nodes.set_mark();
        self.edges.set_mark();
        self.adjoints.set_mark();
    }

    /// Drops every node recorded after the checkpoint.
    pub fn rewind_to_mark(&mut self) {
        self.nodes.rewind_to_mark();
        self.edges.rewind_to_mark();
        self.adjoints.rewind_to_mark();
    }

    /// Drops every node and the checkpoint, keeping storage.
    pub fn rewind(&mut self) {
        self.nodes.rewind();
        self.edges.rewind();
        self.adjoints.rewind();
    }

    /// Drops every node and releases storage.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.adjoints.clear();
    }
}

/// Sorts by target, sums weights of repeated targets and drops passive
/// edges. Returns the number of edges kept at the front of the slice.
fn merge_edges(edges: &mut [Edge]) -> usize {
    edges.sort_unstable_by_key(|e| e.target);
    let mut kept = 0;
    for i in 0..edges.len() {
        let edge = edges[i];
        if edge.target.is_none() {
            continue;
        }
        if kept > 0 && edges[kept - 1].target == edge.target {
            edges[kept - 1].weight += edge.weight;
        } else {
            edges[kept] = edge;
            kept += 1;
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_leaf_has_no_edges() {
        let mut tape = Tape::new();
        let x = tape.record_leaf();
        assert_eq!(tape.node(x).n_edges(), 0);
        assert!(tape.edges(x).is_empty());
    }

    #[test]
    fn test_passive_edges_are_dropped() {
        let mut tape = Tape::new();
        let x = tape.record_leaf();
        let y = tape.record_node([Edge::new(2.0, Some(x)), Edge::new(5.0, None)]);
        assert_eq!(tape.edges(y).len(), 1);
    }

    #[test]
    fn test_propagate_chain() {
        // z = x * y with x = 2, y = 3
        let mut tape = Tape::new();
        let x = tape.record_leaf();
        let y = tape.record_leaf();
        let z = tape.record_node([Edge::new(3.0, Some(x)), Edge::new(2.0, Some(y))]);
        tape.set_adjoint(z, 1.0);
        tape.propagate_to_start(z);
        assert_relative_eq!(tape.adjoint(x), 3.0);
        assert_relative_eq!(tape.adjoint(y), 2.0);
        assert_eq!(tape.adjoint(z), 0.0);
    }

    #[test]
    fn test_record_folded_merges_duplicates() {
        let mut tape = Tape::new();
        let x = tape.record_leaf();
        let y = tape.record_leaf();
        let z = tape.record_folded(4, |edges| {
            edges[0] = Edge::new(1.0, Some(y));
            edges[1] = Edge::new(2.0, Some(x));
            edges[2] = Edge::new(9.0, None);
            edges[3] = Edge::new(0.5, Some(y));
        });
        let stored = tape.edges(z);
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0], Edge::new(2.0, Some(x)));
        assert_eq!(stored[1], Edge::new(1.5, Some(y)));
    }

    #[test]
    fn test_checkpoint_accumulates_before_mark() {
        let mut tape = Tape::new();
        let p = tape.record_leaf();
        let q = tape.record_node([Edge::new(2.0, Some(p))]);
        tape.mark();
        for _ in 0..3 {
            tape.rewind_to_mark();
            let r = tape.record_node([Edge::new(5.0, Some(q))]);
            tape.set_adjoint(r, 1.0);
            tape.propagate_to_mark(r);
        }
        assert_relative_eq!(tape.adjoint(q), 15.0);
        tape.propagate_mark_to_start();
        assert_relative_eq!(tape.adjoint(p), 30.0);
        assert_eq!(tape.len(), 3);
    }

    #[test]
    fn test_multi_adjoint_propagation() {
        let mut tape = Tape::new();
        tape.set_num_adjoints(2).unwrap();
        let x = tape.record_leaf();
        let y = tape.record_leaf();
        let a = tape.record_node([Edge::new(4.0, Some(x))]);
        let b = tape.record_node([Edge::new(-1.0, Some(y)), Edge::new(2.0, Some(x))]);
        *tape.adjoint_mut(a, 0) = 1.0;
        *tape.adjoint_mut(b, 1) = 1.0;
        tape.propagate_to_start(b);
        assert_relative_eq!(tape.adjoint_k(x, 0), 4.0);
        assert_relative_eq!(tape.adjoint_k(x, 1), 2.0);
        assert_relative_eq!(tape.adjoint_k(y, 1), -1.0);
        assert_eq!(tape.adjoint_k(y, 0), 0.0);
    }

    #[test]
    fn test_set_num_adjoints_requires_empty_tape() {
        let mut tape = Tape::new();
        assert_eq!(tape.set_num_adjoints(0), Err(AadError::InvalidAdjointCount(0)));
        tape.record_leaf();
        assert_eq!(tape.set_num_adjoints(3), Err(AadError::TapeNotEmpty));
    }

    #[test]
    fn test_try_adjoint_after_rewind() {
        let mut tape = Tape::new();
        tape.mark();
        let x = tape.record_leaf();
        assert_eq!(tape.try_adjoint(x, 0), Ok(0.0));
        tape.rewind_to_mark();
        assert_eq!(tape.try_adjoint(x, 0), Err(AadError::NotOnTape));
    }

    #[test]
    fn test_reset_adjoints() {
        let mut tape = Tape::new();
        let x = tape.record_leaf();
        tape.set_adjoint(x, 3.0);
        tape.reset_adjoints();
        assert_eq!(tape.adjoint(x), 0.0);
    }

    #[test]
    #[should_panic(expected = "precedes the mark")]
    fn test_propagate_to_mark_rejects_earlier_node() {
        let mut tape = Tape::new();
        let x = tape.record_leaf();
        tape.mark();
        tape.propagate_to_mark(x);
    }
}
