// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cycle-safe directed-acyclic-graph engine.
//!
//! [`Dag`] is generic over any caller-supplied key type with equality and
//! hashing. The engine owns a bijective map between keys and dense
//! [`NodeIndex`] values (indices are reused only after a node is fully
//! removed; contiguity is not guaranteed after removals), stores at most one
//! directed edge per ordered pair with optional attached [`EdgeAttrs`], and
//! keeps the structure acyclic at every observable point: an edge insertion
//! that would close a cycle is rolled back before [`GraphError::CycleDetected`]
//! is returned.
//!
//! Read-only queries (`parents`, `children`, reachability) report absence as
//! an empty result, never as an error. Structural violations (duplicate edge,
//! cycle) are errors the caller is expected to treat as fatal to the
//! attempted mutation.
//!
//! The engine is deliberately not thread-safe: single-owner mutation, one
//! graph per logical session.

mod topo;

pub use topo::Generations;

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::{debug, warn};

use skein_value::Value;

/// Attributes attached to an edge.
pub type EdgeAttrs = BTreeMap<String, Value>;

/// Key bound for graph nodes: caller-supplied identity.
pub trait GraphKey: Eq + Hash + Clone + fmt::Debug {}

impl<T: Eq + Hash + Clone + fmt::Debug> GraphKey for T {}

/// Dense node index owned by the engine.
///
/// Stable for the lifetime of the node; reused only after the node is
/// removed. Indices in a [`Dag::subgraph`] are freshly renumbered and carry
/// no relation to the parent graph's.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// The raw index value.
    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The cycle reported by [`GraphError::CycleDetected`].
///
/// Ordered `(node, edge-attrs)` pairs starting at the newly inserted edge's
/// child and ending at its parent, followed by a trailing `(child, None)`
/// sentinel that closes the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct CyclePath<K>(pub Vec<(K, Option<EdgeAttrs>)>);

impl<K: fmt::Debug> fmt::Display for CyclePath<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (node, _)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" => ")?;
            }
            write!(f, "{node:?}")?;
        }
        Ok(())
    }
}

/// Structural-invariant violations raised by edge insertion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError<K: fmt::Debug> {
    /// The ordered pair already has an edge; attrs are not mergeable through
    /// [`Dag::add_edge`].
    #[error("[DUPLICATE_EDGE] {parent:?} already has child {child:?}")]
    DuplicateEdge {
        /// Edge source.
        parent: K,
        /// Edge target.
        child: K,
    },
    /// The insertion would have closed a cycle; the edge has been rolled
    /// back and the graph is unchanged.
    #[error("[CYCLE_DETECTED] {0}")]
    CycleDetected(CyclePath<K>),
}

struct Slot<K> {
    key: K,
    /// Outgoing edges: child slot index plus optional attrs.
    out: Vec<(usize, Option<EdgeAttrs>)>,
    /// Incoming edges: parent slot indices.
    inc: Vec<usize>,
}

/// A directed acyclic graph over keys of type `K`.
pub struct Dag<K> {
    slots: Vec<Option<Slot<K>>>,
    free: Vec<usize>,
    index: FxHashMap<K, usize>,
    edge_count: usize,
}

impl<K: GraphKey> Default for Dag<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: GraphKey> fmt::Display for Dag<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nodes={} edges={}", self.node_count(), self.edge_count())
    }
}

impl<K: GraphKey> Dag<K> {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: FxHashMap::default(),
            edge_count: 0,
        }
    }

    /// Number of live nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    /// Number of live edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether `key` is a node.
    #[must_use]
    pub fn has_node(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// The dense index for `key`, if present.
    #[must_use]
    pub fn node_index(&self, key: &K) -> Option<NodeIndex> {
        self.index.get(key).copied().map(NodeIndex)
    }

    /// The key stored at `index`, if the slot is live.
    #[must_use]
    pub fn key_of(&self, index: NodeIndex) -> Option<&K> {
        self.slot(index.0).map(|slot| &slot.key)
    }

    /// Add a node, returning its index. Idempotent: an existing key keeps
    /// its index.
    pub fn add_node(&mut self, key: K) -> NodeIndex {
        if let Some(&idx) = self.index.get(&key) {
            return NodeIndex(idx);
        }
        let slot = Slot {
            key: key.clone(),
            out: Vec::new(),
            inc: Vec::new(),
        };
        let idx = if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(slot);
            idx
        } else {
            self.slots.push(Some(slot));
            self.slots.len() - 1
        };
        self.index.insert(key, idx);
        NodeIndex(idx)
    }

    /// Remove a node and all incident edges.
    ///
    /// Removing a key that is not a node logs a warning and changes nothing.
    pub fn remove_node(&mut self, key: &K) {
        let Some(idx) = self.index.remove(key) else {
            warn!(key = ?key, "remove_node: not found");
            return;
        };
        debug!(key = ?key, index = idx, "remove_node");
        let Some(slot) = self.slots[idx].take() else {
            return;
        };
        self.free.push(idx);
        // Detach incoming edges from each parent's out-list.
        for parent in slot.inc {
            if let Some(Some(pslot)) = self.slots.get_mut(parent) {
                let before = pslot.out.len();
                pslot.out.retain(|(child, _)| *child != idx);
                self.edge_count -= before - pslot.out.len();
            }
        }
        // Detach outgoing edges from each child's in-list.
        for (child, _) in &slot.out {
            if let Some(Some(cslot)) = self.slots.get_mut(*child) {
                cslot.inc.retain(|parent| *parent != idx);
            }
        }
        self.edge_count -= slot.out.len();
    }

    /// Whether `parent -> child` is an edge.
    #[must_use]
    pub fn has_child(&self, parent: &K, child: &K) -> bool {
        self.edge_attrs_entry(parent, child).is_some()
    }

    /// The attrs attached to `parent -> child`, if the edge exists and
    /// carries any.
    #[must_use]
    pub fn edge_attrs(&self, parent: &K, child: &K) -> Option<&EdgeAttrs> {
        self.edge_attrs_entry(parent, child)
            .and_then(Option::as_ref)
    }

    fn edge_attrs_entry(&self, parent: &K, child: &K) -> Option<&Option<EdgeAttrs>> {
        let pidx = *self.index.get(parent)?;
        let cidx = *self.index.get(child)?;
        self.slot(pidx)?
            .out
            .iter()
            .find(|(c, _)| *c == cidx)
            .map(|(_, attrs)| attrs)
    }

    /// Insert the edge `parent -> child`, implicitly adding both endpoints.
    ///
    /// # Errors
    ///
    /// [`GraphError::DuplicateEdge`] if the edge already exists.
    /// [`GraphError::CycleDetected`] if the insertion would close a cycle;
    /// the edge is rolled back before returning, so the graph observably
    /// stays acyclic. Implicitly added endpoints are kept either way. The
    /// error carries the full cycle path; callers treat it as fatal to the
    /// mutation.
    pub fn add_edge(
        &mut self,
        parent: K,
        child: K,
        attrs: Option<EdgeAttrs>,
    ) -> Result<(), GraphError<K>> {
        let pidx = self.add_node(parent.clone()).0;
        let cidx = self.add_node(child.clone()).0;
        if self.slot(pidx).is_some_and(|s| s.out.iter().any(|(c, _)| *c == cidx)) {
            return Err(GraphError::DuplicateEdge { parent, child });
        }
        debug!(parent = ?parent, child = ?child, "add_edge");
        if let Some(Some(pslot)) = self.slots.get_mut(pidx) {
            pslot.out.push((cidx, attrs));
        }
        if let Some(Some(cslot)) = self.slots.get_mut(cidx) {
            cslot.inc.push(pidx);
        }
        self.edge_count += 1;
        // Any cycle closed by this insertion must pass through it: search
        // for a path child ->* parent.
        if let Some(path) = self.find_path(cidx, pidx) {
            let cycle = self.cycle_entries(&path);
            self.unlink_edge(pidx, cidx);
            return Err(GraphError::CycleDetected(CyclePath(cycle)));
        }
        Ok(())
    }

    /// Remove the edge `parent -> child` with cascading single-parent
    /// cleanup: a child whose only parent this was is removed entirely;
    /// otherwise only the edge goes.
    ///
    /// Missing endpoints or a missing edge log a warning and change nothing.
    pub fn remove_edge(&mut self, parent: &K, child: &K) {
        let (Some(&pidx), Some(&cidx)) = (self.index.get(parent), self.index.get(child)) else {
            warn!(parent = ?parent, child = ?child, "remove_edge: endpoint not found");
            return;
        };
        if !self.slot(pidx).is_some_and(|s| s.out.iter().any(|(c, _)| *c == cidx)) {
            warn!(parent = ?parent, child = ?child, "remove_edge: no such edge");
            return;
        }
        let parent_count = self.slot(cidx).map_or(0, |s| s.inc.len());
        if parent_count == 1 {
            debug!(child = ?child, "remove_edge: last parent, removing node");
            let key = child.clone();
            self.remove_node(&key);
        } else {
            debug!(parent = ?parent, child = ?child, "remove_edge");
            self.unlink_edge(pidx, cidx);
        }
    }

    /// Direct parents of `key` with the attrs of the connecting edges.
    /// Empty when `key` is not a node.
    #[must_use]
    pub fn parents(&self, key: &K) -> Vec<(K, Option<EdgeAttrs>)> {
        let Some(&idx) = self.index.get(key) else {
            return Vec::new();
        };
        let Some(slot) = self.slot(idx) else {
            return Vec::new();
        };
        slot.inc
            .iter()
            .filter_map(|&pidx| {
                let pslot = self.slot(pidx)?;
                let attrs = pslot
                    .out
                    .iter()
                    .find(|(child, _)| *child == idx)
                    .and_then(|(_, attrs)| attrs.clone());
                Some((pslot.key.clone(), attrs))
            })
            .collect()
    }

    /// Direct children of `key` with the attrs of the connecting edges.
    /// Empty when `key` is not a node.
    #[must_use]
    pub fn children(&self, key: &K) -> Vec<(K, Option<EdgeAttrs>)> {
        let Some(&idx) = self.index.get(key) else {
            return Vec::new();
        };
        let Some(slot) = self.slot(idx) else {
            return Vec::new();
        };
        slot.out
            .iter()
            .filter_map(|(cidx, attrs)| {
                Some((self.slot(*cidx)?.key.clone(), attrs.clone()))
            })
            .collect()
    }

    /// All transitive descendants of `key`, in no guaranteed order.
    /// Empty when `key` is not a node.
    #[must_use]
    pub fn descendants(&self, key: &K) -> Vec<K> {
        self.reach(key, Direction::Out, |_| true)
    }

    /// Descendants satisfying `pred`.
    #[must_use]
    pub fn descendants_where(&self, key: &K, pred: impl Fn(&K) -> bool) -> Vec<K> {
        self.reach(key, Direction::Out, pred)
    }

    /// All transitive ancestors of `key`, in no guaranteed order.
    /// Empty when `key` is not a node.
    #[must_use]
    pub fn ancestors(&self, key: &K) -> Vec<K> {
        self.reach(key, Direction::In, |_| true)
    }

    /// Ancestors satisfying `pred`.
    #[must_use]
    pub fn ancestors_where(&self, key: &K, pred: impl Fn(&K) -> bool) -> Vec<K> {
        self.reach(key, Direction::In, pred)
    }

    /// Topological generations: each batch contains the nodes whose parents
    /// have all been yielded in earlier batches. Restarts from scratch on
    /// every call.
    #[must_use]
    pub fn generations(&self) -> Generations<'_, K> {
        Generations::new(self, None)
    }

    /// Generations narrowed by `pred`. Filtered-out nodes are not yielded
    /// but still count as done for unblocking their descendants; batches
    /// left empty by the filter are skipped.
    #[must_use]
    pub fn generations_where<'a>(
        &'a self,
        pred: impl Fn(&K) -> bool + 'a,
    ) -> Generations<'a, K> {
        Generations::new(self, Some(Box::new(pred)))
    }

    /// The induced subgraph over `descendants(key)`, with a freshly
    /// renumbered index space starting at 0 with no gaps.
    #[must_use]
    pub fn subgraph(&self, key: &K) -> Self {
        self.subgraph_where(key, |_| true)
    }

    /// The induced subgraph over `descendants_where(key, pred)`.
    #[must_use]
    pub fn subgraph_where(&self, key: &K, pred: impl Fn(&K) -> bool) -> Self {
        let members = self.descendants_where(key, pred);
        let mut sub = Self::new();
        for member in &members {
            sub.add_node(member.clone());
        }
        for member in &members {
            for (child, attrs) in self.children(member) {
                if sub.has_node(&child) {
                    let pidx = sub.add_node(member.clone()).0;
                    let cidx = sub.add_node(child).0;
                    sub.link_edge(pidx, cidx, attrs);
                }
            }
        }
        sub
    }

    /// Reset to an empty graph, dropping all node and edge state.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.edge_count = 0;
    }

    pub(crate) fn slot(&self, idx: usize) -> Option<&Slot<K>> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    pub(crate) fn live_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.index.values().copied()
    }

    pub(crate) fn slot_key(&self, idx: usize) -> Option<&K> {
        self.slot(idx).map(|slot| &slot.key)
    }

    pub(crate) fn slot_children(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.slot(idx)
            .into_iter()
            .flat_map(|slot| slot.out.iter().map(|(child, _)| *child))
    }

    pub(crate) fn slot_parent_count(&self, idx: usize) -> usize {
        self.slot(idx).map_or(0, |slot| slot.inc.len())
    }

    // Insert an edge known not to close a cycle (subgraph induction).
    fn link_edge(&mut self, pidx: usize, cidx: usize, attrs: Option<EdgeAttrs>) {
        if let Some(Some(pslot)) = self.slots.get_mut(pidx) {
            pslot.out.push((cidx, attrs));
        }
        if let Some(Some(cslot)) = self.slots.get_mut(cidx) {
            cslot.inc.push(pidx);
        }
        self.edge_count += 1;
    }

    fn unlink_edge(&mut self, pidx: usize, cidx: usize) {
        if let Some(Some(pslot)) = self.slots.get_mut(pidx) {
            let before = pslot.out.len();
            pslot.out.retain(|(child, _)| *child != cidx);
            self.edge_count -= before - pslot.out.len();
        }
        if let Some(Some(cslot)) = self.slots.get_mut(cidx) {
            if let Some(pos) = cslot.inc.iter().position(|parent| *parent == pidx) {
                cslot.inc.remove(pos);
            }
        }
    }

    // Depth-first path from `from` to `to` along out-edges. Returns the slot
    // index path `[from, .., to]`, or None when unreachable.
    fn find_path(&self, from: usize, to: usize) -> Option<Vec<usize>> {
        let mut prev: FxHashMap<usize, usize> = FxHashMap::default();
        let mut seen = FxHashSet::default();
        seen.insert(from);
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            if node == to {
                let mut path = vec![to];
                let mut cursor = to;
                while cursor != from {
                    cursor = *prev.get(&cursor)?;
                    path.push(cursor);
                }
                path.reverse();
                return Some(path);
            }
            for child in self.slot_children(node).collect::<Vec<_>>() {
                if seen.insert(child) {
                    prev.insert(child, node);
                    stack.push(child);
                }
            }
        }
        None
    }

    // Cycle entries for the path `[child, .., parent]`: one (node, attrs)
    // pair per edge around the loop, closed by a (child, None) sentinel.
    fn cycle_entries(&self, path: &[usize]) -> Vec<(K, Option<EdgeAttrs>)> {
        let mut entries = Vec::with_capacity(path.len() + 1);
        for window in path.windows(2) {
            if let (Some(key), Some(slot)) = (self.slot_key(window[0]), self.slot(window[0])) {
                let attrs = slot
                    .out
                    .iter()
                    .find(|(child, _)| *child == window[1])
                    .and_then(|(_, attrs)| attrs.clone());
                entries.push((key.clone(), attrs));
            }
        }
        // The closing edge parent -> child is the one just inserted.
        if let (Some(last), Some(first)) = (path.last(), path.first()) {
            if let (Some(pkey), Some(pslot)) = (self.slot_key(*last), self.slot(*last)) {
                let attrs = pslot
                    .out
                    .iter()
                    .find(|(child, _)| child == first)
                    .and_then(|(_, attrs)| attrs.clone());
                entries.push((pkey.clone(), attrs));
            }
            if let Some(ckey) = self.slot_key(*first) {
                entries.push((ckey.clone(), None));
            }
        }
        entries
    }

    fn reach(&self, key: &K, dir: Direction, pred: impl Fn(&K) -> bool) -> Vec<K> {
        let Some(&start) = self.index.get(key) else {
            return Vec::new();
        };
        let mut seen = FxHashSet::default();
        seen.insert(start);
        let mut stack = vec![start];
        let mut out = Vec::new();
        while let Some(node) = stack.pop() {
            let next: Vec<usize> = match dir {
                Direction::Out => self.slot_children(node).collect(),
                Direction::In => self
                    .slot(node)
                    .into_iter()
                    .flat_map(|slot| slot.inc.iter().copied())
                    .collect(),
            };
            for step in next {
                if seen.insert(step) {
                    stack.push(step);
                    if let Some(k) = self.slot_key(step) {
                        if pred(k) {
                            out.push(k.clone());
                        }
                    }
                }
            }
        }
        out
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Out,
    In,
}
