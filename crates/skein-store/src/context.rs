// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Records as DAG nodes.

use std::fmt;

use skein_codec::Record;
use skein_graph::{Dag, EdgeAttrs, Generations, GraphError, NodeIndex};

use crate::RecordStore;

/// Graph key for a record: wire tag plus string identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    /// The record type's wire tag.
    pub tag: &'static str,
    /// The record's identity.
    pub identity: String,
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tag, self.identity)
    }
}

/// A record that can stand as a DAG node. Blanket-implemented: every record
/// already carries the tag and identity a [`NodeKey`] needs.
pub trait GraphRecord: Record {
    /// The node key for this record instance.
    fn node_key(&self) -> NodeKey {
        NodeKey {
            tag: Self::TAG,
            identity: self.identity(),
        }
    }
}

impl<T: Record> GraphRecord for T {}

/// A store plus one DAG of record keys.
///
/// One `Context` per logical session: the graph is single-owner and all
/// mutation must go through this one value. Edge views are computed per
/// call from the adjacency lists, never cached.
pub struct Context {
    store: RecordStore,
    graph: Dag<NodeKey>,
}

impl Context {
    /// An empty context around `store`.
    #[must_use]
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            graph: Dag::new(),
        }
    }

    /// The record store.
    #[must_use]
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// The record store, mutable (for codec registration).
    pub fn store_mut(&mut self) -> &mut RecordStore {
        &mut self.store
    }

    /// The underlying DAG, for queries not mirrored here.
    #[must_use]
    pub fn graph(&self) -> &Dag<NodeKey> {
        &self.graph
    }

    /// Add `record` as a node. Idempotent.
    pub fn add_node(&mut self, record: &impl GraphRecord) -> NodeIndex {
        self.graph.add_node(record.node_key())
    }

    /// Link `child` under `parent`, adding either endpoint as needed.
    ///
    /// # Errors
    ///
    /// [`GraphError::DuplicateEdge`] when the edge already exists;
    /// [`GraphError::CycleDetected`] when the link would close a cycle (the
    /// offending edge is rolled back before returning).
    pub fn add_child(
        &mut self,
        parent: &impl GraphRecord,
        child: &impl GraphRecord,
        attrs: Option<EdgeAttrs>,
    ) -> Result<(), GraphError<NodeKey>> {
        self.graph
            .add_edge(parent.node_key(), child.node_key(), attrs)
    }

    /// Unlink `child` from `parent`. A child left with no parents is
    /// removed from the graph entirely.
    pub fn remove_child(&mut self, parent: &impl GraphRecord, child: &impl GraphRecord) {
        self.graph
            .remove_edge(&parent.node_key(), &child.node_key());
    }

    /// Direct children of `record` with their edge attributes. Empty when
    /// the record is not in the graph.
    #[must_use]
    pub fn children(&self, record: &impl GraphRecord) -> Vec<(NodeKey, Option<EdgeAttrs>)> {
        self.graph.children(&record.node_key())
    }

    /// Direct parents of `record` with their edge attributes.
    #[must_use]
    pub fn parents(&self, record: &impl GraphRecord) -> Vec<(NodeKey, Option<EdgeAttrs>)> {
        self.graph.parents(&record.node_key())
    }

    /// All transitive descendants, in no guaranteed order.
    #[must_use]
    pub fn descendants(&self, record: &impl GraphRecord) -> Vec<NodeKey> {
        self.graph.descendants(&record.node_key())
    }

    /// Descendants whose record type carries `tag`.
    #[must_use]
    pub fn descendants_tagged(&self, record: &impl GraphRecord, tag: &str) -> Vec<NodeKey> {
        self.graph
            .descendants_where(&record.node_key(), |key| key.tag == tag)
    }

    /// All transitive ancestors, in no guaranteed order.
    #[must_use]
    pub fn ancestors(&self, record: &impl GraphRecord) -> Vec<NodeKey> {
        self.graph.ancestors(&record.node_key())
    }

    /// Ancestors whose record type carries `tag`.
    #[must_use]
    pub fn ancestors_tagged(&self, record: &impl GraphRecord, tag: &str) -> Vec<NodeKey> {
        self.graph
            .ancestors_where(&record.node_key(), |key| key.tag == tag)
    }

    /// The induced subgraph over `record`'s descendants (the record itself
    /// is not a member), renumbered from zero.
    #[must_use]
    pub fn subgraph(&self, record: &impl GraphRecord) -> Dag<NodeKey> {
        self.graph.subgraph(&record.node_key())
    }

    /// Topological generations over the whole context graph.
    #[must_use]
    pub fn generations(&self) -> Generations<'_, NodeKey> {
        self.graph.generations()
    }

    /// Drop all graph state, keeping the store.
    pub fn clear_graph(&mut self) {
        self.graph.clear();
    }
}
