// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Topological generation iteration (Kahn's algorithm in batches).

use rustc_hash::FxHashMap;

use crate::{Dag, GraphKey};

/// Lazy iterator over topological generations.
///
/// Each item is the batch of nodes whose parents have all appeared in
/// earlier batches; together the batches partition the node set exactly
/// once. Construction snapshots in-degrees, so every call to
/// [`Dag::generations`] restarts from scratch; a single `Generations`
/// instance is single-pass.
pub struct Generations<'a, K> {
    dag: &'a Dag<K>,
    pred: Option<Box<dyn Fn(&K) -> bool + 'a>>,
    /// Remaining unsatisfied parent count per live slot.
    pending: FxHashMap<usize, usize>,
    ready: Vec<usize>,
}

impl<'a, K: GraphKey> Generations<'a, K> {
    pub(crate) fn new(dag: &'a Dag<K>, pred: Option<Box<dyn Fn(&K) -> bool + 'a>>) -> Self {
        let mut pending = FxHashMap::default();
        let mut ready = Vec::new();
        for idx in dag.live_indices() {
            let parents = dag.slot_parent_count(idx);
            if parents == 0 {
                ready.push(idx);
            } else {
                pending.insert(idx, parents);
            }
        }
        Self {
            dag,
            pred,
            pending,
            ready,
        }
    }
}

impl<K: GraphKey> Iterator for Generations<'_, K> {
    type Item = Vec<K>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.ready.is_empty() {
                return None;
            }
            let batch = std::mem::take(&mut self.ready);
            let mut yielded = Vec::new();
            for &node in &batch {
                if let Some(key) = self.dag.slot_key(node) {
                    if self.pred.as_ref().is_none_or(|pred| pred(key)) {
                        yielded.push(key.clone());
                    }
                }
            }
            // Filtered-out nodes still unblock their descendants.
            for &node in &batch {
                for child in self.dag.slot_children(node).collect::<Vec<_>>() {
                    if let Some(remaining) = self.pending.get_mut(&child) {
                        *remaining -= 1;
                        if *remaining == 0 {
                            self.pending.remove(&child);
                            self.ready.push(child);
                        }
                    }
                }
            }
            // Batches emptied by the filter are skipped, not yielded.
            if !yielded.is_empty() {
                return Some(yielded);
            }
        }
    }
}

impl<'a, K: GraphKey> IntoIterator for &'a Dag<K> {
    type Item = Vec<K>;
    type IntoIter = Generations<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.generations()
    }
}
