//! Time-bounded cache of per-set constraint graphs.
//!
//! Loading a constraint table reads every set at once, so a miss for one set
//! refreshes all sets present in the loaded snapshot.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::Result;
use crate::model::{ConstraintGraph, ConstraintState, SetId};

#[derive(Debug, Clone)]
pub struct ConstraintCache {
    ttl: Duration,
    entries: HashMap<SetId, (ConstraintGraph, Instant)>,
}

impl ConstraintCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh graph for `set`, or `None` when missing or expired.
    pub fn get(&self, set: &str) -> Option<&ConstraintGraph> {
        self.entries
            .get(set)
            .filter(|(_, loaded_at)| loaded_at.elapsed() < self.ttl)
            .map(|(graph, _)| graph)
    }

    /// Graph for `set`, calling `load` for a full snapshot on a miss.
    ///
    /// A set absent from the snapshot yields an empty graph.
    pub fn get_or_load(
        &mut self,
        set: &str,
        load: impl FnOnce() -> Result<ConstraintState>,
    ) -> Result<ConstraintGraph> {
        if let Some(graph) = self.get(set) {
            trace!(set, "constraint cache hit");
            return Ok(graph.clone());
        }

        trace!(set, "constraint cache miss");
        let state = load()?;
        self.put(&state);
        let graph = state.get(set).cloned().unwrap_or_default();
        if !state.contains_key(set) {
            // A set with no stored pairs is cached as empty too.
            self.entries
                .insert(set.to_string(), (graph.clone(), Instant::now()));
        }
        Ok(graph)
    }

    /// Replace the cached graphs with `state`.
    pub fn put(&mut self, state: &ConstraintState) {
        let now = Instant::now();
        self.entries = state
            .iter()
            .map(|(set, graph)| (set.clone(), (graph.clone(), now)))
            .collect();
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
    }
}
