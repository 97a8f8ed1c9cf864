//! Constraint graph validation and hygiene.
//!
//! Nothing here changes a rarity value. Incompatibilities are enforced by the
//! generator; this module only keeps the stored graphs consistent with the
//! trait library as layers and traits come and go.

use tracing::debug;

use crate::error::{RarityError, Result};
use crate::model::{ConstraintGraph, ConstraintState, RarityConfig, SetId, TraitPair, TraitRef};

/// Pairs removed by [`cleanup`], per set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupReport {
    pub removed: Vec<(SetId, TraitPair)>,
}

impl CleanupReport {
    pub fn count(&self) -> usize {
        self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }
}

/// True iff the trait exists and is enabled in `set`.
pub fn is_valid(config: &RarityConfig, set: &str, layer: &str, trait_name: &str) -> bool {
    config
        .layer(layer)
        .and_then(|l| l.trait_config(trait_name, set))
        .is_some_and(|record| record.enabled)
}

fn is_live(config: &RarityConfig, set: &str, t: &TraitRef) -> bool {
    config.layer(&t.layer).is_some_and(|l| l.is_active(set)) && is_valid(config, set, &t.layer, &t.trait_name)
}

/// Drop every stored pair that references an inactive or missing layer, or a
/// disabled or missing trait, in the pair's own set.
pub fn cleanup(config: &RarityConfig, state: &mut ConstraintState) -> CleanupReport {
    let mut report = CleanupReport::default();
    for (set, graph) in state.iter_mut() {
        for pair in graph.retain(|t| is_live(config, set, t)) {
            debug!(set = %set, a = %pair.a, b = %pair.b, "dropping stale constraint");
            report.removed.push((set.clone(), pair));
        }
    }
    report
}

/// Traits that must never appear together with `layer`/`trait_name`.
pub fn incompatible_with(graph: &ConstraintGraph, layer: &str, trait_name: &str) -> Vec<TraitRef> {
    graph.partners(&TraitRef::new(layer, trait_name))
}

/// Selected traits that are no longer valid in `set` and should be cleared.
pub fn stale_selections(config: &RarityConfig, set: &str, selection: &[TraitRef]) -> Vec<TraitRef> {
    selection
        .iter()
        .filter(|t| !is_valid(config, set, &t.layer, &t.trait_name))
        .cloned()
        .collect()
}

/// Check a new pair before it is stored.
///
/// Both ends must exist in `set` and sit on different layers, and the pair
/// must not already be recorded in the opposing graph (a pair cannot be
/// both forced and incompatible).
pub fn check_new_pair(
    config: &RarityConfig,
    set: &str,
    a: &TraitRef,
    b: &TraitRef,
    opposing: &ConstraintGraph,
) -> Result<()> {
    config.require_trait(&a.layer, &a.trait_name, set)?;
    config.require_trait(&b.layer, &b.trait_name, set)?;
    if a.layer == b.layer {
        return Err(RarityError::InvalidConstraint {
            reason: format!("{} and {} are in the same layer", a, b),
        });
    }
    if opposing.contains(a, b) {
        return Err(RarityError::ConflictingConstraint {
            reason: format!("{} ↔ {} is already constrained the other way", a, b),
        });
    }
    Ok(())
}
