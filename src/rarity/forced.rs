//! Forced-combination constraint solver.
//!
//! A forced pair means "whenever the upper trait appears, the lower one must
//! too", so the upper trait's probability is capped at the lower trait's. The
//! orientation comes from the set's stacking order: the earlier layer is the
//! lower one. Capped probability is handed to the other enabled, unlocked,
//! unconstrained traits of the upper layer.

use tracing::{debug, warn};

use super::normalize::round2;
use crate::model::{ConstraintGraph, RarityConfig, SetInfo, TraitRef};

/// Values closer than this are treated as equal.
const CLAMP_EPSILON: f64 = 0.005;

/// One pair that had to be clamped.
#[derive(Debug, Clone, PartialEq)]
pub struct ForcedClamp {
    pub lower: TraitRef,
    pub upper: TraitRef,
    /// Probability taken from the upper trait.
    pub excess: f64,
    /// Traits that received the excess; empty when it was dropped.
    pub recipients: Vec<String>,
}

/// What one solver pass changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForcedResolution {
    pub clamps: Vec<ForcedClamp>,
    /// Excess that had no recipient and left its layer short of 100.
    pub dropped_excess: f64,
}

impl ForcedResolution {
    pub fn is_noop(&self) -> bool {
        self.clamps.is_empty()
    }
}

/// Stacking position of a layer, from the set's order when known.
fn stacking_index(config: &RarityConfig, info: Option<&SetInfo>, layer: &str) -> Option<usize> {
    match info {
        Some(info) => info.stacking_index(layer, config),
        None => config.position(layer),
    }
}

/// Pairs oriented as (lower, upper), sorted so that upper layers settle bottom-up.
fn oriented_pairs(
    config: &RarityConfig,
    graph: &ConstraintGraph,
    info: Option<&SetInfo>,
) -> Vec<(TraitRef, TraitRef)> {
    let mut oriented: Vec<(usize, TraitRef, TraitRef)> = Vec::new();
    for pair in graph.pairs() {
        let known = |t: &TraitRef| {
            config
                .layer(&t.layer)
                .is_some_and(|layer| layer.has_trait(&t.trait_name))
        };
        if !known(&pair.a) || !known(&pair.b) {
            debug!(a = %pair.a, b = %pair.b, "forced pair names an unknown trait, ignored");
            continue;
        }
        let (Some(ia), Some(ib)) = (
            stacking_index(config, info, &pair.a.layer),
            stacking_index(config, info, &pair.b.layer),
        ) else {
            continue;
        };
        match ia.cmp(&ib) {
            std::cmp::Ordering::Less => oriented.push((ib, pair.a, pair.b)),
            std::cmp::Ordering::Greater => oriented.push((ia, pair.b, pair.a)),
            std::cmp::Ordering::Equal => {}
        }
    }
    oriented.sort_by_key(|(upper_idx, _, _)| *upper_idx);
    oriented
        .into_iter()
        .map(|(_, lower, upper)| (lower, upper))
        .collect()
}

/// Cap every forced upper trait at its lower partner and redistribute the excess.
///
/// Pairs whose upper trait or upper layer is locked are left alone. Running
/// the pass again without intervening edits changes nothing.
pub fn resolve_forced_combinations(
    config: &mut RarityConfig,
    graph: &ConstraintGraph,
    set: &str,
    info: Option<&SetInfo>,
) -> ForcedResolution {
    let mut resolution = ForcedResolution::default();
    if graph.is_empty() {
        return resolution;
    }

    for (lower, upper) in oriented_pairs(config, graph, info) {
        let lower_value = config
            .layer(&lower.layer)
            .and_then(|layer| layer.trait_config(&lower.trait_name, set))
            .map(|record| record.effective_value())
            .unwrap_or(0.0);

        let Some(upper_layer) = config.layer_mut(&upper.layer) else {
            continue;
        };
        if upper_layer.is_locked(set) {
            continue;
        }
        let Some(upper_record) = upper_layer.trait_config(&upper.trait_name, set) else {
            continue;
        };
        if upper_record.locked {
            continue;
        }
        let upper_value = upper_record.effective_value();
        if upper_value <= lower_value + CLAMP_EPSILON {
            continue;
        }

        let excess = round2(upper_value - lower_value);
        upper_layer.set_value(&upper.trait_name, set, lower_value);

        let recipients: Vec<String> = upper_layer
            .redistributable(set)
            .into_iter()
            .filter(|name| name != &upper.trait_name && !graph.involves(&upper.layer, name))
            .collect();

        if let Some((last, rest)) = recipients.split_last() {
            let share = round2(excess / recipients.len() as f64);
            for name in rest {
                let value = round2(upper_layer.value(name, set) + share);
                upper_layer.set_value(name, set, value);
            }
            let tail = round2(upper_layer.value(last, set) + excess - share * rest.len() as f64);
            upper_layer.set_value(last, set, tail.max(0.0));
            debug!(%lower, %upper, excess, "forced pair clamped");
        } else {
            warn!(%lower, %upper, excess, set, "forced pair clamped with no recipient, excess dropped");
            resolution.dropped_excess = round2(resolution.dropped_excess + excess);
        }

        resolution.clamps.push(ForcedClamp {
            lower,
            upper,
            excess,
            recipients,
        });
    }
    resolution
}
