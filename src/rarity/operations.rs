//! Whole-layer rarity operations: Equalize, Randomize, Reset and Skip-Toggle.
//!
//! Each operation is addressed through a [`LayerScope`] and walks layers with
//! one shared traversal that honours the layer-level lock. Trait-level locks
//! are honoured by the per-layer transforms: a locked trait keeps its value
//! but stays in the budget accounting.

use rand::Rng;
use tracing::debug;

use super::normalize::{apply_remainder_to_last, equalize_within_layer, scale_to_target, TOTAL};
use crate::error::Result;
use crate::model::{LayerConfig, RarityConfig, NONE_TRAIT};

/// Which layers an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerScope<'a> {
    Layer(&'a str),
    All,
}

impl<'a> LayerScope<'a> {
    /// `None` means every layer.
    pub fn from_option(layer: Option<&'a str>) -> Self {
        match layer {
            Some(name) => LayerScope::Layer(name),
            None => LayerScope::All,
        }
    }
}

/// Which layers an operation changed and which it skipped because of a lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationOutcome {
    pub changed: Vec<String>,
    pub skipped_locked: Vec<String>,
}

/// Result of a skip toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipToggleOutcome {
    /// New state of the None trait's `enabled` flag.
    pub skip_enabled: bool,
    /// Whether the layer was re-equalized.
    pub redistributed: bool,
}

/// Run `op` over every layer in `scope` that is not locked in `set`.
///
/// `op` returns whether it changed the layer.
pub fn apply_to_layers<F>(
    config: &mut RarityConfig,
    scope: LayerScope<'_>,
    set: &str,
    mut op: F,
) -> Result<OperationOutcome>
where
    F: FnMut(&mut LayerConfig) -> bool,
{
    let names = match scope {
        LayerScope::Layer(name) => {
            config.require_layer(name)?;
            vec![name.to_string()]
        }
        LayerScope::All => config.layer_names(),
    };

    let mut outcome = OperationOutcome::default();
    for name in names {
        let layer = config.require_layer_mut(&name)?;
        if layer.is_locked(set) {
            debug!(layer = %name, set, "layer locked, skipping");
            outcome.skipped_locked.push(name);
            continue;
        }
        if op(layer) {
            outcome.changed.push(name);
        }
    }
    Ok(outcome)
}

/// Equalize the unlocked budget of every layer in scope.
pub fn equalize(config: &mut RarityConfig, scope: LayerScope<'_>, set: &str) -> Result<OperationOutcome> {
    apply_to_layers(config, scope, set, |layer| equalize_within_layer(layer, set))
}

/// Draw a random distribution for every layer in scope.
pub fn randomize<R: Rng>(
    config: &mut RarityConfig,
    scope: LayerScope<'_>,
    set: &str,
    rng: &mut R,
) -> Result<OperationOutcome> {
    apply_to_layers(config, scope, set, |layer| randomize_layer(layer, set, rng))
}

/// Zero every unlocked trait of every layer in scope.
pub fn reset(config: &mut RarityConfig, scope: LayerScope<'_>, set: &str) -> Result<OperationOutcome> {
    apply_to_layers(config, scope, set, |layer| reset_layer(layer, set))
}

/// Random distribution of the unlocked budget.
///
/// The None trait first flips a fair coin for enablement and, when enabled,
/// draws from `[0, budget]` like every other enabled, unlocked trait. The raw
/// draws are then scaled to the budget and the last drawn trait absorbs the
/// rounding residue.
pub fn randomize_layer<R: Rng>(layer: &mut LayerConfig, set: &str, rng: &mut R) -> bool {
    let budget = (TOTAL - layer.locked_total(set)).max(0.0);
    let mut drawn: Vec<String> = Vec::new();
    let mut touched = false;

    for (name, record) in layer.records(set) {
        if record.locked {
            continue;
        }
        let Some(target) = layer.trait_config_mut(&name, set) else {
            continue;
        };
        if name == NONE_TRAIT {
            target.enabled = rng.random_bool(0.5);
            touched = true;
        }
        if target.enabled {
            target.value = rng.random::<f64>() * budget;
            drawn.push(name);
        } else {
            target.value = 0.0;
        }
    }

    if drawn.is_empty() {
        return touched;
    }

    let raw_total: f64 = drawn.iter().map(|n| layer.value(n, set)).sum();
    if raw_total <= 0.0 {
        return equalize_within_layer(layer, set);
    }
    scale_to_target(layer, set, &drawn, budget / raw_total);
    let total = layer.enabled_total(set);
    apply_remainder_to_last(layer, set, &drawn, total);
    true
}

/// Unlocked traits go to 0; an unlocked None trait is also disabled.
pub fn reset_layer(layer: &mut LayerConfig, set: &str) -> bool {
    let mut changed = false;
    for (name, record) in layer.records(set) {
        if record.locked {
            continue;
        }
        let Some(target) = layer.trait_config_mut(&name, set) else {
            continue;
        };
        target.value = 0.0;
        if name == NONE_TRAIT {
            target.enabled = false;
        }
        changed = true;
    }
    changed
}

/// Flip the None trait's `enabled` flag and rebalance when appropriate.
///
/// A layer whose traits are all at 0 only has its flag flipped, as does a
/// locked layer. Otherwise the layer is re-equalized when skip was just
/// turned off, or when the other enabled traits already share equal values;
/// turning skip on over an unequal distribution leaves it as it was. A
/// locked None trait keeps its flag and value.
pub fn skip_toggle(config: &mut RarityConfig, layer_name: &str, set: &str) -> Result<SkipToggleOutcome> {
    let layer = config.require_layer_mut(layer_name)?;
    layer.ensure_none_trait();

    if let Some(none) = layer.trait_config(NONE_TRAIT, set).filter(|r| r.locked) {
        debug!(layer = layer_name, set, "None trait locked, skip left unchanged");
        return Ok(SkipToggleOutcome {
            skip_enabled: none.enabled,
            redistributed: false,
        });
    }

    let all_zero = layer.records(set).iter().all(|(_, r)| r.value == 0.0);
    let skip_enabled = match layer.trait_config_mut(NONE_TRAIT, set) {
        Some(none) => {
            none.enabled = !none.enabled;
            if !none.enabled {
                none.value = 0.0;
            }
            none.enabled
        }
        None => false,
    };

    if all_zero || layer.is_locked(set) {
        return Ok(SkipToggleOutcome {
            skip_enabled,
            redistributed: false,
        });
    }

    let others: Vec<f64> = layer
        .records(set)
        .iter()
        .filter(|(name, r)| name != NONE_TRAIT && r.enabled)
        .map(|(_, r)| r.value)
        .collect();
    let already_equal = others.windows(2).all(|w| (w[0] - w[1]).abs() < 0.005);

    let redistributed = if already_equal || !skip_enabled {
        equalize_within_layer(layer, set)
    } else {
        debug!(layer = layer_name, set, "skip enabled over unequal distribution, values kept");
        false
    };

    Ok(SkipToggleOutcome {
        skip_enabled,
        redistributed,
    })
}
