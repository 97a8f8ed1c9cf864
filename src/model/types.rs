//! Rarity Records
//!
//! The persisted shape of a rarity configuration. Every map is insertion
//! ordered: "the last trait" in redistribution always means the last one in
//! enumeration order, and that order survives a save/load round trip.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{RarityError, Result};

/// Identifier of a collection set (e.g. `"set1"`).
pub type SetId = String;

/// Name of the synthetic trait meaning "this layer contributes nothing".
pub const NONE_TRAIT: &str = "None";

/// Canvas compositing mode applied when a trait image is stacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    SourceOver,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
}

fn default_true() -> bool {
    true
}

/// Per-set record of one trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitSetConfig {
    /// Probability weight in percent, `0..=100`.
    #[serde(default)]
    pub value: f64,

    /// Whether the trait can be selected at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Locked traits are excluded from automatic redistribution.
    #[serde(default)]
    pub locked: bool,

    #[serde(default)]
    pub blend: BlendMode,

    #[serde(default)]
    pub z_index: i32,

    #[serde(default = "default_true")]
    pub include_in_metadata: bool,
}

impl TraitSetConfig {
    /// The record a trait carries in a set it has never been configured for.
    ///
    /// The None trait starts disabled so that skipping is opt-in.
    pub fn with_defaults(blend: BlendMode, is_none: bool) -> Self {
        Self {
            value: 0.0,
            enabled: !is_none,
            locked: false,
            blend,
            z_index: 0,
            include_in_metadata: true,
        }
    }

    /// Value as seen by the generator: disabled traits contribute nothing.
    pub fn effective_value(&self) -> f64 {
        if self.enabled {
            self.value
        } else {
            0.0
        }
    }

    /// Enabled and unlocked.
    pub fn is_redistributable(&self) -> bool {
        self.enabled && !self.locked
    }
}

/// Per-set state of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSetState {
    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default)]
    pub locked: bool,
}

impl Default for LayerSetState {
    fn default() -> Self {
        Self {
            active: true,
            locked: false,
        }
    }
}

/// A trait and its records for every set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitConfig {
    #[serde(default)]
    pub sets: IndexMap<SetId, TraitSetConfig>,
}

impl TraitConfig {
    /// Read the record for `set`, falling back to the default record.
    pub fn get(&self, set: &str, blend: BlendMode, is_none: bool) -> TraitSetConfig {
        self.sets
            .get(set)
            .copied()
            .unwrap_or_else(|| TraitSetConfig::with_defaults(blend, is_none))
    }

    /// Mutable record for `set`, inserting the default record first if needed.
    pub fn ensure(&mut self, set: &str, blend: BlendMode, is_none: bool) -> &mut TraitSetConfig {
        self.sets
            .entry(set.to_string())
            .or_insert_with(|| TraitSetConfig::with_defaults(blend, is_none))
    }
}

/// A layer: its traits and its per-set activation and lock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfig {
    #[serde(default)]
    pub sets: IndexMap<SetId, LayerSetState>,

    #[serde(default)]
    pub traits: IndexMap<String, TraitConfig>,

    #[serde(default)]
    pub default_blend: BlendMode,
}

impl LayerConfig {
    /// Create an empty layer with the given default blend mode.
    pub fn new(default_blend: BlendMode) -> Self {
        Self {
            default_blend,
            ..Self::default()
        }
    }

    /// Add a trait with no set records yet. Existing traits are left alone.
    pub fn add_trait(&mut self, name: &str) {
        self.traits.entry(name.to_string()).or_default();
    }

    /// Make sure the synthetic None trait exists.
    pub fn ensure_none_trait(&mut self) {
        self.add_trait(NONE_TRAIT);
    }

    pub fn has_trait(&self, name: &str) -> bool {
        self.traits.contains_key(name)
    }

    /// Trait names in enumeration order.
    pub fn trait_names(&self) -> Vec<String> {
        self.traits.keys().cloned().collect()
    }

    pub fn set_state(&self, set: &str) -> LayerSetState {
        self.sets.get(set).copied().unwrap_or_default()
    }

    pub fn set_state_mut(&mut self, set: &str) -> &mut LayerSetState {
        self.sets.entry(set.to_string()).or_default()
    }

    pub fn is_locked(&self, set: &str) -> bool {
        self.set_state(set).locked
    }

    pub fn is_active(&self, set: &str) -> bool {
        self.set_state(set).active
    }

    /// Fully populated record of `name` in `set`, or `None` if the trait is unknown.
    pub fn trait_config(&self, name: &str, set: &str) -> Option<TraitSetConfig> {
        self.traits
            .get(name)
            .map(|t| t.get(set, self.default_blend, name == NONE_TRAIT))
    }

    /// Mutable record of `name` in `set`, created with defaults if missing.
    pub fn trait_config_mut(&mut self, name: &str, set: &str) -> Option<&mut TraitSetConfig> {
        let blend = self.default_blend;
        self.traits
            .get_mut(name)
            .map(|t| t.ensure(set, blend, name == NONE_TRAIT))
    }

    /// Records of every trait in `set`, in enumeration order.
    pub fn records(&self, set: &str) -> Vec<(String, TraitSetConfig)> {
        self.traits
            .iter()
            .map(|(name, t)| {
                (
                    name.clone(),
                    t.get(set, self.default_blend, name == NONE_TRAIT),
                )
            })
            .collect()
    }

    /// Value of `name` in `set`, 0 for unknown traits.
    pub fn value(&self, name: &str, set: &str) -> f64 {
        self.trait_config(name, set).map(|c| c.value).unwrap_or(0.0)
    }

    /// Overwrite a trait's value. Unknown traits are ignored.
    pub fn set_value(&mut self, name: &str, set: &str, value: f64) {
        if let Some(record) = self.trait_config_mut(name, set) {
            record.value = value;
        }
    }

    /// Sum of enabled trait values in `set`.
    pub fn enabled_total(&self, set: &str) -> f64 {
        self.records(set)
            .iter()
            .map(|(_, c)| c.effective_value())
            .sum()
    }

    /// Sum of locked, enabled trait values in `set`.
    pub fn locked_total(&self, set: &str) -> f64 {
        self.records(set)
            .iter()
            .filter(|(_, c)| c.enabled && c.locked)
            .map(|(_, c)| c.value)
            .sum()
    }

    /// Whether at least one trait is enabled in `set`.
    pub fn has_enabled(&self, set: &str) -> bool {
        self.records(set).iter().any(|(_, c)| c.enabled)
    }

    /// Names of enabled, unlocked traits in `set`, in enumeration order.
    pub fn redistributable(&self, set: &str) -> Vec<String> {
        self.records(set)
            .into_iter()
            .filter(|(_, c)| c.is_redistributable())
            .map(|(name, _)| name)
            .collect()
    }
}

/// Layer name → layer configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RarityConfig {
    layers: IndexMap<String, LayerConfig>,
}

impl RarityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn contains_layer(&self, layer: &str) -> bool {
        self.layers.contains_key(layer)
    }

    /// Insert or replace a layer, keeping its position when it already exists.
    pub fn insert_layer(&mut self, name: impl Into<String>, layer: LayerConfig) {
        self.layers.insert(name.into(), layer);
    }

    pub fn layer(&self, name: &str) -> Option<&LayerConfig> {
        self.layers.get(name)
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut LayerConfig> {
        self.layers.get_mut(name)
    }

    pub fn require_layer(&self, name: &str) -> Result<&LayerConfig> {
        self.layers.get(name).ok_or_else(|| RarityError::LayerNotFound {
            layer: name.to_string(),
        })
    }

    pub fn require_layer_mut(&mut self, name: &str) -> Result<&mut LayerConfig> {
        self.layers
            .get_mut(name)
            .ok_or_else(|| RarityError::LayerNotFound {
                layer: name.to_string(),
            })
    }

    /// Record of `trait_name` in `layer`/`set`, or a lookup error.
    pub fn require_trait(&self, layer: &str, trait_name: &str, set: &str) -> Result<TraitSetConfig> {
        self.require_layer(layer)?
            .trait_config(trait_name, set)
            .ok_or_else(|| RarityError::TraitNotFound {
                layer: layer.to_string(),
                trait_name: trait_name.to_string(),
            })
    }

    pub fn layers(&self) -> impl Iterator<Item = (&String, &LayerConfig)> {
        self.layers.iter()
    }

    pub fn layers_mut(&mut self) -> impl Iterator<Item = (&String, &mut LayerConfig)> {
        self.layers.iter_mut()
    }

    pub fn layer_names(&self) -> Vec<String> {
        self.layers.keys().cloned().collect()
    }

    /// Enumeration index of a layer.
    pub fn position(&self, layer: &str) -> Option<usize> {
        self.layers.get_index_of(layer)
    }

    /// Copy every layer and trait record of `from` into `to`.
    pub fn copy_set(&mut self, from: &str, to: &str) {
        for layer in self.layers.values_mut() {
            let state = layer.set_state(from);
            layer.sets.insert(to.to_string(), state);
            let blend = layer.default_blend;
            for (name, t) in layer.traits.iter_mut() {
                let record = t.get(from, blend, name == NONE_TRAIT);
                t.sets.insert(to.to_string(), record);
            }
        }
    }

    /// Drop every record belonging to `set`.
    pub fn remove_set(&mut self, set: &str) {
        for layer in self.layers.values_mut() {
            layer.sets.shift_remove(set);
            for t in layer.traits.values_mut() {
                t.sets.shift_remove(set);
            }
        }
    }

    /// Structural checks applied to persisted configurations.
    pub fn validate(&self) -> Result<()> {
        for (layer_name, layer) in &self.layers {
            if layer_name.trim().is_empty() {
                return Err(RarityError::SchemaValidation {
                    reason: "layer with empty name".to_string(),
                });
            }
            for (trait_name, t) in &layer.traits {
                if trait_name.trim().is_empty() {
                    return Err(RarityError::SchemaValidation {
                        reason: format!("trait with empty name in layer '{}'", layer_name),
                    });
                }
                for (set, record) in &t.sets {
                    if !record.value.is_finite() || !(0.0..=100.0).contains(&record.value) {
                        return Err(RarityError::SchemaValidation {
                            reason: format!(
                                "{}/{} in set '{}' has out-of-range value {}",
                                layer_name, trait_name, set, record.value
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
