//! Rarity engine facade.
//!
//! `RarityEngine` owns the rarity configuration and the set catalog of one
//! project and exposes every editing operation against its active set. Each
//! mutator runs the forced-combination pass for the set it touched and then
//! persists. Saves never fail an operation: a failed write is logged and the
//! in-memory state stays authoritative until the next save supersedes it.

use std::collections::HashSet;
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{RarityError, Result};
use crate::model::{
    BlendMode, ConstraintGraph, ConstraintState, LayerConfig, RarityConfig, SetCatalog, SetId,
    SetInfo, TraitRef, TraitSetConfig,
};
use crate::rarity::{
    self, adjust_single_value, equalize_within_layer, global_rarity, is_normalized,
    resolve_forced_combinations, CleanupReport, ForcedResolution, GlobalTraitRarity, LayerScope,
    OperationOutcome, SkipToggleOutcome,
};
use crate::state::{discover_layers, trait_name_from_file, ConstraintCache, RarityStore};

/// A (layer, set) whose enabled total is off 100 by more than the tolerance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDiagnostic {
    pub layer: String,
    pub set: SetId,
    pub total: f64,
}

/// Pairs dropped from both constraint tables by a cleanup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintCleanup {
    pub forced: CleanupReport,
    pub incompatible: CleanupReport,
}

impl ConstraintCleanup {
    pub fn count(&self) -> usize {
        self.forced.count() + self.incompatible.count()
    }
}

/// Editing session over one project's rarity tables.
pub struct RarityEngine<S: RarityStore> {
    store: S,
    settings: EngineConfig,
    config: RarityConfig,
    sets: SetCatalog,
    active_set: SetId,
    forced_cache: ConstraintCache,
    incompat_cache: ConstraintCache,
    rng: StdRng,
    last_resolution: ForcedResolution,
}

impl<S: RarityStore> RarityEngine<S> {
    /// Open a session over whatever `store` holds.
    ///
    /// A configuration that fails to load is logged and replaced by an empty
    /// one. When no set catalog is stored, one is derived from the sets the
    /// configuration mentions.
    pub fn open(store: S, settings: EngineConfig) -> Self {
        let config = store.load_rarity_config().unwrap_or_else(|e| {
            warn!(error = %e, "failed to load rarity config, starting empty");
            RarityConfig::new()
        });
        let sets = store.load_sets().unwrap_or_else(|e| {
            warn!(error = %e, "failed to load set catalog");
            SetCatalog::new()
        });
        let sets = if sets.is_empty() {
            derive_catalog(&config, &settings)
        } else {
            sets
        };

        let active_set = if sets.contains(&settings.default_set) {
            settings.default_set.clone()
        } else {
            sets.ids()
                .into_iter()
                .next()
                .unwrap_or_else(|| settings.default_set.clone())
        };

        debug!(layers = config.len(), sets = sets.len(), active = %active_set, "opened rarity engine");
        Self {
            forced_cache: ConstraintCache::new(settings.cache_ttl()),
            incompat_cache: ConstraintCache::new(settings.cache_ttl()),
            store,
            settings,
            config,
            sets,
            active_set,
            rng: StdRng::from_os_rng(),
            last_resolution: ForcedResolution::default(),
        }
    }

    /// Build a fresh project from a traits folder holding one subfolder per layer.
    ///
    /// Every layer gets 100/N per trait, the last trait absorbing rounding,
    /// plus a disabled None trait at 0. `layers` picks and orders the layer
    /// folders; by default every subfolder is used in name order.
    pub fn initialize(
        store: S,
        settings: EngineConfig,
        traits_folder: &Path,
        layers: Option<&[String]>,
    ) -> Result<Self> {
        let layer_names = match layers {
            Some(names) => names.to_vec(),
            None => discover_layers(traits_folder)?,
        };
        let set = settings.default_set.clone();

        let mut config = RarityConfig::new();
        for layer_name in &layer_names {
            let mut layer = LayerConfig::new(BlendMode::default());
            for file in store.read_traits(traits_folder, layer_name)? {
                layer.add_trait(&trait_name_from_file(&file));
            }
            layer.ensure_none_trait();
            equalize_within_layer(&mut layer, &set);
            config.insert_layer(layer_name.as_str(), layer);
        }

        let mut info = SetInfo::new(set.clone(), settings.default_output_count);
        info.layer_order = layer_names.clone();
        let mut sets = SetCatalog::new();
        sets.insert(set.clone(), info);

        info!(
            folder = %traits_folder.display(),
            layers = layer_names.len(),
            set = %set,
            "initialized rarity config"
        );

        let mut engine = Self::open(store, settings);
        engine.config = config;
        engine.sets = sets;
        engine.active_set = set;
        engine.save_config();
        engine.save_sets();
        engine.save_forced_state(&ConstraintState::new());
        engine.save_incompat_state(&ConstraintState::new());
        Ok(engine)
    }

    /// Replace the random source, e.g. with a seeded one for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Reload every table from the store.
    ///
    /// On error the current in-memory state is kept.
    pub fn reload(&mut self) -> Result<()> {
        let config = self.store.load_rarity_config()?;
        let sets = self.store.load_sets()?;
        self.sets = if sets.is_empty() {
            derive_catalog(&config, &self.settings)
        } else {
            sets
        };
        self.config = config;
        if !self.sets.contains(&self.active_set) {
            if let Some(first) = self.sets.ids().into_iter().next() {
                self.active_set = first;
            }
        }
        self.forced_cache.invalidate();
        self.incompat_cache.invalidate();
        Ok(())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &EngineConfig {
        &self.settings
    }

    pub fn config(&self) -> &RarityConfig {
        &self.config
    }

    pub fn sets(&self) -> &SetCatalog {
        &self.sets
    }

    pub fn active_set(&self) -> &str {
        &self.active_set
    }

    /// Report of the most recent forced-combination pass.
    pub fn last_forced_resolution(&self) -> &ForcedResolution {
        &self.last_resolution
    }

    pub fn set_active_set(&mut self, set: &str) -> Result<()> {
        self.sets.require(set)?;
        if self.active_set != set {
            info!(from = %self.active_set, to = set, "switched active set");
            self.active_set = set.to_string();
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Rarity editing
    // ---------------------------------------------------------------------

    /// Current value of a trait in the active set.
    pub fn get_rarity(&self, layer: &str, trait_name: &str) -> Result<f64> {
        Ok(self.trait_record(layer, trait_name)?.value)
    }

    /// Full record of a trait in the active set.
    pub fn trait_record(&self, layer: &str, trait_name: &str) -> Result<TraitSetConfig> {
        self.config.require_trait(layer, trait_name, &self.active_set)
    }

    /// Set a trait's value, shrinking the others when the layer overflows.
    ///
    /// Returns the value applied after clamping. Locked layers refuse edits.
    pub fn adjust_rarity_values(&mut self, layer: &str, trait_name: &str, value: f64) -> Result<f64> {
        let set = self.active_set.clone();
        if self.config.require_layer(layer)?.is_locked(&set) {
            return Err(RarityError::LayerLocked {
                layer: layer.to_string(),
                set,
            });
        }

        let applied = adjust_single_value(&mut self.config, layer, &set, trait_name, value)?;
        debug!(layer, trait_name, requested = value, applied, set = %set, "adjusted rarity");
        self.after_mutation(&set);
        Ok(applied)
    }

    pub fn equalize_rarity(&mut self, scope: LayerScope<'_>) -> Result<OperationOutcome> {
        let set = self.active_set.clone();
        let outcome = rarity::equalize(&mut self.config, scope, &set)?;
        self.after_mutation(&set);
        Ok(outcome)
    }

    pub fn randomize_layer(&mut self, scope: LayerScope<'_>) -> Result<OperationOutcome> {
        let set = self.active_set.clone();
        let outcome = rarity::randomize(&mut self.config, scope, &set, &mut self.rng)?;
        self.after_mutation(&set);
        Ok(outcome)
    }

    pub fn reset_layer_rarity(&mut self, scope: LayerScope<'_>) -> Result<OperationOutcome> {
        let set = self.active_set.clone();
        let outcome = rarity::reset(&mut self.config, scope, &set)?;
        self.after_mutation(&set);
        Ok(outcome)
    }

    pub fn handle_skip_toggle(&mut self, layer: &str) -> Result<SkipToggleOutcome> {
        let set = self.active_set.clone();
        let outcome = rarity::skip_toggle(&mut self.config, layer, &set)?;
        self.after_mutation(&set);
        Ok(outcome)
    }

    /// Flip the lock of a trait, or of the whole layer when `trait_name` is `None`.
    ///
    /// Returns the new lock state.
    pub fn toggle_lock(&mut self, layer: &str, trait_name: Option<&str>) -> Result<bool> {
        let set = self.active_set.clone();
        let layer_config = self.config.require_layer_mut(layer)?;
        let locked = match trait_name {
            Some(name) => {
                let record = layer_config.trait_config_mut(name, &set).ok_or_else(|| {
                    RarityError::TraitNotFound {
                        layer: layer.to_string(),
                        trait_name: name.to_string(),
                    }
                })?;
                record.locked = !record.locked;
                record.locked
            }
            None => {
                let state = layer_config.set_state_mut(&set);
                state.locked = !state.locked;
                state.locked
            }
        };
        self.after_mutation(&set);
        Ok(locked)
    }

    /// Enable or disable a trait. Its stored value is kept either way.
    pub fn set_trait_enabled(&mut self, layer: &str, trait_name: &str, enabled: bool) -> Result<()> {
        let set = self.active_set.clone();
        let record = self
            .config
            .require_layer_mut(layer)?
            .trait_config_mut(trait_name, &set)
            .ok_or_else(|| RarityError::TraitNotFound {
                layer: layer.to_string(),
                trait_name: trait_name.to_string(),
            })?;
        record.enabled = enabled;
        self.after_mutation(&set);
        Ok(())
    }

    /// Activate or deactivate a layer in the active set.
    pub fn set_layer_active(&mut self, layer: &str, active: bool) -> Result<()> {
        let set = self.active_set.clone();
        self.config.require_layer_mut(layer)?.set_state_mut(&set).active = active;
        self.after_mutation(&set);
        Ok(())
    }

    /// Whether a layer's enabled traits sum to 100 within the tolerance.
    ///
    /// A layer with nothing enabled has no valid distribution and fails.
    pub fn validate_layer_probabilities(&self, layer: &str) -> Result<bool> {
        let layer = self.config.require_layer(layer)?;
        Ok(layer.has_enabled(&self.active_set)
            && is_normalized(layer, &self.active_set, self.settings.tolerance))
    }

    /// Output-count weighted rarity of every trait of `layer` across sets.
    pub fn get_global_rarity_data(&self, layer: &str) -> Result<Vec<GlobalTraitRarity>> {
        global_rarity(&self.config, &self.sets, layer)
    }

    /// Every active (layer, set) whose enabled total is off 100.
    pub fn diagnostics(&self) -> Vec<LayerDiagnostic> {
        let mut report = Vec::new();
        for (layer_name, layer) in self.config.layers() {
            for set in self.sets.ids() {
                if layer.is_active(&set) && !is_normalized(layer, &set, self.settings.tolerance) {
                    report.push(LayerDiagnostic {
                        layer: layer_name.clone(),
                        total: rarity::round2(layer.enabled_total(&set)),
                        set,
                    });
                }
            }
        }
        report
    }

    // ---------------------------------------------------------------------
    // Constraints
    // ---------------------------------------------------------------------

    /// Forced pairs of the active set.
    pub fn forced_combinations(&mut self) -> ConstraintGraph {
        let set = self.active_set.clone();
        self.forced_graph(&set)
    }

    /// Incompatible pairs of the active set.
    pub fn incompatibilities(&mut self) -> ConstraintGraph {
        let set = self.active_set.clone();
        let store = &self.store;
        self.incompat_cache
            .get_or_load(&set, || store.load_incompatibility_state())
            .unwrap_or_else(|e| {
                warn!(error = %e, set = %set, "failed to load incompatibilities");
                ConstraintGraph::new()
            })
    }

    /// Traits of other layers that must never appear with `layer`/`trait_name`.
    pub fn incompatible_with(&mut self, layer: &str, trait_name: &str) -> Vec<TraitRef> {
        rarity::incompatible::incompatible_with(&self.incompatibilities(), layer, trait_name)
    }

    /// Entries of a selector's `selection` that are no longer valid in the active set.
    pub fn stale_selections(&self, selection: &[TraitRef]) -> Vec<TraitRef> {
        rarity::incompatible::stale_selections(&self.config, &self.active_set, selection)
    }

    /// Record a forced pair in the active set and clamp right away.
    ///
    /// Returns false when the pair was already present.
    pub fn add_forced_combination(&mut self, a: &TraitRef, b: &TraitRef) -> Result<bool> {
        let set = self.active_set.clone();
        let opposing = self.incompatibilities();
        rarity::incompatible::check_new_pair(&self.config, &set, a, b, &opposing)?;

        let mut state = self.store.load_forced_combination_state()?;
        let added = state.entry(set.clone()).or_default().add(a, b);
        if added {
            info!(a = %a, b = %b, set = %set, "added forced combination");
            self.forced_cache.put(&state);
            self.save_forced_state(&state);
            self.after_mutation(&set);
        }
        Ok(added)
    }

    pub fn remove_forced_combination(&mut self, a: &TraitRef, b: &TraitRef) -> Result<bool> {
        let set = self.active_set.clone();
        let mut state = self.store.load_forced_combination_state()?;
        let removed = state.get_mut(&set).is_some_and(|graph| graph.remove(a, b));
        if removed {
            info!(a = %a, b = %b, set = %set, "removed forced combination");
            self.forced_cache.put(&state);
            self.save_forced_state(&state);
        }
        Ok(removed)
    }

    /// Record an incompatible pair in the active set.
    pub fn add_incompatibility(&mut self, a: &TraitRef, b: &TraitRef) -> Result<bool> {
        let set = self.active_set.clone();
        let opposing = self.forced_graph(&set);
        rarity::incompatible::check_new_pair(&self.config, &set, a, b, &opposing)?;

        let mut state = self.store.load_incompatibility_state()?;
        let added = state.entry(set.clone()).or_default().add(a, b);
        if added {
            info!(a = %a, b = %b, set = %set, "added incompatibility");
            self.incompat_cache.put(&state);
            self.save_incompat_state(&state);
        }
        Ok(added)
    }

    pub fn remove_incompatibility(&mut self, a: &TraitRef, b: &TraitRef) -> Result<bool> {
        let set = self.active_set.clone();
        let mut state = self.store.load_incompatibility_state()?;
        let removed = state.get_mut(&set).is_some_and(|graph| graph.remove(a, b));
        if removed {
            self.incompat_cache.put(&state);
            self.save_incompat_state(&state);
        }
        Ok(removed)
    }

    /// Drop stored pairs that reference missing, inactive or disabled traits.
    pub fn cleanup_constraints(&mut self) -> Result<ConstraintCleanup> {
        let mut forced = self.store.load_forced_combination_state()?;
        let mut incompatible = self.store.load_incompatibility_state()?;

        let report = ConstraintCleanup {
            forced: rarity::cleanup(&self.config, &mut forced),
            incompatible: rarity::cleanup(&self.config, &mut incompatible),
        };

        if !report.forced.is_empty() {
            self.forced_cache.put(&forced);
            self.save_forced_state(&forced);
        }
        if !report.incompatible.is_empty() {
            self.incompat_cache.put(&incompatible);
            self.save_incompat_state(&incompatible);
        }
        if report.count() > 0 {
            info!(removed = report.count(), "cleaned up stale constraints");
        }
        Ok(report)
    }

    /// Run the forced-combination pass on the active set and persist any change.
    pub fn resolve_forced(&mut self) -> ForcedResolution {
        let set = self.active_set.clone();
        self.run_forced_pass(&set);
        if !self.last_resolution.is_noop() {
            self.save_config();
        }
        self.last_resolution.clone()
    }

    // ---------------------------------------------------------------------
    // Sets
    // ---------------------------------------------------------------------

    /// Create a set, copying `copy_from`'s records and constraints, or seeding
    /// a uniform distribution when no source is given.
    pub fn create_set(&mut self, id: &str, name: &str, copy_from: Option<&str>) -> Result<()> {
        if self.sets.contains(id) {
            return Err(RarityError::SetAlreadyExists { set: id.to_string() });
        }

        let info = match copy_from {
            Some(source) => {
                let mut info = self.sets.require(source)?.clone();
                info.name = name.to_string();
                self.copy_constraints(source, id)?;
                self.config.copy_set(source, id);
                info
            }
            None => {
                for (_, layer) in self.config.layers_mut() {
                    equalize_within_layer(layer, id);
                }
                let mut info = SetInfo::new(name, self.settings.default_output_count);
                info.layer_order = self.config.layer_names();
                info
            }
        };

        self.sets.insert(id, info);
        info!(set = id, copied_from = ?copy_from, "created set");
        self.save_sets();
        self.after_mutation(id);
        Ok(())
    }

    /// Remove a set with every record and constraint it owns.
    pub fn remove_set(&mut self, id: &str) -> Result<()> {
        self.sets.require(id)?;
        if self.sets.len() == 1 {
            return Err(RarityError::CannotRemoveLastSet { set: id.to_string() });
        }

        let mut forced = self.store.load_forced_combination_state()?;
        let mut incompatible = self.store.load_incompatibility_state()?;
        if forced.shift_remove(id).is_some() {
            self.forced_cache.put(&forced);
            self.save_forced_state(&forced);
        }
        if incompatible.shift_remove(id).is_some() {
            self.incompat_cache.put(&incompatible);
            self.save_incompat_state(&incompatible);
        }

        self.config.remove_set(id);
        self.sets.remove(id);
        if self.active_set == id {
            if let Some(first) = self.sets.ids().into_iter().next() {
                self.active_set = first;
            }
        }

        info!(set = id, active = %self.active_set, "removed set");
        self.save_sets();
        self.save_config();
        Ok(())
    }

    pub fn set_output_count(&mut self, id: &str, output_count: u32) -> Result<()> {
        self.sets.require_mut(id)?.output_count = output_count;
        self.save_sets();
        Ok(())
    }

    /// Change a set's stacking order. Forced pairs are re-oriented and clamped.
    pub fn set_layer_order(&mut self, id: &str, order: Vec<String>) -> Result<()> {
        for layer in &order {
            self.config.require_layer(layer)?;
        }
        self.sets.require_mut(id)?.layer_order = order;
        self.save_sets();
        self.after_mutation(id);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn forced_graph(&mut self, set: &str) -> ConstraintGraph {
        let store = &self.store;
        self.forced_cache
            .get_or_load(set, || store.load_forced_combination_state())
            .unwrap_or_else(|e| {
                warn!(error = %e, set, "failed to load forced combinations");
                ConstraintGraph::new()
            })
    }

    fn run_forced_pass(&mut self, set: &str) {
        let graph = self.forced_graph(set);
        let info = self.sets.get(set).cloned();
        let resolution = resolve_forced_combinations(&mut self.config, &graph, set, info.as_ref());
        if resolution.dropped_excess > 0.0 {
            warn!(
                set,
                dropped = resolution.dropped_excess,
                "forced combinations left probability without a recipient"
            );
        }
        self.last_resolution = resolution;
    }

    fn after_mutation(&mut self, set: &str) {
        self.run_forced_pass(set);
        self.save_config();
    }

    /// Both tables are loaded before either is written, so a failed load
    /// leaves every table as it was.
    fn copy_constraints(&mut self, from: &str, to: &str) -> Result<()> {
        let mut forced = self.store.load_forced_combination_state()?;
        let mut incompatible = self.store.load_incompatibility_state()?;

        if let Some(graph) = forced.get(from).cloned() {
            forced.insert(to.to_string(), graph);
            self.forced_cache.put(&forced);
            self.save_forced_state(&forced);
        }
        if let Some(graph) = incompatible.get(from).cloned() {
            incompatible.insert(to.to_string(), graph);
            self.incompat_cache.put(&incompatible);
            self.save_incompat_state(&incompatible);
        }
        Ok(())
    }

    fn save_config(&self) {
        if let Err(e) = self.store.save_rarity_config(&self.config) {
            warn!(error = %e, "failed to save rarity config");
        }
    }

    fn save_sets(&self) {
        if let Err(e) = self.store.save_sets(&self.sets) {
            warn!(error = %e, "failed to save set catalog");
        }
    }

    fn save_forced_state(&self, state: &ConstraintState) {
        if let Err(e) = self.store.save_forced_combination_state(state) {
            warn!(error = %e, "failed to save forced combinations");
        }
    }

    fn save_incompat_state(&self, state: &ConstraintState) {
        if let Err(e) = self.store.save_incompatibility_state(state) {
            warn!(error = %e, "failed to save incompatibilities");
        }
    }
}

/// Catalog listing every set the configuration has records for.
fn derive_catalog(config: &RarityConfig, settings: &EngineConfig) -> SetCatalog {
    let mut seen: HashSet<SetId> = HashSet::new();
    let mut ids: Vec<SetId> = Vec::new();
    for (_, layer) in config.layers() {
        let trait_sets = layer.traits.values().flat_map(|t| t.sets.keys());
        for id in layer.sets.keys().chain(trait_sets) {
            if seen.insert(id.clone()) {
                ids.push(id.clone());
            }
        }
    }
    if ids.is_empty() {
        ids.push(settings.default_set.clone());
    }

    let mut catalog = SetCatalog::new();
    for id in ids {
        let mut info = SetInfo::new(id.clone(), settings.default_output_count);
        info.layer_order = config.layer_names();
        catalog.insert(id, info);
    }
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NONE_TRAIT;
    use crate::state::MemoryStore;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    fn engine() -> RarityEngine<MemoryStore> {
        let store = MemoryStore::new()
            .with_traits("Background", &["Red.png", "Blue.png", "Green.png"])
            .with_traits("Eyes", &["Glow.png", "Plain.png", "Sleepy.png"]);
        let layers = vec!["Background".to_string(), "Eyes".to_string()];
        RarityEngine::initialize(store, EngineConfig::default(), Path::new("/unused"), Some(&layers))
            .unwrap()
            .with_seed(7)
    }

    #[test]
    fn test_initialize_seeds_uniform_layers() {
        let engine = engine();

        assert_eq!(engine.active_set(), "set1");
        assert_abs_diff_eq!(engine.get_rarity("Background", "Red").unwrap(), 33.33);
        assert_abs_diff_eq!(engine.get_rarity("Background", "Green").unwrap(), 33.34);
        let none = engine.trait_record("Background", NONE_TRAIT).unwrap();
        assert!(!none.enabled);
        assert_eq!(none.value, 0.0);
        assert_eq!(
            engine.sets().get("set1").unwrap().layer_order,
            vec!["Background".to_string(), "Eyes".to_string()]
        );
        assert!(engine.store().stored_config().contains_layer("Eyes"));
    }

    #[test]
    fn test_locked_layer_refuses_adjust() {
        let mut engine = engine();
        assert!(engine.toggle_lock("Eyes", None).unwrap());

        let err = engine.adjust_rarity_values("Eyes", "Glow", 80.0).unwrap_err();
        assert_eq!(err.error_code(), "LAYER_LOCKED");
        assert!(!engine.toggle_lock("Eyes", None).unwrap());
    }

    #[test]
    fn test_validate_layer_probabilities() {
        let mut engine = engine();
        assert!(engine.validate_layer_probabilities("Background").unwrap());

        engine.reset_layer_rarity(LayerScope::Layer("Background")).unwrap();
        assert!(!engine.validate_layer_probabilities("Background").unwrap());
        assert!(engine.validate_layer_probabilities("Hat").is_err());
    }

    #[test]
    fn test_diagnostics_report_short_layers() {
        let mut engine = engine();
        assert!(engine.diagnostics().is_empty());

        engine.set_trait_enabled("Eyes", "Glow", false).unwrap();
        let report = engine.diagnostics();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].layer, "Eyes");
        assert_abs_diff_eq!(report[0].total, 66.67);
    }

    #[test]
    fn test_set_lifecycle() {
        let mut engine = engine();
        engine.adjust_rarity_values("Background", "Red", 50.0).unwrap();

        engine.create_set("set2", "Copy", Some("set1")).unwrap();
        engine.create_set("set3", "Fresh", None).unwrap();
        assert_eq!(
            engine.create_set("set2", "Again", None).unwrap_err().error_code(),
            "SET_ALREADY_EXISTS"
        );

        engine.set_active_set("set2").unwrap();
        assert_abs_diff_eq!(engine.get_rarity("Background", "Red").unwrap(), 50.0);
        engine.set_active_set("set3").unwrap();
        assert_abs_diff_eq!(engine.get_rarity("Background", "Red").unwrap(), 33.33);

        engine.remove_set("set3").unwrap();
        assert_eq!(engine.active_set(), "set1");
        engine.remove_set("set2").unwrap();
        assert_eq!(
            engine.remove_set("set1").unwrap_err().error_code(),
            "CANNOT_REMOVE_LAST_SET"
        );
        assert_eq!(engine.store().stored_sets().len(), 1);
    }

    #[test]
    fn test_inactive_layer_leaves_global_view_and_diagnostics() {
        let mut engine = engine();
        engine.set_trait_enabled("Eyes", "Glow", false).unwrap();
        engine.set_layer_active("Eyes", false).unwrap();

        assert!(engine.diagnostics().is_empty());
        assert!(engine.get_global_rarity_data("Eyes").unwrap().is_empty());
        assert_eq!(engine.get_global_rarity_data("Background").unwrap().len(), 4);
    }

    #[test]
    fn test_failed_copy_leaves_config_untouched() {
        let mut engine = engine();
        let before = engine.config().clone();
        engine.store().set_fail_loads(true);

        let err = engine.create_set("set2", "Copy", Some("set1")).unwrap_err();

        assert_eq!(err.error_code(), "STORAGE_UNAVAILABLE");
        assert_eq!(engine.config(), &before);
        assert!(!engine.sets().contains("set2"));
        assert!(!engine.store().stored_sets().contains("set2"));

        engine.store().set_fail_loads(false);
        engine.create_set("set2", "Copy", Some("set1")).unwrap();
        assert!(engine.sets().contains("set2"));
    }

    #[test]
    fn test_derived_catalog_when_none_stored() {
        let mut layer = LayerConfig::new(BlendMode::SourceOver);
        layer.add_trait("Red");
        layer.set_value("Red", "genesis", 100.0);
        let mut config = RarityConfig::new();
        config.insert_layer("Background", layer);

        let store = MemoryStore::with_state(
            config,
            ConstraintState::new(),
            ConstraintState::new(),
            SetCatalog::new(),
        );
        let engine = RarityEngine::open(store, EngineConfig::default());

        assert_eq!(engine.sets().ids(), vec!["genesis".to_string()]);
        assert_eq!(engine.active_set(), "genesis");
    }
}
