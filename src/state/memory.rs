//! In-memory store.
//!
//! Holds every table in process memory. Used by tests and by callers that
//! want an engine without a project directory. It counts loads per table so
//! that caching can be observed, and can be told to fail every save or
//! every constraint-table load.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;

use super::store::{read_trait_files, RarityStore};
use crate::error::{RarityError, Result};
use crate::model::{ConstraintState, RarityConfig, SetCatalog};

/// Store keeping its tables in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    config: RefCell<RarityConfig>,
    forced: RefCell<ConstraintState>,
    incompatible: RefCell<ConstraintState>,
    sets: RefCell<SetCatalog>,

    /// Layer → trait file names returned by `read_traits` instead of the disk.
    traits: HashMap<String, Vec<String>>,

    fail_saves: Cell<bool>,
    fail_loads: Cell<bool>,
    forced_loads: Cell<usize>,
    incompatible_loads: Cell<usize>,
    saves: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the given tables.
    pub fn with_state(
        config: RarityConfig,
        forced: ConstraintState,
        incompatible: ConstraintState,
        sets: SetCatalog,
    ) -> Self {
        Self {
            config: RefCell::new(config),
            forced: RefCell::new(forced),
            incompatible: RefCell::new(incompatible),
            sets: RefCell::new(sets),
            ..Self::default()
        }
    }

    /// Serve `files` for `layer` from `read_traits`.
    pub fn with_traits(mut self, layer: &str, files: &[&str]) -> Self {
        self.traits.insert(
            layer.to_string(),
            files.iter().map(|f| f.to_string()).collect(),
        );
        self
    }

    /// Make every subsequent save fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.set(fail);
    }

    /// Make every subsequent constraint-table load fail (or succeed again).
    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.set(fail);
    }

    pub fn forced_loads(&self) -> usize {
        self.forced_loads.get()
    }

    pub fn incompatible_loads(&self) -> usize {
        self.incompatible_loads.get()
    }

    /// Number of successful saves across every table.
    pub fn saves(&self) -> usize {
        self.saves.get()
    }

    /// Snapshot of the stored rarity configuration.
    pub fn stored_config(&self) -> RarityConfig {
        self.config.borrow().clone()
    }

    pub fn stored_forced(&self) -> ConstraintState {
        self.forced.borrow().clone()
    }

    pub fn stored_sets(&self) -> SetCatalog {
        self.sets.borrow().clone()
    }

    fn check_load(&self) -> Result<()> {
        if self.fail_loads.get() {
            return Err(RarityError::StorageUnavailable {
                reason: "loads disabled".to_string(),
            });
        }
        Ok(())
    }

    fn check_save(&self) -> Result<()> {
        if self.fail_saves.get() {
            return Err(RarityError::StorageUnavailable {
                reason: "saves disabled".to_string(),
            });
        }
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

impl RarityStore for MemoryStore {
    fn load_rarity_config(&self) -> Result<RarityConfig> {
        let config = self.config.borrow().clone();
        config.validate()?;
        Ok(config)
    }

    fn save_rarity_config(&self, config: &RarityConfig) -> Result<()> {
        self.check_save()?;
        *self.config.borrow_mut() = config.clone();
        Ok(())
    }

    fn load_forced_combination_state(&self) -> Result<ConstraintState> {
        self.forced_loads.set(self.forced_loads.get() + 1);
        self.check_load()?;
        Ok(self.forced.borrow().clone())
    }

    fn save_forced_combination_state(&self, state: &ConstraintState) -> Result<()> {
        self.check_save()?;
        *self.forced.borrow_mut() = state.clone();
        Ok(())
    }

    fn load_incompatibility_state(&self) -> Result<ConstraintState> {
        self.incompatible_loads.set(self.incompatible_loads.get() + 1);
        self.check_load()?;
        Ok(self.incompatible.borrow().clone())
    }

    fn save_incompatibility_state(&self, state: &ConstraintState) -> Result<()> {
        self.check_save()?;
        *self.incompatible.borrow_mut() = state.clone();
        Ok(())
    }

    fn load_sets(&self) -> Result<SetCatalog> {
        Ok(self.sets.borrow().clone())
    }

    fn save_sets(&self, sets: &SetCatalog) -> Result<()> {
        self.check_save()?;
        *self.sets.borrow_mut() = sets.clone();
        Ok(())
    }

    fn read_traits(&self, folder: &Path, layer: &str) -> Result<Vec<String>> {
        match self.traits.get(layer) {
            Some(files) => Ok(files.clone()),
            None => read_trait_files(folder, layer),
        }
    }
}
