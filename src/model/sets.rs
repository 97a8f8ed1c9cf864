//! Set Catalog
//!
//! Describes each collection set: its display name, how many outputs it is
//! planned to produce, and the order in which its layers are stacked.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::types::{RarityConfig, SetId};
use crate::error::{RarityError, Result};

/// Metadata for one set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetInfo {
    pub name: String,

    /// Planned number of generated outputs; weights the global view.
    #[serde(default)]
    pub output_count: u32,

    /// Layer stacking order, bottom first.
    #[serde(default)]
    pub layer_order: Vec<String>,
}

impl SetInfo {
    pub fn new(name: impl Into<String>, output_count: u32) -> Self {
        Self {
            name: name.into(),
            output_count,
            layer_order: Vec::new(),
        }
    }

    /// Stacking position of `layer`.
    ///
    /// Layers absent from `layer_order` come after the listed ones, in the
    /// configuration's enumeration order.
    pub fn stacking_index(&self, layer: &str, config: &RarityConfig) -> Option<usize> {
        if let Some(idx) = self.layer_order.iter().position(|l| l == layer) {
            return Some(idx);
        }
        config
            .position(layer)
            .map(|idx| self.layer_order.len() + idx)
    }
}

/// All sets of a project, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SetCatalog {
    sets: IndexMap<SetId, SetInfo>,
}

impl SetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn contains(&self, set: &str) -> bool {
        self.sets.contains_key(set)
    }

    pub fn get(&self, set: &str) -> Option<&SetInfo> {
        self.sets.get(set)
    }

    pub fn require(&self, set: &str) -> Result<&SetInfo> {
        self.sets.get(set).ok_or_else(|| RarityError::SetNotFound {
            set: set.to_string(),
        })
    }

    pub fn require_mut(&mut self, set: &str) -> Result<&mut SetInfo> {
        self.sets.get_mut(set).ok_or_else(|| RarityError::SetNotFound {
            set: set.to_string(),
        })
    }

    pub fn insert(&mut self, id: impl Into<SetId>, info: SetInfo) {
        self.sets.insert(id.into(), info);
    }

    pub fn remove(&mut self, set: &str) -> Option<SetInfo> {
        self.sets.shift_remove(set)
    }

    pub fn ids(&self) -> Vec<SetId> {
        self.sets.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SetId, &SetInfo)> {
        self.sets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlendMode, LayerConfig};

    #[test]
    fn test_stacking_index_prefers_explicit_order() {
        let mut config = RarityConfig::new();
        for name in ["Background", "Eyes", "Hat"] {
            config.insert_layer(name, LayerConfig::new(BlendMode::SourceOver));
        }

        let mut info = SetInfo::new("Main", 100);
        info.layer_order = vec!["Eyes".to_string(), "Background".to_string()];

        assert_eq!(info.stacking_index("Eyes", &config), Some(0));
        assert_eq!(info.stacking_index("Background", &config), Some(1));
        // Unlisted layers sort after the explicit order.
        assert_eq!(info.stacking_index("Hat", &config), Some(4));
        assert_eq!(info.stacking_index("Mouth", &config), None);
    }

    #[test]
    fn test_require_unknown_set() {
        let catalog = SetCatalog::new();
        assert_eq!(catalog.require("set9").unwrap_err().error_code(), "SET_NOT_FOUND");
    }
}
