//! Constraint Graphs
//!
//! Forced combinations and incompatibilities share one shape: a symmetric
//! adjacency `layer → trait → otherLayer → [otherTrait, ...]`. Every pair is
//! stored in both directions so either end can look up its partners.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::types::SetId;
use crate::error::{RarityError, Result};

/// One end of a constraint: a trait inside a layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraitRef {
    pub layer: String,
    pub trait_name: String,
}

impl TraitRef {
    pub fn new(layer: impl Into<String>, trait_name: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            trait_name: trait_name.into(),
        }
    }
}

impl std::fmt::Display for TraitRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.layer, self.trait_name)
    }
}

/// An unordered pair of constrained traits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitPair {
    pub a: TraitRef,
    pub b: TraitRef,
}

/// Per-set constraint graphs, as persisted.
pub type ConstraintState = IndexMap<SetId, ConstraintGraph>;

type Adjacency = IndexMap<String, IndexMap<String, IndexMap<String, Vec<String>>>>;

/// Symmetric adjacency of constrained trait pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintGraph {
    entries: Adjacency,
}

impl ConstraintGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct pairs.
    pub fn len(&self) -> usize {
        self.pairs().len()
    }

    /// Add a pair in both directions. Returns false if it was already present.
    pub fn add(&mut self, a: &TraitRef, b: &TraitRef) -> bool {
        let inserted = self.insert_directed(a, b);
        self.insert_directed(b, a);
        inserted
    }

    fn insert_directed(&mut self, from: &TraitRef, to: &TraitRef) -> bool {
        let partners = self
            .entries
            .entry(from.layer.clone())
            .or_default()
            .entry(from.trait_name.clone())
            .or_default()
            .entry(to.layer.clone())
            .or_default();
        if partners.iter().any(|t| t == &to.trait_name) {
            return false;
        }
        partners.push(to.trait_name.clone());
        true
    }

    /// Remove a pair in both directions. Returns false if it was absent.
    pub fn remove(&mut self, a: &TraitRef, b: &TraitRef) -> bool {
        let removed = self.remove_directed(a, b);
        self.remove_directed(b, a);
        removed
    }

    fn remove_directed(&mut self, from: &TraitRef, to: &TraitRef) -> bool {
        let Some(traits) = self.entries.get_mut(&from.layer) else {
            return false;
        };
        let Some(layers) = traits.get_mut(&from.trait_name) else {
            return false;
        };
        let Some(partners) = layers.get_mut(&to.layer) else {
            return false;
        };
        let before = partners.len();
        partners.retain(|t| t != &to.trait_name);
        let removed = partners.len() != before;

        if partners.is_empty() {
            layers.shift_remove(&to.layer);
        }
        if layers.is_empty() {
            traits.shift_remove(&from.trait_name);
        }
        if traits.is_empty() {
            self.entries.shift_remove(&from.layer);
        }
        removed
    }

    pub fn contains(&self, a: &TraitRef, b: &TraitRef) -> bool {
        self.entries
            .get(&a.layer)
            .and_then(|traits| traits.get(&a.trait_name))
            .and_then(|layers| layers.get(&b.layer))
            .is_some_and(|partners| partners.iter().any(|t| t == &b.trait_name))
    }

    /// Every trait paired with `t`.
    pub fn partners(&self, t: &TraitRef) -> Vec<TraitRef> {
        self.entries
            .get(&t.layer)
            .and_then(|traits| traits.get(&t.trait_name))
            .map(|layers| {
                layers
                    .iter()
                    .flat_map(|(layer, names)| names.iter().map(move |n| TraitRef::new(layer, n)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `t` takes part in any pair.
    pub fn involves(&self, layer: &str, trait_name: &str) -> bool {
        self.entries
            .get(layer)
            .and_then(|traits| traits.get(trait_name))
            .is_some_and(|layers| layers.values().any(|names| !names.is_empty()))
    }

    /// Distinct pairs, each reported once in first-seen orientation.
    pub fn pairs(&self) -> Vec<TraitPair> {
        let mut seen: HashSet<(TraitRef, TraitRef)> = HashSet::new();
        let mut pairs = Vec::new();
        for (layer, traits) in &self.entries {
            for (trait_name, layers) in traits {
                let a = TraitRef::new(layer, trait_name);
                for (other_layer, names) in layers {
                    for other in names {
                        let b = TraitRef::new(other_layer, other);
                        let key = if a <= b {
                            (a.clone(), b.clone())
                        } else {
                            (b.clone(), a.clone())
                        };
                        if seen.insert(key) {
                            pairs.push(TraitPair { a: a.clone(), b });
                        }
                    }
                }
            }
        }
        pairs
    }

    /// Drop every pair with an end rejected by `keep`. Returns the pairs dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&TraitRef) -> bool) -> Vec<TraitPair> {
        let dropped: Vec<TraitPair> = self
            .pairs()
            .into_iter()
            .filter(|pair| !keep(&pair.a) || !keep(&pair.b))
            .collect();
        for pair in &dropped {
            self.remove(&pair.a, &pair.b);
        }
        dropped
    }

    /// Re-add every stored direction so that the adjacency is symmetric.
    pub fn mirrored(&self) -> Self {
        let mut graph = Self::new();
        for pair in self.pairs() {
            graph.add(&pair.a, &pair.b);
        }
        graph
    }

    /// Structural checks applied to persisted graphs.
    pub fn validate(&self) -> Result<()> {
        for pair in self.pairs() {
            for end in [&pair.a, &pair.b] {
                if end.layer.trim().is_empty() || end.trait_name.trim().is_empty() {
                    return Err(RarityError::SchemaValidation {
                        reason: "constraint with empty layer or trait name".to_string(),
                    });
                }
            }
            if pair.a.layer == pair.b.layer {
                return Err(RarityError::SchemaValidation {
                    reason: format!("constraint {} ↔ {} stays inside one layer", pair.a, pair.b),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn red() -> TraitRef {
        TraitRef::new("Background", "Red")
    }

    fn glow() -> TraitRef {
        TraitRef::new("Eyes", "Glow")
    }

    #[test]
    fn test_add_is_mirrored() {
        let mut graph = ConstraintGraph::new();
        assert!(graph.add(&red(), &glow()));
        assert!(!graph.add(&glow(), &red()));

        assert!(graph.contains(&red(), &glow()));
        assert!(graph.contains(&glow(), &red()));
        assert_eq!(graph.partners(&glow()), vec![red()]);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_partners_span_every_other_layer() {
        let mut graph = ConstraintGraph::new();
        let smile = TraitRef::new("Mouth", "Smile");
        graph.add(&red(), &glow());
        graph.add(&red(), &smile);

        assert_eq!(graph.partners(&red()), vec![glow(), smile]);
        assert!(graph.partners(&TraitRef::new("Hat", "Cap")).is_empty());
    }

    #[test]
    fn test_remove_prunes_empty_branches() {
        let mut graph = ConstraintGraph::new();
        graph.add(&red(), &glow());
        assert!(graph.remove(&glow(), &red()));

        assert!(graph.is_empty());
        assert!(!graph.involves("Background", "Red"));
        assert!(!graph.remove(&red(), &glow()));
    }

    #[test]
    fn test_json_shape() {
        let mut graph = ConstraintGraph::new();
        graph.add(&red(), &glow());

        let value = serde_json::to_value(&graph).unwrap();
        assert_eq!(value["Background"]["Red"]["Eyes"][0], "Glow");
        assert_eq!(value["Eyes"]["Glow"]["Background"][0], "Red");
    }

    #[test]
    fn test_retain_drops_pairs_in_both_directions() {
        let mut graph = ConstraintGraph::new();
        graph.add(&red(), &glow());
        graph.add(&red(), &TraitRef::new("Mouth", "Smile"));

        let dropped = graph.retain(|t| t.layer != "Mouth");
        assert_eq!(dropped.len(), 1);
        assert!(!graph.involves("Mouth", "Smile"));
        assert!(graph.contains(&glow(), &red()));
    }

    #[test]
    fn test_mirrored_repairs_one_sided_entries() {
        let json = r#"{"Background": {"Red": {"Eyes": ["Glow"]}}}"#;
        let graph: ConstraintGraph = serde_json::from_str(json).unwrap();
        assert!(!graph.contains(&glow(), &red()));

        let graph = graph.mirrored();
        assert!(graph.contains(&glow(), &red()));
    }

    #[test]
    fn test_validate_rejects_same_layer_pairs() {
        let mut graph = ConstraintGraph::new();
        graph.add(&red(), &TraitRef::new("Background", "Blue"));
        assert!(graph.validate().is_err());
    }
}
