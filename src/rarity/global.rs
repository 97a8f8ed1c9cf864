//! Read-only cross-set rarity rollup.

use serde::Serialize;

use super::normalize::round2;
use crate::error::Result;
use crate::model::{RarityConfig, SetCatalog};

/// A trait's rarity across every set its layer is active in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalTraitRarity {
    pub trait_name: String,
    pub rarity: f64,
}

/// Aggregate a layer's trait values over the sets it is active in.
///
/// Each set is weighted by its planned output count; when every participating
/// set plans zero outputs the sets are weighted equally. Disabled traits count
/// as 0. Sets in which the layer is inactive are left out. Traits are returned
/// in enumeration order.
pub fn global_rarity(config: &RarityConfig, sets: &SetCatalog, layer_name: &str) -> Result<Vec<GlobalTraitRarity>> {
    let layer = config.require_layer(layer_name)?;

    let participating: Vec<(&str, f64)> = sets
        .iter()
        .filter(|(id, _)| layer.is_active(id))
        .map(|(id, info)| (id.as_str(), f64::from(info.output_count)))
        .collect();
    if participating.is_empty() {
        return Ok(Vec::new());
    }

    let total_weight: f64 = participating.iter().map(|(_, w)| w).sum();
    let weights: Vec<(&str, f64)> = if total_weight > 0.0 {
        participating
            .iter()
            .map(|(id, w)| (*id, w / total_weight))
            .collect()
    } else {
        let even = 1.0 / participating.len() as f64;
        participating.iter().map(|(id, _)| (*id, even)).collect()
    };

    Ok(layer
        .trait_names()
        .into_iter()
        .map(|name| {
            let rarity: f64 = weights
                .iter()
                .map(|(set, weight)| {
                    layer
                        .trait_config(&name, set)
                        .map(|record| record.effective_value())
                        .unwrap_or(0.0)
                        * weight
                })
                .sum();
            GlobalTraitRarity {
                trait_name: name,
                rarity: round2(rarity),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlendMode, LayerConfig, SetInfo, NONE_TRAIT};
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    fn setup(set1_count: u32, set2_count: u32) -> (RarityConfig, SetCatalog) {
        let mut layer = LayerConfig::new(BlendMode::SourceOver);
        for name in ["Red", "Blue"] {
            layer.add_trait(name);
        }
        layer.ensure_none_trait();
        layer.set_value("Red", "set1", 80.0);
        layer.set_value("Blue", "set1", 20.0);
        layer.set_value("Red", "set2", 20.0);
        layer.set_value("Blue", "set2", 80.0);

        let mut config = RarityConfig::new();
        config.insert_layer("Background", layer);

        let mut sets = SetCatalog::new();
        sets.insert("set1", SetInfo::new("Main", set1_count));
        sets.insert("set2", SetInfo::new("Rare", set2_count));
        (config, sets)
    }

    fn rarity_of(rows: &[GlobalTraitRarity], name: &str) -> f64 {
        rows.iter().find(|r| r.trait_name == name).unwrap().rarity
    }

    #[test]
    fn test_weighted_by_output_count() {
        let (config, sets) = setup(300, 100);

        let rows = global_rarity(&config, &sets, "Background").unwrap();

        let names: Vec<&str> = rows.iter().map(|r| r.trait_name.as_str()).collect();
        assert_eq!(names, vec!["Red", "Blue", NONE_TRAIT]);
        assert_abs_diff_eq!(rarity_of(&rows, "Red"), 65.0);
        assert_abs_diff_eq!(rarity_of(&rows, "Blue"), 35.0);
        assert_abs_diff_eq!(rarity_of(&rows, NONE_TRAIT), 0.0);
    }

    #[test]
    fn test_zero_counts_fall_back_to_plain_mean() {
        let (config, sets) = setup(0, 0);
        let rows = global_rarity(&config, &sets, "Background").unwrap();
        assert_abs_diff_eq!(rarity_of(&rows, "Red"), 50.0);
    }

    #[test]
    fn test_inactive_sets_are_excluded() {
        let (mut config, sets) = setup(300, 100);
        config
            .layer_mut("Background")
            .unwrap()
            .set_state_mut("set1")
            .active = false;
        let before = config.clone();

        let rows = global_rarity(&config, &sets, "Background").unwrap();

        assert_abs_diff_eq!(rarity_of(&rows, "Red"), 20.0);
        assert_eq!(config, before);
    }

    #[test]
    fn test_unknown_layer() {
        let (config, sets) = setup(1, 1);
        assert!(global_rarity(&config, &sets, "Hat").is_err());
    }
}
