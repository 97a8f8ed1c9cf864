//! Normalization and redistribution primitives.
//!
//! Every value is rounded to two decimals at each mutation boundary, and the
//! last trait in enumeration order absorbs whatever the rounding left over,
//! so a redistributed layer sums to its budget exactly.

use crate::error::{RarityError, Result};
use crate::model::{LayerConfig, RarityConfig};

/// The budget every (layer, set) distribution is normalized to.
pub const TOTAL: f64 = 100.0;

/// Tolerance of "is normalized" checks, in percentage points.
pub const DEFAULT_TOLERANCE: f64 = 0.1;

/// Round to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Split the unlocked budget equally among the enabled, unlocked traits.
///
/// Budget is `100 - Σ(locked enabled values)`. Unlocked disabled traits are
/// zeroed. Returns false (and changes nothing) when no trait is eligible.
pub fn equalize_within_layer(layer: &mut LayerConfig, set: &str) -> bool {
    let eligible = layer.redistributable(set);
    if eligible.is_empty() {
        return false;
    }
    let budget = (TOTAL - layer.locked_total(set)).max(0.0);

    for (name, record) in layer.records(set) {
        if !record.enabled && !record.locked && record.value != 0.0 {
            layer.set_value(&name, set, 0.0);
        }
    }

    let share = round2(budget / eligible.len() as f64);
    let (last, rest) = match eligible.split_last() {
        Some(split) => split,
        None => return false,
    };
    for name in rest {
        layer.set_value(name, set, share);
    }
    let remainder = round2((budget - share * rest.len() as f64).max(0.0));
    layer.set_value(last, set, remainder);
    true
}

/// Multiply each named trait's value by `factor`.
pub fn scale_to_target(layer: &mut LayerConfig, set: &str, names: &[String], factor: f64) {
    for name in names {
        let scaled = round2(layer.value(name, set) * factor);
        layer.set_value(name, set, scaled.max(0.0));
    }
}

/// Add `100 - current_total` to the last named trait.
pub fn apply_remainder_to_last(
    layer: &mut LayerConfig,
    set: &str,
    names: &[String],
    current_total: f64,
) {
    if let Some(last) = names.last() {
        let corrected = round2(layer.value(last, set) + (TOTAL - current_total));
        layer.set_value(last, set, corrected.max(0.0));
    }
}

/// Set one trait's value directly, shrinking the others if the layer overflows.
///
/// The value is clamped into `[0, 100 - lockedTotal]`, where lockedTotal
/// covers the other locked, enabled traits. When the enabled total then
/// exceeds 100, the excess is taken from the other enabled, unlocked traits
/// in proportion to their current share, followed by a scale and remainder
/// correction. Returns the value actually applied.
pub fn adjust_single_value(
    config: &mut RarityConfig,
    layer_name: &str,
    set: &str,
    trait_name: &str,
    new_value: f64,
) -> Result<f64> {
    if !new_value.is_finite() {
        return Err(RarityError::InvalidValue { value: new_value });
    }
    let layer = config.require_layer_mut(layer_name)?;
    let record = layer
        .trait_config(trait_name, set)
        .ok_or_else(|| RarityError::TraitNotFound {
            layer: layer_name.to_string(),
            trait_name: trait_name.to_string(),
        })?;

    let own_locked = if record.enabled && record.locked {
        record.value
    } else {
        0.0
    };
    let ceiling = (TOTAL - (layer.locked_total(set) - own_locked)).max(0.0);
    let clamped = round2(new_value.clamp(0.0, ceiling));
    layer.set_value(trait_name, set, clamped);

    let active_total = layer.enabled_total(set);
    if active_total <= TOTAL + f64::EPSILON {
        return Ok(clamped);
    }

    let others: Vec<String> = layer
        .redistributable(set)
        .into_iter()
        .filter(|name| name != trait_name)
        .collect();
    let others_total: f64 = others.iter().map(|n| layer.value(n, set)).sum();
    if others_total <= 0.0 {
        return Ok(clamped);
    }

    let excess = active_total - TOTAL;
    for name in &others {
        let current = layer.value(name, set);
        let reduced = round2(current - excess * (current / others_total)).max(0.0);
        layer.set_value(name, set, reduced);
    }

    let reduced_total: f64 = others.iter().map(|n| layer.value(n, set)).sum();
    let target = TOTAL - (layer.enabled_total(set) - reduced_total);
    if reduced_total > 0.0 && target >= 0.0 {
        scale_to_target(layer, set, &others, target / reduced_total);
    }

    let carriers: Vec<String> = others
        .into_iter()
        .filter(|n| layer.value(n, set) > 0.0)
        .collect();
    let total = layer.enabled_total(set);
    apply_remainder_to_last(layer, set, &carriers, total);

    Ok(clamped)
}

/// Whether the enabled traits of `layer` sum to 100 within `tolerance`.
///
/// Layers with nothing enabled have no distribution to check and pass.
pub fn is_normalized(layer: &LayerConfig, set: &str, tolerance: f64) -> bool {
    !layer.has_enabled(set) || (layer.enabled_total(set) - TOTAL).abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlendMode, NONE_TRAIT};
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    const SET: &str = "set1";

    fn layer(values: &[(&str, f64)]) -> LayerConfig {
        let mut layer = LayerConfig::new(BlendMode::SourceOver);
        for (name, value) in values {
            layer.add_trait(name);
            layer.set_value(name, SET, *value);
        }
        layer.ensure_none_trait();
        layer
    }

    fn lock(layer: &mut LayerConfig, name: &str) {
        layer.trait_config_mut(name, SET).unwrap().locked = true;
    }

    #[test_case(0.125, 0.13 ; "rounds half up")]
    #[test_case(33.333_333, 33.33 ; "truncates long tails")]
    #[test_case(100.0, 100.0 ; "keeps integers")]
    fn test_round2(input: f64, expected: f64) {
        assert_abs_diff_eq!(round2(input), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_equalize_three_traits_last_absorbs_remainder() {
        let mut layer = layer(&[("Red", 10.0), ("Blue", 70.0), ("Green", 20.0)]);

        assert!(equalize_within_layer(&mut layer, SET));

        assert_abs_diff_eq!(layer.value("Red", SET), 33.33);
        assert_abs_diff_eq!(layer.value("Blue", SET), 33.33);
        assert_abs_diff_eq!(layer.value("Green", SET), 33.34);
        assert_abs_diff_eq!(layer.enabled_total(SET), 100.0, epsilon = 0.01);
    }

    #[test]
    fn test_equalize_respects_locked_budget() {
        let mut layer = layer(&[("Red", 40.0), ("Blue", 10.0), ("Green", 50.0)]);
        lock(&mut layer, "Red");

        equalize_within_layer(&mut layer, SET);

        assert_abs_diff_eq!(layer.value("Red", SET), 40.0);
        assert_abs_diff_eq!(layer.value("Blue", SET), 30.0);
        assert_abs_diff_eq!(layer.value("Green", SET), 30.0);
    }

    #[test]
    fn test_equalize_includes_enabled_none_and_zeroes_disabled() {
        let mut layer = layer(&[("Red", 50.0), ("Blue", 50.0)]);
        layer.trait_config_mut(NONE_TRAIT, SET).unwrap().enabled = true;
        layer.trait_config_mut("Blue", SET).unwrap().enabled = false;

        equalize_within_layer(&mut layer, SET);

        assert_abs_diff_eq!(layer.value("Red", SET), 50.0);
        assert_abs_diff_eq!(layer.value(NONE_TRAIT, SET), 50.0);
        assert_abs_diff_eq!(layer.value("Blue", SET), 0.0);
    }

    #[test]
    fn test_equalize_without_eligible_traits_is_noop() {
        let mut layer = layer(&[("Red", 60.0)]);
        lock(&mut layer, "Red");
        let before = layer.clone();

        assert!(!equalize_within_layer(&mut layer, SET));
        assert_eq!(layer, before);
    }

    #[test]
    fn test_scale_then_remainder() {
        let mut layer = layer(&[("Red", 10.0), ("Blue", 20.0), ("Green", 3.0)]);
        let names = vec!["Red".to_string(), "Blue".to_string(), "Green".to_string()];

        scale_to_target(&mut layer, SET, &names, 100.0 / 33.0);
        assert_abs_diff_eq!(layer.value("Red", SET), 30.3);
        assert_abs_diff_eq!(layer.value("Blue", SET), 60.61);
        assert_abs_diff_eq!(layer.value("Green", SET), 9.09);

        let total = layer.enabled_total(SET);
        apply_remainder_to_last(&mut layer, SET, &names, total);
        assert_abs_diff_eq!(layer.enabled_total(SET), 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(layer.value("Green", SET), 9.09);
    }

    #[test]
    fn test_adjust_over_budget_shrinks_others_proportionally() {
        let mut config = RarityConfig::new();
        config.insert_layer("Background", layer(&[("Red", 50.0), ("Blue", 30.0), ("Green", 20.0)]));

        let applied = adjust_single_value(&mut config, "Background", SET, "Red", 80.0).unwrap();

        let layer = config.layer("Background").unwrap();
        assert_abs_diff_eq!(applied, 80.0);
        assert_abs_diff_eq!(layer.value("Blue", SET), 12.0);
        assert_abs_diff_eq!(layer.value("Green", SET), 8.0);
        assert_abs_diff_eq!(layer.enabled_total(SET), 100.0, epsilon = 0.01);
    }

    #[test]
    fn test_adjust_clamps_to_unlocked_budget() {
        let mut config = RarityConfig::new();
        let mut bg = layer(&[("Red", 40.0), ("Blue", 30.0), ("Green", 30.0)]);
        lock(&mut bg, "Red");
        config.insert_layer("Background", bg);

        let applied = adjust_single_value(&mut config, "Background", SET, "Blue", 95.0).unwrap();

        let layer = config.layer("Background").unwrap();
        assert_abs_diff_eq!(applied, 60.0);
        assert_abs_diff_eq!(layer.value("Red", SET), 40.0);
        assert_abs_diff_eq!(layer.value("Green", SET), 0.0);
        assert_abs_diff_eq!(layer.enabled_total(SET), 100.0, epsilon = 0.01);
    }

    #[test]
    fn test_adjust_under_budget_leaves_others() {
        let mut config = RarityConfig::new();
        config.insert_layer("Background", layer(&[("Red", 50.0), ("Blue", 50.0)]));

        adjust_single_value(&mut config, "Background", SET, "Red", 20.0).unwrap();

        let layer = config.layer("Background").unwrap();
        assert_abs_diff_eq!(layer.value("Blue", SET), 50.0);
        assert!(!is_normalized(layer, SET, DEFAULT_TOLERANCE));
    }

    #[test]
    fn test_adjust_rejects_unknown_trait_and_nan() {
        let mut config = RarityConfig::new();
        config.insert_layer("Background", layer(&[("Red", 100.0)]));

        let err = adjust_single_value(&mut config, "Background", SET, "Teal", 5.0).unwrap_err();
        assert_eq!(err.error_code(), "TRAIT_NOT_FOUND");

        let err = adjust_single_value(&mut config, "Background", SET, "Red", f64::NAN).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_VALUE");
    }

    #[test]
    fn test_is_normalized_tolerance() {
        let layer = layer(&[("Red", 50.05), ("Blue", 50.0)]);
        assert!(is_normalized(&layer, SET, DEFAULT_TOLERANCE));
        assert!(!is_normalized(&layer, SET, 0.01));
    }
}
