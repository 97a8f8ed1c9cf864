//! Rarity Module
//!
//! Pure transforms over a [`RarityConfig`](crate::model::RarityConfig). Every
//! function takes the set it works on explicitly and touches only that set's
//! records.

pub mod forced;
pub mod global;
pub mod incompatible;
pub mod normalize;
pub mod operations;

pub use forced::{resolve_forced_combinations, ForcedClamp, ForcedResolution};
pub use global::{global_rarity, GlobalTraitRarity};
pub use incompatible::{cleanup, is_valid, CleanupReport};
pub use normalize::{
    adjust_single_value, apply_remainder_to_last, equalize_within_layer, is_normalized, round2,
    scale_to_target, DEFAULT_TOLERANCE, TOTAL,
};
pub use operations::{
    apply_to_layers, equalize, randomize, reset, skip_toggle, LayerScope, OperationOutcome,
    SkipToggleOutcome,
};
