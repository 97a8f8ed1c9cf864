//! Data Model Module
//!
//! Layer, trait and set records shared by every rarity operation:
//! - `RarityConfig`: layer name → per-set trait weights
//! - `ConstraintGraph`: mirrored forced/incompatible trait pairs
//! - `SetCatalog`: per-set stacking order and planned output count

mod constraints;
mod sets;
mod types;

pub use constraints::{ConstraintGraph, ConstraintState, TraitPair, TraitRef};
pub use sets::{SetCatalog, SetInfo};
pub use types::{
    BlendMode, LayerConfig, LayerSetState, RarityConfig, SetId, TraitConfig, TraitSetConfig,
    NONE_TRAIT,
};
