//! Rarity Engine - trait probability configuration for layered generative art
//!
//! A collection is built by stacking one trait image per layer. This crate
//! owns the per-set probability of every trait and keeps it consistent:
//! 1. Rarity operations - equalize, randomize, reset, skip-toggle and direct
//!    edits, all keeping each layer's enabled traits summed to 100
//! 2. Constraints - forced combinations clamp the upper trait to its lower
//!    partner; incompatibilities are validated and kept tidy
//!
//! # Architecture
//!
//! - `model`: persisted records (layers, traits, sets, constraint graphs)
//! - `rarity`: pure transforms over those records
//! - `state`: storage contract, JSON and in-memory stores, caching
//! - `engine`: the facade a UI or the CLI drives

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod rarity;
pub mod state;

pub use config::EngineConfig;
pub use engine::{ConstraintCleanup, LayerDiagnostic, RarityEngine};
pub use error::{RarityError, Result};
