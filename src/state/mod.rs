//! State Management Module
//!
//! Persistence of a project's tables and the caching in front of it:
//! - `RarityStore`: storage contract consumed by the engine
//! - `JsonFileStore`: JSON documents in a project directory, with backups
//! - `MemoryStore`: process-local tables for tests and embedding
//! - `ConstraintCache`: time-bounded reuse of loaded constraint graphs

pub mod backup;
pub mod cache;
pub mod memory;
pub mod store;

pub use backup::BackupRotation;
pub use cache::ConstraintCache;
pub use memory::MemoryStore;
pub use store::{
    discover_layers, read_trait_files, trait_name_from_file, JsonFileStore, RarityStore,
    CURRENT_SCHEMA_VERSION,
};
