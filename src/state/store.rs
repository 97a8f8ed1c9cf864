//! Persistence contract and its JSON file implementation.
//!
//! A project directory holds one JSON document per table:
//!
//! ```text
//! project_dir/
//!   rarity_config.json        # layer → trait → set weights
//!   forced_combinations.json  # set → forced pair graph
//!   incompatibilities.json    # set → incompatible pair graph
//!   sets.json                 # set catalog
//!   backups/                  # rotated copies of rarity_config.json
//! ```
//!
//! Every document is wrapped in an envelope carrying the schema version and
//! the save time. A missing file loads as an empty table.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::backup::BackupRotation;
use crate::error::{RarityError, Result};
use crate::model::{ConstraintState, RarityConfig, SetCatalog};

/// Current schema version for stored documents.
pub const CURRENT_SCHEMA_VERSION: &str = "1.0.0";

pub const RARITY_FILE: &str = "rarity_config.json";
pub const FORCED_FILE: &str = "forced_combinations.json";
pub const INCOMPATIBLE_FILE: &str = "incompatibilities.json";
pub const SETS_FILE: &str = "sets.json";
pub const BACKUPS_DIR: &str = "backups";

/// File extensions recognised as trait images.
pub const TRAIT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg"];

/// Storage collaborator consumed by the engine.
///
/// Loads must validate what they return; a document that fails validation is
/// an error, never a partially applied state.
pub trait RarityStore {
    fn load_rarity_config(&self) -> Result<RarityConfig>;
    fn save_rarity_config(&self, config: &RarityConfig) -> Result<()>;

    fn load_forced_combination_state(&self) -> Result<ConstraintState>;
    fn save_forced_combination_state(&self, state: &ConstraintState) -> Result<()>;

    fn load_incompatibility_state(&self) -> Result<ConstraintState>;
    fn save_incompatibility_state(&self, state: &ConstraintState) -> Result<()>;

    fn load_sets(&self) -> Result<SetCatalog>;
    fn save_sets(&self, sets: &SetCatalog) -> Result<()>;

    /// Trait image file names of one layer folder.
    fn read_traits(&self, folder: &Path, layer: &str) -> Result<Vec<String>> {
        read_trait_files(folder, layer)
    }
}

/// Envelope around every stored table.
#[derive(Debug, Serialize, Deserialize)]
struct StoredDocument<T> {
    schema_version: String,
    saved_at: DateTime<Utc>,
    data: T,
}

/// Image files directly inside `folder/layer`, sorted by name.
pub fn read_trait_files(folder: &Path, layer: &str) -> Result<Vec<String>> {
    let layer_dir = folder.join(layer);
    if !layer_dir.is_dir() {
        return Err(RarityError::TraitsFolderNotFound { path: layer_dir });
    }

    Ok(WalkDir::new(&layer_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
                .is_some_and(|ext| TRAIT_EXTENSIONS.contains(&ext.as_str()))
        })
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect())
}

/// Layer folders directly inside `folder`, sorted by name.
pub fn discover_layers(folder: &Path) -> Result<Vec<String>> {
    if !folder.is_dir() {
        return Err(RarityError::TraitsFolderNotFound {
            path: folder.to_path_buf(),
        });
    }

    Ok(WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| !name.starts_with('.'))
        .collect())
}

/// Trait name of an image file: its stem.
pub fn trait_name_from_file(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string())
}

/// JSON documents in a project directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    project_dir: PathBuf,
    backups: BackupRotation,
}

impl JsonFileStore {
    pub fn new(project_dir: impl Into<PathBuf>, max_backups: usize) -> Self {
        let project_dir = project_dir.into();
        let backups = BackupRotation::new(project_dir.join(BACKUPS_DIR), max_backups);
        Self {
            project_dir,
            backups,
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn backups(&self) -> &BackupRotation {
        &self.backups
    }

    fn path(&self, file: &str) -> PathBuf {
        self.project_dir.join(file)
    }

    fn read_document<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>> {
        let path = self.path(file);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| RarityError::FileReadError {
            path: path.clone(),
            source: e,
        })?;
        let document: StoredDocument<T> =
            serde_json::from_str(&content).map_err(|e| RarityError::SchemaValidation {
                reason: format!("{}: {}", path.display(), e),
            })?;

        if document.schema_version != CURRENT_SCHEMA_VERSION {
            return Err(RarityError::InvalidSchemaVersion {
                version: document.schema_version,
            });
        }
        Ok(Some(document.data))
    }

    fn write_document<T: Serialize>(&self, file: &str, data: &T) -> Result<()> {
        if !self.project_dir.exists() {
            fs::create_dir_all(&self.project_dir).map_err(|e| RarityError::DirectoryCreateError {
                path: self.project_dir.clone(),
                source: e,
            })?;
        }

        let document = StoredDocument {
            schema_version: CURRENT_SCHEMA_VERSION.to_string(),
            saved_at: Utc::now(),
            data,
        };
        let content = serde_json::to_string_pretty(&document)?;

        // Write beside the target and rename, so readers never see half a file.
        let path = self.path(file);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content).map_err(|e| RarityError::FileWriteError {
            path: tmp_path.clone(),
            source: e,
        })?;
        fs::rename(&tmp_path, &path).map_err(|e| RarityError::FileWriteError {
            path: path.clone(),
            source: e,
        })?;
        Ok(())
    }

    fn load_constraints(&self, file: &str) -> Result<ConstraintState> {
        let state: ConstraintState = self.read_document(file)?.unwrap_or_default();
        let mut mirrored = ConstraintState::new();
        for (set, graph) in state {
            graph.validate()?;
            mirrored.insert(set, graph.mirrored());
        }
        Ok(mirrored)
    }
}

impl RarityStore for JsonFileStore {
    fn load_rarity_config(&self) -> Result<RarityConfig> {
        let config: RarityConfig = self.read_document(RARITY_FILE)?.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    fn save_rarity_config(&self, config: &RarityConfig) -> Result<()> {
        self.backups.backup(&self.path(RARITY_FILE))?;
        self.write_document(RARITY_FILE, config)
    }

    fn load_forced_combination_state(&self) -> Result<ConstraintState> {
        self.load_constraints(FORCED_FILE)
    }

    fn save_forced_combination_state(&self, state: &ConstraintState) -> Result<()> {
        self.write_document(FORCED_FILE, state)
    }

    fn load_incompatibility_state(&self) -> Result<ConstraintState> {
        self.load_constraints(INCOMPATIBLE_FILE)
    }

    fn save_incompatibility_state(&self, state: &ConstraintState) -> Result<()> {
        self.write_document(INCOMPATIBLE_FILE, state)
    }

    fn load_sets(&self) -> Result<SetCatalog> {
        Ok(self.read_document(SETS_FILE)?.unwrap_or_default())
    }

    fn save_sets(&self, sets: &SetCatalog) -> Result<()> {
        self.write_document(SETS_FILE, sets)
    }
}
