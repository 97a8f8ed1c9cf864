//! Error types for the rarity engine.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for rarity engine operations.
pub type Result<T> = std::result::Result<T, RarityError>;

/// Errors that can occur while editing or persisting a rarity configuration.
#[derive(Error, Debug)]
pub enum RarityError {
    // Lookup Errors
    #[error("Layer not found: {layer}")]
    LayerNotFound { layer: String },

    #[error("Trait not found: {layer}/{trait_name}")]
    TraitNotFound { layer: String, trait_name: String },

    #[error("Set not found: {set}")]
    SetNotFound { set: String },

    #[error("Set already exists: {set}")]
    SetAlreadyExists { set: String },

    #[error("Cannot remove '{set}': it is the only set")]
    CannotRemoveLastSet { set: String },

    // Editing Errors
    #[error("Layer '{layer}' is locked in set '{set}'")]
    LayerLocked { layer: String, set: String },

    #[error("Invalid rarity value: {value}")]
    InvalidValue { value: f64 },

    #[error("Invalid constraint: {reason}")]
    InvalidConstraint { reason: String },

    #[error("Conflicting constraint: {reason}")]
    ConflictingConstraint { reason: String },

    // Persistence Errors
    #[error("Schema validation failed: {reason}")]
    SchemaValidation { reason: String },

    #[error("Invalid schema version: {version}")]
    InvalidSchemaVersion { version: String },

    #[error("Traits folder not found: {path}")]
    TraitsFolderNotFound { path: PathBuf },

    #[error("Failed to read file: {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}: {source}")]
    FileWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory creation failed: {path}: {source}")]
    DirectoryCreateError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage unavailable: {reason}")]
    StorageUnavailable { reason: String },

    #[error("JSON serialization error: {0}")]
    JsonSerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RarityError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            RarityError::LayerNotFound { .. } => "LAYER_NOT_FOUND",
            RarityError::TraitNotFound { .. } => "TRAIT_NOT_FOUND",
            RarityError::SetNotFound { .. } => "SET_NOT_FOUND",
            RarityError::SetAlreadyExists { .. } => "SET_ALREADY_EXISTS",
            RarityError::CannotRemoveLastSet { .. } => "CANNOT_REMOVE_LAST_SET",
            RarityError::LayerLocked { .. } => "LAYER_LOCKED",
            RarityError::InvalidValue { .. } => "INVALID_VALUE",
            RarityError::InvalidConstraint { .. } => "INVALID_CONSTRAINT",
            RarityError::ConflictingConstraint { .. } => "CONFLICTING_CONSTRAINT",
            RarityError::SchemaValidation { .. } => "SCHEMA_VALIDATION",
            RarityError::InvalidSchemaVersion { .. } => "INVALID_SCHEMA_VERSION",
            RarityError::TraitsFolderNotFound { .. } => "TRAITS_FOLDER_NOT_FOUND",
            RarityError::FileReadError { .. } => "FILE_READ_ERROR",
            RarityError::FileWriteError { .. } => "FILE_WRITE_ERROR",
            RarityError::DirectoryCreateError { .. } => "DIRECTORY_CREATE_ERROR",
            RarityError::StorageUnavailable { .. } => "STORAGE_UNAVAILABLE",
            RarityError::JsonSerializationError(_) => "SERIALIZATION_ERROR",
            RarityError::Io(_) => "IO_ERROR",
        }
    }

    /// Returns true if the session can carry on with its in-memory state.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RarityError::SchemaValidation { .. }
                | RarityError::InvalidSchemaVersion { .. }
                | RarityError::FileReadError { .. }
                | RarityError::FileWriteError { .. }
                | RarityError::StorageUnavailable { .. }
                | RarityError::JsonSerializationError(_)
                | RarityError::Io(_)
        )
    }

    /// Returns a user-friendly recovery suggestion.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            RarityError::LayerNotFound { .. } => {
                Some("Check the layer name, or re-run 'init' after adding trait folders.")
            }
            RarityError::TraitNotFound { .. } => Some("Check the trait name within the layer."),
            RarityError::LayerLocked { .. } => Some("Unlock the layer before editing it."),
            RarityError::ConflictingConstraint { .. } => {
                Some("A pair cannot be both forced and incompatible; remove one first.")
            }
            RarityError::SchemaValidation { .. } => {
                Some("Restore the file from the backups directory or re-initialize.")
            }
            RarityError::TraitsFolderNotFound { .. } => {
                Some("Point --traits at the folder holding one subfolder per layer.")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = RarityError::LayerNotFound {
            layer: "Background".to_string(),
        };
        assert_eq!(err.error_code(), "LAYER_NOT_FOUND");
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_persistence_errors_are_recoverable() {
        let err = RarityError::SchemaValidation {
            reason: "value out of range".to_string(),
        };
        assert!(err.is_recoverable());

        let err = RarityError::LayerLocked {
            layer: "Eyes".to_string(),
            set: "set1".to_string(),
        };
        assert!(!err.is_recoverable());
    }
}
