//! Error types for the gallery synchronization flow.
//!
//! One enum per layer:
//!
//! - [`FileRejection`] - Per-file validation failures (batch continues)
//! - [`StagingError`] - Staging list misuse (capacity, bad position)
//! - [`StorageError`] - Blob store failures
//! - [`RecordError`] - Relational store failures
//! - [`AuthError`] - Auth provider failures
//! - [`FetchError`] - Session-start fetch failures (non-fatal)
//! - [`SaveError`] - Top-level save orchestration errors
//! - [`ConfigError`] - Environment configuration errors
//! - [`ServerError`] - HTTP server and CLI wiring errors
//!
//! Conversions are provided via `From` so `?` works across layers.

use thiserror::Error;

// =============================================================================
// Validation Errors
// =============================================================================

/// Why a candidate file was refused by the validation unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileRejection {
    /// Declared media type is not an allowed image type.
    #[error("{name} is not a supported image format")]
    UnsupportedType { name: String, media_type: String },

    /// File is larger than the configured maximum.
    #[error("{name} exceeds the maximum file size of {max_mib}MB")]
    TooLarge { name: String, size: u64, max_mib: u64 },

    /// The gallery is full; this file and the rest of its batch were skipped.
    #[error("You can only upload up to {max} images ({name} was not added)")]
    CapacityReached { name: String, max: usize },
}

impl FileRejection {
    /// Name of the refused file.
    pub fn file_name(&self) -> &str {
        match self {
            Self::UnsupportedType { name, .. }
            | Self::TooLarge { name, .. }
            | Self::CapacityReached { name, .. } => name,
        }
    }
}

// =============================================================================
// Staging Errors
// =============================================================================

/// Errors raised by the staging list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StagingError {
    /// Appending would grow the list past its capacity.
    #[error("Cannot stage {adding} more image(s): {current} of {max} slots used")]
    CapacityExceeded {
        current: usize,
        adding: usize,
        max: usize,
    },

    /// No entry at the requested position.
    #[error("No image at position {index} (gallery has {len})")]
    OutOfRange { index: usize, len: usize },
}

// =============================================================================
// Collaborator Errors
// =============================================================================

/// Errors from the blob store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store refused or failed the upload.
    #[error("{0}")]
    Upload(String),

    /// Transport failure talking to the store.
    #[error("Storage request failed: {0}")]
    Http(String),
}

/// Errors from the relational store.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Select failed.
    #[error("Failed to query gallery record: {0}")]
    Query(String),

    /// Insert or update failed.
    #[error("Failed to write gallery record: {0}")]
    Write(String),

    /// The store answered with an unexpected payload.
    #[error("Unexpected gallery record payload: {0}")]
    Decode(String),
}

/// Errors from the auth provider.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Transport or provider failure (distinct from "no such session").
    #[error("Auth provider error: {0}")]
    Provider(String),
}

// =============================================================================
// Flow Errors
// =============================================================================

/// Errors while seeding staging from the stored record.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Record store failure.
    #[error("Failed to load existing images: {0}")]
    Record(#[from] RecordError),
}

/// Top-level save orchestration errors.
///
/// Every variant is turned into exactly one failure notification, by
/// [`crate::save::save_gallery`] or, for [`SaveError::GalleryNotLoaded`], by
/// the session refusing the save.
#[derive(Debug, Error)]
pub enum SaveError {
    /// No account identifier for the session.
    #[error("You must be signed in to save images")]
    Unauthenticated,

    /// The stored gallery could not be loaded, so saving would overwrite it.
    #[error("Existing images could not be loaded yet; please try saving again")]
    GalleryNotLoaded,

    /// Staging is empty and the configuration requires at least one image.
    #[error("No images to save")]
    NothingToSave,

    /// A pending file could not be uploaded or its URL could not be resolved.
    #[error("Failed to upload {file}: {reason}")]
    UploadFailed { file: String, reason: String },

    /// Update matched zero rows.
    #[error("Failed to update gallery: no rows affected")]
    UpdateFailed,

    /// Insert created zero rows.
    #[error("Failed to create wedding site: no rows affected")]
    InsertFailed,

    /// Record store failure during reconciliation.
    #[error("{0}")]
    Record(#[from] RecordError),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required variable is not set.
    #[error("Missing {0} environment variable")]
    Missing(String),

    /// Variable is set but cannot be parsed.
    #[error("Invalid value for {key} ('{value}'): {message}")]
    Invalid {
        key: String,
        value: String,
        message: String,
    },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server and CLI wiring errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Socket or file IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for blob store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for record store operations.
pub type RecordResult<T> = Result<T, RecordError>;

/// Result type for auth provider operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Result type for save operations.
pub type SaveResult<T> = Result<T, SaveError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
