//! Domain models for the gallery flow.
//!
//! - [`AccountId`] - Opaque account identifier from the auth provider
//! - [`CandidateFile`] - A file offered for staging
//! - [`ImageEntry`] - One photo in the staging list (pending, persisted or both)
//! - [`GalleryRecord`] - The persisted per-account image list
//! - [`EntryView`] - Serializable snapshot of an entry for clients

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::preview::PreviewHandle;

// =============================================================================
// Account
// =============================================================================

/// Opaque account identifier. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Wrap a provider id, refusing blank values.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Candidate File
// =============================================================================

/// A local file offered to the validation unit.
///
/// The payload is reference counted so the staged entry and its preview share
/// one buffer.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    /// Original file name, including extension
    pub name: String,
    /// Declared media type
    pub media_type: String,
    /// File contents
    pub bytes: Arc<[u8]>,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, guessing its media type from the extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let media_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();
        Ok(Self::new(name, media_type, bytes))
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Extension used for the storage key.
    ///
    /// Taken from the file name; names without one fall back to the media type.
    pub fn extension(&self) -> String {
        if let Some((stem, ext)) = self.name.rsplit_once('.') {
            if !stem.is_empty() && !ext.is_empty() {
                return ext.to_ascii_lowercase();
            }
        }
        match crate::config::normalize_media_type(&self.media_type).as_str() {
            "image/jpeg" | "image/jpg" => "jpg".to_string(),
            "image/png" => "png".to_string(),
            "image/webp" => "webp".to_string(),
            _ => "bin".to_string(),
        }
    }
}

// =============================================================================
// Image Entry
// =============================================================================

/// One photo in the staging list.
///
/// A URL makes an entry persisted; `Uploaded` keeps the local payload and
/// preview around until the entry is removed or the list is replaced.
#[derive(Debug)]
pub enum ImageEntry {
    /// Pending: local payload only.
    Local {
        file: CandidateFile,
        preview: PreviewHandle,
    },
    /// Persisted: remote URL only.
    Remote { url: String },
    /// Freshly saved: payload and URL.
    Uploaded {
        file: CandidateFile,
        preview: PreviewHandle,
        url: String,
    },
}

impl ImageEntry {
    /// Remote URL if persisted.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Local { .. } => None,
            Self::Remote { url } | Self::Uploaded { url, .. } => Some(url),
        }
    }

    /// Local payload if any.
    pub fn file(&self) -> Option<&CandidateFile> {
        match self {
            Self::Local { file, .. } | Self::Uploaded { file, .. } => Some(file),
            Self::Remote { .. } => None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.url().is_some()
    }

    /// What a client should display: the local preview when there is one,
    /// otherwise the remote URL.
    pub fn preview_ref(&self) -> String {
        match self {
            Self::Local { preview, .. } | Self::Uploaded { preview, .. } => preview.reference(),
            Self::Remote { url } => url.clone(),
        }
    }

    /// Id of the entry's live preview, if it holds one.
    pub fn preview_id(&self) -> Option<Uuid> {
        match self {
            Self::Local { preview, .. } | Self::Uploaded { preview, .. } => Some(preview.id()),
            Self::Remote { .. } => None,
        }
    }

    /// Attach a resolved URL. Persisted entries keep the URL they already had.
    pub fn into_uploaded(self, resolved: String) -> Self {
        match self {
            Self::Local { file, preview } => Self::Uploaded {
                file,
                preview,
                url: resolved,
            },
            other => other,
        }
    }

    /// Drop the local payload of a persisted entry, releasing its preview.
    pub fn into_remote(self) -> Self {
        match self {
            Self::Uploaded { url, .. } => Self::Remote { url },
            other => other,
        }
    }

    pub fn state(&self) -> EntryState {
        match self {
            Self::Local { .. } => EntryState::Pending,
            Self::Remote { .. } => EntryState::Persisted,
            Self::Uploaded { .. } => EntryState::Uploaded,
        }
    }

    pub fn view(&self, position: usize) -> EntryView {
        EntryView {
            position,
            state: self.state(),
            name: self.file().map(|f| f.name.clone()),
            size: self.file().map(|f| f.size()),
            preview: self.preview_ref(),
            url: self.url().map(str::to_string),
        }
    }
}

/// Lifecycle state of an entry, for clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Pending,
    Persisted,
    Uploaded,
}

/// Snapshot of one staged entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    pub position: usize,
    pub state: EntryState,
    pub name: Option<String>,
    pub size: Option<u64>,
    pub preview: String,
    pub url: Option<String>,
}

// =============================================================================
// Gallery Record
// =============================================================================

/// The persisted image list of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryRecord {
    pub account_id: AccountId,
    pub images: Vec<String>,
}
