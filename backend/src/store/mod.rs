//! Collaborator seams: auth, relational rows and blob storage.
//!
//! The gallery flow only talks to these traits. [`memory`] holds in-process
//! implementations (tests, local development); [`supabase`] talks to a
//! Supabase project over HTTP.

pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SiteDefaults;
use crate::error::{AuthResult, RecordResult, StorageResult};
use crate::models::{AccountId, GalleryRecord};

pub use memory::{InMemoryAuth, InMemoryBlobStore, InMemoryRecordStore};
pub use supabase::SupabaseClient;

/// Resolves a session token to an account.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// `Ok(None)` when the token does not belong to a live session.
    async fn resolve_account(&self, token: &str) -> AuthResult<Option<AccountId>>;
}

/// Binary object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`. Existing keys are not overwritten.
    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> StorageResult<()>;

    /// Publicly addressable URL of `key`. Empty when it cannot be resolved.
    async fn public_url(&self, key: &str) -> StorageResult<String>;
}

/// Row storage for per-account gallery records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The account's gallery, if a row exists.
    async fn find_gallery(&self, account: &AccountId) -> RecordResult<Option<GalleryRecord>>;

    /// Set the account's image list in one step.
    ///
    /// Updates the existing row, or inserts one carrying `defaults` when the
    /// account has none. Reports which happened and how many rows changed.
    async fn upsert_gallery(
        &self,
        account: &AccountId,
        images: &[String],
        defaults: &SiteDefaults,
    ) -> RecordResult<UpsertOutcome>;
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertAction {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub action: UpsertAction,
    pub rows: u64,
}

impl UpsertOutcome {
    pub fn inserted(rows: u64) -> Self {
        Self {
            action: UpsertAction::Inserted,
            rows,
        }
    }

    pub fn updated(rows: u64) -> Self {
        Self {
            action: UpsertAction::Updated,
            rows,
        }
    }
}
