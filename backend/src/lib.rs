//! # Wedding Gallery - photo validation, staging and upload sync
//!
//! Lets a signed-in couple curate up to seven photos for their wedding site:
//! files are checked locally, staged with a preview, and on save uploaded to
//! blob storage and recorded on the account's site row.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  add files  │────▶│ Validation  │────▶│             │◀──── fetch once per
//! └─────────────┘     └─────────────┘     │   Staging   │      account from
//! ┌─────────────┐                         │  (≤ 7 imgs) │      RecordStore
//! │   remove    │────────────────────────▶│             │
//! └─────────────┘                         └──────┬──────┘
//!                                                │ save
//!                                                ▼
//! ┌─────────────┐   upload + URL          ┌─────────────┐   upsert   ┌─────────────┐
//! │  BlobStore  │◀────────────────────────│    Save     │───────────▶│ RecordStore │
//! └─────────────┘                         └─────────────┘            └─────────────┘
//! ```
//!
//! Every user-visible outcome goes through [`notify::Notifier`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wedding_gallery::{AccountId, CandidateFile, GalleryConfig, GalleryContext, GallerySession};
//!
//! #[tokio::main]
//! async fn main() {
//!     let ctx = GalleryContext::in_memory(GalleryConfig::default());
//!     let account = AccountId::new("user-1").unwrap();
//!     let mut session = GallerySession::open(ctx, account).await;
//!     session.add_files(vec![CandidateFile::new("a.jpg", "image/jpeg", vec![0u8; 16])]);
//!     let report = session.save().await.unwrap();
//!     println!("Saved {} images", report.images.len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Limits, placeholders and environment loading
//! - [`models`] - Accounts, candidate files, image entries
//! - [`preview`] - Local preview handles
//! - [`notify`] - User-visible notifications
//! - [`validation`] - Per-file checks and capacity
//! - [`staging`] - The ordered staging list
//! - [`store`] - Auth, blob and record collaborators
//! - [`fetch`] - Seeding staging from the stored gallery
//! - [`save`] - Upload and record reconciliation
//! - [`session`] - Per-account session
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Local state
pub mod notify;
pub mod preview;
pub mod staging;
pub mod validation;

// Collaborators
pub mod context;
pub mod store;

// Flows
pub mod fetch;
pub mod save;
pub mod session;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    AuthError, ConfigError, FetchError, FileRejection, RecordError, SaveError, ServerError,
    StagingError, StorageError,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{GalleryConfig, SiteDefaults, SupabaseConfig};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{AccountId, CandidateFile, EntryState, EntryView, GalleryRecord, ImageEntry};

// =============================================================================
// Re-exports - Local state
// =============================================================================

pub use notify::{Notification, NotificationLevel, Notifier};
pub use preview::{PreviewHandle, PreviewRegistry};
pub use staging::StagingList;
pub use validation::{check_file, validate_candidates, ValidationOutcome, ValidationSummary};

// =============================================================================
// Re-exports - Collaborators
// =============================================================================

pub use context::GalleryContext;
pub use store::{
    AuthProvider, BlobStore, InMemoryAuth, InMemoryBlobStore, InMemoryRecordStore, RecordStore,
    SupabaseClient, UpsertAction, UpsertOutcome,
};

// =============================================================================
// Re-exports - Flows
// =============================================================================

pub use fetch::{fetch_gallery, FetchOutcome};
pub use save::{save_gallery, storage_key, SaveReport};
pub use session::GallerySession;

// Server
pub mod server {
    pub use crate::api::server::{router, serve, start_server, AppState};
}
