//! Shared wiring for gallery sessions.

use std::sync::Arc;

use crate::config::GalleryConfig;
use crate::notify::Notifier;
use crate::preview::PreviewRegistry;
use crate::store::{BlobStore, InMemoryBlobStore, InMemoryRecordStore, RecordStore, SupabaseClient};

/// Everything a session needs besides its own state.
#[derive(Clone)]
pub struct GalleryContext {
    pub config: Arc<GalleryConfig>,
    pub blobs: Arc<dyn BlobStore>,
    pub records: Arc<dyn RecordStore>,
    pub previews: PreviewRegistry,
    pub notifier: Notifier,
}

impl GalleryContext {
    pub fn new(
        config: GalleryConfig,
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        let notifier = Notifier::new(config.notification_capacity);
        Self {
            config: Arc::new(config),
            blobs,
            records,
            previews: PreviewRegistry::new(),
            notifier,
        }
    }

    /// Blobs and rows both served by one Supabase project.
    pub fn supabase(config: GalleryConfig, client: SupabaseClient) -> Self {
        let client = Arc::new(client);
        Self::new(config, client.clone(), client)
    }

    /// Fresh in-process stores.
    pub fn in_memory(config: GalleryConfig) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryBlobStore::default()),
            Arc::new(InMemoryRecordStore::new()),
        )
    }
}
