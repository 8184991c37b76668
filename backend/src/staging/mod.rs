//! The staging list: ordered photos being composed before save.
//!
//! Entries are appended at the end and removed by position. The list never
//! grows past its capacity, and dropping an entry (removal, replacement or
//! teardown of the whole list) releases its preview.

use tracing::warn;
use uuid::Uuid;

use crate::error::StagingError;
use crate::models::{EntryView, ImageEntry};

/// Ordered, bounded list of [`ImageEntry`].
#[derive(Debug)]
pub struct StagingList {
    entries: Vec<ImageEntry>,
    capacity: usize,
}

impl StagingList {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots left.
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.entries.len())
    }

    pub fn entries(&self) -> &[ImageEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&ImageEntry> {
        self.entries.get(index)
    }

    /// Append entries at the end. All or nothing.
    pub fn append(&mut self, entries: Vec<ImageEntry>) -> Result<(), StagingError> {
        if entries.len() > self.remaining() {
            return Err(StagingError::CapacityExceeded {
                current: self.entries.len(),
                adding: entries.len(),
                max: self.capacity,
            });
        }
        self.entries.extend(entries);
        Ok(())
    }

    /// Remove the entry at `index`, keeping the order of the rest.
    ///
    /// The returned entry still owns its preview; dropping it releases it.
    pub fn remove(&mut self, index: usize) -> Result<ImageEntry, StagingError> {
        if index >= self.entries.len() {
            return Err(StagingError::OutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    /// Replace everything with persisted entries, in the given order.
    ///
    /// URLs beyond capacity are not staged; returns how many were left out.
    pub fn replace_with_remote(&mut self, urls: Vec<String>) -> usize {
        let dropped = urls.len().saturating_sub(self.capacity);
        if dropped > 0 {
            warn!(
                stored = urls.len(),
                capacity = self.capacity,
                "stored gallery is larger than staging capacity, extra images not staged"
            );
        }
        self.entries = urls
            .into_iter()
            .take(self.capacity)
            .map(|url| ImageEntry::Remote { url })
            .collect();
        dropped
    }

    /// Remove and return the pending entries, keeping persisted ones.
    pub fn take_pending(&mut self) -> Vec<ImageEntry> {
        let (pending, kept) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| !e.is_persisted());
        self.entries = kept;
        pending
    }

    /// Attach resolved URLs after a successful save.
    ///
    /// `urls` must be in staging order with one URL per entry. Pending entries
    /// become `Uploaded`, persisted entries are left as they are.
    pub fn mark_uploaded(&mut self, urls: Vec<String>) {
        debug_assert_eq!(urls.len(), self.entries.len());
        let entries = std::mem::take(&mut self.entries);
        self.entries = entries
            .into_iter()
            .zip(urls)
            .map(|(entry, url)| entry.into_uploaded(url))
            .collect();
    }

    /// Turn `Uploaded` entries into plain `Remote` ones, releasing their
    /// previews and payloads.
    pub fn release_uploaded(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        self.entries = entries.into_iter().map(ImageEntry::into_remote).collect();
    }

    /// Whether an entry still holds the preview `id`.
    pub fn holds_preview(&self, id: &Uuid) -> bool {
        self.entries.iter().any(|e| e.preview_id().as_ref() == Some(id))
    }

    /// Drop every entry, releasing all previews.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// URLs of persisted entries, in order.
    pub fn persisted_urls(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|e| e.url().map(str::to_string))
            .collect()
    }

    /// Number of entries still waiting for upload.
    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_persisted()).count()
    }

    pub fn snapshot(&self) -> Vec<EntryView> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| e.view(i))
            .collect()
    }
}
