//! Local preview references.
//!
//! Every pending image gets a preview so clients can display it before it is
//! uploaded. The registry keeps the bytes addressable by id; a
//! [`PreviewHandle`] owns one registration and releases it when dropped, so
//! removal, replacement and staging teardown all free the resource without a
//! separate cleanup call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::trace;
use uuid::Uuid;

use crate::models::CandidateFile;

/// Scheme prefix of locally generated preview references.
pub const PREVIEW_SCHEME: &str = "blob:";

#[derive(Debug)]
struct PreviewData {
    media_type: String,
    bytes: Arc<[u8]>,
}

type Slots = Mutex<HashMap<Uuid, PreviewData>>;

/// Registry of live previews. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    slots: Arc<Slots>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a preview for `file`.
    pub fn create(&self, file: &CandidateFile) -> PreviewHandle {
        let id = Uuid::new_v4();
        lock(&self.slots).insert(
            id,
            PreviewData {
                media_type: file.media_type.clone(),
                bytes: Arc::clone(&file.bytes),
            },
        );
        trace!(%id, name = %file.name, "preview created");
        PreviewHandle {
            id,
            slots: Arc::downgrade(&self.slots),
        }
    }

    /// Media type and bytes of a live preview.
    pub fn get(&self, id: &Uuid) -> Option<(String, Arc<[u8]>)> {
        lock(&self.slots)
            .get(id)
            .map(|p| (p.media_type.clone(), Arc::clone(&p.bytes)))
    }

    /// Number of previews not yet released.
    pub fn live_count(&self) -> usize {
        lock(&self.slots).len()
    }
}

/// Owned preview registration, released on drop.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    slots: Weak<Slots>,
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Reference string handed to clients (`blob:<uuid>`).
    pub fn reference(&self) -> String {
        format!("{PREVIEW_SCHEME}{}", self.id)
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        if let Some(slots) = self.slots.upgrade() {
            lock(&slots).remove(&self.id);
            trace!(id = %self.id, "preview released");
        }
    }
}

/// Parse the id out of a `blob:<uuid>` reference.
pub fn parse_reference(reference: &str) -> Option<Uuid> {
    reference
        .strip_prefix(PREVIEW_SCHEME)
        .and_then(|id| Uuid::parse_str(id).ok())
}

fn lock(slots: &Slots) -> MutexGuard<'_, HashMap<Uuid, PreviewData>> {
    // Slots hold plain data, a poisoned lock is still consistent.
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> CandidateFile {
        CandidateFile::new(name, "image/png", vec![7u8; 16])
    }

    #[test]
    fn test_handle_releases_on_drop() {
        let registry = PreviewRegistry::new();
        let first = registry.create(&file("a.png"));
        let second = registry.create(&file("b.png"));
        assert_eq!(registry.live_count(), 2);

        let id = first.id();
        drop(first);
        assert_eq!(registry.live_count(), 1);
        assert!(registry.get(&id).is_none());
        assert!(registry.get(&second.id()).is_some());
    }

    #[test]
    fn test_reference_round_trips_to_id() {
        let registry = PreviewRegistry::new();
        let handle = registry.create(&file("a.png"));
        let reference = handle.reference();
        assert!(reference.starts_with("blob:"));
        assert_eq!(parse_reference(&reference), Some(handle.id()));
        assert_eq!(parse_reference("https://cdn/a.png"), None);
    }

    #[test]
    fn test_handle_outliving_registry_is_harmless() {
        let registry = PreviewRegistry::new();
        let handle = registry.create(&file("a.png"));
        drop(registry);
        drop(handle);
    }

    #[test]
    fn test_preview_shares_payload() {
        let registry = PreviewRegistry::new();
        let f = file("a.png");
        let handle = registry.create(&f);
        let (media_type, bytes) = registry.get(&handle.id()).unwrap();
        assert_eq!(media_type, "image/png");
        assert!(Arc::ptr_eq(&bytes, &f.bytes));
    }
}
