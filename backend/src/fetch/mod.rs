//! Seed the staging list from the account's stored gallery.

use tracing::debug;

use crate::error::FetchError;
use crate::models::AccountId;
use crate::notify::Notifier;
use crate::staging::StagingList;
use crate::store::RecordStore;

/// What a fetch did to staging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Staging replaced with this many persisted entries.
    Loaded(usize),
    /// No stored gallery, staging left empty.
    Empty,
}

/// Query the account's record once and seed `staging` from it.
///
/// On failure a notification is emitted and staging is left as it was; the
/// error is returned for logging only.
pub async fn fetch_gallery(
    records: &dyn RecordStore,
    account: &AccountId,
    staging: &mut StagingList,
    notifier: &Notifier,
) -> Result<FetchOutcome, FetchError> {
    match records.find_gallery(account).await {
        Ok(Some(record)) => {
            let stored = record.images.len();
            let dropped = staging.replace_with_remote(record.images);
            if dropped > 0 {
                notifier.warning(format!(
                    "Only the first {} of {} stored images were loaded; saving will keep only these",
                    staging.len(),
                    stored
                ));
            }
            debug!(%account, images = staging.len(), "gallery loaded");
            Ok(FetchOutcome::Loaded(staging.len()))
        }
        Ok(None) => {
            debug!(%account, "no stored gallery");
            Ok(FetchOutcome::Empty)
        }
        Err(e) => {
            notifier.error("Failed to load existing images");
            Err(e.into())
        }
    }
}
