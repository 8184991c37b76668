//! Per-account gallery session.
//!
//! The session owns the staging list and is what a view forwards intents to:
//! account changes, adding files, removing an entry and saving. Every
//! operation reports through the session's notifier and none of them panic
//! on collaborator failures.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::GalleryContext;
use crate::error::{SaveError, SaveResult, StagingError};
use crate::fetch::{fetch_gallery, FetchOutcome};
use crate::models::{AccountId, CandidateFile, EntryView, ImageEntry};
use crate::notify::Notifier;
use crate::save::{save_gallery, SaveReport};
use crate::staging::StagingList;
use crate::validation::{validate_candidates, ValidationSummary};

/// Staging state for one signed-in (or anonymous) user.
pub struct GallerySession {
    ctx: GalleryContext,
    account: Option<AccountId>,
    /// Account whose gallery the staging list holds.
    staged_for: Option<AccountId>,
    /// Account whose stored gallery was fetched successfully.
    loaded_for: Option<AccountId>,
    staging: StagingList,
    notifier: Notifier,
}

impl GallerySession {
    /// An anonymous session with empty staging.
    pub fn new(ctx: GalleryContext) -> Self {
        let staging = StagingList::new(ctx.config.max_images);
        let notifier = ctx.notifier.clone();
        Self {
            ctx,
            account: None,
            staged_for: None,
            loaded_for: None,
            staging,
            notifier,
        }
    }

    /// Session for `account`, seeded from its stored gallery.
    pub async fn open(ctx: GalleryContext, account: AccountId) -> Self {
        let mut session = Self::new(ctx);
        session.set_account(Some(account)).await;
        session
    }

    pub fn account(&self) -> Option<&AccountId> {
        self.account.as_ref()
    }

    /// Whether the current account's stored gallery has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.account.is_some() && self.loaded_for == self.account
    }

    pub fn staging(&self) -> &StagingList {
        &self.staging
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn snapshot(&self) -> Vec<EntryView> {
        self.staging.snapshot()
    }

    /// Whether the preview `id` belongs to one of this session's entries.
    pub fn holds_preview(&self, id: &Uuid) -> bool {
        self.staging.holds_preview(id)
    }

    /// React to an auth change.
    ///
    /// Switching to a different account drops the previous account's staging
    /// and fetches the new one's gallery. Signing out keeps staging. A failed
    /// fetch is retried on the next call for the same account; files staged
    /// in the meantime are kept after the stored images.
    /// Returns the fetch outcome when a fetch ran and succeeded.
    pub async fn set_account(&mut self, account: Option<AccountId>) -> Option<FetchOutcome> {
        self.account = account;
        let account = self.account.clone()?;
        if self.loaded_for.as_ref() == Some(&account) {
            return None;
        }

        let retrying = self.staged_for.as_ref() == Some(&account);
        if !retrying {
            if self.staged_for.is_some() {
                self.staging.clear();
            }
            self.staged_for = Some(account.clone());
            self.loaded_for = None;
            self.notifier = self.ctx.notifier.for_account(&account);
        }

        let pending = if retrying {
            self.staging.take_pending()
        } else {
            Vec::new()
        };

        let result = fetch_gallery(
            self.ctx.records.as_ref(),
            &account,
            &mut self.staging,
            &self.notifier,
        )
        .await;
        self.restage(pending);

        match result {
            Ok(outcome) => {
                self.loaded_for = Some(account);
                Some(outcome)
            }
            Err(e) => {
                warn!(%account, "gallery fetch failed: {e}");
                None
            }
        }
    }

    /// Put pending entries back after the stored ones, as far as they fit.
    fn restage(&mut self, mut pending: Vec<ImageEntry>) {
        let room = self.staging.remaining();
        if pending.len() > room {
            self.notifier.warning(format!(
                "{} new image(s) no longer fit in the gallery and were removed",
                pending.len() - room
            ));
            pending.truncate(room);
        }
        if let Err(e) = self.staging.append(pending) {
            warn!("staging refused pending files: {e}");
        }
    }

    /// Validate `files` and stage the accepted ones.
    pub fn add_files(&mut self, files: Vec<CandidateFile>) -> ValidationSummary {
        let outcome = validate_candidates(
            files,
            self.staging.len(),
            &self.ctx.config,
            &self.ctx.previews,
            &self.notifier,
        );
        let summary = outcome.summary();
        if let Err(e) = self.staging.append(outcome.accepted) {
            // Validation never accepts past capacity
            warn!("staging refused validated files: {e}");
        }
        debug!(staged = self.staging.len(), "files added");
        summary
    }

    /// Remove the entry at `index` and return the updated list.
    pub fn remove(&mut self, index: usize) -> Result<Vec<EntryView>, StagingError> {
        match self.staging.remove(index) {
            Ok(removed) => {
                drop(removed);
                Ok(self.staging.snapshot())
            }
            Err(e) => {
                self.notifier.error(e.to_string());
                Err(e)
            }
        }
    }

    /// Upload pending photos and store the gallery.
    ///
    /// Refused while the account's stored gallery has not been loaded, since
    /// the write replaces the whole stored list.
    pub async fn save(&mut self) -> SaveResult<SaveReport> {
        if self.account.is_some() {
            self.set_account(self.account.clone()).await;
            if !self.is_loaded() {
                let err = SaveError::GalleryNotLoaded;
                self.notifier.error(err.to_string());
                return Err(err);
            }
        }

        self.staging.release_uploaded();
        save_gallery(
            &self.ctx,
            self.account.as_ref(),
            &mut self.staging,
            &self.notifier,
        )
        .await
    }

    /// Drop the local payloads of entries uploaded by the last save.
    pub fn release_uploaded(&mut self) {
        self.staging.release_uploaded();
    }
}
