//! Save orchestration: upload pending photos, then store the URL list.
//!
//! ```text
//! staging ──▶ [keep URL | upload + resolve URL] ──▶ ordered URLs ──▶ upsert record ──▶ mark uploaded
//! ```
//!
//! Uploads run up to `upload_concurrency` at a time and are reassembled in
//! staging order. Any failure aborts the save, leaves staging untouched and
//! produces one error notification. Blobs uploaded before a failure are not
//! removed.

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::context::GalleryContext;
use crate::error::{SaveError, SaveResult};
use crate::models::{AccountId, CandidateFile, ImageEntry};
use crate::notify::Notifier;
use crate::staging::StagingList;
use crate::store::{BlobStore, UpsertAction};

const KEY_SUFFIX_LEN: usize = 6;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Summary of a successful save.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    /// Stored URL list, in staging order
    pub images: Vec<String>,
    /// Files uploaded by this save
    pub uploaded: usize,
    /// Entries that were already persisted
    pub kept: usize,
    /// Whether the record was created or updated
    pub action: UpsertAction,
}

enum UploadJob {
    Keep(String),
    Upload(CandidateFile),
}

/// Save `staging` for `account`, notifying the outcome either way.
pub async fn save_gallery(
    ctx: &GalleryContext,
    account: Option<&AccountId>,
    staging: &mut StagingList,
    notifier: &Notifier,
) -> SaveResult<SaveReport> {
    match run_save(ctx, account, staging).await {
        Ok(report) => {
            notifier.success("Gallery saved successfully!");
            Ok(report)
        }
        Err(e) => {
            notifier.error(e.to_string());
            Err(e)
        }
    }
}

async fn run_save(
    ctx: &GalleryContext,
    account: Option<&AccountId>,
    staging: &mut StagingList,
) -> SaveResult<SaveReport> {
    let account = account.ok_or(SaveError::Unauthenticated)?;
    if staging.is_empty() && ctx.config.require_images {
        return Err(SaveError::NothingToSave);
    }

    let jobs: Vec<UploadJob> = staging
        .entries()
        .iter()
        .map(|entry| match entry {
            ImageEntry::Local { file, .. } => UploadJob::Upload(file.clone()),
            ImageEntry::Remote { url } | ImageEntry::Uploaded { url, .. } => {
                UploadJob::Keep(url.clone())
            }
        })
        .collect();
    let uploaded = jobs
        .iter()
        .filter(|job| matches!(job, UploadJob::Upload(_)))
        .count();
    let kept = jobs.len() - uploaded;
    info!(%account, uploaded, kept, "saving gallery");

    let blobs = ctx.blobs.as_ref();
    let images: Vec<String> = stream::iter(jobs)
        .map(|job| async move {
            match job {
                UploadJob::Keep(url) => Ok(url),
                UploadJob::Upload(file) => upload_file(blobs, account, &file).await,
            }
        })
        .buffered(ctx.config.upload_concurrency.max(1))
        .try_collect()
        .await?;

    let outcome = ctx
        .records
        .upsert_gallery(account, &images, &ctx.config.site_defaults)
        .await?;
    if outcome.rows == 0 {
        return Err(match outcome.action {
            UpsertAction::Updated => SaveError::UpdateFailed,
            UpsertAction::Inserted => SaveError::InsertFailed,
        });
    }
    debug!(%account, action = ?outcome.action, rows = outcome.rows, "gallery record stored");

    staging.mark_uploaded(images.clone());
    Ok(SaveReport {
        images,
        uploaded,
        kept,
        action: outcome.action,
    })
}

async fn upload_file(
    blobs: &dyn BlobStore,
    account: &AccountId,
    file: &CandidateFile,
) -> SaveResult<String> {
    let failed = |reason: String| SaveError::UploadFailed {
        file: file.name.clone(),
        reason,
    };

    let key = storage_key(account, file);
    debug!(key = %key, size = file.size(), "uploading");
    blobs
        .upload(&key, &file.bytes, &file.media_type)
        .await
        .map_err(|e| failed(e.to_string()))?;

    let url = blobs
        .public_url(&key)
        .await
        .map_err(|e| failed(e.to_string()))?;
    if url.trim().is_empty() {
        return Err(failed("no public URL returned".to_string()));
    }
    Ok(url)
}

/// Key for a new upload: `{account}/{unix_millis}_{suffix}.{ext}`.
pub fn storage_key(account: &AccountId, file: &CandidateFile) -> String {
    let suffix = random_suffix(&mut rand::thread_rng());
    build_storage_key(account, Utc::now().timestamp_millis(), &suffix, &file.extension())
}

fn build_storage_key(account: &AccountId, millis: i64, suffix: &str, extension: &str) -> String {
    format!("{}/{}_{}.{}", account, millis, suffix, extension)
}

fn random_suffix(rng: &mut impl Rng) -> String {
    (0..KEY_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}
