//! REST API types for the gallery view.
//!
//! Every response carries the full staging snapshot so the client can
//! re-render without a second request.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{SaveError, StagingError};
use crate::models::EntryView;
use crate::preview::parse_reference;
use crate::save::SaveReport;
use crate::session::GallerySession;
use crate::validation::RejectedFile;

/// Current staging list of the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryResponse {
    /// Account the list belongs to
    pub account: Option<String>,

    /// Staged entries in display order
    pub images: Vec<EntryView>,

    /// Maximum number of images
    pub capacity: usize,

    /// Slots still free
    pub remaining: usize,

    /// Entries awaiting upload
    pub pending: usize,
}

impl GalleryResponse {
    pub fn from_session(session: &GallerySession) -> Self {
        let staging = session.staging();
        Self {
            account: session.account().map(|a| a.to_string()),
            images: staging.snapshot().into_iter().map(with_preview_route).collect(),
            capacity: staging.capacity(),
            remaining: staging.remaining(),
            pending: staging.pending_count(),
        }
    }
}

/// Point local previews at the preview endpoint.
fn with_preview_route(mut view: EntryView) -> EntryView {
    if let Some(id) = parse_reference(&view.preview) {
        view.preview = format!("/api/previews/{}", id);
    }
    view
}

/// Result of adding a batch of files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddImagesResponse {
    /// Files staged from this batch
    pub accepted: usize,

    /// Refused files with the reason shown to the user
    pub rejected: Vec<RejectedFileView>,

    /// Staging after the batch
    pub gallery: GalleryResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedFileView {
    pub name: String,
    pub reason: String,
}

impl From<RejectedFile> for RejectedFileView {
    fn from(r: RejectedFile) -> Self {
        Self {
            name: r.name,
            reason: r.reason,
        }
    }
}

/// Result of a successful save.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    /// "saved"
    pub status: String,

    /// Stored URL list
    pub images: Vec<String>,

    /// Files uploaded by this save
    pub uploaded: usize,

    /// Already persisted entries carried over
    pub kept: usize,

    /// "inserted" or "updated"
    pub action: String,

    pub gallery: GalleryResponse,
}

impl SaveResponse {
    pub fn new(report: SaveReport, session: &GallerySession) -> Self {
        let action = serde_json::to_value(report.action)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        Self {
            status: "saved".to_string(),
            images: report.images,
            uploaded: report.uploaded,
            kept: report.kept,
            action,
            gallery: GalleryResponse::from_session(session),
        }
    }
}

/// Error body shared by every endpoint.
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

/// Handler error type.
pub type ApiError = (StatusCode, axum::Json<Value>);

pub fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, axum::Json(error_response(message)))
}

/// HTTP status for a failed save.
pub fn save_status(error: &SaveError) -> StatusCode {
    match error {
        SaveError::Unauthenticated => StatusCode::UNAUTHORIZED,
        SaveError::NothingToSave => StatusCode::BAD_REQUEST,
        SaveError::GalleryNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
        SaveError::UploadFailed { .. }
        | SaveError::UpdateFailed
        | SaveError::InsertFailed
        | SaveError::Record(_) => StatusCode::BAD_GATEWAY,
    }
}

/// HTTP status for a staging failure.
pub fn staging_status(error: &StagingError) -> StatusCode {
    match error {
        StagingError::OutOfRange { .. } => StatusCode::NOT_FOUND,
        StagingError::CapacityExceeded { .. } => StatusCode::CONFLICT,
    }
}
