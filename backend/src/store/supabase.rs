//! Supabase-backed collaborators.
//!
//! One client implements all three seams against a Supabase project:
//!
//! | Seam | Endpoint |
//! |------|----------|
//! | auth | `GET /auth/v1/user` |
//! | blobs | `POST /storage/v1/object/{bucket}/{key}`, public URL `/storage/v1/object/public/{bucket}/{key}` |
//! | rows | PostgREST `/rest/v1/{table}` filtered on `user_id` |
//!
//! The gallery upsert is an update first and an insert only when no row
//! matched; an insert that loses a race to a concurrent first save (409)
//! falls back to one more update.
//!
//! Row and object requests are authorized with the configured key, which
//! must be the project's service role key. With an anon key row level
//! security hides every row, so updates match nothing and inserts are
//! refused.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{AuthProvider, BlobStore, RecordStore, UpsertOutcome};
use crate::config::{SiteDefaults, SupabaseConfig};
use crate::error::{AuthError, AuthResult, RecordError, RecordResult, StorageError, StorageResult};
use crate::models::{AccountId, GalleryRecord};

/// HTTP client for one Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: Client,
    config: SupabaseConfig,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SiteImagesRow {
    #[serde(default)]
    images: Option<Vec<String>>,
}

/// Storage and PostgREST error bodies both carry `message`.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SupabaseClient {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    /// Build from `SUPABASE_*` environment variables.
    pub fn from_env() -> Result<Self, crate::error::ConfigError> {
        Ok(Self::new(SupabaseConfig::from_env()?))
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.url, self.config.bucket, key
        )
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.config.url, self.config.table)
    }

    /// `apikey` plus bearer auth with the service role key.
    fn with_service_auth(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    async fn patch_images(&self, account: &AccountId, images: &[String]) -> RecordResult<u64> {
        let response = self
            .with_service_auth(self.http.patch(self.table_url()))
            .query(&[("user_id", format!("eq.{}", account))])
            .header("Prefer", "return=representation")
            .json(&json!({ "images": images }))
            .send()
            .await
            .map_err(|e| RecordError::Write(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RecordError::Write(e.to_string()))?;
        if !status.is_success() {
            return Err(RecordError::Write(error_message(status, &body)));
        }
        count_rows(&body)
    }

    /// Insert a new site row. `Ok(None)` on a unique-key conflict.
    async fn insert_site(
        &self,
        account: &AccountId,
        images: &[String],
        defaults: &SiteDefaults,
    ) -> RecordResult<Option<u64>> {
        let response = self
            .with_service_auth(self.http.post(self.table_url()))
            .header("Prefer", "return=representation")
            .json(&json!({
                "user_id": account,
                "images": images,
                "partner1_name": defaults.partner1_name,
                "partner2_name": defaults.partner2_name,
                "event_date": defaults.event_date,
                "venue_name": defaults.venue_name,
            }))
            .send()
            .await
            .map_err(|e| RecordError::Write(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RecordError::Write(e.to_string()))?;
        if status == StatusCode::CONFLICT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RecordError::Write(error_message(status, &body)));
        }
        count_rows(&body).map(Some)
    }
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    async fn resolve_account(&self, token: &str) -> AuthResult<Option<AccountId>> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.config.url))
            .header("apikey", &self.config.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;
        if !status.is_success() {
            return Err(AuthError::Provider(error_message(status, &body)));
        }

        let user: AuthUser =
            serde_json::from_str(&body).map_err(|e| AuthError::Provider(e.to_string()))?;
        Ok(AccountId::new(user.id))
    }
}

#[async_trait]
impl BlobStore for SupabaseClient {
    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> StorageResult<()> {
        debug!(key, size = bytes.len(), content_type, "uploading object");
        let response = self
            .with_service_auth(self.http.post(self.object_url(key)))
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Upload(error_message(status, &body)))
    }

    async fn public_url(&self, key: &str) -> StorageResult<String> {
        if key.is_empty() {
            return Ok(String::new());
        }
        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.url, self.config.bucket, key
        ))
    }
}

#[async_trait]
impl RecordStore for SupabaseClient {
    async fn find_gallery(&self, account: &AccountId) -> RecordResult<Option<GalleryRecord>> {
        let response = self
            .with_service_auth(self.http.get(self.table_url()))
            .query(&[
                ("select", "user_id,images".to_string()),
                ("user_id", format!("eq.{}", account)),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| RecordError::Query(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RecordError::Query(e.to_string()))?;
        if !status.is_success() {
            return Err(RecordError::Query(error_message(status, &body)));
        }

        let rows: Vec<SiteImagesRow> =
            serde_json::from_str(&body).map_err(|e| RecordError::Decode(e.to_string()))?;
        Ok(rows.into_iter().next().map(|row| GalleryRecord {
            account_id: account.clone(),
            images: row.images.unwrap_or_default(),
        }))
    }

    async fn upsert_gallery(
        &self,
        account: &AccountId,
        images: &[String],
        defaults: &SiteDefaults,
    ) -> RecordResult<UpsertOutcome> {
        let updated = self.patch_images(account, images).await?;
        if updated > 0 {
            return Ok(UpsertOutcome::updated(updated));
        }

        match self.insert_site(account, images, defaults).await? {
            Some(inserted) => Ok(UpsertOutcome::inserted(inserted)),
            None => {
                warn!(%account, "site row appeared during save, updating instead");
                let updated = self.patch_images(account, images).await?;
                Ok(UpsertOutcome::updated(updated))
            }
        }
    }
}

/// Rows in a `return=representation` body.
fn count_rows(body: &str) -> RecordResult<u64> {
    let rows: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(|e| RecordError::Decode(e.to_string()))?;
    Ok(rows.len() as u64)
}

fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(ApiErrorBody { message: Some(m), .. }) => m,
        Ok(ApiErrorBody { error: Some(e), .. }) => e,
        _ if body.trim().is_empty() => format!("HTTP {}", status),
        _ => format!("HTTP {}: {}", status, body),
    }
}
