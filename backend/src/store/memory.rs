//! In-process collaborators.
//!
//! Used by tests and by `serve --in-memory`. Call counters and failure
//! switches let tests observe exactly which network calls a flow would make.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::{AuthProvider, BlobStore, RecordStore, UpsertOutcome};
use crate::config::SiteDefaults;
use crate::error::{AuthResult, RecordError, RecordResult, StorageError, StorageResult};
use crate::models::{AccountId, GalleryRecord};

// =============================================================================
// Auth
// =============================================================================

/// Token table, or trust-any-token mode for local development.
#[derive(Debug, Default)]
pub struct InMemoryAuth {
    tokens: HashMap<String, AccountId>,
    trust_tokens: bool,
}

impl InMemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat every non-blank token as the account id itself.
    pub fn trusting() -> Self {
        Self {
            tokens: HashMap::new(),
            trust_tokens: true,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>, account: AccountId) -> Self {
        self.tokens.insert(token.into(), account);
        self
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuth {
    async fn resolve_account(&self, token: &str) -> AuthResult<Option<AccountId>> {
        if let Some(account) = self.tokens.get(token) {
            return Ok(Some(account.clone()));
        }
        if self.trust_tokens {
            return Ok(AccountId::new(token));
        }
        Ok(None)
    }
}

// =============================================================================
// Blob Store
// =============================================================================

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Object map keyed by storage key.
#[derive(Debug)]
pub struct InMemoryBlobStore {
    base_url: String,
    objects: Mutex<HashMap<String, StoredObject>>,
    upload_calls: AtomicUsize,
    url_calls: AtomicUsize,
    /// 1-based upload call that fails; 0 disables
    fail_on_upload: AtomicUsize,
    empty_urls: AtomicBool,
}

impl InMemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
            upload_calls: AtomicUsize::new(0),
            url_calls: AtomicUsize::new(0),
            fail_on_upload: AtomicUsize::new(0),
            empty_urls: AtomicBool::new(false),
        }
    }

    /// Make the `call`-th upload (1-based) fail.
    pub fn fail_on_upload(&self, call: usize) {
        self.fail_on_upload.store(call, Ordering::SeqCst);
    }

    /// Resolve every key to an empty URL.
    pub fn return_empty_urls(&self, enabled: bool) {
        self.empty_urls.store(enabled, Ordering::SeqCst);
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn url_calls(&self) -> usize {
        self.url_calls.load(Ordering::SeqCst)
    }

    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().await.get(key).cloned()
    }

    /// Storage key behind one of this store's public URLs.
    pub fn key_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.base_url.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new("memory://wedding-photos")
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> StorageResult<()> {
        let call = self.upload_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on_upload.load(Ordering::SeqCst) {
            return Err(StorageError::Upload("injected upload failure".to_string()));
        }

        let mut objects = self.objects.lock().await;
        if objects.contains_key(key) {
            return Err(StorageError::Upload("The resource already exists".to_string()));
        }
        objects.insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                bytes: bytes.to_vec(),
            },
        );
        Ok(())
    }

    async fn public_url(&self, key: &str) -> StorageResult<String> {
        self.url_calls.fetch_add(1, Ordering::SeqCst);
        if self.empty_urls.load(Ordering::SeqCst) {
            return Ok(String::new());
        }
        Ok(format!("{}/{}", self.base_url, key))
    }
}

// =============================================================================
// Record Store
// =============================================================================

/// A stored wedding site row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRow {
    pub images: Vec<String>,
    pub details: SiteDefaults,
}

/// Wedding site rows keyed by account.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    rows: Mutex<HashMap<AccountId, SiteRow>>,
    find_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    zero_rows: AtomicBool,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row directly.
    pub async fn insert_row(&self, account: AccountId, row: SiteRow) {
        self.rows.lock().await.insert(account, row);
    }

    pub async fn row(&self, account: &AccountId) -> Option<SiteRow> {
        self.rows.lock().await.get(account).cloned()
    }

    pub async fn row_count(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub fn fail_reads(&self, enabled: bool) {
        self.fail_reads.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, enabled: bool) {
        self.fail_writes.store(enabled, Ordering::SeqCst);
    }

    /// Pretend writes matched no rows (e.g. a row-level policy filtered them).
    pub fn report_zero_rows(&self, enabled: bool) {
        self.zero_rows.store(enabled, Ordering::SeqCst);
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find_gallery(&self, account: &AccountId) -> RecordResult<Option<GalleryRecord>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RecordError::Query("injected read failure".to_string()));
        }
        Ok(self.rows.lock().await.get(account).map(|row| GalleryRecord {
            account_id: account.clone(),
            images: row.images.clone(),
        }))
    }

    async fn upsert_gallery(
        &self,
        account: &AccountId,
        images: &[String],
        defaults: &SiteDefaults,
    ) -> RecordResult<UpsertOutcome> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RecordError::Write("injected write failure".to_string()));
        }

        let mut rows = self.rows.lock().await;
        let zero_rows = self.zero_rows.load(Ordering::SeqCst);
        match rows.get_mut(account) {
            Some(_) if zero_rows => Ok(UpsertOutcome::updated(0)),
            Some(row) => {
                row.images = images.to_vec();
                Ok(UpsertOutcome::updated(1))
            }
            None if zero_rows => Ok(UpsertOutcome::inserted(0)),
            None => {
                rows.insert(
                    account.clone(),
                    SiteRow {
                        images: images.to_vec(),
                        details: defaults.clone(),
                    },
                );
                Ok(UpsertOutcome::inserted(1))
            }
        }
    }
}
