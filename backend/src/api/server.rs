//! HTTP server for the gallery API.
//!
//! The server keeps one [`GallerySession`] per signed-in account. A session
//! is created (and its stored gallery fetched) on the account's first
//! request, and every later request for that account runs under the
//! session's lock, so adds, removals and saves never interleave. Sessions
//! unused for `session_idle_secs` are dropped, releasing their previews.
//!
//! # API Endpoints
//!
//! | Method | Path                          | Description                          |
//! |--------|-------------------------------|--------------------------------------|
//! | GET    | `/health`                     | Health check                         |
//! | GET    | `/api/gallery`                | Current staging list                 |
//! | POST   | `/api/gallery/images`         | Add files (multipart `file` fields)  |
//! | DELETE | `/api/gallery/images/{index}` | Remove one staged entry              |
//! | POST   | `/api/gallery/save`           | Upload pending files, store gallery  |
//! | GET    | `/api/previews/{id}`          | Bytes of a live local preview        |
//! | GET    | `/api/notifications`          | SSE stream of notifications          |
//!
//! The caller is identified by `Authorization: Bearer <token>`, or by an
//! `access_token` query parameter for the SSE stream and previews. A preview
//! is only served to the account whose staging list holds it.

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{header, HeaderMap, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Sse},
    routing::{delete, get, post},
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    convert::Infallible,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::{
    api_error, save_status, staging_status, AddImagesResponse, ApiError, GalleryResponse,
    SaveResponse,
};
use crate::context::GalleryContext;
use crate::error::ServerResult;
use crate::models::{AccountId, CandidateFile};
use crate::session::GallerySession;
use crate::store::AuthProvider;

struct SessionSlot {
    session: Arc<Mutex<GallerySession>>,
    last_used: Instant,
}

type SessionMap = HashMap<AccountId, SessionSlot>;

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    ctx: GalleryContext,
    auth: Arc<dyn AuthProvider>,
    sessions: Arc<Mutex<SessionMap>>,
    idle_timeout: Duration,
}

impl AppState {
    pub fn new(ctx: GalleryContext, auth: Arc<dyn AuthProvider>) -> Self {
        let idle_timeout = Duration::from_secs(ctx.config.session_idle_secs);
        Self {
            ctx,
            auth,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout,
        }
    }

    pub fn context(&self) -> &GalleryContext {
        &self.ctx
    }

    /// Account behind the request's token, if any.
    async fn resolve(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<Option<AccountId>, ApiError> {
        let Some(token) = bearer_token(headers).or(query_token) else {
            return Ok(None);
        };
        self.auth.resolve_account(token).await.map_err(|e| {
            warn!("auth provider failed: {e}");
            api_error(StatusCode::BAD_GATEWAY, &e.to_string())
        })
    }

    async fn require_account(&self, headers: &HeaderMap) -> Result<AccountId, ApiError> {
        self.resolve(headers, None).await?.ok_or_else(|| {
            api_error(StatusCode::UNAUTHORIZED, "You must be signed in to manage images")
        })
    }

    /// Lock the account's session, creating and seeding it on first use.
    async fn session(&self, account: &AccountId) -> OwnedMutexGuard<GallerySession> {
        let session = {
            let mut sessions = self.sessions.lock().await;
            evict_idle(&mut sessions, self.idle_timeout);
            let slot = sessions.entry(account.clone()).or_insert_with(|| SessionSlot {
                session: Arc::new(Mutex::new(GallerySession::new(self.ctx.clone()))),
                last_used: Instant::now(),
            });
            slot.last_used = Instant::now();
            slot.session.clone()
        };
        let mut guard = session.lock_owned().await;
        // No-op once the account's gallery has been fetched
        guard.set_account(Some(account.clone())).await;
        guard
    }
}

/// Drop sessions idle for longer than `idle` that no request is holding.
fn evict_idle(sessions: &mut SessionMap, idle: Duration) {
    let before = sessions.len();
    sessions.retain(|_, slot| {
        slot.last_used.elapsed() < idle || Arc::strong_count(&slot.session) > 1
    });
    let evicted = before - sessions.len();
    if evicted > 0 {
        debug!(evicted, remaining = sessions.len(), "idle sessions dropped");
    }
}

/// Build the router with CORS.
///
/// The add route reads its multipart body field by field, so it is exempt
/// from the default body limit.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/gallery", get(get_gallery))
        .route(
            "/api/gallery/images",
            post(add_images).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/gallery/images/{index}", delete(remove_image))
        .route("/api/gallery/save", post(save_gallery))
        .route("/api/previews/{id}", get(get_preview))
        .route("/api/notifications", get(sse_notifications))
        .layer(cors)
        .with_state(state)
}

/// Bind `port` on all interfaces and serve until shutdown.
pub async fn start_server(port: u16, state: AppState) -> ServerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    println!("🚀 Wedding gallery server running on http://localhost:{}", port);
    println!("   GET    /api/gallery               - Staged images");
    println!("   POST   /api/gallery/images        - Add photos");
    println!("   DELETE /api/gallery/images/{{i}}    - Remove a photo");
    println!("   POST   /api/gallery/save          - Save gallery");
    println!("   GET    /api/notifications         - SSE notifications");
    println!("   GET    /health                    - Health check");

    serve(listener, state).await
}

/// Serve on an already bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> ServerResult<()> {
    info!(addr = ?listener.local_addr().ok(), "gallery server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<Value> {
    let config = &state.ctx.config;
    Json(json!({
        "status": "ok",
        "service": "wedding-gallery",
        "version": env!("CARGO_PKG_VERSION"),
        "limits": {
            "maxImages": config.max_images,
            "maxFileSize": config.max_file_size,
            "allowedTypes": config.allowed_types,
        }
    }))
}

/// Staging list of the caller; empty for anonymous callers.
async fn get_gallery(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<GalleryResponse>, ApiError> {
    match state.resolve(&headers, None).await? {
        Some(account) => {
            let session = state.session(&account).await;
            Ok(Json(GalleryResponse::from_session(&session)))
        }
        None => {
            let session = GallerySession::new(state.ctx.clone());
            Ok(Json(GalleryResponse::from_session(&session)))
        }
    }
}

/// Validate uploaded files and stage the accepted ones.
async fn add_images(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<AddImagesResponse>, ApiError> {
    let account = state.require_account(&headers).await?;
    let config = state.ctx.config.clone();

    let mut files = Vec::new();
    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        api_error(StatusCode::BAD_REQUEST, &format!("Multipart error: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        if files.len() == config.max_batch_files {
            return Err(api_error(
                StatusCode::PAYLOAD_TOO_LARGE,
                &format!("You can add at most {} files at once", config.max_batch_files),
            ));
        }
        let name = field.file_name().unwrap_or("unnamed").to_string();
        let media_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| mime_guess::from_path(&name).first_or_octet_stream().to_string());
        let (bytes, size) = read_field(&mut field, config.max_file_size).await.map_err(|e| {
            api_error(StatusCode::BAD_REQUEST, &format!("Read error: {}", e))
        })?;
        debug!(%name, %media_type, size, "received file");
        files.push(CandidateFile::new(name, media_type, bytes));
    }

    if files.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No file provided"));
    }

    let mut session = state.session(&account).await;
    let summary = session.add_files(files);
    Ok(Json(AddImagesResponse {
        accepted: summary.accepted,
        rejected: summary.rejected.into_iter().map(Into::into).collect(),
        gallery: GalleryResponse::from_session(&session),
    }))
}

/// Read one multipart field, keeping at most `limit + 1` bytes.
///
/// The rest of an oversized field is drained and discarded; the kept bytes
/// are still enough for validation to reject the file as too large.
/// Returns the kept bytes and the full field size.
async fn read_field(field: &mut Field<'_>, limit: u64) -> Result<(Vec<u8>, u64), MultipartError> {
    let keep = usize::try_from(limit).unwrap_or(usize::MAX).saturating_add(1);
    let mut bytes = Vec::new();
    let mut size = 0u64;
    while let Some(chunk) = field.chunk().await? {
        size += chunk.len() as u64;
        if bytes.len() < keep {
            let take = (keep - bytes.len()).min(chunk.len());
            bytes.extend_from_slice(&chunk[..take]);
        }
    }
    Ok((bytes, size))
}

/// Remove the entry at `index`.
async fn remove_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(index): Path<usize>,
) -> Result<Json<GalleryResponse>, ApiError> {
    let account = state.require_account(&headers).await?;
    let mut session = state.session(&account).await;
    session
        .remove(index)
        .map_err(|e| api_error(staging_status(&e), &e.to_string()))?;
    Ok(Json(GalleryResponse::from_session(&session)))
}

/// Upload pending files and store the gallery.
async fn save_gallery(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SaveResponse>, ApiError> {
    let mut session = match state.resolve(&headers, None).await? {
        Some(account) => SessionGuard::Account(state.session(&account).await),
        // Anonymous callers get the signed-out outcome from the save flow
        None => SessionGuard::Anonymous(Box::new(GallerySession::new(state.ctx.clone()))),
    };

    let session = session.session_mut();
    match session.save().await {
        Ok(report) => {
            let response = SaveResponse::new(report, session);
            session.release_uploaded();
            Ok(Json(response))
        }
        Err(e) => Err(api_error(save_status(&e), &e.to_string())),
    }
}

enum SessionGuard {
    Account(OwnedMutexGuard<GallerySession>),
    Anonymous(Box<GallerySession>),
}

impl SessionGuard {
    fn session_mut(&mut self) -> &mut GallerySession {
        match self {
            Self::Account(guard) => &mut **guard,
            Self::Anonymous(session) => &mut **session,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenParams {
    access_token: Option<String>,
}

/// Serve a live preview's bytes to the account that staged it.
async fn get_preview(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(params): Query<TokenParams>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .resolve(&headers, params.access_token.as_deref())
        .await?
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "You must be signed in to view previews"))?;
    let not_found = || api_error(StatusCode::NOT_FOUND, "Preview not found");

    let session = state.session(&account).await;
    if !session.holds_preview(&id) {
        return Err(not_found());
    }
    let (media_type, bytes) = state.ctx.previews.get(&id).ok_or_else(not_found)?;
    Ok(([(header::CONTENT_TYPE, media_type)], bytes.to_vec()))
}

/// SSE endpoint for the caller's notifications.
///
/// Signed-in callers see their account's notifications; anonymous callers
/// see only unscoped ones.
async fn sse_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TokenParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let account = state
        .resolve(&headers, params.access_token.as_deref())
        .await?;
    let rx = state.ctx.notifier.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(entry) if entry.account == account => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        _ => None,
    });

    Ok(Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GalleryConfig, SiteDefaults};
    use crate::preview::PreviewRegistry;
    use crate::store::memory::SiteRow;
    use crate::store::{InMemoryAuth, InMemoryBlobStore, InMemoryRecordStore};
    use reqwest::multipart::{Form, Part};

    struct Harness {
        base: String,
        http: reqwest::Client,
        blobs: Arc<InMemoryBlobStore>,
        records: Arc<InMemoryRecordStore>,
        previews: PreviewRegistry,
    }

    async fn spawn() -> Harness {
        spawn_with(GalleryConfig::default()).await
    }

    async fn spawn_with(config: GalleryConfig) -> Harness {
        let blobs = Arc::new(InMemoryBlobStore::default());
        let records = Arc::new(InMemoryRecordStore::new());
        let ctx = GalleryContext::new(config, blobs.clone(), records.clone());
        let previews = ctx.previews.clone();
        let auth = InMemoryAuth::new()
            .with_token("tok-a", AccountId::new("acct-a").unwrap())
            .with_token("tok-b", AccountId::new("acct-b").unwrap());
        let state = AppState::new(ctx, Arc::new(auth));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state));

        Harness {
            base: format!("http://{}", addr),
            http: reqwest::Client::new(),
            blobs,
            records,
            previews,
        }
    }

    impl Harness {
        async fn gallery(&self, token: &str) -> GalleryResponse {
            self.http
                .get(format!("{}/api/gallery", self.base))
                .bearer_auth(token)
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap()
        }

        async fn add(&self, token: &str, form: Form) -> reqwest::Response {
            self.http
                .post(format!("{}/api/gallery/images", self.base))
                .bearer_auth(token)
                .multipart(form)
                .send()
                .await
                .unwrap()
        }

        async fn save(&self, token: &str) -> reqwest::Response {
            self.http
                .post(format!("{}/api/gallery/save", self.base))
                .bearer_auth(token)
                .send()
                .await
                .unwrap()
        }
    }

    fn image_form(files: &[(&str, &str)]) -> Form {
        files.iter().fold(Form::new(), |form, (name, mime)| {
            let part = Part::bytes(vec![0xFFu8; 64])
                .file_name(name.to_string())
                .mime_str(mime)
                .unwrap();
            form.part("file", part)
        })
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));
        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, "Bearer   ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn test_health() {
        let h = spawn().await;
        let body: Value = h
            .http
            .get(format!("{}/health", h.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["limits"]["maxImages"], 7);
    }

    #[tokio::test]
    async fn test_add_save_and_refetch() {
        let h = spawn().await;

        let added: AddImagesResponse = h
            .http
            .post(format!("{}/api/gallery/images", h.base))
            .bearer_auth("tok-a")
            .multipart(image_form(&[
                ("a.jpg", "image/jpeg"),
                ("notes.pdf", "application/pdf"),
                ("b.png", "image/png"),
            ]))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(added.accepted, 2);
        assert_eq!(added.rejected.len(), 1);
        assert_eq!(added.rejected[0].name, "notes.pdf");
        assert_eq!(added.gallery.pending, 2);
        assert!(added.gallery.images[0].preview.starts_with("/api/previews/"));

        let preview = h
            .http
            .get(format!("{}{}", h.base, added.gallery.images[0].preview))
            .bearer_auth("tok-a")
            .send()
            .await
            .unwrap();
        assert_eq!(preview.status(), StatusCode::OK);
        assert_eq!(preview.headers()[header::CONTENT_TYPE], "image/jpeg");

        let saved = h
            .http
            .post(format!("{}/api/gallery/save", h.base))
            .bearer_auth("tok-a")
            .send()
            .await
            .unwrap();
        assert_eq!(saved.status(), StatusCode::OK);
        let saved: SaveResponse = saved.json().await.unwrap();
        assert_eq!(saved.images.len(), 2);
        assert_eq!(saved.uploaded, 2);
        assert_eq!(saved.action, "inserted");
        assert_eq!(saved.gallery.pending, 0);
        assert_eq!(h.blobs.object_count().await, 2);

        let account = AccountId::new("acct-a").unwrap();
        let row = h.records.row(&account).await.unwrap();
        assert_eq!(row.images, saved.images);

        let listed: GalleryResponse = h
            .http
            .get(format!("{}/api/gallery", h.base))
            .bearer_auth("tok-a")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed.images.len(), 2);
        assert_eq!(h.records.find_calls(), 1);
    }

    #[tokio::test]
    async fn test_previews_are_served_to_their_owner_only() {
        let h = spawn().await;
        let added: AddImagesResponse = h
            .add("tok-a", image_form(&[("a.jpg", "image/jpeg")]))
            .await
            .json()
            .await
            .unwrap();
        let url = format!("{}{}", h.base, added.gallery.images[0].preview);

        let anonymous = h.http.get(&url).send().await.unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let other = h.http.get(&url).bearer_auth("tok-b").send().await.unwrap();
        assert_eq!(other.status(), StatusCode::NOT_FOUND);

        let owner = h
            .http
            .get(format!("{}?access_token=tok-a", url))
            .send()
            .await
            .unwrap();
        assert_eq!(owner.status(), StatusCode::OK);
        assert_eq!(owner.bytes().await.unwrap().len(), 64);
    }

    #[tokio::test]
    async fn test_save_releases_previews() {
        let h = spawn().await;
        let added: AddImagesResponse = h
            .add("tok-a", image_form(&[("a.jpg", "image/jpeg")]))
            .await
            .json()
            .await
            .unwrap();
        let url = format!("{}{}", h.base, added.gallery.images[0].preview);
        assert_eq!(h.previews.live_count(), 1);

        let saved: SaveResponse = h.save("tok-a").await.json().await.unwrap();
        assert_eq!(saved.gallery.images[0].state, crate::models::EntryState::Uploaded);
        assert_eq!(h.previews.live_count(), 0);

        let gone = h.http.get(&url).bearer_auth("tok-a").send().await.unwrap();
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);

        let listed = h.gallery("tok-a").await;
        assert_eq!(listed.images[0].state, crate::models::EntryState::Persisted);
        assert_eq!(listed.images[0].preview, saved.images[0]);
    }

    #[tokio::test]
    async fn test_idle_sessions_are_evicted() {
        let h = spawn_with(GalleryConfig {
            session_idle_secs: 0,
            ..GalleryConfig::default()
        })
        .await;
        h.add("tok-a", image_form(&[("a.jpg", "image/jpeg")])).await;
        assert_eq!(h.previews.live_count(), 1);

        h.gallery("tok-b").await;
        assert_eq!(h.previews.live_count(), 0);

        let reloaded = h.gallery("tok-a").await;
        assert!(reloaded.images.is_empty());
        assert_eq!(h.records.find_calls(), 3);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_retried_on_next_request() {
        let h = spawn().await;
        let account = AccountId::new("acct-a").unwrap();
        let stored: Vec<String> = (1..=4).map(|i| format!("https://cdn/u{i}.jpg")).collect();
        h.records
            .insert_row(
                account.clone(),
                SiteRow { images: stored.clone(), details: SiteDefaults::default() },
            )
            .await;

        h.records.fail_reads(true);
        assert!(h.gallery("tok-a").await.images.is_empty());
        let refused = h.save("tok-a").await;
        assert_eq!(refused.status(), StatusCode::SERVICE_UNAVAILABLE);

        h.records.fail_reads(false);
        assert_eq!(h.gallery("tok-a").await.images.len(), 4);

        h.add("tok-a", image_form(&[("new.jpg", "image/jpeg")])).await;
        let saved = h.save("tok-a").await;
        assert_eq!(saved.status(), StatusCode::OK);

        let row = h.records.row(&account).await.unwrap();
        assert_eq!(row.images.len(), 5);
        assert_eq!(&row.images[..4], &stored[..]);
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected_on_its_own() {
        let h = spawn_with(GalleryConfig {
            max_images: 2,
            max_file_size: 1024,
            ..GalleryConfig::default()
        })
        .await;
        let big = Part::bytes(vec![0u8; 2 * 1024 * 1024])
            .file_name("big.jpg")
            .mime_str("image/jpeg")
            .unwrap();
        let form = image_form(&[("small.jpg", "image/jpeg")]).part("file", big);

        let response = h.add("tok-a", form).await;
        assert_eq!(response.status(), StatusCode::OK);
        let added: AddImagesResponse = response.json().await.unwrap();
        assert_eq!(added.accepted, 1);
        assert_eq!(added.rejected.len(), 1);
        assert_eq!(added.rejected[0].name, "big.jpg");
        assert!(added.rejected[0].reason.contains("exceeds the maximum file size"));
    }

    #[tokio::test]
    async fn test_batch_file_count_is_bounded() {
        let h = spawn_with(GalleryConfig {
            max_batch_files: 2,
            ..GalleryConfig::default()
        })
        .await;
        let form = image_form(&[
            ("a.jpg", "image/jpeg"),
            ("b.jpg", "image/jpeg"),
            ("c.jpg", "image/jpeg"),
        ]);

        let response = h.add("tok-a", form).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(h.previews.live_count(), 0);
    }

    #[tokio::test]
    async fn test_anonymous_save_is_unauthorized() {
        let h = spawn().await;
        let response = h
            .http
            .post(format!("{}/api/gallery/save", h.base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "You must be signed in to save images");
        assert_eq!(h.blobs.upload_calls(), 0);
        assert_eq!(h.records.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_save_is_bad_request() {
        let h = spawn().await;
        let response = h
            .http
            .post(format!("{}/api/gallery/save", h.base))
            .bearer_auth("tok-b")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "No images to save");
    }

    #[tokio::test]
    async fn test_remove_out_of_range() {
        let h = spawn().await;
        let response = h
            .http
            .delete(format!("{}/api/gallery/images/3", h.base))
            .bearer_auth("tok-a")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_add_requires_sign_in() {
        let h = spawn().await;
        let response = h
            .http
            .post(format!("{}/api/gallery/images", h.base))
            .multipart(image_form(&[("a.jpg", "image/jpeg")]))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let h = spawn().await;
        h.http
            .post(format!("{}/api/gallery/images", h.base))
            .bearer_auth("tok-a")
            .multipart(image_form(&[("a.jpg", "image/jpeg")]))
            .send()
            .await
            .unwrap();

        let other: GalleryResponse = h
            .http
            .get(format!("{}/api/gallery", h.base))
            .bearer_auth("tok-b")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(other.images.is_empty());
        assert_eq!(other.account.as_deref(), Some("acct-b"));
    }

    #[tokio::test]
    async fn test_notifications_stream_is_scoped() {
        let h = spawn().await;
        let mut stream = h
            .http
            .get(format!("{}/api/notifications?access_token=tok-a", h.base))
            .send()
            .await
            .unwrap();
        assert_eq!(stream.status(), StatusCode::OK);

        // Another account's rejection must not reach this stream
        h.http
            .post(format!("{}/api/gallery/images", h.base))
            .bearer_auth("tok-b")
            .multipart(image_form(&[("other.gif", "image/gif")]))
            .send()
            .await
            .unwrap();
        h.http
            .post(format!("{}/api/gallery/images", h.base))
            .bearer_auth("tok-a")
            .multipart(image_form(&[("mine.gif", "image/gif")]))
            .send()
            .await
            .unwrap();

        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.chunk())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = String::from_utf8_lossy(&chunk);
        assert!(text.contains("mine.gif is not a supported image format"));
        assert!(!text.contains("other.gif"));
    }
}
