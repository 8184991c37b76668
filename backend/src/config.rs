//! Gallery configuration.
//!
//! Defaults live in constants; every value can be overridden from the
//! environment (a `.env` file is loaded first when present).
//!
//! | Variable | Default |
//! |----------|---------|
//! | `GALLERY_MAX_IMAGES` | 7 |
//! | `GALLERY_MAX_FILE_SIZE` | 26214400 (25 MiB) |
//! | `GALLERY_ALLOWED_TYPES` | `image/jpeg,image/png,image/jpg,image/webp` |
//! | `GALLERY_REQUIRE_IMAGES` | `true` |
//! | `GALLERY_UPLOAD_CONCURRENCY` | 3 |
//! | `GALLERY_MAX_BATCH_FILES` | 14 |
//! | `GALLERY_SESSION_IDLE_SECS` | 1800 |
//! | `SUPABASE_URL` | required |
//! | `SUPABASE_KEY` | required, service role key |
//! | `SUPABASE_BUCKET` | `wedding-photos` |
//! | `SUPABASE_TABLE` | `wedding_sites` |

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};

/// Maximum number of images in one gallery.
pub const MAX_IMAGES: usize = 7;

/// Maximum size of one image (25 MiB).
pub const MAX_FILE_SIZE: u64 = 25 * 1024 * 1024;

/// Media types accepted by the validation unit.
pub const ALLOWED_FILE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/jpg", "image/webp"];

/// Uploads in flight during one save.
pub const UPLOAD_CONCURRENCY: usize = 3;

/// Files accepted in one add request.
pub const MAX_BATCH_FILES: usize = 2 * MAX_IMAGES;

/// Seconds an unused server session is kept before eviction.
pub const SESSION_IDLE_SECS: u64 = 30 * 60;

/// Buffered notifications per subscriber.
pub const NOTIFICATION_CAPACITY: usize = 100;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Storage bucket holding gallery photos.
pub const DEFAULT_BUCKET: &str = "wedding-photos";

/// Table holding one wedding site row per account.
pub const DEFAULT_TABLE: &str = "wedding_sites";

/// Placeholder attributes written when a gallery save creates the site row.
///
/// They only satisfy non-null columns shared with the wedding details form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDefaults {
    pub partner1_name: String,
    pub partner2_name: String,
    pub event_date: String,
    pub venue_name: String,
}

impl Default for SiteDefaults {
    fn default() -> Self {
        Self {
            partner1_name: "Partner 1".to_string(),
            partner2_name: "Partner 2".to_string(),
            event_date: "TBD".to_string(),
            venue_name: "TBD".to_string(),
        }
    }
}

/// Rules and tuning for the gallery flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryConfig {
    /// Staging capacity
    pub max_images: usize,
    /// Largest accepted file in bytes
    pub max_file_size: u64,
    /// Accepted media types (lowercase)
    pub allowed_types: Vec<String>,
    /// Refuse to save an empty gallery
    pub require_images: bool,
    /// Uploads in flight during one save (1 = sequential)
    pub upload_concurrency: usize,
    /// Files read from one add request
    pub max_batch_files: usize,
    /// Idle seconds before a server session is evicted
    pub session_idle_secs: u64,
    /// Notification channel size
    pub notification_capacity: usize,
    /// Placeholders for a freshly created site row
    pub site_defaults: SiteDefaults,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            max_images: MAX_IMAGES,
            max_file_size: MAX_FILE_SIZE,
            allowed_types: ALLOWED_FILE_TYPES.iter().map(|t| t.to_string()).collect(),
            require_images: true,
            upload_concurrency: UPLOAD_CONCURRENCY,
            max_batch_files: MAX_BATCH_FILES,
            session_idle_secs: SESSION_IDLE_SECS,
            notification_capacity: NOTIFICATION_CAPACITY,
            site_defaults: SiteDefaults::default(),
        }
    }
}

impl GalleryConfig {
    /// Load from `GALLERY_*` variables, falling back to defaults.
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let defaults = Self::default();

        let allowed_types = match var(&lookup, "GALLERY_ALLOWED_TYPES") {
            Some(raw) => parse_type_list(&raw),
            None => defaults.allowed_types,
        };
        if allowed_types.is_empty() {
            return Err(ConfigError::Invalid {
                key: "GALLERY_ALLOWED_TYPES".to_string(),
                value: String::new(),
                message: "at least one media type is required".to_string(),
            });
        }

        let config = Self {
            max_images: try_load(&lookup, "GALLERY_MAX_IMAGES", defaults.max_images)?,
            max_file_size: try_load(&lookup, "GALLERY_MAX_FILE_SIZE", defaults.max_file_size)?,
            allowed_types,
            require_images: try_load(&lookup, "GALLERY_REQUIRE_IMAGES", defaults.require_images)?,
            upload_concurrency: try_load(
                &lookup,
                "GALLERY_UPLOAD_CONCURRENCY",
                defaults.upload_concurrency,
            )?
            .max(1),
            max_batch_files: try_load(&lookup, "GALLERY_MAX_BATCH_FILES", defaults.max_batch_files)?
                .max(1),
            session_idle_secs: try_load(
                &lookup,
                "GALLERY_SESSION_IDLE_SECS",
                defaults.session_idle_secs,
            )?,
            notification_capacity: defaults.notification_capacity,
            site_defaults: defaults.site_defaults,
        };
        Ok(config)
    }

    /// Whether `media_type` is one of the allowed types.
    ///
    /// Comparison ignores case and any `;` parameters.
    pub fn is_allowed_type(&self, media_type: &str) -> bool {
        let normalized = normalize_media_type(media_type);
        self.allowed_types.iter().any(|t| *t == normalized)
    }

    /// Max file size in whole MiB, for messages.
    pub fn max_file_size_mib(&self) -> u64 {
        self.max_file_size / (1024 * 1024)
    }
}

/// Connection settings for the Supabase project backing auth, rows and blobs.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Service role key, sent as `apikey` and as the bearer token.
    ///
    /// Row and object writes are made on behalf of already resolved accounts,
    /// so the key must bypass row level security. An anon key makes every
    /// update match zero rows.
    pub api_key: String,
    /// Storage bucket
    pub bucket: String,
    /// Wedding site table
    pub table: String,
}

impl SupabaseConfig {
    /// Load from `SUPABASE_*` variables. URL and key are required.
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let url = var(&lookup, "SUPABASE_URL")
            .ok_or_else(|| ConfigError::Missing("SUPABASE_URL".into()))?;
        let api_key = var(&lookup, "SUPABASE_KEY")
            .ok_or_else(|| ConfigError::Missing("SUPABASE_KEY".into()))?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            api_key,
            bucket: var(&lookup, "SUPABASE_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            table: var(&lookup, "SUPABASE_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
        })
    }
}

/// Lowercase, trim and strip parameters from a media type.
pub fn normalize_media_type(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn parse_type_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(normalize_media_type)
        .filter(|t| !t.is_empty())
        .collect()
}

fn var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> ConfigResult<T>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(lookup, key) {
        Some(raw) => {
            let value = raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                key: key.to_string(),
                value: raw.clone(),
                message: e.to_string(),
            })?;
            info!("{key} set to {value}");
            Ok(value)
        }
        None => {
            debug!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
