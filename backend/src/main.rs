//! Wedding Gallery CLI - stage and sync wedding site photos
//!
//! # Main Commands
//!
//! ```bash
//! wedding-gallery serve                          # Start HTTP server (port 3000)
//! wedding-gallery serve --in-memory              # Server with in-process stores
//! wedding-gallery upload --account <id> a.jpg    # Add photos to an account's gallery
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! wedding-gallery check a.jpg b.png              # Run the local file checks only
//! wedding-gallery fetch --account <id>           # Print the stored gallery
//! ```
//!
//! `serve` (without `--in-memory`), `fetch` and `upload` read the Supabase
//! project from `SUPABASE_URL` / `SUPABASE_KEY`.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wedding_gallery::config::DEFAULT_PORT;
use wedding_gallery::{
    fetch_gallery, notify::drain, server, validate_candidates, AccountId, CandidateFile,
    GalleryConfig, GalleryContext, GallerySession, InMemoryAuth, Notification,
    NotificationLevel, Notifier, PreviewRegistry, StagingList, SupabaseClient,
};

#[derive(Parser)]
#[command(name = "wedding-gallery")]
#[command(about = "Validate, stage and upload wedding site photos", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Use in-process stores and accept any bearer token as the account id
        #[arg(long)]
        in_memory: bool,
    },

    /// Check image files against the gallery rules without uploading
    Check {
        /// Image files, in gallery order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show an account's stored gallery
    Fetch {
        /// Account (user) id
        #[arg(short, long)]
        account: String,
    },

    /// Add image files to an account's gallery and save it
    Upload {
        /// Account (user) id
        #[arg(short, long)]
        account: String,

        /// Image files, in gallery order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { port, in_memory } => cmd_serve(port, in_memory).await,
        Commands::Check { files } => cmd_check(&files).await,
        Commands::Fetch { account } => cmd_fetch(&account).await,
        Commands::Upload { account, files } => cmd_upload(&account, &files).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_serve(port: u16, in_memory: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = GalleryConfig::from_env()?;

    let state = if in_memory {
        eprintln!("🧪 Using in-memory stores (any bearer token is accepted as the account id)");
        server::AppState::new(
            GalleryContext::in_memory(config),
            Arc::new(InMemoryAuth::trusting()),
        )
    } else {
        let client = SupabaseClient::from_env()?;
        eprintln!("🔗 Supabase project: {}", client.config().url);
        let auth = Arc::new(client.clone());
        server::AppState::new(GalleryContext::supabase(config, client), auth)
    };

    server::start_server(port, state).await?;
    Ok(())
}

async fn cmd_check(paths: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    let config = GalleryConfig::from_env()?;
    eprintln!("✔️  Checking {} file(s)", paths.len());

    let files = read_files(paths).await?;
    let previews = PreviewRegistry::new();
    let notifier = Notifier::new(config.notification_capacity);
    let outcome = validate_candidates(files, 0, &config, &previews, &notifier);

    for entry in &outcome.accepted {
        if let Some(file) = entry.file() {
            eprintln!("   ✅ {} ({} bytes, {})", file.name, file.size(), file.media_type);
        }
    }
    for rejection in &outcome.rejected {
        eprintln!("   ❌ {}", rejection);
    }

    eprintln!(
        "\n📊 Results: {} accepted, {} rejected",
        outcome.accepted_count(),
        outcome.rejected.len()
    );

    if !outcome.rejected.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

async fn cmd_fetch(account: &str) -> Result<(), Box<dyn std::error::Error>> {
    let account = parse_account(account)?;
    let ctx = supabase_context()?;
    eprintln!("📥 Fetching gallery for {}", account);

    let mut staging = StagingList::new(ctx.config.max_images);
    let notifier = ctx.notifier.for_account(&account);
    fetch_gallery(ctx.records.as_ref(), &account, &mut staging, &notifier).await?;

    if staging.is_empty() {
        eprintln!("   (no stored images)");
    }
    for (i, url) in staging.persisted_urls().iter().enumerate() {
        println!("{}. {}", i + 1, url);
    }

    Ok(())
}

async fn cmd_upload(account: &str, paths: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    let account = parse_account(account)?;
    let ctx = supabase_context()?;
    let mut rx = ctx.notifier.subscribe();

    eprintln!("📄 Reading {} file(s)", paths.len());
    let files = read_files(paths).await?;

    let mut session = GallerySession::open(ctx, account).await;
    eprintln!("   Stored images: {}", session.staging().len());

    let summary = session.add_files(files);
    eprintln!("   Staged: {} new", summary.accepted);

    let result = session.save().await;
    for entry in drain(&mut rx) {
        print_notification(&entry);
    }
    let report = result?;

    eprintln!(
        "\n📦 Gallery: {} image(s), {} uploaded, {} kept ({:?})",
        report.images.len(),
        report.uploaded,
        report.kept,
        report.action
    );
    for (i, url) in report.images.iter().enumerate() {
        println!("{}. {}", i + 1, url);
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

fn parse_account(raw: &str) -> Result<AccountId, Box<dyn std::error::Error>> {
    AccountId::new(raw).ok_or_else(|| "Account id must not be blank".into())
}

fn supabase_context() -> Result<GalleryContext, Box<dyn std::error::Error>> {
    let config = GalleryConfig::from_env()?;
    let client = SupabaseClient::from_env()?;
    Ok(GalleryContext::supabase(config, client))
}

async fn read_files(paths: &[PathBuf]) -> Result<Vec<CandidateFile>, Box<dyn std::error::Error>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(read_file(path).await?);
    }
    Ok(files)
}

async fn read_file(path: &Path) -> Result<CandidateFile, Box<dyn std::error::Error>> {
    CandidateFile::from_path(path)
        .await
        .map_err(|e| format!("Cannot read {}: {}", path.display(), e).into())
}

fn print_notification(entry: &Notification) {
    let icon = match entry.level {
        NotificationLevel::Info => "ℹ️ ",
        NotificationLevel::Success => "✅",
        NotificationLevel::Warning => "⚠️ ",
        NotificationLevel::Error => "❌",
    };
    eprintln!("   {} {}", icon, entry.message);
}
