use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use voice_vault::{
    create_router, display_id, format_elapsed, format_file_size, AppState, CaptureDeviceFactory,
    CaptureSource, Config, FileCatalog, FsObjectStore, RecordingSession, UploadCoordinator,
};

#[derive(Parser)]
#[command(name = "voice-vault")]
#[command(about = "Record short audio clips and manage them in an object store")]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/voice-vault")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve,

    /// Capture a recording from a .webm file and upload it
    Record {
        /// File replayed as capture input
        #[arg(short, long)]
        input: PathBuf,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Also keep a local copy in this directory
        #[arg(long)]
        save_dir: Option<PathBuf>,
    },

    /// List stored recordings
    List,

    /// Delete a stored recording
    Delete {
        /// Object key
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config))?;

    info!("Voice Vault v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let store = Arc::new(
        FsObjectStore::open(cfg.storage_root(), cfg.signed_urls())
            .await
            .context("Failed to open object store")?,
    );

    match cli.command {
        Command::Serve => serve(&cfg, store).await,
        Command::Record {
            input,
            duration,
            save_dir,
        } => record(&cfg, store, input, duration, save_dir).await,
        Command::List => list(store).await,
        Command::Delete { key } => {
            let catalog = FileCatalog::new(store);
            catalog.delete(&key).await?;
            println!("Deleted {}", key);
            Ok(())
        }
    }
}

async fn serve(cfg: &Config, store: Arc<FsObjectStore>) -> Result<()> {
    let mut state = AppState::with_fs_store(store, cfg.session());
    state.capture_config = cfg.capture();
    state.retention = cfg.session_retention();
    let reaper = state.spawn_session_reaper(cfg.session_sweep_interval());

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);

    let served = axum::serve(listener, create_router(state))
        .await
        .context("HTTP server failed");
    reaper.abort();
    served
}

async fn record(
    cfg: &Config,
    store: Arc<FsObjectStore>,
    input: PathBuf,
    duration: Option<u64>,
    save_dir: Option<PathBuf>,
) -> Result<()> {
    let mut session = RecordingSession::new(cfg.session(), UploadCoordinator::new(store));
    let device = CaptureDeviceFactory::create(CaptureSource::File(input), cfg.capture());

    session.start(device).await?;

    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut shown_secs = 0;

    // Only fragment delivery runs inside the select; stop and upload below
    // must not be cancelled by the deadline or Ctrl-C.
    loop {
        tokio::select! {
            _ = until(deadline) => {
                info!("Requested duration reached");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
            live = session.process_next_event() => {
                if !live {
                    break;
                }
            }
        }

        let elapsed = session.elapsed_secs();
        if elapsed != shown_secs {
            shown_secs = elapsed;
            info!("Recording {}", format_elapsed(elapsed));
        }
    }

    let failure = session.stop().await.err();

    if let Some(dir) = save_dir {
        let path = session.save_local(&dir).await?;
        println!("Saved local copy: {}", path.display());
    }

    if let Some(e) = failure {
        warn!("Recording was not stored; use --save-dir to keep a local copy");
        return Err(e.into());
    }

    if !session.state().is_terminal() {
        bail!(
            "Recording session {} ended in state {} without being stored",
            session.id(),
            session.state()
        );
    }

    let status = session.status();
    if let Some(stored) = status.stored {
        println!(
            "Stored {} ({}, {}) after {}",
            stored.key,
            display_id(&stored.key),
            format_file_size(stored.size),
            status.elapsed_display
        );
    }

    Ok(())
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn list(store: Arc<FsObjectStore>) -> Result<()> {
    let catalog = FileCatalog::new(store);
    let entries = catalog.refresh().await?;
    let stats = catalog.stats();

    if entries.is_empty() {
        println!("No recordings found.");
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{}  {:>10}  {}\n    {}",
            entry.display_id,
            format_file_size(entry.object.size),
            entry.object.key,
            entry.signed_url
        );
    }
    println!(
        "{} recordings, {} total",
        stats.count,
        format_file_size(stats.total_size)
    );

    Ok(())
}
