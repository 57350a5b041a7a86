//! CueDeck Player - cue playback service
//!
//! Loads configuration, wires the cue store, backends, speech engines and
//! volume control into the orchestrator, and serves the control API.

use anyhow::{Context, Result};
use clap::Parser;
use cuedeck_common::events::EventBus;
use cuedeck_player::api::{self, AppContext};
use cuedeck_player::backend::{
    BackendSet, FolderLibrary, LocalLibraryBackend, SimulatedTransport, StreamingBackend,
};
use cuedeck_player::config::{Config, ConfigOverrides};
use cuedeck_player::playback::{self, Collaborators, SharedVolume};
use cuedeck_player::speech::{
    CloudSpeechProvider, GenerationQuota, HttpSpeechClient, OnDeviceSpeech, SimulatedVoiceOutput,
    SpeechCache, SpeechProvider, SpeechRouter,
};
use cuedeck_player::store::{CueStore, InMemoryCueStore, SqliteCueStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "cuedeck-player")]
#[command(about = "Cue playback service for CueDeck")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "CUEDECK_PORT")]
    port: Option<u16>,

    /// Cue database path
    #[arg(short, long, env = "CUEDECK_DATABASE")]
    database: Option<PathBuf>,

    /// Root folder holding the cue database, media and speech cache
    #[arg(short, long)]
    root_folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = cuedeck_common::config::resolve_config_path(args.config.as_deref())
        .context("Failed to locate configuration file")?;
    let config = Config::load(
        config_path.as_deref(),
        ConfigOverrides {
            database_path: args.database.clone(),
            port: args.port,
            root_folder: args.root_folder.clone(),
        },
    )
    .await
    .context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("cuedeck_player={},tower_http=debug", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CueDeck Player on port {}", config.port);
    info!("Root folder: {}", config.root_folder.display());
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    let store = open_store(&config).await?;
    let backends = build_backends(&config);
    let (speech, quota) = build_speech(&config).await;
    let volume = SharedVolume::new(1.0);
    let events = EventBus::new(256);

    let orchestrator = playback::spawn(
        Collaborators {
            store: store.clone(),
            backends: backends.clone(),
            speech,
            voice: Arc::new(SimulatedVoiceOutput::new()),
            volume: Arc::new(volume),
            events,
        },
        config.playback.clone(),
    );
    info!("Orchestrator initialized");

    let ctx = AppContext {
        orchestrator,
        store,
        backends,
        quota,
    };

    api::run(config.port, ctx, shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn open_store(config: &Config) -> Result<Arc<dyn CueStore>> {
    if config.database_path.exists() {
        let store = SqliteCueStore::open(&config.database_path)
            .await
            .with_context(|| format!("Failed to open cue database {:?}", config.database_path))?;
        info!("Cue database: {}", config.database_path.display());
        Ok(Arc::new(store))
    } else {
        warn!(
            "Cue database {:?} not found, starting with an empty cue list",
            config.database_path
        );
        Ok(Arc::new(InMemoryCueStore::new()))
    }
}

fn build_backends(config: &Config) -> BackendSet {
    let tuning = &config.playback;
    let local = LocalLibraryBackend::new(
        Arc::new(SimulatedTransport::new("local").connected()),
        Arc::new(FolderLibrary::new(config.root_folder.clone())),
    );
    let streaming = StreamingBackend::new(
        Arc::new(SimulatedTransport::new("streaming")),
        tuning.connect_timeout(),
        tuning.connect_poll(),
    );
    BackendSet { local, streaming }
}

/// Cloud speech is enabled only when the API key variable is set
async fn build_speech(config: &Config) -> (SpeechRouter, Option<Arc<GenerationQuota>>) {
    let on_device: Arc<dyn SpeechProvider> = Arc::new(OnDeviceSpeech::new());

    let api_key = std::env::var(&config.speech.api_key_env)
        .ok()
        .filter(|k| !k.trim().is_empty());
    let Some(api_key) = api_key else {
        info!(
            "{} not set, announcements use the on-device voice",
            config.speech.api_key_env
        );
        return (SpeechRouter::new(None, on_device), None);
    };

    let client = match HttpSpeechClient::new(&config.speech.api_base_url, api_key) {
        Ok(client) => client,
        Err(e) => {
            warn!("Cloud speech disabled: {}", e);
            return (SpeechRouter::new(None, on_device), None);
        }
    };

    let quota = Arc::new(GenerationQuota::load(config.quota_path(), config.speech.monthly_quota).await);
    let cache = SpeechCache::new(config.speech.cache_dir.clone(), config.speech.cache_version);
    let cloud: Arc<dyn SpeechProvider> =
        Arc::new(CloudSpeechProvider::new(Arc::new(client), cache, quota.clone()));
    info!("Cloud speech enabled ({})", config.speech.api_base_url);

    (SpeechRouter::new(Some(cloud), on_device), Some(quota))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
