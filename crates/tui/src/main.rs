mod app;
mod block_font;

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    sync::Arc,
};

use bannerwatch_core::{
    api::ApiClient,
    config::{self, AppConfig},
    i18n::Translator,
    refresh::{Backoff, RefreshPolicy, RefreshScheduler},
    snapshot::{HashGate, SnapshotCache, SnapshotStore},
    time::{SystemClock, TimeSource},
};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging()?;

    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    info!(base_url = %config.api.base_url, "configuration loaded");

    let cache = SnapshotCache::new(&config.cache_root);
    let store = match cache.load() {
        Ok(Some(envelope)) => {
            info!(hash = %envelope.data_hash, "restored cached snapshot");
            SnapshotStore::with_snapshot(envelope)
        }
        Ok(None) => SnapshotStore::new(),
        Err(err) => {
            warn!(?err, path = %cache.path().display(), "ignoring unreadable snapshot cache");
            SnapshotStore::new()
        }
    };

    let api = ApiClient::new(&config)?;
    let clock: Arc<dyn TimeSource> = Arc::new(SystemClock);
    let scheduler = RefreshScheduler::new(
        Arc::new(api.clone()),
        HashGate::new(store.clone()),
        Arc::clone(&clock),
        RefreshPolicy::from_config(&config),
        Backoff::from_config(&config),
    )
    .with_cache(cache);

    let (command_tx, command_rx) = mpsc::channel(8);
    let (sync_tx, sync_rx) = mpsc::channel(32);
    let scheduler_task = tokio::spawn(async move {
        if let Err(err) = scheduler.run(command_rx, sync_tx).await {
            tracing::error!("refresh scheduler error: {err}");
        }
    });

    let mut app = app::BannerApp::new(
        store,
        api,
        clock,
        command_tx,
        Translator::new(config.ui.locale),
        config.tick_interval(),
    );
    app.attach_sync(sync_rx);
    let result = app.run().await;

    drop(app);
    if let Err(err) = scheduler_task.await {
        warn!(?err, "refresh scheduler task did not finish cleanly");
    }
    result
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("bannerwatch.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
