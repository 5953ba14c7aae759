//! Headless engine binary for stdin/stdout JSON communication.
//!
//! This binary reads `CommandEnvelope` messages as newline-delimited JSON
//! from stdin, dispatches them through the background service, and writes
//! `ResponseEnvelope` and `EventEnvelope` messages to stdout.
//!
//! All tracing output goes to stderr and a daily-rolling log file so that
//! stdout remains a clean JSON protocol channel.

use std::sync::Arc;

use automator::alarms::{spawn_dispatch, AlarmHandler, AlarmRegistry, ReminderScheduler};
use automator::app_dirs;
use automator::config::AutomatorConfig;
use automator::host::{run_stdio_bridge_with_events, BackgroundService, HostEventSink};
use automator::llm::CompletionClient;
use automator::notify::{Notifier, PendingCopies};
use automator::storage::{FileStorage, StorageArea};
use automator::tasks::TaskStore;
use tokio::sync::broadcast;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const EVENT_CAPACITY: usize = 128;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "automator-host starting"
    );

    let config_path = app_dirs::config_file();
    let config = AutomatorConfig::load_or_default(&config_path)?;
    if !config_path.is_file() {
        // First run: persist the defaults so there is a file to edit.
        match config.save_to_file(&config_path) {
            Ok(()) => {
                tracing::info!(path = %config_path.display(), "wrote default config file");
            }
            Err(e) => tracing::warn!(error = %e, "could not write default config file"),
        }
    }

    let api_key = config.completion.api_key.resolve()?;
    let client = CompletionClient::new(config.completion.base_url.clone(), api_key);

    let storage: Arc<dyn StorageArea> = Arc::new(FileStorage::new(app_dirs::storage_file()));

    let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
    let sink = Arc::new(HostEventSink::new(event_tx.clone()));
    let notifier = Notifier::new(
        sink.clone(),
        sink,
        Arc::new(PendingCopies::new()),
        config.notifications.icon_url.clone(),
    );

    let (registry, fired_rx) = AlarmRegistry::new();
    let scheduler = ReminderScheduler::new(registry);
    let handler = AlarmHandler::new(
        TaskStore::new(storage.clone()),
        scheduler.clone(),
        notifier.clone(),
    );
    let dispatch = spawn_dispatch(handler, fired_rx);

    let service = BackgroundService::new(
        storage,
        scheduler,
        notifier,
        client,
        config,
        config_path,
        event_tx.clone(),
    );

    match service.rearm_alarms().await {
        Ok(count) => tracing::info!(alarms = count, "re-armed task alarms"),
        Err(e) => tracing::warn!(error = %e, "could not re-arm task alarms"),
    }

    run_stdio_bridge_with_events(service, event_tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "automator-host exited with error");
            anyhow::anyhow!("automator-host failed: {e}")
        })?;

    dispatch.abort();
    tracing::info!("automator-host shut down cleanly");
    Ok(())
}

/// Initialise tracing with a stderr layer plus a daily-rolling file layer
/// under the logs directory. A missing or unwritable log directory
/// downgrades to stderr-only logging.
fn init_tracing() -> Option<WorkerGuard> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("automator-host")
        .filename_suffix("log")
        .build(app_dirs::logs_dir());

    let (file_layer, guard) = match appender {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("automator-host: log file unavailable ({e}), logging to stderr only");
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}
