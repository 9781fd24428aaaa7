//! Module declarations
//!
//! - config:     Environment-driven process configuration (§3, §6).
//! - schema:     Wire shape of a normalised trade (§4.A).
//! - util:       Shared helpers (time, market keys, price formatting).
//! - metrics:    Lock-free runtime counters, read by the State Watcher.
//! - exchanges:  Adapter trait and per-venue implementations (§4.B).
//! - bus:        The Trade Bus (§4.C).
//! - store:      Time-Series Store adapter (§4.D).
//! - market:     Per-Market State owned by the ingestion task.
//! - ingestion:  The Ingestion Engine (§4.E).
//! - signal:     The Signal Evaluator (§4.F).
//! - notifier:   The Notifier Adapter (§4.G).
//! - watcher:    The State Watcher (§4.H).
//! - collector:  Per-venue connection lifecycle runtime (§4.B, §5).
mod bus;
mod collector;
mod config;
mod exchanges;
mod ingestion;
mod market;
mod metrics;
mod notifier;
mod schema;
mod signal;
mod store;
mod util;
mod watcher;

use std::process::ExitCode;

use rustls::crypto::{ring, CryptoProvider};
use tokio::sync::watch;

use config::Config;
use exchanges::get_adapter;
use notifier::Notifier;
use store::Store;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    // rustls >= 0.23 requires an explicit CryptoProvider installation,
    // exactly once, as early as possible in the process lifecycle.
    if CryptoProvider::install_default(ring::default_provider()).is_err() {
        log::error!("failed to install rustls crypto provider");
        return ExitCode::FAILURE;
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("configuration error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let store = match Store::connect(&config.redis_uri).await {
        Ok(store) => store,
        Err(err) => {
            log::error!("cannot reach time-series store: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = run(config, store).await {
        log::error!("fatal error: {err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn run(config: Config, store: Store) -> anyhow::Result<()> {
    let http = reqwest::Client::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (bus_tx, bus_rx) = bus::new_bus();

    let mut collectors = Vec::new();
    for name in &config.exchanges {
        let Some(adapter) = get_adapter(name) else {
            log::warn!("'{name}' is not a supported exchange, skipping");
            continue;
        };
        log::info!("starting {name} collector");

        let handle = tokio::spawn(collector::runner::run_collector(
            adapter,
            http.clone(),
            bus_tx.clone(),
            shutdown_rx.clone(),
        ));
        collectors.push(handle);
    }

    let notifier = Notifier::new(http.clone(), config.bot_api_key.clone(), config.target_ids.clone());

    let ingestion_handle = tokio::spawn(ingestion::run(
        bus_rx,
        bus_tx.clone(),
        store,
        notifier,
        config,
        shutdown_rx.clone(),
    ));

    let watcher_handle = tokio::spawn(watcher::run(bus_tx, shutdown_rx.clone()));

    wait_for_shutdown_signal().await;
    log::info!("shutdown signal received, stopping tasks");
    let _ = shutdown_tx.send(true);

    for handle in collectors {
        let _ = handle.await;
    }
    let _ = ingestion_handle.await;
    let _ = watcher_handle.await;

    Ok(())
}

/// Waits for SIGINT or, on Unix, SIGTERM. Either is a clean shutdown
/// request per §6's exit-code contract.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
