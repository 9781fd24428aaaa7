//! Ingestion Engine (§4.E): the single cooperative consumer over the
//! Trade Bus. Owns Per-Market State exclusively — no locking required.

use std::sync::atomic::Ordering;

use tokio::sync::watch;

use crate::bus::{self, TradeReceiver, TradeSender};
use crate::config::Config;
use crate::market::MarketTable;
use crate::metrics::METRICS;
use crate::notifier::Notifier;
use crate::signal;
use crate::store::Store;
use crate::util;

/// Signal Series retention, fixed at 24h regardless of configured
/// look-backs (§4.E).
const SIGNAL_SERIES_RETENTION_MS: i64 = 24 * 60 * 60 * 1000;

/// Lower bound for the Price Series retention window trimmed on each
/// pass, expressed from "now" backwards (§4.E: "bounded below by 24h").
const RETENTION_FLOOR_MS: i64 = 24 * 60 * 60 * 1000;
const SIGNAL_RETENTION_FLOOR_MS: i64 = 7 * 24 * 60 * 60 * 1000;

pub async fn run(
    mut rx: TradeReceiver,
    tx: TradeSender,
    store: Store,
    notifier: Notifier,
    config: Config,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut markets = MarketTable::new();

    loop {
        tokio::select! {
            batch = rx.recv() => {
                let Some(batch) = batch else { return };
                process_batch(&mut markets, &tx, &store, &notifier, &config, batch).await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    // Buffered trades are dropped by contract (§5).
                    return;
                }
            }
        }
    }
}

async fn process_batch(
    markets: &mut MarketTable,
    tx: &TradeSender,
    store: &Store,
    notifier: &Notifier,
    config: &Config,
    batch: crate::schema::TradeBatch,
) {
    let m = bus::backpressure_multiplier(bus::queue_depth(tx));
    let mut last_touched: Option<String> = None;

    for tick in &batch.data {
        let market_key = util::market_key(&batch.exchange, &tick.s);
        let price: f64 = match tick.p.parse() {
            Ok(p) => p,
            Err(_) => {
                METRICS.parse_errors.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };

        if !markets.contains_key(&market_key) {
            if let Err(err) = init_market(store, &market_key, config).await {
                log::warn!("failed to initialise market {market_key}: {err:#}");
                METRICS.store_errors.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            markets.insert(market_key.clone(), Default::default());
            METRICS.tracked_markets.store(markets.len(), Ordering::Relaxed);
        }

        let state = markets.get_mut(&market_key).expect("just inserted");

        if should_dedupe(state, price, tick.t, m) {
            METRICS.trades_deduped.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        if let Err(err) = store.add_point(&market_key, tick.t, price).await {
            log::warn!("failed to persist point for {market_key}: {err:#}");
            METRICS.store_errors.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        state.saved_ts = tick.t;
        state.price = price;
        state.timestamp_ms = tick.t;
        METRICS.trades_ingested.fetch_add(1, Ordering::Relaxed);
        last_touched = Some(market_key);
    }

    if let Some(market_key) = last_touched {
        evaluate_and_notify(markets, store, notifier, config, &market_key, m).await;
        trim_retention(markets, store, config, &market_key).await;
    }
}

async fn init_market(store: &Store, market_key: &str, config: &Config) -> anyhow::Result<()> {
    store.create_series(market_key, config.max_period_ms()).await?;
    let signals_key = format!("{market_key}_signals");
    store.create_series(&signals_key, SIGNAL_SERIES_RETENTION_MS).await?;
    Ok(())
}

/// Dedupe rule (§4.E): skip if the price is unchanged, the timestamp is
/// unchanged, or a point for this market was persisted within the last
/// `m` (back-pressure-widened) seconds.
fn should_dedupe(state: &crate::market::MarketState, price: f64, t: i64, m: f64) -> bool {
    if state.saved_ts == 0 {
        return false;
    }
    if price == state.price {
        return true;
    }
    if t == state.saved_ts {
        return true;
    }
    let now_ms = util::now_ms();
    let window_ms = (m * 1000.0) as i64;
    state.saved_ts > now_ms - window_ms
}

async fn evaluate_and_notify(
    markets: &mut MarketTable,
    store: &Store,
    notifier: &Notifier,
    config: &Config,
    market_key: &str,
    m: f64,
) {
    let now_secs = util::now_secs();
    let guard_window = m.max(1.0);

    let state = markets.get_mut(market_key).expect("market tracked before evaluation");
    if state.check_ts > now_secs - guard_window {
        return;
    }
    state.check_ts = now_secs;

    let alerts = match signal::evaluate(store, market_key, &config.signal_thresholds, config.price_subsets).await {
        Ok(alerts) => alerts,
        Err(err) => {
            log::warn!("signal evaluation failed for {market_key}: {err:#}");
            METRICS.store_errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    for alert in &alerts {
        match alert.kind {
            crate::notifier::AlertKind::New => METRICS.signals_new.fetch_add(1, Ordering::Relaxed),
            crate::notifier::AlertKind::Update => METRICS.signals_updated.fetch_add(1, Ordering::Relaxed),
        };
        notifier.notify(store, alert).await;
    }
}

async fn trim_retention(markets: &mut MarketTable, store: &Store, config: &Config, market_key: &str) {
    let now_secs = util::now_secs();
    let state = markets.get_mut(market_key).expect("market tracked before trim");
    if state.clear_ts > now_secs - config.clear_interval_secs as f64 {
        return;
    }
    state.clear_ts = now_secs;

    let now_ms = util::now_ms();
    let max_period_ms = config.max_period_ms();

    if let Err(err) = store
        .delete_range(market_key, now_ms - RETENTION_FLOOR_MS, now_ms - max_period_ms)
        .await
    {
        log::warn!("retention trim failed for {market_key}: {err:#}");
        METRICS.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    let signals_key = format!("{market_key}_signals");
    if let Err(err) = store
        .delete_range(&signals_key, now_ms - SIGNAL_RETENTION_FLOOR_MS, now_ms - RETENTION_FLOOR_MS)
        .await
    {
        log::warn!("signal retention trim failed for {market_key}: {err:#}");
        METRICS.store_errors.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::MarketState;

    fn state_with(price: f64, saved_ts: i64) -> MarketState {
        MarketState { price, saved_ts, ..Default::default() }
    }

    #[test]
    fn fresh_market_never_dedupes() {
        assert!(!should_dedupe(&MarketState::default(), 100.0, 1, 0.0));
    }

    #[test]
    fn equal_price_is_deduped() {
        let state = state_with(100.0, 1000);
        assert!(should_dedupe(&state, 100.0, 2000, 0.0));
    }

    #[test]
    fn equal_timestamp_is_deduped() {
        let state = state_with(100.0, 1000);
        assert!(should_dedupe(&state, 101.0, 1000, 0.0));
    }

    #[test]
    fn within_backpressure_window_is_deduped() {
        let state = state_with(100.0, util::now_ms() - 50);
        assert!(should_dedupe(&state, 101.0, util::now_ms(), 0.3));
    }

    #[test]
    fn outside_backpressure_window_is_not_deduped() {
        let state = state_with(100.0, util::now_ms() - 5_000);
        assert!(!should_dedupe(&state, 101.0, util::now_ms(), 0.3));
    }
}
