//! Signal Evaluator (§4.F): decides whether a market's recent price
//! movement over each configured look-back crosses its threshold, and
//! drives the Armed → Active → re-Armed state machine via the Signal
//! Latch.

use anyhow::Result;

use crate::config::LookBack;
use crate::notifier::AlertKind;
use crate::store::Store;
use crate::util;

const SIGNALS_24H_MS: i64 = 24 * 60 * 60 * 1000;

/// A crossed look-back, ready for the Notifier.
#[derive(Debug, Clone)]
pub struct Alert {
    pub kind: AlertKind,
    pub exchange: String,
    pub symbol: String,
    pub period_secs: i64,
    pub is_uptrend: bool,
    pub pct: f64,
    pub min_p: f64,
    pub max_p: f64,
    pub signals_24h: i64,
}

/// Evaluates every configured look-back for `market_key` and returns any
/// alerts that should be sent. The rate-limit guard on `check_ts` is
/// applied by the caller (Per-Market State lives in the ingestion task);
/// this function is the pure per-look-back computation over the store.
pub async fn evaluate(
    store: &Store,
    market_key: &str,
    look_backs: &[LookBack],
    price_subsets: usize,
) -> Result<Vec<Alert>> {
    let Some((exchange, symbol)) = util::split_market_key(market_key) else {
        return Ok(Vec::new());
    };

    let mut alerts = Vec::new();
    for lb in look_backs {
        if let Some(alert) = evaluate_look_back(store, exchange, symbol, market_key, lb, price_subsets).await? {
            alerts.push(alert);
        }
    }
    Ok(alerts)
}

/// Evaluates a single look-back.
async fn evaluate_look_back(
    store: &Store,
    exchange: &str,
    symbol: &str,
    market_key: &str,
    lb: &LookBack,
    price_subsets: usize,
) -> Result<Option<Alert>> {
    let now_ms = util::now_ms();
    let prices = store.range(market_key, now_ms - lb.period_ms(), now_ms).await?;

    if prices.len() < price_subsets {
        return Ok(None);
    }

    let values: Vec<f64> = prices.iter().map(|(_, v)| *v).collect();
    let min_p = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_p = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    if min_p == 0.0 {
        return Ok(None);
    }

    let pct = round1(((max_p - min_p) / min_p) * 100.0);
    let is_uptrend = is_uptrend(&values, price_subsets);

    if pct.abs() <= lb.threshold_percent {
        return Ok(None);
    }

    let signals_key = format!("{market_key}_signals");
    let signals_24h = store
        .range(&signals_key, now_ms - SIGNALS_24H_MS, now_ms)
        .await?
        .len() as i64;

    let latch_key = format!("{market_key}_{}_last_percent", lb.period_secs);
    let kind = apply_state_machine(store, &latch_key, pct, lb).await?;

    Ok(kind.map(|kind| Alert {
        kind,
        exchange: exchange.to_string(),
        symbol: symbol.to_string(),
        period_secs: lb.period_secs,
        is_uptrend,
        pct,
        min_p,
        max_p,
        signals_24h,
    }))
}

/// TTL used when the latch is created fresh, or when its existing TTL
/// cannot be read back: `period` seconds, halved once the period reaches
/// 5 minutes (mirrors the original worker's inheritance rule).
fn default_latch_ttl(lb: &LookBack) -> i64 {
    if lb.period_secs >= 5 * 60 {
        lb.period_secs / 2
    } else {
        lb.period_secs
    }
}

async fn apply_state_machine(
    store: &Store,
    latch_key: &str,
    pct: f64,
    lb: &LookBack,
) -> Result<Option<AlertKind>> {
    match store.kv_get(latch_key).await? {
        None => {
            // Armed -> new alert.
            store
                .kv_set_ex(latch_key, &pct.to_string(), default_latch_ttl(lb))
                .await?;
            Ok(Some(AlertKind::New))
        }
        Some(raw) => {
            let latched: f64 = raw.parse().unwrap_or(0.0);
            if pct.abs() <= latched.abs() {
                return Ok(None);
            }
            // Preserve the latch's remaining TTL if still readable; a
            // latch that expired between the GET above and here is
            // treated as freshly armed.
            let ttl = match store.kv_ttl(latch_key).await? {
                Some(ttl) => ttl,
                None => default_latch_ttl(lb),
            };
            store.kv_set_ex(latch_key, &pct.to_string(), ttl).await?;
            Ok(Some(AlertKind::Update))
        }
    }
}

/// Partitions `values` into `subsets` contiguous equal-sized groups
/// (trailing remainder discarded), compares adjacent group means, and
/// returns true iff more pairs increased than decreased. Ties (including
/// fewer than 2 groups worth of data) are false.
pub fn is_uptrend(values: &[f64], subsets: usize) -> bool {
    if subsets < 2 || values.is_empty() {
        return false;
    }

    let group_size = values.len() / subsets;
    if group_size == 0 {
        return false;
    }

    let means: Vec<f64> = (0..subsets)
        .map(|i| {
            let start = i * group_size;
            let group = &values[start..start + group_size];
            group.iter().sum::<f64>() / group.len() as f64
        })
        .collect();

    let mut increases = 0;
    let mut decreases = 0;
    for pair in means.windows(2) {
        if pair[1] > pair[0] {
            increases += 1;
        } else if pair[1] < pair[0] {
            decreases += 1;
        }
    }

    increases > decreases
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_uptrend() {
        let prices = vec![100.0, 100.2, 100.5, 100.7, 101.0, 101.5, 101.9, 102.2, 102.3, 102.5];
        assert!(is_uptrend(&prices, 5));
    }

    #[test]
    fn flat_series_is_not_uptrend() {
        let prices = vec![100.0; 10];
        assert!(!is_uptrend(&prices, 5));
    }

    #[test]
    fn ties_are_not_uptrend() {
        // Two groups with identical means: no strict increase.
        let prices = vec![100.0, 100.0, 100.0, 100.0];
        assert!(!is_uptrend(&prices, 2));
    }

    #[test]
    fn too_few_samples_for_subsets_yields_no_groups() {
        assert!(!is_uptrend(&[1.0, 2.0], 5));
    }

    #[test]
    fn round1_rounds_half_away_from_zero() {
        assert_eq!(round1(2.45), 2.5);
        assert_eq!(round1(2.449), 2.4);
    }

    #[test]
    fn default_latch_ttl_halves_at_five_minutes() {
        let short = LookBack { period_secs: 60, threshold_percent: 2.0 };
        let long = LookBack { period_secs: 300, threshold_percent: 2.0 };
        assert_eq!(default_latch_ttl(&short), 60);
        assert_eq!(default_latch_ttl(&long), 150);
    }
}
