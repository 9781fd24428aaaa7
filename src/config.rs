use std::collections::HashSet;
use std::env;

use anyhow::{bail, Context, Result};

/// The five venues this screener knows how to speak to.
pub const SUPPORTED_EXCHANGES: [&str; 5] = ["binance", "bybit", "gate", "htx", "okx"];

/// One configured look-back: evaluate price movement over `period_secs`,
/// alert if the absolute percent change exceeds `threshold_percent`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookBack {
    pub period_secs: i64,
    pub threshold_percent: f64,
}

impl LookBack {
    pub fn period_ms(&self) -> i64 {
        self.period_secs * 1000
    }
}

/// Process-wide configuration, loaded once at startup from environment
/// variables (§3, §6 — the CLI surface accepts no flags).
#[derive(Debug, Clone)]
pub struct Config {
    /// Adapter names to activate; validated against `SUPPORTED_EXCHANGES`.
    pub exchanges: HashSet<String>,
    /// Ordered `(period, threshold)` look-backs.
    pub signal_thresholds: Vec<LookBack>,
    /// Number of equal sub-windows for the trend classifier; also the
    /// minimum sample count required to evaluate a look-back.
    pub price_subsets: usize,
    /// TTL, in seconds, of a newly latched signal.
    pub signal_timeout_secs: i64,
    /// Minimum gap, in seconds, between retention trims per market.
    pub clear_interval_secs: i64,
    /// Notification chat identifiers.
    pub target_ids: Vec<i64>,
    /// Credential for the notification sink.
    pub bot_api_key: String,
    /// Time-series/KV store endpoint.
    pub redis_uri: String,
}

impl Config {
    /// Loads and validates configuration from the process environment.
    ///
    /// Fatal (returns `Err`) on a missing or malformed required variable —
    /// per §6, this must surface as a non-zero exit code at startup, never
    /// as a panic mid-run.
    pub fn from_env() -> Result<Self> {
        let exchanges = parse_exchanges(&env_var("EXCHANGES")?)?;
        let signal_thresholds = parse_signal_thresholds(&env_var("SIGNAL_THRESHOLDS")?)?;
        let price_subsets = env_var("PRICE_SUBSETS")?
            .parse::<usize>()
            .context("PRICE_SUBSETS must be a positive integer")?;
        if price_subsets < 2 {
            bail!("PRICE_SUBSETS must be >= 2, got {price_subsets}");
        }

        let signal_timeout_secs = env_var_or("SIGNAL_TIMEOUT", "120")
            .parse::<i64>()
            .context("SIGNAL_TIMEOUT must be an integer number of seconds")?;
        let clear_interval_secs = env_var_or("CLEAR_INTERVAL", "60")
            .parse::<i64>()
            .context("CLEAR_INTERVAL must be an integer number of seconds")?;

        let target_ids = parse_target_ids(&env_var("TARGET_IDS")?)?;
        if target_ids.is_empty() {
            bail!("TARGET_IDS must name at least one chat id");
        }

        let bot_api_key = env_var("BOT_API_KEY")?;
        if bot_api_key.trim().is_empty() {
            bail!("BOT_API_KEY must not be empty");
        }

        let redis_uri = env_var("REDIS_URI")?;

        Ok(Self {
            exchanges,
            signal_thresholds,
            price_subsets,
            signal_timeout_secs,
            clear_interval_secs,
            target_ids,
            bot_api_key,
            redis_uri,
        })
    }

    /// Largest configured look-back period, in milliseconds — the Price
    /// Series retention bound (§3, §4.E).
    pub fn max_period_ms(&self) -> i64 {
        self.signal_thresholds.iter().map(LookBack::period_ms).max().unwrap_or(0)
    }

    /// Largest configured look-back period, in seconds.
    pub fn max_period_secs(&self) -> i64 {
        self.signal_thresholds.iter().map(|lb| lb.period_secs).max().unwrap_or(0)
    }
}

fn env_var(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("missing required environment variable {name}"))
}

fn env_var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// `EXCHANGES=binance,bybit,okx` — an unknown name is logged and skipped
/// here, not fatal (mirrors `exchanges::get_adapter` returning `None` for
/// unsupported names); only an empty resulting set fails startup, since an
/// all-typo list would otherwise start a screener that watches nothing.
fn parse_exchanges(raw: &str) -> Result<HashSet<String>> {
    let mut set = HashSet::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !SUPPORTED_EXCHANGES.contains(&name) {
            log::warn!("unsupported exchange '{name}' in EXCHANGES (accepted: {SUPPORTED_EXCHANGES:?}), skipping");
            continue;
        }
        set.insert(name.to_string());
    }
    if set.is_empty() {
        bail!("EXCHANGES must name at least one supported exchange");
    }
    Ok(set)
}

/// `SIGNAL_THRESHOLDS=1:2.0,5:3.5` — `period_minutes:threshold_percent`
/// pairs, comma-separated.
fn parse_signal_thresholds(raw: &str) -> Result<Vec<LookBack>> {
    let mut out = Vec::new();
    for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (period_min, threshold) = pair
            .split_once(':')
            .with_context(|| format!("malformed SIGNAL_THRESHOLDS entry '{pair}', expected minutes:percent"))?;
        let period_min: i64 = period_min
            .trim()
            .parse()
            .with_context(|| format!("malformed period in SIGNAL_THRESHOLDS entry '{pair}'"))?;
        let threshold_percent: f64 = threshold
            .trim()
            .parse()
            .with_context(|| format!("malformed threshold in SIGNAL_THRESHOLDS entry '{pair}'"))?;
        out.push(LookBack {
            period_secs: period_min * 60,
            threshold_percent,
        });
    }
    if out.is_empty() {
        bail!("SIGNAL_THRESHOLDS must name at least one period:threshold pair");
    }
    Ok(out)
}

fn parse_target_ids(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().with_context(|| format!("malformed TARGET_IDS entry '{s}'")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signal_thresholds() {
        let lbs = parse_signal_thresholds("1:2.0,5:3.5").unwrap();
        assert_eq!(
            lbs,
            vec![
                LookBack { period_secs: 60, threshold_percent: 2.0 },
                LookBack { period_secs: 300, threshold_percent: 3.5 },
            ]
        );
    }

    #[test]
    fn skips_unsupported_exchange_rather_than_failing() {
        let set = parse_exchanges("binance,fakex").unwrap();
        assert_eq!(set, HashSet::from(["binance".to_string()]));
    }

    #[test]
    fn rejects_all_unsupported_exchanges() {
        assert!(parse_exchanges("fakex,alsofake").is_err());
    }

    #[test]
    fn rejects_empty_exchanges() {
        assert!(parse_exchanges("").is_err());
    }

    #[test]
    fn parses_target_ids() {
        assert_eq!(parse_target_ids("1,2, 3").unwrap(), vec![1, 2, 3]);
    }
}
