/// Small, deterministic helpers shared across the pipeline.
///
/// No exchange-specific or store-specific logic belongs here; venue quirks
/// live in `exchanges::*`, store quirks live in `store`.
use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in milliseconds.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time is before UNIX_EPOCH")
        .as_millis() as i64
}

/// Current Unix timestamp in whole seconds (fractional), used by the
/// wall-clock rate-limiting fields (`check_ts`, `clear_ts`).
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time is before UNIX_EPOCH")
        .as_secs_f64()
}

/// Composes the canonical Market Key `"<exchange>_<symbol>"`.
pub fn market_key(exchange: &str, symbol: &str) -> String {
    format!("{exchange}_{symbol}")
}

/// Splits a Market Key back into `(exchange, symbol)`.
///
/// Splits at the *first* underscore only: exchange names never contain
/// `_`, but symbols occasionally do, so splitting from the right would be
/// ambiguous.
pub fn split_market_key(market_key: &str) -> Option<(&str, &str)> {
    market_key.split_once('_')
}

/// Renders a price with up to 9 fractional digits, trailing zeros
/// stripped, and the decimal point re-padded with a single `0` if
/// stripping would otherwise leave a bare trailing dot.
pub fn format_price(price: f64) -> String {
    let raw = format!("{price:.9}");
    let trimmed = raw.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{trimmed}0")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_key_round_trips() {
        let key = market_key("bybit", "BTCUSDT");
        assert_eq!(key, "bybit_BTCUSDT");
        assert_eq!(split_market_key(&key), Some(("bybit", "BTCUSDT")));
    }

    #[test]
    fn split_market_key_uses_first_underscore() {
        assert_eq!(split_market_key("gate_BTC_USDT"), Some(("gate", "BTC_USDT")));
    }

    #[test]
    fn split_market_key_rejects_missing_delimiter() {
        assert_eq!(split_market_key("nodelimiter"), None);
    }

    #[test]
    fn format_price_strips_trailing_zeros() {
        assert_eq!(format_price(102.500_000_000), "102.5");
        assert_eq!(format_price(100.0), "100.0");
        assert_eq!(format_price(0.000_000_001), "0.000000001");
    }
}
