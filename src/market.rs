//! Per-Market State (§3): in-memory bookkeeping the ingestion engine keeps
//! for every Market Key it has ever seen. Owned exclusively by the
//! ingestion task — no locking, per §5's single-owner discipline.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct MarketState {
    /// Last ingested price.
    pub price: f64,
    /// Event time of the last ingested price.
    pub timestamp_ms: i64,
    /// Event time of the last price actually persisted to the store
    /// (lags `timestamp_ms` under dedupe).
    pub saved_ts: i64,
    /// Wall-clock seconds of the last signal evaluation.
    pub check_ts: f64,
    /// Wall-clock seconds of the last retention trim.
    pub clear_ts: f64,
}

/// All tracked markets, keyed by Market Key (`"<exchange>_<symbol>"`).
/// Never evicted during the process lifetime (§3 lifecycle).
pub type MarketTable = HashMap<String, MarketState>;
