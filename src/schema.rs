use serde::{Deserialize, Serialize};

/// A single normalised trade print, as it travels from an exchange adapter
/// onto the Trade Bus.
///
/// Field names match the venue-normalised wire shape (`s`/`p`/`T`) rather
/// than the fully-spelled-out names used once a trade has been ingested —
/// adapters emit this shape directly, so no extra allocation/rename pass is
/// needed between parsing and batching.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TradeTick {
    /// Venue-native symbol, upper-case, not rewritten to a cross-venue form.
    pub s: String,
    /// Trade price. Carried as a string to dodge float-formatting surprises
    /// in transit; parsed to `f64` once, at ingestion.
    pub p: String,
    /// Venue-reported event time, milliseconds since epoch.
    #[serde(rename = "T")]
    pub t: i64,
}

/// A batch of trades from one exchange, posted as a single Trade Bus item
/// to amortise per-item overhead across bursty venues.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TradeBatch {
    pub exchange: String,
    pub data: Vec<TradeTick>,
}

impl TradeBatch {
    pub fn new(exchange: impl Into<String>, data: Vec<TradeTick>) -> Self {
        Self {
            exchange: exchange.into(),
            data,
        }
    }
}
