//! Trade Bus (§4.C): a bounded, multi-producer single-consumer queue
//! carrying normalised trade batches from every adapter to the ingestion
//! engine.
//!
//! Ordering is FIFO per producer, not globally ordered across producers —
//! `tokio::sync::mpsc` gives us exactly that.

use tokio::sync::mpsc;

use crate::metrics::METRICS;
use crate::schema::TradeBatch;

pub type TradeSender = mpsc::Sender<TradeBatch>;
pub type TradeReceiver = mpsc::Receiver<TradeBatch>;

/// Large-bounded so a slow ingestion tick doesn't immediately back up a
/// bursty adapter; the bound exists to make `queue_depth` (and therefore
/// the back-pressure multiplier `M`, §4.E) meaningful rather than to cap
/// memory tightly.
pub const BUS_CAPACITY: usize = 50_000;

pub fn new_bus() -> (TradeSender, TradeReceiver) {
    mpsc::channel(BUS_CAPACITY)
}

/// Non-blocking publish: a put that would otherwise suspend drops the
/// batch and counts it, rather than ever blocking the calling adapter.
pub fn publish(tx: &TradeSender, batch: TradeBatch) {
    if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(batch) {
        METRICS.dropped_messages.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        log::warn!("trade bus full, dropping batch");
    }
}

/// Current queue depth, used to derive the back-pressure multiplier `M`
/// (§4.E, §5). `tokio::sync::mpsc::Sender` tracks remaining permits, so
/// depth is simply the gap between the bus's total and remaining capacity.
pub fn queue_depth(tx: &TradeSender) -> usize {
    tx.max_capacity().saturating_sub(tx.capacity())
}

/// `M = (queue_depth // 500) / 10` seconds — widens the per-market dedupe
/// window under load (§4.E, §5, glossary: "back-pressure multiplier").
pub fn backpressure_multiplier(queue_depth: usize) -> f64 {
    ((queue_depth / 500) as f64) / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backpressure_multiplier_bands_by_500() {
        assert_eq!(backpressure_multiplier(0), 0.0);
        assert_eq!(backpressure_multiplier(499), 0.0);
        assert_eq!(backpressure_multiplier(500), 0.1);
        assert_eq!(backpressure_multiplier(1500), 0.3);
        assert_eq!(backpressure_multiplier(1999), 0.3);
        assert_eq!(backpressure_multiplier(2000), 0.4);
    }
}
