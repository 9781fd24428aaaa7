use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Global runtime metrics for the screener.
///
/// Design:
/// - Lock-free (atomics), cheap to update from any task.
/// - Read by the State Watcher (§4.H); never exposed over HTTP — exposition
///   is an external-collaborator concern, the counters themselves are not.
#[derive(Default)]
pub struct RuntimeMetrics {
    pub ws_connections_active: AtomicUsize,
    pub ws_reconnects: AtomicUsize,

    pub trades_received: AtomicUsize,
    pub trades_ingested: AtomicUsize,
    pub trades_deduped: AtomicUsize,
    pub tracked_markets: AtomicUsize,

    pub parse_errors: AtomicUsize,
    pub dropped_messages: AtomicUsize,
    pub store_errors: AtomicUsize,
    pub notify_errors: AtomicUsize,

    pub signals_new: AtomicUsize,
    pub signals_updated: AtomicUsize,
}

/// Global metrics registry (singleton), mirroring every task's access
/// pattern: increment-and-forget from wherever the event happens.
pub static METRICS: Lazy<Arc<RuntimeMetrics>> = Lazy::new(|| Arc::new(RuntimeMetrics::default()));
