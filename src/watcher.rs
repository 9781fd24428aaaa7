//! State Watcher (§4.H): a periodic heartbeat log line, cheap enough to
//! run forever without its own shutdown coordination — it simply stops
//! getting polled once the runtime starts tearing down.

use std::sync::atomic::Ordering;

use tokio::sync::watch;
use tokio::time::{interval, Duration};

use crate::bus::{self, TradeSender};
use crate::metrics::METRICS;

const TICK: Duration = Duration::from_secs(10);

pub async fn run(tx: TradeSender, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(TICK);
    let mut last_trades_received = METRICS.trades_received.load(Ordering::Relaxed);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let trades_received = METRICS.trades_received.load(Ordering::Relaxed);
                let throughput = (trades_received.saturating_sub(last_trades_received)) as f64 / TICK.as_secs_f64();
                last_trades_received = trades_received;

                log::info!(
                    "bus_depth={} throughput={:.1}/s tracked_markets={}",
                    bus::queue_depth(&tx),
                    throughput,
                    METRICS.tracked_markets.load(Ordering::Relaxed),
                );
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
