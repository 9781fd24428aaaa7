use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, tungstenite::Utf8Bytes, MaybeTlsStream, WebSocketStream};

use crate::bus::{self, TradeSender};
use crate::exchanges::adapter::{ExchangeAdapter, Frame};
use crate::metrics::METRICS;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Delay between reconnect attempts (§4.B). Unbounded retries, no backoff.
const RECONNECT_DELAY: Duration = Duration::from_millis(250);

/// Runs one venue's connection lifecycle for the life of the process,
/// reconnecting indefinitely until `shutdown` is signalled (§4.B, §5).
pub async fn run_collector(
    adapter: Arc<dyn ExchangeAdapter>,
    http: reqwest::Client,
    bus_tx: TradeSender,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            return;
        }

        tokio::select! {
            result = run_connection(&adapter, &http, &bus_tx, &mut shutdown) => {
                match result {
                    Ok(()) => return, // clean shutdown requested mid-connection
                    Err(err) => {
                        log::warn!("{} connection failed: {err:#}", adapter.name());
                        METRICS.ws_reconnects.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }

        tokio::select! {
            _ = sleep(RECONNECT_DELAY) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

/// One connect → discover → subscribe → stream cycle. Returns `Ok(())`
/// only on a clean shutdown request; any other exit is a reconnect-worthy
/// error.
async fn run_connection(
    adapter: &Arc<dyn ExchangeAdapter>,
    http: &reqwest::Client,
    bus_tx: &TradeSender,
    shutdown: &mut watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let (ws, _) = connect_async(adapter.ws_url()).await?;
    let (mut write, mut read) = ws.split();

    let symbols = adapter.discover_symbols(http).await?;
    for sub in adapter.build_subscribe_messages(&symbols) {
        write.send(Message::Text(Utf8Bytes::from(sub.to_string()))).await?;
    }

    METRICS.ws_connections_active.fetch_add(1, Ordering::Relaxed);
    let result = stream_frames(adapter, bus_tx, &mut write, &mut read, shutdown).await;
    METRICS.ws_connections_active.fetch_sub(1, Ordering::Relaxed);

    if matches!(result, Ok(true)) {
        let _ = write.close().await;
        return Ok(());
    }

    result.map(|_| ())
}

/// Reads frames until the connection closes, errors, or shutdown fires.
/// Returns `Ok(true)` on a shutdown-triggered exit (caller closes cleanly),
/// `Ok(false)` if the venue closed the stream normally (still a
/// reconnect-worthy event), or `Err` on a transport/venue error.
async fn stream_frames(
    adapter: &Arc<dyn ExchangeAdapter>,
    bus_tx: &TradeSender,
    write: &mut SplitSink<WsStream, Message>,
    read: &mut SplitStream<WsStream>,
    shutdown: &mut watch::Receiver<bool>,
) -> anyhow::Result<bool> {
    loop {
        tokio::select! {
            msg = read.next() => {
                let Some(msg) = msg else { return Ok(false) };
                let msg = msg?;

                let (raw, is_binary): (Vec<u8>, bool) = match msg {
                    Message::Text(t) => (t.as_bytes().to_vec(), false),
                    Message::Binary(b) => (b.to_vec(), true),
                    Message::Close(_) => return Ok(false),
                    _ => continue,
                };

                match adapter.decode_frame(&raw, is_binary) {
                    Frame::Trades(batch) => {
                        METRICS.trades_received.fetch_add(batch.data.len(), Ordering::Relaxed);
                        bus::publish(bus_tx, batch);
                    }
                    Frame::KeepAliveReply(reply) => {
                        write.send(Message::Text(Utf8Bytes::from(reply.to_string()))).await?;
                    }
                    Frame::Control => {}
                    Frame::VenueError(msg) => {
                        anyhow::bail!("{} reported an error: {msg}", adapter.name());
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Ok(true);
                }
            }
        }
    }
}
