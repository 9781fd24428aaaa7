use async_trait::async_trait;
use serde_json::Value;

use crate::schema::TradeBatch;

/// Outcome of decoding a single inbound WebSocket frame (§4.B).
#[derive(Debug)]
pub enum Frame {
    /// Trades extracted from this frame, ready for the Trade Bus.
    Trades(TradeBatch),
    /// A keepalive frame that demands an immediate reply — HTX's
    /// `{"ping": n}` → `{"pong": n}` handshake is the only venue that
    /// needs this today.
    KeepAliveReply(Value),
    /// Subscription ack, heartbeat, or any other frame with no trade
    /// content. Logged at debug level and discarded.
    Control,
    /// The venue reported an in-band error.
    VenueError(String),
}

/// The abstraction layer between the generic collector runtime (§5) and
/// each venue's WebSocket dialect (§4.B).
///
/// Implementations must never panic on malformed input — a bad frame is
/// logged and skipped, it must not kill the adapter (§4.B failure
/// semantics).
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Canonical exchange name; matches the `EXCHANGES` config value and
    /// becomes the first half of every Market Key this adapter produces.
    fn name(&self) -> &'static str;

    /// WebSocket endpoint for the public trade stream.
    fn ws_url(&self) -> &'static str;

    /// One-shot HTTPS call to the venue's instruments endpoint, filtered
    /// to the qualifying symbols per §4.B's table. Run once per
    /// (re)connection, before subscribing.
    async fn discover_symbols(&self, http: &reqwest::Client) -> anyhow::Result<Vec<String>>;

    /// Builds the subscribe frame(s) to send immediately after the
    /// handshake. Most venues take every symbol in one frame; HTX
    /// requires one frame per symbol (§4.B).
    fn build_subscribe_messages(&self, symbols: &[String]) -> Vec<Value>;

    /// Decodes one inbound WebSocket frame into normalised trades (or a
    /// control/keepalive/error outcome). `is_binary` distinguishes HTX's
    /// gzip-compressed binary frames from every other venue's JSON text.
    fn decode_frame(&self, raw: &[u8], is_binary: bool) -> Frame;
}
