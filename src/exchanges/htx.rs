use std::io::Read;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::schema::{TradeBatch, TradeTick};
use crate::util;

use super::adapter::{ExchangeAdapter, Frame};

/// HTX (Huobi) linear swap adapter (§4.B). Frames arrive gzip-compressed
/// over a binary WebSocket channel and the venue expects a `pong` echo
/// within its ping interval or it drops the connection.
pub struct HtxAdapter;

#[derive(Deserialize)]
struct BatchMergedResponse {
    ticks: Vec<TickInfo>,
}

#[derive(Deserialize)]
struct TickInfo {
    contract_code: String,
}

#[derive(Deserialize)]
struct HtxTradeTick {
    price: f64,
    ts: i64,
}

#[async_trait]
impl ExchangeAdapter for HtxAdapter {
    fn name(&self) -> &'static str {
        "htx"
    }

    fn ws_url(&self) -> &'static str {
        "wss://api.hbdm.com/linear-swap-ws"
    }

    async fn discover_symbols(&self, http: &reqwest::Client) -> anyhow::Result<Vec<String>> {
        let resp: BatchMergedResponse = http
            .get("https://api.hbdm.com/v2/linear-swap-ex/market/detail/batch_merged?business_type=swap")
            .send()
            .await?
            .json()
            .await?;

        Ok(resp
            .ticks
            .into_iter()
            .map(|t| t.contract_code)
            .filter(|s| s.ends_with("USDT"))
            .collect())
    }

    /// HTX subscribes one symbol per frame, unlike every other venue here.
    fn build_subscribe_messages(&self, symbols: &[String]) -> Vec<Value> {
        symbols
            .iter()
            .map(|s| {
                json!({
                    "sub": format!("market.{s}.trade.detail"),
                    "id": (util::now_ms() / 1000).to_string(),
                })
            })
            .collect()
    }

    fn decode_frame(&self, raw: &[u8], is_binary: bool) -> Frame {
        let decompressed;
        let bytes: &[u8] = if is_binary {
            let mut decoder = GzDecoder::new(raw);
            let mut buf = Vec::new();
            if decoder.read_to_end(&mut buf).is_err() {
                return Frame::Control;
            }
            decompressed = buf;
            &decompressed
        } else {
            raw
        };

        let v: Value = match serde_json::from_slice(bytes) {
            Ok(v) => v,
            Err(_) => return Frame::Control,
        };

        if let Some(ping) = v.get("ping") {
            return Frame::KeepAliveReply(json!({ "pong": ping }));
        }

        if v.get("subbed").is_some() {
            return Frame::Control;
        }

        if let Some(err_msg) = v.get("err-msg").and_then(Value::as_str) {
            return Frame::VenueError(err_msg.to_string());
        }

        let channel = match v.get("ch").and_then(Value::as_str) {
            Some(ch) if ch.ends_with(".trade.detail") => ch,
            _ => return Frame::Control,
        };

        let symbol = match channel.split('.').nth(1) {
            Some(s) => s,
            None => return Frame::Control,
        };

        let ticks: Vec<HtxTradeTick> = match v
            .get("tick")
            .and_then(|t| t.get("data"))
            .and_then(|d| serde_json::from_value(d.clone()).ok())
        {
            Some(ticks) => ticks,
            None => return Frame::Control,
        };

        if ticks.is_empty() {
            return Frame::Control;
        }

        Frame::Trades(TradeBatch::new(
            self.name(),
            ticks
                .into_iter()
                .map(|t| TradeTick {
                    s: symbol.to_string(),
                    p: t.price.to_string(),
                    t: t.ts,
                })
                .collect(),
        ))
    }
}
