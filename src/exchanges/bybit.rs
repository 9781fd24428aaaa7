use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::schema::{TradeBatch, TradeTick};
use crate::util;

use super::adapter::{ExchangeAdapter, Frame};

/// Bybit WebSocket adapter (§4.B), linear/perpetual public channel.
pub struct BybitAdapter;

#[derive(Deserialize)]
struct SymbolsResponse {
    result: Vec<SymbolInfo>,
}

#[derive(Deserialize)]
struct SymbolInfo {
    name: String,
    status: String,
}

#[derive(Deserialize)]
struct BybitTick {
    s: String,
    p: String,
    #[serde(rename = "T")]
    t: i64,
}

#[async_trait]
impl ExchangeAdapter for BybitAdapter {
    fn name(&self) -> &'static str {
        "bybit"
    }

    fn ws_url(&self) -> &'static str {
        "wss://stream.bybit.com/v5/public/linear"
    }

    async fn discover_symbols(&self, http: &reqwest::Client) -> anyhow::Result<Vec<String>> {
        let resp: SymbolsResponse = http
            .get("https://api.bybit.com/v2/public/symbols")
            .send()
            .await?
            .json()
            .await?;

        Ok(resp
            .result
            .into_iter()
            .filter(|s| s.status == "Trading" && s.name.ends_with("USDT"))
            .map(|s| s.name)
            .collect())
    }

    fn build_subscribe_messages(&self, symbols: &[String]) -> Vec<Value> {
        let args: Vec<String> = symbols.iter().map(|s| format!("publicTrade.{s}")).collect();
        vec![json!({
            "op": "subscribe",
            "req_id": format!("subscribe_{}", util::now_ms()),
            "args": args,
        })]
    }

    fn decode_frame(&self, raw: &[u8], _is_binary: bool) -> Frame {
        let v: Value = match serde_json::from_slice(raw) {
            Ok(v) => v,
            Err(_) => return Frame::Control,
        };

        // Control: subscribe ack / pong, e.g. {"op": "subscribe", "success": true}
        if v.get("op").is_some() {
            return Frame::Control;
        }

        let topic = match v.get("topic").and_then(Value::as_str) {
            Some(t) if t.starts_with("publicTrade.") => t,
            _ => return Frame::Control,
        };
        let _ = topic;

        let ticks: Vec<BybitTick> = match v.get("data").and_then(|d| serde_json::from_value(d.clone()).ok()) {
            Some(ticks) => ticks,
            None => return Frame::Control,
        };

        if ticks.is_empty() {
            return Frame::Control;
        }

        Frame::Trades(TradeBatch::new(
            self.name(),
            ticks.into_iter().map(|t| TradeTick { s: t.s, p: t.p, t: t.t }).collect(),
        ))
    }
}
