use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::schema::{TradeBatch, TradeTick};

use super::adapter::{ExchangeAdapter, Frame};

/// OKX public swap adapter (§4.B).
pub struct OkxAdapter;

#[derive(Deserialize)]
struct InstrumentsResponse {
    data: Vec<Instrument>,
}

#[derive(Deserialize)]
struct Instrument {
    #[serde(rename = "instId")]
    inst_id: String,
    uly: String,
}

#[derive(Deserialize)]
struct OkxTick {
    #[serde(rename = "instId")]
    inst_id: String,
    px: String,
    ts: String,
}

#[async_trait]
impl ExchangeAdapter for OkxAdapter {
    fn name(&self) -> &'static str {
        "okx"
    }

    fn ws_url(&self) -> &'static str {
        "wss://ws.okx.com:8443/ws/v5/public"
    }

    async fn discover_symbols(&self, http: &reqwest::Client) -> anyhow::Result<Vec<String>> {
        let resp: InstrumentsResponse = http
            .get("https://www.okx.com/api/v5/public/instruments?instType=SWAP")
            .send()
            .await?
            .json()
            .await?;

        Ok(resp
            .data
            .into_iter()
            .filter(|i| i.uly.ends_with("USDT"))
            .map(|i| i.inst_id)
            .collect())
    }

    fn build_subscribe_messages(&self, symbols: &[String]) -> Vec<Value> {
        let args: Vec<Value> = symbols
            .iter()
            .map(|s| json!({ "channel": "trades", "instId": s }))
            .collect();
        vec![json!({ "op": "subscribe", "args": args })]
    }

    fn decode_frame(&self, raw: &[u8], _is_binary: bool) -> Frame {
        let v: Value = match serde_json::from_slice(raw) {
            Ok(v) => v,
            Err(_) => return Frame::Control,
        };

        if let Some(event) = v.get("event").and_then(Value::as_str) {
            if event == "error" {
                let msg = v.get("msg").and_then(Value::as_str).unwrap_or("unknown okx error");
                return Frame::VenueError(msg.to_string());
            }
            return Frame::Control;
        }

        let channel = v.get("arg").and_then(|a| a.get("channel")).and_then(Value::as_str);
        if channel != Some("trades") {
            return Frame::Control;
        }

        let ticks: Vec<OkxTick> = match v.get("data").and_then(|d| serde_json::from_value(d.clone()).ok()) {
            Some(ticks) => ticks,
            None => return Frame::Control,
        };

        if ticks.is_empty() {
            return Frame::Control;
        }

        let batch: Vec<TradeTick> = ticks
            .into_iter()
            .filter_map(|t| {
                let ts: i64 = t.ts.parse().ok()?;
                Some(TradeTick { s: t.inst_id, p: t.px, t: ts })
            })
            .collect();

        if batch.is_empty() {
            return Frame::Control;
        }

        Frame::Trades(TradeBatch::new(self.name(), batch))
    }
}
