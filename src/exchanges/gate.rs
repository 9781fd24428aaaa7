use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::schema::{TradeBatch, TradeTick};
use crate::util;

use super::adapter::{ExchangeAdapter, Frame};

/// Gate.io USDT perpetual futures adapter (§4.B).
pub struct GateAdapter;

#[derive(Deserialize)]
struct ContractInfo {
    name: String,
    in_delisting: bool,
}

#[derive(Deserialize)]
struct GateTick {
    contract: String,
    price: String,
    create_time_ms: i64,
}

#[async_trait]
impl ExchangeAdapter for GateAdapter {
    fn name(&self) -> &'static str {
        "gate"
    }

    fn ws_url(&self) -> &'static str {
        "wss://fx-ws.gateio.ws/v4/ws/usdt"
    }

    async fn discover_symbols(&self, http: &reqwest::Client) -> anyhow::Result<Vec<String>> {
        let contracts: Vec<ContractInfo> = http
            .get("https://api.gateio.ws/api/v4/futures/usdt/contracts")
            .send()
            .await?
            .json()
            .await?;

        Ok(contracts
            .into_iter()
            .filter(|c| !c.in_delisting && c.name.ends_with("USDT"))
            .map(|c| c.name)
            .collect())
    }

    fn build_subscribe_messages(&self, symbols: &[String]) -> Vec<Value> {
        vec![json!({
            "time": util::now_ms(),
            "channel": "futures.trades",
            "event": "subscribe",
            "payload": symbols,
        })]
    }

    fn decode_frame(&self, raw: &[u8], _is_binary: bool) -> Frame {
        let v: Value = match serde_json::from_slice(raw) {
            Ok(v) => v,
            Err(_) => return Frame::Control,
        };

        let event = v.get("event").and_then(Value::as_str).unwrap_or("");
        if event == "subscribe" {
            return Frame::Control;
        }
        if event == "error" {
            let msg = v
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown gate error");
            return Frame::VenueError(msg.to_string());
        }

        if v.get("channel").and_then(Value::as_str) != Some("futures.trades") {
            return Frame::Control;
        }

        let ticks: Vec<GateTick> = match v.get("result").and_then(|r| serde_json::from_value(r.clone()).ok()) {
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
                .map(|t| TradeTick { s: t.contract, p: t.price, t: t.create_time_ms })
                .collect(),
        ))
    }
}
