use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::schema::{TradeBatch, TradeTick};
use crate::util;

use super::adapter::{ExchangeAdapter, Frame};

/// Binance WebSocket adapter (§4.B).
pub struct BinanceAdapter;

#[derive(Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Deserialize)]
struct SymbolInfo {
    symbol: String,
    status: String,
}

#[async_trait]
impl ExchangeAdapter for BinanceAdapter {
    fn name(&self) -> &'static str {
        "binance"
    }

    fn ws_url(&self) -> &'static str {
        "wss://stream.binance.com:9443/ws"
    }

    async fn discover_symbols(&self, http: &reqwest::Client) -> anyhow::Result<Vec<String>> {
        let info: ExchangeInfo = http
            .get("https://api.binance.com/api/v3/exchangeInfo")
            .send()
            .await?
            .json()
            .await?;

        Ok(info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING" && s.symbol.ends_with("USDT"))
            .map(|s| s.symbol)
            .collect())
    }

    fn build_subscribe_messages(&self, symbols: &[String]) -> Vec<Value> {
        let params: Vec<String> = symbols.iter().map(|s| format!("{}@trade", s.to_lowercase())).collect();
        vec![json!({
            "id": format!("subscribe_{}", util::now_ms()),
            "method": "SUBSCRIBE",
            "params": params,
        })]
    }

    fn decode_frame(&self, raw: &[u8], _is_binary: bool) -> Frame {
        let v: Value = match serde_json::from_slice(raw) {
            Ok(v) => v,
            Err(_) => return Frame::Control,
        };

        // Subscription ack: {"result": null, "id": "..."}
        if v.get("result").is_some() {
            return Frame::Control;
        }

        if v.get("e").and_then(Value::as_str) != Some("trade") {
            return Frame::Control;
        }

        let (Some(s), Some(p), Some(t)) = (
            v.get("s").and_then(Value::as_str),
            v.get("p").and_then(Value::as_str),
            v.get("T").and_then(Value::as_i64),
        ) else {
            return Frame::Control;
        };

        Frame::Trades(TradeBatch::new(
            self.name(),
            vec![TradeTick { s: s.to_string(), p: p.to_string(), t }],
        ))
    }
}
