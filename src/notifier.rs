//! Notifier Adapter (§4.G): formats alerts and delivers them through the
//! sink's send/edit HTTP endpoints, tracking the message handle for each
//! `(chat, market, period, direction)` so a later "update" can edit rather
//! than repost.

use serde::Deserialize;
use serde_json::json;

use crate::signal::Alert;
use crate::store::Store;
use crate::util;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Whether an alert is a brand new signal or a refinement of one already
/// latched (§4.F's state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    New,
    Update,
}

pub struct Notifier {
    http: reqwest::Client,
    bot_api_key: String,
    target_ids: Vec<i64>,
}

#[derive(Deserialize)]
struct SendResponse {
    ok: bool,
    result: Option<MessageResult>,
}

#[derive(Deserialize)]
struct MessageResult {
    message_id: i64,
}

impl Notifier {
    pub fn new(http: reqwest::Client, bot_api_key: String, target_ids: Vec<i64>) -> Self {
        Self { http, bot_api_key, target_ids }
    }

    /// Delivers one alert to every configured chat. Each chat's send/edit
    /// failures are logged and do not affect the others or the caller
    /// (notification delivery is best-effort per §7).
    pub async fn notify(&self, store: &Store, alert: &Alert) {
        let text = format_message(alert);
        let direction = if alert.is_uptrend { "up" } else { "down" };

        for &chat_id in &self.target_ids {
            let msg_key = format!(
                "{chat_id}_{}_{}_{}_{direction}",
                alert.exchange, alert.symbol, alert.period_secs
            );

            let result = match alert.kind {
                AlertKind::New => self.send_new(store, &msg_key, chat_id, &text, alert).await,
                AlertKind::Update => self.send_update(store, &msg_key, chat_id, &text).await,
            };

            if let Err(err) = result {
                log::warn!("notify failed for chat {chat_id}: {err:#}");
            }
        }
    }

    async fn send_new(
        &self,
        store: &Store,
        msg_key: &str,
        chat_id: i64,
        text: &str,
        alert: &Alert,
    ) -> anyhow::Result<()> {
        let resp: SendResponse = self
            .http
            .post(format!("{TELEGRAM_API_BASE}/bot{}/sendMessage", self.bot_api_key))
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "Markdown",
                "disable_web_page_preview": true,
            }))
            .send()
            .await?
            .json()
            .await?;

        if !resp.ok {
            anyhow::bail!("sendMessage rejected by sink");
        }
        let Some(result) = resp.result else {
            anyhow::bail!("sendMessage response missing result");
        };

        let ttl = latch_ttl(alert.period_secs);
        store.kv_set_ex(msg_key, &result.message_id.to_string(), ttl).await?;
        Ok(())
    }

    async fn send_update(&self, store: &Store, msg_key: &str, chat_id: i64, text: &str) -> anyhow::Result<()> {
        let Some(handle) = store.kv_get(msg_key).await? else {
            // Original alert aged out; silently drop (§4.G).
            return Ok(());
        };
        let message_id: i64 = handle.parse()?;

        let resp: SendResponse = self
            .http
            .post(format!("{TELEGRAM_API_BASE}/bot{}/editMessageText", self.bot_api_key))
            .json(&json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "text": text,
                "parse_mode": "Markdown",
                "disable_web_page_preview": true,
            }))
            .send()
            .await?
            .json()
            .await?;

        if !resp.ok {
            anyhow::bail!("editMessageText rejected by sink");
        }
        Ok(())
    }
}

/// TTL applied to a freshly created message handle: 120s by default,
/// mirroring the signal-latch inheritance rule above `SIGNAL_TIMEOUT` for
/// longer look-backs.
fn latch_ttl(period_secs: i64) -> i64 {
    const DEFAULT_TTL: i64 = 120;
    if period_secs >= 5 * 60 {
        period_secs / 2
    } else if period_secs > DEFAULT_TTL {
        period_secs
    } else {
        DEFAULT_TTL
    }
}

fn format_message(alert: &Alert) -> String {
    let exchange_title = capitalize(&alert.exchange);
    let period_min = alert.period_secs / 60;
    let (arrow, word, sign) = if alert.is_uptrend {
        ("▲", "Pump", "+")
    } else {
        ("▼", "Dump", "-")
    };

    let (lo, hi) = if alert.is_uptrend {
        (alert.min_p, alert.max_p)
    } else {
        (alert.max_p, alert.min_p)
    };

    format!(
        "● {exchange_title} − {period_min}м − [{symbol}](https://www.coinglass.com/tv/{exchange_title}_{symbol})\n\
         {arrow} {word}: {sign}{pct}% ({lo} - {hi})\n\
         🔄 Signals 24h: {signals_24h}",
        symbol = alert.symbol,
        pct = alert.pct.abs(),
        lo = util::format_price(lo),
        hi = util::format_price(hi),
        signals_24h = alert.signals_24h,
    )
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(is_uptrend: bool) -> Alert {
        Alert {
            kind: AlertKind::New,
            exchange: "bybit".to_string(),
            symbol: "BTCUSDT".to_string(),
            period_secs: 60,
            is_uptrend,
            pct: 2.5,
            min_p: 100.0,
            max_p: 102.5,
            signals_24h: 1,
        }
    }

    #[test]
    fn uptrend_message_orders_min_max_ascending() {
        let text = format_message(&alert(true));
        assert!(text.contains("▲ Pump: +2.5% (100.0 - 102.5)"));
        assert!(text.contains("Bybit − 1м"));
    }

    #[test]
    fn downtrend_message_orders_min_max_descending() {
        let text = format_message(&alert(false));
        assert!(text.contains("▼ Dump: -2.5% (102.5 - 100.0)"));
    }

    #[test]
    fn latch_ttl_falls_back_to_default_for_short_periods() {
        assert_eq!(latch_ttl(60), 120);
    }

    #[test]
    fn latch_ttl_halves_for_long_periods() {
        assert_eq!(latch_ttl(600), 300);
    }
}
