//! Exchange adapter registry and factory.
//!
//! Central registration of the five supported venues (§4.B); the rest of
//! the application interacts with them exclusively through the
//! `ExchangeAdapter` trait.

pub mod adapter;
pub mod binance;
pub mod bybit;
pub mod gate;
pub mod htx;
pub mod okx;

use std::sync::Arc;

use adapter::ExchangeAdapter;

/// Resolves an adapter instance by its canonical name (the `EXCHANGES`
/// config value). `None` for anything outside `config::SUPPORTED_EXCHANGES`.
pub fn get_adapter(name: &str) -> Option<Arc<dyn ExchangeAdapter>> {
    match name {
        "binance" => Some(Arc::new(binance::BinanceAdapter)),
        "bybit" => Some(Arc::new(bybit::BybitAdapter)),
        "gate" => Some(Arc::new(gate::GateAdapter)),
        "htx" => Some(Arc::new(htx::HtxAdapter)),
        "okx" => Some(Arc::new(okx::OkxAdapter)),
        _ => None,
    }
}
