use serde::{Deserialize, Serialize};

use crate::indicator::{AggregatedValues, IndicatorHistory};
use crate::model::tick::PriceTick;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FeedStatus {
    Connecting,
    Connected { endpoint: String },
    Reconnecting { attempt: u32, delay_ms: u64 },
    /// Synthetic generator running, no upstream connection.
    Synthetic,
    Closed,
}

impl FeedStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, FeedStatus::Connected { .. } | FeedStatus::Synthetic)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    pub timestamp_ms: u64,
}

impl From<&PriceTick> for PriceUpdate {
    fn from(tick: &PriceTick) -> Self {
        Self {
            symbol: tick.symbol.clone(),
            price: tick.price,
            volume: tick.volume,
            timestamp_ms: tick.timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorUpdate {
    pub rsi: f64,
    pub sma: f64,
    pub ema: f64,
    pub timestamp_ms: u64,
    pub rsi_history: Vec<f64>,
    pub sma_history: Vec<f64>,
    pub ema_history: Vec<f64>,
}

impl IndicatorUpdate {
    pub fn new(values: AggregatedValues, history: IndicatorHistory, timestamp_ms: u64) -> Self {
        Self {
            rsi: values.rsi,
            sma: values.sma,
            ema: values.ema,
            timestamp_ms,
            rsi_history: history.rsi,
            sma_history: history.sma,
            ema_history: history.ema,
        }
    }
}

/// One message on a consumer session stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketUpdate {
    Price(PriceUpdate),
    Indicators(IndicatorUpdate),
}

impl MarketUpdate {
    pub fn kind(&self) -> &'static str {
        match self {
            MarketUpdate::Price(_) => "price",
            MarketUpdate::Indicators(_) => "indicators",
        }
    }
}
