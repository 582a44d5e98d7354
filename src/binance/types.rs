use serde::Deserialize;

use crate::error::AppError;
use crate::model::candle::Candle;
use crate::model::tick::{now_ms, PriceTick};

/// Deserialize Binance string-encoded numbers to f64.
pub fn string_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<f64>().map_err(serde::de::Error::custom)
}

/// Wrapper used by the `/stream?streams=a/b` endpoint.
#[derive(Debug, Deserialize)]
pub struct CombinedStreamEnvelope {
    pub stream: String,
    pub data: serde_json::Value,
}

/// 24hr mini ticker (`<sym>@miniTicker`).
#[derive(Debug, Deserialize)]
pub struct BinanceMiniTickerEvent {
    #[serde(rename = "E", default)]
    pub event_time: u64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c", deserialize_with = "string_to_f64")]
    pub close_price: f64,
    #[serde(rename = "v", deserialize_with = "string_to_f64")]
    pub base_volume: f64,
}

/// Full 24hr ticker (`<sym>@ticker`); only the fields we forward.
#[derive(Debug, Deserialize)]
pub struct BinanceTickerEvent {
    #[serde(rename = "E", default)]
    pub event_time: u64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c", deserialize_with = "string_to_f64")]
    pub last_price: f64,
    #[serde(rename = "v", deserialize_with = "string_to_f64")]
    pub base_volume: f64,
}

/// Aggregate trade (`<sym>@aggTrade`).
#[derive(Debug, Deserialize)]
pub struct BinanceAggTradeEvent {
    #[serde(rename = "E", default)]
    pub event_time: u64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p", deserialize_with = "string_to_f64")]
    pub price: f64,
    #[serde(rename = "q", deserialize_with = "string_to_f64")]
    pub qty: f64,
    #[serde(rename = "T", default)]
    pub trade_time: u64,
}

fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value, kind: &str) -> Result<T, AppError> {
    serde_json::from_value(value).map_err(|e| AppError::Decode(format!("{}: {}", kind, e)))
}

fn build_tick(symbol: &str, price: f64, volume: f64, time_ms: u64) -> Result<PriceTick, AppError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(AppError::Decode(format!("non-positive price {}", price)));
    }
    if !volume.is_finite() || volume < 0.0 {
        return Err(AppError::Decode(format!("negative volume {}", volume)));
    }
    let time_ms = if time_ms == 0 { now_ms() } else { time_ms };
    Ok(PriceTick::new(symbol, price, volume, time_ms))
}

fn tick_from_event(kind: &str, data: serde_json::Value) -> Result<PriceTick, AppError> {
    match kind {
        "miniTicker" => {
            let ev: BinanceMiniTickerEvent = decode(data, kind)?;
            build_tick(&ev.symbol, ev.close_price, ev.base_volume, ev.event_time)
        }
        "ticker" => {
            let ev: BinanceTickerEvent = decode(data, kind)?;
            build_tick(&ev.symbol, ev.last_price, ev.base_volume, ev.event_time)
        }
        "aggTrade" => {
            let ev: BinanceAggTradeEvent = decode(data, kind)?;
            build_tick(&ev.symbol, ev.price, ev.qty, ev.trade_time)
        }
        other => Err(AppError::Decode(format!("unknown stream type: {}", other))),
    }
}

fn kind_from_event_type(event_type: &str) -> &str {
    match event_type {
        "24hrMiniTicker" => "miniTicker",
        "24hrTicker" => "ticker",
        other => other,
    }
}

/// Decode one inbound text frame, either a combined-stream envelope or a bare event.
pub fn parse_stream_message(text: &str) -> Result<PriceTick, AppError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| AppError::Decode(format!("invalid json: {}", e)))?;

    if value.get("stream").is_some() && value.get("data").is_some() {
        let envelope: CombinedStreamEnvelope = decode(value, "envelope")?;
        let kind = envelope.stream.rsplit('@').next().unwrap_or_default();
        return tick_from_event(kind, envelope.data);
    }

    let event_type = value
        .get("e")
        .and_then(|e| e.as_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::Decode("message has no event type".to_string()))?;
    tick_from_event(kind_from_event_type(&event_type), value)
}

fn field_f64(row: &[serde_json::Value], idx: usize) -> Option<f64> {
    let value = match &row[idx] {
        serde_json::Value::String(s) => s.parse::<f64>().ok()?,
        serde_json::Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    // "NaN" and "inf" parse fine but would poison indicator sums.
    value.is_finite().then_some(value)
}

fn field_u64(row: &[serde_json::Value], idx: usize) -> Option<u64> {
    row[idx].as_u64()
}

/// Convert one `/api/v3/klines` row. Rows that are too short or malformed yield `None`.
pub fn candle_from_kline_row(row: &[serde_json::Value]) -> Option<Candle> {
    if row.len() < 7 {
        return None;
    }
    Some(Candle {
        open_time: field_u64(row, 0)?,
        open: field_f64(row, 1)?,
        high: field_f64(row, 2)?,
        low: field_f64(row, 3)?,
        close: field_f64(row, 4)?,
        volume: field_f64(row, 5)?,
        close_time: field_u64(row, 6)?,
    })
}

#[derive(Debug, Deserialize)]
pub struct BinanceApiErrorResponse {
    pub code: i64,
    pub msg: String,
}
