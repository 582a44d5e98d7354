use serde::{Deserialize, Serialize};

/// One observed price sample for an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    pub timestamp_ms: u64,
}

impl PriceTick {
    pub fn new(symbol: &str, price: f64, volume: f64, timestamp_ms: u64) -> Self {
        Self {
            symbol: symbol.to_ascii_uppercase(),
            price,
            volume,
            timestamp_ms,
        }
    }

    /// Tick stamped with the current wall-clock time (synthetic feed).
    pub fn now(symbol: &str, price: f64, volume: f64) -> Self {
        Self::new(symbol, price, volume, now_ms())
    }
}

pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_is_upper_cased() {
        let tick = PriceTick::new("btcusdt", 100.0, 1.5, 42);
        assert_eq!(tick.symbol, "BTCUSDT");
        assert_eq!(tick.timestamp_ms, 42);
    }

    #[test]
    fn now_uses_wall_clock() {
        let tick = PriceTick::now("ethusdt", 10.0, 0.0);
        assert!(tick.timestamp_ms > 1_600_000_000_000);
    }
}
