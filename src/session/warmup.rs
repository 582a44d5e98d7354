use async_trait::async_trait;

use crate::error::AppError;
use crate::model::candle::Candle;

/// Source of historical candles used to warm indicators up.
#[async_trait]
pub trait HistoricalSource: Send + Sync {
    /// Oldest-first candles for `symbol`.
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, AppError>;
}

/// Source with nothing to offer; sessions start cold.
#[derive(Debug, Default, Clone)]
pub struct NoHistory;

#[async_trait]
impl HistoricalSource for NoHistory {
    async fn fetch_candles(
        &self,
        _symbol: &str,
        _interval: &str,
        _limit: usize,
    ) -> Result<Vec<Candle>, AppError> {
        Err(AppError::ConnectionFailure(
            "no historical source configured".to_string(),
        ))
    }
}

/// Candles to request: a few more than the RSI lookback, never fewer than `floor`.
pub fn warmup_candle_count(rsi_period: usize, floor: usize) -> usize {
    (rsi_period + 10).max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candle_count_is_floored() {
        assert_eq!(warmup_candle_count(14, 50), 50);
        assert_eq!(warmup_candle_count(60, 50), 70);
    }
}
