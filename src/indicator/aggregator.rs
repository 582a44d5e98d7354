use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::ema::Ema;
use super::ring_buffer::RingBuffer;
use super::rsi::Rsi;
use super::sma::Sma;
use super::Indicator;
use crate::error::AppError;

/// Number of entries kept per history sequence.
pub const HISTORY_SIZE: usize = 30;

/// Latest indicator snapshot. Each field is 0 until its calculator is ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedValues {
    pub rsi: f64,
    pub sma: f64,
    pub ema: f64,
}

/// Owned copies of the bounded history sequences, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorHistory {
    pub rsi: Vec<f64>,
    pub sma: Vec<f64>,
    pub ema: Vec<f64>,
    pub prices: Vec<f64>,
}

/// What to do with a price identical to the previous one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatPricePolicy {
    /// Feed every price to every calculator.
    #[default]
    Forward,
    /// Ignore a repeated price entirely; the previous snapshot is returned and
    /// no calculator or history sequence is touched.
    SkipUnchanged,
}

#[derive(Debug, Clone)]
struct BoundedSeries {
    values: VecDeque<f64>,
    limit: usize,
}

impl BoundedSeries {
    fn new(limit: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(limit),
            limit,
        }
    }

    fn push(&mut self, value: f64) {
        if self.values.len() == self.limit {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}

/// Drives RSI, SMA and EMA from a single price stream.
#[derive(Debug, Clone)]
pub struct Aggregator {
    window: RingBuffer,
    rsi: Rsi,
    sma: Sma,
    ema: Ema,
    policy: FlatPricePolicy,
    last: AggregatedValues,
    last_price: Option<f64>,
    rsi_history: BoundedSeries,
    sma_history: BoundedSeries,
    ema_history: BoundedSeries,
    price_history: BoundedSeries,
}

impl Aggregator {
    pub fn new(rsi_period: usize, sma_period: usize, ema_period: usize) -> Result<Self, AppError> {
        Self::with_policy(rsi_period, sma_period, ema_period, FlatPricePolicy::default())
    }

    pub fn with_policy(
        rsi_period: usize,
        sma_period: usize,
        ema_period: usize,
        policy: FlatPricePolicy,
    ) -> Result<Self, AppError> {
        let rsi = Rsi::new(rsi_period)?;
        let sma = Sma::new(sma_period)?;
        let ema = Ema::new(ema_period)?;
        // RSI needs one more price than its period to produce a value.
        let window = RingBuffer::new((rsi_period + 1).max(sma_period).max(ema_period))?;

        Ok(Self {
            window,
            rsi,
            sma,
            ema,
            policy,
            last: AggregatedValues::default(),
            last_price: None,
            rsi_history: BoundedSeries::new(HISTORY_SIZE),
            sma_history: BoundedSeries::new(HISTORY_SIZE),
            ema_history: BoundedSeries::new(HISTORY_SIZE),
            price_history: BoundedSeries::new(HISTORY_SIZE),
        })
    }

    /// Ingest one price and return the refreshed snapshot.
    pub fn update(&mut self, price: f64) -> AggregatedValues {
        let unchanged = self.last_price == Some(price);
        self.last_price = Some(price);
        if unchanged && self.policy == FlatPricePolicy::SkipUnchanged {
            return self.last;
        }

        self.window.push(price);
        self.last = AggregatedValues {
            rsi: self.rsi.update(price),
            sma: self.sma.update(price),
            ema: self.ema.update(price),
        };

        self.price_history.push(price);
        self.rsi_history.push(self.last.rsi);
        self.sma_history.push(self.last.sma);
        self.ema_history.push(self.last.ema);

        self.last
    }

    pub fn values(&self) -> AggregatedValues {
        self.last
    }

    pub fn history(&self) -> IndicatorHistory {
        IndicatorHistory {
            rsi: self.rsi_history.to_vec(),
            sma: self.sma_history.to_vec(),
            ema: self.ema_history.to_vec(),
            prices: self.price_history.to_vec(),
        }
    }

    pub fn policy(&self) -> FlatPricePolicy {
        self.policy
    }

    /// Periods as (rsi, sma, ema).
    pub fn periods(&self) -> (usize, usize, usize) {
        (self.rsi.period(), self.sma.period(), self.ema.period())
    }

    /// True once enough prices were ingested for every calculator.
    pub fn is_ready(&self) -> bool {
        self.window.full()
    }

    pub fn warmup_progress(&self) -> f64 {
        (self.window.len() as f64 / self.window.capacity() as f64).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_series_evicts_oldest() {
        let mut s = BoundedSeries::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            s.push(v);
        }
        assert_eq!(s.to_vec(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn readiness_window_covers_rsi_lookback() {
        let mut agg = Aggregator::new(3, 2, 2).unwrap();
        for p in [1.0, 2.0, 3.0] {
            agg.update(p);
        }
        assert!(!agg.is_ready());
        assert!((agg.warmup_progress() - 0.75).abs() < 1e-12);
        agg.update(4.0);
        assert!(agg.is_ready());
        assert!((agg.warmup_progress() - 1.0).abs() < f64::EPSILON);
    }
}
