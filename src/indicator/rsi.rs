use super::ring_buffer::RingBuffer;
use super::Indicator;
use crate::error::AppError;

/// Relative Strength Index with Wilder smoothing.
///
/// The first `period` deltas seed plain-mean gain/loss averages; after that each
/// delta is folded in with weight `1/period`. An unchanged price counts as a
/// delta of zero (no gain, no loss) rather than being skipped.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prices: RingBuffer,
    prev: f64,
    deltas_seen: usize,
    avg_gain: f64,
    avg_loss: f64,
    value: f64,
    initialized: bool,
    ready: bool,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self, AppError> {
        if period == 0 {
            return Err(AppError::invalid_period("RSI", period));
        }
        Ok(Self {
            period,
            prices: RingBuffer::new(period + 1)?,
            prev: 0.0,
            deltas_seen: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
            value: 0.0,
            initialized: false,
            ready: false,
        })
    }

    pub fn avg_gain(&self) -> f64 {
        self.avg_gain
    }

    pub fn avg_loss(&self) -> f64 {
        self.avg_loss
    }

    /// The last `period + 1` prices, oldest first.
    pub fn recent_prices(&self) -> Vec<f64> {
        self.prices.values()
    }

    fn compute(&self) -> f64 {
        if self.avg_loss == 0.0 {
            return 100.0;
        }
        let rs = self.avg_gain / self.avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

impl Indicator for Rsi {
    fn update(&mut self, price: f64) -> f64 {
        self.prices.push(price);

        if !self.initialized {
            self.prev = price;
            self.initialized = true;
            return 0.0;
        }

        let delta = price - self.prev;
        self.prev = price;
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        if self.ready {
            let n = self.period as f64;
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
        } else {
            // Running sums until the seed window is complete.
            self.avg_gain += gain;
            self.avg_loss += loss;
            self.deltas_seen += 1;
            if self.deltas_seen < self.period {
                return 0.0;
            }
            self.avg_gain /= self.period as f64;
            self.avg_loss /= self.period as f64;
            self.ready = true;
        }

        self.value = self.compute();
        self.value
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn period(&self) -> usize {
        self.period
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}
