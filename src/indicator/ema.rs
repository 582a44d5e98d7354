use super::ring_buffer::RingBuffer;
use super::Indicator;
use crate::error::AppError;

/// Exponential Moving Average, seeded with the SMA of the first `period` samples.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    multiplier: f64,
    value: f64,
    // Only consulted until the seed is taken.
    seed_window: RingBuffer,
    is_initialized: bool,
}

impl Ema {
    pub fn new(period: usize) -> Result<Self, AppError> {
        if period == 0 {
            return Err(AppError::invalid_period("EMA", period));
        }
        Ok(Self {
            period,
            multiplier: 2.0 / (period as f64 + 1.0),
            value: 0.0,
            seed_window: RingBuffer::new(period)?,
            is_initialized: false,
        })
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

impl Indicator for Ema {
    fn update(&mut self, price: f64) -> f64 {
        if self.is_initialized {
            self.value += (price - self.value) * self.multiplier;
            return self.value;
        }

        self.seed_window.push(price);
        if self.seed_window.full() {
            self.value = self.seed_window.sum() / self.period as f64;
            self.is_initialized = true;
        }
        self.value
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn period(&self) -> usize {
        self.period
    }

    fn is_ready(&self) -> bool {
        self.is_initialized
    }
}
