use super::ring_buffer::RingBuffer;
use super::Indicator;
use crate::error::AppError;

/// Simple Moving Average over a fixed window.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    window: RingBuffer,
    value: f64,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self, AppError> {
        if period == 0 {
            return Err(AppError::invalid_period("SMA", period));
        }
        Ok(Self {
            period,
            window: RingBuffer::new(period)?,
            value: 0.0,
        })
    }
}

impl Indicator for Sma {
    /// Returns 0 until `period` samples have been seen.
    fn update(&mut self, price: f64) -> f64 {
        self.window.push(price);
        self.value = if self.window.len() < self.period {
            0.0
        } else {
            self.window.sum() / self.period as f64
        };
        self.value
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn period(&self) -> usize {
        self.period
    }

    fn is_ready(&self) -> bool {
        self.window.full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_sma() {
        let mut sma = Sma::new(3).unwrap();
        assert_eq!(sma.update(1.0), 0.0);
        assert_eq!(sma.update(2.0), 0.0);
        assert!(!sma.is_ready());

        assert!((sma.update(3.0) - 2.0).abs() < f64::EPSILON);
        assert!((sma.update(4.0) - 3.0).abs() < f64::EPSILON);
        assert!((sma.update(5.0) - 4.0).abs() < f64::EPSILON);
        assert!(sma.is_ready());
    }

    #[test]
    fn no_drift_after_many_updates() {
        let mut sma = Sma::new(10).unwrap();
        let mut naive_buf: Vec<f64> = Vec::new();

        for i in 0..10_000u64 {
            let val = (i as f64) * 0.1 + 0.01;
            sma.update(val);
            naive_buf.push(val);
            if naive_buf.len() > 10 {
                naive_buf.remove(0);
            }

            if sma.is_ready() {
                let naive_avg: f64 = naive_buf.iter().sum::<f64>() / naive_buf.len() as f64;
                assert!(
                    (sma.value() - naive_avg).abs() < 1e-8,
                    "Drift at i={}: ring={} naive={}",
                    i,
                    sma.value(),
                    naive_avg
                );
            }
        }
    }

    #[test]
    fn zero_period_is_rejected() {
        assert!(matches!(Sma::new(0), Err(AppError::InvalidConfiguration(_))));
    }
}
