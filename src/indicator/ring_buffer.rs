use crate::error::AppError;

/// Fixed-capacity ring of samples with an O(1) running sum.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buffer: Vec<f64>,
    head: usize,
    count: usize,
    sum: f64,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Result<Self, AppError> {
        if capacity == 0 {
            return Err(AppError::InvalidConfiguration(
                "ring buffer capacity must be > 0".to_string(),
            ));
        }
        Ok(Self {
            buffer: vec![0.0; capacity],
            head: 0,
            count: 0,
            sum: 0.0,
        })
    }

    /// Push a new value, evicting the oldest one once full.
    pub fn push(&mut self, value: f64) {
        if self.count == self.buffer.len() {
            self.sum -= self.buffer[self.head];
        } else {
            self.count += 1;
        }
        self.buffer[self.head] = value;
        self.sum += value;
        self.head = (self.head + 1) % self.buffer.len();
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn full(&self) -> bool {
        self.count == self.buffer.len()
    }

    /// Stored values, oldest first.
    pub fn values(&self) -> Vec<f64> {
        let cap = self.buffer.len();
        let start = (self.head + cap - self.count) % cap;
        (0..self.count)
            .map(|i| self.buffer[(start + i) % cap])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            RingBuffer::new(0),
            Err(AppError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn partial_fill_keeps_order() {
        let mut buf = RingBuffer::new(4).unwrap();
        assert!(buf.is_empty());
        buf.push(1.0);
        buf.push(2.0);
        assert_eq!(buf.len(), 2);
        assert!(!buf.full());
        assert_eq!(buf.values(), vec![1.0, 2.0]);
        assert!((buf.sum() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn wraps_and_evicts_oldest() {
        let mut buf = RingBuffer::new(3).unwrap();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            buf.push(v);
        }
        assert!(buf.full());
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.values(), vec![3.0, 4.0, 5.0]);
        assert!((buf.sum() - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sum_tracks_last_window_for_any_length() {
        let cap = 7;
        let mut buf = RingBuffer::new(cap).unwrap();
        let mut pushed: Vec<f64> = Vec::new();

        for i in 0..500u64 {
            let v = ((i * 37) % 101) as f64 * 0.25 - 3.0;
            buf.push(v);
            pushed.push(v);

            let window = &pushed[pushed.len().saturating_sub(cap)..];
            let naive: f64 = window.iter().sum();
            assert!(buf.len() <= cap);
            assert_eq!(buf.len(), window.len());
            assert!(
                (buf.sum() - naive).abs() < 1e-8,
                "sum drift at i={}: ring={} naive={}",
                i,
                buf.sum(),
                naive
            );
        }
        assert_eq!(buf.values(), pushed[pushed.len() - cap..].to_vec());
    }
}
