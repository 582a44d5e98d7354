pub mod aggregator;
pub mod ema;
pub mod ring_buffer;
pub mod rsi;
pub mod sma;

pub use aggregator::{AggregatedValues, Aggregator, FlatPricePolicy, IndicatorHistory, HISTORY_SIZE};

/// Streaming calculator fed one price at a time.
///
/// `update` and `value` return 0 while the calculator does not have enough
/// samples yet; `is_ready` distinguishes that sentinel from a computed 0.
pub trait Indicator {
    fn update(&mut self, price: f64) -> f64;
    fn value(&self) -> f64;
    fn period(&self) -> usize;
    fn is_ready(&self) -> bool;
}
