use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::time::Instant;

use super::registry::SubscriberRegistry;
use super::shutdown_requested;
use crate::config::SyntheticConfig;
use crate::event::FeedStatus;
use crate::model::tick::PriceTick;

/// Bounded random walk used when no exchange connection is available.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    price: f64,
    max_step: f64,
    max_volume: f64,
}

impl RandomWalk {
    pub fn new(start_price: f64, max_step: f64, max_volume: f64) -> Self {
        Self {
            price: start_price.max(1.0),
            max_step: max_step.abs(),
            max_volume: max_volume.abs(),
        }
    }

    /// Advance one step; returns (price, volume). Price never drops below 1.
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> (f64, f64) {
        let delta = rng.gen_range(-self.max_step..=self.max_step);
        self.price = (self.price + delta).max(1.0);
        let volume = rng.gen::<f64>() * self.max_volume;
        (self.price, volume)
    }

    pub fn price(&self) -> f64 {
        self.price
    }
}

pub(crate) struct SyntheticWorker {
    pub symbol: String,
    pub config: SyntheticConfig,
    pub registry: Arc<SubscriberRegistry>,
    pub status_tx: Arc<watch::Sender<FeedStatus>>,
    pub shutdown: watch::Receiver<bool>,
}

impl SyntheticWorker {
    pub async fn run(mut self) {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut walk = RandomWalk::new(
            self.config.start_price,
            self.config.max_step,
            self.config.max_volume,
        );
        let every = Duration::from_millis(self.config.interval_ms.max(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + every, every);

        self.status_tx.send_replace(FeedStatus::Synthetic);
        tracing::info!(symbol = %self.symbol, interval_ms = every.as_millis() as u64, "Synthetic feed started");

        loop {
            tokio::select! {
                _ = shutdown_requested(&mut self.shutdown) => break,
                _ = ticker.tick() => {
                    let (price, volume) = walk.step(&mut rng);
                    self.registry.broadcast(&PriceTick::now(&self.symbol, price, volume));
                }
            }
        }

        self.status_tx.send_replace(FeedStatus::Closed);
        tracing::info!(symbol = %self.symbol, "Synthetic feed stopped");
    }
}
