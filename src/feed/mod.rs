//! Upstream price feed: one connection (or synthetic generator) per instrument,
//! fanned out to any number of subscriber queues.

pub mod hub;
pub mod live;
pub mod registry;
pub mod synthetic;
pub mod transport;

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::binance::ws::stream_url;
use crate::config::{FeedConfig, SyntheticConfig};
use crate::error::AppError;
use crate::event::FeedStatus;
use crate::model::tick::PriceTick;

pub use hub::{FeedHub, FeedSource};
pub use live::ExponentialBackoff;
pub use registry::{SubscriberRegistry, Subscription};
pub use transport::{Connection, Connector, Inbound};

use live::LiveWorker;
use synthetic::SyntheticWorker;

/// Resolves once shutdown was requested or the sending side is gone.
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Handle to a running feed for one instrument.
///
/// Construction spawns the background worker and returns immediately; it must
/// be called from within a tokio runtime. Dropping the client closes it.
#[derive(Debug)]
pub struct FeedClient {
    symbol: String,
    registry: Arc<SubscriberRegistry>,
    shutdown_tx: watch::Sender<bool>,
    status_tx: Arc<watch::Sender<FeedStatus>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl FeedClient {
    /// Live feed over the ranked endpoints in `config`, dialled through `connector`.
    pub fn start(
        symbol: &str,
        config: &FeedConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, AppError> {
        if config.ws_endpoints.is_empty() {
            return Err(AppError::InvalidConfiguration(
                "feed needs at least one websocket endpoint".to_string(),
            ));
        }
        if config.ping_interval_ms == 0 || config.handshake_timeout_ms == 0 {
            return Err(AppError::InvalidConfiguration(
                "feed ping interval and handshake timeout must be > 0".to_string(),
            ));
        }
        let urls = config
            .ws_endpoints
            .iter()
            .map(|base| stream_url(base, symbol, config.stream))
            .collect::<Result<Vec<_>, _>>()?;

        let client = Self::idle(symbol, config.subscriber_queue, FeedStatus::Connecting);
        let worker = LiveWorker {
            symbol: client.symbol.clone(),
            urls,
            config: config.clone(),
            connector,
            registry: Arc::clone(&client.registry),
            status_tx: Arc::clone(&client.status_tx),
            shutdown: client.shutdown_tx.subscribe(),
        };
        client.spawn(worker.run());
        Ok(client)
    }

    /// Feed driven by a bounded random walk instead of an exchange.
    pub fn synthetic(symbol: &str, queue_capacity: usize, config: &SyntheticConfig) -> Self {
        let client = Self::idle(symbol, queue_capacity, FeedStatus::Synthetic);
        let worker = SyntheticWorker {
            symbol: client.symbol.clone(),
            config: config.clone(),
            registry: Arc::clone(&client.registry),
            status_tx: Arc::clone(&client.status_tx),
            shutdown: client.shutdown_tx.subscribe(),
        };
        client.spawn(worker.run());
        client
    }

    /// Client without any upstream worker; ticks arrive only through [`FeedClient::broadcast`].
    pub fn manual(symbol: &str, queue_capacity: usize) -> Self {
        Self::idle(symbol, queue_capacity, FeedStatus::Connected {
            endpoint: "manual".to_string(),
        })
    }

    fn idle(symbol: &str, queue_capacity: usize, initial: FeedStatus) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (status_tx, _) = watch::channel(initial);
        Self {
            symbol: symbol.trim().to_ascii_uppercase(),
            registry: SubscriberRegistry::new(queue_capacity),
            shutdown_tx,
            status_tx: Arc::new(status_tx),
            workers: Mutex::new(Vec::new()),
        }
    }

    fn spawn<F>(&self, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        self.workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn subscribe(&self) -> Subscription {
        self.registry.subscribe()
    }

    /// Deliver `tick` to every current subscriber without waiting.
    pub fn broadcast(&self, tick: PriceTick) -> usize {
        self.registry.broadcast(&tick)
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn status(&self) -> FeedStatus {
        self.status_tx.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<FeedStatus> {
        self.status_tx.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Stop the background worker. Safe to call any number of times.
    pub fn close(&self) {
        let already = self.shutdown_tx.send_replace(true);
        if already {
            return;
        }
        tracing::info!(symbol = %self.symbol, "Feed client closing");
        let has_worker = !self
            .workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty();
        if !has_worker {
            self.status_tx.send_replace(FeedStatus::Closed);
        }
    }

    /// Close and wait for the background worker to exit.
    pub async fn shutdown(&self) {
        self.close();
        let handles: Vec<JoinHandle<()>> = self
            .workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(symbol = %self.symbol, error = %e, "Feed worker ended abnormally");
            }
        }
    }
}

impl Drop for FeedClient {
    fn drop(&mut self) {
        self.close();
    }
}
