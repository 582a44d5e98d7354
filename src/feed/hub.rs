use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::registry::Subscription;
use super::transport::Connector;
use super::FeedClient;
use crate::config::{FeedConfig, SyntheticConfig};
use crate::error::AppError;

/// How the hub starts feeds for instruments it has not seen yet.
#[derive(Clone)]
pub enum FeedSource {
    Live(Arc<dyn Connector>),
    Synthetic(SyntheticConfig),
}

impl std::fmt::Debug for FeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedSource::Live(_) => f.write_str("Live"),
            FeedSource::Synthetic(cfg) => f.debug_tuple("Synthetic").field(cfg).finish(),
        }
    }
}

/// At most one running [`FeedClient`] per instrument, started on first use.
///
/// Unpinned feeds are closed and forgotten by [`FeedHub::release`] once their
/// last subscriber is gone. Subscribing and releasing share one lock, so a feed
/// is never torn down between a session finding it and registering with it.
#[derive(Debug)]
pub struct FeedHub {
    config: FeedConfig,
    source: FeedSource,
    state: Mutex<HubState>,
}

#[derive(Debug, Default)]
struct HubState {
    feeds: HashMap<String, Arc<FeedClient>>,
    pinned: HashSet<String>,
}

fn key(symbol: &str) -> String {
    symbol.trim().to_ascii_lowercase()
}

impl FeedHub {
    pub fn new(config: FeedConfig, source: FeedSource) -> Self {
        Self {
            config,
            source,
            state: Mutex::new(HubState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn running(&self, state: &mut HubState, key: String) -> Result<Arc<FeedClient>, AppError> {
        if let Some(existing) = state.feeds.get(&key) {
            if !existing.is_closed() {
                return Ok(Arc::clone(existing));
            }
        }

        let client = match &self.source {
            FeedSource::Live(connector) => {
                FeedClient::start(&key, &self.config, Arc::clone(connector))?
            }
            FeedSource::Synthetic(synthetic) => {
                FeedClient::synthetic(&key, self.config.subscriber_queue, synthetic)
            }
        };
        tracing::info!(symbol = %key, source = ?self.source, "Started feed");
        let client = Arc::new(client);
        state.feeds.insert(key, Arc::clone(&client));
        Ok(client)
    }

    /// Running feed for `symbol`, starting one if needed.
    pub fn feed(&self, symbol: &str) -> Result<Arc<FeedClient>, AppError> {
        let mut state = self.lock();
        self.running(&mut state, key(symbol))
    }

    /// Start `symbol` and keep it running regardless of subscribers.
    pub fn pin(&self, symbol: &str) -> Result<Arc<FeedClient>, AppError> {
        let mut state = self.lock();
        let client = self.running(&mut state, key(symbol))?;
        state.pinned.insert(key(symbol));
        Ok(client)
    }

    /// Register with the feed for `symbol`, starting it if needed.
    pub fn subscribe(&self, symbol: &str) -> Result<Subscription, AppError> {
        let mut state = self.lock();
        let client = self.running(&mut state, key(symbol))?;
        Ok(client.subscribe())
    }

    /// Close and drop the feed for `symbol` if it is unpinned and has no
    /// subscribers left. Returns whether a feed was released.
    pub fn release(&self, symbol: &str) -> bool {
        let key = key(symbol);
        let mut state = self.lock();
        if state.pinned.contains(&key) {
            return false;
        }
        let idle = state
            .feeds
            .get(&key)
            .map(|client| client.subscriber_count() == 0)
            .unwrap_or(false);
        if !idle {
            return false;
        }
        if let Some(client) = state.feeds.remove(&key) {
            client.close();
            tracing::info!(symbol = %key, "Released idle feed");
        }
        true
    }

    /// Register an externally built client, replacing any existing one.
    pub fn insert(&self, symbol: &str, client: Arc<FeedClient>) {
        let previous = self.lock().feeds.insert(key(symbol), client);
        if let Some(previous) = previous {
            previous.close();
        }
    }

    pub fn get(&self, symbol: &str) -> Option<Arc<FeedClient>> {
        self.lock().feeds.get(&key(symbol)).cloned()
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.lock().feeds.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Close every feed. Idempotent.
    pub fn close_all(&self) {
        let feeds: Vec<Arc<FeedClient>> = self
            .lock()
            .feeds
            .drain()
            .map(|(_, client)| client)
            .collect();
        for client in feeds {
            client.close();
        }
    }
}
