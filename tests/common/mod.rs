#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use quanta_stream::config::{FeedConfig, StreamKind};
use quanta_stream::error::AppError;
use quanta_stream::feed::{Connection, Connector, Inbound};

/// Connector whose first `failures` dials fail; the first successful dial is
/// fed from the frame channel, later ones stay silent.
pub struct ScriptedConnector {
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
    pings: Arc<AtomicUsize>,
    frames: Mutex<Option<mpsc::UnboundedReceiver<Inbound>>>,
    dialled: Mutex<Vec<String>>,
}

impl ScriptedConnector {
    pub fn new(failures: usize) -> (Arc<Self>, mpsc::UnboundedSender<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            failures_left: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
            pings: Arc::new(AtomicUsize::new(0)),
            frames: Mutex::new(Some(rx)),
            dialled: Mutex::new(Vec::new()),
        });
        (connector, tx)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn dialled(&self) -> Vec<String> {
        self.dialled.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, AppError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.dialled.lock().unwrap().push(url.to_string());
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::ConnectionFailure(format!("{} refused", url)));
        }
        Ok(Box::new(ScriptedConnection {
            frames: self.frames.lock().unwrap().take(),
            pings: Arc::clone(&self.pings),
        }))
    }
}

struct ScriptedConnection {
    frames: Option<mpsc::UnboundedReceiver<Inbound>>,
    pings: Arc<AtomicUsize>,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn recv(&mut self) -> Option<Result<Inbound, AppError>> {
        match self.frames.as_mut() {
            Some(rx) => rx.recv().await.map(Ok),
            None => std::future::pending().await,
        }
    }

    async fn ping(&mut self) -> Result<(), AppError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) {}
}

pub fn feed_config() -> FeedConfig {
    FeedConfig {
        ws_endpoints: vec![
            "wss://primary.test".to_string(),
            "wss://backup.test".to_string(),
        ],
        stream: StreamKind::Combined,
        initial_backoff_ms: 10,
        max_backoff_ms: 40,
        ping_interval_ms: 60_000,
        idle_timeout_ms: 120_000,
        handshake_timeout_ms: 1_000,
        subscriber_queue: 64,
        ..FeedConfig::default()
    }
}

pub fn agg_trade(symbol: &str, price: f64, time_ms: u64) -> Inbound {
    Inbound::Text(format!(
        r#"{{"stream":"{sym}@aggTrade","data":{{"e":"aggTrade","E":{t},"s":"{sym}","a":1,"p":"{p}","q":"0.25","f":1,"l":1,"T":{t},"m":false}}}}"#,
        sym = symbol,
        t = time_ms,
        p = price
    ))
}

/// Poll `cond` until it holds or two seconds pass.
pub async fn wait_until<F: Fn() -> bool>(cond: F) -> bool {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), fut)
        .await
        .expect("timed out")
}
