use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use super::registry::SubscriberRegistry;
use super::shutdown_requested;
use super::transport::{Connection, Connector, Inbound};
use crate::binance::types::parse_stream_message;
use crate::config::FeedConfig;
use crate::error::AppError;
use crate::event::FeedStatus;

/// Exponential backoff for reconnection.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    current: Duration,
    initial: Duration,
    max: Duration,
    factor: f64,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            current: initial,
            initial,
            max,
            factor,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = Duration::from_secs_f64(
            (self.current.as_secs_f64() * self.factor).min(self.max.as_secs_f64()),
        );
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

pub(crate) struct LiveWorker {
    pub symbol: String,
    pub urls: Vec<String>,
    pub config: FeedConfig,
    pub connector: Arc<dyn Connector>,
    pub registry: Arc<SubscriberRegistry>,
    pub status_tx: Arc<watch::Sender<FeedStatus>>,
    pub shutdown: watch::Receiver<bool>,
}

impl LiveWorker {
    /// Connect, pump, and reconnect until shutdown is requested.
    pub async fn run(mut self) {
        let mut backoff = ExponentialBackoff::new(
            self.config.initial_backoff(),
            self.config.max_backoff(),
            2.0,
        );
        let mut attempt: u32 = 0;

        loop {
            self.status_tx.send_replace(FeedStatus::Connecting);
            let connected = tokio::select! {
                res = connect_ranked(
                    self.connector.as_ref(),
                    &self.urls,
                    self.config.handshake_timeout(),
                ) => res,
                _ = shutdown_requested(&mut self.shutdown) => break,
            };

            let failure = match connected {
                Ok((conn, endpoint)) => {
                    tracing::info!(symbol = %self.symbol, endpoint = %endpoint, "Feed connected");
                    self.status_tx
                        .send_replace(FeedStatus::Connected { endpoint });
                    let mut received = false;
                    match self.pump(conn, &mut received).await {
                        Ok(()) => break,
                        Err(e) => {
                            tracing::warn!(symbol = %self.symbol, error = %e, "Feed connection lost");
                            if received {
                                // Healthy session: retry right away with a fresh schedule.
                                backoff.reset();
                                attempt = 0;
                                continue;
                            }
                            e
                        }
                    }
                }
                Err(e) => e,
            };

            attempt = attempt.saturating_add(1);
            let delay = backoff.next_delay();
            tracing::warn!(
                symbol = %self.symbol,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Feed unavailable, backing off"
            );
            self.status_tx.send_replace(FeedStatus::Reconnecting {
                attempt,
                delay_ms: delay.as_millis() as u64,
            });

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_requested(&mut self.shutdown) => break,
            }
        }

        self.status_tx.send_replace(FeedStatus::Closed);
        tracing::info!(symbol = %self.symbol, "Feed worker stopped");
    }

    /// Read frames until the connection fails (`Err`) or shutdown is requested (`Ok`).
    async fn pump(&mut self, mut conn: Box<dyn Connection>, received: &mut bool) -> Result<(), AppError> {
        let ping_every = self.config.ping_interval();
        let idle_timeout = self.config.idle_timeout();
        let mut ping = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let idle = tokio::time::sleep(idle_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                _ = shutdown_requested(&mut self.shutdown) => {
                    conn.close().await;
                    return Ok(());
                }
                _ = ping.tick() => {
                    if let Err(e) = conn.ping().await {
                        conn.close().await;
                        return Err(e);
                    }
                }
                _ = &mut idle => {
                    conn.close().await;
                    return Err(AppError::ConnectionFailure(format!(
                        "no traffic for {} ms",
                        idle_timeout.as_millis()
                    )));
                }
                frame = conn.recv() => match frame {
                    Some(Ok(Inbound::Text(text))) => {
                        idle.as_mut().reset(Instant::now() + idle_timeout);
                        *received = true;
                        match parse_stream_message(&text) {
                            Ok(tick) => {
                                self.registry.broadcast(&tick);
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, "Failed to parse feed message");
                            }
                        }
                    }
                    Some(Ok(Inbound::Keepalive)) => {
                        idle.as_mut().reset(Instant::now() + idle_timeout);
                    }
                    Some(Ok(Inbound::Close)) => {
                        return Err(AppError::ConnectionFailure("closed by remote".to_string()));
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        return Err(AppError::ConnectionFailure("stream ended".to_string()));
                    }
                },
            }
        }
    }
}

/// Try each endpoint in rank order; the first success wins.
async fn connect_ranked(
    connector: &dyn Connector,
    urls: &[String],
    handshake_timeout: Duration,
) -> Result<(Box<dyn Connection>, String), AppError> {
    let mut last_error = String::from("no endpoints configured");
    for url in urls {
        match tokio::time::timeout(handshake_timeout, connector.connect(url)).await {
            Ok(Ok(conn)) => return Ok((conn, url.clone())),
            Ok(Err(e)) => {
                tracing::debug!(endpoint = %url, error = %e, "Connect failed, trying next endpoint");
                last_error = e.to_string();
            }
            Err(_) => {
                tracing::debug!(endpoint = %url, "Handshake timed out, trying next endpoint");
                last_error = format!("{}: handshake timed out", url);
            }
        }
    }
    Err(AppError::ConnectionFailure(format!(
        "all {} endpoints failed (last: {})",
        urls.len(),
        last_error
    )))
}
