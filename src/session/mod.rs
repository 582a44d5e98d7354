//! Per-consumer session: warm indicators up from history, then forward live
//! ticks as ordered price/indicator message pairs.

pub mod request;
pub mod warmup;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::event::{IndicatorUpdate, MarketUpdate, PriceUpdate};
use crate::feed::{shutdown_requested, FeedHub, Subscription};
use crate::indicator::{Aggregator, FlatPricePolicy};
use crate::model::tick::now_ms;

pub use request::{Periods, StreamRequest};
pub use warmup::{warmup_candle_count, HistoricalSource, NoHistory};

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub default_symbol: String,
    pub kline_interval: String,
    pub default_period: usize,
    pub flat_price: FlatPricePolicy,
    pub min_warmup_candles: usize,
    pub outbound_queue: usize,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_symbol: config.feed.symbol.clone(),
            kline_interval: config.history.kline_interval.clone(),
            default_period: config.indicators.default_period,
            flat_price: config.indicators.flat_price,
            min_warmup_candles: config.history.min_candles,
            outbound_queue: config.server.session_queue,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_symbol: "btcusdt".to_string(),
            kline_interval: "1h".to_string(),
            default_period: 14,
            flat_price: FlatPricePolicy::Forward,
            min_warmup_candles: 50,
            outbound_queue: 64,
        }
    }
}

/// Why a session stopped. None of these are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Cancelled,
    ConsumerGone,
    FeedClosed,
}

pub struct SessionBridge {
    feeds: Arc<FeedHub>,
    history: Arc<dyn HistoricalSource>,
    settings: SessionSettings,
}

impl SessionBridge {
    pub fn new(
        feeds: Arc<FeedHub>,
        history: Arc<dyn HistoricalSource>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            feeds,
            history,
            settings,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn feeds(&self) -> &Arc<FeedHub> {
        &self.feeds
    }

    /// Validate `request`, then run the session on its own task.
    ///
    /// Messages arrive on the returned receiver; dropping it ends the session.
    pub fn open(
        self: &Arc<Self>,
        request: StreamRequest,
        cancel: watch::Receiver<bool>,
    ) -> Result<
        (
            mpsc::Receiver<MarketUpdate>,
            JoinHandle<Result<SessionEnd, AppError>>,
        ),
        AppError,
    > {
        request.periods(self.settings.default_period)?;
        request.resolved_symbol(&self.settings.default_symbol)?;
        let (tx, rx) = mpsc::channel(self.settings.outbound_queue.max(1));
        let bridge = Arc::clone(self);
        let handle = tokio::spawn(async move { bridge.run(request, tx, cancel).await });
        Ok((rx, handle))
    }

    /// Drive one session to completion on the current task.
    pub async fn run(
        &self,
        request: StreamRequest,
        sink: mpsc::Sender<MarketUpdate>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<SessionEnd, AppError> {
        let periods = request.periods(self.settings.default_period)?;
        let symbol = request.resolved_symbol(&self.settings.default_symbol)?;
        let mut aggregator = Aggregator::with_policy(
            periods.rsi,
            periods.sma,
            periods.ema,
            self.settings.flat_price,
        )?;

        let span = tracing::info_span!("session", id = %Uuid::new_v4(), symbol = %symbol);
        let outcome = self
            .drive(&symbol, periods, &mut aggregator, &sink, &mut cancel)
            .instrument(span.clone())
            .await;

        let _entered = span.enter();
        match outcome {
            Ok(end) => {
                tracing::info!(?end, "Session ended");
                Ok(end)
            }
            Err(AppError::StreamTerminated) => {
                // A dropped cancel sender counts as cancellation.
                let cancelled = *cancel.borrow() || cancel.has_changed().is_err();
                let end = if cancelled {
                    SessionEnd::Cancelled
                } else {
                    SessionEnd::ConsumerGone
                };
                tracing::info!(?end, "Session ended");
                Ok(end)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session failed");
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        symbol: &str,
        periods: Periods,
        aggregator: &mut Aggregator,
        sink: &mpsc::Sender<MarketUpdate>,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, AppError> {
        let limit = warmup_candle_count(periods.rsi, self.settings.min_warmup_candles);
        let fetched = tokio::select! {
            res = self.history.fetch_candles(symbol, &self.settings.kline_interval, limit) => res,
            _ = shutdown_requested(cancel) => return Ok(SessionEnd::Cancelled),
        };

        match fetched {
            Ok(candles) => {
                for candle in &candles {
                    aggregator.update(candle.close);
                }
                if let Some(last) = candles.last() {
                    tracing::info!(
                        count = candles.len(),
                        ready = aggregator.is_ready(),
                        "Pre-populated indicators from history"
                    );
                    let price = PriceUpdate {
                        symbol: symbol.to_ascii_uppercase(),
                        price: last.close,
                        volume: last.volume,
                        timestamp_ms: last.close_time,
                    };
                    emit(sink, cancel, MarketUpdate::Price(price)).await?;
                    emit(sink, cancel, indicator_message(aggregator)).await?;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Historical warm-up unavailable, starting cold");
            }
        }

        let mut subscription = self.feeds.subscribe(symbol)?;
        tracing::info!(subscription = subscription.id(), "Streaming live ticks");
        let end = forward(&mut subscription, aggregator, sink, cancel).await;

        drop(subscription);
        self.feeds.release(symbol);
        end
    }
}

/// Pump live ticks into `sink` until the session or the feed ends.
async fn forward(
    subscription: &mut Subscription,
    aggregator: &mut Aggregator,
    sink: &mpsc::Sender<MarketUpdate>,
    cancel: &mut watch::Receiver<bool>,
) -> Result<SessionEnd, AppError> {
    loop {
        let tick = tokio::select! {
            biased;
            _ = shutdown_requested(cancel) => return Ok(SessionEnd::Cancelled),
            tick = subscription.recv() => tick,
        };
        let Some(tick) = tick else {
            return Ok(SessionEnd::FeedClosed);
        };

        emit(sink, cancel, MarketUpdate::Price(PriceUpdate::from(&tick))).await?;
        aggregator.update(tick.price);
        emit(sink, cancel, indicator_message(aggregator)).await?;
    }
}

fn indicator_message(aggregator: &Aggregator) -> MarketUpdate {
    MarketUpdate::Indicators(IndicatorUpdate::new(
        aggregator.values(),
        aggregator.history(),
        now_ms(),
    ))
}

/// Hand `msg` to the consumer, giving up if it goes away or the session is cancelled.
async fn emit(
    sink: &mpsc::Sender<MarketUpdate>,
    cancel: &mut watch::Receiver<bool>,
    msg: MarketUpdate,
) -> Result<(), AppError> {
    tokio::select! {
        res = sink.send(msg) => res.map_err(|_| AppError::StreamTerminated),
        _ = shutdown_requested(cancel) => Err(AppError::StreamTerminated),
    }
}
