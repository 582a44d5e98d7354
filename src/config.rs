use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;

use crate::indicator::FlatPricePolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub synthetic: SyntheticConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
    Live,
    Synthetic,
    /// Live when the exchange answers a ping at startup, synthetic otherwise.
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// `<sym>@miniTicker` + `<sym>@aggTrade` on the combined endpoint.
    Combined,
    /// `<sym>@ticker` on the raw endpoint.
    Ticker,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub mode: FeedMode,
    pub symbol: String,
    /// Ranked websocket base URLs, tried in order on every (re)connect.
    pub ws_endpoints: Vec<String>,
    pub stream: StreamKind,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub ping_interval_ms: u64,
    pub idle_timeout_ms: u64,
    pub handshake_timeout_ms: u64,
    pub subscriber_queue: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub interval_ms: u64,
    pub start_price: f64,
    pub max_step: f64,
    pub max_volume: f64,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Ranked REST base URLs for kline warm-up.
    pub rest_endpoints: Vec<String>,
    pub kline_interval: String,
    pub request_timeout_ms: u64,
    pub min_candles: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub default_period: usize,
    pub flat_price: FlatPricePolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub session_queue: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            mode: FeedMode::Auto,
            symbol: "btcusdt".to_string(),
            ws_endpoints: vec![
                "wss://stream.binance.com:9443".to_string(),
                "wss://stream.binance.us:9443".to_string(),
            ],
            stream: StreamKind::Combined,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            ping_interval_ms: 20_000,
            idle_timeout_ms: 60_000,
            handshake_timeout_ms: 10_000,
            subscriber_queue: 100,
        }
    }
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            start_price: 48_000.0,
            max_step: 50.0,
            max_volume: 1_000.0,
            seed: None,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            rest_endpoints: vec![
                "https://api.binance.us".to_string(),
                "https://api.binance.com".to_string(),
            ],
            kline_interval: "1h".to_string(),
            request_timeout_ms: 10_000,
            min_candles: 50,
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            default_period: 14,
            flat_price: FlatPricePolicy::Forward,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:50051".to_string(),
            session_queue: 64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Parse a Binance kline interval string (e.g. "1s", "1m", "1h", "1d", "1w", "1M") into milliseconds.
pub fn parse_interval_ms(s: &str) -> Result<u64> {
    if s.len() < 2 {
        bail!("invalid interval '{}': expected format like '1m'", s);
    }

    let (num_str, suffix) = s.split_at(s.len() - 1);
    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }

    let unit_ms = match suffix {
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "w" => 7 * 86_400_000,
        "M" => 30 * 86_400_000,
        _ => bail!(
            "invalid interval '{}': unsupported suffix '{}', expected one of s/m/h/d/w/M",
            s,
            suffix
        ),
    };

    n.checked_mul(unit_ms)
        .with_context(|| format!("invalid interval '{}': value is too large", s))
}

impl FeedConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

impl HistoryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Config {
    /// Load `config/default.toml` (or `QS_CONFIG_PATH`) and apply environment overrides.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("QS_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));
        let mut config = Self::from_path(&config_path)?;

        if let Ok(symbol) = std::env::var("QS_SYMBOL") {
            config.feed.symbol = symbol;
        }
        if let Ok(addr) = std::env::var("QS_BIND_ADDR") {
            config.server.bind_addr = addr;
        }
        if let Ok(mode) = std::env::var("QS_FEED_MODE") {
            config.feed.mode = match mode.trim().to_ascii_lowercase().as_str() {
                "live" => FeedMode::Live,
                "synthetic" => FeedMode::Synthetic,
                "auto" => FeedMode::Auto,
                other => bail!("QS_FEED_MODE '{}' is not one of live/synthetic/auto", other),
            };
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.feed.symbol.trim().is_empty(),
            "feed.symbol must not be empty"
        );
        ensure!(
            !self.feed.ws_endpoints.is_empty(),
            "feed.ws_endpoints must list at least one endpoint"
        );
        ensure!(
            self.feed.initial_backoff_ms > 0,
            "feed.initial_backoff_ms must be > 0"
        );
        ensure!(
            self.feed.initial_backoff_ms <= self.feed.max_backoff_ms,
            "feed.initial_backoff_ms ({}) exceeds feed.max_backoff_ms ({})",
            self.feed.initial_backoff_ms,
            self.feed.max_backoff_ms
        );
        ensure!(
            self.feed.subscriber_queue > 0,
            "feed.subscriber_queue must be > 0"
        );
        ensure!(
            self.feed.ping_interval_ms > 0,
            "feed.ping_interval_ms must be > 0"
        );
        ensure!(
            self.feed.handshake_timeout_ms > 0,
            "feed.handshake_timeout_ms must be > 0"
        );
        ensure!(
            self.feed.idle_timeout_ms > self.feed.ping_interval_ms,
            "feed.idle_timeout_ms must exceed feed.ping_interval_ms"
        );
        ensure!(
            !self.history.rest_endpoints.is_empty(),
            "history.rest_endpoints must list at least one endpoint"
        );
        parse_interval_ms(&self.history.kline_interval)
            .context("history.kline_interval is invalid")?;
        ensure!(
            self.indicators.default_period > 0,
            "indicators.default_period must be > 0"
        );
        ensure!(
            self.server.session_queue > 0,
            "server.session_queue must be > 0"
        );
        ensure!(
            self.synthetic.interval_ms > 0,
            "synthetic.interval_ms must be > 0"
        );
        ensure!(
            self.synthetic.start_price > 0.0,
            "synthetic.start_price must be > 0"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.feed.mode, FeedMode::Auto);
        assert_eq!(config.feed.ws_endpoints.len(), 2);
        assert_eq!(config.feed.initial_backoff(), Duration::from_secs(1));
        assert_eq!(config.feed.max_backoff(), Duration::from_secs(30));
        assert_eq!(config.indicators.default_period, 14);
        assert_eq!(config.history.min_candles, 50);
    }

    #[test]
    fn parse_interval_ms_handles_common_units() {
        assert_eq!(parse_interval_ms("1s").unwrap(), 1_000);
        assert_eq!(parse_interval_ms("15m").unwrap(), 900_000);
        assert_eq!(parse_interval_ms("1h").unwrap(), 3_600_000);
        assert!(parse_interval_ms("0m").is_err());
        assert!(parse_interval_ms("m").is_err());
        assert!(parse_interval_ms("5x").is_err());
    }
}
