use async_trait::async_trait;

use crate::config::HistoryConfig;
use crate::error::AppError;
use crate::model::candle::Candle;
use crate::session::warmup::HistoricalSource;

use super::types::{candle_from_kline_row, BinanceApiErrorResponse};

/// Exchange caps `limit` at 1000 rows per request.
pub const MAX_KLINE_LIMIT: usize = 1000;

/// Public market-data REST client over a ranked list of base URLs.
pub struct BinanceRestClient {
    http: reqwest::Client,
    base_urls: Vec<String>,
}

impl BinanceRestClient {
    pub fn new(config: &HistoryConfig) -> Result<Self, AppError> {
        if config.rest_endpoints.is_empty() {
            return Err(AppError::InvalidConfiguration(
                "history needs at least one REST endpoint".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            base_urls: config
                .rest_endpoints
                .iter()
                .map(|u| u.trim_end_matches('/').to_string())
                .collect(),
        })
    }

    /// Succeeds if any ranked endpoint answers `/api/v3/ping`.
    pub async fn ping(&self) -> Result<String, AppError> {
        let mut last_error = String::new();
        for base in &self.base_urls {
            let url = format!("{}/api/v3/ping", base);
            match self.http.get(&url).send().await.and_then(|r| r.error_for_status()) {
                Ok(_) => return Ok(base.clone()),
                Err(e) => {
                    tracing::debug!(endpoint = %base, error = %e, "Ping failed");
                    last_error = e.to_string();
                }
            }
        }
        Err(AppError::ConnectionFailure(format!(
            "no REST endpoint answered ping (last: {})",
            last_error
        )))
    }

    async fn fetch_klines_from(
        &self,
        base: &str,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, AppError> {
        let url = format!("{}/api/v3/klines", base);
        let limit = limit.to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", interval),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<BinanceApiErrorResponse>(&body) {
                return Err(AppError::ConnectionFailure(format!(
                    "HTTP {} (code {}): {}",
                    status, err.code, err.msg
                )));
            }
            return Err(AppError::ConnectionFailure(format!("HTTP {}: {}", status, body)));
        }

        let rows: Vec<Vec<serde_json::Value>> = resp.json().await?;
        let total = rows.len();
        let candles: Vec<Candle> = rows.iter().filter_map(|r| candle_from_kline_row(r)).collect();
        if candles.len() < total {
            tracing::debug!(skipped = total - candles.len(), "Skipped malformed kline rows");
        }
        Ok(candles)
    }
}

#[async_trait]
impl HistoricalSource for BinanceRestClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, AppError> {
        let symbol = symbol.trim().to_ascii_uppercase();
        let limit = limit.clamp(1, MAX_KLINE_LIMIT);

        let mut last_error = String::new();
        for base in &self.base_urls {
            match self.fetch_klines_from(base, &symbol, interval, limit).await {
                Ok(candles) => {
                    tracing::info!(
                        symbol = %symbol,
                        endpoint = %base,
                        count = candles.len(),
                        "Fetched historical klines"
                    );
                    return Ok(candles);
                }
                Err(e) => {
                    tracing::warn!(endpoint = %base, error = %e, "Kline fetch failed, trying next endpoint");
                    last_error = e.to_string();
                }
            }
        }
        Err(AppError::ConnectionFailure(format!(
            "all kline endpoints failed (last: {})",
            last_error
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_trimmed() {
        let config = HistoryConfig {
            rest_endpoints: vec!["https://api.binance.us/".to_string()],
            ..HistoryConfig::default()
        };
        let client = BinanceRestClient::new(&config).unwrap();
        assert_eq!(client.base_urls, vec!["https://api.binance.us".to_string()]);
    }

    #[test]
    fn empty_endpoint_list_is_rejected() {
        let config = HistoryConfig {
            rest_endpoints: Vec::new(),
            ..HistoryConfig::default()
        };
        assert!(matches!(
            BinanceRestClient::new(&config),
            Err(AppError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoints_report_connection_failure() {
        let config = HistoryConfig {
            rest_endpoints: vec!["http://127.0.0.1:9".to_string()],
            request_timeout_ms: 500,
            ..HistoryConfig::default()
        };
        let client = BinanceRestClient::new(&config).unwrap();
        let err = client.fetch_candles("btcusdt", "1h", 50).await.unwrap_err();
        assert!(matches!(err, AppError::ConnectionFailure(_)));
    }
}
