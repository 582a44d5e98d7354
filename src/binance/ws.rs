use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::config::StreamKind;
use crate::error::AppError;
use crate::feed::transport::{Connection, Connector, Inbound};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build the stream URL for `symbol` on one ranked base endpoint.
pub fn stream_url(base: &str, symbol: &str, kind: StreamKind) -> Result<String, AppError> {
    let symbol = symbol.trim().to_ascii_lowercase();
    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::InvalidConfiguration(format!(
            "invalid symbol '{}'",
            symbol
        )));
    }
    let mut url = Url::parse(base)
        .map_err(|e| AppError::InvalidConfiguration(format!("bad ws endpoint '{}': {}", base, e)))?;
    match kind {
        StreamKind::Combined => {
            url.set_path("/stream");
            url.set_query(Some(&format!(
                "streams={}@miniTicker/{}@aggTrade",
                symbol, symbol
            )));
        }
        StreamKind::Ticker => {
            url.set_path(&format!("/ws/{}@ticker", symbol));
            url.set_query(None);
        }
    }
    Ok(url.to_string())
}

/// `tokio-tungstenite` dialer for Binance market streams.
#[derive(Debug, Default, Clone)]
pub struct BinanceWsConnector;

#[async_trait]
impl Connector for BinanceWsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, AppError> {
        let (ws_stream, _resp) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| AppError::ConnectionFailure(format!("{}: {}", url, e)))?;
        Ok(Box::new(BinanceWsConnection { inner: ws_stream }))
    }
}

struct BinanceWsConnection {
    inner: WsStream,
}

#[async_trait]
impl Connection for BinanceWsConnection {
    async fn recv(&mut self) -> Option<Result<Inbound, AppError>> {
        let frame = match self.inner.next().await? {
            Ok(tungstenite::Message::Text(text)) => Inbound::Text(text),
            // tokio-tungstenite answers pings itself
            Ok(tungstenite::Message::Ping(_)) | Ok(tungstenite::Message::Pong(_)) => {
                Inbound::Keepalive
            }
            Ok(tungstenite::Message::Close(_)) => Inbound::Close,
            Ok(_) => Inbound::Keepalive,
            Err(e) => return Some(Err(AppError::WebSocket(e.to_string()))),
        };
        Some(Ok(frame))
    }

    async fn ping(&mut self) -> Result<(), AppError> {
        self.inner
            .send(tungstenite::Message::Ping(Vec::new()))
            .await
            .map_err(|e| AppError::WebSocket(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.inner.close(None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_stream_url() {
        let url = stream_url("wss://stream.binance.com:9443", "BTCUSDT", StreamKind::Combined)
            .unwrap();
        assert_eq!(
            url,
            "wss://stream.binance.com:9443/stream?streams=btcusdt@miniTicker/btcusdt@aggTrade"
        );
    }

    #[test]
    fn ticker_stream_url() {
        let url = stream_url("wss://stream.binance.us:9443/", "ethusdt", StreamKind::Ticker).unwrap();
        assert_eq!(url, "wss://stream.binance.us:9443/ws/ethusdt@ticker");
    }

    #[test]
    fn rejects_symbol_that_would_alter_the_query() {
        for symbol in ["btc&x=1", "btc/usdt", ""] {
            assert!(matches!(
                stream_url("wss://stream.binance.com:9443", symbol, StreamKind::Combined),
                Err(AppError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn rejects_malformed_endpoint() {
        assert!(matches!(
            stream_url("not a url", "btcusdt", StreamKind::Combined),
            Err(AppError::InvalidConfiguration(_))
        ));
    }
}
