use async_trait::async_trait;

use crate::error::AppError;

/// One frame read from an upstream connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Text(String),
    /// Ping/pong or other control traffic; proves liveness only.
    Keepalive,
    Close,
}

/// An established upstream connection.
#[async_trait]
pub trait Connection: Send {
    /// Next frame, or `None` once the stream has ended.
    async fn recv(&mut self) -> Option<Result<Inbound, AppError>>;

    async fn ping(&mut self) -> Result<(), AppError>;

    async fn close(&mut self);
}

/// Dials a single endpoint URL.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, AppError>;
}
