use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::stream::{self, Stream};
use serde::Serialize;
use tokio::sync::watch;

use crate::error::AppError;
use crate::event::{FeedStatus, MarketUpdate};
use crate::session::{SessionBridge, StreamRequest};

#[derive(Clone)]
pub struct ServerState {
    pub bridge: Arc<SessionBridge>,
    pub shutdown: watch::Receiver<bool>,
}

#[derive(Debug, Serialize)]
struct FeedHealth {
    symbol: String,
    status: FeedStatus,
    subscribers: usize,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
    feeds: Vec<FeedHealth>,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stream", get(stream_updates))
        .with_state(state)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
            AppError::ConnectionFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let hub = state.bridge.feeds();
    let feeds: Vec<FeedHealth> = hub
        .symbols()
        .into_iter()
        .filter_map(|symbol| {
            hub.get(&symbol).map(|client| FeedHealth {
                symbol,
                status: client.status(),
                subscribers: client.subscriber_count(),
            })
        })
        .collect();
    Json(HealthResponse {
        ok: feeds.iter().all(|f| f.status.is_live()),
        feeds,
    })
}

fn to_event(update: &MarketUpdate) -> Event {
    match Event::default().event(update.kind()).json_data(update) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode market update");
            Event::default().event("error").data(e.to_string())
        }
    }
}

async fn stream_updates(
    State(state): State<ServerState>,
    Query(request): Query<StreamRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (rx, _handle) = state.bridge.open(request, state.shutdown.clone())?;

    // Dropping the stream (client gone) drops `rx`, which ends the session.
    let events = stream::unfold(rx, |mut rx| async move {
        let update = rx.recv().await?;
        Some((Ok(to_event(&update)), rx))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
