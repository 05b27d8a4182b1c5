//! HTTP surface: blotter REST endpoints plus the two server-sent-event
//! streams.
//!
//! The SSE handlers bridge the blocking event-bus subscribers into async
//! streams via `spawn_blocking`; a receive timeout becomes a `: ping`
//! comment frame so idle connections stay alive through proxies.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::Stream;
use tokio_util::sync::CancellationToken;

use blotter_bus::{EventBus, Subscriber};
use blotter_oms::OrderStore;
use blotter_sim::MarketSim;

use crate::handlers::{AmendRequest, CancelRequest, OrderRequest, UiHandlers};

/// Shared state for all routes.
pub struct ServerState {
    pub store: Arc<OrderStore>,
    pub market: Arc<MarketSim>,
    pub bus: Arc<EventBus>,
    pub handlers: Arc<UiHandlers>,
}

/// Book depth returned by `/orderbook`.
const BOOK_DEPTH: usize = 5;

/// Symbol used when `/orderbook` is called without one.
const DEFAULT_BOOK_SYMBOL: &str = "AAPL";

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// `GET /snapshot`: the whole store as a JSON array, insertion order.
async fn snapshot_handler(State(state): State<Arc<ServerState>>) -> Json<serde_json::Value> {
    Json(state.store.snapshot())
}

/// `GET /stats`: aggregate blotter statistics.
async fn stats_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(state.store.stats())
}

/// `GET /orderbook?symbol=S`: synthesized book for one symbol.
async fn orderbook_handler(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let symbol = params
        .get("symbol")
        .map(String::as_str)
        .unwrap_or(DEFAULT_BOOK_SYMBOL);
    Json(state.market.order_book(symbol, BOOK_DEPTH))
}

/// `POST /order`
async fn order_handler(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<OrderRequest>,
) -> impl IntoResponse {
    match state.handlers.submit_order(&req) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))),
        Err(message) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": message})),
        ),
    }
}

/// `POST /cancel`
async fn cancel_handler(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<CancelRequest>,
) -> impl IntoResponse {
    match state.handlers.cancel_order(&req) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))),
        Err(message) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": message})),
        ),
    }
}

/// `POST /amend`
async fn amend_handler(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<AmendRequest>,
) -> impl IntoResponse {
    match state.handlers.amend_order(&req) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))),
        Err(message) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": message})),
        ),
    }
}

/// Turn a bus subscriber into an SSE stream of named events.
fn sse_stream(
    sub: Subscriber,
    event_name: &'static str,
    idle: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(sub, move |sub| async move {
        let join = tokio::task::spawn_blocking(move || {
            let payload = sub.recv_timeout(idle);
            (payload, sub)
        })
        .await;

        let (payload, sub) = match join {
            Ok(pair) => pair,
            Err(_) => return None,
        };

        let event = match payload {
            Some(data) => Event::default().event(event_name).data(data),
            // Timed out: keep-alive comment (`: ping`).
            None => Event::default().comment("ping"),
        };
        Some((Ok(event), sub))
    })
}

/// `GET /events`: snapshot stream, `event: update` frames.
async fn events_handler(
    State(state): State<Arc<ServerState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let sub = state.bus.orders.subscribe();
    Sse::new(sse_stream(sub, "update", Duration::from_secs(5)))
}

/// `GET /marketdata`: tick batch stream, `event: marketdata` frames.
async fn marketdata_handler(
    State(state): State<Arc<ServerState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let sub = state.bus.market_data.subscribe();
    Sse::new(sse_stream(sub, "marketdata", Duration::from_secs(1)))
}

/// Build the router.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/snapshot", get(snapshot_handler))
        .route("/stats", get(stats_handler))
        .route("/orderbook", get(orderbook_handler))
        .route("/order", post(order_handler))
        .route("/cancel", post(cancel_handler))
        .route("/amend", post(amend_handler))
        .route("/events", get(events_handler))
        .route("/marketdata", get(marketdata_handler))
        .with_state(state)
}

/// Bind and serve until cancelled.
pub async fn run_server(
    state: Arc<ServerState>,
    port: u16,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let app = router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "HTTP server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await?;

    Ok(())
}
