use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Json,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use domain::DomainError;
use domain::driver::PortInfo;
use futures::Stream;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::state::AppState;

use tower_http::cors::{Any, CorsLayer};

type ApiResponse = (StatusCode, Json<Value>);

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/ports", get(get_ports))
        .route("/api/connect", post(connect))
        .route("/api/disconnect", post(disconnect))
        .route("/api/status", get(get_status))
        .route("/api/debug", get(get_debug))
        .route("/api/tare", post(tare))
        .route("/api/tare/clear", post(clear_tare))
        .route("/api/poll/start", post(start_polling))
        .route("/api/poll/stop", post(stop_polling))
        .route("/api/events", get(sse_handler))
        .layer(cors)
        .fallback_service(
            tower_http::services::ServeDir::new("public")
                .not_found_service(tower_http::services::ServeFile::new("public/index.html")),
        )
        .with_state(state)
}

fn ok(body: Value) -> ApiResponse {
    (StatusCode::OK, Json(body))
}

fn failure(status: StatusCode, error: impl ToString) -> ApiResponse {
    (
        status,
        Json(json!({ "ok": false, "error": error.to_string() })),
    )
}

/// Empty bodies deserialize to the default request.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiResponse> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| failure(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e)))
}

async fn get_ports(State(state): State<Arc<AppState>>) -> Json<Vec<PortInfo>> {
    match state.session.list_ports() {
        Ok(ports) => Json(ports),
        Err(e) => {
            warn!(error = %e, "Port enumeration failed");
            Json(Vec::new())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConnectRequest {
    path: Option<String>,
    port: Option<String>,
}

async fn connect(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResponse {
    let request: ConnectRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let Some(path) = request
        .path
        .or(request.port)
        .filter(|p| !p.trim().is_empty())
    else {
        return failure(StatusCode::BAD_REQUEST, "Missing port path");
    };

    match state.session.open(state.settings.connection_for(&path)).await {
        Ok(()) => ok(json!({ "ok": true, "port": path })),
        Err(e @ DomainError::PortNotFound { .. }) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "ok": false,
                "error": e.to_string(),
                "available": e.available_ports(),
            })),
        ),
        Err(e @ DomainError::InvalidConfig(_)) => failure(StatusCode::BAD_REQUEST, e),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn disconnect(State(state): State<Arc<AppState>>) -> ApiResponse {
    match state.session.close().await {
        Ok(()) => ok(json!({ "ok": true })),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.session.status())
}

async fn get_debug(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut body = json!(state.session.diagnostics());
    body["subscribers"] = json!(state.broadcast.subscriber_count());
    body["droppedEvents"] = json!(state.broadcast.dropped_events());
    Json(body)
}

async fn tare(State(state): State<Arc<AppState>>) -> ApiResponse {
    let offset = state.session.tare();
    ok(json!({ "ok": true, "zeroOffsetKg": offset }))
}

async fn clear_tare(State(state): State<Arc<AppState>>) -> ApiResponse {
    let offset = state.session.clear_tare();
    ok(json!({ "ok": true, "zeroOffsetKg": offset }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PollRequest {
    interval_ms: Option<u64>,
}

async fn start_polling(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResponse {
    let request: PollRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.session.start_polling(request.interval_ms).await {
        Ok(interval) => ok(json!({ "ok": true, "intervalMs": interval.as_millis() as u64 })),
        Err(e @ DomainError::NotConnected) => failure(StatusCode::CONFLICT, e),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn stop_polling(State(state): State<Arc<AppState>>) -> ApiResponse {
    match state.session.stop_polling().await {
        Ok(()) => ok(json!({ "ok": true })),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.broadcast.subscribe();
    info!(subscriber = %subscription.id(), "Event stream opened");

    // Events arrive already serialized; the receiver is released when the client goes away
    let stream = ReceiverStream::new(subscription.into_receiver())
        .map(|payload| Ok(Event::default().data(payload)));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
