//! Dashboard service: snapshot API, live SSE stream and replay.

use crate::html::DASHBOARD_HTML;
use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::sse::{Event, Sse},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use futures_util::Stream;
use hooktrap_core::{CapturedRequest, Store};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

/// Replay timeout for the outbound call to the capture endpoint
const REPLAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Traceability header identifying the original request of a replay
const REPLAYED_FROM_HEADER: &str = "X-Replayed-From";

#[derive(Clone)]
pub struct DashboardState {
    pub store: Arc<Store>,
    /// Address of the local capture endpoint replays are sent to
    pub capture_addr: String,
    pub client: reqwest::Client,
}

impl DashboardState {
    pub fn new(store: Arc<Store>, capture_addr: String) -> Self {
        Self {
            store,
            capture_addr,
            client: reqwest::Client::builder()
                .timeout(REPLAY_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/api/requests", get(list_requests))
        .route("/events", get(events))
        .route("/api/replay", post(replay))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn dashboard_page() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn list_requests(State(state): State<DashboardState>) -> Json<Vec<CapturedRequest>> {
    Json(state.store.get_all().await)
}

/// Unsubscribes when the SSE stream is dropped, so a disconnecting
/// client never leaks its channel.
struct SubscriptionGuard {
    store: Arc<Store>,
    id: u64,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let store = self.store.clone();
        let id = self.id;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { store.unsubscribe(id).await });
        }
    }
}

async fn events(
    State(state): State<DashboardState>,
) -> (
    [(header::HeaderName, &'static str); 2],
    Sse<impl Stream<Item = Result<Event, Infallible>>>,
) {
    let subscriber = state.store.subscribe().await;
    let guard = SubscriptionGuard {
        store: state.store.clone(),
        id: subscriber.id,
    };
    let mut rx = subscriber.rx;

    let stream = async_stream::stream! {
        // Moved into the stream so it drops with it.
        let _guard = guard;
        while let Some(request) = rx.recv().await {
            match serde_json::to_string(&request) {
                Ok(json) => yield Ok(Event::default().data(json)),
                Err(e) => tracing::warn!("failed to serialize SSE event: {e}"),
            }
        }
    };

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(stream),
    )
}

#[derive(Debug, Deserialize)]
struct ReplayRequest {
    id: String,
}

#[derive(Debug, Serialize)]
struct ReplayResponse {
    status: u16,
    #[serde(rename = "statusText")]
    status_text: String,
    body: String,
}

async fn replay(
    State(state): State<DashboardState>,
    payload: Result<Json<ReplayRequest>, axum::extract::rejection::JsonRejection>,
) -> Response {
    let Ok(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "invalid request body").into_response();
    };

    let Some(stored) = state.store.get(&request.id).await else {
        return (StatusCode::NOT_FOUND, "request not found").into_response();
    };

    let url = format!("http://{}{}", state.capture_addr, stored.url);
    let method = reqwest::Method::from_bytes(stored.method.as_bytes())
        .unwrap_or(reqwest::Method::GET);

    let mut builder = state.client.request(method, &url);
    for (name, value) in &stored.headers {
        if !name.eq_ignore_ascii_case("host") {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }
    builder = builder.header(REPLAYED_FROM_HEADER, &stored.id);
    if !stored.body.is_empty() {
        builder = builder.body(stored.body.clone());
    }

    match builder.send().await {
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Json(ReplayResponse {
                status: status.as_u16(),
                status_text: format!(
                    "{} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default()
                ),
                body,
            })
            .into_response()
        }
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            format!("failed to replay request: {e}"),
        )
            .into_response(),
    }
}
