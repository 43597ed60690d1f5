//! HTTP API, health endpoints and Prometheus metrics server
//!
//! A thin JSON adapter over [`RatingEngine`](crate::rating::RatingEngine)
//! using Axum. Votes carry only the two ids; ratings are always read from
//! the store.

use crate::error::RatingError;
use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::types::{ItemId, ListOrder, ListQuery, NewItem, RatableItem};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Body of `POST /vote`
///
/// Unknown fields such as client-side ratings are accepted and ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct VoteRequest {
    pub winner_id: ItemId,
    pub loser_id: ItemId,
}

/// Query string of `GET /items`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemsParams {
    /// `rating` (default) or `id`
    pub order: Option<String>,
    pub creator: Option<String>,
    pub limit: Option<usize>,
}

impl ItemsParams {
    /// Parse into a store query; an unknown order is a malformed request
    fn into_query(self) -> std::result::Result<ListQuery, String> {
        let order = match self.order.as_deref() {
            None | Some("rating") | Some("rating_desc") => ListOrder::RatingDesc,
            Some("id") => ListOrder::Id,
            Some(other) => {
                return Err(format!(
                    "Unknown order '{}', expected 'rating' or 'id'",
                    other
                ))
            }
        };

        Ok(ListQuery {
            order,
            creator: self.creator,
            limit: self.limit,
        })
    }
}

/// Rating error rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub RatingError);

impl From<RatingError> for ApiError {
    fn from(error: RatingError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self.0;
        let (status, refetch) = match &error {
            RatingError::NotFound { .. }
            | RatingError::Conflict { .. }
            | RatingError::OutcomeStale { .. } => (StatusCode::CONFLICT, true),
            RatingError::InvalidOutcome { .. } | RatingError::InvalidItem { .. } => {
                (StatusCode::BAD_REQUEST, false)
            }
            // Only reached outside /pair, which renders its own placeholder
            RatingError::InsufficientItems { .. } => (StatusCode::CONFLICT, true),
            RatingError::DeadlineExceeded => (StatusCode::GATEWAY_TIMEOUT, false),
            RatingError::StorageUnavailable { .. } => (StatusCode::SERVICE_UNAVAILABLE, false),
            RatingError::Configuration { .. } => (StatusCode::INTERNAL_SERVER_ERROR, false),
        };

        let body = json!({
            "error": error.to_string(),
            "kind": error.kind(),
            "refetch": refetch,
        });

        (status, Json(body)).into_response()
    }
}

/// Record the error in metrics and hand it back for rendering
fn failed(state: &AppState, error: RatingError) -> ApiError {
    state.metrics().record_error(&error);
    ApiError(error)
}

/// Build the router with the rating API, health and metrics endpoints
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/pair", get(pair_handler))
        .route("/vote", post(vote_handler))
        .route("/items", get(list_items_handler).post(create_item_handler))
        .route("/items/{id}", get(get_item_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Bind the configured address and serve until `shutdown` resolves
pub async fn serve<F>(state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let service = &state.config().service;
    let addr: SocketAddr = format!("{}:{}", service.http_host, service.http_port)
        .parse()
        .context("Invalid HTTP server address")?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped");
    Ok(())
}

async fn root_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "service": state.config().service.name,
        "version": crate::VERSION,
        "rating": state.engine().calculator().config(),
        "endpoints": [
            "/pair",
            "/vote",
            "/items",
            "/items/{id}",
            "/health",
            "/ready",
            "/metrics"
        ]
    }))
}

/// Serve a random pair, or an empty placeholder when the gallery is too small
async fn pair_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    match state.engine().select_pair() {
        Ok(pair) => {
            state.metrics().record_pair_served();
            Ok(Json(json!({ "pair": pair })).into_response())
        }
        Err(RatingError::InsufficientItems { available }) => {
            debug!("Pair requested with only {} items", available);
            Ok(Json(json!({ "pair": null, "available": available })).into_response())
        }
        Err(e) => Err(failed(&state, e)),
    }
}

async fn vote_handler(
    State(state): State<Arc<AppState>>,
    Json(vote): Json<VoteRequest>,
) -> Result<Response, ApiError> {
    let metrics = state.metrics();
    let timer = metrics.start_timer();
    let deadline = Instant::now() + state.config().request_timeout();

    let report = state
        .engine()
        .record_outcome_before(&vote.winner_id, &vote.loser_id, deadline)
        .map_err(|e| {
            if matches!(e, RatingError::OutcomeStale { .. } | RatingError::NotFound { .. }) {
                warn!(
                    "Rejected vote {} over {}: {}",
                    vote.winner_id, vote.loser_id, e
                );
            }
            failed(&state, e)
        })?;

    metrics.record_outcome(&report, timer.stop());
    Ok(Json(report).into_response())
}

async fn list_items_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ItemsParams>,
) -> Result<Response, ApiError> {
    let query = match params.into_query() {
        Ok(query) => query,
        Err(message) => {
            debug!("Rejected listing request: {}", message);
            return Ok((StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response());
        }
    };
    let items: Vec<RatableItem> = state
        .engine()
        .leaderboard(&query)
        .map_err(|e| failed(&state, e))?
        .collect();

    Ok(Json(json!({
        "order": query.order,
        "count": items.len(),
        "items": items,
    }))
    .into_response())
}

async fn get_item_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ItemId>,
) -> Result<Response, ApiError> {
    match state.engine().get_item(&id) {
        Ok(item) => Ok(Json(item).into_response()),
        // A direct lookup of a missing id is a plain 404, not a stale vote
        Err(RatingError::NotFound { item_id }) => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Item not found: {}", item_id), "refetch": false })),
        )
            .into_response()),
        Err(e) => Err(failed(&state, e)),
    }
}

async fn create_item_handler(
    State(state): State<Arc<AppState>>,
    Json(new_item): Json<NewItem>,
) -> Result<Response, ApiError> {
    let item = state
        .engine()
        .add_item(new_item)
        .map_err(|e| failed(&state, e))?;

    state.metrics().record_item_added(&item);
    Ok((StatusCode::CREATED, Json(item)).into_response())
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    debug!("Health check requested");

    match HealthCheck::check(state).await {
        Ok(health) => {
            let status = match health.status {
                HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
                HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
            };
            (status, Json(health)).into_response()
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Readiness check requested");

    match HealthCheck::readiness_check(state).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready"),
        Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready"),
        Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
        Err(e) => {
            error!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
        }
    }
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let metrics = state.metrics();
    metrics.set_uptime(state.uptime());

    let metric_families = metrics.registry().gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            debug!("Serving {} metric families", metric_families.len());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, encoder.format_type().to_string())],
                buffer,
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt; // for oneshot

    fn seeded_state(ids: &[&str]) -> Arc<AppState> {
        let state = AppState::new(AppConfig::default()).unwrap();
        for id in ids {
            state
                .engine()
                .add_item(
                    NewItem::new(format!("https://img.example/{}.png", id), *id)
                        .with_id(*id)
                        .with_creator("tester"),
                )
                .unwrap();
        }
        Arc::new(state)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn vote(winner: &str, loser: &str, extra: Value) -> Request<Body> {
        let mut body = json!({ "winner_id": winner, "loser_id": loser });
        if let (Some(map), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            map.extend(extra.clone());
        }
        Request::builder()
            .method("POST")
            .uri("/vote")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_root_endpoint_reports_rating_config() {
        let app = router(seeded_state(&[]));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["service"], "gallery-elo");
        assert_eq!(body["rating"]["initial_rating"], 1000.0);
        assert_eq!(body["rating"]["k_factor"]["type"], "fixed");
    }

    #[tokio::test]
    async fn test_pair_placeholder_when_gallery_small() {
        let app = router(seeded_state(&["only"]));

        let response = app
            .oneshot(Request::builder().uri("/pair").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["pair"].is_null());
        assert_eq!(body["available"], 1);
    }

    #[tokio::test]
    async fn test_pair_served() {
        let state = seeded_state(&["a", "b"]);
        let app = router(state.clone());

        let response = app
            .oneshot(Request::builder().uri("/pair").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_ne!(body["pair"]["first"]["id"], body["pair"]["second"]["id"]);
        assert_eq!(state.metrics().votes().pairs_served_total.get(), 1);
    }

    #[tokio::test]
    async fn test_vote_ignores_client_ratings() {
        let state = seeded_state(&["w", "l"]);
        let app = router(state.clone());

        let response = app
            .oneshot(vote(
                "w",
                "l",
                json!({ "winner_rating": 5000.0, "loser_rating": 10.0 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["winner"]["new_rating"], 1016.0);
        assert_eq!(body["loser"]["new_rating"], 984.0);
        assert_eq!(state.metrics().votes().outcomes_recorded_total.get(), 1);
    }

    #[tokio::test]
    async fn test_vote_unknown_item_asks_for_refetch() {
        let state = seeded_state(&["w"]);
        let app = router(state.clone());

        let response = app.oneshot(vote("w", "gone", json!({}))).await.unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["refetch"], true);
        assert_eq!(body["kind"], "not_found");
        assert_eq!(
            state
                .metrics()
                .votes()
                .errors_total
                .with_label_values(&["not_found"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_self_vote_rejected() {
        let app = router(seeded_state(&["a", "b"]));

        let response = app.oneshot(vote("a", "a", json!({}))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_items_listing_orders() {
        let state = seeded_state(&["b", "a", "c"]);
        state
            .engine()
            .record_outcome(&"c".to_string(), &"a".to_string())
            .unwrap();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/items").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        let ids: Vec<&str> = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/items?order=id&limit=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["items"][0]["id"], "a");
        assert_eq!(body["items"][1]["id"], "b");
    }

    #[tokio::test]
    async fn test_unknown_order_is_bad_request() {
        let state = seeded_state(&["a", "b"]);
        let app = router(state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/items?order=newest")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("newest"));
        assert!(body.get("kind").is_none());
        assert_eq!(
            state
                .metrics()
                .votes()
                .errors_total
                .with_label_values(&["invalid_item"])
                .get(),
            0
        );
    }

    #[tokio::test]
    async fn test_create_and_fetch_item() {
        let app = router(seeded_state(&[]));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/items")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "url": "https://img.example/new.png", "prompt": "new" })
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["rating"], 1000.0);

        let id = created["id"].as_str().unwrap();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/items/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/items/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_and_ready_follow_running_flag() {
        let state = seeded_state(&["a", "b"]);
        let app = router(state.clone());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.start().await.unwrap();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");

        state.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = router(seeded_state(&["a", "b"]));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));
    }

    #[tokio::test]
    async fn test_404_handling() {
        let app = router(seeded_state(&[]));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
