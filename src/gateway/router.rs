//! HTTP router and handlers

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::{ServeDir, ServeFile},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::auth::{AccessGate, Unauthorized, gate_middleware};
use crate::config::ServerConfig;
use crate::store::{Item, ItemStore, StoreError};

/// Shared application state
pub struct AppState {
    /// Item store
    pub store: Arc<ItemStore>,
    /// Access gate for the item routes
    pub gate: Arc<AccessGate>,
}

/// Failure of a single API call, mapped to a status code and a
/// `{"detail": ...}` body.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Store rejected the operation
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Gate rejected the request
    #[error(transparent)]
    Unauthorized(#[from] Unauthorized),

    /// Path id that cannot name an item
    #[error("invalid item id: {0}")]
    InvalidId(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            Self::Store(StoreError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Store(StoreError::NotFound(_)) | Self::InvalidId(_) => {
                (StatusCode::NOT_FOUND, "not found".to_string())
            }
            Self::Unauthorized(e) => (StatusCode::UNAUTHORIZED, e.to_string()),
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>, server: &ServerConfig) -> Router {
    let gate = Arc::clone(&state.gate);

    let items = Router::new()
        .route("/api/items", get(list_items).post(create_item))
        .route("/api/items/{id}/toggle", post(toggle_item))
        .route("/api/items/{id}", delete(delete_item))
        .route_layer(middleware::from_fn_with_state(gate, gate_middleware));

    let mut router = Router::new()
        .route("/api/health", get(health_handler))
        .merge(items);

    if let Some(dir) = &server.static_dir {
        router = router
            .route_service("/", ServeFile::new(dir.join("index.html")))
            .nest_service("/static", ServeDir::new(dir));
    }

    router
        .layer(DefaultBodyLimit::max(server.max_body_size))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(server.request_timeout))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// Liveness and gate status. Never gated.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let gate = &state.gate;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "auth": if gate.is_enabled() { "enabled" } else { "disabled" },
        "auth_type": "api_key",
        "header_name": gate.header_name(),
        "items": state.store.len(),
    }))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    q: Option<String>,
}

/// GET /api/items?q=
async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let items = state.store.list(params.q.as_deref());
    Json(json!({ "items": items }))
}

#[derive(Debug, Deserialize)]
struct CreateItem {
    title: String,
}

/// POST /api/items
async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateItem>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let item = state.store.create(&payload.title)?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// POST /api/items/{id}/toggle
async fn toggle_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Item>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.store.toggle(id)?))
}

/// DELETE /api/items/{id}
async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state.store.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Ids start at 1; anything else names no item.
fn parse_id(raw: &str) -> Result<u64, ApiError> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::InvalidId(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{HeaderValue, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(gate: AccessGate) -> (Router, Arc<ItemStore>) {
        let store = Arc::new(ItemStore::new());
        let state = Arc::new(AppState {
            store: Arc::clone(&store),
            gate: Arc::new(gate),
        });
        (create_router(state, &ServerConfig::default()), store)
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        // Extractor rejections come back as plain text
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn parse_id_accepts_positive_integers_only() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(parse_id("0").is_err());
        assert!(parse_id("-1").is_err());
        assert!(parse_id("abc").is_err());
        assert!(parse_id("").is_err());
    }

    #[tokio::test]
    async fn create_then_list() {
        let (router, _) = app(AccessGate::disabled());

        let (status, body) =
            send(&router, post_json("/api/items", &json!({"title": "  Buy milk  "}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({"id": 1, "title": "Buy milk", "done": false}));

        let (status, body) =
            send(&router, Request::get("/api/items").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_title_is_bad_request() {
        let (router, store) = app(AccessGate::disabled());

        let (status, body) = send(&router, post_json("/api/items", &json!({"title": "   "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "title is required");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn missing_title_is_unprocessable() {
        let (router, _) = app(AccessGate::disabled());
        let (status, _) = send(&router, post_json("/api/items", &json!({}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn list_filters_by_query() {
        let (router, store) = app(AccessGate::disabled());
        store.create("Buy milk").unwrap();
        store.create("Buy bread").unwrap();

        let (status, body) =
            send(&router, Request::get("/api/items?q=MILK").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"], json!([{"id": 1, "title": "Buy milk", "done": false}]));
    }

    #[tokio::test]
    async fn toggle_and_delete() {
        let (router, store) = app(AccessGate::disabled());
        store.create("task").unwrap();

        let (status, body) = send(
            &router,
            Request::post("/api/items/1/toggle").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["done"], true);

        let (status, body) =
            send(&router, Request::delete("/api/items/1").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unknown_or_malformed_ids_are_not_found() {
        let (router, _) = app(AccessGate::disabled());

        for uri in ["/api/items/999/toggle", "/api/items/abc/toggle", "/api/items/0/toggle"] {
            let (status, body) =
                send(&router, Request::post(uri).body(Body::empty()).unwrap()).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["detail"], "not found");
        }

        let (status, _) =
            send(&router, Request::delete("/api/items/999").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn enabled_gate_rejects_missing_and_wrong_keys() {
        let (router, store) = app(AccessGate::new(true, "k3y", "X-API-Key").unwrap());

        let requests = [
            Request::get("/api/items").body(Body::empty()).unwrap(),
            post_json("/api/items", &json!({"title": "x"})),
            Request::post("/api/items/1/toggle")
                .header("x-api-key", "wrong")
                .body(Body::empty())
                .unwrap(),
            Request::delete("/api/items/1")
                .header("x-api-key", "wrong")
                .body(Body::empty())
                .unwrap(),
        ];
        for request in requests {
            let (status, body) = send(&router, request).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["detail"], "missing or invalid API key");
        }
        assert_eq!(store.last_id(), 0);

        let request = Request::post("/api/items")
            .header("content-type", "application/json")
            .header("X-API-Key", "k3y")
            .body(Body::from(json!({"title": "ok"}).to_string()))
            .unwrap();
        let (status, _) = send(&router, request).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn health_is_public_and_reports_gate() {
        let (router, _) = app(AccessGate::new(true, "k3y", "X-API-Key").unwrap());

        let (status, body) =
            send(&router, Request::get("/api/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["auth"], "enabled");
        assert_eq!(body["auth_type"], "api_key");
        assert_eq!(body["header_name"], "X-API-Key");
        assert_eq!(body["items"], 0);
    }

    #[tokio::test]
    async fn health_reports_disabled_gate() {
        let (router, store) = app(AccessGate::disabled());
        store.create("one").unwrap();

        let (status, body) =
            send(&router, Request::get("/api/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["auth"], "disabled");
        assert_eq!(body["auth_type"], "api_key");
        assert_eq!(body["header_name"], "X-API-Key");
        assert_eq!(body["items"], 1);
    }

    #[tokio::test]
    async fn non_ascii_key_is_matched_byte_for_byte() {
        let (router, _) = app(AccessGate::new(true, "clé", "X-API-Key").unwrap());

        let request = Request::get("/api/items")
            .header("x-api-key", HeaderValue::from_bytes("clé".as_bytes()).unwrap())
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"items": []}));

        let request = Request::get("/api/items")
            .header("x-api-key", "cle")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn static_routes_absent_without_static_dir() {
        let (router, _) = app(AccessGate::disabled());
        let (status, _) = send(&router, Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
