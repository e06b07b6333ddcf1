//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::hub::{HubError, PlayerMap};
use crate::util::time::uptime_secs;
use crate::ws::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.client_origin);
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/players", get(players_handler))
        .route("/ws", get(ws_handler))
        .fallback_service(static_files)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS from a comma-separated origin list, or any origin for "*"
fn build_cors(client_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }

    let allowed_origins: Vec<header::HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    // Credentials cannot be combined with a wildcard origin
    cors.allow_origin(allowed_origins).allow_credentials(true)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_players: state.hub.player_count(),
    })
}

// ============================================================================
// Player view
// ============================================================================

async fn players_handler(State(state): State<AppState>) -> Result<Json<PlayerMap>, HubError> {
    Ok(Json(state.hub.snapshot().await?))
}

// ============================================================================
// Error handling
// ============================================================================

impl IntoResponse for HubError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            HubError::DuplicateConnection(_) => StatusCode::CONFLICT,
            HubError::Closed => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::config::Config;

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_ok_and_player_count() {
        let (state, hub) = AppState::new(Config::for_tests());
        tokio::spawn(hub.run());

        let (tx, _rx) = crate::hub::outbound_channel();
        state.hub.connect(Uuid::new_v4(), tx).await.unwrap();

        let (status, body) = get_json(build_router(state), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["active_players"], 1);
    }

    #[tokio::test]
    async fn players_endpoint_returns_snapshot() {
        let (state, hub) = AppState::new(Config::for_tests());
        tokio::spawn(hub.run());

        let id = Uuid::new_v4();
        let (tx, _rx) = crate::hub::outbound_channel();
        let record = state.hub.connect(id, tx).await.unwrap();

        let (status, body) = get_json(build_router(state), "/api/players").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[id.to_string()]["name"], record.name);
        assert_eq!(body.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn players_endpoint_unavailable_when_hub_stopped() {
        let (state, hub) = AppState::new(Config::for_tests());
        drop(hub);

        let (status, body) = get_json(build_router(state), "/api/players").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Hub is not running");
    }

    #[test]
    fn cors_layers_apply_for_wildcard_and_origin_lists() {
        // tower-http rejects invalid wildcard/credential combinations when layering
        let _: Router = Router::new().layer(build_cors("http://localhost:3000, https://tidal.example"));
        let _: Router = Router::new().layer(build_cors("*"));
    }
}
