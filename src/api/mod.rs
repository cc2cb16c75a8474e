//! HTTP surface: a stateless router over the three relay components.
//!
//! Every operation is triggered by one inbound request and completes within
//! it; the process keeps no state of its own beyond the store handles, so
//! any number of instances can front the same store.

pub mod error;
mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use std::sync::Arc;

use crate::queue::CommandQueue;
use crate::registry::PresenceRegistry;
use crate::screen::ScreenRelay;
use crate::store::Store;

use handlers::*;

/// Default request body cap. Frames arrive as base64-encoded JPEG, so the
/// limit sits well above a typical JSON body cap.
pub const DEFAULT_BODY_LIMIT: usize = 8 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub registry: PresenceRegistry,
    pub relay: ScreenRelay,
    pub queue: CommandQueue,
}

impl AppState {
    /// Build the component set over one shared store.
    pub fn new(store: Store) -> Self {
        Self {
            registry: PresenceRegistry::new(store.clone()),
            relay: ScreenRelay::new(store.clone()),
            queue: CommandQueue::new(store),
        }
    }
}

/// Configuration for the HTTP router.
///
/// Use `RouterConfig::default()` in tests for an unlimited, CORS-open setup.
pub struct RouterConfig {
    /// Optional per-IP request rate limit (requests per second).
    pub rate_limit: Option<u32>,
    /// Maximum request body size in bytes.
    pub body_limit: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            rate_limit: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

pub fn router(state: AppState, config: RouterConfig) -> Router {
    let api = Router::new()
        .route("/api/register", post(register))
        .route("/api/targets", get(targets))
        .route("/api/heartbeat/{id}", post(heartbeat))
        .route("/api/screen/{id}", get(screen_pull).post(screen_push))
        .route("/api/commands", post(command_enqueue))
        .route("/api/commands/{id}", get(command_list))
        .route("/api/command_done", post(command_done))
        .with_state(state);

    // Apply rate limiting to the API routes if configured.
    let api = if let Some(rps) = config.rate_limit {
        use tower_governor::{
            governor::GovernorConfigBuilder, key_extractor::PeerIpKeyExtractor, GovernorLayer,
        };
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(u64::from(rps))
                .burst_size(rps)
                .key_extractor(PeerIpKeyExtractor)
                .finish()
                .unwrap(),
        );
        api.layer(GovernorLayer::new(governor_conf))
    } else {
        api
    };

    // The boundary is deliberately origin-open: the controller is served
    // from wherever the operator hosts it, and transport trust is the
    // surrounding deployment's concern.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(config.body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt; // for oneshot()

    fn test_app() -> Router {
        router(AppState::new(Store::memory()), RouterConfig::default())
    }

    #[tokio::test]
    async fn health_endpoint() {
        let response = test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn unmatched_route_is_enveloped_404() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Not found");
    }

    #[tokio::test]
    async fn cors_preflight_is_permissive() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/targets")
                    .header("origin", "https://controller.example")
                    .header("access-control-request-method", "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let app = router(
            AppState::new(Store::memory()),
            RouterConfig {
                body_limit: 1024,
                ..Default::default()
            },
        );
        let big = "x".repeat(4096);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/screen/abc")
                    .header("content-type", "application/json")
                    .body(Body::from(format!("{{\"screen\":\"{big}\"}}")))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
