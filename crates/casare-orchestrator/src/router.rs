use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::require_bearer;
use crate::routes::{events, jobs, robots, stats};
use crate::state::AppState;

/// Assembles the full HTTP/WS surface (§6). `/health` is left unauthenticated
/// so orchestrators behind a load balancer can be probed without a bearer
/// token; everything else requires one whenever `AppState.api_secret` is set.
pub fn build_router(state: AppState) -> Router {
  let public_routes = Router::new().route("/health", get(health));

  let protected_routes = Router::new()
    .route("/jobs", post(jobs::submit_job))
    .route("/jobs/:id", get(jobs::get_job))
    .route("/jobs/:id/cancel", post(jobs::cancel_job))
    .route("/jobs/:id/pause", post(jobs::pause_job))
    .route("/jobs/:id/resume", post(jobs::resume_job))
    .route("/robots", get(robots::list_robots))
    .route("/stats", get(stats::stats))
    .route("/events", get(events::events_ws))
    .route_layer(from_fn_with_state(state.clone(), require_bearer));

  Router::new()
    .merge(public_routes)
    .merge(protected_routes)
    .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
    .with_state(state)
}

async fn health() -> &'static str {
  "ok"
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::body::Body;
  use axum::http::{Request, StatusCode};
  use casare_fleet::{InMemoryRobotStore, UnlimitedAdmission};
  use casare_queue::InMemoryJobStore;
  use tower::ServiceExt;

  use super::*;

  fn test_state(api_secret: Option<String>) -> AppState {
    AppState::new(Arc::new(InMemoryJobStore::new()), Arc::new(InMemoryRobotStore::new()), Arc::new(UnlimitedAdmission), api_secret)
  }

  #[tokio::test]
  async fn health_check_requires_no_auth() {
    let router = build_router(test_state(Some("secret".to_string())));
    let response = router.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn protected_route_without_bearer_is_rejected() {
    let router = build_router(test_state(Some("secret".to_string())));
    let response = router.oneshot(Request::builder().uri("/robots").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn protected_route_with_correct_bearer_succeeds() {
    let router = build_router(test_state(Some("secret".to_string())));
    let response = router
      .oneshot(Request::builder().uri("/robots").header("authorization", "Bearer secret").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn no_configured_secret_admits_everything() {
    let router = build_router(test_state(None));
    let response = router.oneshot(Request::builder().uri("/robots").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
  }
}
