//! Axum router construction.

use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    http::Request,
    routing::{delete, get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};

use super::{handlers, middleware, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
///
/// Must be called inside a Tokio runtime: the auth rate limiter spawns its
/// worker here.
pub fn build(state: AppState) -> Router {
    let cors = middleware::cors_layer(&state.frontend_origin);

    Router::new()
        .route("/health", get(handlers::health))
        .nest_service("/api/auth", auth_routes(state.clone()))
        .route("/api/me", get(handlers::me))
        .route("/api/hospitals", get(handlers::list_hospitals))
        .route("/api/hospitals/:id", get(handlers::get_hospital))
        .route(
            "/api/ngos",
            get(handlers::list_ngos).post(handlers::create_ngo),
        )
        .route("/api/ngos/:id", get(handlers::get_ngo))
        .route("/api/nearby", get(handlers::nearby_entities))
        .route(
            "/api/profile",
            get(handlers::get_profile).put(handlers::put_profile),
        )
        .route("/api/profile/emergency", get(handlers::emergency_card))
        .route(
            "/api/appointments",
            get(handlers::list_appointments).post(handlers::create_appointment),
        )
        .route(
            "/api/appointments/:id",
            patch(handlers::update_appointment).delete(handlers::delete_appointment),
        )
        .route(
            "/api/metrics",
            get(handlers::list_metrics).post(handlers::create_metric),
        )
        .route("/api/metrics/:id", delete(handlers::delete_metric))
        .route("/api/ai/timeline", get(handlers::metrics_timeline))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(middleware::REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

/// `/api/auth/*` behind one shared rate limiter. Requests beyond the limit
/// wait in a short queue; once that is full they are shed with 429.
fn auth_routes(state: AppState) -> Router {
    let throttle = state.auth_throttle;
    let routes = Router::new()
        .route("/request-otp", post(handlers::request_otp))
        .route("/verify", post(handlers::verify))
        .fallback(handlers::not_found)
        .with_state(state);

    let limited = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(middleware::handle_overload))
        .load_shed()
        .buffer::<Request<Body>>(throttle.queue)
        .rate_limit(throttle.requests, throttle.per)
        .service(routes);

    Router::new().fallback_service(limited)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::crypto::FieldCipher;
    use crate::directory::DirectoryCache;
    use crate::server::{middleware::AuthThrottle, state::tests::state_with};
    use axum::{
        body::Body,
        http::{header, Method, Request},
    };
    use tower::ServiceExt;

    async fn empty_state() -> AppState {
        state_with(FieldCipher::disabled(), DirectoryCache::new()).await
    }

    fn otp_request() -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/auth/request-otp")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"phone":"+919876543210"}"#))
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = build(empty_state().await);
        let req = Request::builder()
            .uri("/unknown")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn health_route_exists() {
        let app = build(empty_state().await);
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        // 503 because the test directory is empty.
        assert_eq!(resp.status(), 503);
    }

    #[tokio::test]
    async fn cors_preflight_allows_frontend_origin() {
        let app = build(empty_state().await);
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/profile")
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "http://localhost:5173"
        );
    }

    #[tokio::test]
    async fn cors_ignores_other_origins() {
        let app = build(empty_state().await);
        let req = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://evil.example")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn auth_routes_shed_requests_beyond_rate_limit() {
        let mut state = empty_state().await;
        state.auth_throttle = AuthThrottle {
            requests: 1,
            per: Duration::from_secs(60),
            queue: 1,
        };
        let app = build(state);

        let first = app.clone().oneshot(otp_request()).await.unwrap();
        assert_eq!(first.status(), 200);

        // Waits for the next window and occupies the only queue slot.
        let queued = tokio::spawn(app.clone().oneshot(otp_request()));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let shed = app.clone().oneshot(otp_request()).await.unwrap();
        assert_eq!(shed.status(), 429);
        queued.abort();

        // The limit covers /api/auth only.
        let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
        assert_eq!(app.oneshot(health).await.unwrap().status(), 503);
    }

    #[tokio::test]
    async fn unknown_auth_route_returns_404() {
        let app = build(empty_state().await);
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/unknown")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), 404);
    }
}
