mod alerts;
pub mod auth;
pub mod error;
mod export;
pub mod extract;
pub mod rate_limit;
mod sessions;
mod spaces;
mod users;
pub mod validation;

use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub use alerts::AlertListResponse;
pub use export::ExportFormat;
pub use sessions::SessionListResponse;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Login is the only unauthenticated write, so it carries the limiter
    let auth_routes = Router::new()
        .route(
            "/login",
            post(auth::login).layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit::rate_limit_auth,
            )),
        )
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    // Every handler below takes a `User` extractor and checks its own role
    let api_routes = Router::new()
        // Sessions
        .route("/sessions", get(sessions::list_sessions).post(sessions::create_session))
        .route("/sessions/export", get(export::export_sessions))
        .route("/sessions/:id", get(sessions::get_session))
        .route("/sessions/:id/exit", post(sessions::exit_session))
        .route("/sessions/:id/pay", post(sessions::pay_session))
        .route("/stats", get(sessions::get_stats))
        // Alerts
        .route("/alerts", get(alerts::list_alerts).post(alerts::create_alert))
        .route("/alerts/:id/read", post(alerts::mark_alert_read))
        // Spaces
        .route("/spaces", get(spaces::list_spaces).post(spaces::create_space))
        // Users
        .route("/users", get(users::list_users).post(users::create_user));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(cors_layer(&state.config.server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Permissive when no origins are configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health_check() -> &'static str {
    "OK"
}
