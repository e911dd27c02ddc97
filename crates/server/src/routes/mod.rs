use axum::{
    body::Bytes,
    routing::{get, post},
    Router,
};
use serde::de::DeserializeOwned;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{error::AppError, state::AppState};

mod auth;
mod health;
mod public;
mod seed;
mod tickets;
mod users;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/healthz", get(health::health_check))
        // Auth routes
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/token", post(auth::client_credentials))
        .route("/auth/request_view_token", post(auth::request_view_token))
        .route("/auth/exchange_view_token", post(auth::exchange_view_token))
        // Public intake
        .route("/public/tickets", post(public::submit_ticket))
        // Tickets
        .route("/tickets", get(tickets::list))
        .route("/tickets/stats", get(tickets::stats))
        .route("/tickets/:id", get(tickets::show))
        .route("/tickets/:id/viewed", post(tickets::viewed))
        .route("/tickets/:id/assign", post(tickets::assign))
        .route("/tickets/:id/status", post(tickets::status))
        // Users
        .route("/users", get(users::list).post(users::create))
        .route("/users/:id", axum::routing::put(users::update).delete(users::remove))
        // Legacy seeding endpoints
        .route("/admin/seed", post(seed::disabled))
        .route("/admin/seed/", post(seed::disabled))
        .route("/admin/seed/faker", post(seed::disabled))
        .route("/admin/seed/reset_and_seed", post(seed::disabled))
        .route("/admin/seed/only_new", post(seed::disabled))
        .route("/admin/seed/reset", post(seed::reset))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Decodes an optional JSON body. An empty body yields `None`.
pub(crate) fn optional_json<T: DeserializeOwned>(body: &Bytes) -> Result<Option<T>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| AppError::validation(format!("body: {e}")))
}
