//! HTTP boundary for tilnote.
//!
//! # Responsibility
//! - Parse and validate requests, authenticate bearer tokens, enforce roles.
//! - Run core services on the blocking pool and map their errors to statuses.
//!
//! # Invariants
//! - Handlers hold no storage state; each core call opens a scoped connection.

pub mod auth;
pub mod error;
pub mod extract;
pub mod request_id;
pub mod routes;
pub mod state;
pub mod validation;

pub use error::ApiError;
pub use state::AppState;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

/// Builds the full application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route(
            "/users",
            post(routes::users::create_user)
                .put(routes::users::update_user)
                .get(routes::users::get_users)
                .delete(routes::users::delete_user),
        )
        .route("/users/login", post(routes::users::login))
        .route(
            "/notes",
            post(routes::notes::create_note).get(routes::notes::get_notes),
        )
        .route(
            "/notes/:id",
            get(routes::notes::get_note)
                .put(routes::notes::update_note)
                .delete(routes::notes::delete_note),
        )
        .route("/tags", get(routes::notes::list_tags))
        .layer(middleware::from_fn(request_id::request_context))
        .with_state(state)
}
