//! parsec-server library surface: the axum `Router` and the handlers/state it
//! is built from. Split out from `main.rs` so integration tests can drive the
//! router in-process (`tower::ServiceExt::oneshot`) instead of spawning the
//! binary and needing an HTTP-reachable admin surface that doesn't exist —
//! organizations are seeded directly against the `Store`, the way the
//! administration interface would, not through this API.

pub mod config;
pub mod routes;
pub mod sse;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use parsec_core::constants::MAX_REQUEST_BODY_BYTES;
use state::AppState;

pub fn build_router(app: AppState) -> Router {
    Router::new()
        .route(
            "/anonymous/:organization_id",
            post(routes::anonymous_post).get(routes::anonymous_get),
        )
        .route("/invited/:organization_id", post(routes::invited_post))
        .route(
            "/authenticated/:organization_id",
            post(routes::authenticated_post),
        )
        .route(
            "/authenticated/:organization_id/events",
            get(routes::events_get),
        )
        .route(
            "/authenticated/:organization_id/tos",
            post(routes::authenticated_tos_post),
        )
        .route(
            "/anonymous_account",
            post(routes::account_scope_unimplemented),
        )
        .route(
            "/authenticated_account",
            post(routes::account_scope_unimplemented),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app)
}
