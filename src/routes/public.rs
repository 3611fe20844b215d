use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check; answers without touching the store.
        .route("/health", get(|| async { "ok" }))
        // POST /users/new
        .route("/users/new", post(handlers::create_user))
        // POST /login
        // Issues a 600-second bearer token.
        .route("/login", post(handlers::login))
}
