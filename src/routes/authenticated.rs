use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Authenticated Router Module
///
/// Every route here sits behind `auth_middleware`, so handlers only run for a
/// request carrying a valid, unexpired bearer token.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- News ---
        // POST /news
        // Creates the article, then upserts and links its categories in order.
        .route("/news", post(handlers::create_news))
        // GET /list
        // All articles, newest first, with their linked category names.
        .route("/list", get(handlers::list_all_news))
        // PATCH /news/edit/{id}
        // Replaces title, content and the whole category set.
        .route("/news/edit/{id}", patch(handlers::update_news))
        // --- Users ---
        // PATCH /users/edit/{id}
        .route("/users/edit/{id}", patch(handlers::update_user))
}
