use crate::{AppState, handlers};
use axum::{Router, routing::delete};

/// Admin Router Module
///
/// Nested under `/admin` and wrapped in `admin_middleware`: a valid token
/// without `role = "admin"` gets 403 here.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // DELETE /admin/news/{id}
        // Category links go with the article.
        .route("/news/{id}", delete(handlers::delete_news))
        // DELETE /admin/users/{id}
        .route("/users/{id}", delete(handlers::delete_user))
}
