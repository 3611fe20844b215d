use axum::{Router, extract::FromRef, http::HeaderName, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod token;
pub mod validation;

// Access-segregated routers (public, bearer, admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{PostgresRepository, Repositories};
pub use token::TokenService;

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_user, handlers::login, handlers::update_user, handlers::delete_user,
        handlers::create_news, handlers::list_all_news, handlers::update_news,
        handlers::delete_news
    ),
    components(
        schemas(
            models::Status, models::StatusResponse, models::Credentials,
            models::CreateNewsRequest, models::UpdateNewsRequest, models::UserResponse,
            models::LoginResponse, models::NewsResponse, models::NewsItem,
            models::NewsListResponse, error::ErrorResponse,
        )
    ),
    tags(
        (name = "news-service", description = "News publishing API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, immutable container cloned into every request: the storage gateway,
/// the token signer/verifier, the loaded configuration and the id of the
/// seeded administrator row.
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub tokens: TokenService,
    pub config: AppConfig,
    /// Only this user's logins carry `role = "admin"`.
    pub admin_id: Option<i32>,
}

impl AppState {
    /// Wires a token service over `config.jwt_secret` using the system clock.
    /// No account holds the admin role until [`with_admin`] is called.
    ///
    /// [`with_admin`]: AppState::with_admin
    pub fn new(repos: Repositories, config: AppConfig) -> Self {
        let tokens = TokenService::with_system_clock(&config.jwt_secret);
        Self {
            repos,
            tokens,
            config,
            admin_id: None,
        }
    }

    pub fn with_admin(mut self, admin_id: Option<i32>) -> Self {
        self.admin_id = admin_id;
        self
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for Repositories {
    fn from_ref(app_state: &AppState) -> Repositories {
        app_state.repos.clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing tree, applies the access gates per router and the
/// observability layers globally, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");
    let request_timeout = state.config.request_timeout;

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Bearer token required. The gate rejects before any handler runs.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::auth_middleware,
            )),
        )
        // Bearer token with `role = "admin"` required.
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::admin_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id))
                // Dropping the handler future on expiry also drops any in-flight
                // store query it was awaiting.
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span so every log line of one request carries the
/// same `req_id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
