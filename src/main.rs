use news_service::{
    AppState,
    config::{AppConfig, Env},
    create_router, handlers,
    repository::{self, PostgresRepository, Repositories},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, connects and migrates the store,
/// seeds the admin account, then serves HTTP until the process is stopped.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Configuration (fail fast, before anything binds)
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // 2. Logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "news_service=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Store
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.db_url)
        .await
        .inspect_err(|e| tracing::error!(op = "startup.connect", error = %e, "failed to connect to Postgres"))?;

    repository::create_tables(&pool)
        .await
        .inspect_err(|e| tracing::error!(op = "startup.create_tables", error = %e, "failed to create tables"))?;

    let repos = Repositories::from_store(Arc::new(PostgresRepository::new(pool)));

    let admin_id = match &config.admin {
        Some(seed) => handlers::seed_admin(&repos, seed)
            .await?
            .map(|admin| admin.user_id),
        None => None,
    };
    if config.admin.is_some() && admin_id.is_none() {
        tracing::warn!(op = "startup.seed_admin", "starting without an admin account");
    }

    // 4. State, router and server
    let addr = config.http_addr.clone();
    let app = create_router(AppState::new(repos, config).with_admin(admin_id));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://{addr}/swagger-ui");

    axum::serve(listener, app).await?;
    Ok(())
}
