use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use scribe_api::routes;
use scribe_api::state::AppState;
use scribe_api::store::PgStore;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    let config = scribe_api::config::config();

    tracing_subscriber::fmt::init();
    tracing::info!("starting scribe-api in {:?} mode", config.environment);

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .connect(&database_url)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to database: {}", e));

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("database migrations failed");

    let state = AppState::new(Arc::new(PgStore::new(pool)));
    let app = routes::app(state);

    // Allow tests or deployments to override port via env
    let port = std::env::var("SCRIBE_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(config.server.port);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("scribe-api listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}
