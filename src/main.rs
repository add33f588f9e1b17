use axum::{Json, Router, debug_handler, response::IntoResponse, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use parlor::providers::Providers;
use parlor::store::MessageStore;
use parlor::{AppState, Config, chat, db, session};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::from_default_env()
                .add_directive("parlor=info".parse()?)
                .add_directive("warn".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    let db_pool = db::connect(&config.database_url).await?;

    let state = AppState {
        store: MessageStore::new(db_pool),
        providers: Providers::new(&config),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .nest(&config.http_prefix, chat::router())
        .with_state(state)
        .layer(session::layer())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

#[debug_handler]
async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
