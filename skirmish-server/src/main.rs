//! Skirmish server entry point.

use std::sync::Arc;

use skirmish_core::encounter::InMemoryStore;
use skirmish_core::narrator::{ClaudeNarrator, NarratorConfig};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod app;

use app::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skirmish_server=debug,skirmish_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting skirmish server");

    let server_host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let server_port: u16 = std::env::var("SERVER_PORT")
        .or_else(|_| std::env::var("PORT"))
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .unwrap_or(3000);

    let mut narrator = ClaudeNarrator::from_env()?;
    if let Ok(model) = std::env::var("SKIRMISH_MODEL") {
        narrator = narrator.with_config(NarratorConfig {
            model: Some(model),
            ..NarratorConfig::default()
        });
    }

    let store = Arc::new(InMemoryStore::new());
    let app = Arc::new(App::new(store, Arc::new(narrator)));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let router = api::router(app)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = format!("{server_host}:{server_port}");
    tracing::info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
