use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use aitalks_backend::core;
use aitalks_backend::server;
use aitalks_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state = AppState::initialize().await?;
    core::logging::init(&state.paths);

    if !state.admin_token.is_configured() {
        tracing::warn!("No admin token configured; knowledge ingestion is disabled");
    }

    let bind_addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state.clone());
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
