use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use server::{
    build_router,
    config::load_settings,
    AppState,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    let state = AppState::from_settings(&settings);
    info!(
        products = state.catalog.len(),
        require_csrf = state.require_csrf,
        price_endpoint = %settings.price_endpoint,
        "price service configured"
    );
    let app = build_router(Arc::new(state), &settings.price_endpoint);

    let addr: SocketAddr = settings
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.bind_addr))?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
