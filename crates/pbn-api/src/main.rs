//! PBN backlink risk scorer API server.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use pbn_api::config::ApiConfig;
use pbn_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("starting pbn-api");

    let config = ApiConfig::from_env();
    let bind_addr = config.bind_addr;
    let state = Arc::new(AppState::new(&config));
    let app = pbn_api::app(state);

    info!("listening on http://{}", bind_addr);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
