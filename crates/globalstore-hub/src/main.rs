//! globalstore hub server.
//!
//! - WebSocket endpoint: /v1/hub (parent origin = `Origin` header)
//! - Config from `$GLOBALSTORE_CONFIG` (default `globalstore.yaml`)
//! - Log filter from `RUST_LOG`

use tracing_subscriber::{fmt, EnvFilter};

use globalstore_core::error::{GlobalStoreError, Result};
use globalstore_hub::{app_state, config, router};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::var("GLOBALSTORE_CONFIG").unwrap_or_else(|_| "globalstore.yaml".into());
    let cfg = config::load_from_file(&path)?;
    let listen = cfg.server.listen_addr()?;

    let state = app_state::AppState::new(cfg)?;
    let app = router::build_router(state);

    tracing::info!(%listen, config = %path, "globalstore-hub starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| GlobalStoreError::Transport(format!("bind {listen} failed: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| GlobalStoreError::Internal(format!("server failed: {e}")))
}
