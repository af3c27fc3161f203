#![warn(clippy::nursery, clippy::pedantic)]

use std::path::Path;

use anyhow::Result;
use futures::StreamExt;
use signal_hook::consts::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook_tokio::Signals;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use tinypaste_server::{router, store, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    if Path::new(".env").exists() {
        dotenvy::dotenv()?;
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let store = store::connect(&config)?;
    info!(
        storage = config.storage.describe(),
        test_mode = config.test_mode,
        "selected paste storage"
    );

    let bind_addr = config.bind_addr.clone();
    let app = router(AppState::new(config, store));

    let signals = Signals::new([SIGINT, SIGTERM, SIGQUIT])?;
    let signals_handle = signals.handle();

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown(signals))
        .await?;

    signals_handle.close();
    Ok(())
}

async fn shutdown(mut signals: Signals) {
    if let Some(signal) = signals.next().await {
        info!(signal, "received signal, shutting down");
    }
}
