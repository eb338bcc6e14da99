mod api;
mod bootstrap;
mod claims;
mod config;
mod error;
mod reconciliation;
mod server;
mod upstream;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tower_http=debug,payout_reconciler=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    info!("🚀 Starting payout reconciler");

    let config = config::Config::from_env().context("loading configuration")?;

    let app = bootstrap::initialize_app(&config)
        .await
        .context("initializing application")?;

    let periodic = config
        .reconcile_interval()
        .map(|interval| bootstrap::spawn_periodic_reconciliation(app.state.engine.clone(), interval));

    let router = server::create_app(app.state);
    let served = server::run_server(router, &config.bind_address).await;

    if let Some(handle) = periodic {
        handle.abort();
    }
    app.pool.close().await;
    info!("✓ Database pool closed");

    served.context("serving HTTP")?;
    Ok(())
}
