use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::{
    api::{handler::AppState, webhook::run_detached},
    claims::PgClaimStore,
    config::Config,
    error::{AppResult, UpstreamError},
    reconciliation::{EngineConfig, ReconciliationEngine},
    upstream::{HttpPayoutSource, RetryPolicy},
};

/// Everything `main` needs to serve and later shut down cleanly
pub struct App {
    pub state: AppState,
    pub pool: PgPool,
}

pub async fn initialize_app(config: &Config) -> AppResult<App> {
    info!("Initializing application components ...");

    let pool = initialize_database(config).await?;

    let store = Arc::new(PgClaimStore::new(pool.clone()));

    let mut retry = RetryPolicy::new(
        config.retry_max_attempts,
        config.retry_initial_backoff(),
        config.retry_backoff_multiplier,
    );
    if !config.retry_client_errors {
        retry = retry.with_predicate(UpstreamError::is_transient);
    }
    let source = Arc::new(HttpPayoutSource::new(
        &config.upstream_api_base_url,
        config.upstream_timeout(),
        retry,
    )?);
    info!(
        "✅ Upstream client ready: {} ({:?})",
        config.upstream_api_base_url, retry
    );

    let engine_config = EngineConfig {
        batch_size: config.batch_size,
        process_concurrency: config.process_concurrency,
        stuck_timeout: config.stuck_timeout(),
    };
    let engine = Arc::new(ReconciliationEngine::new(store.clone(), source, engine_config));
    info!("✅ Reconciliation engine initialized: {:?}", engine_config);

    Ok(App {
        state: AppState { store, engine },
        pool,
    })
}

async fn initialize_database(config: &Config) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .acquire_timeout(config.db_acquire_timeout())
        .connect(&config.database_url())
        .await?;

    info!(
        "✓ Database pool configured: min={} max={}",
        config.db_min_connections, config.db_max_connections
    );

    if config.run_migrations {
        info!("🔄 Running database migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    info!("✓ Database initialized");
    Ok(pool)
}

/// Safety-net cycle on a fixed interval, independent of webhook deliveries.
pub fn spawn_periodic_reconciliation(
    engine: Arc<ReconciliationEngine>,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    info!("✅ Periodic reconciliation every {:?}", interval);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick fires immediately; let the webhook path have the first cycle.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match run_detached(engine.clone()).await {
                Ok(report) => {
                    if report.claimed > 0 || report.reset > 0 {
                        info!(
                            "🔄 Periodic cycle: claimed={} processed={} reset={}",
                            report.claimed, report.processed, report.reset
                        );
                    }
                }
                Err(e) => error!("Periodic reconciliation cycle failed: {:?}", e),
            }
        }
    })
}
