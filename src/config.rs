use std::time::Duration;

use config::{ConfigError, Environment};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Full connection URL. When unset it is composed from the `db_*` parts.
    pub database_url: Option<String>,
    pub db_hostname: String,
    pub db_port: u16,
    pub db_username: String,
    pub db_password: String,
    pub db_database: String,
    pub db_min_connections: u32,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub run_migrations: bool,

    pub bind_address: String,

    pub upstream_api_base_url: String,
    pub upstream_timeout_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_initial_backoff_ms: u64,
    pub retry_backoff_multiplier: u32,
    /// When false, 4xx answers other than 408/429 end the retry loop.
    pub retry_client_errors: bool,

    pub batch_size: usize,
    pub stuck_timeout_secs: u64,
    pub process_concurrency: usize,
    /// Periodic safety-net cycle; 0 disables it.
    pub reconcile_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::default().try_parsing(true))
    }

    fn load(env: Environment) -> Result<Self, ConfigError> {
        let config: Config = config::Config::builder()
            .set_default("db_hostname", "127.0.0.1")?
            .set_default("db_port", 5432)?
            .set_default("db_username", "shared")?
            .set_default("db_password", "shared")?
            .set_default("db_database", "shared")?
            .set_default("db_min_connections", 2)?
            .set_default("db_max_connections", 20)?
            .set_default("db_acquire_timeout_secs", 30)?
            .set_default("run_migrations", true)?
            .set_default("bind_address", "0.0.0.0:5002")?
            .set_default("upstream_api_base_url", "http://127.0.0.1:5001")?
            .set_default("upstream_timeout_secs", 10)?
            .set_default("retry_max_attempts", 3)?
            .set_default("retry_initial_backoff_ms", 1000)?
            .set_default("retry_backoff_multiplier", 2)?
            .set_default("retry_client_errors", true)?
            .set_default("batch_size", 50)?
            .set_default("stuck_timeout_secs", 300)?
            .set_default("process_concurrency", 4)?
            .set_default("reconcile_interval_secs", 0)?
            .add_source(env)
            .build()?
            .try_deserialize()?;

        Ok(config.clamped())
    }

    fn clamped(mut self) -> Self {
        self.batch_size = self.batch_size.max(1);
        self.process_concurrency = self.process_concurrency.max(1);
        self.retry_max_attempts = self.retry_max_attempts.max(1);
        self.db_max_connections = self.db_max_connections.max(1);
        self.db_min_connections = self.db_min_connections.min(self.db_max_connections);
        self
    }

    pub fn database_url(&self) -> String {
        match &self.database_url {
            Some(url) if !url.trim().is_empty() => url.clone(),
            _ => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.db_username, self.db_password, self.db_hostname, self.db_port, self.db_database
            ),
        }
    }

    pub fn db_acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.db_acquire_timeout_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn retry_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_initial_backoff_ms)
    }

    pub fn stuck_timeout(&self) -> Duration {
        Duration::from_secs(self.stuck_timeout_secs)
    }

    pub fn reconcile_interval(&self) -> Option<Duration> {
        (self.reconcile_interval_secs > 0).then(|| Duration::from_secs(self.reconcile_interval_secs))
    }
}
