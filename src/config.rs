use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};

use crate::store::postgres::PoolSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Postgres,
    /// Single-process balances, for running without a database.
    Memory,
}

/// Ledger API server configuration. Every flag can also be set through the
/// environment.
#[derive(Parser, Debug)]
#[command(name = "rinha-ledger", about = "Bounded-account ledger HTTP API", version)]
pub struct Config {
    /// TCP address to listen on when no Unix socket is configured
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:9999")]
    pub listen: SocketAddr,

    /// Serve over a Unix socket at this path instead of TCP
    #[arg(long, env = "UNIX_SOCKET")]
    pub unix_socket: Option<PathBuf>,

    #[arg(long, env = "LEDGER_BACKEND", value_enum, default_value_t = Backend::Postgres)]
    pub backend: Backend,

    #[arg(long, env = "DATABASE_URL", required_if_eq("backend", "postgres"))]
    pub database_url: Option<String>,

    #[arg(long, env = "POOL_MAX_SIZE", default_value_t = 25)]
    pub pool_max_size: usize,

    #[arg(long, env = "CONNECT_TIMEOUT_MS", default_value_t = 5000)]
    pub connect_timeout_ms: u64,

    #[arg(long, env = "POOL_MAX_LIFETIME_SECS", default_value_t = 3600)]
    pub max_lifetime_secs: u64,

    #[arg(long, env = "POOL_MAX_IDLE_SECS", default_value_t = 1800)]
    pub max_idle_secs: u64,

    /// Seconds between pool health checks; must be at least 1
    #[arg(long, env = "POOL_HEALTH_CHECK_SECS", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub health_check_secs: u64,

    /// Deadline for each request's storage work
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 5000)]
    pub request_timeout_ms: u64,

    /// Accounts 1..=N are provisioned
    #[arg(long, env = "MAX_ACCOUNT_ID", default_value_t = 5)]
    pub max_account_id: i32,

    /// Create tables and seed accounts before serving
    #[arg(long, env = "INIT_SCHEMA")]
    pub init_schema: bool,
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn pool_settings(&self) -> Option<PoolSettings> {
        Some(PoolSettings {
            database_url: self.database_url.clone()?,
            max_size: self.pool_max_size,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            max_lifetime: Duration::from_secs(self.max_lifetime_secs),
            max_idle: Duration::from_secs(self.max_idle_secs),
            health_check_period: Duration::from_secs(self.health_check_secs),
        })
    }
}
