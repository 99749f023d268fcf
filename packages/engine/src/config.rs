use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

use crate::fetch::FetchEngine;

/// Coordinator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// When set, state lives in Postgres; otherwise the in-memory store is
    /// used and nothing survives a restart.
    pub database_url: Option<String>,
    pub worker_count: usize,
    pub fetch_engine: FetchEngine,
    pub drain_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            worker_count: env::var("WORKER_COUNT")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .context("WORKER_COUNT must be a valid number")?,
            fetch_engine: env::var("FETCH_ENGINE")
                .unwrap_or_else(|_| "playwright".to_string())
                .parse()
                .context("FETCH_ENGINE must be playwright or selenium")?,
            drain_timeout_secs: env::var("DRAIN_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("DRAIN_TIMEOUT_SECS must be a valid number")?,
        })
    }
}
