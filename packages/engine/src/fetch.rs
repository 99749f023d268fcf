//! Contract between the engine and external fetch workers.
//!
//! The engine never fetches a page itself; it hands a [`FetchRequest`] to
//! whatever implements [`Fetcher`] (headless browser farm, plain HTTP
//! client, a mock in tests) and judges the [`FetchOutcome`]. An `Err` from
//! `fetch` means the fetching mechanism itself broke; a returned outcome
//! with `error` set or a non-2xx status means the mechanism worked and the
//! page fetch failed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Which browser automation backend the worker should drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetchEngine {
    #[default]
    Playwright,
    Selenium,
}

impl FetchEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchEngine::Playwright => "playwright",
            FetchEngine::Selenium => "selenium",
        }
    }
}

impl std::fmt::Display for FetchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown fetch engine: {0}")]
pub struct UnknownEngine(String);

impl std::str::FromStr for FetchEngine {
    type Err = UnknownEngine;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "playwright" => Ok(FetchEngine::Playwright),
            "selenium" => Ok(FetchEngine::Selenium),
            other => Err(UnknownEngine(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub engine: FetchEngine,
    /// Target and job config merged by the caller; passed through opaquely.
    pub config: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub raw_content: String,
    pub http_status: i32,
    pub response_time_ms: i64,
    pub error: Option<String>,
}

impl FetchOutcome {
    /// A fetch counts as successful only with no error and a 2xx status.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.http_status)
    }

    /// Human-readable reason for an unsuccessful outcome.
    pub fn failure_message(&self) -> String {
        match &self.error {
            Some(error) => error.clone(),
            None => format!("fetch returned HTTP {}", self.http_status),
        }
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchOutcome>;
}

/// Plain HTTP implementation of [`Fetcher`].
///
/// No JavaScript rendering: sites that need a real browser belong to the
/// external scraper services that honor the engine selector. This is the
/// default when no such service is wired up.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("scrape-coordinator/0.1")
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchOutcome> {
        debug!(url = %request.url, engine = %request.engine, "fetching over plain http");

        let started = Instant::now();
        let response = self
            .client
            .get(&request.url)
            .send()
            .await
            .context("HTTP request failed")?;

        let http_status = i32::from(response.status().as_u16());
        let raw_content = response
            .text()
            .await
            .context("Failed to read response body")?;

        Ok(FetchOutcome {
            raw_content,
            http_status,
            response_time_ms: started.elapsed().as_millis() as i64,
            error: None,
        })
    }
}
