// TestDependencies - mock implementations for testing
//
// Provides a mock fetcher and an in-memory kernel that can be wired together
// for tests without a database or a browser.

use anyhow::Result;
use async_trait::async_trait;
use handoff::InProcessQueue;
use std::sync::{Arc, Mutex};

use crate::fetch::{FetchOutcome, FetchRequest, Fetcher};
use crate::service::CoordinatorKernel;
use crate::store::MemoryStore;

// =============================================================================
// Mock Fetcher
// =============================================================================

pub struct MockFetcher {
    responses: Arc<Mutex<Vec<Result<FetchOutcome, String>>>>,
    calls: Arc<Mutex<Vec<FetchRequest>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful fetch returning the given content
    pub fn with_content(self, raw_content: &str) -> Self {
        self.responses.lock().unwrap().push(Ok(FetchOutcome {
            raw_content: raw_content.to_string(),
            http_status: 200,
            response_time_ms: 5,
            error: None,
        }));
        self
    }

    /// Queue a fetch that reached the page but got the given HTTP status
    pub fn with_status(self, http_status: i32, raw_content: &str) -> Self {
        self.responses.lock().unwrap().push(Ok(FetchOutcome {
            raw_content: raw_content.to_string(),
            http_status,
            response_time_ms: 5,
            error: None,
        }));
        self
    }

    /// Queue a raw outcome
    pub fn with_outcome(self, outcome: FetchOutcome) -> Self {
        self.responses.lock().unwrap().push(Ok(outcome));
        self
    }

    /// Queue a fetch where the engine itself broke (Err from fetch)
    pub fn with_fetch_error(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push(Err(message.to_string()));
        self
    }

    /// Get all requests that were fetched
    pub fn calls(&self) -> Vec<FetchRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Get all URLs that were fetched
    pub fn fetched_urls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.clone())
            .collect()
    }

    /// Check if a URL was fetched
    pub fn was_fetched(&self, url: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|r| r.url == url)
    }

    /// Get the number of times fetch was called
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchOutcome> {
        // Record the call
        self.calls.lock().unwrap().push(request.clone());

        let mut responses = self.responses.lock().unwrap();
        if !responses.is_empty() {
            responses.remove(0).map_err(anyhow::Error::msg)
        } else {
            // Return default mock content
            Ok(FetchOutcome {
                raw_content: format!("<html><body>mock content for {}</body></html>", request.url),
                http_status: 200,
                response_time_ms: 5,
                error: None,
            })
        }
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub store: Arc<MemoryStore>,
    pub queue: Arc<InProcessQueue>,
    pub fetcher: Arc<MockFetcher>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            queue: Arc::new(InProcessQueue::new()),
            fetcher: Arc::new(MockFetcher::new()),
        }
    }

    /// Set a mock fetcher
    pub fn mock_fetcher(mut self, fetcher: MockFetcher) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }

    /// Convert into a CoordinatorKernel for testing
    pub fn into_kernel(self) -> Arc<CoordinatorKernel> {
        Arc::new(CoordinatorKernel::new(
            self.store.clone(),
            self.store.clone(),
            self.store,
            self.queue,
            self.fetcher,
        ))
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
