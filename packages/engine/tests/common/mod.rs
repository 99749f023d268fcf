// Common test utilities

use std::sync::Arc;

use scrape_engine::common::{TargetId, UserId};
use scrape_engine::domain::{ScrapeJob, Target};
use scrape_engine::service::{CoordinatorKernel, CreateJobRequest, CreateTargetRequest};
use scrape_engine::test_dependencies::TestDependencies;

/// Kernel over the in-memory store, the in-process queue, and the mock
/// fetcher; the dependencies stay available for direct inspection.
pub fn test_kernel() -> (Arc<CoordinatorKernel>, TestDependencies) {
    let deps = TestDependencies::new();
    (deps.clone().into_kernel(), deps)
}

/// Create an active target owned by `user` through the service
pub async fn create_test_target(
    kernel: &CoordinatorKernel,
    user: UserId,
    base_url: &str,
) -> Target {
    kernel
        .targets
        .create_target(
            user,
            CreateTargetRequest {
                name: "Test Target".to_string(),
                base_url: base_url.to_string(),
                description: None,
                config: serde_json::Map::new(),
            },
        )
        .await
        .expect("Failed to create test target")
}

/// Create a pending job for `target_id` through the service (also enqueues)
pub async fn create_test_job(
    kernel: &CoordinatorKernel,
    user: UserId,
    target_id: TargetId,
) -> ScrapeJob {
    kernel
        .jobs
        .create_job(
            user,
            CreateJobRequest {
                target_id,
                config: serde_json::Map::new(),
                scheduled_at: None,
            },
        )
        .await
        .expect("Failed to create test job")
}
