//! Job sink
//!
//! Where accepted jobs are queued for production.

use anyhow::{Context, Result};
use async_trait::async_trait;
use flowgraph_client::QueuerClient;
use flowgraph_core::JobDescriptor;

/// Repository trait for queuing jobs
#[async_trait]
pub trait JobSink: Send + Sync {
    async fn enqueue(&self, job: &JobDescriptor) -> Result<()>;
}

#[async_trait]
impl JobSink for QueuerClient {
    async fn enqueue(&self, job: &JobDescriptor) -> Result<()> {
        QueuerClient::enqueue(self, job)
            .await
            .with_context(|| format!("failed to queue graph job {}", job.id))
    }
}
