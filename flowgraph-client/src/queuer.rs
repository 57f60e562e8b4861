//! Job sink client
//!
//! Hands graph jobs to the streaming appliance, which later delivers them to
//! the production endpoint. Acceptance is all this client learns: nothing
//! about processing flows back.

use flowgraph_core::JobDescriptor;
use flowgraph_core::dto::job::JobPayload;
use reqwest::Url;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::transport::HttpTransport;

/// HTTP client for the job queue
pub struct QueuerClient {
    endpoint: Url,
    transport: Arc<HttpTransport>,
}

impl QueuerClient {
    /// Create a new queuer client
    ///
    /// # Arguments
    /// * `endpoint` - URL jobs are POSTed to
    /// * `transport` - Shared outbound transport
    pub fn new(endpoint: Url, transport: Arc<HttpTransport>) -> Self {
        Self {
            endpoint,
            transport,
        }
    }

    /// Get the queue endpoint
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Queue a job
    ///
    /// # Arguments
    /// * `job` - The job to hand to the queue
    pub async fn enqueue(&self, job: &JobDescriptor) -> Result<()> {
        let payload = JobPayload::from(job);

        let response = self
            .transport
            .send(|client| client.post(self.endpoint.clone()).json(&payload))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::unexpected_status(status.as_u16(), error_text));
        }

        debug!("Queued graph job {}", job.id);

        Ok(())
    }
}
