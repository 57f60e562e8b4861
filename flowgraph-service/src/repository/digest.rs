//! Digester
//!
//! Source of the raw flow log digest for a time window.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use flowgraph_client::DigesterClient;
use tokio_util::sync::CancellationToken;

/// Repository trait for producing digests
#[async_trait]
pub trait Digester: Send + Sync {
    /// Returns the decompressed digest for `[start, stop)`.
    /// Gives up when `cancel` fires.
    async fn digest(
        &self,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Bytes>;
}

#[async_trait]
impl Digester for DigesterClient {
    async fn digest(
        &self,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        DigesterClient::digest(self, start, stop, cancel)
            .await
            .with_context(|| format!("digest from {} failed", self.endpoint()))
    }
}
