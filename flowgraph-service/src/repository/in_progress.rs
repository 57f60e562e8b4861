//! Lease-aware artifact store
//!
//! Wraps an [`ArtifactStore`] so that reads of a graph whose lease is active
//! report [`StoreError::InProgress`] instead of touching storage. Writes go
//! straight through: the pipeline stores before it releases.

use async_trait::async_trait;
use bytes::Bytes;
use flowgraph_core::JobId;
use std::sync::Arc;

use crate::repository::artifact::{ArtifactStore, ByteStream, StoreError};
use crate::repository::lease::Lease;

pub struct LeaseAwareStore {
    inner: Arc<dyn ArtifactStore>,
    lease: Arc<dyn Lease>,
}

impl LeaseAwareStore {
    pub fn new(inner: Arc<dyn ArtifactStore>, lease: Arc<dyn Lease>) -> Self {
        Self { inner, lease }
    }

    async fn ensure_settled(&self, id: &JobId) -> Result<(), StoreError> {
        if self.lease.is_active(id).await? {
            return Err(StoreError::InProgress(id.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for LeaseAwareStore {
    async fn get(&self, id: &JobId) -> Result<ByteStream, StoreError> {
        self.ensure_settled(id).await?;
        self.inner.get(id).await
    }

    async fn exists(&self, id: &JobId) -> Result<bool, StoreError> {
        self.ensure_settled(id).await?;
        self.inner.exists(id).await
    }

    async fn store(&self, id: &JobId, graph: Bytes) -> Result<(), StoreError> {
        self.inner.store(id, graph).await
    }
}
