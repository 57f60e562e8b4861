//! Artifact repository
//!
//! Finished graphs, one object per job id. Graphs are written once by the
//! production pipeline; a second write for the same id overwrites.

use async_trait::async_trait;
use bytes::Bytes;
use flowgraph_core::JobId;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use object_store::ObjectStore;
use object_store::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::repository::lease::LeaseError;

const GRAPH_SUFFIX: &str = ".dot";

/// Graph body as it comes out of storage
pub type ByteStream = BoxStream<'static, Result<Bytes, StoreError>>;

/// Storage errors. `NotFound` and `InProgress` are conditions callers act
/// on; everything else is a backend failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("graph {0} is being created")]
    InProgress(JobId),

    #[error("graph {0} was not found")]
    NotFound(JobId),

    #[error("lease check failed: {0}")]
    Lease(#[from] LeaseError),

    #[error("object store error: {0}")]
    Backend(#[from] object_store::Error),
}

/// Repository trait for finished graphs
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Streams the graph stored under `id`
    async fn get(&self, id: &JobId) -> Result<ByteStream, StoreError>;

    /// Checks for a graph without downloading it
    async fn exists(&self, id: &JobId) -> Result<bool, StoreError>;

    /// Stores the graph under `id`, replacing any previous one
    async fn store(&self, id: &JobId, graph: Bytes) -> Result<(), StoreError>;
}

/// Object storage implementation of ArtifactStore
pub struct ObjectArtifactStore {
    store: Arc<dyn ObjectStore>,
}

impl ObjectArtifactStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    fn path(id: &JobId) -> Path {
        Path::from(format!("{}{}", id, GRAPH_SUFFIX))
    }
}

#[async_trait]
impl ArtifactStore for ObjectArtifactStore {
    async fn get(&self, id: &JobId) -> Result<ByteStream, StoreError> {
        match self.store.get(&Self::path(id)).await {
            Ok(result) => Ok(result.into_stream().map_err(StoreError::from).boxed()),
            Err(object_store::Error::NotFound { .. }) => Err(StoreError::NotFound(id.clone())),
            Err(err) => Err(err.into()),
        }
    }

    async fn exists(&self, id: &JobId) -> Result<bool, StoreError> {
        match self.store.head(&Self::path(id)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn store(&self, id: &JobId, graph: Bytes) -> Result<(), StoreError> {
        let size = graph.len();
        self.store.put(&Self::path(id), graph).await?;
        debug!("Stored graph {} ({} bytes)", id, size);
        Ok(())
    }
}
