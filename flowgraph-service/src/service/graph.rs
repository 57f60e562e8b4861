//! Graph request service
//!
//! Accepts graph requests and serves finished graphs. Production happens
//! elsewhere: a submitted job is only queued and marked in progress here.

use std::sync::Arc;

use flowgraph_core::{JobDescriptor, TimeRange, compute_id};
use tracing::{error, info};

use crate::repository::{ArtifactStore, ByteStream, JobSink, Lease, StoreError};
use crate::service::{Dependency, GraphError};

/// Result of a successful retrieval
pub enum Retrieval {
    /// Stored graph, byte for byte
    Ready(ByteStream),
    /// A lease is active for the range; ask again later
    InProgress,
}

impl std::fmt::Debug for Retrieval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Retrieval::Ready(_) => f.write_str("Ready(..)"),
            Retrieval::InProgress => f.write_str("InProgress"),
        }
    }
}

pub struct GraphService {
    store: Arc<dyn ArtifactStore>,
    lease: Arc<dyn Lease>,
    sink: Arc<dyn JobSink>,
}

impl GraphService {
    /// `store` is expected to be lease-aware so that graphs still in
    /// production report as in progress.
    pub fn new(store: Arc<dyn ArtifactStore>, lease: Arc<dyn Lease>, sink: Arc<dyn JobSink>) -> Self {
        Self { store, lease, sink }
    }

    /// Queues production of the graph for `range`.
    ///
    /// Refused with a conflict when the graph exists or is in progress. The
    /// lease is taken after the job is queued; failing to take it is logged
    /// and does not fail the request.
    pub async fn submit(&self, range: TimeRange) -> Result<JobDescriptor, GraphError> {
        let job = JobDescriptor::for_range(&range);

        match self.store.exists(&job.id).await {
            Ok(false) => {}
            Ok(true) => {
                return Err(GraphError::Conflict(format!(
                    "graph for the time range {} already exists",
                    range
                )));
            }
            Err(StoreError::InProgress(_)) => {
                return Err(GraphError::Conflict(format!(
                    "graph for the time range {} is being created",
                    range
                )));
            }
            Err(StoreError::Lease(err)) => {
                return Err(GraphError::dependency(Dependency::Lease, err));
            }
            Err(err) => return Err(GraphError::dependency(Dependency::Storage, err)),
        }

        self.sink
            .enqueue(&job)
            .await
            .map_err(|err| GraphError::dependency(Dependency::Queuer, err))?;

        if let Err(err) = self.lease.acquire(&job.id).await {
            error!(
                dependency = %Dependency::Lease,
                "Failed to acquire lease for queued graph {}: {}", job.id, err
            );
        }

        info!("Queued graph {} for {}", job.id, range);
        Ok(job)
    }

    /// Looks up the graph for `range`
    pub async fn retrieve(&self, range: TimeRange) -> Result<Retrieval, GraphError> {
        let id = compute_id(&range);

        match self.store.get(&id).await {
            Ok(stream) => Ok(Retrieval::Ready(stream)),
            Err(StoreError::InProgress(_)) => Ok(Retrieval::InProgress),
            Err(StoreError::NotFound(id)) => Err(GraphError::NotFound(id)),
            Err(StoreError::Lease(err)) => Err(GraphError::dependency(Dependency::Lease, err)),
            Err(err) => Err(GraphError::dependency(Dependency::Storage, err)),
        }
    }
}
