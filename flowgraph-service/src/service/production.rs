//! Graph production
//!
//! Runs a delivered job to completion: digest, convert, store, release.
//! Every step either completes or stops the run; nothing after a failed step
//! is attempted, so a redelivered job picks up where it failed.

use std::sync::Arc;

use flowgraph_core::JobDescriptor;
use flowgraph_core::dto::job::JobPayload;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::convert::Converter;
use crate::repository::{ArtifactStore, Digester, Lease};
use crate::service::{Dependency, GraphError};

pub struct ProductionPipeline {
    digester: Arc<dyn Digester>,
    converter: Arc<dyn Converter>,
    store: Arc<dyn ArtifactStore>,
    lease: Arc<dyn Lease>,
    shutdown: CancellationToken,
}

impl ProductionPipeline {
    /// `store` must be the bare artifact store, not the lease-aware one.
    /// `shutdown` interrupts digest polling when the process stops.
    pub fn new(
        digester: Arc<dyn Digester>,
        converter: Arc<dyn Converter>,
        store: Arc<dyn ArtifactStore>,
        lease: Arc<dyn Lease>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            digester,
            converter,
            store,
            lease,
            shutdown,
        }
    }

    /// Validates a delivered payload and produces its graph
    pub async fn produce_payload(&self, payload: JobPayload) -> Result<(), GraphError> {
        let job = JobDescriptor::try_from(payload)?;
        self.produce(&job).await
    }

    /// Produces and stores the graph for `job`, then releases its lease.
    ///
    /// The lease stays held if any step before the release fails. A failed
    /// release fails the run even though the graph is stored, since the
    /// lease would keep hiding it.
    pub async fn produce(&self, job: &JobDescriptor) -> Result<(), GraphError> {
        info!("Producing graph {} ({} - {})", job.id, job.start, job.stop);

        let digest = self
            .digester
            .digest(job.start, job.stop, &self.shutdown)
            .await
            .map_err(|err| GraphError::dependency(Dependency::Digester, err))?;

        let graph = self
            .converter
            .convert(digest)
            .await
            .map_err(|err| GraphError::dependency(Dependency::Converter, err))?;

        self.store
            .store(&job.id, graph)
            .await
            .map_err(|err| GraphError::dependency(Dependency::Storage, err))?;

        self.lease
            .release(&job.id)
            .await
            .map_err(|err| GraphError::dependency(Dependency::Lease, err))?;

        info!("Graph {} is ready", job.id);
        Ok(())
    }
}
