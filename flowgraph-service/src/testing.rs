//! Test doubles shared by the service tests

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use flowgraph_core::{JobDescriptor, JobId, TimeRange};
use futures::TryStreamExt;
use object_store::memory::InMemory;
use tokio_util::sync::CancellationToken;

use crate::convert::Converter;
use crate::repository::{
    ArtifactStore, ByteStream, Digester, JobSink, Lease, LeaseAwareStore, LeaseError,
    ObjectArtifactStore, ObjectLease, StoreError,
};

pub fn job_id() -> JobId {
    let range = TimeRange::parse("2024-03-01T10:00:00Z", "2024-03-01T10:15:00Z").unwrap();
    JobId::compute(&range)
}

pub async fn read_all(stream: ByteStream) -> Result<Bytes, StoreError> {
    let chunks: Vec<Bytes> = stream.try_collect().await?;
    Ok(Bytes::from(chunks.concat()))
}

fn backend_error() -> object_store::Error {
    object_store::Error::Generic {
        store: "test",
        source: "backend unavailable".into(),
    }
}

/// In-memory artifact store and lease with a recording sink
pub struct Harness {
    pub artifacts: Arc<ObjectArtifactStore>,
    pub lease: Arc<ObjectLease>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            artifacts: Arc::new(ObjectArtifactStore::new(Arc::new(InMemory::new()))),
            lease: Arc::new(ObjectLease::new(Arc::new(InMemory::new()), None)),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    pub fn guarded(&self) -> Arc<LeaseAwareStore> {
        Arc::new(LeaseAwareStore::new(
            self.artifacts.clone(),
            self.lease.clone(),
        ))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    jobs: Mutex<Vec<JobDescriptor>>,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn jobs(&self) -> Vec<JobDescriptor> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobSink for RecordingSink {
    async fn enqueue(&self, job: &JobDescriptor) -> Result<()> {
        if self.fail {
            anyhow::bail!("queuer returned 503");
        }
        self.jobs.lock().unwrap().push(job.clone());
        Ok(())
    }
}

/// Digester answering every request the same way
pub struct StaticDigester {
    result: Result<Bytes, String>,
    calls: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
}

impl StaticDigester {
    pub fn ok(digest: &'static [u8]) -> Self {
        Self {
            result: Ok(Bytes::from_static(digest)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Digester for StaticDigester {
    async fn digest(
        &self,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
        _cancel: &CancellationToken,
    ) -> Result<Bytes> {
        self.calls.lock().unwrap().push((start, stop));
        self.result.clone().map_err(anyhow::Error::msg)
    }
}

pub struct FailingConverter;

#[async_trait]
impl Converter for FailingConverter {
    async fn convert(&self, _digest: Bytes) -> Result<Bytes> {
        anyhow::bail!("converter exited with status 1")
    }
}

/// Artifact store whose backend is down
pub struct BrokenStore;

#[async_trait]
impl ArtifactStore for BrokenStore {
    async fn get(&self, _id: &JobId) -> Result<ByteStream, StoreError> {
        Err(backend_error().into())
    }

    async fn exists(&self, _id: &JobId) -> Result<bool, StoreError> {
        Err(backend_error().into())
    }

    async fn store(&self, _id: &JobId, _graph: Bytes) -> Result<(), StoreError> {
        Err(backend_error().into())
    }
}

/// Lease whose backend is down
pub struct BrokenLease;

#[async_trait]
impl Lease for BrokenLease {
    async fn acquire(&self, _id: &JobId) -> Result<(), LeaseError> {
        Err(backend_error().into())
    }

    async fn release(&self, _id: &JobId) -> Result<(), LeaseError> {
        Err(backend_error().into())
    }

    async fn is_active(&self, _id: &JobId) -> Result<bool, LeaseError> {
        Err(backend_error().into())
    }
}
