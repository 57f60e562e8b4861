//! Lease repository
//!
//! A lease marks a graph as "in production". It is advisory: it only gates
//! visibility of stored graphs, it never blocks writers. Every lease records
//! when it was taken so that, with a max age configured, a lease left behind
//! by a crashed pipeline stops hiding its graph.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use flowgraph_core::JobId;
use flowgraph_core::domain::range::{format_timestamp, parse_timestamp};
use object_store::ObjectStore;
use object_store::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const LEASE_SUFFIX: &str = "_in_progress";

#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("lease for {0} is already held")]
    AlreadyHeld(JobId),

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository trait for in-production leases
#[async_trait]
pub trait Lease: Send + Sync {
    /// Marks `id` as in production
    async fn acquire(&self, id: &JobId) -> Result<(), LeaseError>;

    /// Clears the mark. Releasing a lease that does not exist succeeds.
    async fn release(&self, id: &JobId) -> Result<(), LeaseError>;

    /// Whether `id` is currently marked, honoring the max age
    async fn is_active(&self, id: &JobId) -> Result<bool, LeaseError>;
}

/// A stored lease as seen by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseRecord {
    /// `None` when the stored timestamp could not be read
    pub created_at: Option<DateTime<Utc>>,
}

impl LeaseRecord {
    /// Without a max age a lease stays active until released.
    pub fn is_active(&self, max_age: Option<Duration>, now: DateTime<Utc>) -> bool {
        let Some(max_age) = max_age else {
            return true;
        };
        let Some(created_at) = self.created_at else {
            return false;
        };

        match TimeDelta::from_std(max_age)
            .ok()
            .and_then(|age| created_at.checked_add_signed(age))
        {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

/// Lease stored as a marker object next to the graphs.
///
/// `acquire` overwrites any existing marker, so two concurrent acquirers
/// both succeed. Use the PostgreSQL lease where that matters.
pub struct ObjectLease {
    store: Arc<dyn ObjectStore>,
    max_age: Option<Duration>,
}

impl ObjectLease {
    pub fn new(store: Arc<dyn ObjectStore>, max_age: Option<Duration>) -> Self {
        Self { store, max_age }
    }

    fn path(id: &JobId) -> Path {
        Path::from(format!("{}{}", id, LEASE_SUFFIX))
    }
}

#[async_trait]
impl Lease for ObjectLease {
    async fn acquire(&self, id: &JobId) -> Result<(), LeaseError> {
        let created_at = format_timestamp(Utc::now());
        self.store
            .put(&Self::path(id), Bytes::from(created_at))
            .await?;
        debug!("Acquired lease for graph {}", id);
        Ok(())
    }

    async fn release(&self, id: &JobId) -> Result<(), LeaseError> {
        match self.store.delete(&Self::path(id)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => {
                debug!("Released lease for graph {}", id);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn is_active(&self, id: &JobId) -> Result<bool, LeaseError> {
        let body = match self.store.get(&Self::path(id)).await {
            Ok(result) => result.bytes().await?,
            Err(object_store::Error::NotFound { .. }) => return Ok(false),
            Err(err) => return Err(err.into()),
        };

        let created_at = std::str::from_utf8(&body)
            .ok()
            .and_then(|text| parse_timestamp("created_at", text.trim()).ok());
        if created_at.is_none() {
            warn!("Lease marker for graph {} has an unreadable timestamp", id);
        }

        Ok(LeaseRecord { created_at }.is_active(self.max_age, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::job_id;
    use object_store::memory::InMemory;

    fn at(value: &str) -> DateTime<Utc> {
        parse_timestamp("at", value).unwrap()
    }

    #[test]
    fn test_record_without_max_age_never_expires() {
        let record = LeaseRecord {
            created_at: Some(at("2020-01-01T00:00:00Z")),
        };
        assert!(record.is_active(None, at("2030-01-01T00:00:00Z")));

        let unreadable = LeaseRecord { created_at: None };
        assert!(unreadable.is_active(None, Utc::now()));
    }

    #[test]
    fn test_record_expires_after_max_age() {
        let record = LeaseRecord {
            created_at: Some(at("2024-01-01T00:00:00Z")),
        };
        let max_age = Some(Duration::from_secs(60));

        assert!(record.is_active(max_age, at("2024-01-01T00:00:59Z")));
        assert!(!record.is_active(max_age, at("2024-01-01T00:01:00Z")));
    }

    #[test]
    fn test_unreadable_record_is_expired_with_max_age() {
        let record = LeaseRecord { created_at: None };
        assert!(!record.is_active(Some(Duration::from_secs(60)), Utc::now()));
    }

    #[tokio::test]
    async fn test_acquire_release_cycle() {
        let lease = ObjectLease::new(Arc::new(InMemory::new()), None);
        let id = job_id();

        assert!(!lease.is_active(&id).await.unwrap());

        lease.acquire(&id).await.unwrap();
        assert!(lease.is_active(&id).await.unwrap());

        lease.release(&id).await.unwrap();
        assert!(!lease.is_active(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_without_lease_succeeds() {
        let lease = ObjectLease::new(Arc::new(InMemory::new()), None);
        lease.release(&job_id()).await.unwrap();
    }

    #[tokio::test]
    async fn test_acquire_overwrites() {
        let lease = ObjectLease::new(Arc::new(InMemory::new()), None);
        let id = job_id();

        lease.acquire(&id).await.unwrap();
        lease.acquire(&id).await.unwrap();
        assert!(lease.is_active(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_marker_body_is_timestamp() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let lease = ObjectLease::new(Arc::clone(&store), None);
        let id = job_id();

        let before = Utc::now();
        lease.acquire(&id).await.unwrap();

        let path = Path::from(format!("{}_in_progress", id));
        let body = store.get(&path).await.unwrap().bytes().await.unwrap();
        let written = parse_timestamp("body", std::str::from_utf8(&body).unwrap()).unwrap();
        assert!(written >= before);
    }

    #[tokio::test]
    async fn test_stale_marker_is_inactive() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let lease = ObjectLease::new(Arc::clone(&store), Some(Duration::from_secs(600)));
        let id = job_id();

        let path = Path::from(format!("{}_in_progress", id));
        store
            .put(&path, Bytes::from_static(b"2001-01-01T00:00:00Z"))
            .await
            .unwrap();
        assert!(!lease.is_active(&id).await.unwrap());

        lease.acquire(&id).await.unwrap();
        assert!(lease.is_active(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_garbage_marker_counts_as_expired_only_with_max_age() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let id = job_id();
        let path = Path::from(format!("{}_in_progress", id));
        store
            .put(&path, Bytes::from_static(b"not a timestamp"))
            .await
            .unwrap();

        let unbounded = ObjectLease::new(Arc::clone(&store), None);
        assert!(unbounded.is_active(&id).await.unwrap());

        let bounded = ObjectLease::new(store, Some(Duration::from_secs(600)));
        assert!(!bounded.is_active(&id).await.unwrap());
    }
}
