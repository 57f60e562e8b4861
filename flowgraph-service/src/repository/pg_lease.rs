//! PostgreSQL lease
//!
//! One row per held lease in `graph_leases`. Unlike the object lease,
//! acquisition is a single conditional upsert, so only one caller can take
//! a lease that is active.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use flowgraph_core::JobId;
use sqlx::PgPool;
use std::time::Duration;
use tracing::debug;

use crate::repository::lease::{Lease, LeaseError, LeaseRecord};

pub struct PgLease {
    pool: PgPool,
    max_age: Option<Duration>,
}

impl PgLease {
    pub fn new(pool: PgPool, max_age: Option<Duration>) -> Self {
        Self { pool, max_age }
    }

    /// Leases created at or before this instant have expired.
    /// `None` means leases never expire.
    fn stale_before(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.max_age
            .and_then(|age| TimeDelta::from_std(age).ok())
            .and_then(|age| now.checked_sub_signed(age))
    }
}

#[async_trait]
impl Lease for PgLease {
    async fn acquire(&self, id: &JobId) -> Result<(), LeaseError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO graph_leases (id, created_at)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET created_at = EXCLUDED.created_at
            WHERE graph_leases.created_at <= $3
            "#,
        )
        .bind(id.as_str())
        .bind(now)
        .bind(self.stale_before(now))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LeaseError::AlreadyHeld(id.clone()));
        }

        debug!("Acquired lease for graph {}", id);
        Ok(())
    }

    async fn release(&self, id: &JobId) -> Result<(), LeaseError> {
        sqlx::query("DELETE FROM graph_leases WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        debug!("Released lease for graph {}", id);
        Ok(())
    }

    async fn is_active(&self, id: &JobId) -> Result<bool, LeaseError> {
        let created_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT created_at FROM graph_leases WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(created_at.is_some_and(|created_at| {
            LeaseRecord {
                created_at: Some(created_at),
            }
            .is_active(self.max_age, Utc::now())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn lease(max_age: Option<Duration>) -> PgLease {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/flowgraph")
            .unwrap();
        PgLease::new(pool, max_age)
    }

    #[tokio::test]
    async fn test_no_max_age_never_stale() {
        assert_eq!(lease(None).stale_before(Utc::now()), None);
    }

    #[tokio::test]
    async fn test_stale_before_matches_record_expiry() {
        let lease = lease(Some(Duration::from_secs(60)));
        let now = Utc::now();
        let boundary = lease.stale_before(now).unwrap();

        let at_boundary = LeaseRecord {
            created_at: Some(boundary),
        };
        assert!(!at_boundary.is_active(lease.max_age, now));

        let just_after = LeaseRecord {
            created_at: Some(boundary + TimeDelta::milliseconds(1)),
        };
        assert!(just_after.is_active(lease.max_age, now));
    }
}
