//! Job domain types

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::range::{RangeError, TimeRange};

/// Name hashed under the nil namespace to derive the graph namespace
const GRAPH_NAMESPACE_NAME: &[u8] = b"graph";

/// Deterministic identifier of a graph job.
///
/// Opaque to everything but [`JobId::compute`]: ids received from the job sink
/// are carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Derive the id for a range (UUIDv5 over the canonical start and stop)
    pub fn compute(range: &TimeRange) -> Self {
        let namespace = Uuid::new_v5(&Uuid::nil(), GRAPH_NAMESPACE_NAME);
        let name = format!("{}{}", canonical(range.start()), canonical(range.stop()));
        Self(Uuid::new_v5(&namespace, name.as_bytes()).to_string())
    }

    /// Accept an id coming from outside; only emptiness is rejected
    pub fn parse(value: impl Into<String>) -> Result<Self, DescriptorError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DescriptorError::MissingId);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the job id for a range
pub fn compute_id(range: &TimeRange) -> JobId {
    JobId::compute(range)
}

fn canonical(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Errors raised when validating a delivered job
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("missing ID field")]
    MissingId,

    #[error(transparent)]
    Timestamp(#[from] RangeError),

    #[error("invalid time range")]
    EmptyRange,
}

/// What the job sink carries to the production pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    pub id: JobId,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

impl JobDescriptor {
    /// Descriptor for a submitted range.
    ///
    /// Zero-width ranges are allowed here; they are refused by [`JobDescriptor::new`]
    /// once delivered.
    pub fn for_range(range: &TimeRange) -> Self {
        Self {
            id: JobId::compute(range),
            start: range.start(),
            stop: range.stop(),
        }
    }

    /// Validated descriptor ready for production: `stop` must be strictly after `start`
    pub fn new(
        id: JobId,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Result<Self, DescriptorError> {
        if stop <= start {
            return Err(DescriptorError::EmptyRange);
        }
        Ok(Self { id, start, stop })
    }
}
