//! Job DTOs for inter-service communication

use serde::{Deserialize, Serialize};

use crate::domain::job::{DescriptorError, JobDescriptor, JobId};
use crate::domain::range::{format_timestamp, parse_timestamp};

/// Job payload as queued by the coordinator and delivered to the producer.
///
/// Missing fields decode as empty strings so that validation, not
/// deserialization, reports what is wrong with them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub stop: String,
}

impl From<&JobDescriptor> for JobPayload {
    fn from(job: &JobDescriptor) -> Self {
        Self {
            id: job.id.to_string(),
            start: format_timestamp(job.start),
            stop: format_timestamp(job.stop),
        }
    }
}

impl TryFrom<JobPayload> for JobDescriptor {
    type Error = DescriptorError;

    fn try_from(payload: JobPayload) -> Result<Self, Self::Error> {
        let id = JobId::parse(payload.id)?;
        let start = parse_timestamp("start", &payload.start)?;
        let stop = parse_timestamp("stop", &payload.stop)?;
        JobDescriptor::new(id, start, stop)
    }
}
