//! Service Module
//!
//! Business logic layer. Services orchestrate between repositories and
//! translate their failures into the outcomes the API reports.

pub mod graph;
pub mod production;

use flowgraph_core::JobId;
use flowgraph_core::domain::job::DescriptorError;
use flowgraph_core::domain::range::RangeError;
use thiserror::Error;

pub use graph::{GraphService, Retrieval};
pub use production::ProductionPipeline;

/// External collaborator a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    Storage,
    Queuer,
    Lease,
    Digester,
    Converter,
}

impl Dependency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dependency::Storage => "storage",
            Dependency::Queuer => "queuer",
            Dependency::Lease => "lease",
            Dependency::Digester => "digester",
            Dependency::Converter => "converter",
        }
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a failed service operation
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Conflict(String),

    #[error("graph {0} was not found")]
    NotFound(JobId),

    #[error("{dependency} failure: {reason}")]
    Dependency {
        dependency: Dependency,
        reason: String,
    },
}

impl GraphError {
    pub fn dependency(dependency: Dependency, err: impl std::fmt::Display) -> Self {
        GraphError::Dependency {
            dependency,
            reason: format!("{:#}", err),
        }
    }
}

impl From<RangeError> for GraphError {
    fn from(err: RangeError) -> Self {
        GraphError::InvalidInput(err.to_string())
    }
}

impl From<DescriptorError> for GraphError {
    fn from(err: DescriptorError) -> Self {
        GraphError::InvalidInput(err.to_string())
    }
}
