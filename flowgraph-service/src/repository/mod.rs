//! Repository layer
//!
//! Repositories abstract the external collaborators the service depends on:
//! - artifact storage for finished graphs
//! - the lease marking a graph as "in production"
//! - the job sink jobs are queued on
//! - the digester that produces raw flow log digests
//!
//! All repositories are trait-based so services can be tested against
//! in-memory or failing implementations.

pub mod artifact;
pub mod buckets;
pub mod digest;
pub mod in_progress;
pub mod lease;
pub mod pg_lease;
pub mod sink;

// Re-export traits
pub use artifact::ArtifactStore;
pub use digest::Digester;
pub use lease::Lease;
pub use sink::JobSink;

// Re-export implementations
pub use artifact::{ByteStream, ObjectArtifactStore, StoreError};
pub use in_progress::LeaseAwareStore;
pub use lease::{LeaseError, LeaseRecord, ObjectLease};
pub use pg_lease::PgLease;
