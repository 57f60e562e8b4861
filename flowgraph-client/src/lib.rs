//! Flowgraph HTTP Clients
//!
//! Outbound HTTP for the flowgraph service:
//! - [`DigesterClient`] creates flow log digests and polls until they are ready
//! - [`QueuerClient`] hands graph jobs to the streaming appliance
//!
//! Both share one [`HttpTransport`], so retries and connection recycling
//! follow a single policy.
//!
//! # Example
//!
//! ```no_run
//! use flowgraph_client::{DigesterClient, HttpTransport, PollPolicy, TransportPolicy};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpTransport::new(TransportPolicy::default())?);
//! let digester = DigesterClient::new(
//!     "http://localhost:9000/".parse()?,
//!     PollPolicy::default(),
//!     transport,
//! );
//!
//! let start = "2020-01-01T00:00:00Z".parse()?;
//! let stop = "2020-01-01T00:05:00Z".parse()?;
//! let digest = digester.digest(start, stop, &CancellationToken::new()).await?;
//! println!("digest is {} bytes", digest.len());
//! # Ok(())
//! # }
//! ```

pub mod digester;
pub mod error;
pub mod queuer;
pub mod transport;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use digester::{DigesterClient, PollPolicy};
pub use error::{CancelReason, ClientError, Result};
pub use queuer::QueuerClient;
pub use reqwest::Url;
pub use transport::{HttpTransport, TransportPolicy};
