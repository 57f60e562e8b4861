//! Object store construction
//!
//! Builds the two stores the service uses: one for finished graphs and one
//! for lease markers.

use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::{BackoffConfig, ObjectStore, RetryConfig};
use std::sync::Arc;
use tracing::info;

use crate::config::{BucketConfig, StorageConfig, StorageMode};
use flowgraph_client::TransportPolicy;

/// Graph and progress stores
pub struct Buckets {
    pub graphs: Arc<dyn ObjectStore>,
    pub progress: Arc<dyn ObjectStore>,
}

impl Buckets {
    pub fn from_config(
        storage: &StorageConfig,
        policy: &TransportPolicy,
    ) -> Result<Self, object_store::Error> {
        match storage.mode {
            StorageMode::Memory => {
                info!("Using in-memory object storage");
                Ok(Self {
                    graphs: Arc::new(InMemory::new()),
                    progress: Arc::new(InMemory::new()),
                })
            }
            StorageMode::S3 => Ok(Self {
                graphs: s3_bucket(&storage.graphs, storage, policy)?,
                progress: s3_bucket(&storage.progress, storage, policy)?,
            }),
        }
    }
}

fn s3_bucket(
    bucket: &BucketConfig,
    storage: &StorageConfig,
    policy: &TransportPolicy,
) -> Result<Arc<dyn ObjectStore>, object_store::Error> {
    // Instance role credentials are picked up when no keys are configured
    let mut builder = if storage.use_iam {
        AmazonS3Builder::new()
    } else {
        AmazonS3Builder::from_env()
    };

    builder = builder
        .with_bucket_name(&bucket.name)
        .with_region(&bucket.region)
        .with_retry(retry_config(policy));

    if let Some(endpoint) = &storage.endpoint {
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(endpoint.starts_with("http://"));
    }

    info!("Using S3 bucket {} in {}", bucket.name, bucket.region);
    Ok(Arc::new(builder.build()?))
}

/// Fixed backoff, same retry budget as outbound HTTP
fn retry_config(policy: &TransportPolicy) -> RetryConfig {
    RetryConfig {
        backoff: BackoffConfig {
            init_backoff: policy.backoff,
            max_backoff: policy.backoff,
            base: 1.0,
        },
        max_retries: policy.max_retries as usize,
        ..RetryConfig::default()
    }
}
