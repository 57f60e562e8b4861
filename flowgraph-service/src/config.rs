//! Service configuration
//!
//! Everything the service needs is read once at startup into a [`Config`]
//! and handed to the constructors that need it. No component looks at the
//! environment on its own.

use anyhow::{Context, Result};
use flowgraph_client::{PollPolicy, TransportPolicy, Url};
use std::time::Duration;

/// Where graphs and lease markers are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// S3 buckets
    S3,
    /// Process-local memory, for development
    Memory,
}

/// Name and region of one bucket
#[derive(Debug, Clone, Default)]
pub struct BucketConfig {
    pub name: String,
    pub region: String,
}

/// Object storage settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub mode: StorageMode,
    /// Bucket holding finished graphs
    pub graphs: BucketConfig,
    /// Bucket holding lease markers
    pub progress: BucketConfig,
    /// S3-compatible endpoint override
    pub endpoint: Option<String>,
    /// Use the ambient instance role instead of static credentials
    pub use_iam: bool,
}

/// Which store holds the leases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseBackend {
    /// Marker objects in the progress bucket
    Object,
    /// Rows in a Postgres table
    Postgres,
}

/// Lease settings
#[derive(Debug, Clone)]
pub struct LeaseConfig {
    pub backend: LeaseBackend,
    /// Leases older than this are ignored; `None` keeps them until released
    pub max_age: Option<Duration>,
    /// Required for the Postgres backend
    pub database_url: Option<String>,
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    pub storage: StorageConfig,

    pub lease: LeaseConfig,

    /// Digester create/poll endpoint
    pub digester_endpoint: Url,

    /// Bounds of the digest poll loop
    pub poll: PollPolicy,

    /// Streaming appliance endpoint jobs are queued on
    pub queuer_endpoint: Url,

    /// Retry and recycling policy for outbound HTTP
    pub transport: TransportPolicy,

    /// External conversion command; passthrough when unset
    pub converter_command: Option<Vec<String>>,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Required environment variables:
    /// - DIGESTER_ENDPOINT
    /// - STREAM_APPLIANCE_ENDPOINT
    /// - GRAPH_STORAGE_BUCKET, GRAPH_STORAGE_BUCKET_REGION (s3 mode)
    /// - GRAPH_PROGRESS_BUCKET, GRAPH_PROGRESS_BUCKET_REGION (s3 mode)
    /// - DATABASE_URL (postgres lease backend)
    ///
    /// Optional:
    /// - FLOWGRAPH_BIND_ADDR (default: 0.0.0.0:8080)
    /// - STORAGE_MODE (s3 | memory, default: s3)
    /// - STORAGE_ENDPOINT
    /// - USE_IAM (default: true)
    /// - LEASE_BACKEND (object | postgres, default: object)
    /// - LEASE_MAX_AGE (seconds, default: no expiry)
    /// - DIGESTER_POLLING_ATTEMPTS (default: 10)
    /// - DIGESTER_POLLING_INTERVAL (milliseconds, default: 1000)
    /// - DIGESTER_POLLING_TIMEOUT (milliseconds, default: 60000)
    /// - CONVERTER_COMMAND
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let mode = match env.get("STORAGE_MODE").as_deref() {
            None | Some("s3") => StorageMode::S3,
            Some("memory") => StorageMode::Memory,
            Some(other) => anyhow::bail!("STORAGE_MODE must be 's3' or 'memory', got '{}'", other),
        };

        let bucket = |name_key: &str, region_key: &str| -> Result<BucketConfig> {
            Ok(match mode {
                StorageMode::S3 => BucketConfig {
                    name: env.required(name_key)?,
                    region: env.required(region_key)?,
                },
                StorageMode::Memory => BucketConfig {
                    name: env.get(name_key).unwrap_or_default(),
                    region: env.get(region_key).unwrap_or_default(),
                },
            })
        };

        let storage = StorageConfig {
            mode,
            graphs: bucket("GRAPH_STORAGE_BUCKET", "GRAPH_STORAGE_BUCKET_REGION")?,
            progress: bucket("GRAPH_PROGRESS_BUCKET", "GRAPH_PROGRESS_BUCKET_REGION")?,
            endpoint: env.get("STORAGE_ENDPOINT"),
            use_iam: env.parse_or("USE_IAM", true)?,
        };

        let backend = match env.get("LEASE_BACKEND").as_deref() {
            None | Some("object") => LeaseBackend::Object,
            Some("postgres") => LeaseBackend::Postgres,
            Some(other) => {
                anyhow::bail!("LEASE_BACKEND must be 'object' or 'postgres', got '{}'", other)
            }
        };

        let lease = LeaseConfig {
            backend,
            max_age: env
                .parse::<u64>("LEASE_MAX_AGE")?
                .map(Duration::from_secs),
            database_url: env.get("DATABASE_URL"),
        };

        let defaults = PollPolicy::default();
        let poll = PollPolicy {
            attempts: env.parse_or("DIGESTER_POLLING_ATTEMPTS", defaults.attempts)?,
            interval: env
                .parse::<u64>("DIGESTER_POLLING_INTERVAL")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
            timeout: env
                .parse::<u64>("DIGESTER_POLLING_TIMEOUT")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
        };

        let converter_command = env
            .get("CONVERTER_COMMAND")
            .map(|cmd| cmd.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .filter(|parts| !parts.is_empty());

        Ok(Self {
            bind_addr: env
                .get("FLOWGRAPH_BIND_ADDR")
                .unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            storage,
            lease,
            digester_endpoint: env.url("DIGESTER_ENDPOINT")?,
            poll,
            queuer_endpoint: env.url("STREAM_APPLIANCE_ENDPOINT")?,
            transport: TransportPolicy::default(),
            converter_command,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.storage.mode == StorageMode::S3 {
            for bucket in [&self.storage.graphs, &self.storage.progress] {
                if bucket.name.is_empty() || bucket.region.is_empty() {
                    anyhow::bail!("bucket names and regions cannot be empty in s3 mode");
                }
            }
        }

        if self.lease.backend == LeaseBackend::Postgres && self.lease.database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required for the postgres lease backend");
        }

        if self.lease.max_age.is_some_and(|age| age.is_zero()) {
            anyhow::bail!("LEASE_MAX_AGE must be greater than 0");
        }

        for url in [&self.digester_endpoint, &self.queuer_endpoint] {
            if url.scheme() != "http" && url.scheme() != "https" {
                anyhow::bail!("endpoint {} must use http:// or https://", url);
            }
        }

        if self.poll.attempts == 0 {
            anyhow::bail!("DIGESTER_POLLING_ATTEMPTS must be greater than 0");
        }

        if self.poll.interval.is_zero() {
            anyhow::bail!("DIGESTER_POLLING_INTERVAL must be greater than 0");
        }

        if self.poll.timeout.is_zero() {
            anyhow::bail!("DIGESTER_POLLING_TIMEOUT must be greater than 0");
        }

        Ok(())
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .with_context(|| format!("{} environment variable not set", key))
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.get(key)
            .map(|raw| {
                raw.trim()
                    .parse::<T>()
                    .with_context(|| format!("invalid value for {}: '{}'", key, raw))
            })
            .transpose()
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        Ok(self.parse(key)?.unwrap_or(default))
    }

    fn url(&self, key: &str) -> Result<Url> {
        let raw = self.required(key)?;
        Url::parse(&raw).with_context(|| format!("invalid URL in {}: '{}'", key, raw))
    }
}
