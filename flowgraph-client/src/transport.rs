//! Shared outbound transport
//!
//! Every call to the digester and the job sink goes through one
//! [`HttpTransport`], which applies the same policy to all of them:
//! - a fixed backoff between retries
//! - a bounded number of retries
//! - retries only for a fixed set of server error statuses
//! - a connect timeout and an overall timeout per attempt
//! - periodic replacement of the underlying client (and its pooled
//!   connections) after a TTL with jitter

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use rand::Rng;

use crate::error::Result;

/// Retry and connection policy applied to outbound requests
#[derive(Debug, Clone)]
pub struct TransportPolicy {
    /// Delay between two attempts of the same request
    pub backoff: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Response statuses that trigger a retry
    pub retry_statuses: Vec<StatusCode>,
    /// Connect (and TLS handshake) timeout
    pub connect_timeout: Duration,
    /// Whole-attempt timeout, from connect to the end of the body
    pub request_timeout: Duration,
    /// Idle connections kept per host
    pub max_idle_per_host: usize,
    /// Lifetime of a client before it is replaced
    pub recycle_ttl: Duration,
    /// Upper bound of the random delay added to `recycle_ttl`
    pub recycle_jitter: Duration,
}

impl Default for TransportPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_millis(50),
            max_retries: 3,
            retry_statuses: vec![
                StatusCode::INTERNAL_SERVER_ERROR,
                StatusCode::BAD_GATEWAY,
                StatusCode::SERVICE_UNAVAILABLE,
            ],
            connect_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            max_idle_per_host: 100,
            recycle_ttl: Duration::from_secs(10 * 60),
            recycle_jitter: Duration::from_secs(60),
        }
    }
}

impl TransportPolicy {
    fn should_retry(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status)
    }
}

struct Pooled {
    client: Client,
    expires_at: Instant,
}

/// HTTP transport with retries and client recycling
pub struct HttpTransport {
    policy: TransportPolicy,
    current: Mutex<Pooled>,
}

impl HttpTransport {
    /// Create a transport applying the given policy
    pub fn new(policy: TransportPolicy) -> Result<Self> {
        let client = build_client(&policy)?;
        let expires_at = Instant::now() + recycle_after(&policy);
        Ok(Self {
            policy,
            current: Mutex::new(Pooled { client, expires_at }),
        })
    }

    /// Get the policy this transport applies
    pub fn policy(&self) -> &TransportPolicy {
        &self.policy
    }

    /// Current client, replacing it first if its lifetime is over
    fn client(&self) -> Result<Client> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);

        let now = Instant::now();
        if now >= current.expires_at {
            current.client = build_client(&self.policy)?;
            current.expires_at = now + recycle_after(&self.policy);
            debug!("Recycled outbound HTTP client");
        }

        Ok(current.client.clone())
    }

    /// Send a request, retrying on the policy's retry statuses.
    ///
    /// `build` is called once per attempt so every retry sends a fresh request.
    /// When retries run out the last response is returned as is; transport
    /// errors are returned immediately.
    pub async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut retries = 0;

        loop {
            let client = self.client()?;
            let response = build(&client).send().await?;
            let status = response.status();

            if retries >= self.policy.max_retries || !self.policy.should_retry(status) {
                return Ok(response);
            }

            retries += 1;
            warn!(
                "Request to {} failed with {}, retrying ({}/{})",
                response.url(),
                status,
                retries,
                self.policy.max_retries
            );

            tokio::time::sleep(self.policy.backoff).await;
        }
    }
}

fn build_client(policy: &TransportPolicy) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(policy.connect_timeout)
        .timeout(policy.request_timeout)
        .pool_max_idle_per_host(policy.max_idle_per_host)
        .build()
}

/// TTL plus a random share of the jitter window
fn recycle_after(policy: &TransportPolicy) -> Duration {
    let window = policy.recycle_jitter.as_nanos().min(u64::MAX as u128) as u64;
    if window == 0 {
        return policy.recycle_ttl;
    }

    let jitter = rand::thread_rng().gen_range(0..window);
    policy.recycle_ttl + Duration::from_nanos(jitter)
}
