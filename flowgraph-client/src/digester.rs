//! Digester client
//!
//! The digester builds flow log digests asynchronously. Getting one is a
//! two step protocol against the same endpoint:
//! - `POST ?start&stop` creates the digest job (202) or finds it already
//!   created or running (409)
//! - `GET ?start&stop` is polled until it answers 200 with the gzipped digest;
//!   204 means "not ready yet"

use bytes::Bytes;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flowgraph_core::domain::range::format_timestamp;
use reqwest::{StatusCode, Url};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{CancelReason, ClientError, Result};
use crate::transport::HttpTransport;

/// Bounds of the poll loop
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Maximum number of GET polls
    pub attempts: u32,
    /// Wait between two polls
    pub interval: Duration,
    /// Overall deadline for the whole digest operation
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        }
    }
}

/// HTTP client for the digester service
pub struct DigesterClient {
    endpoint: Url,
    poll: PollPolicy,
    transport: Arc<HttpTransport>,
}

impl DigesterClient {
    /// Create a new digester client
    ///
    /// # Arguments
    /// * `endpoint` - Digester URL; both the create and the poll calls go here
    /// * `poll` - Poll loop bounds
    /// * `transport` - Shared outbound transport
    pub fn new(endpoint: Url, poll: PollPolicy, transport: Arc<HttpTransport>) -> Self {
        Self {
            endpoint,
            poll,
            transport,
        }
    }

    /// Get the digester endpoint
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Create a digest for the window and wait for it to be ready.
    ///
    /// Requests in flight and the wait between polls both end early when
    /// `cancel` fires or the poll deadline passes. The returned bytes are the
    /// fully decompressed digest.
    pub async fn digest(
        &self,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        let deadline = Instant::now() + self.poll.timeout;
        let query = range_query(start, stop);

        let create = async {
            let response = self
                .transport
                .send(|client| client.post(self.endpoint.clone()).query(&query))
                .await?;

            let status = response.status();
            if status != StatusCode::ACCEPTED && status != StatusCode::CONFLICT {
                let body = response.text().await.unwrap_or_default();
                return Err(ClientError::unexpected_status(status.as_u16(), body));
            }
            Ok(status)
        };
        let status = interruptible(create, 0, deadline, cancel).await?;

        debug!("Digest job accepted by digester ({}), polling", status);

        self.wait_for_digest(&query, deadline, cancel).await
    }

    async fn wait_for_digest(
        &self,
        query: &[(&'static str, String)],
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        for attempt in 1..=self.poll.attempts {
            let poll = async {
                let response = self
                    .transport
                    .send(|client| client.get(self.endpoint.clone()).query(query))
                    .await?;

                match response.status() {
                    StatusCode::OK => Ok(Some(response.bytes().await?)),
                    StatusCode::NO_CONTENT => Ok(None),
                    status => {
                        let body = response.text().await.unwrap_or_default();
                        Err(ClientError::unexpected_status(status.as_u16(), body))
                    }
                }
            };

            match interruptible(poll, attempt, deadline, cancel).await? {
                Some(body) => {
                    info!("Digest ready after {} poll attempt(s)", attempt);
                    return extract_digest(&body);
                }
                None => debug!(
                    "Digest not ready (attempt {}/{})",
                    attempt, self.poll.attempts
                ),
            }

            if attempt == self.poll.attempts {
                break;
            }

            let wait = async {
                tokio::time::sleep(self.poll.interval).await;
                Ok::<_, ClientError>(())
            };
            interruptible(wait, attempt, deadline, cancel).await?;
        }

        Err(ClientError::MaxPollAttempts(self.poll.attempts))
    }
}

/// Runs `step` unless `cancel` fires or `deadline` passes first.
/// `attempts` is the number of polls issued so far.
async fn interruptible<T>(
    step: impl Future<Output = Result<T>>,
    attempts: u32,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::PollCancelled {
            attempts,
            reason: CancelReason::Cancelled,
        }),
        _ = tokio::time::sleep_until(deadline) => Err(ClientError::PollCancelled {
            attempts,
            reason: CancelReason::DeadlineExceeded,
        }),
        result = step => result,
    }
}

fn range_query(start: DateTime<Utc>, stop: DateTime<Utc>) -> Vec<(&'static str, String)> {
    vec![
        ("start", format_timestamp(start)),
        ("stop", format_timestamp(stop)),
    ]
}

/// Decompress the whole digest into memory
fn extract_digest(body: &[u8]) -> Result<Bytes> {
    let mut decoder = GzDecoder::new(body);
    let mut data = Vec::new();
    decoder
        .read_to_end(&mut data)
        .map_err(ClientError::Decompress)?;
    Ok(Bytes::from(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_server;
    use crate::transport::TransportPolicy;
    use axum::{Router, extract::Query, extract::State, routing::post};
    use flate2::{Compression, write::GzEncoder};
    use std::collections::{HashMap, VecDeque};
    use std::io::Write;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted digester: one status for the create call, a queue of poll answers
    #[derive(Clone)]
    struct FakeDigester {
        create_status: StatusCode,
        polls: Arc<Mutex<VecDeque<(StatusCode, Vec<u8>)>>>,
        creates: Arc<AtomicUsize>,
        poll_count: Arc<AtomicUsize>,
        last_query: Arc<Mutex<HashMap<String, String>>>,
    }

    impl FakeDigester {
        fn new(create_status: StatusCode, polls: Vec<(StatusCode, Vec<u8>)>) -> Self {
            Self {
                create_status,
                polls: Arc::new(Mutex::new(polls.into())),
                creates: Arc::new(AtomicUsize::new(0)),
                poll_count: Arc::new(AtomicUsize::new(0)),
                last_query: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn serve(&self) -> Url {
            async fn create(
                State(fake): State<FakeDigester>,
                Query(query): Query<HashMap<String, String>>,
            ) -> (StatusCode, &'static str) {
                fake.creates.fetch_add(1, Ordering::SeqCst);
                *fake.last_query.lock().unwrap() = query;
                (fake.create_status, "short and stout")
            }

            async fn poll(State(fake): State<FakeDigester>) -> (StatusCode, Vec<u8>) {
                fake.poll_count.fetch_add(1, Ordering::SeqCst);
                fake.polls
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or((StatusCode::NO_CONTENT, Vec::new()))
            }

            let app = Router::new()
                .route("/digest", post(create).get(poll))
                .with_state(self.clone());

            let base = spawn_server(app).await;
            Url::parse(&format!("{}/digest", base)).unwrap()
        }

        fn creates(&self) -> usize {
            self.creates.load(Ordering::SeqCst)
        }

        fn polls(&self) -> usize {
            self.poll_count.load(Ordering::SeqCst)
        }
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn client(endpoint: Url, poll: PollPolicy) -> DigesterClient {
        let transport = HttpTransport::new(TransportPolicy {
            backoff: Duration::from_millis(1),
            ..TransportPolicy::default()
        })
        .unwrap();
        DigesterClient::new(endpoint, poll, Arc::new(transport))
    }

    fn quick_poll(attempts: u32) -> PollPolicy {
        PollPolicy {
            attempts,
            interval: Duration::from_millis(5),
            timeout: Duration::from_secs(10),
        }
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        let start = "2020-01-01T00:00:00Z".parse().unwrap();
        let stop = "2020-01-01T00:05:00Z".parse().unwrap();
        (start, stop)
    }

    #[tokio::test]
    async fn test_unexpected_create_status_fails_without_polling() {
        let fake = FakeDigester::new(StatusCode::IM_A_TEAPOT, vec![]);
        let digester = client(fake.serve().await, quick_poll(3));
        let (start, stop) = window();

        let err = digester
            .digest(start, stop, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            ClientError::UnexpectedStatus { status, body } => {
                assert_eq!(status, 418);
                assert_eq!(body, "short and stout");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fake.creates(), 1);
        assert_eq!(fake.polls(), 0);
    }

    #[tokio::test]
    async fn test_exhausting_attempts_reports_max_attempts() {
        let fake = FakeDigester::new(StatusCode::ACCEPTED, vec![]);
        let digester = client(fake.serve().await, quick_poll(3));
        let (start, stop) = window();

        let err = digester
            .digest(start, stop, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::MaxPollAttempts(3)));
        assert_eq!(fake.polls(), 3);
    }

    #[tokio::test]
    async fn test_conflict_then_ready_returns_decompressed_digest() {
        let fake = FakeDigester::new(
            StatusCode::CONFLICT,
            vec![
                (StatusCode::NO_CONTENT, Vec::new()),
                (StatusCode::OK, gzip(b"digest-bytes")),
            ],
        );
        let digester = client(fake.serve().await, quick_poll(3));
        let (start, stop) = window();

        let digest = digester
            .digest(start, stop, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(&digest[..], b"digest-bytes");
        assert_eq!(fake.polls(), 2);
    }

    #[tokio::test]
    async fn test_unexpected_poll_status_is_terminal() {
        let fake = FakeDigester::new(
            StatusCode::ACCEPTED,
            vec![(StatusCode::BAD_REQUEST, b"bad window".to_vec())],
        );
        let digester = client(fake.serve().await, quick_poll(5));
        let (start, stop) = window();

        let err = digester
            .digest(start, stop, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::UnexpectedStatus { status: 400, .. }));
        assert_eq!(fake.polls(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_the_wait() {
        let fake = FakeDigester::new(StatusCode::ACCEPTED, vec![]);
        let poll = PollPolicy {
            attempts: 5,
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(120),
        };
        let digester = client(fake.serve().await, poll);
        let (start, stop) = window();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let err = digester.digest(start, stop, &cancel).await.unwrap_err();

        match err {
            ClientError::PollCancelled { attempts, reason } => {
                assert_eq!(attempts, 1);
                assert_eq!(reason, CancelReason::Cancelled);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fake.polls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_fails_without_polling() {
        let fake = FakeDigester::new(StatusCode::ACCEPTED, vec![]);
        let digester = client(fake.serve().await, quick_poll(3));
        let (start, stop) = window();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = digester.digest(start, stop, &cancel).await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::PollCancelled {
                attempts: 0,
                reason: CancelReason::Cancelled,
            }
        ));
        assert_eq!(fake.polls(), 0);
    }

    /// Accepts the digest job, then never answers a poll
    async fn stalled_digester() -> Url {
        async fn create() -> StatusCode {
            StatusCode::ACCEPTED
        }

        async fn stall() -> StatusCode {
            tokio::time::sleep(Duration::from_secs(60)).await;
            StatusCode::NO_CONTENT
        }

        let app = Router::new().route("/digest", post(create).get(stall));
        let base = spawn_server(app).await;
        Url::parse(&format!("{}/digest", base)).unwrap()
    }

    #[tokio::test]
    async fn test_deadline_interrupts_a_stalled_poll() {
        let poll = PollPolicy {
            attempts: 5,
            interval: Duration::from_millis(5),
            timeout: Duration::from_millis(300),
        };
        let digester = client(stalled_digester().await, poll);
        let (start, stop) = window();

        let started = Instant::now();
        let err = digester
            .digest(start, stop, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::PollCancelled {
                attempts: 1,
                reason: CancelReason::DeadlineExceeded,
            }
        ));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_a_stalled_poll() {
        let digester = client(stalled_digester().await, quick_poll(5));
        let (start, stop) = window();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let err = digester.digest(start, stop, &cancel).await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::PollCancelled {
                attempts: 1,
                reason: CancelReason::Cancelled,
            }
        ));
    }

    #[tokio::test]
    async fn test_deadline_interrupts_the_wait() {
        let fake = FakeDigester::new(StatusCode::ACCEPTED, vec![]);
        let poll = PollPolicy {
            attempts: 5,
            interval: Duration::from_secs(60),
            timeout: Duration::from_millis(20),
        };
        let digester = client(fake.serve().await, poll);
        let (start, stop) = window();

        let err = digester
            .digest(start, stop, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::PollCancelled {
                reason: CancelReason::DeadlineExceeded,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_range_is_sent_with_nanosecond_timestamps() {
        let fake = FakeDigester::new(
            StatusCode::ACCEPTED,
            vec![(StatusCode::OK, gzip(b"digest"))],
        );
        let digester = client(fake.serve().await, quick_poll(1));
        let (start, stop) = window();

        digester
            .digest(start, stop, &CancellationToken::new())
            .await
            .unwrap();

        let query = fake.last_query.lock().unwrap().clone();
        assert_eq!(query["start"], "2020-01-01T00:00:00.000000000Z");
        assert_eq!(query["stop"], "2020-01-01T00:05:00.000000000Z");
    }

    #[tokio::test]
    async fn test_invalid_gzip_body_is_reported() {
        let fake = FakeDigester::new(
            StatusCode::ACCEPTED,
            vec![(StatusCode::OK, b"plain text".to_vec())],
        );
        let digester = client(fake.serve().await, quick_poll(1));
        let (start, stop) = window();

        let err = digester
            .digest(start, stop, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Decompress(_)));
    }
}
