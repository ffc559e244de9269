use std::path::Path;
use std::time::Duration;

use sitesync_core::{PutStatus, SiteClient};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::error::SyncError;
use super::report::Reporter;

const DEFAULT_MAX_ATTEMPTS: u32 = 12;
const DEFAULT_THROTTLE_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_CONTROL: &str = "no-cache";

/// Upload tunables handed to the worker pool.
#[derive(Debug, Clone)]
pub struct TransferPolicy {
    /// Total PUT attempts per file, including the first.
    pub max_attempts: u32,
    /// Fixed pause after a throttled response.
    pub throttle_delay: Duration,
    pub cache_control: String,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            throttle_delay: DEFAULT_THROTTLE_DELAY,
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
        }
    }
}

/// One file's upload: what to send and where.
#[derive(Debug, Clone, Copy)]
pub struct PutRequest<'a> {
    pub url: &'a Url,
    pub source: &'a Path,
    pub content_type: &'a str,
    pub content_length: u64,
}

/// Streams `request.source` to the site, retrying throttled attempts with a
/// fixed delay. Returns the number of attempts used.
pub async fn put_with_retry(
    client: &SiteClient,
    request: PutRequest<'_>,
    policy: &TransferPolicy,
    reporter: &Reporter,
    cancel: &CancellationToken,
) -> Result<u32, SyncError> {
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        // reopened per attempt; the previous body was consumed
        let file = tokio::fs::File::open(request.source)
            .await
            .map_err(|err| SyncError::local_io(request.source, err))?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let status = client
            .put_object(
                request.url,
                body,
                request.content_type,
                request.content_length,
                &policy.cache_control,
            )
            .await
            .map_err(|err| SyncError::from_request("PUT", request.url.as_str(), err))?;

        match status {
            PutStatus::Stored => return Ok(attempt),
            PutStatus::Throttled => {
                debug!(url = %request.url, attempt, "upload throttled");
                if attempt == max_attempts {
                    break;
                }
                reporter.notice("server busy; retrying");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                    _ = tokio::time::sleep(policy.throttle_delay) => {}
                }
            }
        }
    }
    Err(SyncError::RetryBudgetExhausted {
        path: request.url.to_string(),
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use tempfile::tempdir;
    use wiremock::matchers::{body_bytes, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy() -> TransferPolicy {
        TransferPolicy {
            throttle_delay: Duration::from_millis(1),
            ..TransferPolicy::default()
        }
    }

    async fn upload(server: &MockServer, policy: &TransferPolicy) -> Result<u32, SyncError> {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.bin");
        std::fs::write(&source, b"payload").unwrap();

        let client = SiteClient::new(&server.uri(), Some("session=abc")).unwrap();
        let url = client.object_url("in.bin").unwrap();
        put_with_retry(
            &client,
            PutRequest {
                url: &url,
                source: &source,
                content_type: "application/octet-stream",
                content_length: 7,
            },
            policy,
            &Reporter::new(true),
            &CancellationToken::new(),
        )
        .await
    }

    #[test]
    fn default_policy_matches_server_contract() {
        let policy = TransferPolicy::default();
        assert_eq!(policy.max_attempts, 12);
        assert_eq!(policy.throttle_delay, Duration::from_secs(5));
        assert_eq!(policy.cache_control, "no-cache");
    }

    #[tokio::test]
    async fn always_throttled_gives_up_after_budget() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/in.bin"))
            .respond_with(ResponseTemplate::new(429))
            .expect(12)
            .mount(&server)
            .await;

        let err = upload(&server, &fast_policy()).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::RetryBudgetExhausted { attempts: 12, .. }
        ));
        assert!(err.to_string().contains("too many retries"));
    }

    #[tokio::test]
    async fn throttled_once_then_stored_takes_two_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(body_bytes(b"payload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(upload(&server, &fast_policy()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unexpected_status_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let err = upload(&server, &fast_policy()).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::RemoteProtocol {
                method: "PUT",
                status: StatusCode::INTERNAL_SERVER_ERROR,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let source = dir.path().join("in.bin");
        std::fs::write(&source, b"payload").unwrap();
        let client = SiteClient::new(&server.uri(), Some("session=abc")).unwrap();
        let url = client.object_url("in.bin").unwrap();
        let cancel = CancellationToken::new();
        let policy = TransferPolicy {
            throttle_delay: Duration::from_secs(60),
            ..TransferPolicy::default()
        };

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });
        let err = put_with_retry(
            &client,
            PutRequest {
                url: &url,
                source: &source,
                content_type: "application/octet-stream",
                content_length: 7,
            },
            &policy,
            &Reporter::new(true),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
    }
}
