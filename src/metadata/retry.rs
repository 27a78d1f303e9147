//! Bounded retry with a fixed pause between attempts

use super::endpoint::{Endpoint, PLACEHOLDER_HOST};
use super::transport::{RequestBody, Transport, empty_body};
use crate::config::RetryConfig;
use crate::error::{AttemptFailure, BuildError, RequestError, classify};
use crate::logging::Logger;
use crate::pod::ManifestBody;
use hyper::header::HOST;
use hyper::{Method, Request, StatusCode};
use std::sync::Arc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Runs one logical call against the metadata service.
///
/// Transport failures are retried up to `max_attempts` times with a fixed pause
/// between attempts. A non-200 status or a request that cannot be built is
/// returned right away.
#[derive(Clone)]
pub struct RetryExecutor {
    transport: Arc<dyn Transport>,
    policy: RetryConfig,
    logger: Logger,
}

impl RetryExecutor {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryConfig, logger: Logger) -> Self {
        Self {
            transport,
            policy,
            logger,
        }
    }

    pub fn policy(&self) -> &RetryConfig {
        &self.policy
    }

    pub async fn execute(
        &self,
        method: Method,
        endpoint: &Endpoint,
        mut body: Option<&mut ManifestBody>,
        cancel: &CancellationToken,
    ) -> Result<(), RequestError> {
        let path = endpoint.path().to_string();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.logger.detail(&format!(
                "{} {} attempt {} of {}",
                method, path, attempt, max_attempts
            ));

            let request = build_request(&method, endpoint, body.as_deref_mut())
                .await
                .map_err(|source| RequestError::Build {
                    method: method.clone(),
                    path: path.clone(),
                    source,
                })?;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(&method, &path)),
                outcome = self.transport.send(request) => outcome,
            };

            let failure = match outcome {
                Ok(status) if status == StatusCode::OK => return Ok(()),
                Ok(status) => AttemptFailure::Status(status),
                Err(err) => {
                    self.logger.warning(&format!(
                        "{} {} attempt {} of {} failed: {}",
                        method, path, attempt, max_attempts, err
                    ));
                    AttemptFailure::Transport(err)
                }
            };

            // Only the last attempt's failure is classified into the final error.
            if !classify(&failure).is_retryable() || attempt >= max_attempts {
                return Err(failure.into_request_error(method, path));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(&method, &path)),
                _ = sleep(self.policy.pause()) => {}
            }
        }
    }
}

async fn build_request(
    method: &Method,
    endpoint: &Endpoint,
    body: Option<&mut ManifestBody>,
) -> Result<Request<RequestBody>, BuildError> {
    let body = match body {
        Some(manifest) => manifest
            .request_body()
            .await
            .map_err(|source| BuildError::Body {
                path: manifest.path().to_path_buf(),
                source,
            })?,
        None => empty_body(),
    };

    let request = Request::builder()
        .method(method.clone())
        .uri(endpoint.uri()?)
        .header(HOST, PLACEHOLDER_HOST)
        .body(body)?;
    Ok(request)
}

fn cancelled(method: &Method, path: &str) -> RequestError {
    RequestError::Cancelled {
        method: method.clone(),
        path: path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use std::io;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;
    use uuid::Uuid;

    /// Replays scripted outcomes and records the time of every attempt.
    struct ScriptedTransport {
        outcomes: Mutex<Vec<Result<StatusCode, io::Error>>>,
        attempts: Mutex<Vec<Instant>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<Result<StatusCode, io::Error>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into_iter().rev().collect()),
                attempts: Mutex::new(Vec::new()),
            })
        }

        fn attempts(&self) -> Vec<Instant> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, _request: Request<RequestBody>) -> Result<StatusCode, TransportError> {
            self.attempts.lock().unwrap().push(Instant::now());
            let next = self.outcomes.lock().unwrap().pop();
            match next {
                Some(Ok(status)) => Ok(status),
                Some(Err(source)) => Err(TransportError::Dial {
                    path: PathBuf::from("/run/mds.sock"),
                    source,
                }),
                None => Err(TransportError::ConnectionClosed),
            }
        }
    }

    fn executor(transport: Arc<ScriptedTransport>) -> RetryExecutor {
        RetryExecutor::new(transport, RetryConfig::default(), Logger::new_quiet())
    }

    fn refused() -> io::Error {
        io::Error::from_raw_os_error(libc::ECONNREFUSED)
    }

    fn endpoint() -> Endpoint {
        Endpoint::pod(&Uuid::new_v4()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transport_failures_with_fixed_pause() {
        let transport = ScriptedTransport::new(vec![Err(refused()), Err(refused()), Err(refused())]);
        let err = executor(transport.clone())
            .execute(Method::DELETE, &endpoint(), None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::Transport { .. }));
        let attempts = transport.attempts();
        assert_eq!(attempts.len(), 3);
        for pair in attempts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failure() {
        let transport = ScriptedTransport::new(vec![Err(refused()), Ok(StatusCode::OK)]);
        executor(transport.clone())
            .execute(Method::DELETE, &endpoint(), None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(transport.attempts().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_is_never_retried() {
        let transport = ScriptedTransport::new(vec![Ok(StatusCode::NOT_FOUND), Ok(StatusCode::OK)]);
        let err = executor(transport.clone())
            .execute(Method::DELETE, &endpoint(), None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(transport.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_success_codes_are_failures() {
        let transport = ScriptedTransport::new(vec![Ok(StatusCode::NO_CONTENT)]);
        let err = executor(transport)
            .execute(Method::DELETE, &endpoint(), None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NO_CONTENT));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_socket_becomes_unreachable_after_retries() {
        let transport = ScriptedTransport::new(vec![
            Err(refused()),
            Err(refused()),
            Err(io::Error::from_raw_os_error(libc::ENOENT)),
        ]);
        let err = executor(transport.clone())
            .execute(Method::DELETE, &endpoint(), None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_unreachable());
        assert_eq!(transport.attempts().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_last_error_is_classified() {
        let transport = ScriptedTransport::new(vec![
            Err(io::Error::from_raw_os_error(libc::ENOENT)),
            Err(io::Error::from_raw_os_error(libc::ENOENT)),
            Err(refused()),
        ]);
        let err = executor(transport)
            .execute(Method::DELETE, &endpoint(), None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(!err.is_unreachable());
        assert!(matches!(err, RequestError::Transport { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_pause_stops_retrying() {
        let transport = ScriptedTransport::new(vec![Err(refused()), Err(refused()), Err(refused())]);
        let cancel = CancellationToken::new();
        let executor = executor(transport.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let err = executor
            .execute(Method::DELETE, &endpoint(), None, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::Cancelled { .. }));
        assert_eq!(transport.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_manifest_body_request_succeeds_first_try() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest");
        std::fs::write(&path, b"{}").unwrap();
        let mut body = ManifestBody::open(&path).await.unwrap();

        let transport = ScriptedTransport::new(vec![Ok(StatusCode::OK)]);
        let policy = RetryConfig::new(3, Duration::from_millis(1));
        let executor = RetryExecutor::new(transport.clone(), policy, Logger::new_quiet());

        executor
            .execute(Method::PUT, &endpoint(), Some(&mut body), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(transport.attempts().len(), 1);
    }
}
