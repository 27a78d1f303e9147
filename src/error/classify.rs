//! Classification of failed metadata service attempts
//!
//! A dial to a socket path that does not exist (`ENOENT`) or is not a socket
//! (`ENOTSOCK`) means the metadata service is not running. Once retries run
//! out, that case is reported as [`RequestError::Unreachable`] instead of the
//! raw OS error.

use super::{RequestError, TransportError};
use hyper::{Method, StatusCode};
use std::error::Error;
use std::io;

/// What went wrong with a single attempt.
#[derive(Debug)]
pub enum AttemptFailure {
    Transport(TransportError),
    Status(StatusCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Connection-level failure; worth another attempt.
    RetryableTransport,
    /// The service answered with something other than 200.
    TerminalStatus,
    /// Nothing is listening on the socket path.
    Unreachable,
}

impl FailureClass {
    /// The service may still be starting, so unreachable sockets are retried too.
    pub fn is_retryable(self) -> bool {
        !matches!(self, FailureClass::TerminalStatus)
    }
}

pub fn classify(failure: &AttemptFailure) -> FailureClass {
    match failure {
        AttemptFailure::Status(_) => FailureClass::TerminalStatus,
        AttemptFailure::Transport(err) if is_socket_unavailable(err) => FailureClass::Unreachable,
        AttemptFailure::Transport(_) => FailureClass::RetryableTransport,
    }
}

/// True when the root OS error of `err` is `ENOENT` or `ENOTSOCK`.
pub fn is_socket_unavailable(err: &TransportError) -> bool {
    root_io_error(err)
        .and_then(io::Error::raw_os_error)
        .is_some_and(|code| code == libc::ENOENT || code == libc::ENOTSOCK)
}

/// Deepest `io::Error` in the source chain, starting with `err` itself.
fn root_io_error<'a>(err: &'a (dyn Error + 'static)) -> Option<&'a io::Error> {
    let mut current = Some(err);
    let mut deepest = None;
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            deepest = Some(io_err);
        }
        current = e.source();
    }
    deepest
}

impl AttemptFailure {
    /// Final error for a call whose last attempt failed this way.
    pub fn into_request_error(self, method: Method, path: String) -> RequestError {
        match classify(&self) {
            FailureClass::Unreachable => RequestError::Unreachable,
            _ => match self {
                AttemptFailure::Transport(source) => RequestError::Transport {
                    method,
                    path,
                    source,
                },
                AttemptFailure::Status(status) => RequestError::Status {
                    method,
                    path,
                    status,
                },
            },
        }
    }
}
