//! Error types for metadata service registration
//!
//! Errors are layered the same way the calls are: a [`TransportError`] comes
//! from a single attempt, a [`RequestError`] is the outcome of one logical call
//! after retries, and a [`RegistrationError`] tells which registration phase
//! failed.

pub mod classify;

use hyper::{Method, StatusCode};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub use classify::{AttemptFailure, FailureClass, classify, is_socket_unavailable};

/// Failure to dial the socket or to complete one request/response exchange.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("dial unix {}: {source}", .path.display())]
    Dial {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("HTTP handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("request exchange failed: {0}")]
    Exchange(#[source] hyper::Error),

    #[error("connection closed before a response was received")]
    ConnectionClosed,
}

#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("invalid app name {0:?}")]
    InvalidAppName(String),

    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Failure to put a request together. Never retried.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("failed to reopen request body {}: {source}", .path.display())]
    Body {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid request: {0}")]
    Http(#[from] hyper::http::Error),
}

/// Outcome of a failed logical call to the metadata service.
///
/// `path` never includes the query string, so registration tokens do not
/// end up in error messages.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("failed to build {method} {path} request: {source}")]
    Build {
        method: Method,
        path: String,
        #[source]
        source: BuildError,
    },

    #[error("{method} {path} failed: {source}")]
    Transport {
        method: Method,
        path: String,
        #[source]
        source: TransportError,
    },

    #[error("{method} {path} returned {status}")]
    Status {
        method: Method,
        path: String,
        status: StatusCode,
    },

    #[error("{method} {path} was cancelled")]
    Cancelled { method: Method, path: String },

    #[error(
        "could not reach the metadata service.\n\
         Make sure the metadata service is currently running.\n\
         For more information on running the metadata service,\n\
         see https://github.com/rkt/rkt/blob/master/Documentation/subcommands/metadata-service.md"
    )]
    Unreachable,
}

impl RequestError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, RequestError::Unreachable)
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure of a pod registration, tagged with the phase that produced it.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("failed opening runtime manifest {}: {source}", .path.display())]
    OpenPodManifest {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to register pod with metadata service: {0}")]
    RegisterPod(#[source] RequestError),

    #[error("failed reading manifest {} of app {app:?}: {source}", .path.display())]
    OpenAppManifest {
        app: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to register app {app:?} with metadata service: {source}")]
    RegisterApp {
        app: String,
        #[source]
        source: RequestError,
    },
}

impl RegistrationError {
    /// Name of the app whose registration failed, if the failure was app-level.
    pub fn app(&self) -> Option<&str> {
        match self {
            RegistrationError::OpenAppManifest { app, .. }
            | RegistrationError::RegisterApp { app, .. } => Some(app.as_str()),
            _ => None,
        }
    }

    pub fn request_error(&self) -> Option<&RequestError> {
        match self {
            RegistrationError::RegisterPod(source)
            | RegistrationError::RegisterApp { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        self.request_error().is_some_and(RequestError::is_unreachable)
    }
}
