//! Unix socket transport for the metadata service
//!
//! Every attempt dials the socket again and performs exactly one HTTP/1.1
//! exchange. Nothing is pooled between attempts.

use crate::error::TransportError;
use crate::logging::Logger;
use async_trait::async_trait;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use std::io;
use std::path::{Path, PathBuf};
use tokio::net::UnixStream;

/// Request body type shared by all transports: a manifest stream or nothing.
pub type RequestBody = UnsyncBoxBody<Bytes, io::Error>;

pub fn empty_body() -> RequestBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// One request/response exchange with the metadata service.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request<RequestBody>) -> Result<StatusCode, TransportError>;
}

pub struct UnixSocketTransport {
    socket_path: PathBuf,
    logger: Logger,
}

impl UnixSocketTransport {
    pub fn new(socket_path: impl Into<PathBuf>, logger: Logger) -> Self {
        Self {
            socket_path: socket_path.into(),
            logger,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

#[async_trait]
impl Transport for UnixSocketTransport {
    async fn send(&self, request: Request<RequestBody>) -> Result<StatusCode, TransportError> {
        self.logger.trace(&format!(
            "dialing {} for {} {}",
            self.socket_path.display(),
            request.method(),
            request.uri().path()
        ));

        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| TransportError::Dial {
                path: self.socket_path.clone(),
                source,
            })?;

        let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(TransportError::Handshake)?;

        // The connection is driven here rather than spawned, so the request
        // body and socket are released before this function returns.
        let mut conn = Box::pin(conn);
        let mut response = Box::pin(sender.send_request(request));
        let closed = tokio::select! {
            response = &mut response => {
                let response = response.map_err(TransportError::Exchange)?;
                return Ok(response.status());
            }
            closed = &mut conn => closed,
        };
        closed.map_err(TransportError::Exchange)?;

        // A service that closes after answering finishes the connection in the
        // same poll that queues the response. Dropping the connection settles
        // the pending response either way.
        drop(conn);
        let response = response.await.map_err(|_| TransportError::ConnectionClosed)?;
        Ok(response.status())
    }
}
