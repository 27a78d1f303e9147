//! Metadata service endpoints
//!
//! The service is only reachable over a unix socket, so the host part of every
//! URI is a fixed placeholder.

use crate::error::EndpointError;
use hyper::Uri;
use url::{Position, Url};
use uuid::Uuid;

pub const PLACEHOLDER_HOST: &str = "unixsock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// `/pods/{uuid}`
    pub fn pod(uuid: &Uuid) -> Result<Self, EndpointError> {
        let uuid = uuid.to_string();
        Self::from_segments(&[uuid.as_str()])
    }

    /// `/pods/{uuid}?token={token}`
    pub fn pod_registration(uuid: &Uuid, token: &str) -> Result<Self, EndpointError> {
        let mut endpoint = Self::pod(uuid)?;
        endpoint.url.query_pairs_mut().append_pair("token", token);
        Ok(endpoint)
    }

    /// `/pods/{uuid}/{name}`
    pub fn app(uuid: &Uuid, name: &str) -> Result<Self, EndpointError> {
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(EndpointError::InvalidAppName(name.to_string()));
        }
        let uuid = uuid.to_string();
        Self::from_segments(&[uuid.as_str(), name])
    }

    fn from_segments(segments: &[&str]) -> Result<Self, EndpointError> {
        let mut url = Url::parse(&format!("http://{}/", PLACEHOLDER_HOST))?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .clear()
            .push("pods")
            .extend(segments);
        Ok(Self { url })
    }

    /// Path without the query string; safe to log.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    /// Origin-form request target (path and query). The placeholder host
    /// goes into the `Host` header instead.
    pub fn uri(&self) -> Result<Uri, hyper::http::Error> {
        Ok(self.url[Position::BeforePath..].parse::<Uri>()?)
    }
}
