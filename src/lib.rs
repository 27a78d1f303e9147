//! Pod Registrar Library
//!
//! Registers a pod and its apps with the local metadata service over a unix
//! socket, retrying transient connection failures and rolling the pod entry
//! back when an app cannot be registered.

pub mod config;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod pod;

pub use config::{RegistrarConfig, RetryConfig};
pub use error::{RegistrationError, RequestError, TransportError};
pub use logging::Logger;
pub use metadata::{Registrar, RegistrarBuilder, Transport};
pub use pod::{App, ManifestBody, Pod};
