//! Metadata service client
//!
//! This module talks to the metadata service over its registration socket.
//! [`Registrar`] sequences the pod and app calls, [`RetryExecutor`] applies
//! the retry policy to each call, and a [`Transport`] performs the exchanges.

pub mod endpoint;
pub mod registrar;
pub mod retry;
pub mod transport;

pub use endpoint::Endpoint;
pub use registrar::{Registrar, RegistrarBuilder, RegistrationState};
pub use retry::RetryExecutor;
pub use transport::{RequestBody, Transport, UnixSocketTransport};
