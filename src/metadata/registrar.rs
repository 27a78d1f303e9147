//! Pod and app registration with rollback
//!
//! A pod is registered first, then each of its apps in manifest order. If an
//! app fails, the pod entry is deleted again before the error is returned.
//! Apps that were already registered are left alone; removing the pod is the
//! only rollback step.

use super::endpoint::Endpoint;
use super::retry::RetryExecutor;
use super::transport::{Transport, UnixSocketTransport};
use crate::config::{RegistrarConfig, RetryConfig};
use crate::error::{BuildError, RegistrationError, RequestError};
use crate::logging::Logger;
use crate::pod::{App, FsManifestOpener, ManifestBody, ManifestOpener, ManifestResolver, Pod, StageLayout};
use hyper::Method;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Where a pod is in its registration sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    PodRegistered,
    AppRegistering(usize),
    FullyRegistered,
    RollingBack,
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationState::Unregistered => write!(f, "unregistered"),
            RegistrationState::PodRegistered => write!(f, "pod registered"),
            RegistrationState::AppRegistering(index) => write!(f, "registering app #{}", index + 1),
            RegistrationState::FullyRegistered => write!(f, "fully registered"),
            RegistrationState::RollingBack => write!(f, "rolling back"),
        }
    }
}

pub struct RegistrarBuilder {
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
    resolver: Arc<dyn ManifestResolver>,
    opener: Arc<dyn ManifestOpener>,
    logger: Logger,
}

impl RegistrarBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            retry: RetryConfig::default(),
            resolver: Arc::new(StageLayout),
            opener: Arc::new(FsManifestOpener),
            logger: Logger::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ManifestResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_opener(mut self, opener: Arc<dyn ManifestOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn build(self) -> Registrar {
        Registrar {
            executor: RetryExecutor::new(self.transport, self.retry, self.logger.clone()),
            resolver: self.resolver,
            opener: self.opener,
            logger: self.logger,
        }
    }
}

/// Registration client for the metadata service.
///
/// Holds no per-pod state. Different pods may be registered concurrently;
/// calls for the same pod must be serialized by the caller.
pub struct Registrar {
    executor: RetryExecutor,
    resolver: Arc<dyn ManifestResolver>,
    opener: Arc<dyn ManifestOpener>,
    logger: Logger,
}

impl Registrar {
    /// Registrar talking to the configured unix socket with the on-disk pod layout.
    pub fn new(config: &RegistrarConfig) -> Self {
        let logger = if config.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(config.verbose)
        };
        let transport = UnixSocketTransport::new(config.socket_path.clone(), logger.clone());

        Self::builder(Arc::new(transport))
            .with_retry(config.retry.clone())
            .with_logger(logger)
            .build()
    }

    pub fn builder(transport: Arc<dyn Transport>) -> RegistrarBuilder {
        RegistrarBuilder::new(transport)
    }

    pub async fn register_pod(&self, pod: &Pod, token: &str) -> Result<(), RegistrationError> {
        self.register_pod_cancellable(pod, token, &CancellationToken::new())
            .await
    }

    /// Like [`register_pod`](Self::register_pod), but gives up as soon as `cancel` fires.
    ///
    /// The rollback after a failed app is not cancellable; it always runs with
    /// the full retry policy.
    pub async fn register_pod_cancellable(
        &self,
        pod: &Pod,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<(), RegistrationError> {
        let started = Instant::now();
        self.logger.info(&format!(
            "Registering pod {} with {} app(s)",
            pod.uuid,
            pod.apps.len()
        ));

        self.put_pod(pod, token, cancel).await?;
        self.transition(pod, RegistrationState::PodRegistered);

        if let Err(err) = self.register_apps(pod, cancel).await {
            self.rollback(pod).await;
            return Err(err);
        }

        self.transition(pod, RegistrationState::FullyRegistered);
        self.logger.success(&format!(
            "Pod {} registered in {}",
            pod.uuid,
            self.logger.format_duration(started.elapsed())
        ));
        Ok(())
    }

    pub async fn unregister_pod(&self, pod: &Pod) -> Result<(), RequestError> {
        self.unregister_pod_cancellable(pod, &CancellationToken::new())
            .await
    }

    /// `DELETE /pods/{uuid}`. Whatever the service answers is returned as is.
    pub async fn unregister_pod_cancellable(
        &self,
        pod: &Pod,
        cancel: &CancellationToken,
    ) -> Result<(), RequestError> {
        let endpoint = Endpoint::pod(&pod.uuid)
            .map_err(|err| build_error(Method::DELETE, format!("/pods/{}", pod.uuid), err))?;
        self.executor
            .execute(Method::DELETE, &endpoint, None, cancel)
            .await?;
        self.transition(pod, RegistrationState::Unregistered);
        Ok(())
    }

    pub async fn register_app(
        &self,
        uuid: &Uuid,
        name: &str,
        manifest: &mut ManifestBody,
    ) -> Result<(), RequestError> {
        self.register_app_cancellable(uuid, name, manifest, &CancellationToken::new())
            .await
    }

    /// `PUT /pods/{uuid}/{name}` with the app manifest as body.
    pub async fn register_app_cancellable(
        &self,
        uuid: &Uuid,
        name: &str,
        manifest: &mut ManifestBody,
        cancel: &CancellationToken,
    ) -> Result<(), RequestError> {
        let endpoint = Endpoint::app(uuid, name)
            .map_err(|err| build_error(Method::PUT, format!("/pods/{}/{}", uuid, name), err))?;
        self.executor
            .execute(Method::PUT, &endpoint, Some(manifest), cancel)
            .await
    }

    async fn put_pod(
        &self,
        pod: &Pod,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<(), RegistrationError> {
        let path = self.resolver.manifest_path(&pod.root, None);
        let mut manifest = self
            .opener
            .open(&path)
            .await
            .map_err(|source| RegistrationError::OpenPodManifest { path, source })?;

        let endpoint = Endpoint::pod_registration(&pod.uuid, token)
            .map_err(|err| build_error(Method::PUT, format!("/pods/{}", pod.uuid), err))
            .map_err(RegistrationError::RegisterPod)?;

        self.executor
            .execute(Method::PUT, &endpoint, Some(&mut manifest), cancel)
            .await
            .map_err(RegistrationError::RegisterPod)
    }

    async fn register_apps(&self, pod: &Pod, cancel: &CancellationToken) -> Result<(), RegistrationError> {
        for (index, app) in pod.apps.iter().enumerate() {
            self.transition(pod, RegistrationState::AppRegistering(index));
            self.put_app(pod, app, cancel).await?;
        }
        Ok(())
    }

    /// Opens the app manifest right before its request; the handle is dropped on return.
    async fn put_app(&self, pod: &Pod, app: &App, cancel: &CancellationToken) -> Result<(), RegistrationError> {
        let path = self.resolver.manifest_path(&pod.root, Some(&app.image_id));
        let mut manifest = self.opener.open(&path).await.map_err(|source| {
            RegistrationError::OpenAppManifest {
                app: app.name.clone(),
                path,
                source,
            }
        })?;

        self.register_app_cancellable(&pod.uuid, &app.name, &mut manifest, cancel)
            .await
            .map_err(|source| RegistrationError::RegisterApp {
                app: app.name.clone(),
                source,
            })
    }

    /// Best-effort removal of the pod entry. The outcome never reaches the caller.
    async fn rollback(&self, pod: &Pod) {
        self.transition(pod, RegistrationState::RollingBack);
        if let Err(err) = self.unregister_pod(pod).await {
            self.logger.warning(&format!(
                "Rollback of pod {} failed, ignoring: {}",
                pod.uuid, err
            ));
        }
    }

    fn transition(&self, pod: &Pod, state: RegistrationState) {
        self.logger.debug(&format!("pod {}: {}", pod.uuid, state));
    }
}

fn build_error(method: Method, path: String, err: impl Into<BuildError>) -> RequestError {
    RequestError::Build {
        method,
        path,
        source: err.into(),
    }
}
