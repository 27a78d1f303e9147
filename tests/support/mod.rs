#![allow(dead_code)]

use async_trait::async_trait;
use http_body_util::BodyExt;
use hyper::{Method, Request, StatusCode};
use pod_registrar::metadata::RequestBody;
use pod_registrar::{Pod, Transport, TransportError};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;
use uuid::Uuid;

/// A request as seen by the metadata service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub body: Vec<u8>,
}

impl Call {
    pub fn is(&self, method: &Method, path: &str) -> bool {
        &self.method == method && self.path == path
    }
}

type Responder = dyn Fn(&Method, &str) -> Result<StatusCode, TransportError> + Send + Sync;

/// Records every request and answers through a caller-supplied responder.
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    respond: Box<Responder>,
}

impl RecordingTransport {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&Method, &str) -> Result<StatusCode, TransportError> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    pub fn always_ok() -> Self {
        Self::new(|_, _| Ok(StatusCode::OK))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: &Method, path: &str) -> usize {
        self.calls().iter().filter(|c| c.is(method, path)).count()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: Request<RequestBody>) -> Result<StatusCode, TransportError> {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let query = request.uri().query().map(str::to_string);
        let body = request
            .into_body()
            .collect()
            .await
            .map(|collected| collected.to_bytes().to_vec())
            .unwrap_or_default();

        self.calls.lock().unwrap().push(Call {
            method: method.clone(),
            path: path.clone(),
            query,
            body,
        });
        (self.respond)(&method, &path)
    }
}

pub fn dial_error(errno: i32) -> TransportError {
    TransportError::Dial {
        path: PathBuf::from("/run/rkt/metadata-svc.sock"),
        source: io::Error::from_raw_os_error(errno),
    }
}

/// A prepared pod directory laid out the way `StageLayout` expects.
pub struct PodFixture {
    pub dir: TempDir,
    pub pod: Pod,
}

impl PodFixture {
    pub fn new(apps: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut pod = Pod::new(Uuid::new_v4(), dir.path());
        std::fs::write(dir.path().join("pod"), Self::pod_manifest(&pod.uuid)).unwrap();

        for name in apps {
            let image_id = format!("sha512-{}", name);
            let manifest = Self::image_manifest_path(dir.path(), &image_id);
            std::fs::create_dir_all(manifest.parent().unwrap()).unwrap();
            std::fs::write(&manifest, Self::app_manifest(name)).unwrap();
            pod = pod.with_app(*name, image_id);
        }

        Self { dir, pod }
    }

    pub fn pod_manifest(uuid: &Uuid) -> Vec<u8> {
        format!(r#"{{"acKind":"PodManifest","uuid":"{}"}}"#, uuid).into_bytes()
    }

    pub fn app_manifest(name: &str) -> Vec<u8> {
        format!(r#"{{"acKind":"ImageManifest","name":"{}"}}"#, name).into_bytes()
    }

    pub fn image_manifest_path(root: &Path, image_id: &str) -> PathBuf {
        root.join("stage1/rootfs/opt/stage2")
            .join(image_id)
            .join("manifest")
    }

    pub fn remove_app_manifest(&self, name: &str) {
        let path = Self::image_manifest_path(self.dir.path(), &format!("sha512-{}", name));
        std::fs::remove_file(path).unwrap();
    }

    pub fn pod_path(&self) -> String {
        format!("/pods/{}", self.pod.uuid)
    }

    pub fn app_path(&self, name: &str) -> String {
        format!("/pods/{}/{}", self.pod.uuid, name)
    }
}
