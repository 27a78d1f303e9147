//! Manifest file collaborators
//!
//! Pod and app manifests are opaque bytes to this crate. A [`ManifestResolver`]
//! maps a pod root to the file to send, a [`ManifestOpener`] opens it, and the
//! resulting [`ManifestBody`] is streamed as a request body without buffering.

use crate::metadata::transport::RequestBody;
use async_trait::async_trait;
use futures::TryStreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

/// Maps a pod root and an optional image id to a manifest path.
///
/// `None` selects the pod manifest, `Some(image_id)` the manifest of that app image.
pub trait ManifestResolver: Send + Sync {
    fn manifest_path(&self, pod_root: &Path, image_id: Option<&str>) -> PathBuf;
}

/// On-disk layout of a prepared pod.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageLayout;

impl StageLayout {
    const POD_MANIFEST: &'static str = "pod";
    const STAGE2_DIR: &'static str = "stage1/rootfs/opt/stage2";
    const IMAGE_MANIFEST: &'static str = "manifest";
}

impl ManifestResolver for StageLayout {
    fn manifest_path(&self, pod_root: &Path, image_id: Option<&str>) -> PathBuf {
        match image_id {
            None => pod_root.join(Self::POD_MANIFEST),
            Some(id) => pod_root
                .join(Self::STAGE2_DIR)
                .join(id)
                .join(Self::IMAGE_MANIFEST),
        }
    }
}

#[async_trait]
pub trait ManifestOpener: Send + Sync {
    async fn open(&self, path: &Path) -> io::Result<ManifestBody>;
}

/// Opens manifests straight from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsManifestOpener;

#[async_trait]
impl ManifestOpener for FsManifestOpener {
    async fn open(&self, path: &Path) -> io::Result<ManifestBody> {
        ManifestBody::open(path).await
    }
}

/// An open manifest file. The handle is closed when the body is dropped.
#[derive(Debug)]
pub struct ManifestBody {
    path: PathBuf,
    file: Option<File>,
}

impl ManifestBody {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await?;
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream the whole file from the start.
    ///
    /// Called once per attempt. The first attempt uses the handle from
    /// [`open`](Self::open); later attempts reopen the path, so no two
    /// attempts share a file offset.
    pub(crate) async fn request_body(&mut self) -> io::Result<RequestBody> {
        let file = match self.file.take() {
            Some(file) => file,
            None => File::open(&self.path).await?,
        };
        let stream = ReaderStream::new(file).map_ok(Frame::data);
        Ok(StreamBody::new(stream).boxed_unsync())
    }
}
