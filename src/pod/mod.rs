//! Pod and app descriptors
//!
//! Only the fields needed to register a pod are kept here. Reading the pod
//! manifest into a [`Pod`] happens elsewhere; this crate only streams the
//! manifest files to the metadata service.

pub mod manifest;

use std::path::PathBuf;
use uuid::Uuid;

pub use manifest::{FsManifestOpener, ManifestBody, ManifestOpener, ManifestResolver, StageLayout};

/// A workload instance and its apps, in manifest order.
#[derive(Debug, Clone)]
pub struct Pod {
    pub uuid: Uuid,
    pub root: PathBuf,
    pub apps: Vec<App>,
}

/// A named sub-component of a pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    pub name: String,
    pub image_id: String,
}

impl Pod {
    pub fn new(uuid: Uuid, root: impl Into<PathBuf>) -> Self {
        Self {
            uuid,
            root: root.into(),
            apps: Vec::new(),
        }
    }

    pub fn with_app(mut self, name: impl Into<String>, image_id: impl Into<String>) -> Self {
        self.apps.push(App::new(name, image_id));
        self
    }
}

impl App {
    pub fn new(name: impl Into<String>, image_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_id: image_id.into(),
        }
    }
}
