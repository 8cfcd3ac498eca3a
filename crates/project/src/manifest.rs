//! Project manifest (`project.json`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ProjectError;

/// File name of the manifest at the project root.
pub const MANIFEST_FILE: &str = "project.json";

/// Screen orientation requested by the game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Default,
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
        }
    }
}

/// Contents of `project.json`.
///
/// Every field has a default so that a half-written manifest still loads;
/// [`crate::validate_project`] reports what is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub package_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default = "default_source_dir")]
    pub source_dir: String,
}

fn default_source_dir() -> String {
    "game".into()
}

impl Default for ProjectManifest {
    fn default() -> Self {
        Self {
            name: String::new(),
            package_name: String::new(),
            version: String::new(),
            author: String::new(),
            orientation: Orientation::Default,
            source_dir: default_source_dir(),
        }
    }
}

/// A loaded game project.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    root: PathBuf,
    manifest: ProjectManifest,
}

impl Project {
    /// Creates a project from an already parsed manifest.
    pub fn new(root: impl Into<PathBuf>, manifest: ProjectManifest) -> Self {
        Self {
            root: root.into(),
            manifest,
        }
    }

    /// Loads `project.json` from `root`.
    pub fn load(root: &Path) -> Result<Self, ProjectError> {
        let path = root.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(ProjectError::ManifestMissing(path));
        }
        let content = std::fs::read_to_string(&path)?;
        let manifest: ProjectManifest = serde_json::from_str(&content)?;
        tracing::debug!(project = %manifest.name, path = %path.display(), "project loaded");
        Ok(Self::new(root, manifest))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &ProjectManifest {
        &self.manifest
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// Absolute path of the directory holding the game's web build.
    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.manifest.source_dir)
    }
}
