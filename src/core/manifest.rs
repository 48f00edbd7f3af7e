//! Manifest precondition: the tree must declare a provisioning application
//! before any process is spawned.

use serde::Deserialize;

use crate::defaults::ProvisionConfig;
use crate::error::{Error, Result};
use crate::logs::ProgressLog;
use crate::tree::WorkingTree;

/// The fields of the manifest this crate reads. Everything else is the
/// provisioning tool's business.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub runtime: ManifestRuntime,
}

/// `runtime` is either a bare name or `{ name, options }`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ManifestRuntime {
    Name(String),
    Detailed { name: String },
}

impl ManifestRuntime {
    pub fn name(&self) -> &str {
        match self {
            ManifestRuntime::Name(name) | ManifestRuntime::Detailed { name } => name,
        }
    }
}

impl Manifest {
    pub fn parse(content: &str) -> Result<Self> {
        serde_yml::from_str(content).map_err(|e| {
            Error::config_invalid_value("manifest", None, format!("Invalid manifest YAML: {}", e))
        })
    }
}

/// Checks one well-known manifest path inside the tree.
#[derive(Debug, Clone)]
pub struct ManifestGate {
    dir: String,
    path: String,
}

impl ManifestGate {
    pub fn new(config: &ProvisionConfig) -> Self {
        Self {
            dir: config.manifest_dir.clone(),
            path: config.manifest_path(),
        }
    }

    /// Fails with `manifest.missing` when the manifest file is absent.
    ///
    /// A present but unreadable manifest only produces a warning; the
    /// provisioning tool reports the real problem.
    pub fn check(&self, tree: &dyn WorkingTree, log: &mut dyn ProgressLog) -> Result<Option<Manifest>> {
        if !tree.has_file(&self.path) {
            log.write("No application found in project");
            return Err(Error::manifest_missing(
                &self.path,
                tree.base_dir().display().to_string(),
            ));
        }

        log.write(&format!("Project has application in '{}' directory", self.dir));

        let manifest = tree
            .read_file(&self.path)
            .and_then(|content| Manifest::parse(&content));

        match manifest {
            Ok(manifest) => {
                tracing::info!(
                    application = %manifest.name,
                    runtime = %manifest.runtime.name(),
                    "manifest found"
                );
                Ok(Some(manifest))
            }
            Err(e) => {
                tracing::warn!(path = %self.path, error = %e, "could not read manifest");
                Ok(None)
            }
        }
    }
}
