use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::paths;
use crate::utils::io;

/// Root configuration structure for stackup.json
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StackupConfig {
    #[serde(default)]
    pub provision: ProvisionConfig,
}

/// Everything the deployment goal needs to know about the tools it drives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionConfig {
    /// Process-wide access token, used when a run does not supply one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: String,

    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,

    #[serde(default = "default_package_manager")]
    pub package_manager: String,

    #[serde(default = "default_tool")]
    pub tool: String,

    #[serde(default = "default_token_env")]
    pub token_env: String,

    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            token: None,
            manifest_dir: default_manifest_dir(),
            manifest_file: default_manifest_file(),
            package_manager: default_package_manager(),
            tool: default_tool(),
            token_env: default_token_env(),
            tail_lines: default_tail_lines(),
        }
    }
}

impl ProvisionConfig {
    /// Tree-relative path of the manifest, e.g. `.pulumi/Pulumi.yaml`.
    pub fn manifest_path(&self) -> String {
        if self.manifest_dir.is_empty() {
            self.manifest_file.clone()
        } else {
            format!(
                "{}/{}",
                self.manifest_dir.trim_end_matches('/'),
                self.manifest_file
            )
        }
    }

    /// The configured token, with empty strings treated as absent.
    pub fn configured_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.trim().is_empty())
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_manifest_dir() -> String {
    ".pulumi".to_string()
}

fn default_manifest_file() -> String {
    "Pulumi.yaml".to_string()
}

fn default_package_manager() -> String {
    "npm".to_string()
}

fn default_tool() -> String {
    "pulumi".to_string()
}

fn default_token_env() -> String {
    "PULUMI_ACCESS_TOKEN".to_string()
}

fn default_tail_lines() -> usize {
    40
}

// =============================================================================
// Loading functions
// =============================================================================

/// Load the full stackup.json config, falling back to defaults on any error.
pub fn load_config() -> StackupConfig {
    let path = match paths::stackup_json() {
        Ok(path) => path,
        Err(_) => return StackupConfig::default(),
    };

    if !path.exists() {
        return StackupConfig::default();
    }

    load_config_from(&path).unwrap_or_else(|err| {
        tracing::warn!(path = %path.display(), error = %err.message, "ignoring invalid config");
        StackupConfig::default()
    })
}

/// Load config from an explicit file, failing on unreadable or invalid JSON.
pub fn load_config_from(path: &Path) -> Result<StackupConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
}

/// Save config to stackup.json (creates if missing).
pub fn save_config(config: &StackupConfig) -> Result<()> {
    let path = paths::stackup_json()?;

    if let Some(parent) = path.parent() {
        io::ensure_dir(parent, &format!("create {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(config).map_err(|e| {
        Error::internal_json(e.to_string(), Some("serialize stackup.json".to_string()))
    })?;

    io::write_file_atomic(&path, &content, &format!("write {}", path.display()))
}

/// Check if stackup.json exists
pub fn config_exists() -> bool {
    paths::stackup_json()
        .map(|p| p.exists())
        .unwrap_or(false)
}

/// Delete stackup.json (reset to defaults)
pub fn reset_config() -> Result<bool> {
    let path = paths::stackup_json()?;

    if path.exists() {
        fs::remove_file(&path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("delete {}", path.display())))
        })?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Get the path to stackup.json (for display purposes)
pub fn config_path() -> Result<String> {
    Ok(paths::stackup_json()?.display().to_string())
}
