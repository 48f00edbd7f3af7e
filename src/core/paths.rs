use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Overrides the config directory (used by tests and CI hosts).
pub const CONFIG_DIR_ENV: &str = "STACKUP_CONFIG_DIR";

/// Base stackup config directory (~/.config/stackup/ on Unix-like systems)
pub fn stackup() -> Result<PathBuf> {
    if let Some(dir) = env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("stackup"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("stackup"))
    }
}

/// Global stackup.json config file path
pub fn stackup_json() -> Result<PathBuf> {
    Ok(stackup()?.join("stackup.json"))
}
