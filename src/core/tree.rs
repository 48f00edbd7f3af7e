use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::utils::io;

/// A checked-out source tree the goal reads and mutates.
///
/// Paths are always relative to the tree root and use `/` separators.
pub trait WorkingTree: Send + Sync {
    /// Project name as the tree reports it (usually the checkout directory).
    fn name(&self) -> &str;
    fn base_dir(&self) -> &Path;
    fn has_file(&self, path: &str) -> bool;
    fn read_file(&self, path: &str) -> Result<String>;
    fn add_file(&mut self, path: &str, content: &str) -> Result<()>;
}

/// Working tree backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalTree {
    name: String,
    base_dir: PathBuf,
}

impl LocalTree {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        if !base_dir.is_dir() {
            return Err(Error::validation_invalid_argument(
                "path",
                format!("Not a directory: {}", base_dir.display()),
                None,
                None,
            ));
        }

        let name = base_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Self { name, base_dir })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });

        if path.is_empty() || escapes {
            return Err(Error::validation_invalid_argument(
                "path",
                format!("'{}' is not a path inside the working tree", path),
                None,
                None,
            ));
        }

        Ok(self.base_dir.join(relative))
    }
}

impl WorkingTree for LocalTree {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn has_file(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }

    fn read_file(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        io::read_file(&full, &format!("read {}", path))
    }

    fn add_file(&mut self, path: &str, content: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            io::ensure_dir(parent, &format!("create directory for {}", path))?;
        }
        io::write_file_atomic(&full, content, &format!("write {}", path))
    }
}
