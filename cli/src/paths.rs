//! Directory layout of facetriage applications.

use std::io;
use std::path::{Path, PathBuf};

/// Base directory name under the user's home.
pub const DEFAULT_BASE_DIR: &str = ".facetriage";

/// Configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Provides access to the ~/.facetriage directory structure.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Application name.
    pub app_name: String,
    /// User's home directory.
    pub home_dir: PathBuf,
}

impl Paths {
    /// Creates a new Paths instance for the given app.
    pub fn new(app_name: impl Into<String>) -> io::Result<Self> {
        let home_dir = dirs::home_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "could not find home directory")
        })?;
        Ok(Self::with_home(home_dir, app_name))
    }

    /// Creates a Paths instance rooted at an explicit home directory.
    pub fn with_home(home_dir: impl Into<PathBuf>, app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            home_dir: home_dir.into(),
        }
    }

    /// Returns the base directory (~/.facetriage).
    pub fn base_dir(&self) -> PathBuf {
        self.home_dir.join(DEFAULT_BASE_DIR)
    }

    /// Returns the app-specific directory (~/.facetriage/<app>).
    pub fn app_dir(&self) -> PathBuf {
        self.base_dir().join(&self.app_name)
    }

    /// Returns the config file path (~/.facetriage/<app>/config.yaml).
    pub fn config_file(&self) -> PathBuf {
        self.app_dir().join(DEFAULT_CONFIG_FILE)
    }

    /// Returns the data directory (~/.facetriage/<app>/data).
    ///
    /// Templates and records are persisted here unless the config names
    /// another directory.
    pub fn data_dir(&self) -> PathBuf {
        self.app_dir().join("data")
    }

    /// Creates `dir` if it doesn't exist.
    pub fn ensure_dir(dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_new() {
        let paths = Paths::new("testapp").unwrap();
        assert_eq!(paths.app_name, "testapp");
        assert!(!paths.home_dir.as_os_str().is_empty());
    }

    #[test]
    fn test_paths_structure() {
        let paths = Paths::with_home("/home/nurse", "triage");

        assert_eq!(paths.base_dir(), PathBuf::from("/home/nurse/.facetriage"));
        assert!(paths.app_dir().ends_with(".facetriage/triage"));
        assert!(paths.config_file().ends_with("triage/config.yaml"));
        assert!(paths.data_dir().ends_with("triage/data"));
    }
}
