//! Configuration management for the triage console.
//!
//! Configuration is stored in ~/.facetriage/{app_name}/config.yaml. A
//! missing file is created with defaults; every field has a default, so a
//! partial file is fine.

use std::path::{Path, PathBuf};

use facetriage_capture::{CaptureConfig, EnrollmentConfig};
use facetriage_store::DEFAULT_WRITE_ATTEMPTS;
use facetriage_template::MatcherConfig;
use facetriage_triage::DebounceConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::paths::Paths;

/// Default embedding dimension.
pub const DEFAULT_DIM: usize = 128;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config: cannot determine home directory")]
    NoHome,

    #[error("config: {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config: {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("config: {0}")]
    Invalid(String),
}

/// Persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Attempts per file write before the mutation fails.
    pub write_attempts: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            write_attempts: DEFAULT_WRITE_ATTEMPTS,
        }
    }
}

/// Triage console configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name (not serialized).
    #[serde(skip)]
    pub app_name: String,

    /// Where templates and records live. Relative paths resolve against
    /// the config file's directory. Defaults to `data/` next to it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Embedding dimension of the face encoder.
    pub dim: usize,

    pub matcher: MatcherConfig,
    pub debounce: DebounceConfig,
    pub capture: CaptureConfig,
    pub enrollment: EnrollmentConfig,
    pub persistence: PersistenceConfig,

    /// Path to the config file (not serialized).
    #[serde(skip)]
    config_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            data_dir: None,
            dim: DEFAULT_DIM,
            matcher: MatcherConfig::default(),
            debounce: DebounceConfig::default(),
            capture: CaptureConfig::default(),
            enrollment: EnrollmentConfig::default(),
            persistence: PersistenceConfig::default(),
            config_path: PathBuf::new(),
        }
    }
}

impl AppConfig {
    /// Returns the config file path.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Returns the resolved data directory.
    pub fn data_dir(&self) -> PathBuf {
        let base = self.config_path.parent().unwrap_or(Path::new("."));
        match &self.data_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => base.join(dir),
            None => base.join("data"),
        }
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dim == 0 {
            return Err(ConfigError::Invalid("dim must be positive".into()));
        }
        if self.persistence.write_attempts == 0 {
            return Err(ConfigError::Invalid(
                "persistence.write_attempts must be positive".into(),
            ));
        }
        let invalid = |e: &dyn std::fmt::Display| ConfigError::Invalid(e.to_string());
        self.matcher.validate().map_err(|e| invalid(&e))?;
        self.debounce.validate().map_err(|e| invalid(&e))?;
        self.capture.validate().map_err(|e| invalid(&e))?;
        self.enrollment.validate().map_err(|e| invalid(&e))?;
        Ok(())
    }

    /// Saves the configuration to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        write_yaml(&self.config_path, self)
    }

    /// Sets one field by dotted key, e.g. `matcher.threshold`.
    ///
    /// `value` is parsed as a YAML scalar. The result is validated; on
    /// error the config is left unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |msg: String| ConfigError::Invalid(msg);
        let mut doc = serde_yaml::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        let parsed: serde_yaml::Value =
            serde_yaml::from_str(value).map_err(|e| invalid(format!("{key}: {e}")))?;

        let mut node = &mut doc;
        let mut parts = key.split('.').peekable();
        while let Some(part) = parts.next() {
            let map = node
                .as_mapping_mut()
                .ok_or_else(|| invalid(format!("{key}: not a section")))?;
            let k = serde_yaml::Value::String(part.to_string());
            if parts.peek().is_none() {
                // data_dir is omitted while unset.
                if !map.contains_key(&k) && part != "data_dir" {
                    return Err(invalid(format!("unknown key {key}")));
                }
                map.insert(k, parsed);
                break;
            }
            node = map
                .get_mut(&k)
                .ok_or_else(|| invalid(format!("unknown key {key}")))?;
        }

        let mut next: AppConfig =
            serde_yaml::from_value(doc).map_err(|e| invalid(format!("{key}: {e}")))?;
        next.app_name = std::mem::take(&mut self.app_name);
        next.config_path = std::mem::take(&mut self.config_path);
        if let Err(e) = next.validate() {
            self.app_name = next.app_name;
            self.config_path = next.config_path;
            return Err(e);
        }
        *self = next;
        Ok(())
    }
}

/// Gets the default config file path.
pub fn default_config_path(app_name: &str) -> Result<PathBuf, ConfigError> {
    Paths::new(app_name)
        .map(|p| p.config_file())
        .map_err(|_| ConfigError::NoHome)
}

/// Loads configuration for the specified app, creating a default file when
/// none exists.
pub fn load_config(app_name: &str, custom_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let config_path = match custom_path {
        Some(p) => PathBuf::from(p),
        None => default_config_path(app_name)?,
    };

    let mut cfg = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
            path: config_path.clone(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: config_path.clone(),
            source,
        })?
    } else {
        let cfg = AppConfig::default();
        write_yaml(&config_path, &cfg)?;
        info!(path = %config_path.display(), "created default config");
        cfg
    };

    cfg.app_name = app_name.to_string();
    cfg.config_path = config_path;
    cfg.validate()?;
    Ok(cfg)
}

fn write_yaml(path: &Path, cfg: &AppConfig) -> Result<(), ConfigError> {
    let io = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io)?;
    }
    let content =
        serde_yaml::to_string(cfg).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    std::fs::write(path, content).map_err(io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use facetriage_template::Metric;

    fn load_in(dir: &Path) -> AppConfig {
        let path = dir.join("triage").join("config.yaml");
        load_config("triage", path.to_str()).unwrap()
    }

    #[test]
    fn creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_in(dir.path());
        assert!(cfg.path().exists());
        assert_eq!(cfg.dim, DEFAULT_DIM);
        assert_eq!(cfg.debounce.window, 5);
        assert_eq!(cfg.data_dir(), dir.path().join("triage").join("data"));

        let reloaded = load_in(dir.path());
        assert_eq!(reloaded.matcher, cfg.matcher);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "dim: 4\nmatcher:\n  metric: cosine\ndata_dir: /srv/clinic\n",
        )
        .unwrap();
        let cfg = load_config("triage", path.to_str()).unwrap();
        assert_eq!(cfg.dim, 4);
        assert_eq!(cfg.matcher.metric, Metric::Cosine);
        assert_eq!(cfg.matcher.threshold, facetriage_template::DEFAULT_THRESHOLD);
        assert_eq!(cfg.data_dir(), PathBuf::from("/srv/clinic"));
    }

    #[test]
    fn invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        std::fs::write(&path, "debounce:\n  window: 4\n  min_hits: 2\n").unwrap();
        let err = load_config("triage", path.to_str()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");

        std::fs::write(&path, "dim: [1, 2\n").unwrap();
        let err = load_config("triage", path.to_str()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
    }

    #[test]
    fn set_by_dotted_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = load_in(dir.path());

        cfg.set("matcher.threshold", "0.45").unwrap();
        cfg.set("debounce.cooldown_ms", "60000").unwrap();
        cfg.set("data_dir", "records").unwrap();
        cfg.save().unwrap();

        let cfg = load_in(dir.path());
        assert_eq!(cfg.matcher.threshold, 0.45);
        assert_eq!(cfg.debounce.cooldown_ms, 60_000);
        assert_eq!(cfg.data_dir(), dir.path().join("triage").join("records"));
    }

    #[test]
    fn set_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = load_in(dir.path());

        assert!(cfg.set("matcher.nope", "1").is_err());
        assert!(cfg.set("dim.x", "1").is_err());
        assert!(cfg.set("debounce.min_hits", "1").is_err());
        assert!(cfg.set("dim", "many").is_err());

        // Unchanged after failures.
        assert_eq!(cfg.debounce.min_hits, 3);
        assert_eq!(cfg.app_name, "triage");
        assert!(cfg.path().ends_with("config.yaml"));
    }
}
