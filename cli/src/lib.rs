//! CLI utilities for the facetriage console.
//!
//! Configuration lives in ~/.facetriage/{app_name}/config.yaml and is
//! created with defaults on first use. [`Stores`] opens the template and
//! record stores a command works on.

pub mod config;
pub mod output;
pub mod paths;
pub mod render;
pub mod stores;

pub use config::{load_config, AppConfig, ConfigError, PersistenceConfig};
pub use output::{print_verbose, Output, OutputFormat};
pub use paths::Paths;
pub use stores::Stores;
