//! Opens the stores a command works on.

use std::sync::Arc;

use anyhow::Context as _;
use facetriage_records::RecordStore;
use facetriage_store::{BlobStore, FileStore};
use facetriage_template::{Matcher, TemplateStore};
use tracing::debug;

use crate::config::AppConfig;

/// Template store, record store and matcher over one data directory.
///
/// Both stores share the directory; each owns its own files.
#[derive(Debug, Clone)]
pub struct Stores {
    pub templates: Arc<TemplateStore>,
    pub records: Arc<RecordStore>,
    pub matcher: Arc<Matcher>,
}

impl Stores {
    /// Opens the data directory named by `cfg`.
    ///
    /// Corrupt files fail the open; missing files start empty.
    pub fn open(cfg: &AppConfig) -> anyhow::Result<Self> {
        let dir = cfg.data_dir();
        let blob = FileStore::open(&dir)
            .with_context(|| format!("open data directory {}", dir.display()))?
            .with_write_attempts(cfg.persistence.write_attempts);
        debug!(dir = %dir.display(), "opening stores");
        Self::with_blob(cfg, Arc::new(blob))
    }

    /// Opens the stores over any blob store.
    pub fn with_blob(cfg: &AppConfig, blob: Arc<dyn BlobStore>) -> anyhow::Result<Self> {
        let templates = Arc::new(
            TemplateStore::open(cfg.dim, blob.clone()).context("load face templates")?,
        );
        let records = Arc::new(RecordStore::open(blob).context("load records")?);
        let matcher = Arc::new(Matcher::new(templates.clone(), cfg.matcher)?);
        Ok(Self {
            templates,
            records,
            matcher,
        })
    }

    /// Identities with a template but no patient record, and patients
    /// without a template.
    pub fn orphans(&self) -> (Vec<String>, Vec<String>) {
        let records = self.records.snapshot();
        let templates = self.templates.snapshot();
        let no_record = templates
            .templates()
            .filter(|t| records.patient(t.identity.as_str()).is_none())
            .map(|t| t.identity.to_string())
            .collect();
        let no_template = records
            .patients()
            .filter(|p| !templates.contains(p.identity.as_str()))
            .map(|p| p.identity.to_string())
            .collect();
        (no_record, no_template)
    }
}
