use facetriage_store::Identity;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TriageError {
    #[error("triage: invalid config: {0}")]
    InvalidConfig(String),

    /// A face matched a template whose patient record is gone.
    #[error("triage: no patient record for enrolled identity {0}")]
    RecordMissingForTemplate(Identity),

    #[error("triage: alert sink closed")]
    SinkClosed,
}
