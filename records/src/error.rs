use chrono::NaiveDateTime;
use facetriage_store::{Identity, IdentityError, StoreError};
use thiserror::Error;

use crate::AppointmentStatus;

/// Errors returned by record operations.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("records: {kind} {identity} already exists")]
    DuplicateIdentity {
        kind: &'static str,
        identity: Identity,
    },

    #[error("records: {kind} {key} not found")]
    NotFound { kind: &'static str, key: String },

    #[error("records: invalid {field}: {reason}")]
    InvalidRecord {
        field: &'static str,
        reason: String,
    },

    #[error("records: appointment time {0} is in the past")]
    AppointmentInPast(NaiveDateTime),

    #[error("records: appointment {id} is {status}, cannot {action}")]
    InvalidTransition {
        id: u64,
        status: AppointmentStatus,
        action: &'static str,
    },

    #[error("records: corrupt persisted data in {name}: {reason}")]
    CorruptPersistedData { name: String, reason: String },

    #[error("records: {0}")]
    InvalidIdentity(#[from] IdentityError),

    #[error("records: {0}")]
    Store(#[from] StoreError),
}

impl RecordError {
    pub(crate) fn not_found(kind: &'static str, key: impl ToString) -> Self {
        RecordError::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        RecordError::InvalidRecord {
            field,
            reason: reason.into(),
        }
    }

    /// True for the not-found family, whatever the record kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RecordError::NotFound { .. })
    }
}
