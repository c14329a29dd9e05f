use facetriage_store::{Identity, IdentityError, StoreError};
use thiserror::Error;

/// Errors returned by template operations.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("template: embedding {index} has a non-finite component")]
    InvalidEmbedding { index: usize },

    #[error("template: enrollment needs at least one embedding")]
    EmptyEnrollment,

    #[error("template: {0} is already enrolled")]
    DuplicateIdentity(Identity),

    #[error("template: {0} not found")]
    NotFound(Identity),

    #[error("template: invalid threshold {0}")]
    InvalidThreshold(f32),

    #[error("template: corrupt persisted data in {name}: {reason}")]
    CorruptPersistedData { name: String, reason: String },

    #[error("template: {0}")]
    InvalidIdentity(#[from] IdentityError),

    #[error("template: {0}")]
    Store(#[from] StoreError),
}
