use std::path::PathBuf;

use facetriage_template::TemplateError;
use thiserror::Error;

/// Errors returned by capture devices, encoders and the pipeline.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture: device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The device has no more frames (replayed footage ran out).
    #[error("capture: end of stream")]
    EndOfStream,

    #[error("capture: encoder: {0}")]
    Encoder(String),

    #[error("capture: enrollment incomplete: {captured}/{wanted} usable images after {attempts} attempts")]
    EnrollmentIncomplete {
        captured: usize,
        wanted: usize,
        attempts: u32,
    },

    #[error("capture: canceled")]
    Canceled,

    #[error("capture: invalid config: {0}")]
    InvalidConfig(String),

    #[error("capture: scene {path}: {reason}")]
    Scene { path: PathBuf, reason: String },

    #[error("capture: io: {0}")]
    Io(#[from] std::io::Error),

    #[error("capture: {0}")]
    Template(#[from] TemplateError),
}
