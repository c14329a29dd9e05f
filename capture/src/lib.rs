//! Camera capture for the triage console.
//!
//! The camera and the face model sit behind two traits:
//!
//! - [`DeviceOpener`] / [`CaptureDevice`]: acquire a device and read frames
//!   with a bounded timeout. [`DeviceGuard`] releases the device on drop.
//! - [`FaceEncoder`]: turn a frame into zero or more face embeddings.
//!
//! [`Pipeline`] runs a live session (see [`pipeline`] for the thread
//! layout) and emits [`MatchEvent`]s through a drop-oldest [`DropQueue`].
//! [`capture_enrollment`] collects single-face embeddings for registration.
//! [`ReplayOpener`] and [`RawEmbeddingEncoder`] replay pre-extracted
//! embeddings from a scene file.

mod config;
mod device;
mod encoder;
mod enroll;
mod error;
mod event;
pub mod pipeline;
mod queue;
mod replay;


pub use config::{CaptureConfig, EnrollmentConfig};
pub use device::{open_device, CaptureDevice, DeviceGuard, DeviceOpener, Frame};
pub use encoder::{FaceEncoder, RawEmbeddingEncoder};
pub use enroll::capture_enrollment;
pub use error::CaptureError;
pub use event::MatchEvent;
pub use pipeline::{
    Pipeline, PipelineHandle, PipelineState, PipelineStats, SessionReport, StopReason,
};
pub use queue::{DropQueue, Pop, QueueClosed};
pub use replay::{ReplayOpener, Scene, SceneFrame};
