use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::CaptureError;

/// Capture pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Expected time between frames. Bounds how long a stop request waits.
    pub frame_interval_ms: u64,

    /// Longest single device read.
    pub read_timeout_ms: u64,

    /// Frames waiting for the matcher; older frames are dropped.
    pub frame_buffer: usize,

    /// Match events waiting for the triage session; older events are
    /// dropped.
    pub event_buffer: usize,

    pub max_open_attempts: u32,

    /// Reacquisition attempts after the device is lost mid-session.
    pub max_reacquire: u32,

    pub reacquire_backoff_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 100,
            read_timeout_ms: 100,
            frame_buffer: 1,
            event_buffer: 64,
            max_open_attempts: 3,
            max_reacquire: 3,
            reacquire_backoff_ms: 500,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.frame_interval_ms == 0 {
            return Err(CaptureError::InvalidConfig(
                "frame_interval_ms must be positive".into(),
            ));
        }
        if self.read_timeout_ms == 0 || self.read_timeout_ms > self.frame_interval_ms {
            return Err(CaptureError::InvalidConfig(format!(
                "read_timeout_ms must be in 1..={}",
                self.frame_interval_ms
            )));
        }
        if self.frame_buffer == 0 || self.event_buffer == 0 {
            return Err(CaptureError::InvalidConfig(
                "frame_buffer and event_buffer must be positive".into(),
            ));
        }
        if self.max_open_attempts == 0 {
            return Err(CaptureError::InvalidConfig(
                "max_open_attempts must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reacquire_backoff(&self) -> Duration {
        Duration::from_millis(self.reacquire_backoff_ms)
    }
}

/// Enrollment capture settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentConfig {
    /// Single-face images to collect.
    pub images: usize,

    /// Frames to try before giving up.
    pub max_attempts: u32,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            images: 5,
            max_attempts: 50,
        }
    }
}

impl EnrollmentConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.images == 0 {
            return Err(CaptureError::InvalidConfig("images must be positive".into()));
        }
        if (self.max_attempts as usize) < self.images {
            return Err(CaptureError::InvalidConfig(format!(
                "max_attempts {} is below images {}",
                self.max_attempts, self.images
            )));
        }
        Ok(())
    }
}
