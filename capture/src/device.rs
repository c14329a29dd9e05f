use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::CaptureError;

/// One acquired image.
#[derive(Clone, PartialEq)]
pub struct Frame {
    /// Device-assigned sequence number.
    pub seq: u64,
    pub width: u32,
    pub height: u32,
    /// Pixel or encoder-specific payload.
    pub data: Vec<u8>,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("seq", &self.seq)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// An acquired camera.
///
/// Only ever used from one thread at a time.
pub trait CaptureDevice: Send {
    /// Waits up to `timeout` for the next frame. `Ok(None)` means no frame
    /// arrived in time.
    ///
    /// Returns [`CaptureError::EndOfStream`] when the source is exhausted
    /// and [`CaptureError::DeviceUnavailable`] when the device was lost.
    fn read_frame(&mut self, timeout: Duration) -> Result<Option<Frame>, CaptureError>;

    /// Gives the device back. Called exactly once per opened device.
    fn release(&mut self);
}

/// Acquires capture devices.
pub trait DeviceOpener: Send + Sync {
    fn open(&self) -> Result<Box<dyn CaptureDevice>, CaptureError>;

    /// Human-readable device name for logs.
    fn describe(&self) -> String {
        "camera".to_string()
    }
}

/// Owns an open device and releases it when dropped.
pub struct DeviceGuard {
    device: Option<Box<dyn CaptureDevice>>,
    name: String,
}

impl DeviceGuard {
    pub fn new(device: Box<dyn CaptureDevice>, name: impl Into<String>) -> Self {
        Self {
            device: Some(device),
            name: name.into(),
        }
    }

    pub fn read_frame(&mut self, timeout: Duration) -> Result<Option<Frame>, CaptureError> {
        match self.device.as_mut() {
            Some(d) => d.read_frame(timeout),
            None => Err(CaptureError::DeviceUnavailable(format!(
                "{} already released",
                self.name
            ))),
        }
    }

    /// Releases the device now. Later calls do nothing.
    pub fn release(&mut self) {
        if let Some(mut d) = self.device.take() {
            d.release();
            info!(device = %self.name, "capture device released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.device.is_none()
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for DeviceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceGuard")
            .field("name", &self.name)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Opens a device, retrying up to `attempts` times `backoff` apart.
pub fn open_device(
    opener: &dyn DeviceOpener,
    attempts: u32,
    backoff: Duration,
    cancel: &CancellationToken,
) -> Result<DeviceGuard, CaptureError> {
    let name = opener.describe();
    let attempts = attempts.max(1);
    let mut last = None;
    for attempt in 1..=attempts {
        if cancel.is_cancelled() {
            return Err(CaptureError::Canceled);
        }
        match opener.open() {
            Ok(device) => {
                info!(device = %name, attempt, "capture device acquired");
                return Ok(DeviceGuard::new(device, name));
            }
            Err(e) => {
                warn!(device = %name, attempt, attempts, error = %e, "failed to open capture device");
                last = Some(e);
            }
        }
        if attempt < attempts && sleep_cancellable(cancel, backoff) {
            return Err(CaptureError::Canceled);
        }
    }
    let reason = last.map_or_else(|| "no attempts".to_string(), |e| e.to_string());
    Err(CaptureError::DeviceUnavailable(format!(
        "{name}: {reason} (after {attempts} attempts)"
    )))
}

/// Sleeps for `dur` in short slices. Returns true if canceled meanwhile.
pub(crate) fn sleep_cancellable(cancel: &CancellationToken, dur: Duration) -> bool {
    const SLICE: Duration = Duration::from_millis(10);
    let mut left = dur;
    while !left.is_zero() {
        if cancel.is_cancelled() {
            debug!("sleep interrupted by cancellation");
            return true;
        }
        let step = left.min(SLICE);
        std::thread::sleep(step);
        left -= step;
    }
    cancel.is_cancelled()
}


#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;

    #[test]
    fn guard_releases_on_drop() {
        let opener = MockOpener::new(vec![]);
        {
            let _g = open_device(&opener, 1, Duration::ZERO, &CancellationToken::new()).unwrap();
            assert_eq!(opener.opened(), 1);
            assert_eq!(opener.released(), 0);
        }
        assert_eq!(opener.released(), 1);
    }

    #[test]
    fn explicit_release_is_idempotent() {
        let opener = MockOpener::new(vec![]);
        let mut g = open_device(&opener, 1, Duration::ZERO, &CancellationToken::new()).unwrap();
        g.release();
        g.release();
        drop(g);
        assert_eq!(opener.released(), 1);
    }

    #[test]
    fn released_guard_reports_unavailable() {
        let opener = MockOpener::new(vec![]);
        let mut g = open_device(&opener, 1, Duration::ZERO, &CancellationToken::new()).unwrap();
        g.release();
        assert!(matches!(
            g.read_frame(Duration::ZERO),
            Err(CaptureError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn open_retries_then_succeeds() {
        let opener = MockOpener::new(vec![]).failing_first(2);
        let g = open_device(&opener, 3, Duration::from_millis(1), &CancellationToken::new());
        assert!(g.is_ok());
        assert_eq!(opener.opened(), 1);
    }

    #[test]
    fn open_gives_up_after_attempts() {
        let opener = MockOpener::new(vec![]).failing_first(5);
        let err = open_device(&opener, 3, Duration::from_millis(1), &CancellationToken::new())
            .unwrap_err();
        match err {
            CaptureError::DeviceUnavailable(msg) => assert!(msg.contains("3 attempts"), "{msg}"),
            other => panic!("unexpected {other}"),
        }
        assert_eq!(opener.opened(), 0);
    }

    #[test]
    fn canceled_open_stops_retrying() {
        let opener = MockOpener::new(vec![]).failing_first(100);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            open_device(&opener, 100, Duration::from_secs(1), &cancel),
            Err(CaptureError::Canceled)
        ));
    }
}
