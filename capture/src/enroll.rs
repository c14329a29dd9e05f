use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::device::{open_device, DeviceOpener};
use crate::{CaptureConfig, CaptureError, EnrollmentConfig, FaceEncoder};

/// Captures enrollment embeddings from a camera.
///
/// Collects `config.images` frames that show exactly one face. Frames with
/// no face or several faces are skipped; after `config.max_attempts`
/// frames the capture fails with [`CaptureError::EnrollmentIncomplete`].
/// The device is released on every path.
pub fn capture_enrollment(
    opener: &dyn DeviceOpener,
    encoder: &dyn FaceEncoder,
    config: &EnrollmentConfig,
    capture: &CaptureConfig,
    cancel: &CancellationToken,
) -> Result<Vec<Vec<f32>>, CaptureError> {
    config.validate()?;
    let read_timeout = capture.read_timeout();
    let mut device = open_device(
        opener,
        capture.max_open_attempts,
        capture.reacquire_backoff(),
        cancel,
    )?;

    let mut embeddings = Vec::with_capacity(config.images);
    let mut attempts = 0u32;
    while embeddings.len() < config.images {
        if cancel.is_cancelled() {
            return Err(CaptureError::Canceled);
        }
        if attempts >= config.max_attempts {
            warn!(
                captured = embeddings.len(),
                wanted = config.images,
                attempts,
                "enrollment capture gave up"
            );
            return Err(CaptureError::EnrollmentIncomplete {
                captured: embeddings.len(),
                wanted: config.images,
                attempts,
            });
        }
        attempts += 1;

        let frame = match device.read_frame(read_timeout) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(CaptureError::EndOfStream) => {
                return Err(CaptureError::EnrollmentIncomplete {
                    captured: embeddings.len(),
                    wanted: config.images,
                    attempts,
                });
            }
            Err(e) => return Err(e),
        };
        let mut faces = match encoder.encode(&frame) {
            Ok(faces) => faces,
            Err(e) => {
                warn!(frame = frame.seq, error = %e, "enrollment frame skipped");
                continue;
            }
        };
        match faces.len() {
            1 => {
                embeddings.extend(faces.pop());
                info!(
                    captured = embeddings.len(),
                    wanted = config.images,
                    "enrollment image captured"
                );
            }
            0 => debug!(frame = frame.seq, "no face in enrollment frame"),
            n => debug!(frame = frame.seq, faces = n, "several faces in enrollment frame"),
        }
    }
    Ok(embeddings)
}
