//! Live capture session.
//!
//! Two threads per session:
//!
//! - the acquisition thread owns the device and pushes frames into a
//!   drop-oldest slot, so a slow matcher never stalls the camera;
//! - the worker takes the newest frame and walks it through
//!   `Detecting -> Matching -> Emitting`, pushing one [`MatchEvent`] per
//!   face into a drop-oldest event queue.
//!
//! Stopping cancels both threads and joins them, so the device is
//! released before [`PipelineHandle::stop`] returns.

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use facetriage_template::Matcher;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::device::{open_device, sleep_cancellable, DeviceGuard, DeviceOpener};
use crate::queue::{DropQueue, Pop};
use crate::{CaptureConfig, CaptureError, FaceEncoder, Frame, MatchEvent};

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Capturing = 1,
    Detecting = 2,
    Matching = 3,
    Emitting = 4,
    Stopped = 5,
}

impl PipelineState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => PipelineState::Idle,
            1 => PipelineState::Capturing,
            2 => PipelineState::Detecting,
            3 => PipelineState::Matching,
            4 => PipelineState::Emitting,
            _ => PipelineState::Stopped,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Idle => "idle",
            PipelineState::Capturing => "capturing",
            PipelineState::Detecting => "detecting",
            PipelineState::Matching => "matching",
            PipelineState::Emitting => "emitting",
            PipelineState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Counters of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub frames_captured: u64,
    /// Frames evicted before the worker got to them.
    pub frames_dropped: u64,
    pub frames_without_faces: u64,
    pub faces: u64,
    pub events_emitted: u64,
    /// Events evicted before the consumer got to them.
    pub events_dropped: u64,
    /// Frames or faces skipped because encoding or matching failed.
    pub encoder_errors: u64,
    pub reacquisitions: u64,
}

#[derive(Default)]
struct Counters {
    frames_captured: AtomicU64,
    frames_dropped: AtomicU64,
    frames_without_faces: AtomicU64,
    faces: AtomicU64,
    events_emitted: AtomicU64,
    events_dropped: AtomicU64,
    encoder_errors: AtomicU64,
    reacquisitions: AtomicU64,
}

impl Counters {
    fn bump(c: &AtomicU64) {
        c.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PipelineStats {
        let g = |c: &AtomicU64| c.load(Ordering::Relaxed);
        PipelineStats {
            frames_captured: g(&self.frames_captured),
            frames_dropped: g(&self.frames_dropped),
            frames_without_faces: g(&self.frames_without_faces),
            faces: g(&self.faces),
            events_emitted: g(&self.events_emitted),
            events_dropped: g(&self.events_dropped),
            encoder_errors: g(&self.encoder_errors),
            reacquisitions: g(&self.reacquisitions),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum StopReason {
    /// `stop()` was called.
    Requested,
    /// The device ran out of frames.
    EndOfStream,
    /// The device was lost and could not be reacquired.
    DeviceLost(String),
}

/// Summary returned by [`PipelineHandle::stop`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub reason: StopReason,
    pub stats: PipelineStats,
    pub duration_ms: u64,
}

struct Shared {
    state: AtomicU8,
    counters: Counters,
    cancel: CancellationToken,
}

impl Shared {
    fn set_state(&self, s: PipelineState) {
        let prev = self.state.swap(s as u8, Ordering::AcqRel);
        if prev != s as u8 {
            trace!(from = %PipelineState::from_u8(prev), to = %s, "pipeline state");
        }
    }

    fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }
}

/// Starts capture sessions.
pub struct Pipeline {
    opener: Arc<dyn DeviceOpener>,
    encoder: Arc<dyn FaceEncoder>,
    matcher: Arc<Matcher>,
    config: CaptureConfig,
}

impl Pipeline {
    pub fn new(
        opener: Arc<dyn DeviceOpener>,
        encoder: Arc<dyn FaceEncoder>,
        matcher: Arc<Matcher>,
        config: CaptureConfig,
    ) -> Result<Self, CaptureError> {
        config.validate()?;
        let dim = matcher.store().dim();
        if encoder.dimension() != dim {
            return Err(CaptureError::InvalidConfig(format!(
                "encoder dimension {} does not match template dimension {dim}",
                encoder.dimension()
            )));
        }
        Ok(Self {
            opener,
            encoder,
            matcher,
            config,
        })
    }

    /// Acquires the device and starts capturing.
    ///
    /// Fails with [`CaptureError::DeviceUnavailable`] after
    /// `max_open_attempts` failed opens; no thread is left running.
    pub fn start(&self) -> Result<PipelineHandle, CaptureError> {
        let cancel = CancellationToken::new();
        let guard = open_device(
            self.opener.as_ref(),
            self.config.max_open_attempts,
            self.config.reacquire_backoff(),
            &cancel,
        )?;

        let shared = Arc::new(Shared {
            state: AtomicU8::new(PipelineState::Idle as u8),
            counters: Counters::default(),
            cancel,
        });
        let frames = DropQueue::new(self.config.frame_buffer);
        let events = DropQueue::new(self.config.event_buffer);
        shared.set_state(PipelineState::Capturing);

        let acquisition = {
            let acq = Acquisition {
                shared: shared.clone(),
                opener: self.opener.clone(),
                frames: frames.clone(),
                config: self.config.clone(),
            };
            thread::Builder::new()
                .name("capture-acquire".into())
                .spawn(move || acq.run(guard))?
        };

        let worker = {
            let w = Worker {
                shared: shared.clone(),
                encoder: self.encoder.clone(),
                matcher: self.matcher.clone(),
                frames: frames.clone(),
                events: events.clone(),
                interval: self.config.frame_interval(),
            };
            match thread::Builder::new()
                .name("capture-match".into())
                .spawn(move || w.run())
            {
                Ok(h) => h,
                Err(e) => {
                    shared.cancel.cancel();
                    frames.close();
                    let _ = acquisition.join();
                    shared.set_state(PipelineState::Stopped);
                    return Err(e.into());
                }
            }
        };

        info!(device = %self.opener.describe(), "triage capture started");
        Ok(PipelineHandle {
            shared,
            events,
            frames,
            acquisition: Some(acquisition),
            worker: Some(worker),
            started: Instant::now(),
            report: None,
        })
    }
}

/// A running capture session.
///
/// Dropping the handle stops the session like [`stop`](Self::stop).
pub struct PipelineHandle {
    shared: Arc<Shared>,
    events: DropQueue<MatchEvent>,
    frames: DropQueue<Frame>,
    acquisition: Option<JoinHandle<StopReason>>,
    worker: Option<JoinHandle<()>>,
    started: Instant,
    report: Option<SessionReport>,
}

impl PipelineHandle {
    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    pub fn stats(&self) -> PipelineStats {
        self.shared.counters.snapshot()
    }

    /// Consumer side of the event queue. Closed when the session ends.
    pub fn events(&self) -> DropQueue<MatchEvent> {
        self.events.clone()
    }

    /// Token that stops the session when canceled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// True once both threads have exited on their own or after a stop.
    pub fn is_finished(&self) -> bool {
        fn done<T>(h: &Option<JoinHandle<T>>) -> bool {
            h.as_ref().is_none_or(|h| h.is_finished())
        }
        done(&self.acquisition) && done(&self.worker)
    }

    /// Stops capturing and releases the device before returning.
    pub fn stop(mut self) -> SessionReport {
        self.shutdown()
    }

    fn shutdown(&mut self) -> SessionReport {
        if let Some(r) = &self.report {
            return r.clone();
        }
        self.shared.cancel.cancel();
        self.frames.close();

        let reason = match self.acquisition.take().map(JoinHandle::join) {
            Some(Ok(reason)) => reason,
            Some(Err(_)) => {
                error!("acquisition thread panicked");
                StopReason::DeviceLost("acquisition thread panicked".into())
            }
            None => StopReason::Requested,
        };
        if let Some(Err(_)) = self.worker.take().map(JoinHandle::join) {
            error!("match worker panicked");
        }
        self.events.close();
        self.shared.set_state(PipelineState::Stopped);

        let report = SessionReport {
            reason,
            stats: self.stats(),
            duration_ms: self.started.elapsed().as_millis() as u64,
        };
        info!(
            reason = ?report.reason,
            frames = report.stats.frames_captured,
            dropped = report.stats.frames_dropped,
            events = report.stats.events_emitted,
            "triage capture stopped"
        );
        self.report = Some(report.clone());
        report
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("device", &self.opener.describe())
            .field("dim", &self.encoder.dimension())
            .field("config", &self.config)
            .finish()
    }
}

impl fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}

struct Acquisition {
    shared: Arc<Shared>,
    opener: Arc<dyn DeviceOpener>,
    frames: DropQueue<Frame>,
    config: CaptureConfig,
}

impl Acquisition {
    fn run(self, mut guard: DeviceGuard) -> StopReason {
        let timeout = self.config.read_timeout();
        let counters = &self.shared.counters;
        let reason = loop {
            if self.shared.cancel.is_cancelled() {
                break StopReason::Requested;
            }
            match guard.read_frame(timeout) {
                Ok(Some(frame)) => {
                    Counters::bump(&counters.frames_captured);
                    match self.frames.push(frame) {
                        Ok(Some(old)) => {
                            Counters::bump(&counters.frames_dropped);
                            debug!(frame = old.seq, "matcher behind, frame dropped");
                        }
                        Ok(None) => {}
                        Err(_) => break StopReason::Requested,
                    }
                }
                Ok(None) => {}
                Err(CaptureError::EndOfStream) => {
                    info!("capture device reached end of stream");
                    break StopReason::EndOfStream;
                }
                Err(e) => {
                    warn!(error = %e, "capture device failed, reacquiring");
                    guard.release();
                    match self.reacquire() {
                        Ok(g) => guard = g,
                        Err(CaptureError::Canceled) => break StopReason::Requested,
                        Err(e) => {
                            error!(error = %e, "capture device lost");
                            break StopReason::DeviceLost(e.to_string());
                        }
                    }
                }
            }
        };
        guard.release();
        self.frames.close();
        reason
    }

    fn reacquire(&self) -> Result<DeviceGuard, CaptureError> {
        if self.config.max_reacquire == 0 {
            return Err(CaptureError::DeviceUnavailable(
                "reacquisition disabled".into(),
            ));
        }
        if sleep_cancellable(&self.shared.cancel, self.config.reacquire_backoff()) {
            return Err(CaptureError::Canceled);
        }
        let g = open_device(
            self.opener.as_ref(),
            self.config.max_reacquire,
            self.config.reacquire_backoff(),
            &self.shared.cancel,
        )?;
        Counters::bump(&self.shared.counters.reacquisitions);
        Ok(g)
    }
}

struct Worker {
    shared: Arc<Shared>,
    encoder: Arc<dyn FaceEncoder>,
    matcher: Arc<Matcher>,
    frames: DropQueue<Frame>,
    events: DropQueue<MatchEvent>,
    interval: Duration,
}

impl Worker {
    fn run(self) {
        let counters = &self.shared.counters;
        'frames: loop {
            self.shared.set_state(PipelineState::Capturing);
            if self.shared.cancel.is_cancelled() {
                break;
            }
            let frame = match self.frames.pop_timeout(self.interval) {
                Pop::Item(f) => f,
                Pop::Empty => continue,
                Pop::Closed => break,
            };

            self.shared.set_state(PipelineState::Detecting);
            let faces = match self.encoder.encode(&frame) {
                Ok(faces) => faces,
                Err(e) => {
                    Counters::bump(&counters.encoder_errors);
                    warn!(frame = frame.seq, error = %e, "face encoding failed, frame skipped");
                    continue;
                }
            };
            if faces.is_empty() {
                Counters::bump(&counters.frames_without_faces);
                continue;
            }

            self.shared.set_state(PipelineState::Matching);
            let snapshot = self.matcher.store().snapshot();
            for (index, embedding) in faces.iter().enumerate() {
                Counters::bump(&counters.faces);
                let outcome = match self.matcher.match_in(&snapshot, embedding) {
                    Ok(o) => o,
                    Err(e) => {
                        Counters::bump(&counters.encoder_errors);
                        warn!(frame = frame.seq, face = index, error = %e, "face skipped");
                        continue;
                    }
                };

                self.shared.set_state(PipelineState::Emitting);
                let event = MatchEvent::new(frame.seq, index, outcome, Instant::now());
                match self.events.push(event) {
                    Ok(Some(_)) => {
                        Counters::bump(&counters.events_dropped);
                        debug!("consumer behind, match event dropped");
                    }
                    Ok(None) => {}
                    Err(_) => break 'frames,
                }
                Counters::bump(&counters.events_emitted);
            }
        }
        self.events.close();
        self.shared.set_state(PipelineState::Stopped);
    }
}
