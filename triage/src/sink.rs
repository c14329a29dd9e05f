use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use facetriage_capture::{DropQueue, Pop};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::warn;

use crate::{AlertPayload, TriageError};

/// Receives confirmed alerts. Must not block the triage loop.
pub trait AlertSink: Send + Sync {
    fn deliver(&self, alert: AlertPayload) -> Result<(), TriageError>;
}

/// Keeps every alert in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    alerts: Mutex<Vec<AlertPayload>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<AlertPayload> {
        self.alerts.lock().clone()
    }

    pub fn take(&self) -> Vec<AlertPayload> {
        std::mem::take(&mut *self.alerts.lock())
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertSink for CollectingSink {
    fn deliver(&self, alert: AlertPayload) -> Result<(), TriageError> {
        self.alerts.lock().push(alert);
        Ok(())
    }
}

/// Forwards alerts to an async consumer through a bounded drop-oldest
/// queue.
///
/// When the consumer falls behind, the oldest undelivered alert is evicted
/// so the console always shows the most recent arrivals.
pub struct ChannelSink {
    queue: DropQueue<AlertPayload>,
    ready: Arc<Notify>,
}

/// Consumer half of a [`ChannelSink`].
pub struct AlertReceiver {
    queue: DropQueue<AlertPayload>,
    ready: Arc<Notify>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, AlertReceiver) {
        let queue = DropQueue::new(capacity);
        let ready = Arc::new(Notify::new());
        (
            Self {
                queue: queue.clone(),
                ready: ready.clone(),
            },
            AlertReceiver { queue, ready },
        )
    }

    /// Alerts evicted before the consumer saw them.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }
}

impl AlertSink for ChannelSink {
    fn deliver(&self, alert: AlertPayload) -> Result<(), TriageError> {
        let evicted = self
            .queue
            .push(alert)
            .map_err(|_| TriageError::SinkClosed)?;
        if let Some(old) = evicted {
            warn!(identity = %old.identity, frame = old.frame, "console behind, oldest alert dropped");
        }
        self.ready.notify_one();
        Ok(())
    }
}

impl Drop for ChannelSink {
    fn drop(&mut self) {
        self.queue.close();
        self.ready.notify_one();
    }
}

impl fmt::Debug for ChannelSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSink")
            .field("pending", &self.queue.len())
            .field("capacity", &self.queue.capacity())
            .field("dropped", &self.queue.dropped())
            .finish()
    }
}

impl AlertReceiver {
    /// Waits for the next alert. Returns `None` once the sink is gone and
    /// every queued alert has been received.
    pub async fn recv(&mut self) -> Option<AlertPayload> {
        loop {
            match self.queue.pop_timeout(Duration::ZERO) {
                Pop::Item(alert) => return Some(alert),
                Pop::Closed => return None,
                // A notify_one before this await leaves a permit behind.
                Pop::Empty => self.ready.notified().await,
            }
        }
    }

    /// Takes a queued alert without waiting.
    pub fn try_recv(&mut self) -> Option<AlertPayload> {
        self.queue.try_pop()
    }
}

impl Drop for AlertReceiver {
    fn drop(&mut self) {
        self.queue.close();
    }
}

impl fmt::Debug for AlertReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertReceiver")
            .field("pending", &self.queue.len())
            .finish()
    }
}
