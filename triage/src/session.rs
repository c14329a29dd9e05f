use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use facetriage_capture::{DropQueue, MatchEvent, Pop};
use facetriage_records::RecordStore;
use facetriage_template::MatchOutcome;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alert::{build_alert, lookup_patient};
use crate::debounce::{DebounceConfig, Debouncer};
use crate::{AlertPayload, AlertSink, TriageError};

/// How long [`TriageSession::run`] waits for an event before rechecking
/// cancellation.
const POLL: Duration = Duration::from_millis(50);

/// Counters of a triage run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TriageStats {
    pub events: u64,
    pub unknown: u64,
    pub alerts: u64,
    pub degraded_alerts: u64,
}

/// Turns match events into at most one alert per visit.
pub struct TriageSession {
    debouncer: Debouncer,
    records: Arc<RecordStore>,
    sink: Arc<dyn AlertSink>,
    clock: fn() -> NaiveDateTime,
    stats: TriageStats,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl TriageSession {
    pub fn new(
        config: &DebounceConfig,
        records: Arc<RecordStore>,
        sink: Arc<dyn AlertSink>,
    ) -> Result<Self, TriageError> {
        Ok(Self {
            debouncer: Debouncer::new(config)?,
            records,
            sink,
            clock: local_now,
            stats: TriageStats::default(),
        })
    }

    /// Overrides the wall clock used for alert timestamps and "today".
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn stats(&self) -> TriageStats {
        self.stats
    }

    /// Processes one event; returns the alert it produced, if any.
    ///
    /// The alert has already been handed to the sink.
    pub fn handle(&mut self, event: &MatchEvent) -> Result<Option<AlertPayload>, TriageError> {
        self.stats.events += 1;
        let (identity, distance) = match &event.outcome {
            MatchOutcome::Known { identity, distance } => (identity, *distance),
            MatchOutcome::Unknown { .. } => {
                self.stats.unknown += 1;
                self.debouncer.feed(None, event.at);
                return Ok(None);
            }
        };
        let Some(confirmation) = self.debouncer.feed(Some(identity), event.at) else {
            return Ok(None);
        };

        // Records may have been edited by another process since start-up.
        let snapshot = self.records.refresh().unwrap_or_else(|e| {
            warn!(error = %e, "cannot re-read records, using last loaded view");
            self.records.snapshot()
        });
        let alert = build_alert(
            &snapshot,
            &confirmation,
            distance,
            event.frame,
            (self.clock)(),
        );
        match lookup_patient(&snapshot, identity) {
            Ok(_) => info!(
                identity = %identity,
                hits = confirmation.hits,
                distance,
                allergies = alert.allergies.len(),
                appointments = alert.appointments.len(),
                "patient recognized"
            ),
            Err(e) => {
                self.stats.degraded_alerts += 1;
                warn!(error = %e, "degraded alert: record missing");
            }
        }
        self.stats.alerts += 1;
        self.sink.deliver(alert.clone())?;
        Ok(Some(alert))
    }

    /// Consumes events until the queue closes or `cancel` fires.
    pub fn run(
        &mut self,
        events: &DropQueue<MatchEvent>,
        cancel: &CancellationToken,
    ) -> Result<TriageStats, TriageError> {
        while !cancel.is_cancelled() {
            match events.pop_timeout(POLL) {
                Pop::Item(event) => {
                    self.handle(&event)?;
                }
                Pop::Empty => {}
                Pop::Closed => {
                    debug!("event queue closed");
                    break;
                }
            }
        }
        Ok(self.stats)
    }

    /// Starts a new visit sequence: forgets the window and cool-downs.
    pub fn reset(&mut self) {
        self.debouncer.reset();
    }
}

impl std::fmt::Debug for TriageSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriageSession")
            .field("debouncer", &self.debouncer)
            .field("stats", &self.stats)
            .finish()
    }
}
