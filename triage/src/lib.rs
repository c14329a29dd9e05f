//! Triage session: turns a noisy stream of per-frame match events into one
//! alert per recognized visit.
//!
//! [`Debouncer`] confirms an identity by majority vote over a rolling
//! window with a per-identity cool-down. On confirmation,
//! [`TriageSession`] reads one consistent record snapshot and hands an
//! [`AlertPayload`] (allergies, scheduled appointments) to an
//! [`AlertSink`]. A face whose patient record was deleted still alerts,
//! flagged [`RecordStatus::Missing`].

mod alert;
mod debounce;
mod error;
mod session;
mod sink;

#[cfg(test)]
mod tests;

pub use alert::{
    build_alert, lookup_patient, AlertPayload, PatientSummary, RecordStatus, UpcomingAppointment,
};
pub use debounce::{Confirmation, DebounceConfig, Debouncer};
pub use error::TriageError;
pub use session::{TriageSession, TriageStats};
pub use sink::{AlertReceiver, AlertSink, ChannelSink, CollectingSink};
