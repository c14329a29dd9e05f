use chrono::{NaiveDate, NaiveDateTime};
use facetriage_records::{Patient, RecordSnapshot};
use facetriage_store::Identity;
use serde::Serialize;

use crate::debounce::Confirmation;
use crate::TriageError;

/// Whether the patient record behind a recognized face was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Found,
    /// The face matched an enrolled template but the patient record was
    /// deleted. The alert is degraded.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientSummary {
    pub age: Option<u32>,
    pub gender: String,
    pub history: String,
    pub last_visit: Option<NaiveDateTime>,
}

impl From<&Patient> for PatientSummary {
    fn from(p: &Patient) -> Self {
        Self {
            age: p.age,
            gender: p.gender.clone(),
            history: p.history.clone(),
            last_visit: p.last_visit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingAppointment {
    pub id: u64,
    pub doctor: Identity,
    pub doctor_missing: bool,
    pub scheduled_at: NaiveDateTime,
    pub reason: String,
    /// Scheduled for the day of the alert.
    pub today: bool,
}

/// What the console shows when a patient is recognized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertPayload {
    pub identity: Identity,
    pub record: RecordStatus,
    pub patient: Option<PatientSummary>,
    pub allergies: Vec<String>,
    /// The patient has known allergies.
    pub critical_allergy: bool,
    pub appointments: Vec<UpcomingAppointment>,
    pub distance: f32,
    pub hits: usize,
    pub frame: u64,
    pub confirmed_at: NaiveDateTime,
}

impl AlertPayload {
    pub fn record_missing(&self) -> bool {
        self.record == RecordStatus::Missing
    }
}

/// Looks up the patient behind a confirmed identity.
pub fn lookup_patient<'a>(
    snapshot: &'a RecordSnapshot,
    identity: &Identity,
) -> Result<&'a Patient, TriageError> {
    snapshot
        .patient(identity.as_str())
        .ok_or_else(|| TriageError::RecordMissingForTemplate(identity.clone()))
}

/// Assembles an alert from one consistent record snapshot.
///
/// Lists scheduled appointments from the start of `now`'s day onward. A
/// missing patient record yields a degraded alert instead of an error.
pub fn build_alert(
    snapshot: &RecordSnapshot,
    confirmation: &Confirmation,
    distance: f32,
    frame: u64,
    now: NaiveDateTime,
) -> AlertPayload {
    let identity = &confirmation.identity;
    let patient = lookup_patient(snapshot, identity).ok();
    let today = now.date();

    let appointments = snapshot
        .open_appointments_for(identity.as_str())
        .into_iter()
        .filter(|a| a.scheduled_at.date() >= today)
        .map(|a| UpcomingAppointment {
            id: a.id,
            doctor: a.doctor.clone(),
            doctor_missing: snapshot.doctor(a.doctor.as_str()).is_none(),
            scheduled_at: a.scheduled_at,
            reason: a.reason.clone(),
            today: is_same_day(a.scheduled_at, today),
        })
        .collect();

    let allergies = patient.map(|p| p.allergies.clone()).unwrap_or_default();
    AlertPayload {
        identity: identity.clone(),
        record: if patient.is_some() {
            RecordStatus::Found
        } else {
            RecordStatus::Missing
        },
        patient: patient.map(PatientSummary::from),
        critical_allergy: !allergies.is_empty(),
        allergies,
        appointments,
        distance,
        hits: confirmation.hits,
        frame,
        confirmed_at: now,
    }
}

fn is_same_day(at: NaiveDateTime, day: NaiveDate) -> bool {
    at.date() == day
}
