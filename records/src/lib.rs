//! Patient, doctor and appointment records for the triage console.
//!
//! [`RecordStore`] keeps the three collections in one immutable
//! [`RecordSnapshot`]. Every CRUD operation derives the next snapshot,
//! rewrites the affected collection file atomically, and only then publishes
//! the snapshot, so readers (the triage session, listing views) always see
//! a consistent state and a failed write changes nothing.
//!
//! ```
//! use std::sync::Arc;
//! use facetriage_records::{Patient, RecordStore};
//! use facetriage_store::{Identity, MemoryStore};
//!
//! let store = RecordStore::open(Arc::new(MemoryStore::new())).unwrap();
//! let mut p = Patient::new(Identity::new("P1").unwrap());
//! p.allergies = vec!["penicillin".into(), "none".into()];
//! store.create_patient(p).unwrap();
//!
//! let snap = store.snapshot();
//! assert_eq!(snap.patient("P1").unwrap().allergies, vec!["penicillin"]);
//! ```
//!
//! Deleting a patient or doctor never cascades: appointments keep their
//! references and [`RecordStore::list_appointments`] flags the dangling
//! side instead.

mod codec;
mod error;
mod store;
mod types;


pub use codec::{APPOINTMENTS_FILE, DOCTORS_FILE, PATIENTS_FILE};
pub use error::RecordError;
pub use store::{RecordSnapshot, RecordStore};
pub use types::{
    Appointment, AppointmentStatus, AppointmentUpdate, AppointmentView, Availability, Doctor,
    NewAppointment, Patient,
};
