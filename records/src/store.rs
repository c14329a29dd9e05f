use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use facetriage_store::{BlobStore, Identity};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::codec::{self, APPOINTMENTS_FILE, DOCTORS_FILE, PATIENTS_FILE};
use crate::types::{
    Appointment, AppointmentStatus, AppointmentUpdate, AppointmentView, Doctor, NewAppointment,
    Patient,
};
use crate::RecordError;

const PATIENT: &str = "patient";
const DOCTOR: &str = "doctor";
const APPOINTMENT: &str = "appointment";

/// Point-in-time view of every record collection.
#[derive(Debug, Clone, Default)]
pub struct RecordSnapshot {
    patients: BTreeMap<Identity, Patient>,
    doctors: BTreeMap<Identity, Doctor>,
    appointments: BTreeMap<u64, Appointment>,
    next_appointment_id: u64,
}

impl RecordSnapshot {
    pub fn patient(&self, identity: &str) -> Option<&Patient> {
        self.patients.get(identity)
    }

    pub fn doctor(&self, identity: &str) -> Option<&Doctor> {
        self.doctors.get(identity)
    }

    pub fn appointment(&self, id: u64) -> Option<&Appointment> {
        self.appointments.get(&id)
    }

    /// Patients ordered by identity.
    pub fn patients(&self) -> impl Iterator<Item = &Patient> {
        self.patients.values()
    }

    /// Doctors ordered by identity.
    pub fn doctors(&self) -> impl Iterator<Item = &Doctor> {
        self.doctors.values()
    }

    /// All appointments ordered by `(scheduled_at, id)`.
    pub fn appointments(&self) -> Vec<&Appointment> {
        let mut v: Vec<&Appointment> = self.appointments.values().collect();
        v.sort_by_key(|a| (a.scheduled_at, a.id));
        v
    }

    /// Scheduled appointments of a patient, earliest first.
    pub fn open_appointments_for(&self, patient: &str) -> Vec<&Appointment> {
        self.appointments()
            .into_iter()
            .filter(|a| a.patient.as_str() == patient && a.status.is_open())
            .collect()
    }

    /// Wraps an appointment with its data-quality flags.
    pub fn view(&self, a: &Appointment) -> AppointmentView {
        let doctor = self.doctors.get(&a.doctor);
        AppointmentView {
            appointment: a.clone(),
            patient_missing: !self.patients.contains_key(&a.patient),
            doctor_missing: doctor.is_none(),
            outside_availability: doctor
                .is_some_and(|d| !d.availability.contains(a.scheduled_at)),
        }
    }

    pub fn patient_count(&self) -> usize {
        self.patients.len()
    }

    pub fn doctor_count(&self) -> usize {
        self.doctors.len()
    }

    pub fn appointment_count(&self) -> usize {
        self.appointments.len()
    }
}

/// Collection rewritten by a mutation.
#[derive(Debug, Clone, Copy)]
enum Collection {
    Patients,
    Doctors,
    Appointments,
}

/// Owns patient, doctor and appointment records.
///
/// Readers take a [`RecordSnapshot`]; writers are serialized and publish a
/// new snapshot only after the affected collection has been persisted.
pub struct RecordStore {
    blob: Arc<dyn BlobStore>,
    current: RwLock<Arc<RecordSnapshot>>,
    writer: Mutex<()>,
}

impl RecordStore {
    /// Loads all collections. Missing files are empty collections; a
    /// corrupt file fails the open.
    pub fn open(blob: Arc<dyn BlobStore>) -> Result<Self, RecordError> {
        let snapshot = Self::load(blob.as_ref())?;
        Ok(Self {
            blob,
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
        })
    }

    fn load(blob: &dyn BlobStore) -> Result<RecordSnapshot, RecordError> {
        let (snap, missing) = Self::read(blob)?;
        for file in missing {
            warn!(file, "no records found, starting empty");
        }
        info!(
            patients = snap.patients.len(),
            doctors = snap.doctors.len(),
            appointments = snap.appointments.len(),
            "loaded records"
        );
        Ok(snap)
    }

    /// Decodes every collection file, returning the names of missing ones.
    fn read(blob: &dyn BlobStore) -> Result<(RecordSnapshot, Vec<&'static str>), RecordError> {
        let mut snap = RecordSnapshot::default();
        let mut missing = Vec::new();
        match blob.load(PATIENTS_FILE)? {
            Some(data) => snap.patients = codec::decode_patients(&data)?,
            None => missing.push(PATIENTS_FILE),
        }
        match blob.load(DOCTORS_FILE)? {
            Some(data) => snap.doctors = codec::decode_doctors(&data)?,
            None => missing.push(DOCTORS_FILE),
        }
        match blob.load(APPOINTMENTS_FILE)? {
            Some(data) => {
                let (appointments, next_id) = codec::decode_appointments(&data)?;
                snap.appointments = appointments;
                snap.next_appointment_id = next_id;
            }
            None => missing.push(APPOINTMENTS_FILE),
        }
        Ok((snap, missing))
    }

    /// Returns the current consistent view.
    pub fn snapshot(&self) -> Arc<RecordSnapshot> {
        self.current.read().clone()
    }

    /// Replaces in-memory state with what is on disk.
    pub fn reload(&self) -> Result<(), RecordError> {
        let _w = self.writer.lock();
        let snap = Self::load(self.blob.as_ref())?;
        *self.current.write() = Arc::new(snap);
        Ok(())
    }

    /// Re-reads the collection files and returns the resulting view.
    ///
    /// Other processes may write the same directory; long-lived readers
    /// call this before acting on a record.
    pub fn refresh(&self) -> Result<Arc<RecordSnapshot>, RecordError> {
        let _w = self.writer.lock();
        let (snap, _) = Self::read(self.blob.as_ref())?;
        let snap = Arc::new(snap);
        *self.current.write() = snap.clone();
        Ok(snap)
    }

    /// Rewrites every collection file from the current snapshot.
    pub fn save(&self) -> Result<(), RecordError> {
        let _w = self.writer.lock();
        let snap = self.snapshot();
        for c in [
            Collection::Patients,
            Collection::Doctors,
            Collection::Appointments,
        ] {
            self.persist(&snap, c)?;
        }
        Ok(())
    }

    // ---- patients ----

    pub fn create_patient(&self, patient: Patient) -> Result<Patient, RecordError> {
        let patient = patient.normalize()?;
        self.mutate(Collection::Patients, |snap| {
            if snap.patients.contains_key(&patient.identity) {
                return Err(RecordError::DuplicateIdentity {
                    kind: PATIENT,
                    identity: patient.identity.clone(),
                });
            }
            snap.patients
                .insert(patient.identity.clone(), patient.clone());
            info!(patient = %patient.identity, "created patient");
            Ok(patient.clone())
        })
    }

    /// Replaces the patient's fields. `last_visit` is kept when the update
    /// leaves it unset.
    pub fn update_patient(&self, patient: Patient) -> Result<Patient, RecordError> {
        let mut patient = patient.normalize()?;
        self.mutate(Collection::Patients, |snap| {
            let old = snap
                .patients
                .get(&patient.identity)
                .ok_or_else(|| RecordError::not_found(PATIENT, &patient.identity))?;
            if patient.last_visit.is_none() {
                patient.last_visit = old.last_visit;
            }
            snap.patients
                .insert(patient.identity.clone(), patient.clone());
            info!(patient = %patient.identity, "updated patient");
            Ok(patient.clone())
        })
    }

    /// Deletes a patient. Their appointments are kept and show up as
    /// dangling in listings.
    pub fn delete_patient(&self, identity: &Identity) -> Result<Patient, RecordError> {
        self.mutate(Collection::Patients, |snap| {
            let removed = snap
                .patients
                .remove(identity)
                .ok_or_else(|| RecordError::not_found(PATIENT, identity))?;
            let orphaned = snap
                .appointments
                .values()
                .filter(|a| &a.patient == identity)
                .count();
            if orphaned > 0 {
                warn!(patient = %identity, orphaned, "deleted patient still has appointments");
            }
            info!(patient = %identity, "deleted patient");
            Ok(removed)
        })
    }

    /// Records a visit.
    pub fn touch_patient(
        &self,
        identity: &Identity,
        at: NaiveDateTime,
    ) -> Result<Patient, RecordError> {
        self.mutate(Collection::Patients, |snap| {
            let p = snap
                .patients
                .get_mut(identity)
                .ok_or_else(|| RecordError::not_found(PATIENT, identity))?;
            p.last_visit = Some(at);
            debug!(patient = %identity, %at, "visit recorded");
            Ok(p.clone())
        })
    }

    pub fn get_patient(&self, identity: &str) -> Option<Patient> {
        self.snapshot().patient(identity).cloned()
    }

    pub fn list_patients(&self) -> Vec<Patient> {
        self.snapshot().patients().cloned().collect()
    }

    // ---- doctors ----

    pub fn create_doctor(&self, doctor: Doctor) -> Result<Doctor, RecordError> {
        let doctor = doctor.normalize()?;
        self.mutate(Collection::Doctors, |snap| {
            if snap.doctors.contains_key(&doctor.identity) {
                return Err(RecordError::DuplicateIdentity {
                    kind: DOCTOR,
                    identity: doctor.identity.clone(),
                });
            }
            snap.doctors.insert(doctor.identity.clone(), doctor.clone());
            info!(doctor = %doctor.identity, availability = %doctor.availability, "created doctor");
            Ok(doctor.clone())
        })
    }

    pub fn update_doctor(&self, doctor: Doctor) -> Result<Doctor, RecordError> {
        let doctor = doctor.normalize()?;
        self.mutate(Collection::Doctors, |snap| {
            if !snap.doctors.contains_key(&doctor.identity) {
                return Err(RecordError::not_found(DOCTOR, &doctor.identity));
            }
            snap.doctors.insert(doctor.identity.clone(), doctor.clone());
            info!(doctor = %doctor.identity, "updated doctor");
            Ok(doctor.clone())
        })
    }

    pub fn delete_doctor(&self, identity: &Identity) -> Result<Doctor, RecordError> {
        self.mutate(Collection::Doctors, |snap| {
            let removed = snap
                .doctors
                .remove(identity)
                .ok_or_else(|| RecordError::not_found(DOCTOR, identity))?;
            info!(doctor = %identity, "deleted doctor");
            Ok(removed)
        })
    }

    pub fn get_doctor(&self, identity: &str) -> Option<Doctor> {
        self.snapshot().doctor(identity).cloned()
    }

    /// Doctor roster with schedules, ordered by identity.
    pub fn list_doctors(&self) -> Vec<Doctor> {
        self.snapshot().doctors().cloned().collect()
    }

    // ---- appointments ----

    /// Books an appointment. Patient and doctor must exist and the time
    /// must not be in the past.
    pub fn create_appointment(&self, new: NewAppointment) -> Result<Appointment, RecordError> {
        self.create_appointment_at(new, Local::now().naive_local())
    }

    /// [`create_appointment`](Self::create_appointment) with an explicit
    /// current time.
    pub fn create_appointment_at(
        &self,
        new: NewAppointment,
        now: NaiveDateTime,
    ) -> Result<Appointment, RecordError> {
        let reason = new.reason.trim().to_string();
        if reason.is_empty() {
            return Err(RecordError::invalid("reason", "must not be empty"));
        }
        if new.scheduled_at < now {
            return Err(RecordError::AppointmentInPast(new.scheduled_at));
        }
        self.mutate(Collection::Appointments, |snap| {
            if !snap.patients.contains_key(&new.patient) {
                return Err(RecordError::not_found(PATIENT, &new.patient));
            }
            let doctor = snap
                .doctors
                .get(&new.doctor)
                .ok_or_else(|| RecordError::not_found(DOCTOR, &new.doctor))?;
            if !doctor.availability.contains(new.scheduled_at) {
                warn!(
                    doctor = %new.doctor,
                    at = %new.scheduled_at,
                    availability = %doctor.availability,
                    "appointment booked outside doctor availability"
                );
            }
            let a = Appointment {
                id: snap.next_appointment_id,
                patient: new.patient.clone(),
                doctor: new.doctor.clone(),
                scheduled_at: new.scheduled_at,
                reason: reason.clone(),
                status: AppointmentStatus::Scheduled,
            };
            snap.next_appointment_id += 1;
            snap.appointments.insert(a.id, a.clone());
            info!(id = a.id, patient = %a.patient, doctor = %a.doctor, at = %a.scheduled_at, "booked appointment");
            Ok(a)
        })
    }

    pub fn update_appointment(
        &self,
        id: u64,
        update: AppointmentUpdate,
    ) -> Result<Appointment, RecordError> {
        self.update_appointment_at(id, update, Local::now().naive_local())
    }

    /// Applies a partial update. Rescheduling (new time or doctor) is only
    /// allowed while the appointment is scheduled; a closed appointment
    /// cannot change status again.
    pub fn update_appointment_at(
        &self,
        id: u64,
        update: AppointmentUpdate,
        now: NaiveDateTime,
    ) -> Result<Appointment, RecordError> {
        let reason = match &update.reason {
            Some(r) if r.trim().is_empty() => {
                return Err(RecordError::invalid("reason", "must not be empty"));
            }
            Some(r) => Some(r.trim().to_string()),
            None => None,
        };
        if let Some(at) = update.scheduled_at.filter(|at| *at < now) {
            return Err(RecordError::AppointmentInPast(at));
        }
        self.mutate(Collection::Appointments, |snap| {
            let current = snap
                .appointments
                .get(&id)
                .ok_or_else(|| RecordError::not_found(APPOINTMENT, id))?;
            if !current.status.is_open() {
                let changes_status = update.status.is_some_and(|s| s != current.status);
                if update.reschedules() || changes_status {
                    return Err(RecordError::InvalidTransition {
                        id,
                        status: current.status,
                        action: if update.reschedules() {
                            "reschedule"
                        } else {
                            "change status"
                        },
                    });
                }
            }
            if let Some(doctor) = update.doctor.as_ref().filter(|d| !snap.doctors.contains_key(*d)) {
                return Err(RecordError::not_found(DOCTOR, doctor));
            }

            let mut a = current.clone();
            if let Some(doctor) = &update.doctor {
                a.doctor = doctor.clone();
            }
            if let Some(at) = update.scheduled_at {
                a.scheduled_at = at;
            }
            if let Some(r) = &reason {
                a.reason = r.clone();
            }
            if let Some(s) = update.status {
                a.status = s;
            }
            snap.appointments.insert(id, a.clone());
            info!(id, status = %a.status, at = %a.scheduled_at, "updated appointment");
            Ok(a)
        })
    }

    /// Marks an appointment canceled. The record is kept.
    pub fn cancel_appointment(&self, id: u64) -> Result<Appointment, RecordError> {
        self.mutate(Collection::Appointments, |snap| {
            let a = snap
                .appointments
                .get_mut(&id)
                .ok_or_else(|| RecordError::not_found(APPOINTMENT, id))?;
            match a.status {
                AppointmentStatus::Scheduled => a.status = AppointmentStatus::Canceled,
                AppointmentStatus::Canceled => {}
                AppointmentStatus::Completed => {
                    return Err(RecordError::InvalidTransition {
                        id,
                        status: a.status,
                        action: "cancel",
                    });
                }
            }
            info!(id, "canceled appointment");
            Ok(a.clone())
        })
    }

    pub fn get_appointment(&self, id: u64) -> Option<AppointmentView> {
        let snap = self.snapshot();
        snap.appointment(id).map(|a| snap.view(a))
    }

    /// Every appointment, flagged, ordered by `(scheduled_at, id)`.
    pub fn list_appointments(&self) -> Vec<AppointmentView> {
        let snap = self.snapshot();
        snap.appointments().into_iter().map(|a| snap.view(a)).collect()
    }

    /// A patient's appointments of any status, flagged.
    pub fn appointments_for(&self, patient: &str) -> Vec<AppointmentView> {
        let snap = self.snapshot();
        snap.appointments()
            .into_iter()
            .filter(|a| a.patient.as_str() == patient)
            .map(|a| snap.view(a))
            .collect()
    }

    /// Runs one writer transaction and publishes its result once
    /// `collection` is persisted.
    ///
    /// The transaction starts from the files, not the cached snapshot, so a
    /// write never reverts records saved by another process since `open`.
    fn mutate<T, F>(&self, collection: Collection, f: F) -> Result<T, RecordError>
    where
        F: FnOnce(&mut RecordSnapshot) -> Result<T, RecordError>,
    {
        let _w = self.writer.lock();
        let (mut next, _) = Self::read(self.blob.as_ref())?;
        let out = f(&mut next)?;
        self.persist(&next, collection)?;
        *self.current.write() = Arc::new(next);
        Ok(out)
    }

    fn persist(&self, snap: &RecordSnapshot, collection: Collection) -> Result<(), RecordError> {
        let (name, data) = match collection {
            Collection::Patients => (PATIENTS_FILE, codec::encode_patients(&snap.patients)?),
            Collection::Doctors => (DOCTORS_FILE, codec::encode_doctors(&snap.doctors)?),
            Collection::Appointments => (
                APPOINTMENTS_FILE,
                codec::encode_appointments(&snap.appointments, snap.next_appointment_id)?,
            ),
        };
        self.blob.save(name, &data)?;
        debug!(file = name, bytes = data.len(), "persisted records");
        Ok(())
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snap = self.snapshot();
        f.debug_struct("RecordStore")
            .field("patients", &snap.patient_count())
            .field("doctors", &snap.doctor_count())
            .field("appointments", &snap.appointment_count())
            .finish()
    }
}
