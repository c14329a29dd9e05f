//! Collection files. Each is pretty JSON with sorted keys so an unchanged
//! collection always serializes to the same bytes.

use std::collections::BTreeMap;

use facetriage_store::Identity;
use serde::{Deserialize, Serialize};

use crate::types::{Appointment, Doctor, Patient};
use crate::RecordError;

pub const PATIENTS_FILE: &str = "patients.json";
pub const DOCTORS_FILE: &str = "doctors.json";
pub const APPOINTMENTS_FILE: &str = "appointments.json";

pub(crate) fn encode_patients(
    patients: &BTreeMap<Identity, Patient>,
) -> Result<Vec<u8>, RecordError> {
    to_json(PATIENTS_FILE, patients)
}

pub(crate) fn decode_patients(data: &[u8]) -> Result<BTreeMap<Identity, Patient>, RecordError> {
    let map: BTreeMap<Identity, Patient> = from_json(PATIENTS_FILE, data)?;
    for (key, p) in &map {
        if key != &p.identity {
            return Err(corrupt(
                PATIENTS_FILE,
                format!("key {key} holds patient {}", p.identity),
            ));
        }
        p.clone()
            .normalize()
            .map_err(|e| corrupt(PATIENTS_FILE, format!("{key}: {e}")))?;
    }
    Ok(map)
}

pub(crate) fn encode_doctors(doctors: &BTreeMap<Identity, Doctor>) -> Result<Vec<u8>, RecordError> {
    to_json(DOCTORS_FILE, doctors)
}

pub(crate) fn decode_doctors(data: &[u8]) -> Result<BTreeMap<Identity, Doctor>, RecordError> {
    let map: BTreeMap<Identity, Doctor> = from_json(DOCTORS_FILE, data)?;
    for (key, d) in &map {
        if key != &d.identity {
            return Err(corrupt(
                DOCTORS_FILE,
                format!("key {key} holds doctor {}", d.identity),
            ));
        }
        d.clone()
            .normalize()
            .map_err(|e| corrupt(DOCTORS_FILE, format!("{key}: {e}")))?;
    }
    Ok(map)
}

#[derive(Serialize, Deserialize)]
struct AppointmentFile {
    next_id: u64,
    appointments: Vec<Appointment>,
}

pub(crate) fn encode_appointments(
    appointments: &BTreeMap<u64, Appointment>,
    next_id: u64,
) -> Result<Vec<u8>, RecordError> {
    to_json(
        APPOINTMENTS_FILE,
        &AppointmentFile {
            next_id,
            appointments: appointments.values().cloned().collect(),
        },
    )
}

pub(crate) fn decode_appointments(
    data: &[u8],
) -> Result<(BTreeMap<u64, Appointment>, u64), RecordError> {
    let file: AppointmentFile = from_json(APPOINTMENTS_FILE, data)?;
    let mut map = BTreeMap::new();
    for a in file.appointments {
        if a.id >= file.next_id {
            return Err(corrupt(
                APPOINTMENTS_FILE,
                format!("id {} not below next_id {}", a.id, file.next_id),
            ));
        }
        if a.reason.trim().is_empty() {
            return Err(corrupt(APPOINTMENTS_FILE, format!("{}: empty reason", a.id)));
        }
        let id = a.id;
        if map.insert(id, a).is_some() {
            return Err(corrupt(APPOINTMENTS_FILE, format!("duplicate id {id}")));
        }
    }
    Ok((map, file.next_id))
}

fn to_json<T: Serialize + ?Sized>(name: &str, value: &T) -> Result<Vec<u8>, RecordError> {
    let mut data = serde_json::to_vec_pretty(value).map_err(|e| corrupt(name, e.to_string()))?;
    data.push(b'\n');
    Ok(data)
}

fn from_json<T: for<'de> Deserialize<'de>>(name: &str, data: &[u8]) -> Result<T, RecordError> {
    serde_json::from_slice(data).map_err(|e| corrupt(name, e.to_string()))
}

fn corrupt(name: &str, reason: String) -> RecordError {
    RecordError::CorruptPersistedData {
        name: name.to_string(),
        reason,
    }
}
