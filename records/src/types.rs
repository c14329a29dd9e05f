use std::fmt;

use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use facetriage_store::Identity;
use serde::{Deserialize, Serialize};

use crate::RecordError;

/// Allergy entries that mean "no known allergies".
const NO_ALLERGY: [&str; 3] = ["none", "n/a", "na"];

const MAX_AGE: u32 = 150;

/// A registered patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub identity: Identity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,

    #[serde(default)]
    pub gender: String,

    /// Known allergies. Empty means none.
    #[serde(default)]
    pub allergies: Vec<String>,

    /// Free-text condition history.
    #[serde(default)]
    pub history: String,

    /// Last registration or recognized visit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_visit: Option<NaiveDateTime>,
}

impl Patient {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            age: None,
            gender: String::new(),
            allergies: Vec::new(),
            history: String::new(),
            last_visit: None,
        }
    }

    /// Trims fields, drops placeholder allergies and checks ranges.
    pub(crate) fn normalize(mut self) -> Result<Self, RecordError> {
        if let Some(age) = self.age.filter(|a| *a > MAX_AGE) {
            return Err(RecordError::invalid("age", format!("{age} is out of range")));
        }
        self.gender = self.gender.trim().to_string();
        self.history = self.history.trim().to_string();

        let mut allergies: Vec<String> = Vec::with_capacity(self.allergies.len());
        for a in self.allergies.iter().flat_map(|a| a.split(',')) {
            let a = a.trim();
            if a.is_empty() || NO_ALLERGY.iter().any(|n| a.eq_ignore_ascii_case(n)) {
                continue;
            }
            if !allergies.iter().any(|x| x.eq_ignore_ascii_case(a)) {
                allergies.push(a.to_string());
            }
        }
        self.allergies = allergies;
        Ok(self)
    }

    pub fn has_allergies(&self) -> bool {
        !self.allergies.is_empty()
    }
}

/// Weekly availability of a doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub days: Vec<Weekday>,

    #[serde(with = "hhmm")]
    pub start: NaiveTime,

    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl Availability {
    /// Whether `at` falls on an available day within `[start, end)`.
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        let t = at.time();
        self.days.contains(&at.weekday()) && t >= self.start && t < self.end
    }

    fn normalize(mut self) -> Result<Self, RecordError> {
        if self.days.is_empty() {
            return Err(RecordError::invalid(
                "availability",
                "at least one day is required",
            ));
        }
        if self.start >= self.end {
            return Err(RecordError::invalid(
                "availability",
                format!(
                    "start {} is not before end {}",
                    self.start.format("%H:%M"),
                    self.end.format("%H:%M")
                ),
            ));
        }
        self.days.sort_by_key(|d| d.num_days_from_monday());
        self.days.dedup();
        Ok(self)
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days: Vec<String> = self.days.iter().map(|d| d.to_string()).collect();
        write!(
            f,
            "{} {}-{}",
            days.join(","),
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// A registered doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub identity: Identity,
    pub specialty: String,
    pub contact: String,
    pub availability: Availability,
}

impl Doctor {
    pub(crate) fn normalize(mut self) -> Result<Self, RecordError> {
        self.specialty = self.specialty.trim().to_string();
        self.contact = self.contact.trim().to_string();
        if self.specialty.is_empty() {
            return Err(RecordError::invalid("specialty", "must not be empty"));
        }
        if self.contact.is_empty() {
            return Err(RecordError::invalid("contact", "must not be empty"));
        }
        self.availability = self.availability.normalize()?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Canceled,
}

impl AppointmentStatus {
    pub fn is_open(self) -> bool {
        self == AppointmentStatus::Scheduled
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Canceled => "canceled",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    /// Assigned by the store, never reused.
    pub id: u64,
    pub patient: Identity,
    pub doctor: Identity,
    pub scheduled_at: NaiveDateTime,
    pub reason: String,
    pub status: AppointmentStatus,
}

/// Input of `create_appointment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub patient: Identity,
    pub doctor: Identity,
    pub scheduled_at: NaiveDateTime,
    pub reason: String,
}

/// Partial change applied by `update_appointment`. `None` keeps the field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentUpdate {
    pub doctor: Option<Identity>,
    pub scheduled_at: Option<NaiveDateTime>,
    pub reason: Option<String>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentUpdate {
    pub(crate) fn reschedules(&self) -> bool {
        self.doctor.is_some() || self.scheduled_at.is_some()
    }
}

/// An appointment with data-quality flags for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,

    /// The patient was deleted after booking.
    pub patient_missing: bool,

    /// The doctor was deleted after booking.
    pub doctor_missing: bool,

    /// Booked outside the doctor's weekly availability.
    pub outside_availability: bool,
}

impl AppointmentView {
    pub fn is_dangling(&self) -> bool {
        self.patient_missing || self.doctor_missing
    }
}

/// `HH:MM` (de)serialization for [`NaiveTime`]. Seconds are accepted on
/// input and dropped.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&t.format("%H:%M"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(d)?;
        NaiveTime::parse_from_str(&s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
            .map_err(|e| D::Error::custom(format!("invalid time {s:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn patient_allergies_are_normalized() {
        let mut p = Patient::new(Identity::new("P1").unwrap());
        p.allergies = vec![
            " Penicillin ".into(),
            "NONE".into(),
            "n/a".into(),
            "latex, peanuts".into(),
            "penicillin".into(),
            "".into(),
        ];
        let p = p.normalize().unwrap();
        assert_eq!(p.allergies, vec!["Penicillin", "latex", "peanuts"]);
    }

    #[test]
    fn patient_age_out_of_range() {
        let mut p = Patient::new(Identity::new("P1").unwrap());
        p.age = Some(400);
        assert!(matches!(
            p.normalize(),
            Err(RecordError::InvalidRecord { field: "age", .. })
        ));
    }

    #[test]
    fn availability_window() {
        let a = Availability {
            days: vec![Weekday::Mon, Weekday::Wed],
            start: hm(9, 0),
            end: hm(17, 0),
        };
        // 2026-10-19 is a Monday.
        assert!(a.contains(at(2026, 10, 19, 9, 0)));
        assert!(a.contains(at(2026, 10, 19, 16, 59)));
        assert!(!a.contains(at(2026, 10, 19, 17, 0)));
        assert!(!a.contains(at(2026, 10, 20, 10, 0)));
        assert_eq!(a.to_string(), "Mon,Wed 09:00-17:00");
    }

    #[test]
    fn availability_validation() {
        let no_days = Availability {
            days: vec![],
            start: hm(9, 0),
            end: hm(10, 0),
        };
        assert!(no_days.normalize().is_err());

        let inverted = Availability {
            days: vec![Weekday::Fri],
            start: hm(12, 0),
            end: hm(8, 0),
        };
        assert!(inverted.normalize().is_err());

        let messy = Availability {
            days: vec![Weekday::Fri, Weekday::Mon, Weekday::Fri],
            start: hm(8, 0),
            end: hm(12, 0),
        }
        .normalize()
        .unwrap();
        assert_eq!(messy.days, vec![Weekday::Mon, Weekday::Fri]);
    }

    #[test]
    fn availability_serde_uses_hhmm() {
        let a = Availability {
            days: vec![Weekday::Tue],
            start: hm(8, 30),
            end: hm(12, 15),
        };
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, r#"{"days":["Tue"],"start":"08:30","end":"12:15"}"#);
        let back: Availability = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn status_display_matches_serde() {
        for s in [
            AppointmentStatus::Scheduled,
            AppointmentStatus::Completed,
            AppointmentStatus::Canceled,
        ] {
            let json = serde_json::to_string(&s).unwrap();
            assert_eq!(json, format!("\"{s}\""));
        }
    }
}
