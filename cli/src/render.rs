//! Plain-text rendering for the console.

use chrono::NaiveDateTime;
use facetriage_records::{AppointmentView, Doctor, Patient};
use facetriage_triage::AlertPayload;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

fn when(at: NaiveDateTime) -> String {
    at.format(TIME_FORMAT).to_string()
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

/// Renders a recognition alert as a console block.
pub fn alert(a: &AlertPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "== {} recognized at {} (distance {:.3}, {} hits)",
        a.identity,
        when(a.confirmed_at),
        a.distance,
        a.hits
    ));

    match &a.patient {
        None => lines.push("   !! no patient record for this face".to_string()),
        Some(p) => {
            lines.push(format!(
                "   age {}  gender {}  last visit {}",
                p.age.map_or_else(|| "-".to_string(), |a| a.to_string()),
                or_dash(&p.gender),
                p.last_visit.map_or_else(|| "-".to_string(), when),
            ));
            if a.critical_allergy {
                lines.push(format!("   !! ALLERGIES: {}", a.allergies.join(", ")));
            } else {
                lines.push("   allergies: none known".to_string());
            }
            if !p.history.is_empty() {
                lines.push(format!("   history: {}", p.history));
            }
        }
    }

    if a.appointments.is_empty() {
        lines.push("   no upcoming appointments".to_string());
    } else {
        lines.push("   appointments:".to_string());
        for ap in &a.appointments {
            let mut doctor = ap.doctor.to_string();
            if ap.doctor_missing {
                doctor.push_str(" (missing)");
            }
            lines.push(format!(
                "     #{:<4} {} {:<5} {:<16} {}",
                ap.id,
                when(ap.scheduled_at),
                if ap.today { "TODAY" } else { "" },
                doctor,
                ap.reason
            ));
        }
    }
    lines.join("\n") + "\n"
}

/// Renders the patient list as a table.
pub fn patients(list: &[Patient]) -> String {
    if list.is_empty() {
        return "No patients registered\n".to_string();
    }
    let mut out = format!(
        "{:<16} {:<4} {:<8} {:<16} {}\n",
        "IDENTITY", "AGE", "GENDER", "LAST_VISIT", "ALLERGIES"
    );
    for p in list {
        out.push_str(&format!(
            "{:<16} {:<4} {:<8} {:<16} {}\n",
            p.identity.as_str(),
            p.age.map_or_else(|| "-".to_string(), |a| a.to_string()),
            or_dash(&p.gender),
            p.last_visit.map_or_else(|| "-".to_string(), when),
            if p.allergies.is_empty() {
                "-".to_string()
            } else {
                p.allergies.join(", ")
            },
        ));
    }
    out
}

/// Renders the doctor roster with weekly availability.
pub fn doctors(list: &[Doctor]) -> String {
    if list.is_empty() {
        return "No doctors registered\n".to_string();
    }
    let mut out = format!(
        "{:<16} {:<16} {:<16} {}\n",
        "IDENTITY", "SPECIALTY", "CONTACT", "AVAILABILITY"
    );
    for d in list {
        out.push_str(&format!(
            "{:<16} {:<16} {:<16} {}\n",
            d.identity.as_str(),
            d.specialty,
            d.contact,
            d.availability
        ));
    }
    out
}

/// Renders appointments with their data-quality flags.
pub fn appointments(list: &[AppointmentView]) -> String {
    if list.is_empty() {
        return "No appointments\n".to_string();
    }
    let mut out = format!(
        "{:<5} {:<16} {:<16} {:<16} {:<10} {}\n",
        "ID", "WHEN", "PATIENT", "DOCTOR", "STATUS", "REASON"
    );
    for v in list {
        let a = &v.appointment;
        let mut flags = Vec::new();
        if v.patient_missing {
            flags.push("patient missing");
        }
        if v.doctor_missing {
            flags.push("doctor missing");
        }
        if v.outside_availability {
            flags.push("outside hours");
        }
        let mut reason = a.reason.clone();
        if !flags.is_empty() {
            reason.push_str(&format!(" [{}]", flags.join(", ")));
        }
        out.push_str(&format!(
            "{:<5} {:<16} {:<16} {:<16} {:<10} {}\n",
            a.id,
            when(a.scheduled_at),
            a.patient.as_str(),
            a.doctor.as_str(),
            a.status.to_string(),
            reason
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use facetriage_records::{Appointment, AppointmentStatus};
    use facetriage_store::Identity;
    use facetriage_triage::{PatientSummary, RecordStatus, UpcomingAppointment};

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn payload(patient: Option<PatientSummary>, allergies: Vec<String>) -> AlertPayload {
        AlertPayload {
            identity: id("P1"),
            record: if patient.is_some() {
                RecordStatus::Found
            } else {
                RecordStatus::Missing
            },
            patient,
            critical_allergy: !allergies.is_empty(),
            allergies,
            appointments: vec![UpcomingAppointment {
                id: 7,
                doctor: id("D1"),
                doctor_missing: true,
                scheduled_at: at(10, 30),
                reason: "review".into(),
                today: true,
            }],
            distance: 0.1234,
            hits: 3,
            frame: 12,
            confirmed_at: at(8, 0),
        }
    }

    #[test]
    fn alert_highlights_allergies() {
        let text = alert(&payload(
            Some(PatientSummary {
                age: Some(61),
                gender: "F".into(),
                history: "asthma".into(),
                last_visit: None,
            }),
            vec!["penicillin".into(), "latex".into()],
        ));
        assert!(text.starts_with("== P1 recognized at 2026-10-19 08:00 (distance 0.123, 3 hits)"));
        assert!(text.contains("!! ALLERGIES: penicillin, latex"));
        assert!(text.contains("history: asthma"));
        assert!(text.contains("#7    2026-10-19 10:30 TODAY D1 (missing)"));
    }

    #[test]
    fn degraded_alert_says_record_missing() {
        let text = alert(&payload(None, Vec::new()));
        assert!(text.contains("no patient record"));
        assert!(!text.contains("ALLERGIES"));
    }

    #[test]
    fn appointment_flags() {
        let view = AppointmentView {
            appointment: Appointment {
                id: 1,
                patient: id("P9"),
                doctor: id("D1"),
                scheduled_at: at(18, 0),
                reason: "checkup".into(),
                status: AppointmentStatus::Scheduled,
            },
            patient_missing: true,
            doctor_missing: false,
            outside_availability: true,
        };
        let text = appointments(&[view]);
        assert!(text.lines().next().unwrap().starts_with("ID"));
        assert!(text.contains("checkup [patient missing, outside hours]"));
        assert!(text.contains("scheduled"));
    }

    #[test]
    fn empty_lists() {
        assert_eq!(patients(&[]), "No patients registered\n");
        assert_eq!(doctors(&[]), "No doctors registered\n");
    }
}
