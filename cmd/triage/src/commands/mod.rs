//! CLI commands module.

mod appointment;
mod capture;
mod config;
mod doctor;
mod enroll;
mod patient;
mod run;
mod util;

pub use appointment::AppointmentCommand;
pub use config::ConfigCommand;
pub use doctor::DoctorCommand;
pub use enroll::{CheckCommand, EnrollCommand, RegisterCommand, TemplatesCommand, UnenrollCommand};
pub use patient::PatientCommand;
pub use run::RunCommand;

// Re-export utils for use in commands
pub(crate) use util::*;
