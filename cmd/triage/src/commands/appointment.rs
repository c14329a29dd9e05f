//! Appointment commands.

use clap::{Args, Subcommand};

use facetriage_cli::render;
use facetriage_records::{AppointmentStatus, AppointmentUpdate, NewAppointment};

use super::{
    open_stores, output_result, output_table, parse_datetime, parse_identity, print_success,
    print_warning,
};
use crate::Cli;

/// Book and manage appointments.
#[derive(Args)]
pub struct AppointmentCommand {
    #[command(subcommand)]
    command: AppointmentSubcommand,
}

#[derive(Subcommand)]
enum AppointmentSubcommand {
    /// Book an appointment
    Book {
        #[arg(long)]
        patient: String,
        #[arg(long)]
        doctor: String,
        /// Date and time, YYYY-MM-DD HH:MM
        #[arg(long)]
        at: String,
        #[arg(long)]
        reason: String,
    },
    /// Reschedule or edit an appointment
    Update {
        id: u64,
        #[arg(long)]
        doctor: Option<String>,
        #[arg(long)]
        at: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Mark an appointment as completed
    Complete { id: u64 },
    /// Cancel an appointment (the record is kept)
    Cancel { id: u64 },
    /// Show one appointment
    Get { id: u64 },
    /// List appointments
    #[command(alias = "ls")]
    List {
        /// Only this patient's appointments
        #[arg(long)]
        patient: Option<String>,
        /// Include completed and canceled appointments
        #[arg(long)]
        all: bool,
    },
}

impl AppointmentCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (_, stores) = open_stores(cli)?;
        let records = &stores.records;

        match &self.command {
            AppointmentSubcommand::Book {
                patient,
                doctor,
                at,
                reason,
            } => {
                let a = records.create_appointment(NewAppointment {
                    patient: parse_identity(patient)?,
                    doctor: parse_identity(doctor)?,
                    scheduled_at: parse_datetime(at)?,
                    reason: reason.clone(),
                })?;
                if let Some(v) = records.get_appointment(a.id) {
                    if v.outside_availability {
                        print_warning(&format!(
                            "{} is outside {}'s consultation hours",
                            a.scheduled_at, a.doctor
                        ));
                    }
                }
                print_success(&format!(
                    "Appointment #{} booked: {} with {} at {}",
                    a.id, a.patient, a.doctor, a.scheduled_at
                ));
                Ok(())
            }

            AppointmentSubcommand::Update {
                id,
                doctor,
                at,
                reason,
            } => {
                let update = AppointmentUpdate {
                    doctor: doctor.as_deref().map(parse_identity).transpose()?,
                    scheduled_at: at.as_deref().map(parse_datetime).transpose()?,
                    reason: reason.clone(),
                    status: None,
                };
                let a = records.update_appointment(*id, update)?;
                print_success(&format!("Appointment #{} updated", a.id));
                Ok(())
            }

            AppointmentSubcommand::Complete { id } => {
                let update = AppointmentUpdate {
                    status: Some(AppointmentStatus::Completed),
                    ..Default::default()
                };
                let a = records.update_appointment(*id, update)?;
                print_success(&format!("Appointment #{} completed", a.id));
                Ok(())
            }

            AppointmentSubcommand::Cancel { id } => {
                let a = records.cancel_appointment(*id)?;
                print_success(&format!("Appointment #{} canceled", a.id));
                Ok(())
            }

            AppointmentSubcommand::Get { id } => match records.get_appointment(*id) {
                Some(v) => output_result(cli, &v),
                None => anyhow::bail!("appointment #{id} not found"),
            },

            AppointmentSubcommand::List { patient, all } => {
                let list: Vec<_> = match patient {
                    Some(p) => records.appointments_for(p),
                    None => records.list_appointments(),
                }
                .into_iter()
                .filter(|v| *all || v.appointment.status.is_open())
                .collect();
                output_table(cli, &list, render::appointments(&list))
            }
        }
    }
}
