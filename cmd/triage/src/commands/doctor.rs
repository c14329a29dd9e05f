//! Doctor roster commands.

use clap::{Args, Subcommand};

use facetriage_cli::render;
use facetriage_records::{Availability, Doctor};

use super::{
    open_stores, output_result, output_table, parse_days, parse_identity, parse_time,
    print_success, print_warning,
};
use crate::Cli;

/// Manage doctors and their weekly availability.
#[derive(Args)]
pub struct DoctorCommand {
    #[command(subcommand)]
    command: DoctorSubcommand,
}

#[derive(Subcommand)]
enum DoctorSubcommand {
    /// Register a doctor
    Add {
        /// Doctor identity
        identity: String,
        #[arg(long)]
        specialty: String,
        /// Phone, pager or email
        #[arg(long)]
        contact: String,
        /// Available days, e.g. Mon,Wed,Fri
        #[arg(long)]
        days: String,
        /// Start of consultation hours (HH:MM)
        #[arg(long, default_value = "09:00")]
        start: String,
        /// End of consultation hours (HH:MM)
        #[arg(long, default_value = "17:00")]
        end: String,
    },
    /// Update a doctor; unset flags keep their value
    Update {
        identity: String,
        #[arg(long)]
        specialty: Option<String>,
        #[arg(long)]
        contact: Option<String>,
        #[arg(long)]
        days: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Delete a doctor; appointments are kept
    #[command(alias = "rm")]
    Remove { identity: String },
    /// Show one doctor
    Get { identity: String },
    /// List the roster with availability
    #[command(alias = "ls")]
    List,
    /// Show a doctor's scheduled appointments
    Schedule { identity: String },
}

impl DoctorCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (_, stores) = open_stores(cli)?;
        let records = &stores.records;

        match &self.command {
            DoctorSubcommand::Add {
                identity,
                specialty,
                contact,
                days,
                start,
                end,
            } => {
                let doctor = Doctor {
                    identity: parse_identity(identity)?,
                    specialty: specialty.clone(),
                    contact: contact.clone(),
                    availability: Availability {
                        days: parse_days(days)?,
                        start: parse_time(start)?,
                        end: parse_time(end)?,
                    },
                };
                let d = records.create_doctor(doctor)?;
                print_success(&format!("Doctor {} added ({})", d.identity, d.availability));
                Ok(())
            }

            DoctorSubcommand::Update {
                identity,
                specialty,
                contact,
                days,
                start,
                end,
            } => {
                let Some(mut d) = records.get_doctor(identity) else {
                    anyhow::bail!("doctor {identity:?} not found");
                };
                if let Some(s) = specialty {
                    d.specialty = s.clone();
                }
                if let Some(c) = contact {
                    d.contact = c.clone();
                }
                if let Some(days) = days {
                    d.availability.days = parse_days(days)?;
                }
                if let Some(t) = start {
                    d.availability.start = parse_time(t)?;
                }
                if let Some(t) = end {
                    d.availability.end = parse_time(t)?;
                }
                let d = records.update_doctor(d)?;
                print_success(&format!("Doctor {} updated ({})", d.identity, d.availability));
                Ok(())
            }

            DoctorSubcommand::Remove { identity } => {
                let d = records.delete_doctor(&parse_identity(identity)?)?;
                let open = records
                    .list_appointments()
                    .iter()
                    .filter(|v| v.doctor_missing && v.appointment.status.is_open())
                    .filter(|v| v.appointment.doctor == d.identity)
                    .count();
                if open > 0 {
                    print_warning(&format!(
                        "{open} scheduled appointment(s) now reference a missing doctor"
                    ));
                }
                print_success(&format!("Doctor {} deleted", d.identity));
                Ok(())
            }

            DoctorSubcommand::Get { identity } => match records.get_doctor(identity) {
                Some(d) => output_result(cli, &d),
                None => anyhow::bail!("doctor {identity:?} not found"),
            },

            DoctorSubcommand::List => {
                let list = records.list_doctors();
                output_table(cli, &list, render::doctors(&list))
            }

            DoctorSubcommand::Schedule { identity } => {
                if records.get_doctor(identity).is_none() {
                    print_warning(&format!("doctor {identity:?} is not registered"));
                }
                let list: Vec<_> = records
                    .list_appointments()
                    .into_iter()
                    .filter(|v| {
                        v.appointment.doctor.as_str() == identity
                            && v.appointment.status.is_open()
                    })
                    .collect();
                output_table(cli, &list, render::appointments(&list))
            }
        }
    }
}
