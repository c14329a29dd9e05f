//! Patient record commands.

use chrono::Local;
use clap::{Args, Subcommand};

use facetriage_records::Patient;

use super::{
    open_stores, output_result, output_table, parse_identity, print_success, print_warning,
    split_list,
};
use crate::Cli;
use facetriage_cli::render;

/// Manage patient records.
#[derive(Args)]
pub struct PatientCommand {
    #[command(subcommand)]
    command: PatientSubcommand,
}

/// Demographic and clinical fields shared by add and update.
#[derive(Args, Clone, Default)]
pub struct PatientFields {
    /// Age in years
    #[arg(long)]
    pub age: Option<u32>,
    /// Gender
    #[arg(long)]
    pub gender: Option<String>,
    /// Comma-separated allergies ("none" for no known allergies)
    #[arg(long)]
    pub allergies: Option<String>,
    /// Condition history
    #[arg(long)]
    pub history: Option<String>,
}

impl PatientFields {
    /// Copies the given fields onto `p`.
    pub fn apply(&self, p: &mut Patient) {
        if let Some(age) = self.age {
            p.age = Some(age);
        }
        if let Some(gender) = &self.gender {
            p.gender = gender.clone();
        }
        if let Some(allergies) = &self.allergies {
            p.allergies = split_list(allergies);
        }
        if let Some(history) = &self.history {
            p.history = history.clone();
        }
    }
}

#[derive(Subcommand)]
enum PatientSubcommand {
    /// Add a patient record (without a face template; see `register`)
    Add {
        /// Patient identity
        identity: String,
        #[command(flatten)]
        fields: PatientFields,
    },
    /// Update fields of a patient record
    Update {
        identity: String,
        #[command(flatten)]
        fields: PatientFields,
    },
    /// Delete a patient record; appointments are kept
    #[command(alias = "rm")]
    Remove { identity: String },
    /// Show one patient with their appointments
    Get { identity: String },
    /// List all patients
    #[command(alias = "ls")]
    List,
}

impl PatientCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (_, stores) = open_stores(cli)?;
        let records = &stores.records;

        match &self.command {
            PatientSubcommand::Add { identity, fields } => {
                let mut p = Patient::new(parse_identity(identity)?);
                fields.apply(&mut p);
                p.last_visit = Some(Local::now().naive_local());
                let p = records.create_patient(p)?;
                if !stores.templates.snapshot().contains(p.identity.as_str()) {
                    print_warning(&format!(
                        "{} has no face template; run `triage enroll {}`",
                        p.identity, p.identity
                    ));
                }
                print_success(&format!("Patient {} added", p.identity));
                Ok(())
            }

            PatientSubcommand::Update { identity, fields } => {
                let Some(mut p) = records.get_patient(identity) else {
                    anyhow::bail!("patient {identity:?} not found");
                };
                fields.apply(&mut p);
                let p = records.update_patient(p)?;
                print_success(&format!("Patient {} updated", p.identity));
                Ok(())
            }

            PatientSubcommand::Remove { identity } => {
                let id = parse_identity(identity)?;
                records.delete_patient(&id)?;
                let open = records
                    .appointments_for(identity)
                    .iter()
                    .filter(|v| v.appointment.status.is_open())
                    .count();
                if open > 0 {
                    print_warning(&format!(
                        "{open} scheduled appointment(s) now reference a missing patient"
                    ));
                }
                if stores.templates.snapshot().contains(identity) {
                    print_warning(&format!(
                        "face template kept; run `triage unenroll {identity}` to remove it"
                    ));
                }
                print_success(&format!("Patient {} deleted", id));
                Ok(())
            }

            PatientSubcommand::Get { identity } => {
                let Some(p) = records.get_patient(identity) else {
                    anyhow::bail!("patient {identity:?} not found");
                };
                let appointments = records.appointments_for(identity);
                if cli.json || cli.output.is_some() {
                    return output_result(
                        cli,
                        &serde_json::json!({ "patient": p, "appointments": appointments }),
                    );
                }
                output_result(cli, &p)?;
                print!("{}", render::appointments(&appointments));
                Ok(())
            }

            PatientSubcommand::List => {
                let list = records.list_patients();
                output_table(cli, &list, render::patients(&list))
            }
        }
    }
}
