//! Face enrollment and template commands.

use chrono::Local;
use clap::Args;
use serde::Serialize;
use tracing::warn;

use facetriage_capture::capture_enrollment;
use facetriage_cli::AppConfig;
use facetriage_records::Patient;

use super::capture::{encoder, scene_device, with_ctrl_c};
use super::patient::PatientFields;
use super::{
    open_stores, output_result, parse_identity, print_info, print_success, print_verbose,
    print_warning,
};
use crate::Cli;

/// Captures enrollment embeddings from a scene, honoring Ctrl-C.
async fn capture_faces(cli: &Cli, cfg: &AppConfig, scene: &str) -> anyhow::Result<Vec<Vec<f32>>> {
    let device = scene_device(cfg, scene)?;
    let encoder = encoder(cfg);
    let enrollment = cfg.enrollment.clone();
    let capture = cfg.capture.clone();
    print_info(&format!(
        "Look at the camera: capturing {} image(s)",
        enrollment.images
    ));
    let embeddings = with_ctrl_c(move |cancel| {
        capture_enrollment(
            device.as_ref(),
            encoder.as_ref(),
            &enrollment,
            &capture,
            &cancel,
        )
    })
    .await??;
    print_verbose(cli, &format!("Captured {} embedding(s)", embeddings.len()));
    Ok(embeddings)
}

/// Register a new patient: capture their face, then save the record and
/// template together.
#[derive(Args)]
pub struct RegisterCommand {
    /// Patient identity
    identity: String,
    /// Scene file to capture from (YAML or JSON)
    #[arg(long)]
    scene: String,
    #[command(flatten)]
    fields: PatientFields,
}

impl RegisterCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (cfg, stores) = open_stores(cli)?;
        let id = parse_identity(&self.identity)?;
        if stores.records.get_patient(id.as_str()).is_some() {
            anyhow::bail!("patient {id} is already registered");
        }
        if stores.templates.snapshot().contains(id.as_str()) {
            anyhow::bail!("{id} is already enrolled; use `triage enroll --replace`");
        }

        let embeddings = capture_faces(cli, &cfg, &self.scene).await?;

        let mut p = Patient::new(id.clone());
        self.fields.apply(&mut p);
        p.last_visit = Some(Local::now().naive_local());
        stores.records.create_patient(p)?;
        if let Err(e) = stores.templates.enroll(id.clone(), embeddings) {
            // Keep record and template in step.
            if let Err(rollback) = stores.records.delete_patient(&id) {
                warn!(identity = %id, error = %rollback, "rollback of patient record failed");
            }
            return Err(e.into());
        }
        print_success(&format!("Patient {id} registered and enrolled"));
        Ok(())
    }
}

/// Enroll face embeddings for an identity.
#[derive(Args)]
pub struct EnrollCommand {
    /// Identity to enroll
    identity: String,
    /// Scene file to capture from (YAML or JSON)
    #[arg(long)]
    scene: String,
    /// Replace an existing template
    #[arg(long, conflicts_with = "append")]
    replace: bool,
    /// Add embeddings to an existing template
    #[arg(long)]
    append: bool,
}

impl EnrollCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (cfg, stores) = open_stores(cli)?;
        let id = parse_identity(&self.identity)?;
        let enrolled = stores.templates.snapshot().contains(id.as_str());
        if enrolled && !(self.replace || self.append) {
            anyhow::bail!("{id} is already enrolled; use --replace or --append");
        }
        if !enrolled && (self.replace || self.append) {
            anyhow::bail!("{id} is not enrolled");
        }

        let embeddings = capture_faces(cli, &cfg, &self.scene).await?;
        if self.replace {
            stores.templates.replace(&id, embeddings)?;
        } else if self.append {
            stores.templates.append(&id, embeddings)?;
        } else {
            stores.templates.enroll(id.clone(), embeddings)?;
        }
        if stores.records.get_patient(id.as_str()).is_none() {
            print_warning(&format!(
                "{id} has no patient record; alerts will be degraded"
            ));
        }
        print_success(&format!("{id} enrolled"));
        Ok(())
    }
}

/// Remove an identity's face template.
#[derive(Args)]
pub struct UnenrollCommand {
    identity: String,
}

impl UnenrollCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (_, stores) = open_stores(cli)?;
        let id = parse_identity(&self.identity)?;
        stores.templates.remove(&id)?;
        print_success(&format!("{id} unenrolled"));
        Ok(())
    }
}

#[derive(Serialize)]
struct TemplateRow {
    identity: String,
    seq: u64,
    embeddings: usize,
}

/// List enrolled face templates.
#[derive(Args)]
pub struct TemplatesCommand {}

impl TemplatesCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (_, stores) = open_stores(cli)?;
        let snapshot = stores.templates.snapshot();
        let rows: Vec<TemplateRow> = snapshot
            .templates()
            .map(|t| TemplateRow {
                identity: t.identity.to_string(),
                seq: t.seq,
                embeddings: t.embeddings.len(),
            })
            .collect();
        print_info(&format!(
            "{} template(s), dimension {}",
            rows.len(),
            snapshot.dim()
        ));
        output_result(cli, &rows)
    }
}

#[derive(Serialize)]
struct CheckReport {
    templates_without_record: Vec<String>,
    records_without_template: Vec<String>,
    dangling_appointments: Vec<u64>,
}

/// Report data-quality issues between the stores.
#[derive(Args)]
pub struct CheckCommand {}

impl CheckCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (_, stores) = open_stores(cli)?;
        let (no_record, no_template) = stores.orphans();
        let dangling: Vec<u64> = stores
            .records
            .list_appointments()
            .iter()
            .filter(|v| v.is_dangling())
            .map(|v| v.appointment.id)
            .collect();
        let report = CheckReport {
            templates_without_record: no_record,
            records_without_template: no_template,
            dangling_appointments: dangling,
        };
        let clean = report.templates_without_record.is_empty()
            && report.records_without_template.is_empty()
            && report.dangling_appointments.is_empty();
        if clean {
            print_success("Templates and records are consistent");
            return Ok(());
        }
        print_warning("Data-quality issues found");
        output_result(cli, &report)
    }
}
