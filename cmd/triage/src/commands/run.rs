//! Live triage.

use std::sync::Arc;

use clap::Args;
use tracing::{debug, warn};

use facetriage_capture::Pipeline;
use facetriage_cli::render;
use facetriage_records::RecordStore;
use facetriage_triage::{AlertPayload, ChannelSink, TriageSession};

use super::capture::{encoder, scene_device};
use super::{open_stores, print_info, print_success, print_verbose, print_warning};
use crate::Cli;

/// Alerts waiting for the console before new ones are dropped.
const ALERT_BUFFER: usize = 16;

/// Start live triage.
///
/// Recognized patients are shown with their allergies and upcoming
/// appointments. Runs until the scene ends or Ctrl-C.
#[derive(Args)]
pub struct RunCommand {
    /// Scene file to replay as the camera (YAML or JSON)
    #[arg(long)]
    scene: String,
}

impl RunCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (cfg, stores) = open_stores(cli)?;
        if stores.templates.is_empty() {
            print_warning("No faces enrolled; every face will be unknown");
        }

        let pipeline = Pipeline::new(
            scene_device(&cfg, &self.scene)?,
            encoder(&cfg),
            stores.matcher.clone(),
            cfg.capture.clone(),
        )?;
        let (sink, mut alerts) = ChannelSink::new(ALERT_BUFFER);
        let mut session =
            TriageSession::new(&cfg.debounce, stores.records.clone(), Arc::new(sink))?;

        let handle = pipeline.start()?;
        print_info("Triage running, press Ctrl-C to stop");
        let events = handle.events();
        let cancel = handle.cancel_token();
        let token = cancel.clone();
        let triage = tokio::task::spawn_blocking(move || session.run(&events, &token));

        loop {
            tokio::select! {
                alert = alerts.recv() => match alert {
                    Some(alert) => show(cli, &stores.records, &alert)?,
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    debug!("interrupted");
                    cancel.cancel();
                    break;
                }
            }
        }

        let stats = triage.await??;
        let report = tokio::task::spawn_blocking(move || handle.stop()).await?;
        while let Some(alert) = alerts.try_recv() {
            show(cli, &stores.records, &alert)?;
        }

        print_verbose(cli, &format!("Capture: {:?}", report.stats));
        print_success(&format!(
            "Triage stopped ({:?}): {} face(s), {} unknown, {} alert(s), {} degraded",
            report.reason, stats.events, stats.unknown, stats.alerts, stats.degraded_alerts
        ));
        Ok(())
    }
}

/// Prints one alert and records the visit.
fn show(cli: &Cli, records: &RecordStore, alert: &AlertPayload) -> anyhow::Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string(alert)?);
    } else {
        print!("{}", render::alert(alert));
    }
    if !alert.record_missing() {
        if let Err(e) = records.touch_patient(&alert.identity, alert.confirmed_at) {
            warn!(identity = %alert.identity, error = %e, "could not record visit");
        }
    }
    Ok(())
}
