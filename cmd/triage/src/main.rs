//! Triage console - face-recognition check-in for a small clinic.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    AppointmentCommand, CheckCommand, ConfigCommand, DoctorCommand, EnrollCommand,
    PatientCommand, RegisterCommand, RunCommand, TemplatesCommand, UnenrollCommand,
};

/// Triage console - recognizes returning patients at the front desk.
///
/// Faces are matched against enrolled templates; a confirmed match shows
/// the patient's allergies and upcoming appointments. The console also
/// manages patients, doctors and appointments.
///
/// Configuration is stored in ~/.facetriage/triage/config.yaml.
#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "Face-recognition triage console")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.facetriage/triage/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage console configuration
    Config(ConfigCommand),
    /// Manage patient records
    Patient(PatientCommand),
    /// Manage doctors and their availability
    Doctor(DoctorCommand),
    /// Book and manage appointments
    Appointment(AppointmentCommand),
    /// Register a new patient and enroll their face
    Register(RegisterCommand),
    /// Enroll face embeddings for an identity
    Enroll(EnrollCommand),
    /// Remove an identity's face template
    Unenroll(UnenrollCommand),
    /// List enrolled face templates
    Templates(TemplatesCommand),
    /// Report templates without records and records without templates
    Check(CheckCommand),
    /// Start live triage
    Run(RunCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Config(cmd) => cmd.run(&cli).await,
        Commands::Patient(cmd) => cmd.run(&cli).await,
        Commands::Doctor(cmd) => cmd.run(&cli).await,
        Commands::Appointment(cmd) => cmd.run(&cli).await,
        Commands::Register(cmd) => cmd.run(&cli).await,
        Commands::Enroll(cmd) => cmd.run(&cli).await,
        Commands::Unenroll(cmd) => cmd.run(&cli).await,
        Commands::Templates(cmd) => cmd.run(&cli).await,
        Commands::Check(cmd) => cmd.run(&cli).await,
        Commands::Run(cmd) => cmd.run(&cli).await,
    }
}
