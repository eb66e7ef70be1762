mod capture;
mod config;
mod devices;
mod orchestrator;
mod overlay;
mod prompt;
mod recognize;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use devices::HardwareDevices;
use facecam_core::{CascadeDetector, DatasetStore, LbphRecognizer};
use facecam_hw::Camera;
use orchestrator::{Orchestrator, Outcome};
use overlay::Overlay;
use prompt::ConsolePrompt;
use serde::Serialize;
use std::io::Write;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "facecam", version, about = "Webcam face enrollment and LBPH recognition")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize enrolled faces, or offer enrollment when none exist (default)
    Run,
    /// Capture face samples for a new identity, then recognize
    Enroll {
        /// Identity name; becomes the directory name in the dataset
        name: String,
    },
    /// Train on the enrolled faces and recognize
    Recognize,
    /// List enrolled identities
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List V4L2 capture devices
    Devices,
}

enum Session {
    Run,
    Enroll(String),
    Recognize,
}

#[derive(Serialize)]
struct IdentitySummary {
    name: String,
    samples: usize,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    tracing::debug!(?config, "configuration loaded");

    let store = DatasetStore::open(&config.dataset_dir)
        .with_context(|| format!("failed to open dataset at {}", config.dataset_dir.display()))?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => session(&config, &store, Session::Run),
        Commands::Enroll { name } => session(&config, &store, Session::Enroll(name)),
        Commands::Recognize => {
            if !store.has_identities()? {
                bail!("no faces enrolled in {}; run `facecam enroll <NAME>` first", store.root().display());
            }
            session(&config, &store, Session::Recognize)
        }
        Commands::List { json } => {
            list(&store, json, &mut std::io::stdout().lock())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Devices => {
            list_devices();
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn session(config: &Config, store: &DatasetStore, which: Session) -> Result<ExitCode> {
    let mut detector = CascadeDetector::load(&config.cascade_path)
        .with_context(|| format!("failed to load face cascade {}", config.cascade_path.display()))?;
    tracing::info!(path = %config.cascade_path.display(), "face cascade loaded");

    let overlay = Overlay::load(config.font_path.as_deref());
    tracing::debug!(font = overlay.has_font(), "overlay ready");
    let devices = HardwareDevices::new(config.camera_device.as_str());
    let mut orchestrator = Orchestrator::new(store, &mut detector, &overlay, &devices, ConsolePrompt::stdin());

    let outcome = match which {
        Session::Run => orchestrator.run::<LbphRecognizer>()?,
        Session::Enroll(name) => orchestrator.enroll::<LbphRecognizer>(&name)?,
        Session::Recognize => orchestrator.recognize::<LbphRecognizer>()?,
    };

    Ok(match outcome {
        Outcome::Recognized { labels, report } => {
            tracing::info!(
                identities = labels.len(),
                frames = report.frames,
                faces = report.faces,
                stop = ?report.stop,
                "session finished"
            );
            ExitCode::SUCCESS
        }
        Outcome::Cancelled | Outcome::StreamEnded => ExitCode::SUCCESS,
        Outcome::EnrollmentRejected(name) => {
            tracing::debug!(identity = %name, "enrollment rejected");
            ExitCode::FAILURE
        }
        Outcome::TrainingFailed | Outcome::CameraUnavailable => ExitCode::FAILURE,
    })
}

fn list(store: &DatasetStore, json: bool, out: &mut impl Write) -> Result<()> {
    let mut summaries = Vec::new();
    for name in store.identities()? {
        let samples = store.load_samples(&name)?.len();
        summaries.push(IdentitySummary { name, samples });
    }

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&summaries)?)?;
        return Ok(());
    }
    if summaries.is_empty() {
        writeln!(out, "No faces enrolled in {}", store.root().display())?;
        return Ok(());
    }
    for s in &summaries {
        writeln!(out, "{:<24} {:>5} samples", s.name, s.samples)?;
    }
    Ok(())
}

fn list_devices() {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No V4L2 capture devices found");
        return;
    }
    for d in devices {
        println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
    }
}
