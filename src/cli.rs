use crate::api::{DetectionBackend, HttpBackend};
use crate::config::{self, AppConfig};
use crate::dashboard;
use crate::health::{check_backend_health, BackendHealth, HealthMonitor};
use crate::session::{display, DisplayState, Outcome, SessionController, Step, VideoUpload};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "swimwatch", version, about = "Drowning detection client")]
pub struct Cli {
    /// Config file (defaults to ./swimwatch.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL, overrides config and SWIMWATCH_API_URL
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload a video and follow live detection until it finishes
    Live {
        video: PathBuf,
        /// Write the latest annotated frame here
        #[arg(long)]
        frame_output: Option<PathBuf>,
    },
    /// Upload a video and wait for a single verdict
    Detect { video: PathBuf },
    /// Show the current status of a session
    Status { session_id: String },
    /// Check whether the backend is reachable
    Health,
}

enum Signal {
    Step(Option<Step>),
    Interrupted,
}

pub async fn execute(cli: Cli) -> ExitCode {
    let mut config = match config::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    config::apply_overrides(&mut config, config::env_api_url(), cli.api_url.clone());

    let backend: Arc<dyn DetectionBackend> = match HttpBackend::new(&config) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Live {
            video,
            frame_output,
        } => {
            let frame_output = frame_output.or_else(|| config.frame_output.clone());
            run_live(backend, &config, video, frame_output.as_deref()).await
        }
        Command::Detect { video } => run_detect(backend.as_ref(), &video).await,
        Command::Status { session_id } => run_status(backend.as_ref(), &session_id).await,
        Command::Health => run_health(backend.as_ref()).await,
    }
}

async fn run_live(
    backend: Arc<dyn DetectionBackend>,
    config: &AppConfig,
    video: PathBuf,
    frame_output: Option<&Path>,
) -> ExitCode {
    let monitor = HealthMonitor::start(
        backend.clone(),
        Duration::from_secs(config.health_interval_secs),
    );
    let mut health = monitor.subscribe();

    let mut controller = SessionController::new(backend);
    controller.select_video(video);
    if controller.start().await.is_err() {
        println!("{}", dashboard::render(controller.display(), &monitor.current()));
        return ExitCode::FAILURE;
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut written_revision = 0;
    let outcome = loop {
        let signal = tokio::select! {
            step = controller.next_step() => Signal::Step(step),
            _ = &mut ctrl_c => Signal::Interrupted,
            Ok(()) = health.changed() => {
                println!("{}", dashboard::health_indicator(&health.borrow_and_update()));
                continue;
            }
        };

        let step = match signal {
            Signal::Step(Some(step)) => step,
            Signal::Step(None) => break None,
            Signal::Interrupted => {
                tracing::info!("Interrupted, resetting session");
                controller.reset().await;
                break None;
            }
        };

        for alert in step.alerts() {
            println!("{}", dashboard::describe_alert(alert));
        }

        let display = controller.display();
        if let Some(path) = frame_output {
            if display.frame_revision != written_revision {
                written_revision = display.frame_revision;
                if let Err(e) = dashboard::write_frame(display, path) {
                    tracing::warn!("Failed to write frame to {}: {}", path.display(), e);
                }
            }
        }

        match step {
            Step::Progress { .. } => println!("{}", dashboard::status_line(display)),
            Step::Finished { outcome, .. } => break Some(outcome),
        }
    };

    println!("{}", dashboard::render(controller.display(), &monitor.current()));

    match outcome {
        Some(outcome) => {
            println!("{}", dashboard::describe_outcome(&outcome));
            if matches!(outcome, Outcome::Completed(_)) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        None => ExitCode::FAILURE,
    }
}

async fn run_detect(backend: &dyn DetectionBackend, video: &Path) -> ExitCode {
    let upload = match VideoUpload::from_path(video).await {
        Ok(upload) => upload,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match backend.detect(&upload).await {
        Ok(verdict) => {
            let headline = if verdict.drowning_detected {
                "Drowning Detected!"
            } else {
                "No Drowning Detected"
            };
            println!("{}", headline);
            if let Some(message) = verdict.message {
                tracing::info!("Backend says: {}", message);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Detection error: {}", e);
            println!("Error during detection");
            ExitCode::FAILURE
        }
    }
}

async fn run_status(backend: &dyn DetectionBackend, session_id: &str) -> ExitCode {
    match backend.detection_status(session_id).await {
        Ok(snapshot) => {
            let (mut display, _) = display::update(DisplayState::default(), &snapshot.as_event());
            if let Some(error) = snapshot.error {
                display.show_error(error);
            }
            println!("{}", dashboard::render(&display, &BackendHealth::Unknown));
            if let Some(result) = snapshot.result {
                println!("Result: {}", if result { "drowning" } else { "no drowning" });
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Status request failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_health(backend: &dyn DetectionBackend) -> ExitCode {
    let health = check_backend_health(backend).await;
    println!("{}", dashboard::health_indicator(&health));
    if health.is_available() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
