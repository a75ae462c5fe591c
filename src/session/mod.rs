use crate::api::DetectionBackend;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub mod display;
pub mod event;
pub mod launcher;
pub mod subscriber;

pub use display::{Alert, DisplayState};
pub use event::{Detection, LiveUpdateEvent, Status, StatusSnapshot};
pub use launcher::{LaunchError, VideoUpload};
pub use subscriber::{LiveUpdateSubscriber, SubscriberEvent, SubscriberState};

pub const START_LABEL: &str = "Start Detection";
pub const BUSY_LABEL: &str = "Processing...";
pub const CONNECTION_LOST: &str = "Connection to server lost";
const DETECTION_FAILED: &str = "Detection failed";

/// State of the user-facing controls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controls {
    pub start_enabled: bool,
    pub start_label: &'static str,
    pub dashboard_visible: bool,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            start_enabled: false,
            start_label: START_LABEL,
            dashboard_visible: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSummary {
    pub result: Option<bool>,
    pub drowning_count: u64,
    pub total_detections: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(CompletionSummary),
    Errored(String),
    Lost(String),
}

/// Result of processing one subscriber event
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Progress { alerts: Vec<Alert> },
    Finished { alerts: Vec<Alert>, outcome: Outcome },
}

impl Step {
    pub fn alerts(&self) -> &[Alert] {
        match self {
            Step::Progress { alerts } | Step::Finished { alerts, .. } => alerts,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("A live session is already running: {0}")]
    AlreadyRunning(String),

    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// Wires user actions to the launcher, subscriber and display updater.
///
/// Holds the only reference to the current session and its connection.
pub struct SessionController {
    backend: Arc<dyn DetectionBackend>,
    subscriber: LiveUpdateSubscriber,
    current_session: Option<String>,
    selection: Option<PathBuf>,
    display: DisplayState,
    controls: Controls,
}

impl SessionController {
    pub fn new(backend: Arc<dyn DetectionBackend>) -> Self {
        Self {
            backend,
            subscriber: LiveUpdateSubscriber::new(),
            current_session: None,
            selection: None,
            display: DisplayState::default(),
            controls: Controls::default(),
        }
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn current_session(&self) -> Option<&str> {
        self.current_session.as_deref()
    }

    pub fn subscriber_state(&self) -> SubscriberState {
        self.subscriber.state()
    }

    pub fn selection(&self) -> Option<&Path> {
        self.selection.as_deref()
    }

    pub fn select_video(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        tracing::info!("Selected video {}", path.display());
        self.selection = Some(path);
        self.controls.start_enabled = true;
        self.controls.dashboard_visible = false;
    }

    /// Start a live session for the selected video.
    pub async fn start(&mut self) -> Result<String, SessionError> {
        if self.selection.is_none() {
            let err = LaunchError::NoVideoSelected;
            tracing::error!("{}", err);
            return Err(err.into());
        }

        if let Some(running) = &self.current_session {
            if !self.controls.start_enabled {
                return Err(SessionError::AlreadyRunning(running.clone()));
            }
        }

        let was_visible = self.controls.dashboard_visible;
        let previous = std::mem::take(&mut self.display);
        self.controls.dashboard_visible = true;
        self.controls.start_enabled = false;
        self.controls.start_label = BUSY_LABEL;

        match launcher::launch(self.backend.as_ref(), self.selection.as_deref()).await {
            Ok(session_id) => {
                self.current_session = Some(session_id.clone());
                self.subscriber.open(self.backend.clone(), &session_id).await;
                Ok(session_id)
            }
            // Nothing was sent, so the dashboard stays as it was
            Err(err) if err.is_local() => {
                tracing::error!("Cannot start live detection: {}", err);
                self.display = previous;
                self.controls.dashboard_visible = was_visible;
                self.restore_idle();
                Err(err.into())
            }
            Err(err) => {
                tracing::error!("Live detection error: {}", err);
                self.display.show_error(err.to_string());
                self.restore_idle();
                Err(err.into())
            }
        }
    }

    /// Process the next stream event. `None` when no session is streaming.
    ///
    /// Cancel safe: once an event is received it is fully applied before
    /// anything else is awaited.
    pub async fn next_step(&mut self) -> Option<Step> {
        let event = self.subscriber.next().await?;

        let step = match event {
            SubscriberEvent::Update { event, terminal } => {
                let (display, alerts) = display::update(std::mem::take(&mut self.display), &event);
                self.display = display;
                for alert in &alerts {
                    log_alert(alert);
                }

                match terminal {
                    None => Step::Progress { alerts },
                    Some(Status::Completed) => {
                        let summary = self.handle_completed(&event);
                        Step::Finished {
                            alerts,
                            outcome: Outcome::Completed(summary),
                        }
                    }
                    Some(_) => {
                        let message = self.handle_error(&event);
                        Step::Finished {
                            alerts,
                            outcome: Outcome::Errored(message),
                        }
                    }
                }
            }
            SubscriberEvent::Lost(reason) => {
                tracing::error!("EventSource closed without a final status: {}", reason);
                self.show_error(CONNECTION_LOST);
                self.finish_session();
                Step::Finished {
                    alerts: Vec::new(),
                    outcome: Outcome::Lost(reason),
                }
            }
        };

        Some(step)
    }

    /// Manual reset: tear everything down regardless of the current state.
    pub async fn reset(&mut self) {
        self.selection = None;
        self.controls.start_enabled = false;
        self.controls.dashboard_visible = false;

        self.subscriber.close().await;
        if let Some(session_id) = self.current_session.take() {
            tracing::info!("Reset while session {} was active", session_id);
        }
        self.controls.start_label = START_LABEL;
    }

    fn handle_completed(&mut self, event: &LiveUpdateEvent) -> CompletionSummary {
        tracing::info!("Detection completed: {:?}", event.result);
        self.display.show_completed();

        let summary = CompletionSummary {
            result: event.result,
            drowning_count: self.display.drowning_count,
            total_detections: event.total_detections,
        };

        self.finish_session();
        summary
    }

    fn handle_error(&mut self, event: &LiveUpdateEvent) -> String {
        let message = event
            .error
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DETECTION_FAILED.to_string());
        tracing::error!("Detection error: {}", message);
        self.show_error(&message);
        self.finish_session();
        message
    }

    fn show_error(&mut self, message: &str) {
        tracing::error!("Error: {}", message);
        self.display.show_error(message);
    }

    fn finish_session(&mut self) {
        self.subscriber.release();
        self.current_session = None;
        self.restore_idle();
    }

    fn restore_idle(&mut self) {
        self.controls.start_enabled = self.selection.is_some();
        self.controls.start_label = START_LABEL;
    }
}

fn log_alert(alert: &Alert) {
    match alert {
        Alert::Drowning { frame, total } => {
            let frame = frame.map(|f| f.to_string()).unwrap_or_else(|| "?".to_string());
            tracing::warn!("DROWNING DETECTED! Frame: {}, Total Detections: {}", frame, total);
        }
        Alert::InstantDrowning {
            detection,
            high_confidence: true,
        } => {
            tracing::warn!(
                "HIGH CONFIDENCE DROWNING! Frame: {}, Confidence: {:.1}%",
                detection.frame,
                detection.confidence * 100.0
            );
        }
        Alert::InstantDrowning { detection, .. } => {
            tracing::info!(
                "Possible drowning at frame {} ({:.1}%)",
                detection.frame,
                detection.confidence * 100.0
            );
        }
    }
}
