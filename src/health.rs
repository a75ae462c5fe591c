use crate::api::DetectionBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Passive backend availability indicator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendHealth {
    Unknown,
    Available { active_sessions: u64 },
    Unavailable,
}

impl BackendHealth {
    pub fn is_available(&self) -> bool {
        matches!(self, BackendHealth::Available { .. })
    }
}

pub async fn check_backend_health(backend: &dyn DetectionBackend) -> BackendHealth {
    match backend.health().await {
        Ok(report) => {
            tracing::debug!(
                "Backend is running and ready, active sessions: {}",
                report.active_sessions
            );
            BackendHealth::Available {
                active_sessions: report.active_sessions,
            }
        }
        Err(e) => {
            tracing::warn!("Backend not available: {}", e);
            BackendHealth::Unavailable
        }
    }
}

/// Polls `/health` on a fixed interval and publishes the result.
pub struct HealthMonitor {
    receiver: watch::Receiver<BackendHealth>,
    task: Option<JoinHandle<()>>,
}

impl HealthMonitor {
    /// Starts polling immediately, then every `period`.
    pub fn start(backend: Arc<dyn DetectionBackend>, period: Duration) -> Self {
        let (sender, receiver) = watch::channel(BackendHealth::Unknown);

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let health = check_backend_health(backend.as_ref()).await;
                sender.send_if_modified(|current| {
                    if *current == health {
                        false
                    } else {
                        *current = health;
                        true
                    }
                });
                if sender.is_closed() {
                    break;
                }
            }
        });

        Self {
            receiver,
            task: Some(task),
        }
    }

    pub fn current(&self) -> BackendHealth {
        self.receiver.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BackendHealth> {
        self.receiver.clone()
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
