use super::event::{Detection, LiveUpdateEvent, Status};
use std::collections::VecDeque;

pub const MAX_RECENT_DETECTIONS: usize = 10;
pub const INSTANT_ALERT_CONFIDENCE: f64 = 0.5;
pub const HIGH_CONFIDENCE: f64 = 0.7;

/// What the live dashboard currently shows.
///
/// Derived entirely from the event sequence; `drowning_count` is the
/// authoritative total while `detections` is only a recent window.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayState {
    pub progress: u32,
    pub current_frame: u64,
    pub total_frames: u64,
    pub drowning_count: u64,
    pub status: Status,
    pub error_message: Option<String>,
    /// Latest frame as delivered (base64 JPEG)
    pub frame_data: Option<String>,
    /// Bumped every time `frame_data` is replaced
    pub frame_revision: u64,
    /// Most recently delivered first
    pub detections: VecDeque<Detection>,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            progress: 0,
            current_frame: 0,
            total_frames: 0,
            drowning_count: 0,
            status: Status::Processing,
            error_message: None,
            frame_data: None,
            frame_revision: 0,
            detections: VecDeque::with_capacity(MAX_RECENT_DETECTIONS),
        }
    }
}

impl DisplayState {
    pub fn drowning_highlighted(&self) -> bool {
        self.drowning_count > 0
    }

    pub fn show_error(&mut self, message: impl Into<String>) {
        self.status = Status::Error;
        self.error_message = Some(message.into());
    }

    pub fn show_completed(&mut self) {
        self.status = Status::Completed;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// Rendered drowning total went up
    Drowning { frame: Option<u64>, total: u64 },
    /// A single detection crossed the instant-alert threshold
    InstantDrowning {
        detection: Detection,
        high_confidence: bool,
    },
}

/// Project one event onto the previous display state.
///
/// Fields missing from the event keep their previous value. Alerts are
/// returned in the order they were triggered.
pub fn update(previous: DisplayState, event: &LiveUpdateEvent) -> (DisplayState, Vec<Alert>) {
    let mut state = previous;
    let mut alerts = Vec::new();

    if let Some(progress) = event.progress {
        state.progress = progress;
    }
    if let Some(current_frame) = event.current_frame {
        state.current_frame = current_frame;
    }
    if let Some(total_frames) = event.total_frames {
        state.total_frames = total_frames;
    }

    if let Some(count) = event.drowning_count {
        let rendered = state.drowning_count;
        state.drowning_count = count;
        if count > rendered {
            alerts.push(Alert::Drowning {
                frame: event.current_frame,
                total: count,
            });
        }
    }

    if let Some(status) = &event.status {
        state.status = status.clone();
    }

    if let Some(frame_data) = &event.frame_data {
        if !frame_data.is_empty() {
            state.frame_data = Some(frame_data.clone());
            state.frame_revision += 1;
        }
    }

    if let Some(batch) = &event.recent_detections {
        for detection in batch {
            state.detections.push_front(detection.clone());
        }
        state.detections.truncate(MAX_RECENT_DETECTIONS);

        for detection in batch {
            if detection.is_drowning() && detection.confidence >= INSTANT_ALERT_CONFIDENCE {
                alerts.push(Alert::InstantDrowning {
                    detection: detection.clone(),
                    high_confidence: detection.confidence >= HIGH_CONFIDENCE,
                });
            }
        }
    }

    (state, alerts)
}
