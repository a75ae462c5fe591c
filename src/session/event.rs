use serde::{Deserialize, Serialize};

/// Processing state reported by the backend.
///
/// Unknown values are kept verbatim so they can still be shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Processing,
    Completed,
    Error,
    Other(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Processing => "processing",
            Status::Completed => "completed",
            Status::Error => "error",
            Status::Other(raw) => raw,
        }
    }

    /// Human-readable status line
    pub fn text(&self) -> &str {
        match self {
            Status::Processing => "Processing...",
            Status::Completed => "Completed",
            Status::Error => "Error",
            Status::Other(raw) => raw,
        }
    }

    /// Styling class, `status-<status>`
    pub fn css_class(&self) -> String {
        format!("status-{}", self.as_str())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Error)
    }
}

impl From<String> for Status {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "processing" => Status::Processing,
            "completed" => Status::Completed,
            "error" => Status::Error,
            _ => Status::Other(raw),
        }
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        status.as_str().to_string()
    }
}

/// A single detection reported by the backend. Never mutated after receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub frame: u64,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub bbox: Option<[i64; 4]>,
}

impl Detection {
    pub fn label_or_unknown(&self) -> &str {
        self.label.as_deref().unwrap_or("Unknown")
    }

    pub fn is_drowning(&self) -> bool {
        self.label
            .as_deref()
            .map(|label| label.to_lowercase().contains("drown"))
            .unwrap_or(false)
    }
}

/// One message from the live update stream. Every field is optional; absent
/// fields leave the corresponding display value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveUpdateEvent {
    #[serde(default)]
    pub progress: Option<u32>,
    #[serde(default)]
    pub current_frame: Option<u64>,
    #[serde(default)]
    pub total_frames: Option<u64>,
    #[serde(default)]
    pub drowning_count: Option<u64>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub frame_data: Option<String>,
    #[serde(default)]
    pub recent_detections: Option<Vec<Detection>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<bool>,
    #[serde(default)]
    pub total_detections: Option<u64>,
}

impl LiveUpdateEvent {
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// Body of `GET /detection_status/{session_id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub progress: Option<u32>,
    #[serde(default)]
    pub current_frame: Option<u64>,
    #[serde(default)]
    pub total_frames: Option<u64>,
    #[serde(default)]
    pub drowning_count: Option<u64>,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub result: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub frame_data: Option<String>,
}

impl StatusSnapshot {
    /// View the snapshot as a stream event so it can go through the display updater.
    pub fn as_event(&self) -> LiveUpdateEvent {
        LiveUpdateEvent {
            progress: self.progress,
            current_frame: self.current_frame,
            total_frames: self.total_frames,
            drowning_count: self.drowning_count,
            status: self.status.clone(),
            frame_data: self.frame_data.clone(),
            recent_detections: Some(self.detections.clone()),
            error: self.error.clone(),
            result: self.result,
            total_detections: None,
        }
    }
}
