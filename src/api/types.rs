// src/api/types.rs
// Backend response types and error definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

const GENERIC_FAILURE: &str = "Live detection failed";

/// Body of a successful `POST /detect_live`
#[derive(Debug, Clone, Deserialize)]
pub struct StartLiveResponse {
    pub session_id: Option<String>,
}

/// Error body returned with any non-success status
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthReport {
    #[serde(default)]
    pub active_sessions: u64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub model_loaded: Option<bool>,
}

/// Result of the one-shot `POST /detect` flow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimpleVerdict {
    pub drowning_detected: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Backend API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("no error message"))]
    Http { status: u16, message: Option<String> },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl ApiError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(err.to_string())
        }
    }

    /// Message the backend attached to a failed request, if any
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            ApiError::Http { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Text shown to the user when a session could not be started.
    ///
    /// Backend-provided messages win; transport failures report their own
    /// description; everything else falls back to a generic message.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Http { message: Some(message), .. } => message.clone(),
            ApiError::Network(detail) => detail.clone(),
            ApiError::Timeout => self.to_string(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_message_prefers_http_body() {
        let err = ApiError::Http {
            status: 400,
            message: Some("No video file provided".to_string()),
        };
        assert_eq!(err.backend_message(), Some("No video file provided"));
        assert_eq!(err.user_message(), "No video file provided");
        assert_eq!(err.to_string(), "HTTP 400: No video file provided");
    }

    #[test]
    fn test_generic_message_without_body() {
        let err = ApiError::Http {
            status: 500,
            message: None,
        };
        assert_eq!(err.backend_message(), None);
        assert_eq!(err.user_message(), "Live detection failed");

        let err = ApiError::InvalidResponse("missing session_id".to_string());
        assert_eq!(err.user_message(), "Live detection failed");
    }

    #[test]
    fn test_health_report_tolerates_missing_fields() {
        let report: HealthReport = serde_json::from_str(r#"{"active_sessions": 3}"#).unwrap();
        assert_eq!(report.active_sessions, 3);
        assert_eq!(report.model_loaded, None);
    }
}
