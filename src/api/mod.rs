// src/api/mod.rs
// Backend API - detection service client

mod http;
pub mod sse;
mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use http::HttpBackend;
pub use sse::SseDecoder;
pub use types::{ApiError, ErrorBody, HealthReport, SimpleVerdict, StartLiveResponse};

use crate::session::{StatusSnapshot, VideoUpload};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Raw body chunks of a live update stream
pub type UpdateStream = BoxStream<'static, Result<Vec<u8>, ApiError>>;

/// Everything the client needs from the detection service
#[async_trait]
pub trait DetectionBackend: Send + Sync {
    /// Upload a video and start a live session; returns the session id
    async fn start_live(&self, video: &VideoUpload) -> Result<String, ApiError>;

    /// Open the server-sent event stream for a session
    async fn open_updates(&self, session_id: &str) -> Result<UpdateStream, ApiError>;

    /// Probe `/health`
    async fn health(&self) -> Result<HealthReport, ApiError>;

    /// One-shot detection without live updates
    async fn detect(&self, video: &VideoUpload) -> Result<SimpleVerdict, ApiError>;

    /// Point-in-time status of a session
    async fn detection_status(&self, session_id: &str) -> Result<StatusSnapshot, ApiError>;

    /// Get backend name
    fn name(&self) -> &str;
}
