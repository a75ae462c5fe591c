// src/api/http.rs
// HTTP implementation of the detection backend

use super::{ApiError, DetectionBackend, ErrorBody, HealthReport, SimpleVerdict, StartLiveResponse, UpdateStream};
use crate::config::AppConfig;
use crate::session::{StatusSnapshot, VideoUpload};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header, multipart, Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const HEALTH_TIMEOUT_SECS: u64 = 5;
const VIDEO_FIELD: &str = "video";

pub struct HttpBackend {
    base_url: String,
    /// Bounded requests: uploads, health, status
    client: Client,
    /// Event streams stay open for the whole session, so no total timeout
    stream_client: Client,
}

impl HttpBackend {
    pub fn new(config: &AppConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        let stream_client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        tracing::info!("HTTP backend initialized for {}", config.api_url);

        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            client,
            stream_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn video_form(video: &VideoUpload) -> Result<multipart::Form, ApiError> {
        let part = multipart::Part::bytes(video.bytes.clone())
            .file_name(video.file_name.clone())
            .mime_str(&video.mime)
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(multipart::Form::new().part(VIDEO_FIELD, part))
    }

    /// Turn a non-success response into `ApiError::Http`, keeping the
    /// backend's `error` field when the body has one.
    async fn ensure_success(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.trim().is_empty());

        tracing::debug!("Backend returned HTTP {}: {}", status, body);

        Err(ApiError::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl DetectionBackend for HttpBackend {
    async fn start_live(&self, video: &VideoUpload) -> Result<String, ApiError> {
        tracing::info!(
            "Uploading '{}' ({} bytes) for live detection",
            video.file_name,
            video.bytes.len()
        );

        let response = self
            .client
            .post(self.url("/detect_live"))
            .multipart(Self::video_form(video)?)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let body: StartLiveResponse = Self::read_json(response).await?;
        body.session_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("missing session_id".to_string()))
    }

    async fn open_updates(&self, session_id: &str) -> Result<UpdateStream, ApiError> {
        let response = self
            .stream_client
            .get(self.url(&format!("/live_updates/{}", session_id)))
            .header(header::ACCEPT, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let response = Self::ensure_success(response).await?;

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ApiError::from_reqwest));

        Ok(stream.boxed())
    }

    async fn health(&self) -> Result<HealthReport, ApiError> {
        let response = self
            .client
            .get(self.url("/health"))
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        Self::read_json(response).await
    }

    async fn detect(&self, video: &VideoUpload) -> Result<SimpleVerdict, ApiError> {
        tracing::info!("Uploading '{}' for one-shot detection", video.file_name);

        let response = self
            .client
            .post(self.url("/detect"))
            .multipart(Self::video_form(video)?)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        Self::read_json(response).await
    }

    async fn detection_status(&self, session_id: &str) -> Result<StatusSnapshot, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/detection_status/{}", session_id)))
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        Self::read_json(response).await
    }

    fn name(&self) -> &str {
        "HTTP"
    }
}
