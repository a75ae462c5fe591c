use crate::api::{ApiError, DetectionBackend};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Video file ready to be sent as the multipart `video` field
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl VideoUpload {
    pub async fn from_path(path: &Path) -> Result<Self, LaunchError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| LaunchError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        if bytes.is_empty() {
            return Err(LaunchError::EmptyVideo(path.to_path_buf()));
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());
        let mime = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            file_name,
            mime,
            bytes,
        })
    }
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Please select a video file first")]
    NoVideoSelected,

    #[error("Video file is empty: {0}")]
    EmptyVideo(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error starting live detection: {message}")]
    FailedToStart {
        message: String,
        #[source]
        source: ApiError,
    },
}

impl LaunchError {
    /// Local precondition failures never reach the network and are only logged
    pub fn is_local(&self) -> bool {
        !matches!(self, LaunchError::FailedToStart { .. })
    }
}

/// Submit the selected video and return the backend-assigned session id.
///
/// Does not touch any session state; the caller owns the returned id.
pub async fn launch(
    backend: &dyn DetectionBackend,
    selection: Option<&Path>,
) -> Result<String, LaunchError> {
    let path = selection.ok_or(LaunchError::NoVideoSelected)?;
    let video = VideoUpload::from_path(path).await?;

    match backend.start_live(&video).await {
        Ok(session_id) => {
            tracing::info!("Live detection session started: {}", session_id);
            Ok(session_id)
        }
        Err(source) => {
            tracing::error!("Live detection failed to start via {}: {}", backend.name(), source);
            Err(LaunchError::FailedToStart {
                message: source.user_message(),
                source,
            })
        }
    }
}
