//! Scripted in-memory backend for unit tests.

use super::{ApiError, DetectionBackend, HealthReport, SimpleVerdict, UpdateStream};
use crate::session::{StatusSnapshot, VideoUpload};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) fn sse(json: &str) -> Vec<u8> {
    format!("data: {}\n\n", json).into_bytes()
}

#[derive(Clone)]
pub(crate) enum StartBehavior {
    Session(String),
    Reject { status: u16, message: Option<String> },
    MissingSessionId,
}

#[derive(Clone)]
pub(crate) struct Script {
    pub chunks: Vec<Vec<u8>>,
    /// Keep the connection open after the last chunk instead of ending it
    pub hang: bool,
}

impl Script {
    pub fn ends(chunks: Vec<Vec<u8>>) -> Self {
        Self { chunks, hang: false }
    }

    pub fn hangs(chunks: Vec<Vec<u8>>) -> Self {
        Self { chunks, hang: true }
    }
}

struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) struct FakeBackend {
    start: Mutex<StartBehavior>,
    scripts: Mutex<HashMap<String, Script>>,
    health: Mutex<Option<HealthReport>>,
    pub open_connections: Arc<AtomicUsize>,
    pub max_open_connections: Arc<AtomicUsize>,
    pub uploads: AtomicUsize,
    pub opened: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new(start: StartBehavior) -> Self {
        Self {
            start: Mutex::new(start),
            scripts: Mutex::new(HashMap::new()),
            health: Mutex::new(None),
            open_connections: Arc::new(AtomicUsize::new(0)),
            max_open_connections: Arc::new(AtomicUsize::new(0)),
            uploads: AtomicUsize::new(0),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(self, session_id: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(session_id.to_string(), script);
        self
    }

    pub fn set_start(&self, start: StartBehavior) {
        *self.start.lock().unwrap() = start;
    }

    pub fn set_health(&self, health: Option<HealthReport>) {
        *self.health.lock().unwrap() = health;
    }

    pub fn open_count(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectionBackend for FakeBackend {
    async fn start_live(&self, _video: &VideoUpload) -> Result<String, ApiError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        match self.start.lock().unwrap().clone() {
            StartBehavior::Session(id) => Ok(id),
            StartBehavior::Reject { status, message } => Err(ApiError::Http { status, message }),
            StartBehavior::MissingSessionId => {
                Err(ApiError::InvalidResponse("missing session_id".to_string()))
            }
        }
    }

    async fn open_updates(&self, session_id: &str) -> Result<UpdateStream, ApiError> {
        self.opened.lock().unwrap().push(session_id.to_string());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| ApiError::Http {
                status: 404,
                message: Some("Session not found".to_string()),
            })?;

        let open = self.open_connections.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open_connections.fetch_max(open, Ordering::SeqCst);
        let guard = ConnectionGuard(self.open_connections.clone());

        let chunks = stream::iter(script.chunks.into_iter().map(Ok::<Vec<u8>, ApiError>));
        let body = if script.hang {
            chunks.chain(stream::pending()).boxed()
        } else {
            chunks.boxed()
        };

        Ok(body
            .map(move |chunk| {
                let _held = &guard;
                chunk
            })
            .boxed())
    }

    async fn health(&self) -> Result<HealthReport, ApiError> {
        self.health
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::Network("connection refused".to_string()))
    }

    async fn detect(&self, _video: &VideoUpload) -> Result<SimpleVerdict, ApiError> {
        Ok(SimpleVerdict {
            drowning_detected: false,
            message: Some("No drowning detected".to_string()),
        })
    }

    async fn detection_status(&self, _session_id: &str) -> Result<StatusSnapshot, ApiError> {
        Err(ApiError::Http {
            status: 404,
            message: Some("Session not found".to_string()),
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}
