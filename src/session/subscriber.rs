use super::event::{LiveUpdateEvent, Status};
use crate::api::{DetectionBackend, SseDecoder};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Idle,
    Connecting,
    Streaming,
    Completed,
    Errored,
    Lost,
}

/// Messages from the reader task, in arrival order
#[derive(Debug)]
enum StreamMessage {
    Opened,
    Update(LiveUpdateEvent),
    Lost(String),
}

/// What the subscriber hands to its consumer
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriberEvent {
    /// A parsed update. `terminal` is set when it carried a final status;
    /// the connection is already closed by the time it is returned.
    Update {
        event: LiveUpdateEvent,
        terminal: Option<Status>,
    },
    /// The stream failed or ended without a final status
    Lost(String),
}

struct Connection {
    session_id: String,
    task: JoinHandle<()>,
    rx: mpsc::Receiver<StreamMessage>,
}

/// Owns at most one live update connection.
///
/// `next` never awaits after taking a message off the channel, so dropping
/// its future loses nothing.
pub struct LiveUpdateSubscriber {
    state: SubscriberState,
    connection: Option<Connection>,
    /// Aborted reader that may still hold its connection
    closing: Option<JoinHandle<()>>,
}

impl Default for LiveUpdateSubscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveUpdateSubscriber {
    pub fn new() -> Self {
        Self {
            state: SubscriberState::Idle,
            connection: None,
            closing: None,
        }
    }

    pub fn state(&self) -> SubscriberState {
        self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.connection.as_ref().map(|c| c.session_id.as_str())
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Subscribe to `session_id`, tearing down any previous connection first.
    pub async fn open(&mut self, backend: Arc<dyn DetectionBackend>, session_id: &str) {
        if let Some(previous) = self.session_id() {
            tracing::info!(
                "Closing live updates for {} before subscribing to {}",
                previous,
                session_id
            );
        }
        self.teardown().await;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(read_updates(backend, session_id.to_string(), tx));

        self.connection = Some(Connection {
            session_id: session_id.to_string(),
            task,
            rx,
        });
        self.state = SubscriberState::Connecting;
        tracing::debug!("Connecting to live updates for {}", session_id);
    }

    /// Next event for the consumer, or `None` once nothing is open.
    ///
    /// Terminal statuses and stream loss close the connection before the
    /// event is returned, so later messages are never seen.
    pub async fn next(&mut self) -> Option<SubscriberEvent> {
        self.settle().await;
        loop {
            let connection = self.connection.as_mut()?;
            let message = connection.rx.recv().await;

            match message {
                Some(StreamMessage::Opened) => {
                    self.state = SubscriberState::Streaming;
                    tracing::info!("Live updates streaming for {}", connection.session_id);
                }
                Some(StreamMessage::Update(event)) => {
                    let terminal = event.status.clone().filter(Status::is_terminal);
                    match terminal {
                        Some(Status::Completed) => {
                            self.detach();
                            self.state = SubscriberState::Completed;
                        }
                        Some(_) => {
                            self.detach();
                            self.state = SubscriberState::Errored;
                        }
                        None => {}
                    }
                    return Some(SubscriberEvent::Update { event, terminal });
                }
                Some(StreamMessage::Lost(reason)) => {
                    self.detach();
                    self.state = SubscriberState::Lost;
                    return Some(SubscriberEvent::Lost(reason));
                }
                None => {
                    self.detach();
                    self.state = SubscriberState::Lost;
                    return Some(SubscriberEvent::Lost("update reader stopped".to_string()));
                }
            }
        }
    }

    /// Explicit teardown; safe to call in any state, any number of times.
    pub async fn close(&mut self) {
        self.teardown().await;
        self.state = SubscriberState::Idle;
    }

    /// Forget the current session and return to `Idle` without waiting.
    ///
    /// The reader is aborted here; the next `open`, `next` or `close` waits
    /// for it to be dropped.
    pub fn release(&mut self) {
        self.detach();
        self.state = SubscriberState::Idle;
    }

    fn detach(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.task.abort();
            tracing::debug!("Live update connection for {} closed", connection.session_id);
            if let Some(previous) = self.closing.replace(connection.task) {
                previous.abort();
            }
        }
    }

    /// Wait until the aborted reader, and the connection it owns, is dropped.
    async fn settle(&mut self) {
        if let Some(task) = self.closing.as_mut() {
            let _ = task.await;
            self.closing = None;
        }
    }

    async fn teardown(&mut self) {
        self.detach();
        self.settle().await;
    }
}

impl Drop for LiveUpdateSubscriber {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.task.abort();
        }
        if let Some(task) = self.closing.take() {
            task.abort();
        }
    }
}

async fn read_updates(
    backend: Arc<dyn DetectionBackend>,
    session_id: String,
    tx: mpsc::Sender<StreamMessage>,
) {
    let mut stream = match backend.open_updates(&session_id).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!("EventSource failed for {}: {}", session_id, e);
            let _ = tx.send(StreamMessage::Lost(e.to_string())).await;
            return;
        }
    };

    if tx.send(StreamMessage::Opened).await.is_err() {
        return;
    }

    let mut decoder = SseDecoder::new();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::error!("EventSource failed for {}: {}", session_id, e);
                let _ = tx.send(StreamMessage::Lost(e.to_string())).await;
                return;
            }
        };

        for payload in decoder.push(&chunk) {
            match LiveUpdateEvent::parse(&payload) {
                Ok(event) => {
                    if tx.send(StreamMessage::Update(event)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::error!("Error parsing live update: {}", e);
                }
            }
        }
    }

    tracing::warn!("Live update stream for {} closed by server", session_id);
    let _ = tx
        .send(StreamMessage::Lost("stream closed by server".to_string()))
        .await;
}
