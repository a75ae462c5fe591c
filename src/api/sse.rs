// src/api/sse.rs
// Incremental decoder for `text/event-stream` bodies

/// Turns raw body chunks into the `data` payloads of dispatched messages.
///
/// Only events of the default type (`message`) are yielded, matching what an
/// `onmessage` listener would observe. An event still being assembled when the
/// stream ends is discarded.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    /// Bytes of `pending` already known to hold no line break
    scanned: usize,
    data: Vec<String>,
    event_type: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every payload completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        let mut start = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.pending[search_from..].iter().position(|&b| b == b'\n') {
            let end = search_from + offset;
            let raw = &self.pending[start..end];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

            let line = String::from_utf8_lossy(raw).into_owned();
            if let Some(payload) = self.process_line(&line) {
                payloads.push(payload);
            }

            start = end + 1;
            search_from = start;
        }

        self.pending.drain(..start);
        self.scanned = self.pending.len();
        payloads
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event_type = Some(value.to_string()),
            // id / retry carry reconnect state, which this client never uses
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<String> {
        let event_type = self.event_type.take();
        if self.data.is_empty() {
            return None;
        }

        let payload = self.data.join("\n");
        self.data.clear();

        match event_type.as_deref() {
            None | Some("") | Some("message") => Some(payload),
            Some(other) => {
                tracing::debug!("Ignoring SSE event of type '{}'", other);
                None
            }
        }
    }
}
