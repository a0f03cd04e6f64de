use super::{Connector, MessageStream};
use crate::config::SessionConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};

/// Connects to an HTTP endpoint serving `text/event-stream`.
pub struct SseConnector {
    endpoint: String,
    client: reqwest::Client,
}

impl SseConnector {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Connect(format!("Could not build HTTP client: {}", e)))?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Connector for SseConnector {
    async fn connect(&self, command: &str) -> Result<MessageStream, TransportError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("command", command)])
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                status: response.status().as_u16(),
                url: self.endpoint.clone(),
            });
        }

        let mut chunks = Box::pin(response.bytes_stream());
        let messages = async_stream::stream! {
            let mut parser = SseFrameParser::new();
            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(bytes) => {
                        for message in parser.push(&bytes) {
                            yield Ok(message);
                        }
                    }
                    Err(e) => {
                        yield Err(TransportError::Stream(e.to_string()));
                        return;
                    }
                }
            }
            if let Some(message) = parser.finish() {
                yield Ok(message);
            }
        };

        Ok(Box::pin(messages))
    }
}

/// Incremental parser for the `text/event-stream` wire format.
///
/// Bytes are buffered until a full line is available, so chunk boundaries may fall anywhere,
/// including inside a multi-byte character or between the two bytes of a CRLF. Lines end in
/// CRLF, LF or a lone CR. Only `data` fields are kept, and only for unnamed events or events
/// named `message`; other named events are skipped along with `id`, `retry` and comments.
#[derive(Debug, Default)]
pub struct SseFrameParser {
    buffer: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
    /// The previous chunk ended in CR, so a leading LF belongs to that line break.
    after_cr: bool,
}

impl SseFrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every message it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut chunk = chunk;
        if self.after_cr && !chunk.is_empty() {
            if chunk[0] == b'\n' {
                chunk = &chunk[1..];
            }
            self.after_cr = false;
        }
        self.buffer.extend_from_slice(chunk);

        let mut messages = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| matches!(b, b'\r' | b'\n')) {
            let mut terminator = 1;
            if self.buffer[end] == b'\r' {
                match self.buffer.get(end + 1) {
                    Some(b'\n') => terminator = 2,
                    Some(_) => {}
                    None => self.after_cr = true,
                }
            }
            let mut line: Vec<u8> = self.buffer.drain(..end + terminator).collect();
            line.truncate(end);
            let line = String::from_utf8_lossy(&line);
            if let Some(message) = self.process_line(&line) {
                messages.push(message);
            }
        }
        messages
    }

    /// Flushes a trailing message the server did not terminate with a blank line.
    pub fn finish(&mut self) -> Option<String> {
        self.after_cr = false;
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).into_owned();
            if let Some(message) = self.process_line(&line) {
                return Some(message);
            }
        }
        self.dispatch()
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
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let message = self.data.join("\n");
        self.data.clear();

        match event.as_deref() {
            None | Some("") | Some("message") => Some(message),
            Some(name) => {
                tracing::debug!(event = name, "Skipping named server-sent event");
                None
            }
        }
    }
}
