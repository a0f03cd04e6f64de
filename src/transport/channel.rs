use super::{Connector, MessageStream};
use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};

type Message = Result<String, TransportError>;

struct ScriptedSession {
    opened: oneshot::Receiver<Result<(), TransportError>>,
    messages: mpsc::UnboundedReceiver<Message>,
}

/// An in-memory transport driven by the caller.
///
/// Each call to [`ChannelConnector::open_session`] queues one session and returns the
/// [`ChannelFeed`] that drives it. `connect` takes the oldest queued session and stays
/// pending until the feed accepts (or refuses) the connection, so the open acknowledgment
/// is under the caller's control.
#[derive(Default)]
pub struct ChannelConnector {
    sessions: Mutex<VecDeque<ScriptedSession>>,
    commands: Mutex<Vec<String>>,
}

/// The sending half of one scripted session.
pub struct ChannelFeed {
    opened: Option<oneshot::Sender<Result<(), TransportError>>>,
    messages: mpsc::UnboundedSender<Message>,
}

impl ChannelConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a session for the next `connect` call.
    pub fn open_session(&self) -> ChannelFeed {
        let (opened_tx, opened_rx) = oneshot::channel();
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(ScriptedSession {
                opened: opened_rx,
                messages: messages_rx,
            });
        ChannelFeed {
            opened: Some(opened_tx),
            messages: messages_tx,
        }
    }

    /// Queues an already-accepted session that delivers `messages` and then closes.
    pub fn replay<I>(&self, messages: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut feed = self.open_session();
        feed.accept();
        for message in messages {
            feed.send(&message);
        }
    }

    /// Every command passed to `connect`, oldest first.
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn connect(&self, command: &str) -> Result<MessageStream, TransportError> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.to_string());

        let session = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| TransportError::Connect("No scripted session queued".to_string()))?;

        match session.opened.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                return Err(TransportError::Connect(
                    "Session feed dropped before accepting".to_string(),
                ));
            }
        }

        let mut messages = session.messages;
        let stream = async_stream::stream! {
            while let Some(message) = messages.recv().await {
                yield message;
            }
        };
        Ok(Box::pin(stream))
    }
}

impl ChannelFeed {
    /// Acknowledges the connection. Returns false if it was already answered or abandoned.
    pub fn accept(&mut self) -> bool {
        self.opened
            .take()
            .is_some_and(|opened| opened.send(Ok(())).is_ok())
    }

    /// Fails the connection attempt with `err`.
    pub fn refuse(&mut self, err: TransportError) -> bool {
        self.opened
            .take()
            .is_some_and(|opened| opened.send(Err(err)).is_ok())
    }

    /// Delivers one raw message. Returns false once the receiving session is gone.
    pub fn send(&self, raw: &str) -> bool {
        self.messages.send(Ok(raw.to_string())).is_ok()
    }

    pub fn send_event(&self, event: &serde_json::Value) -> bool {
        self.send(&event.to_string())
    }

    /// Delivers a transport-level failure.
    pub fn fail(&self, err: TransportError) -> bool {
        self.messages.send(Err(err)).is_ok()
    }

    /// Ends the stream as if the server closed the connection.
    pub fn close(self) {}
}
