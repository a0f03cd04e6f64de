//! Transports that deliver the raw orchestration event stream.
//!
//! A [`Connector`] opens one stream per session. Resolving `connect` is the transport's
//! open acknowledgment; every item of the returned [`MessageStream`] is the payload of one
//! server-sent event. Dropping the stream closes the transport.

use crate::error::TransportError;
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;

pub mod channel;
pub mod sse;

pub use channel::{ChannelConnector, ChannelFeed};
pub use sse::{SseConnector, SseFrameParser};

/// The raw message payloads of one open session, in arrival order.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a stream for `command`. Resolves once the transport is open.
    async fn connect(&self, command: &str) -> Result<MessageStream, TransportError>;
}
