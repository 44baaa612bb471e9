//! Boundary to the messaging client that actually talks to Telegram.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::harness::message::Message;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Transient server-side failure. Worth waiting out, not worth failing on.
    #[error("server error: {0}")]
    Server(String),
    /// Rate limited; retry after the given duration.
    #[error("flood wait: retry after {}s", .0.as_secs())]
    FloodWait(Duration),
    #[error("request failed: {0}")]
    Request(String),
}

/// Outbound side of a messaging client.
pub trait Transport: Send + Sync {
    /// Send a text message to `chat_id`, returning the sent message.
    fn send_text(
        &self,
        chat_id: i64,
        text: &str,
    ) -> impl Future<Output = Result<Message, TransportError>> + Send;
}
