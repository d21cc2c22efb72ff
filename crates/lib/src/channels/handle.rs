//! Outbound side of a channel: deliver a reply to a recipient.

use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
    #[error("send request failed: {0}")]
    Request(reqwest::Error),
    #[error("send rejected: {status} {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Handle to a channel that can send messages.
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Channel id (e.g. "signal").
    fn id(&self) -> &str;
    /// Send a text message to a recipient, applying the channel's length limit.
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), SendError>;
}
