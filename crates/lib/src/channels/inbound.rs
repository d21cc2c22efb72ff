//! Inbound message from a channel: handed to the relay for one conversation turn.

/// A text message from a sender, extracted from a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: String,
    pub text: String,
    /// Epoch milliseconds as reported by the channel (or receive time when absent).
    pub timestamp: i64,
}
