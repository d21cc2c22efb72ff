//! Communication channels (Signal).
//!
//! Inbound: webhook payloads are parsed and filtered into [`InboundMessage`]s.
//! Outbound: replies go through a [`ChannelHandle`].

mod handle;
mod inbound;
mod signal;
mod webhook;

pub use handle::{ChannelHandle, SendError};
pub use inbound::InboundMessage;
pub use signal::{truncate_reply, SignalChannel, TRUNCATION_MARKER};
pub use webhook::{parse_webhook, Envelope, IgnoreReason, Intake, SignalWebhook, WebhookError};
