//! Signal REST API webhook payload and intake filtering.
//!
//! The signal-cli REST API posts `{"envelope": {...}}` for every received envelope,
//! including receipts and typing indicators, so most deliveries carry no text.

use crate::channels::inbound::InboundMessage;
use serde::Deserialize;

/// Webhook POST body.
#[derive(Debug, Deserialize)]
pub struct SignalWebhook {
    pub envelope: Envelope,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Sender identity; phone number on older API versions, may be a UUID on newer ones.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_number: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub data_message: Option<DataMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DataMessage {
    #[serde(default)]
    pub message: Option<String>,
}

impl Envelope {
    /// Sender identity: `sourceNumber` when present, otherwise `source`. Blank values count as missing.
    pub fn sender(&self) -> Option<&str> {
        non_blank(self.source_number.as_deref()).or_else(|| non_blank(self.source.as_deref()))
    }

    /// Message text, if this envelope carries a non-empty data message.
    pub fn text(&self) -> Option<&str> {
        self.data_message
            .as_ref()
            .and_then(|d| d.message.as_deref())
            .filter(|m| !m.trim().is_empty())
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("malformed webhook payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Why a well-formed delivery was acknowledged without processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    MissingSender,
    EmptyMessage,
    /// Sent from the bridge's own number (our replies echoed back).
    SelfEcho,
}

/// Result of inspecting one webhook delivery.
#[derive(Debug, PartialEq, Eq)]
pub enum Intake {
    Accepted(InboundMessage),
    Ignored(IgnoreReason),
}

/// Parse a webhook body and decide whether it should be relayed.
/// `own_number` is the bridge's Signal number; `now_ms` stands in for a missing timestamp.
pub fn parse_webhook(body: &[u8], own_number: &str, now_ms: i64) -> Result<Intake, WebhookError> {
    let webhook: SignalWebhook = serde_json::from_slice(body)?;
    let envelope = webhook.envelope;
    let Some(sender) = envelope.sender() else {
        return Ok(Intake::Ignored(IgnoreReason::MissingSender));
    };
    let Some(text) = envelope.text() else {
        return Ok(Intake::Ignored(IgnoreReason::EmptyMessage));
    };
    if sender == own_number.trim() {
        return Ok(Intake::Ignored(IgnoreReason::SelfEcho));
    }
    Ok(Intake::Accepted(InboundMessage {
        sender: sender.to_string(),
        text: text.to_string(),
        timestamp: envelope.timestamp.unwrap_or(now_ms),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWN: &str = "+10000000000";

    fn parse(body: &str) -> Intake {
        parse_webhook(body.as_bytes(), OWN, 42).unwrap()
    }

    #[test]
    fn accepts_source_number_message() {
        let intake =
            parse(r#"{"envelope":{"sourceNumber":"+1555","dataMessage":{"message":"hello"}}}"#);
        assert_eq!(
            intake,
            Intake::Accepted(InboundMessage {
                sender: "+1555".to_string(),
                text: "hello".to_string(),
                timestamp: 42,
            })
        );
    }

    #[test]
    fn falls_back_to_source_and_keeps_timestamp() {
        let intake = parse(
            r#"{"envelope":{"source":"+1666","timestamp":1700000000000,"dataMessage":{"message":"yo"}}}"#,
        );
        let Intake::Accepted(msg) = intake else {
            panic!("expected accepted");
        };
        assert_eq!(msg.sender, "+1666");
        assert_eq!(msg.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn source_number_wins_over_source() {
        let intake = parse(
            r#"{"envelope":{"source":"8f1c-uuid","sourceNumber":"+1555","dataMessage":{"message":"hi"}}}"#,
        );
        let Intake::Accepted(msg) = intake else {
            panic!("expected accepted");
        };
        assert_eq!(msg.sender, "+1555");
    }

    #[test]
    fn blank_source_number_falls_back() {
        let intake = parse(
            r#"{"envelope":{"source":"+1777","sourceNumber":"","dataMessage":{"message":"hi"}}}"#,
        );
        let Intake::Accepted(msg) = intake else {
            panic!("expected accepted");
        };
        assert_eq!(msg.sender, "+1777");
    }

    #[test]
    fn ignores_missing_sender() {
        assert_eq!(
            parse(r#"{"envelope":{"dataMessage":{"message":"hello"}}}"#),
            Intake::Ignored(IgnoreReason::MissingSender)
        );
    }

    #[test]
    fn ignores_receipts_and_empty_text() {
        assert_eq!(
            parse(r#"{"envelope":{"sourceNumber":"+1555","receiptMessage":{"isRead":true}}}"#),
            Intake::Ignored(IgnoreReason::EmptyMessage)
        );
        assert_eq!(
            parse(r#"{"envelope":{"sourceNumber":"+1555","dataMessage":{"message":"  "}}}"#),
            Intake::Ignored(IgnoreReason::EmptyMessage)
        );
        assert_eq!(
            parse(r#"{"envelope":{"sourceNumber":"+1555","dataMessage":{"message":null}}}"#),
            Intake::Ignored(IgnoreReason::EmptyMessage)
        );
    }

    #[test]
    fn ignores_self_echo() {
        assert_eq!(
            parse(r#"{"envelope":{"sourceNumber":"+10000000000","dataMessage":{"message":"hi"}}}"#),
            Intake::Ignored(IgnoreReason::SelfEcho)
        );
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(parse_webhook(b"not json", OWN, 0).is_err());
        assert!(parse_webhook(br#"{"no_envelope":{}}"#, OWN, 0).is_err());
        assert!(parse_webhook(br#"{"envelope":{"timestamp":"soon"}}"#, OWN, 0).is_err());
    }
}
