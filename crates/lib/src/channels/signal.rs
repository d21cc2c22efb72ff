//! Signal channel: send replies through the signal-cli REST API (`POST /v2/send`).

use crate::channels::handle::{ChannelHandle, SendError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Appended to replies cut at the length limit.
pub const TRUNCATION_MARKER: &str = "\n\n[Message truncated]";

/// Cut `text` so it fits in `max_len` characters. Longer text keeps as many leading
/// characters as leave room for [`TRUNCATION_MARKER`], so the result is exactly `max_len`
/// long; when `max_len` cannot hold the marker the text is hard-cut instead.
/// Text that fits is returned as is.
pub fn truncate_reply(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_len <= marker_len {
        return text.chars().take(max_len).collect();
    }
    let mut out: String = text.chars().take(max_len - marker_len).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    message: &'a str,
    number: &'a str,
    recipients: [&'a str; 1],
}

/// Signal connector: sends from the bridge's own number.
pub struct SignalChannel {
    id: String,
    base_url: String,
    number: String,
    max_message_length: usize,
    timeout: Duration,
    client: reqwest::Client,
}

impl SignalChannel {
    pub fn new(
        base_url: &str,
        number: impl Into<String>,
        max_message_length: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            id: "signal".to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            number: number.into(),
            max_message_length,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    fn request_error(&self, e: reqwest::Error) -> SendError {
        if e.is_timeout() {
            SendError::Timeout(self.timeout)
        } else {
            SendError::Request(e)
        }
    }
}

#[async_trait]
impl ChannelHandle for SignalChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), SendError> {
        let message = truncate_reply(text, self.max_message_length);
        let url = format!("{}/v2/send", self.base_url);
        let body = SendRequest {
            message: &message,
            number: &self.number,
            recipients: [recipient],
        };
        log::info!(
            "sending signal message to {}: {}",
            recipient,
            crate::preview(&message, 50)
        );
        let res = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        if res.status() != reqwest::StatusCode::CREATED {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SendError::Api { status, body });
        }
        log::info!("message sent to {}", recipient);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unchanged() {
        assert_eq!(truncate_reply("hi there", 500), "hi there");
        let exact = "x".repeat(500);
        assert_eq!(truncate_reply(&exact, 500), exact);
    }

    #[test]
    fn long_text_fits_and_ends_with_marker() {
        let text = "a".repeat(600);
        let out = truncate_reply(&text, 500);
        assert_eq!(out.chars().count(), 500);
        assert!(out.ends_with(TRUNCATION_MARKER));
        let kept = 500 - TRUNCATION_MARKER.chars().count();
        assert_eq!(kept, 479);
        assert_eq!(&out[..kept], "a".repeat(kept));
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "é".repeat(120);
        assert_eq!(truncate_reply(&text, 120), text);
        let out = truncate_reply(&"é".repeat(121), 120);
        assert!(out.chars().count() <= 120);
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn tiny_limit_hard_cuts() {
        let out = truncate_reply("abcdefghij", 4);
        assert_eq!(out, "abcd");
        let text = "z".repeat(40);
        assert_eq!(truncate_reply(&text, 21), "z".repeat(21));
    }

    #[test]
    fn send_body_shape() {
        let body = SendRequest {
            message: "hi",
            number: "+1000",
            recipients: ["+1555"],
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"message": "hi", "number": "+1000", "recipients": ["+1555"]})
        );
    }
}
