//! AnythingLLM workspace chat client (`POST /api/v1/workspace/{slug}/chat`).

use super::{ChatBackend, QueryError};
use crate::config::ChatMode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for one AnythingLLM workspace.
#[derive(Clone)]
pub struct AnythingLlmClient {
    base_url: String,
    api_key: String,
    workspace_slug: String,
    mode: ChatMode,
    session_prefix: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    message: &'a str,
    mode: &'static str,
    session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    #[serde(default)]
    text_response: Option<String>,
}

impl AnythingLlmClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        workspace_slug: impl Into<String>,
        mode: ChatMode,
        session_prefix: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            workspace_slug: workspace_slug.into(),
            mode,
            session_prefix: session_prefix.into(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    /// Session id sent with every query so AnythingLLM keeps one thread per sender.
    pub fn session_id(&self, sender: &str) -> String {
        format!("{}-{}", self.session_prefix, sender)
    }

    fn chat_url(&self) -> String {
        format!(
            "{}/api/v1/workspace/{}/chat",
            self.base_url, self.workspace_slug
        )
    }
}

#[async_trait]
impl ChatBackend for AnythingLlmClient {
    async fn query(&self, sender: &str, message: &str) -> Result<String, QueryError> {
        let body = ChatRequest {
            message,
            mode: self.mode.as_str(),
            session_id: self.session_id(sender),
        };
        log::info!(
            "querying anythingllm workspace {} for {}: {}",
            self.workspace_slug,
            sender,
            crate::preview(message, 50)
        );
        let res = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| QueryError::from_send(e, self.timeout))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(QueryError::Api { status, body });
        }
        let data: ChatResponse = res
            .json()
            .await
            .map_err(|e| QueryError::from_decode(e, self.timeout))?;
        let text = data.text_response.unwrap_or_default();
        log::info!("anythingllm response for {}: {}", sender, crate::preview(&text, 100));
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(prefix: &str) -> AnythingLlmClient {
        client_at("http://anythingllm:3001/", prefix)
    }

    fn client_at(base_url: &str, prefix: &str) -> AnythingLlmClient {
        AnythingLlmClient::new(
            base_url,
            "key",
            "team",
            ChatMode::Chat,
            prefix,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn session_id_is_prefixed_sender() {
        assert_eq!(client("signal").session_id("+1555"), "signal-+1555");
        assert_eq!(client("bridge").session_id("+1555"), "bridge-+1555");
    }

    #[test]
    fn chat_url_is_workspace_scoped() {
        assert_eq!(
            client("signal").chat_url(),
            "http://anythingllm:3001/api/v1/workspace/team/chat"
        );
    }

    #[test]
    fn request_body_uses_camel_case() {
        let body = ChatRequest {
            message: "hello",
            mode: ChatMode::Query.as_str(),
            session_id: "signal-+1555".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": "hello", "mode": "query", "sessionId": "signal-+1555"})
        );
    }

    #[test]
    fn missing_text_response_decodes_as_none() {
        let r: ChatResponse = serde_json::from_str(r#"{"id":"x","type":"textResponse"}"#).unwrap();
        assert!(r.text_response.is_none());
        let r: ChatResponse = serde_json::from_str(r#"{"textResponse":null}"#).unwrap();
        assert!(r.text_response.is_none());
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_request_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = client_at(&format!("http://127.0.0.1:{}", port), "signal");
        let err = client.query("+1555", "hello").await.unwrap_err();
        assert!(matches!(err, QueryError::Request(_)), "got {:?}", err);
    }
}
