//! OpenAI-compatible chat completions client (`POST /v1/chat/completions`), as served by a LiteLLM proxy.
//! Stateless on the server side, so the sender's stored turns are sent as context with every query.

use super::{ChatBackend, QueryError};
use crate::history::{ConversationStore, Turn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct LiteLlmClient {
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    history: Arc<ConversationStore>,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Turn>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    /// Content of the first choice; empty when the response carries none.
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default()
    }
}

impl LiteLlmClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        history: Arc<ConversationStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            history,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// Stored turns for the sender, oldest first, followed by the new user message.
    async fn messages(&self, sender: &str, message: &str) -> Vec<Turn> {
        let mut messages = self.history.get_history(sender).await;
        messages.push(Turn::user(message));
        messages
    }
}

#[async_trait]
impl ChatBackend for LiteLlmClient {
    async fn query(&self, sender: &str, message: &str) -> Result<String, QueryError> {
        let messages = self.messages(sender, message).await;
        log::info!(
            "querying {} for {} ({} prior turns): {}",
            self.model,
            sender,
            messages.len() - 1,
            crate::preview(message, 50)
        );
        let body = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
        };
        let res = self
            .client
            .post(self.completions_url())
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
        let data: CompletionResponse = res
            .json()
            .await
            .map_err(|e| QueryError::from_decode(e, self.timeout))?;
        let text = data.into_text();
        log::debug!(
            "{} response for {}: {}",
            self.model,
            sender,
            crate::preview(&text, 100)
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Role;

    fn client(history: Arc<ConversationStore>) -> LiteLlmClient {
        LiteLlmClient::new(
            "http://litellm:4000/",
            "key",
            "llama3.2",
            500,
            history,
            Duration::from_secs(30),
        )
    }

    #[test]
    fn completions_url_drops_trailing_slash() {
        let c = client(Arc::new(ConversationStore::new(20)));
        assert_eq!(c.completions_url(), "http://litellm:4000/v1/chat/completions");
    }

    #[tokio::test]
    async fn messages_carry_stored_turns_then_new_message() {
        let history = Arc::new(ConversationStore::new(20));
        history
            .append_turns("+1555", [Turn::user("hi"), Turn::assistant("hello")])
            .await;
        let c = client(history);
        let messages = c.messages("+1555", "how are you").await;
        assert_eq!(
            messages,
            vec![
                Turn::user("hi"),
                Turn::assistant("hello"),
                Turn::user("how are you")
            ]
        );
        assert_eq!(c.messages("+1666", "first").await[0].role, Role::User);
    }

    #[test]
    fn request_body_matches_chat_completions() {
        let body = CompletionRequest {
            model: "llama3.2",
            messages: vec![Turn::user("hello")],
            max_tokens: 500,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "model": "llama3.2",
                "messages": [{"role": "user", "content": "hello"}],
                "max_tokens": 500
            })
        );
    }

    #[test]
    fn reply_is_first_choice_content() {
        let r: CompletionResponse = serde_json::from_str(
            r#"{"id":"c1","choices":[{"index":0,"message":{"role":"assistant","content":"hey"}},{"message":{"content":"other"}}]}"#,
        )
        .unwrap();
        assert_eq!(r.into_text(), "hey");
    }

    #[test]
    fn missing_choices_or_content_is_empty() {
        for body in [
            r#"{}"#,
            r#"{"choices":[]}"#,
            r#"{"choices":[{"finish_reason":"length"}]}"#,
            r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#,
        ] {
            let r: CompletionResponse = serde_json::from_str(body).unwrap();
            assert_eq!(r.into_text(), "", "body {}", body);
        }
    }
}
