//! AI backend abstraction and its clients: an AnythingLLM workspace, or any
//! OpenAI-compatible chat completions endpoint such as a LiteLLM proxy.
//!
//! The relay only needs "send this sender's message, get text back"; the trait keeps
//! the relay testable without a running backend.

mod anythingllm;
mod litellm;

pub use anythingllm::AnythingLlmClient;
pub use litellm::LiteLlmClient;

use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("backend request timed out after {0:?}")]
    Timeout(Duration),
    #[error("backend request failed: {0}")]
    Request(reqwest::Error),
    #[error("backend api error: {status} {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("backend response could not be decoded: {0}")]
    Decode(reqwest::Error),
}

impl QueryError {
    /// Classify a reqwest failure from sending a request.
    fn from_send(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            QueryError::Timeout(timeout)
        } else {
            QueryError::Request(e)
        }
    }

    /// Classify a reqwest failure from reading the response body.
    fn from_decode(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            QueryError::Timeout(timeout)
        } else {
            QueryError::Decode(e)
        }
    }
}

/// A conversational backend that answers one message for a sender.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Generated reply text. An empty string means the backend answered with nothing.
    async fn query(&self, sender: &str, message: &str) -> Result<String, QueryError>;
}
