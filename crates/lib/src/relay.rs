//! Relay turn: ask the backend, record the exchange, reply to the sender.
//!
//! Each accepted webhook message is processed on its own task. A semaphore bounds how
//! many turns run at once; messages beyond the limit wait for a slot instead of being dropped.

use crate::channels::{ChannelHandle, InboundMessage};
use crate::history::{ConversationStore, Turn};
use crate::llm::ChatBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// How one turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The backend answered and the answer was delivered.
    Replied,
    /// The backend failed or answered with nothing; the error message was delivered.
    FellBack,
    /// Nothing reached the sender (reply or error message could not be sent).
    Undelivered,
}

/// Orchestrates backend query, history update, and reply for inbound messages.
pub struct Relay {
    backend: Arc<dyn ChatBackend>,
    channel: Arc<dyn ChannelHandle>,
    history: Arc<ConversationStore>,
    error_message: String,
    max_concurrent: u32,
    permits: Arc<Semaphore>,
}

impl Relay {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        channel: Arc<dyn ChannelHandle>,
        history: Arc<ConversationStore>,
        error_message: impl Into<String>,
        max_concurrent: usize,
    ) -> Self {
        let max_concurrent = u32::try_from(max_concurrent.max(1)).unwrap_or(u32::MAX);
        Self {
            backend,
            channel,
            history,
            error_message: error_message.into(),
            max_concurrent,
            permits: Arc::new(Semaphore::new(max_concurrent as usize)),
        }
    }

    pub fn history(&self) -> &Arc<ConversationStore> {
        &self.history
    }

    /// Process one message to completion. Never fails: every error ends in a logged outcome.
    pub async fn process(&self, msg: &InboundMessage) -> ProcessOutcome {
        let reply = match self.backend.query(&msg.sender, &msg.text).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                log::warn!("backend returned an empty response for {}", msg.sender);
                return self.fall_back(&msg.sender).await;
            }
            Err(e) => {
                log::error!("backend query for {} failed: {}", msg.sender, e);
                return self.fall_back(&msg.sender).await;
            }
        };

        self.history
            .append_turns(
                &msg.sender,
                [Turn::user(msg.text.as_str()), Turn::assistant(reply.as_str())],
            )
            .await;

        match self.channel.send_message(&msg.sender, &reply).await {
            Ok(()) => ProcessOutcome::Replied,
            Err(e) => {
                log::error!(
                    "failed to send reply to {} via {}: {}",
                    msg.sender,
                    self.channel.id(),
                    e
                );
                ProcessOutcome::Undelivered
            }
        }
    }

    async fn fall_back(&self, sender: &str) -> ProcessOutcome {
        match self.channel.send_message(sender, &self.error_message).await {
            Ok(()) => ProcessOutcome::FellBack,
            Err(e) => {
                log::error!("failed to send error message to {}: {}", sender, e);
                ProcessOutcome::Undelivered
            }
        }
    }

    /// Process `msg` in the background once a concurrency slot is free.
    /// A panic while processing is logged and answered with the error message.
    pub fn spawn(self: &Arc<Self>, msg: InboundMessage) -> JoinHandle<()> {
        let relay = self.clone();
        tokio::spawn(async move {
            let Ok(_permit) = relay.permits.clone().acquire_owned().await else {
                log::warn!("relay is shut down; dropping message from {}", msg.sender);
                return;
            };
            let sender = msg.sender.clone();
            let worker = {
                let relay = relay.clone();
                tokio::spawn(async move { relay.process(&msg).await })
            };
            match worker.await {
                Ok(outcome) => log::debug!("turn for {} finished: {:?}", sender, outcome),
                Err(e) if e.is_panic() => {
                    log::error!("processing message from {} panicked", sender);
                    relay.fall_back(&sender).await;
                }
                Err(e) => log::warn!("processing message from {} was cancelled: {}", sender, e),
            }
        })
    }

    /// Turns currently holding a slot.
    pub fn in_flight(&self) -> usize {
        (self.max_concurrent as usize).saturating_sub(self.permits.available_permits())
    }

    /// Wait until no turn is running, up to `timeout`, then stop accepting new turns.
    /// Returns false when turns were still running at the deadline.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let all = tokio::time::timeout(timeout, self.permits.acquire_many(self.max_concurrent)).await;
        self.permits.close();
        matches!(all, Ok(Ok(_)))
    }
}
