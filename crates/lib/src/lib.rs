//! sigbridge core library: relays Signal messages to an AnythingLLM workspace and
//! sends the answers back.

pub mod channels;
pub mod config;
pub mod gateway;
pub mod history;
pub mod init;
pub mod llm;
pub mod relay;

/// First `max_chars` characters of `text` for log lines, with "..." when cut.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
