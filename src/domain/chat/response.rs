use serde::{Deserialize, Serialize};

use super::Message;

/// Token usage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Response from a non-streamed chat completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub model: String,
    pub message: Message,
    pub usage: Option<Usage>,
}

impl ChatResponse {
    pub fn new(id: String, model: String, message: Message) -> Self {
        Self {
            id,
            model,
            message,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn content(&self) -> &str {
        &self.message.content
    }
}

/// One event of a streamed chat completion.
///
/// Streams are ordered; consumers terminate on the first `Done` event or on
/// a transport-level close, whichever comes first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Role { role: String },
    Delta { content: String },
    Done { done: bool },
}

impl StreamEvent {
    pub fn role(role: impl Into<String>) -> Self {
        Self::Role { role: role.into() }
    }

    pub fn delta(content: impl Into<String>) -> Self {
        Self::Delta {
            content: content.into(),
        }
    }

    pub fn done() -> Self {
        Self::Done { done: true }
    }

    /// Terminal marker for a stream. Only a true flag terminates; a
    /// `{"done": false}` event is a non-event.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { done: true })
    }
}
