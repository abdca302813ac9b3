//! Chat completion domain types and the LLM client contract.

mod client;
mod message;
mod request;
mod response;

pub use client::{ChatStream, LlmClient};
pub use message::{Message, MessageRole};
pub use request::{ChatRequest, ChatRequestBuilder};
pub use response::{ChatResponse, StreamEvent, Usage};

#[cfg(test)]
pub use client::mock;
