//! LLM backend clients.

mod openai;

pub use openai::OpenAiChatClient;
