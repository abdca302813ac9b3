//! OpenAI-compatible chat completion client.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{future, stream, StreamExt};
use serde::Deserialize;

use crate::domain::chat::{ChatRequest, ChatResponse, ChatStream, LlmClient, Message, StreamEvent};
use crate::domain::chat::Usage;
use crate::domain::DomainError;
use crate::infrastructure::http_client::HttpClient;

/// Chat client for a single OpenAI-compatible backend (the provider proxy).
#[derive(Debug)]
pub struct OpenAiChatClient<C: HttpClient> {
    client: C,
    auth_header: Option<String>,
    base_url: String,
}

impl<C: HttpClient> OpenAiChatClient<C> {
    pub fn new(client: C, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let auth_header = api_key
            .filter(|k| !k.is_empty())
            .map(|k| format!("Bearer {k}"));

        Self {
            client,
            auth_header,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/v1/models", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        let mut headers = vec![("Content-Type", "application/json")];
        if let Some(ref auth) = self.auth_header {
            headers.push(("Authorization", auth.as_str()));
        }
        headers
    }

    fn build_body(&self, request: &ChatRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "stream": stream,
        });

        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(top_p) = request.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }
        if let Some(ref stop) = request.stop {
            body["stop"] = serde_json::json!(stop);
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse, DomainError> {
        let response: OpenAiResponse = serde_json::from_value(json)
            .map_err(|e| DomainError::data(format!("failed to parse chat response: {e}")))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::data("no choices in chat response"))?;

        let message = Message::assistant(choice.message.content.unwrap_or_default());
        let mut chat_response = ChatResponse::new(response.id, response.model, message);

        if let Some(usage) = response.usage {
            chat_response =
                chat_response.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
        }

        Ok(chat_response)
    }
}

#[async_trait]
impl<C: HttpClient> LlmClient for OpenAiChatClient<C> {
    async fn enabled(&self) -> Result<bool, DomainError> {
        // Any HTTP response means the proxy boundary is reachable; non-2xx
        // (missing key, unconfigured backend) reports "not enabled" rather
        // than an error. Only transport failures propagate.
        let status = self
            .client
            .get_status(&self.models_url(), self.headers())
            .await?;
        Ok((200..300).contains(&status))
    }

    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, DomainError> {
        request.validate()?;

        let body = self.build_body(&request, false);
        let response = self
            .client
            .post_json(&self.chat_completions_url(), self.headers(), &body)
            .await?;

        self.parse_response(response)
    }

    async fn chat_completion_stream(
        &self,
        request: ChatRequest,
    ) -> Result<ChatStream, DomainError> {
        request.validate()?;

        let body = self.build_body(&request, true);
        let byte_stream = self
            .client
            .post_json_stream(&self.chat_completions_url(), self.headers(), &body)
            .await?;

        Ok(Box::pin(sse_events(byte_stream)))
    }
}

/// Carry-over state for SSE lines split across transport chunks.
#[derive(Default)]
struct SseBuffer {
    partial: String,
    done: bool,
}

/// Decode a byte stream of server-sent events into ordered stream events.
/// Emission stops after the terminal event. A final line left without its
/// newline when the transport closes is still decoded.
fn sse_events<S>(byte_stream: S) -> impl futures::Stream<Item = Result<StreamEvent, DomainError>>
where
    S: futures::Stream<Item = Result<Bytes, DomainError>>,
{
    byte_stream
        .map(Some)
        .chain(stream::once(future::ready(None)))
        .scan(SseBuffer::default(), |buf, item| {
            let out: Vec<Result<StreamEvent, DomainError>> = match item {
                Some(Err(e)) => vec![Err(e)],
                _ if buf.done => Vec::new(),
                Some(Ok(bytes)) => {
                    buf.partial.push_str(&String::from_utf8_lossy(&bytes));

                    let mut events = Vec::new();
                    while let Some(pos) = buf.partial.find('\n') {
                        let line = buf.partial[..pos].trim_end_matches('\r').to_string();
                        buf.partial.drain(..=pos);
                        events.extend(consume_line(buf, &line));
                        if buf.done {
                            break;
                        }
                    }
                    events
                }
                // Transport closed: flush the unterminated remainder.
                None => {
                    let line = std::mem::take(&mut buf.partial);
                    consume_line(buf, line.trim_end_matches('\r'))
                }
            };
            future::ready(Some(out))
        })
        .flat_map(stream::iter)
}

fn consume_line(buf: &mut SseBuffer, line: &str) -> Vec<Result<StreamEvent, DomainError>> {
    let mut events = Vec::new();
    for event in parse_sse_line(line) {
        let is_done = event.is_done();
        events.push(Ok(event));
        if is_done {
            buf.done = true;
            break;
        }
    }
    events
}

fn parse_sse_line(line: &str) -> Vec<StreamEvent> {
    let Some(data) = line.strip_prefix("data: ") else {
        return Vec::new();
    };

    if data.trim() == "[DONE]" {
        return vec![StreamEvent::done()];
    }

    let Ok(chunk) = serde_json::from_str::<OpenAiStreamChunk>(data) else {
        return Vec::new();
    };

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Vec::new();
    };

    let mut events = Vec::new();
    if let Some(role) = choice.delta.role {
        events.push(StreamEvent::role(role));
    }
    if let Some(content) = choice.delta.content {
        events.push(StreamEvent::delta(content));
    }
    if choice.finish_reason.is_some() {
        events.push(StreamEvent::done());
    }
    events
}

// OpenAI API wire types

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    id: String,
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    role: Option<String>,
    content: Option<String>,
}
