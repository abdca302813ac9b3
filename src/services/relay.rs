//! Streaming relay: forwards chat stream events onto a host channel.
//!
//! The relay is a thin pump between a [`ChatStream`] and a channel publisher.
//! Ordering is FIFO, the first terminal event ends the relay, and channel
//! consumers always see a terminal marker even when the provider closes the
//! stream without one.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::chat::{ChatStream, StreamEvent};
use crate::domain::DomainError;

/// Address of a host channel, e.g. `plugin/llm-gateway/chat-abc123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelAddr {
    pub scope: String,
    pub namespace: String,
    pub path: String,
}

impl ChannelAddr {
    pub fn new(
        scope: impl Into<String>,
        namespace: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            scope: scope.into(),
            namespace: namespace.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for ChannelAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.scope, self.namespace, self.path)
    }
}

/// Sink for relayed events. The host supplies the implementation.
#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    async fn publish(&self, addr: &ChannelAddr, payload: Value) -> Result<(), DomainError>;
}

/// Fold one stream event into the accumulated assistant message.
///
/// Pure: replaying the same events over the same accumulator always yields
/// the same string. Only content deltas extend it.
pub fn accumulate(acc: String, event: &StreamEvent) -> String {
    match event {
        StreamEvent::Delta { content } => acc + content,
        _ => acc,
    }
}

/// Pumps chat streams onto a channel.
pub struct StreamRelay {
    publisher: Arc<dyn ChannelPublisher>,
}

impl StreamRelay {
    pub fn new(publisher: Arc<dyn ChannelPublisher>) -> Self {
        Self { publisher }
    }

    /// Forward every event in order, ending at the first terminal event. If
    /// the stream closes without one, a terminal marker is synthesized so
    /// consumers never hang on an open-ended channel.
    pub async fn relay(&self, addr: &ChannelAddr, mut stream: ChatStream) -> Result<(), DomainError> {
        while let Some(event) = stream.next().await {
            let event = event?;
            let done = event.is_done();
            self.publisher.publish(addr, to_wire(&event)?).await?;
            if done {
                debug!(channel = %addr, "relay finished");
                return Ok(());
            }
        }

        debug!(channel = %addr, "stream closed without terminal event");
        self.publisher.publish(addr, to_wire(&StreamEvent::done())?).await
    }

    /// Like [`relay`](Self::relay), but each content delta is folded into the
    /// running assistant message and the full accumulated text is published
    /// instead of the fragment. Returns the final message.
    pub async fn relay_accumulated(
        &self,
        addr: &ChannelAddr,
        mut stream: ChatStream,
    ) -> Result<String, DomainError> {
        let mut message = String::new();

        while let Some(event) = stream.next().await {
            let event = event?;
            if event.is_done() {
                break;
            }
            match &event {
                StreamEvent::Delta { .. } => {
                    message = accumulate(message, &event);
                    self.publisher
                        .publish(addr, json!({ "content": message }))
                        .await?;
                }
                StreamEvent::Role { .. } => {
                    self.publisher.publish(addr, to_wire(&event)?).await?;
                }
                // A false done flag carries nothing worth republishing.
                StreamEvent::Done { .. } => {}
            }
        }

        self.publisher.publish(addr, to_wire(&StreamEvent::done())?).await?;
        Ok(message)
    }
}

fn to_wire(event: &StreamEvent) -> Result<Value, DomainError> {
    serde_json::to_value(event).map_err(|e| DomainError::data(e.to_string()))
}
