//! Message types for send and receive operations.

use crate::attributes::{AttributeMap, ContentAttributes};
use bytes::Bytes;
use std::collections::HashMap;

// ============================================================================
// Transport Records
// ============================================================================

/// A message as returned by a queue receive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    pub message_id: Option<String>,
    pub receipt_handle: String,
    pub md5_of_body: Option<String>,
    pub body: Bytes,
    /// Message attributes; `None` when the response carried none at all
    pub message_attributes: Option<AttributeMap>,
    /// System attributes such as `SentTimestamp`
    pub attributes: HashMap<String, String>,
}

impl TransportMessage {
    /// Create a record with just a receipt handle and body
    pub fn new(receipt_handle: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            message_id: None,
            receipt_handle: receipt_handle.into(),
            md5_of_body: None,
            body: body.into(),
            message_attributes: None,
            attributes: HashMap::new(),
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_message_attributes(mut self, attributes: AttributeMap) -> Self {
        self.message_attributes = Some(attributes);
        self
    }
}

/// Response of a single receive (long-poll) call
///
/// `messages` is `None` when the response had no message list at all, which
/// receivers treat the same as an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveResponse {
    pub messages: Option<Vec<TransportMessage>>,
}

impl ReceiveResponse {
    pub fn empty() -> Self {
        Self { messages: None }
    }

    pub fn with_messages(messages: Vec<TransportMessage>) -> Self {
        Self {
            messages: Some(messages),
        }
    }

    pub fn into_messages(self) -> Vec<TransportMessage> {
        self.messages.unwrap_or_default()
    }
}

/// What remains of a transport record once body and message attributes have
/// been taken out. Needed to acknowledge the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub message_id: Option<String>,
    pub receipt_handle: String,
    pub md5_of_body: Option<String>,
    pub attributes: HashMap<String, String>,
}

// ============================================================================
// Message
// ============================================================================

/// An inbound message delivered by a receiver.
///
/// Messages are never mutated after construction. Acknowledge one by passing
/// it back to the receiver that produced it; nothing is acknowledged
/// automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    body: Bytes,
    content_type: Option<String>,
    content_encoding: Option<String>,
    raw: RawMessage,
    queue_url: String,
}

impl Message {
    /// Split a transport record into payload, metadata and raw record.
    ///
    /// `queue_url` identifies the queue the record was received from.
    pub fn from_transport(message: TransportMessage, queue_url: &str) -> Self {
        let TransportMessage {
            message_id,
            receipt_handle,
            md5_of_body,
            body,
            message_attributes,
            attributes,
        } = message;

        let content = ContentAttributes::decode(message_attributes.as_ref());
        let raw = RawMessage {
            message_id,
            receipt_handle,
            md5_of_body,
            attributes,
        };

        Self::new(body, content, raw, queue_url)
    }

    /// Assemble a message from already-decoded parts
    pub fn new(body: Bytes, content: ContentAttributes, raw: RawMessage, queue_url: &str) -> Self {
        Self {
            body,
            content_type: content.content_type,
            content_encoding: content.content_encoding,
            raw,
            queue_url: queue_url.to_string(),
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.content_encoding.as_deref()
    }

    /// The transport record the message was built from
    pub fn raw(&self) -> &RawMessage {
        &self.raw
    }

    /// Opaque token needed to delete this delivery
    pub fn receipt_handle(&self) -> &str {
        &self.raw.receipt_handle
    }

    /// Address of the queue that delivered the message
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
