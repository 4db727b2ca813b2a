//! # AWS Messaging
//!
//! Queue and topic messaging over AWS SQS and SNS.
//!
//! This library provides:
//! - Senders that push raw payloads with content metadata to a queue or topic
//! - Receivers that long-poll a queue and hand out messages one at a time
//! - Idempotent provisioning of queues, topics and topic-to-queue subscriptions
//! - A closed error taxonomy: queue not found, coded client error, untagged
//!   client error
//! - Settings-driven construction of named senders and receivers
//!
//! ## Module Organization
//!
//! - [`attributes`] - Content metadata to and from message attributes
//! - [`error`] - Error types and transport error classification
//! - [`message`] - Received messages and transport records
//! - [`client`] - Transport client traits
//! - [`resource`] - Open, close and configure lifecycle
//! - [`adapter`] - Sender and receiver traits for host applications
//! - [`sqs`] / [`sns`] - Queue and topic implementations
//! - [`settings`] - Named definitions loaded from configuration
//! - [`providers`] - HTTP and in-memory transports
//!
//! ## Example
//!
//! ```no_run
//! use aws_messaging::{
//!     Configurer, ConnectionConfig, MessageReceiver, MessageSender, Opener, SqsReceiver, SqsSender,
//! };
//! use aws_messaging::providers::InMemoryTransport;
//! use bytes::Bytes;
//!
//! # async fn run() -> Result<(), aws_messaging::MessagingError> {
//! let transport = InMemoryTransport::new();
//! let mut sender = SqsSender::new("orders", ConnectionConfig::default(), transport.factory());
//! let mut receiver = SqsReceiver::new("orders", ConnectionConfig::default(), transport.factory());
//!
//! sender.configure().await?;
//! sender.open().await?;
//! receiver.open().await?;
//! sender.send_raw(Bytes::from("hello"), Some("text/plain"), None).await?;
//!
//! let message = receiver.receive_raw().next().await?;
//! receiver.delete(&message).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod attributes;
pub mod client;
pub mod error;
pub mod message;
pub mod providers;
pub mod resource;
pub mod settings;
pub mod sns;
pub mod sqs;

#[cfg(test)]
mod test_support;

// Re-export commonly used types at crate root for convenience
pub use adapter::{MessageReceiver, MessageSender};
pub use attributes::{AttributeMap, AttributeValue, ContentAttributes};
pub use client::{ClientArgs, ClientFactory, ConnectionConfig, QueueClient, TopicClient};
pub use error::{ErrorClassifier, MessagingError, TransportError};
pub use message::{Message, RawMessage};
pub use resource::{Closer, Configurer, Opener, ResourceManager};
pub use settings::{MessagingSettings, ReceiverDefinition, SenderDefinition, SettingsError};
pub use sns::{NotificationEnvelope, SnsReceiver, SnsSender};
pub use sqs::{DeliveryFormat, ReceiveLoop, SqsReceiver, SqsSender};
