//! Transport client traits.
//!
//! These describe the queue and topic service as this crate consumes it.
//! Implementations live in [`crate::providers`]; host applications can supply
//! their own through [`ClientFactory`].

use crate::attributes::AttributeMap;
use crate::error::TransportError;
use crate::message::ReceiveResponse;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Services a client can be created for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Sqs,
    Sns,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqs => "sqs",
            Self::Sns => "sns",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword arguments passed through to transport clients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientArgs {
    /// Endpoint override, e.g. a local emulator
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Region override; takes precedence over the profile's region
    #[serde(default)]
    pub region: Option<String>,
}

/// Everything needed to create a transport client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Named credential profile; `None` selects the default profile
    #[serde(default)]
    pub profile: Option<String>,

    #[serde(default)]
    pub client_args: ClientArgs,
}

impl ConnectionConfig {
    pub fn new(profile: Option<String>, client_args: ClientArgs) -> Self {
        Self {
            profile,
            client_args,
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.client_args.endpoint_url = Some(endpoint_url.into());
        self
    }
}

/// A connection that must be released once it is no longer needed
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Release the connection
    async fn close(&self) -> Result<(), TransportError>;
}

/// Queue service operations
#[async_trait]
pub trait QueueClient: TransportClient {
    /// Resolve a queue name to its URL
    async fn get_queue_url(&self, queue_name: &str) -> Result<String, TransportError>;

    /// Create a queue, or return the URL of the existing one
    async fn create_queue(&self, queue_name: &str) -> Result<String, TransportError>;

    /// Fetch selected queue attributes such as `QueueArn`
    async fn get_queue_attributes(
        &self,
        queue_url: &str,
        attribute_names: &[&str],
    ) -> Result<HashMap<String, String>, TransportError>;

    /// Send one message; returns the transport message id
    async fn send_message(
        &self,
        queue_url: &str,
        body: Bytes,
        attributes: AttributeMap,
    ) -> Result<String, TransportError>;

    /// Long-poll for messages for at most `wait`
    async fn receive_message(
        &self,
        queue_url: &str,
        wait: Duration,
        attribute_names: &[&str],
    ) -> Result<ReceiveResponse, TransportError>;

    /// Delete one delivery by receipt handle
    async fn delete_message(&self, queue_url: &str, receipt_handle: &str)
        -> Result<(), TransportError>;
}

/// Topic service operations
#[async_trait]
pub trait TopicClient: TransportClient {
    /// Create a topic, or return the ARN of the existing one
    async fn create_topic(&self, topic_name: &str) -> Result<String, TransportError>;

    /// Subscribe an endpoint; returns the subscription ARN
    async fn subscribe(
        &self,
        topic_arn: &str,
        endpoint: &str,
        protocol: &str,
    ) -> Result<String, TransportError>;

    /// Publish one message; returns the transport message id
    async fn publish(
        &self,
        topic_arn: &str,
        body: Bytes,
        attributes: AttributeMap,
    ) -> Result<String, TransportError>;
}

/// Creates transport clients.
///
/// Each call returns a new, independently owned connection. Clients are never
/// shared between resources.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn queue_client(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn QueueClient>, TransportError>;

    async fn topic_client(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn TopicClient>, TransportError>;
}
