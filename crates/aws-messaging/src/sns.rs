//! Publish/subscribe over topics.
//!
//! [`SnsSender`] publishes to a topic. [`SnsReceiver`] reads from a queue
//! subscribed to a topic and strips the notification envelope the topic puts
//! around every delivery, so callers see the payload as it was published.

use crate::adapter::{MessageReceiver, MessageSender};
use crate::attributes::{AttributeMap, AttributeValue, ContentAttributes};
use crate::client::{ClientFactory, ConnectionConfig, QueueClient, TopicClient};
use crate::error::{ErrorClassifier, MessagingError};
use crate::message::{Message, RawMessage, TransportMessage};
use crate::resource::{
    release, Closer, Configurer, Opener, QueueService, ResourceManager, Service, TopicService,
};
use crate::sqs::{DeliveryFormat, ReceiveLoop, SqsReceiver};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Protocol used when subscribing a queue to a topic.
const QUEUE_PROTOCOL: &str = "sqs";

/// Queue attribute holding the queue's ARN.
const QUEUE_ARN_ATTRIBUTE: &str = "QueueArn";

const NOTIFICATION_TYPE: &str = "Notification";

// ============================================================================
// Sender
// ============================================================================

/// Publishes messages to a single topic
#[derive(Debug)]
pub struct SnsSender {
    resource: ResourceManager<TopicService>,
}

impl SnsSender {
    pub fn new(
        topic_name: impl Into<String>,
        connection: ConnectionConfig,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            resource: ResourceManager::new(TopicService, topic_name, connection, factory),
        }
    }

    pub fn topic_name(&self) -> &str {
        self.resource.name()
    }

    pub fn resource(&self) -> &ResourceManager<TopicService> {
        &self.resource
    }
}

#[async_trait]
impl Opener for SnsSender {
    async fn open(&mut self) -> Result<(), MessagingError> {
        self.resource.open().await
    }
}

#[async_trait]
impl Closer for SnsSender {
    async fn close(&mut self) -> Result<(), MessagingError> {
        self.resource.close().await
    }
}

#[async_trait]
impl Configurer for SnsSender {
    async fn configure(&self) -> Result<String, MessagingError> {
        self.resource.configure().await
    }
}

#[async_trait]
impl MessageSender for SnsSender {
    async fn send_raw(
        &self,
        body: Bytes,
        content_type: Option<&str>,
        content_encoding: Option<&str>,
    ) -> Result<String, MessagingError> {
        let (client, topic_arn) = self.resource.endpoint()?;
        let attributes = ContentAttributes::new(content_type, content_encoding).encode();

        client
            .publish(topic_arn, body, attributes)
            .await
            .map_err(ErrorClassifier::classify)
    }
}

// ============================================================================
// Receiver
// ============================================================================

/// Receives topic notifications through a subscribed queue.
///
/// Opening only opens the queue; the topic is touched by `configure` alone.
#[derive(Debug)]
pub struct SnsReceiver {
    topic_name: String,
    queue: SqsReceiver,
}

impl SnsReceiver {
    pub fn new(
        topic_name: impl Into<String>,
        queue_name: impl Into<String>,
        connection: ConnectionConfig,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            topic_name: topic_name.into(),
            queue: SqsReceiver::new(queue_name, connection, factory),
        }
    }

    /// Set the long-poll wait of each receive call
    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.queue = self.queue.with_wait_time(wait_time);
        self
    }

    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    pub fn queue_name(&self) -> &str {
        self.queue.queue_name()
    }

    /// The queue receiver the notifications are read from
    pub fn queue(&self) -> &SqsReceiver {
        &self.queue
    }

    /// Run the provisioning steps with both clients already acquired
    async fn provision(
        &self,
        topics: &dyn TopicClient,
        queues: &dyn QueueClient,
    ) -> Result<String, MessagingError> {
        let topic_arn = match TopicService.qualified_address(&self.topic_name) {
            Some(arn) => arn.to_string(),
            None => topics
                .create_topic(&self.topic_name)
                .await
                .map_err(ErrorClassifier::classify)?,
        };
        info!(topic = %self.topic_name, topic_arn = %topic_arn, "Resolved topic");

        let queue_name = self.queue.queue_name();
        let queue_url = match QueueService.qualified_address(queue_name) {
            Some(url) => url.to_string(),
            None => queues
                .create_queue(queue_name)
                .await
                .map_err(ErrorClassifier::classify)?,
        };
        info!(queue = %queue_name, queue_url = %queue_url, "Created queue");

        let mut attributes = queues
            .get_queue_attributes(&queue_url, &[QUEUE_ARN_ATTRIBUTE])
            .await
            .map_err(ErrorClassifier::classify)?;
        let queue_arn = attributes.remove(QUEUE_ARN_ATTRIBUTE).ok_or_else(|| {
            MessagingError::client(format!(
                "queue `{}` did not report a {} attribute",
                queue_name, QUEUE_ARN_ATTRIBUTE
            ))
        })?;
        info!(queue = %queue_name, queue_arn = %queue_arn, "Resolved queue ARN");

        let subscription_arn = topics
            .subscribe(&topic_arn, &queue_arn, QUEUE_PROTOCOL)
            .await
            .map_err(ErrorClassifier::classify)?;
        info!(
            topic_arn = %topic_arn,
            queue_arn = %queue_arn,
            subscription_arn = %subscription_arn,
            "Subscribed queue to topic"
        );

        Ok(subscription_arn)
    }
}

#[async_trait]
impl Opener for SnsReceiver {
    async fn open(&mut self) -> Result<(), MessagingError> {
        self.queue.open().await
    }
}

#[async_trait]
impl Closer for SnsReceiver {
    async fn close(&mut self) -> Result<(), MessagingError> {
        self.queue.close().await
    }
}

#[async_trait]
impl Configurer for SnsReceiver {
    /// Create the topic and queue and subscribe the queue to the topic.
    ///
    /// Returns the subscription ARN. Steps that already succeeded are not
    /// undone when a later one fails; running `configure` again is safe.
    async fn configure(&self) -> Result<String, MessagingError> {
        let resource = self.queue.resource();
        let factory = resource.factory();
        let connection = resource.connection();

        let topics = TopicService
            .connect(&**factory, connection)
            .await
            .map_err(ErrorClassifier::classify)?;
        let queues = match QueueService.connect(&**factory, connection).await {
            Ok(client) => client,
            Err(err) => {
                release(topics, &self.topic_name).await;
                return Err(ErrorClassifier::classify(err));
            }
        };

        let result = self.provision(&*topics, &*queues).await;

        release(queues, self.queue.queue_name()).await;
        release(topics, &self.topic_name).await;
        result
    }
}

#[async_trait]
impl MessageReceiver for SnsReceiver {
    fn receive_raw(&self) -> ReceiveLoop<'_> {
        ReceiveLoop::new(&self.queue, DeliveryFormat::Notification)
    }

    async fn delete(&self, message: &Message) -> Result<(), MessagingError> {
        self.queue.delete(message).await
    }
}

// ============================================================================
// Notification Envelope
// ============================================================================

/// A message attribute as carried inside a notification envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeAttribute {
    #[serde(rename = "Type")]
    pub data_type: String,

    #[serde(rename = "Value")]
    pub value: String,
}

/// The JSON wrapper a topic places around a message delivered to a queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationEnvelope {
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub message_id: Option<String>,

    #[serde(default)]
    pub topic_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    pub message: String,

    #[serde(default)]
    pub timestamp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_attributes: Option<BTreeMap<String, EnvelopeAttribute>>,
}

impl NotificationEnvelope {
    /// Wrap a published payload the way the topic service does
    pub fn new(
        message_id: impl Into<String>,
        topic_arn: impl Into<String>,
        message: impl Into<String>,
        attributes: &AttributeMap,
    ) -> Self {
        let message_attributes: BTreeMap<String, EnvelopeAttribute> = attributes
            .iter()
            .filter_map(|(name, value)| {
                value.string_value.as_ref().map(|v| {
                    (
                        name.clone(),
                        EnvelopeAttribute {
                            data_type: value.data_type.clone(),
                            value: v.clone(),
                        },
                    )
                })
            })
            .collect();

        Self {
            kind: Some(NOTIFICATION_TYPE.to_string()),
            message_id: Some(message_id.into()),
            topic_arn: Some(topic_arn.into()),
            subject: None,
            message: message.into(),
            timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            message_attributes: (!message_attributes.is_empty()).then_some(message_attributes),
        }
    }

    /// Inner attributes in transport form; binary values are dropped
    pub fn attributes(&self) -> Option<AttributeMap> {
        self.message_attributes.as_ref().map(|attributes| {
            attributes
                .iter()
                .filter(|(_, a)| !a.data_type.starts_with("Binary"))
                .map(|(name, a)| {
                    (
                        name.clone(),
                        AttributeValue {
                            data_type: a.data_type.clone(),
                            string_value: Some(a.value.clone()),
                        },
                    )
                })
                .collect()
        })
    }
}

/// Turn a queue delivery of a topic notification into the published message.
///
/// Content metadata comes from the attributes inside the envelope. The
/// delivery's own attributes are ignored. The raw record is kept unchanged so
/// the message can be deleted from the queue. Envelopes of any other type,
/// such as a subscription confirmation, are rejected.
pub(crate) fn unwrap_notification(
    record: &TransportMessage,
    queue_url: &str,
) -> Result<Message, MessagingError> {
    let envelope: NotificationEnvelope = serde_json::from_slice(&record.body).map_err(|err| {
        MessagingError::client(format!(
            "message `{}` is not a topic notification: {}",
            record.receipt_handle, err
        ))
    })?;

    if envelope.kind.as_deref() != Some(NOTIFICATION_TYPE) {
        return Err(MessagingError::client(format!(
            "message `{}` is a `{}` delivery, not a topic notification",
            record.receipt_handle,
            envelope.kind.as_deref().unwrap_or("untyped")
        )));
    }

    let content = ContentAttributes::decode(envelope.attributes().as_ref());
    let raw = RawMessage {
        message_id: record.message_id.clone(),
        receipt_handle: record.receipt_handle.clone(),
        md5_of_body: record.md5_of_body.clone(),
        attributes: record.attributes.clone(),
    };

    Ok(Message::new(
        Bytes::from(envelope.message),
        content,
        raw,
        queue_url,
    ))
}

#[cfg(test)]
#[path = "sns_tests.rs"]
mod tests;
