//! In-memory queue and topic service for testing and development.
//!
//! All clients created from one [`InMemoryTransport`] share the same queues
//! and topics, so a sender and a receiver built on the same transport talk to
//! each other the way they would through the real service:
//! - Queue creation, topic creation and subscription are idempotent
//! - Receives long-poll up to the requested wait and return at most 10 messages
//! - Received messages stay in flight until deleted; there is no visibility
//!   timeout, so an undeleted message is never redelivered
//! - Publishing to a topic delivers a notification envelope to every
//!   subscribed queue
//!
//! The transport also counts acquired and released clients so tests can check
//! that every client is given back.

use crate::attributes::AttributeMap;
use crate::client::{
    ClientFactory, ConnectionConfig, QueueClient, ServiceKind, TopicClient, TransportClient,
};
use crate::error::TransportError;
use crate::message::{ReceiveResponse, TransportMessage};
use crate::sns::NotificationEnvelope;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

const ACCOUNT_ID: &str = "000000000000";
const REGION: &str = "memory";

/// Base URL of every in-memory queue.
pub const QUEUE_URL_PREFIX: &str = "http://sqs.memory.localhost/000000000000/";

/// Most messages a single receive call returns.
const MAX_RECEIVE_BATCH: usize = 10;

/// Attribute name selecting every attribute.
const ALL_ATTRIBUTES: &str = "All";

const NON_EXISTENT_QUEUE: &str = "AWS.SimpleQueueService.NonExistentQueue";
const TOPIC_NOT_FOUND: &str = "NotFound";
const INVALID_PARAMETER: &str = "InvalidParameter";
const INVALID_MESSAGE_CONTENTS: &str = "InvalidMessageContents";

// ============================================================================
// Internal Storage Structures
// ============================================================================

#[derive(Default)]
struct Storage {
    queues: HashMap<String, InMemoryQueue>,
    topics: HashMap<String, InMemoryTopic>,
    clients_acquired: usize,
    clients_released: usize,
}

impl Storage {
    fn queue_by_url(&mut self, queue_url: &str) -> Result<&mut InMemoryQueue, TransportError> {
        queue_url
            .strip_prefix(QUEUE_URL_PREFIX)
            .and_then(|name| self.queues.get_mut(name))
            .ok_or_else(|| {
                TransportError::service(
                    NON_EXISTENT_QUEUE,
                    format!("The specified queue does not exist: {}", queue_url),
                )
            })
    }

    fn topic(&mut self, topic_arn: &str) -> Result<&mut InMemoryTopic, TransportError> {
        self.topics.get_mut(topic_arn).ok_or_else(|| {
            TransportError::service(
                TOPIC_NOT_FOUND,
                format!("Topic does not exist: {}", topic_arn),
            )
        })
    }
}

struct InMemoryQueue {
    arn: String,
    messages: VecDeque<StoredMessage>,
    in_flight: HashMap<String, StoredMessage>,
    notify: Arc<Notify>,
}

impl InMemoryQueue {
    fn new(name: &str) -> Self {
        Self {
            arn: format!("arn:aws:sqs:{}:{}:{}", REGION, ACCOUNT_ID, name),
            messages: VecDeque::new(),
            in_flight: HashMap::new(),
            notify: Arc::new(Notify::new()),
        }
    }

    fn push(&mut self, message: StoredMessage) {
        self.messages.push_back(message);
        self.notify.notify_one();
    }

    /// Move up to one batch of visible messages in flight
    fn take_batch(&mut self, attribute_names: &[&str]) -> Vec<TransportMessage> {
        let count = self.messages.len().min(MAX_RECEIVE_BATCH);
        let mut batch = Vec::with_capacity(count);

        for mut stored in self.messages.drain(..count) {
            stored.receive_count += 1;
            let receipt_handle = uuid::Uuid::new_v4().to_string();
            batch.push(stored.to_transport(&receipt_handle, attribute_names));
            self.in_flight.insert(receipt_handle, stored);
        }

        batch
    }
}

#[derive(Clone)]
struct StoredMessage {
    message_id: String,
    body: Bytes,
    attributes: AttributeMap,
    sent_at: DateTime<Utc>,
    receive_count: u32,
}

impl StoredMessage {
    fn new(body: Bytes, attributes: AttributeMap) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            body,
            attributes,
            sent_at: Utc::now(),
            receive_count: 0,
        }
    }

    fn to_transport(&self, receipt_handle: &str, attribute_names: &[&str]) -> TransportMessage {
        let selected: AttributeMap = self
            .attributes
            .iter()
            .filter(|(name, _)| {
                attribute_names
                    .iter()
                    .any(|n| *n == ALL_ATTRIBUTES || *n == name.as_str())
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let mut message = TransportMessage::new(receipt_handle, self.body.clone())
            .with_message_id(self.message_id.clone());
        if !selected.is_empty() {
            message = message.with_message_attributes(selected);
        }
        message.attributes.insert(
            "SentTimestamp".to_string(),
            self.sent_at.timestamp_millis().to_string(),
        );
        message.attributes.insert(
            "ApproximateReceiveCount".to_string(),
            self.receive_count.to_string(),
        );
        message
    }
}

struct InMemoryTopic {
    /// Subscription ARN and subscribed queue ARN
    subscriptions: Vec<(String, String)>,
}

fn utf8_body(body: &Bytes) -> Result<&str, TransportError> {
    std::str::from_utf8(body).map_err(|_| {
        TransportError::service(INVALID_MESSAGE_CONTENTS, "Message body must be valid UTF-8")
    })
}

fn validate_name(name: &str) -> Result<(), TransportError> {
    let valid = !name.is_empty()
        && name.len() <= 80
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(TransportError::service(
            INVALID_PARAMETER,
            format!("Invalid resource name `{}`", name),
        ))
    }
}

// ============================================================================
// InMemoryTransport
// ============================================================================

/// Client factory over shared in-memory queues and topics
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    storage: Arc<RwLock<Storage>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// URL the queue called `name` has (or would have)
    pub fn queue_url(name: &str) -> String {
        format!("{}{}", QUEUE_URL_PREFIX, name)
    }

    /// This transport as a shareable factory
    pub fn factory(&self) -> Arc<dyn ClientFactory> {
        Arc::new(self.clone())
    }

    /// Clients created and not yet closed
    pub fn outstanding_clients(&self) -> usize {
        self.read(|s| s.clients_acquired - s.clients_released)
    }

    pub fn clients_acquired(&self) -> usize {
        self.read(|s| s.clients_acquired)
    }

    /// Messages waiting to be received, or `None` for an unknown queue
    pub fn visible_messages(&self, queue_name: &str) -> Option<usize> {
        self.read(|s| s.queues.get(queue_name).map(|q| q.messages.len()))
    }

    /// Messages received but not yet deleted, or `None` for an unknown queue
    pub fn in_flight_messages(&self, queue_name: &str) -> Option<usize> {
        self.read(|s| s.queues.get(queue_name).map(|q| q.in_flight.len()))
    }

    /// Queue ARNs subscribed to a topic
    pub fn subscribers(&self, topic_arn: &str) -> Vec<String> {
        self.read(|s| {
            s.topics
                .get(topic_arn)
                .map(|t| t.subscriptions.iter().map(|(_, q)| q.clone()).collect())
                .unwrap_or_default()
        })
    }

    fn read<T>(&self, f: impl FnOnce(&Storage) -> T) -> T {
        match self.storage.read() {
            Ok(storage) => f(&storage),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn client(&self, kind: ServiceKind) -> Result<InMemoryClient, TransportError> {
        let mut storage = write(&self.storage)?;
        storage.clients_acquired += 1;
        debug!(service = %kind, "Created in-memory client");

        Ok(InMemoryClient {
            kind,
            storage: Arc::clone(&self.storage),
            closed: AtomicBool::new(false),
        })
    }
}

fn write(storage: &RwLock<Storage>) -> Result<RwLockWriteGuard<'_, Storage>, TransportError> {
    storage
        .write()
        .map_err(|_| TransportError::other("In-memory storage lock poisoned"))
}

#[async_trait]
impl ClientFactory for InMemoryTransport {
    async fn queue_client(
        &self,
        _config: &ConnectionConfig,
    ) -> Result<Box<dyn QueueClient>, TransportError> {
        Ok(Box::new(self.client(ServiceKind::Sqs)?))
    }

    async fn topic_client(
        &self,
        _config: &ConnectionConfig,
    ) -> Result<Box<dyn TopicClient>, TransportError> {
        Ok(Box::new(self.client(ServiceKind::Sns)?))
    }
}

// ============================================================================
// InMemoryClient
// ============================================================================

/// A queue or topic client over shared in-memory storage
pub struct InMemoryClient {
    kind: ServiceKind,
    storage: Arc<RwLock<Storage>>,
    closed: AtomicBool,
}

impl InMemoryClient {
    /// Lock storage for a call; fails once the client is closed
    fn storage(&self) -> Result<RwLockWriteGuard<'_, Storage>, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::other(format!(
                "{} client is closed",
                self.kind
            )));
        }
        write(&self.storage)
    }
}

#[async_trait]
impl TransportClient for InMemoryClient {
    async fn close(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            write(&self.storage)?.clients_released += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl QueueClient for InMemoryClient {
    async fn get_queue_url(&self, queue_name: &str) -> Result<String, TransportError> {
        let storage = self.storage()?;
        if storage.queues.contains_key(queue_name) {
            Ok(InMemoryTransport::queue_url(queue_name))
        } else {
            Err(TransportError::service(
                NON_EXISTENT_QUEUE,
                "The specified queue does not exist for this wsdl version.",
            ))
        }
    }

    async fn create_queue(&self, queue_name: &str) -> Result<String, TransportError> {
        validate_name(queue_name)?;
        let mut storage = self.storage()?;
        storage
            .queues
            .entry(queue_name.to_string())
            .or_insert_with(|| InMemoryQueue::new(queue_name));
        Ok(InMemoryTransport::queue_url(queue_name))
    }

    async fn get_queue_attributes(
        &self,
        queue_url: &str,
        attribute_names: &[&str],
    ) -> Result<HashMap<String, String>, TransportError> {
        let mut storage = self.storage()?;
        let queue = storage.queue_by_url(queue_url)?;

        let available = [
            ("QueueArn", queue.arn.clone()),
            ("ApproximateNumberOfMessages", queue.messages.len().to_string()),
            (
                "ApproximateNumberOfMessagesNotVisible",
                queue.in_flight.len().to_string(),
            ),
        ];

        Ok(available
            .into_iter()
            .filter(|(name, _)| {
                attribute_names
                    .iter()
                    .any(|n| *n == ALL_ATTRIBUTES || n == name)
            })
            .map(|(name, value)| (name.to_string(), value))
            .collect())
    }

    async fn send_message(
        &self,
        queue_url: &str,
        body: Bytes,
        attributes: AttributeMap,
    ) -> Result<String, TransportError> {
        utf8_body(&body)?;
        let mut storage = self.storage()?;
        let queue = storage.queue_by_url(queue_url)?;

        let message = StoredMessage::new(body, attributes);
        let message_id = message.message_id.clone();
        queue.push(message);
        Ok(message_id)
    }

    async fn receive_message(
        &self,
        queue_url: &str,
        wait: Duration,
        attribute_names: &[&str],
    ) -> Result<ReceiveResponse, TransportError> {
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            let notify = {
                let mut storage = self.storage()?;
                let queue = storage.queue_by_url(queue_url)?;
                let batch = queue.take_batch(attribute_names);
                if !batch.is_empty() {
                    return Ok(ReceiveResponse::with_messages(batch));
                }
                Arc::clone(&queue.notify)
            };

            if tokio::time::timeout_at(deadline, notify.notified())
                .await
                .is_err()
            {
                return Ok(ReceiveResponse::empty());
            }
        }
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), TransportError> {
        let mut storage = self.storage()?;
        let queue = storage.queue_by_url(queue_url)?;
        queue.in_flight.remove(receipt_handle);
        Ok(())
    }
}

#[async_trait]
impl TopicClient for InMemoryClient {
    async fn create_topic(&self, topic_name: &str) -> Result<String, TransportError> {
        validate_name(topic_name)?;
        let arn = format!("arn:aws:sns:{}:{}:{}", REGION, ACCOUNT_ID, topic_name);
        let mut storage = self.storage()?;
        storage
            .topics
            .entry(arn.clone())
            .or_insert_with(|| InMemoryTopic {
                subscriptions: Vec::new(),
            });
        Ok(arn)
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        endpoint: &str,
        protocol: &str,
    ) -> Result<String, TransportError> {
        if protocol != "sqs" {
            return Err(TransportError::service(
                INVALID_PARAMETER,
                format!("Unsupported protocol `{}`", protocol),
            ));
        }

        let mut storage = self.storage()?;
        let topic = storage.topic(topic_arn)?;
        if let Some((subscription, _)) = topic.subscriptions.iter().find(|(_, q)| q == endpoint) {
            return Ok(subscription.clone());
        }

        let subscription = format!("{}:{}", topic_arn, uuid::Uuid::new_v4());
        topic
            .subscriptions
            .push((subscription.clone(), endpoint.to_string()));
        Ok(subscription)
    }

    async fn publish(
        &self,
        topic_arn: &str,
        body: Bytes,
        attributes: AttributeMap,
    ) -> Result<String, TransportError> {
        let text = utf8_body(&body)?;
        let message_id = uuid::Uuid::new_v4().to_string();
        let envelope = NotificationEnvelope::new(message_id.as_str(), topic_arn, text, &attributes);
        let notification = serde_json::to_string(&envelope)
            .map_err(|e| TransportError::other(format!("Failed to encode notification: {}", e)))?;

        let mut storage = self.storage()?;
        let subscribers: Vec<String> = storage
            .topic(topic_arn)?
            .subscriptions
            .iter()
            .map(|(_, queue_arn)| queue_arn.clone())
            .collect();

        for queue in storage.queues.values_mut() {
            if subscribers.contains(&queue.arn) {
                queue.push(StoredMessage::new(
                    Bytes::from(notification.clone()),
                    AttributeMap::new(),
                ));
            }
        }

        Ok(message_id)
    }
}
