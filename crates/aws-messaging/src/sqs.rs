//! Point-to-point queue sender and receiver.

use crate::adapter::{MessageReceiver, MessageSender};
use crate::attributes::{ContentAttributes, RECOGNIZED_ATTRIBUTES};
use crate::client::{ClientFactory, ConnectionConfig};
use crate::error::{ErrorClassifier, MessagingError};
use crate::message::{Message, TransportMessage};
use crate::resource::{Closer, Configurer, Opener, QueueService, ResourceManager};
use crate::sns;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default long-poll wait of a receive call.
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(10);

// ============================================================================
// Sender
// ============================================================================

/// Sends messages to a single queue
#[derive(Debug)]
pub struct SqsSender {
    resource: ResourceManager<QueueService>,
}

impl SqsSender {
    pub fn new(
        queue_name: impl Into<String>,
        connection: ConnectionConfig,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            resource: ResourceManager::new(QueueService, queue_name, connection, factory),
        }
    }

    pub fn queue_name(&self) -> &str {
        self.resource.name()
    }

    pub fn resource(&self) -> &ResourceManager<QueueService> {
        &self.resource
    }
}

#[async_trait]
impl Opener for SqsSender {
    async fn open(&mut self) -> Result<(), MessagingError> {
        self.resource.open().await
    }
}

#[async_trait]
impl Closer for SqsSender {
    async fn close(&mut self) -> Result<(), MessagingError> {
        self.resource.close().await
    }
}

#[async_trait]
impl Configurer for SqsSender {
    async fn configure(&self) -> Result<String, MessagingError> {
        self.resource.configure().await
    }
}

#[async_trait]
impl MessageSender for SqsSender {
    async fn send_raw(
        &self,
        body: Bytes,
        content_type: Option<&str>,
        content_encoding: Option<&str>,
    ) -> Result<String, MessagingError> {
        let (client, queue_url) = self.resource.endpoint()?;
        let attributes = ContentAttributes::new(content_type, content_encoding).encode();

        client
            .send_message(queue_url, body, attributes)
            .await
            .map_err(ErrorClassifier::classify)
    }
}

// ============================================================================
// Receiver
// ============================================================================

/// Receives messages from a single queue by long-polling
#[derive(Debug)]
pub struct SqsReceiver {
    resource: ResourceManager<QueueService>,
    wait_time: Duration,
}

impl SqsReceiver {
    pub fn new(
        queue_name: impl Into<String>,
        connection: ConnectionConfig,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            resource: ResourceManager::new(QueueService, queue_name, connection, factory),
            wait_time: DEFAULT_WAIT_TIME,
        }
    }

    /// Set the long-poll wait of each receive call
    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    pub fn queue_name(&self) -> &str {
        self.resource.name()
    }

    pub fn wait_time(&self) -> Duration {
        self.wait_time
    }

    pub fn resource(&self) -> &ResourceManager<QueueService> {
        &self.resource
    }
}

#[async_trait]
impl Opener for SqsReceiver {
    async fn open(&mut self) -> Result<(), MessagingError> {
        self.resource.open().await
    }
}

#[async_trait]
impl Closer for SqsReceiver {
    async fn close(&mut self) -> Result<(), MessagingError> {
        self.resource.close().await
    }
}

#[async_trait]
impl Configurer for SqsReceiver {
    async fn configure(&self) -> Result<String, MessagingError> {
        self.resource.configure().await
    }
}

#[async_trait]
impl MessageReceiver for SqsReceiver {
    fn receive_raw(&self) -> ReceiveLoop<'_> {
        ReceiveLoop::new(self, DeliveryFormat::Raw)
    }

    async fn delete(&self, message: &Message) -> Result<(), MessagingError> {
        let (client, queue_url) = self.resource.endpoint()?;
        if message.queue_url() != queue_url {
            return Err(MessagingError::client(format!(
                "message was not received from queue `{}`",
                self.resource.name()
            )));
        }

        client
            .delete_message(queue_url, message.receipt_handle())
            .await
            .map_err(ErrorClassifier::classify)
    }
}

// ============================================================================
// Receive Loop
// ============================================================================

/// How the body of a queue delivery is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFormat {
    /// The body is the payload
    Raw,
    /// The body is a topic notification wrapping the payload
    Notification,
}

/// An endless sequence of messages from one queue.
///
/// Each call to [`ReceiveLoop::next`] hands out the next message of the
/// current batch, long-polling for a new batch when the current one is used
/// up. Empty polls are not reported. Dropping the loop between calls leaves
/// nothing half-open.
///
/// A delivery that cannot be decoded is reported as an error and kept aside;
/// [`ReceiveLoop::take_rejected`] hands it out so it can be deleted.
pub struct ReceiveLoop<'a> {
    receiver: &'a SqsReceiver,
    format: DeliveryFormat,
    pending: VecDeque<TransportMessage>,
    rejected: Option<Message>,
    source: String,
    started: bool,
}

impl<'a> ReceiveLoop<'a> {
    pub(crate) fn new(receiver: &'a SqsReceiver, format: DeliveryFormat) -> Self {
        Self {
            receiver,
            format,
            pending: VecDeque::new(),
            rejected: None,
            source: String::new(),
            started: false,
        }
    }

    pub fn format(&self) -> DeliveryFormat {
        self.format
    }

    /// Wait for the next message.
    ///
    /// Errors from a poll are returned as-is; calling `next` again polls
    /// again.
    pub async fn next(&mut self) -> Result<Message, MessagingError> {
        let receiver = self.receiver;
        self.rejected = None;
        if !self.started {
            debug!(queue = %receiver.queue_name(), "Starting SQS listener");
            self.started = true;
        }

        loop {
            if let Some(record) = self.pending.pop_front() {
                return self.decode(record);
            }

            let (client, queue_url) = receiver.resource.endpoint()?;
            let response = client
                .receive_message(queue_url, receiver.wait_time, &RECOGNIZED_ATTRIBUTES)
                .await
                .map_err(ErrorClassifier::classify)?;

            let messages = response.into_messages();
            if messages.is_empty() {
                debug!(queue = %receiver.queue_name(), "No messages in queue");
                continue;
            }

            self.source = queue_url.to_string();
            self.pending.extend(messages);
        }
    }

    fn decode(&mut self, record: TransportMessage) -> Result<Message, MessagingError> {
        match self.format {
            DeliveryFormat::Raw => Ok(Message::from_transport(record, &self.source)),
            DeliveryFormat::Notification => {
                match sns::unwrap_notification(&record, &self.source) {
                    Ok(message) => Ok(message),
                    Err(err) => {
                        warn!(
                            queue = %self.receiver.queue_name(),
                            receipt_handle = %record.receipt_handle,
                            error = %err,
                            "Rejected undecodable delivery"
                        );
                        self.rejected = Some(Message::from_transport(record, &self.source));
                        Err(err)
                    }
                }
            }
        }
    }

    /// The delivery behind the error just returned by [`ReceiveLoop::next`].
    ///
    /// The message is the record as received, body and attributes untouched.
    /// Passing it to the receiver's `delete` removes it from the queue. The
    /// next call to `next` discards a record that was not taken.
    pub fn take_rejected(&mut self) -> Option<Message> {
        self.rejected.take()
    }

    /// Turn the loop into a stream that ends after the first error
    pub fn into_stream(self) -> impl Stream<Item = Result<Message, MessagingError>> + Send + 'a {
        stream::try_unfold(self, |mut receive| async move {
            let message = receive.next().await?;
            Ok(Some((message, receive)))
        })
    }
}

impl std::fmt::Debug for ReceiveLoop<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveLoop")
            .field("queue", &self.receiver.queue_name())
            .field("format", &self.format)
            .field("pending", &self.pending.len())
            .field("rejected", &self.rejected.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "sqs_tests.rs"]
mod tests;
