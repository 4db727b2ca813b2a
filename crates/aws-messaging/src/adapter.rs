//! Sender and receiver interfaces consumed by host applications.

use crate::error::MessagingError;
use crate::message::Message;
use crate::resource::{Closer, Configurer, Opener};
use crate::sqs::ReceiveLoop;
use async_trait::async_trait;
use bytes::Bytes;

/// Publishes raw payloads to a queue or topic
#[async_trait]
pub trait MessageSender: Opener + Closer + Configurer + Send + Sync {
    /// Send one payload with optional content metadata.
    ///
    /// Requires the sender to be open. Returns the transport-assigned message
    /// id unchanged. Failures are not retried.
    async fn send_raw(
        &self,
        body: Bytes,
        content_type: Option<&str>,
        content_encoding: Option<&str>,
    ) -> Result<String, MessagingError>;
}

/// Receives and acknowledges messages
#[async_trait]
pub trait MessageReceiver: Opener + Closer + Configurer + Send + Sync {
    /// Start a fresh poll loop over the queue.
    ///
    /// The loop never ends on its own; stop calling `next` to stop receiving.
    fn receive_raw(&self) -> ReceiveLoop<'_>;

    /// Acknowledge a message produced by this receiver.
    ///
    /// This includes a delivery handed out by [`ReceiveLoop::take_rejected`].
    async fn delete(&self, message: &Message) -> Result<(), MessagingError>;
}
