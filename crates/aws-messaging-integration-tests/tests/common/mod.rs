//! Common test utilities for aws-messaging integration tests
//!
//! This module provides:
//! - Builders for senders and receivers over one shared in-memory transport
//! - A bounded receive helper so a broken loop fails the test instead of hanging

use aws_messaging::providers::InMemoryTransport;
use aws_messaging::{
    ConnectionConfig, Message, MessageReceiver, MessagingError, Opener, SqsReceiver, SqsSender,
};
use std::time::Duration;

/// Upper bound on waiting for a single message
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Long-poll wait used by receivers in these tests
pub const POLL_WAIT: Duration = Duration::from_millis(50);

#[allow(dead_code)]
pub fn queue_sender(transport: &InMemoryTransport, queue_name: &str) -> SqsSender {
    SqsSender::new(queue_name, ConnectionConfig::default(), transport.factory())
}

#[allow(dead_code)]
pub fn queue_receiver(transport: &InMemoryTransport, queue_name: &str) -> SqsReceiver {
    SqsReceiver::new(queue_name, ConnectionConfig::default(), transport.factory())
        .with_wait_time(POLL_WAIT)
}

/// Open a sender and receiver on a queue that already exists
#[allow(dead_code)]
pub async fn open_queue_pair(
    transport: &InMemoryTransport,
    queue_name: &str,
) -> (SqsSender, SqsReceiver) {
    let mut sender = queue_sender(transport, queue_name);
    let mut receiver = queue_receiver(transport, queue_name);
    sender.open().await.expect("sender should open");
    receiver.open().await.expect("receiver should open");
    (sender, receiver)
}

/// Receive one message, failing the test if none arrives in time
#[allow(dead_code)]
pub async fn receive_one<R>(receiver: &R) -> Result<Message, MessagingError>
where
    R: MessageReceiver + ?Sized,
{
    let mut receive = receiver.receive_raw();
    tokio::time::timeout(RECEIVE_TIMEOUT, receive.next())
        .await
        .expect("no message arrived in time")
}
