//! Recording transport stub shared by the unit tests.
//!
//! Every client created by a [`StubTransport`] reports into the same
//! [`StubState`], so a test can script responses up front and inspect the
//! calls afterwards.

use crate::attributes::AttributeMap;
use crate::client::{
    ClientFactory, ConnectionConfig, QueueClient, ServiceKind, TopicClient, TransportClient,
};
use crate::error::TransportError;
use crate::message::ReceiveResponse;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub(crate) const STUB_QUEUE_PREFIX: &str = "http://example.com/";
pub(crate) const STUB_TOPIC_PREFIX: &str = "arn:aws:sns:stub:000000000000:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentMessage {
    pub address: String,
    pub body: Bytes,
    pub attributes: AttributeMap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReceiveCall {
    pub queue_url: String,
    pub wait: Duration,
    pub attribute_names: Vec<String>,
}

#[derive(Debug, Default)]
pub(crate) struct StubState {
    pub connects: Vec<(ServiceKind, ConnectionConfig)>,
    pub closes: Vec<ServiceKind>,
    pub connect_error: Option<TransportError>,
    pub close_error: Option<TransportError>,

    pub get_queue_url_calls: Vec<String>,
    pub get_queue_url_error: Option<TransportError>,
    pub create_queue_calls: Vec<String>,
    pub create_queue_error: Option<TransportError>,
    pub queue_attribute_calls: Vec<(String, Vec<String>)>,
    pub sent: Vec<SentMessage>,
    pub send_error: Option<TransportError>,
    pub message_id: Option<String>,
    pub receive_script: VecDeque<Result<ReceiveResponse, TransportError>>,
    pub receive_calls: Vec<ReceiveCall>,
    pub deleted: Vec<(String, String)>,

    pub create_topic_calls: Vec<String>,
    pub create_topic_error: Option<TransportError>,
    pub subscribe_calls: Vec<(String, String, String)>,
    pub subscribe_error: Option<TransportError>,
    pub published: Vec<SentMessage>,
}

impl StubState {
    /// Clients acquired but not yet released
    pub fn outstanding(&self) -> usize {
        self.connects.len() - self.closes.len()
    }
}

/// Client factory whose clients record into shared state
#[derive(Clone, Default)]
pub(crate) struct StubTransport {
    state: Arc<Mutex<StubState>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap()
    }

    pub fn factory(&self) -> Arc<dyn ClientFactory> {
        Arc::new(self.clone())
    }

    pub fn script_receive(&self, response: Result<ReceiveResponse, TransportError>) {
        self.state().receive_script.push_back(response);
    }

    fn client(&self, kind: ServiceKind) -> StubClient {
        StubClient {
            kind,
            state: Arc::clone(&self.state),
        }
    }

    fn record_connect(
        &self,
        kind: ServiceKind,
        config: &ConnectionConfig,
    ) -> Result<StubClient, TransportError> {
        let mut state = self.state();
        if let Some(err) = state.connect_error.clone() {
            return Err(err);
        }
        state.connects.push((kind, config.clone()));
        Ok(self.client(kind))
    }
}

#[async_trait]
impl ClientFactory for StubTransport {
    async fn queue_client(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn QueueClient>, TransportError> {
        Ok(Box::new(self.record_connect(ServiceKind::Sqs, config)?))
    }

    async fn topic_client(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn TopicClient>, TransportError> {
        Ok(Box::new(self.record_connect(ServiceKind::Sns, config)?))
    }
}

pub(crate) struct StubClient {
    kind: ServiceKind,
    state: Arc<Mutex<StubState>>,
}

impl StubClient {
    fn state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap()
    }
}

fn fail_or<T>(error: &Option<TransportError>, value: T) -> Result<T, TransportError> {
    match error {
        Some(err) => Err(err.clone()),
        None => Ok(value),
    }
}

#[async_trait]
impl TransportClient for StubClient {
    async fn close(&self) -> Result<(), TransportError> {
        let mut state = self.state();
        state.closes.push(self.kind);
        fail_or(&state.close_error, ())
    }
}

#[async_trait]
impl QueueClient for StubClient {
    async fn get_queue_url(&self, queue_name: &str) -> Result<String, TransportError> {
        let mut state = self.state();
        state.get_queue_url_calls.push(queue_name.to_string());
        fail_or(
            &state.get_queue_url_error,
            format!("{}{}", STUB_QUEUE_PREFIX, queue_name),
        )
    }

    async fn create_queue(&self, queue_name: &str) -> Result<String, TransportError> {
        let mut state = self.state();
        state.create_queue_calls.push(queue_name.to_string());
        fail_or(
            &state.create_queue_error,
            format!("{}{}", STUB_QUEUE_PREFIX, queue_name),
        )
    }

    async fn get_queue_attributes(
        &self,
        queue_url: &str,
        attribute_names: &[&str],
    ) -> Result<HashMap<String, String>, TransportError> {
        let mut state = self.state();
        state.queue_attribute_calls.push((
            queue_url.to_string(),
            attribute_names.iter().map(|n| n.to_string()).collect(),
        ));
        let name = queue_url.rsplit('/').next().unwrap_or(queue_url);
        let mut attributes = HashMap::new();
        attributes.insert(
            "QueueArn".to_string(),
            format!("arn:aws:sqs:stub:000000000000:{}", name),
        );
        Ok(attributes)
    }

    async fn send_message(
        &self,
        queue_url: &str,
        body: Bytes,
        attributes: AttributeMap,
    ) -> Result<String, TransportError> {
        let mut state = self.state();
        if let Some(err) = state.send_error.clone() {
            return Err(err);
        }
        state.sent.push(SentMessage {
            address: queue_url.to_string(),
            body,
            attributes,
        });
        Ok(state
            .message_id
            .clone()
            .unwrap_or_else(|| format!("m-{}", state.sent.len())))
    }

    async fn receive_message(
        &self,
        queue_url: &str,
        wait: Duration,
        attribute_names: &[&str],
    ) -> Result<ReceiveResponse, TransportError> {
        let mut state = self.state();
        state.receive_calls.push(ReceiveCall {
            queue_url: queue_url.to_string(),
            wait,
            attribute_names: attribute_names.iter().map(|n| n.to_string()).collect(),
        });
        state
            .receive_script
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::other("receive script exhausted")))
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), TransportError> {
        self.state()
            .deleted
            .push((queue_url.to_string(), receipt_handle.to_string()));
        Ok(())
    }
}

#[async_trait]
impl TopicClient for StubClient {
    async fn create_topic(&self, topic_name: &str) -> Result<String, TransportError> {
        let mut state = self.state();
        state.create_topic_calls.push(topic_name.to_string());
        fail_or(
            &state.create_topic_error,
            format!("{}{}", STUB_TOPIC_PREFIX, topic_name),
        )
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        endpoint: &str,
        protocol: &str,
    ) -> Result<String, TransportError> {
        let mut state = self.state();
        state.subscribe_calls.push((
            topic_arn.to_string(),
            endpoint.to_string(),
            protocol.to_string(),
        ));
        fail_or(
            &state.subscribe_error,
            format!("{}:subscription-1", topic_arn),
        )
    }

    async fn publish(
        &self,
        topic_arn: &str,
        body: Bytes,
        attributes: AttributeMap,
    ) -> Result<String, TransportError> {
        let mut state = self.state();
        state.published.push(SentMessage {
            address: topic_arn.to_string(),
            body,
            attributes,
        });
        Ok(state
            .message_id
            .clone()
            .unwrap_or_else(|| format!("p-{}", state.published.len())))
    }
}
