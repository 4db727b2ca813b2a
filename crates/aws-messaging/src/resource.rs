//! Connection lifecycle for queues and topics.
//!
//! A [`ResourceManager`] owns at most one open transport client together with
//! the address it resolved. Both are set by a successful [`Opener::open`] and
//! cleared together by [`Closer::close`]; a failed `open` leaves neither set.
//! [`Configurer::configure`] is independent of that state and uses a client
//! of its own that is released before returning.

use crate::client::{
    ClientFactory, ConnectionConfig, QueueClient, ServiceKind, TopicClient, TransportClient,
};
use crate::error::{ErrorClassifier, MessagingError, TransportError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Prefixes marking a queue name as an already-resolved queue URL.
const QUEUE_URL_PREFIXES: &[&str] = &["https://", "http://"];

/// Prefix marking a topic name as an already-resolved topic ARN.
const TOPIC_ARN_PREFIX: &str = "arn:";

// ============================================================================
// Capability Traits
// ============================================================================

/// Acquire a client and resolve the endpoint address
#[async_trait]
pub trait Opener {
    async fn open(&mut self) -> Result<(), MessagingError>;
}

/// Release the client and forget the endpoint address
#[async_trait]
pub trait Closer {
    async fn close(&mut self) -> Result<(), MessagingError>;
}

/// Idempotently provision the backing resources.
///
/// Returns the address (or subscription identifier) of what was provisioned.
#[async_trait]
pub trait Configurer {
    async fn configure(&self) -> Result<String, MessagingError>;
}

// ============================================================================
// Services
// ============================================================================

/// How a kind of resource is connected to, resolved and created
#[async_trait]
pub trait Service: Send + Sync + 'static {
    type Client: TransportClient + ?Sized;

    fn kind(&self) -> ServiceKind;

    async fn connect(
        &self,
        factory: &dyn ClientFactory,
        config: &ConnectionConfig,
    ) -> Result<Box<Self::Client>, TransportError>;

    /// Return `name` unchanged when it is already a fully qualified address
    fn qualified_address<'a>(&self, name: &'a str) -> Option<&'a str>;

    /// Look up the address of an existing resource
    async fn resolve(&self, client: &Self::Client, name: &str) -> Result<String, TransportError>;

    /// Create the resource if absent and return its address
    async fn create(&self, client: &Self::Client, name: &str) -> Result<String, TransportError>;
}

/// Point-to-point queues, addressed by queue URL
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueService;

#[async_trait]
impl Service for QueueService {
    type Client = dyn QueueClient;

    fn kind(&self) -> ServiceKind {
        ServiceKind::Sqs
    }

    async fn connect(
        &self,
        factory: &dyn ClientFactory,
        config: &ConnectionConfig,
    ) -> Result<Box<Self::Client>, TransportError> {
        factory.queue_client(config).await
    }

    fn qualified_address<'a>(&self, name: &'a str) -> Option<&'a str> {
        QUEUE_URL_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
            .then_some(name)
    }

    async fn resolve(&self, client: &Self::Client, name: &str) -> Result<String, TransportError> {
        client.get_queue_url(name).await
    }

    async fn create(&self, client: &Self::Client, name: &str) -> Result<String, TransportError> {
        client.create_queue(name).await
    }
}

/// Publish/subscribe topics, addressed by topic ARN
///
/// Topic creation is idempotent, so resolving a topic also creates it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicService;

#[async_trait]
impl Service for TopicService {
    type Client = dyn TopicClient;

    fn kind(&self) -> ServiceKind {
        ServiceKind::Sns
    }

    async fn connect(
        &self,
        factory: &dyn ClientFactory,
        config: &ConnectionConfig,
    ) -> Result<Box<Self::Client>, TransportError> {
        factory.topic_client(config).await
    }

    fn qualified_address<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.starts_with(TOPIC_ARN_PREFIX).then_some(name)
    }

    async fn resolve(&self, client: &Self::Client, name: &str) -> Result<String, TransportError> {
        client.create_topic(name).await
    }

    async fn create(&self, client: &Self::Client, name: &str) -> Result<String, TransportError> {
        client.create_topic(name).await
    }
}

// ============================================================================
// Resource Manager
// ============================================================================

/// An open client together with the address it resolved
struct Endpoint<C: ?Sized> {
    client: Box<C>,
    address: String,
}

/// Owns the connection lifecycle of one named queue or topic.
///
/// Concurrent `open`/`close` calls on one manager are not supported; `&mut
/// self` makes callers serialise them.
pub struct ResourceManager<S: Service> {
    service: S,
    name: String,
    connection: ConnectionConfig,
    factory: Arc<dyn ClientFactory>,
    endpoint: Option<Endpoint<S::Client>>,
}

impl<S: Service> ResourceManager<S> {
    pub fn new(
        service: S,
        name: impl Into<String>,
        connection: ConnectionConfig,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            service,
            name: name.into(),
            connection,
            factory,
            endpoint: None,
        }
    }

    /// Logical name, or fully qualified address, this manager was created for
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    pub fn factory(&self) -> &Arc<dyn ClientFactory> {
        &self.factory
    }

    pub fn is_open(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Resolved address while open
    pub fn address(&self) -> Option<&str> {
        self.endpoint.as_ref().map(|e| e.address.as_str())
    }

    /// Open client and resolved address, or an error when not open
    pub fn endpoint(&self) -> Result<(&S::Client, &str), MessagingError> {
        self.endpoint
            .as_ref()
            .map(|e| (&*e.client, e.address.as_str()))
            .ok_or_else(|| MessagingError::not_open(&self.name))
    }

    async fn connect(&self) -> Result<Box<S::Client>, MessagingError> {
        self.service
            .connect(&*self.factory, &self.connection)
            .await
            .map_err(ErrorClassifier::classify)
    }
}

impl<S: Service> fmt::Debug for ResourceManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("kind", &self.service.kind())
            .field("name", &self.name)
            .field("connection", &self.connection)
            .field("address", &self.address())
            .finish()
    }
}

#[async_trait]
impl<S: Service> Opener for ResourceManager<S> {
    async fn open(&mut self) -> Result<(), MessagingError> {
        if self.endpoint.is_some() {
            debug!(kind = %self.service.kind(), name = %self.name, "Already open");
            return Ok(());
        }

        let client = self.connect().await?;

        let address = match self.service.qualified_address(&self.name) {
            Some(address) => address.to_string(),
            None => match self.service.resolve(&*client, &self.name).await {
                Ok(address) => address,
                Err(err) => {
                    release(client, &self.name).await;
                    return Err(ErrorClassifier::classify_lookup(err, &self.name));
                }
            },
        };

        debug!(kind = %self.service.kind(), name = %self.name, address = %address, "Opened");
        self.endpoint = Some(Endpoint { client, address });
        Ok(())
    }
}

#[async_trait]
impl<S: Service> Closer for ResourceManager<S> {
    async fn close(&mut self) -> Result<(), MessagingError> {
        let Some(endpoint) = self.endpoint.take() else {
            return Ok(());
        };

        debug!(kind = %self.service.kind(), name = %self.name, "Closing");
        endpoint
            .client
            .close()
            .await
            .map_err(ErrorClassifier::classify)
    }
}

#[async_trait]
impl<S: Service> Configurer for ResourceManager<S> {
    async fn configure(&self) -> Result<String, MessagingError> {
        if let Some(address) = self.service.qualified_address(&self.name) {
            return Ok(address.to_string());
        }

        let client = self.connect().await?;
        let result = self.service.create(&*client, &self.name).await;
        release(client, &self.name).await;

        let address = result.map_err(ErrorClassifier::classify)?;
        info!(kind = %self.service.kind(), name = %self.name, address = %address, "Configured");
        Ok(address)
    }
}

/// Release a client on a path that already has an outcome to report.
///
/// A failure to release is logged rather than returned.
pub(crate) async fn release<C>(client: Box<C>, name: &str)
where
    C: TransportClient + ?Sized,
{
    if let Err(err) = client.close().await {
        warn!(name = %name, error = %err, "Failed to release transport client");
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
