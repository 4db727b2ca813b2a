//! Named sender and receiver definitions loaded from configuration.
//!
//! Settings come from an optional file (YAML, TOML or JSON, picked by
//! extension) overlaid with environment variables prefixed `AWS_MESSAGING`,
//! using `__` as the nesting separator:
//!
//! ```text
//! AWS_MESSAGING__AWS_CREDENTIALS__DEFAULT__REGION=eu-west-1
//! AWS_MESSAGING__SEND_MESSAGE_QUEUES__ORDERS__QUEUE_NAME=orders-dev
//! AWS_MESSAGING__RECEIVE_MESSAGE_QUEUES__EVENTS__WAIT_TIME_SECONDS=5
//! ```
//!
//! Environment values are parsed, so numbers and booleans keep their type.
//!
//! A file looks like:
//!
//! ```yaml
//! aws_credentials:
//!   default:
//!     region: us-east-1
//! send_message_queues:
//!   orders:
//!     type: sqs
//!     queue_name: orders
//! receive_message_queues:
//!   events:
//!     type: sns
//!     topic_name: events
//!     queue_name: events-worker
//!     wait_time_seconds: 20
//! ```

use crate::adapter::{MessageReceiver, MessageSender};
use crate::client::{ClientArgs, ClientFactory, ConnectionConfig};
use crate::error::TransportError;
use crate::providers::aws::{AwsHttpClientFactory, AwsProfile, DEFAULT_PROFILE};
use crate::sns::{SnsReceiver, SnsSender};
use crate::sqs::{SqsReceiver, SqsSender};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub use config::FileFormat;

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;

/// Prefix of environment variables overlaying the settings file
pub const ENV_PREFIX: &str = "AWS_MESSAGING";

/// Nesting separator of environment variable names
pub const ENV_SEPARATOR: &str = "__";

/// Longest long-poll wait the queue service accepts
pub const MAX_WAIT_TIME_SECONDS: u64 = 20;

const DEFAULT_WAIT_TIME_SECONDS: u64 = 10;

/// Errors raised while loading settings or building from them
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    Config(#[from] config::ConfigError),

    #[error("No {kind} definition named `{name}`")]
    UnknownDefinition { kind: &'static str, name: String },

    #[error("Definition `{definition}` references unknown profile `{profile}`")]
    UnknownProfile { definition: String, profile: String },

    #[error("Definition `{definition}` is invalid: {message}")]
    Invalid { definition: String, message: String },

    #[error("Failed to set up transport: {0}")]
    Transport(#[from] TransportError),
}

fn default_wait_time_seconds() -> u64 {
    DEFAULT_WAIT_TIME_SECONDS
}

// ============================================================================
// Definitions
// ============================================================================

/// Where a named sender delivers messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SenderDefinition {
    Sqs {
        queue_name: String,
        #[serde(default)]
        profile: Option<String>,
        #[serde(default)]
        client_args: ClientArgs,
    },
    Sns {
        topic_name: String,
        #[serde(default)]
        profile: Option<String>,
        #[serde(default)]
        client_args: ClientArgs,
    },
}

impl SenderDefinition {
    /// Connection settings handed to the client factory
    pub fn connection(&self) -> ConnectionConfig {
        match self {
            Self::Sqs {
                profile,
                client_args,
                ..
            }
            | Self::Sns {
                profile,
                client_args,
                ..
            } => ConnectionConfig::new(profile.clone(), client_args.clone()),
        }
    }

    fn profile(&self) -> Option<&str> {
        match self {
            Self::Sqs { profile, .. } | Self::Sns { profile, .. } => profile.as_deref(),
        }
    }

    fn validate(&self, definition: &str) -> Result<(), SettingsError> {
        match self {
            Self::Sqs { queue_name, .. } => require_name(definition, "queue_name", queue_name),
            Self::Sns { topic_name, .. } => require_name(definition, "topic_name", topic_name),
        }
    }
}

/// Where a named receiver takes messages from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReceiverDefinition {
    Sqs {
        queue_name: String,
        #[serde(default)]
        profile: Option<String>,
        #[serde(default)]
        client_args: ClientArgs,
        #[serde(default = "default_wait_time_seconds")]
        wait_time_seconds: u64,
    },
    /// A queue subscribed to a topic; `configure` wires the subscription
    Sns {
        topic_name: String,
        queue_name: String,
        #[serde(default)]
        profile: Option<String>,
        #[serde(default)]
        client_args: ClientArgs,
        #[serde(default = "default_wait_time_seconds")]
        wait_time_seconds: u64,
    },
}

impl ReceiverDefinition {
    /// Connection settings handed to the client factory
    pub fn connection(&self) -> ConnectionConfig {
        match self {
            Self::Sqs {
                profile,
                client_args,
                ..
            }
            | Self::Sns {
                profile,
                client_args,
                ..
            } => ConnectionConfig::new(profile.clone(), client_args.clone()),
        }
    }

    pub fn wait_time(&self) -> Duration {
        match self {
            Self::Sqs {
                wait_time_seconds, ..
            }
            | Self::Sns {
                wait_time_seconds, ..
            } => Duration::from_secs(*wait_time_seconds),
        }
    }

    fn profile(&self) -> Option<&str> {
        match self {
            Self::Sqs { profile, .. } | Self::Sns { profile, .. } => profile.as_deref(),
        }
    }

    fn validate(&self, definition: &str) -> Result<(), SettingsError> {
        match self {
            Self::Sqs {
                queue_name,
                wait_time_seconds,
                ..
            } => {
                require_name(definition, "queue_name", queue_name)?;
                validate_wait_time(definition, *wait_time_seconds)
            }
            Self::Sns {
                topic_name,
                queue_name,
                wait_time_seconds,
                ..
            } => {
                require_name(definition, "topic_name", topic_name)?;
                require_name(definition, "queue_name", queue_name)?;
                validate_wait_time(definition, *wait_time_seconds)
            }
        }
    }
}

fn require_name(definition: &str, field: &str, value: &str) -> Result<(), SettingsError> {
    if value.trim().is_empty() {
        return Err(SettingsError::Invalid {
            definition: definition.to_string(),
            message: format!("{} must not be empty", field),
        });
    }
    Ok(())
}

fn validate_wait_time(definition: &str, seconds: u64) -> Result<(), SettingsError> {
    if seconds > MAX_WAIT_TIME_SECONDS {
        return Err(SettingsError::Invalid {
            definition: definition.to_string(),
            message: format!(
                "wait_time_seconds must be between 0 and {}, got {}",
                MAX_WAIT_TIME_SECONDS, seconds
            ),
        });
    }
    Ok(())
}

// ============================================================================
// MessagingSettings
// ============================================================================

/// Credential profiles plus named sender and receiver definitions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingSettings {
    #[serde(default)]
    pub aws_credentials: HashMap<String, AwsProfile>,

    #[serde(default)]
    pub send_message_queues: HashMap<String, SenderDefinition>,

    #[serde(default)]
    pub receive_message_queues: HashMap<String, ReceiverDefinition>,
}

impl MessagingSettings {
    /// Load settings from an optional file plus the environment overlay.
    ///
    /// A path that is given must exist. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            info!(path = %path.display(), "Loading messaging settings");
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Parse and validate settings from text in the given format
    pub fn from_str(text: &str, format: FileFormat) -> Result<Self, SettingsError> {
        let settings: Self = Config::builder()
            .add_source(File::from_str(text, format))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check names, wait times and profile references of every definition
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (name, definition) in &self.send_message_queues {
            definition.validate(name)?;
            self.check_profile(name, definition.profile())?;
        }

        for (name, definition) in &self.receive_message_queues {
            definition.validate(name)?;
            self.check_profile(name, definition.profile())?;
        }

        debug!(
            senders = self.send_message_queues.len(),
            receivers = self.receive_message_queues.len(),
            "Messaging settings validated"
        );
        Ok(())
    }

    // The default profile may come from the environment instead of the file.
    fn check_profile(&self, definition: &str, profile: Option<&str>) -> Result<(), SettingsError> {
        match profile {
            Some(profile)
                if profile != DEFAULT_PROFILE && !self.aws_credentials.contains_key(profile) =>
            {
                Err(SettingsError::UnknownProfile {
                    definition: definition.to_string(),
                    profile: profile.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Build the sender defined under `name`. The sender is not opened.
    pub fn build_sender(
        &self,
        name: &str,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Box<dyn MessageSender>, SettingsError> {
        let definition =
            self.send_message_queues
                .get(name)
                .ok_or_else(|| SettingsError::UnknownDefinition {
                    kind: "sender",
                    name: name.to_string(),
                })?;

        let connection = definition.connection();
        let sender: Box<dyn MessageSender> = match definition {
            SenderDefinition::Sqs { queue_name, .. } => {
                Box::new(SqsSender::new(queue_name.as_str(), connection, factory))
            }
            SenderDefinition::Sns { topic_name, .. } => {
                Box::new(SnsSender::new(topic_name.as_str(), connection, factory))
            }
        };

        debug!(definition = %name, "Built sender");
        Ok(sender)
    }

    /// Build the receiver defined under `name`. The receiver is not opened.
    pub fn build_receiver(
        &self,
        name: &str,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Box<dyn MessageReceiver>, SettingsError> {
        let definition = self.receive_message_queues.get(name).ok_or_else(|| {
            SettingsError::UnknownDefinition {
                kind: "receiver",
                name: name.to_string(),
            }
        })?;

        let connection = definition.connection();
        let wait_time = definition.wait_time();
        let receiver: Box<dyn MessageReceiver> = match definition {
            ReceiverDefinition::Sqs { queue_name, .. } => Box::new(
                SqsReceiver::new(queue_name.as_str(), connection, factory).with_wait_time(wait_time),
            ),
            ReceiverDefinition::Sns {
                topic_name,
                queue_name,
                ..
            } => Box::new(
                SnsReceiver::new(topic_name.as_str(), queue_name.as_str(), connection, factory)
                    .with_wait_time(wait_time),
            ),
        };

        debug!(definition = %name, "Built receiver");
        Ok(receiver)
    }

    /// An HTTP client factory over the configured credential profiles
    pub fn http_factory(&self) -> Result<AwsHttpClientFactory, SettingsError> {
        Ok(AwsHttpClientFactory::new(self.aws_credentials.clone())?)
    }
}
