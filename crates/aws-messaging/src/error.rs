//! Error types for messaging operations.
//!
//! Transport clients report failures as [`TransportError`]. Every call site
//! that talks to a transport funnels those failures through
//! [`ErrorClassifier`], so callers of the adapter only ever observe
//! [`MessagingError`].

use thiserror::Error;
use tracing::error;

/// Error codes the queue service uses for "queue does not exist".
const NON_EXISTENT_QUEUE_CODES: &[&str] =
    &["AWS.SimpleQueueService.NonExistentQueue", "QueueDoesNotExist"];

/// Error codes signalling throttling or a temporary service fault.
const TRANSIENT_CODES: &[&str] = &[
    "RequestThrottled",
    "Throttling",
    "ThrottlingException",
    "ServiceUnavailable",
    "InternalError",
    "InternalFailure",
];

/// Caller-visible error for all messaging operations
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Unable to find queue `{queue_name}`")]
    QueueNotFound { queue_name: String },

    /// Any other failure.
    ///
    /// `transient` is set only for untagged transport failures such as a
    /// dropped connection. Misuse of the adapter is never transient.
    #[error("Client error{}: {message}", code_suffix(.code))]
    ClientError {
        code: Option<String>,
        message: String,
        transient: bool,
    },
}

impl MessagingError {
    /// Build an untagged client error for a failure retrying cannot fix.
    pub fn client(message: impl Into<String>) -> Self {
        Self::ClientError {
            code: None,
            message: message.into(),
            transient: false,
        }
    }

    /// Error returned when an operation needs an open resource.
    pub fn not_open(name: &str) -> Self {
        Self::client(format!("`{}` is not open", name))
    }

    /// Transport error code, if the failure carried one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::QueueNotFound { .. } => None,
            Self::ClientError { code, .. } => code.as_deref(),
        }
    }

    pub fn is_queue_not_found(&self) -> bool {
        matches!(self, Self::QueueNotFound { .. })
    }

    /// Check if the failure is worth retrying by the caller.
    ///
    /// This layer never retries on its own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::QueueNotFound { .. } => false,
            Self::ClientError {
                code: Some(code), ..
            } => TRANSIENT_CODES.contains(&code.as_str()),
            Self::ClientError {
                code: None,
                transient,
                ..
            } => *transient,
        }
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref()
        .map(|c| format!(" ({})", c))
        .unwrap_or_default()
}

/// Failure raised by a transport client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The service answered with a structured error code.
    #[error("{code}: {message}")]
    Service { code: String, message: String },

    /// Anything else: network failures, unreadable responses, client-side
    /// validation.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Structured error code, if the service supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => Some(code),
            Self::Other(_) => None,
        }
    }
}

/// Maps transport failures onto [`MessagingError`].
///
/// Classification looks at the structured code only, never at the message
/// text.
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify a failure from any transport call.
    pub fn classify(err: TransportError) -> MessagingError {
        match err {
            TransportError::Service { code, message } => {
                error!(error_code = %code, "Client error");
                MessagingError::ClientError {
                    code: Some(code),
                    message,
                    transient: false,
                }
            }
            TransportError::Other(message) => MessagingError::ClientError {
                code: None,
                message,
                transient: true,
            },
        }
    }

    /// Classify a failure from resolving `queue_name` to an address.
    ///
    /// This is the only path that produces [`MessagingError::QueueNotFound`].
    pub fn classify_lookup(err: TransportError, queue_name: &str) -> MessagingError {
        match err.code() {
            Some(code) if NON_EXISTENT_QUEUE_CODES.contains(&code) => {
                MessagingError::QueueNotFound {
                    queue_name: queue_name.to_string(),
                }
            }
            _ => Self::classify(err),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
