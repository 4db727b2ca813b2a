//! Transport client implementations.
//!
//! [`aws`] talks to the real services (or an emulator) over HTTP; [`memory`]
//! keeps queues and topics in process for development and tests.

pub mod aws;
pub mod memory;

pub use aws::{AwsHttpClientFactory, AwsProfile, SnsHttpClient, SqsHttpClient, DEFAULT_PROFILE};
pub use memory::{InMemoryClient, InMemoryTransport};
