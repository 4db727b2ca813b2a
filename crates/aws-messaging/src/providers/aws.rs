//! Queue and topic clients over the AWS Query HTTP API.
//!
//! Every operation is a signed `POST` with a form-encoded body, answered with
//! XML. Calls go straight through `reqwest` instead of an SDK, so the same
//! code talks to AWS, to a local emulator given as `client_args.endpoint_url`,
//! or to a mock HTTP server in tests.
//!
//! ## Authentication
//!
//! Requests are signed with AWS Signature Version 4 using the access key of
//! the selected [`AwsProfile`]. A session token, when present, is sent as
//! `x-amz-security-token` and included in the signature.
//!
//! ## Endpoints
//!
//! Without an override the endpoint is `https://{service}.{region}.amazonaws.com`.
//! The region comes from `client_args.region` or, failing that, the profile.

use crate::attributes::{AttributeMap, AttributeValue};
use crate::client::{
    ClientFactory, ConnectionConfig, QueueClient, ServiceKind, TopicClient, TransportClient,
};
use crate::error::TransportError;
use crate::message::{ReceiveResponse, TransportMessage};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[cfg(test)]
#[path = "aws_tests.rs"]
mod tests;

/// Profile used when a connection does not name one.
pub const DEFAULT_PROFILE: &str = "default";

const SQS_API_VERSION: &str = "2012-11-05";
const SNS_API_VERSION: &str = "2010-03-31";

/// Per-request timeout; has to exceed the longest long-poll wait (20 s).
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

// ============================================================================
// Credentials
// ============================================================================

/// A named set of credentials and a default region
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsProfile {
    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub aws_access_key_id: Option<String>,

    #[serde(default)]
    pub aws_secret_access_key: Option<String>,

    #[serde(default)]
    pub aws_session_token: Option<String>,
}

impl AwsProfile {
    pub fn new(
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            region: Some(region.into()),
            aws_access_key_id: Some(access_key_id.into()),
            aws_secret_access_key: Some(secret_access_key.into()),
            aws_session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.aws_session_token = Some(token.into());
        self
    }

    /// Read the standard `AWS_*` environment variables
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            region: var("AWS_REGION").or_else(|| var("AWS_DEFAULT_REGION")),
            aws_access_key_id: var("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
            aws_session_token: var("AWS_SESSION_TOKEN"),
        }
    }
}

impl fmt::Debug for AwsProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsProfile")
            .field("region", &self.region)
            .field("aws_access_key_id", &self.aws_access_key_id)
            .field("aws_secret_access_key", &"<redacted>")
            .field("aws_session_token", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// AWS Signature V4 Signing
// ============================================================================

type HmacSha256 = Hmac<Sha256>;

/// AWS Signature Version 4 signer
///
/// 1. Canonical request (method, URI, query, headers, payload hash)
/// 2. String to sign (algorithm, timestamp, scope, request hash)
/// 3. Signing key from a 4-level HMAC chain
/// 4. Signature and `Authorization` header
#[derive(Clone)]
struct AwsV4Signer {
    access_key: String,
    secret_key: String,
    session_token: Option<String>,
    region: String,
    service: &'static str,
}

impl AwsV4Signer {
    fn new(
        access_key: String,
        secret_key: String,
        session_token: Option<String>,
        region: String,
        service: &'static str,
    ) -> Self {
        Self {
            access_key,
            secret_key,
            session_token,
            region,
            service,
        }
    }

    /// Headers to add to a request with no query string
    fn sign_request(
        &self,
        method: &str,
        host: &str,
        path: &str,
        body: &str,
        timestamp: &DateTime<Utc>,
    ) -> HashMap<String, String> {
        let date_stamp = timestamp.format("%Y%m%d").to_string();
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();

        // Canonical headers must be sorted by name
        let mut canonical_headers = format!("host:{}\nx-amz-date:{}\n", host, amz_date);
        let mut signed_headers = "host;x-amz-date".to_string();
        if let Some(token) = &self.session_token {
            canonical_headers.push_str(&format!("x-amz-security-token:{}\n", token));
            signed_headers.push_str(";x-amz-security-token");
        }

        let payload_hash = format!("{:x}", Sha256::digest(body.as_bytes()));

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, path, "", canonical_headers, signed_headers, payload_hash
        );

        let algorithm = "AWS4-HMAC-SHA256";
        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let canonical_request_hash = format!("{:x}", Sha256::digest(canonical_request.as_bytes()));

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            algorithm, amz_date, credential_scope, canonical_request_hash
        );

        let signature = self.calculate_signature(&string_to_sign, &date_stamp);

        let authorization_header = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            algorithm, self.access_key, credential_scope, signed_headers, signature
        );

        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), authorization_header);
        headers.insert("x-amz-date".to_string(), amz_date);
        headers.insert("host".to_string(), host.to_string());
        if let Some(token) = &self.session_token {
            headers.insert("x-amz-security-token".to_string(), token.clone());
        }

        headers
    }

    fn calculate_signature(&self, string_to_sign: &str, date_stamp: &str) -> String {
        let k_secret = format!("AWS4{}", self.secret_key);
        let k_date = self.hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes());
        let k_region = self.hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = self.hmac_sha256(&k_region, self.service.as_bytes());
        let k_signing = self.hmac_sha256(&k_service, b"aws4_request");
        let signature = self.hmac_sha256(&k_signing, string_to_sign.as_bytes());

        hex::encode(signature)
    }

    fn hmac_sha256(&self, key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

// ============================================================================
// Query API
// ============================================================================

/// Ordered form parameters of one request
#[derive(Debug, Default)]
struct Params(Vec<(String, String)>);

impl Params {
    fn new() -> Self {
        Self::default()
    }

    fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }
}

/// One service endpoint plus what is needed to sign requests to it
#[derive(Clone)]
struct QueryApi {
    http_client: HttpClient,
    kind: ServiceKind,
    endpoint: Url,
    host: String,
    signer: Option<AwsV4Signer>,
}

impl QueryApi {
    fn version(&self) -> &'static str {
        match self.kind {
            ServiceKind::Sqs => SQS_API_VERSION,
            ServiceKind::Sns => SNS_API_VERSION,
        }
    }

    /// Issue one action and return the XML body of a successful response
    async fn call(&self, action: &str, params: Params) -> Result<String, TransportError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| TransportError::other("No credentials configured"))?;

        let body = [("Action", action), ("Version", self.version())]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .chain(params.0)
            .map(|(k, v)| format!("{}={}", urlencoding::encode(&k), urlencoding::encode(&v)))
            .collect::<Vec<_>>()
            .join("&");

        let auth_headers = signer.sign_request(
            "POST",
            &self.host,
            self.endpoint.path(),
            &body,
            &Utc::now(),
        );

        let mut request = self
            .http_client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE);
        for (key, value) in auth_headers {
            request = request.header(&key, value);
        }

        debug!(service = %self.kind, action = %action, "Sending request");
        let response = request.body(body).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::other(format!("Request timeout: {}", e))
            } else if e.is_connect() {
                TransportError::other(format!("Connection failed: {}", e))
            } else {
                TransportError::other(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| TransportError::other(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(parse_error_response(&response_body, status.as_u16()));
        }

        Ok(response_body)
    }
}

impl fmt::Debug for QueryApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryApi")
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint.as_str())
            .field("signed", &self.signer.is_some())
            .finish()
    }
}

fn utf8_body(body: &Bytes) -> Result<&str, TransportError> {
    std::str::from_utf8(body)
        .map_err(|e| TransportError::other(format!("Message body must be valid UTF-8: {}", e)))
}

fn string_attributes(attributes: &AttributeMap) -> impl Iterator<Item = (&str, &str, &str)> {
    attributes.iter().filter_map(|(name, value)| {
        value
            .string_value
            .as_deref()
            .map(|v| (name.as_str(), value.data_type.as_str(), v))
    })
}

// ============================================================================
// XML Responses
// ============================================================================

enum XmlEvent<'a> {
    /// An element opened; the path ends with its name
    Start(&'a [String]),
    /// An element closed, with the text directly inside it
    End(&'a [String], &'a str),
}

/// Walk an XML document, reporting element paths by local name
fn walk_xml<F>(xml: &str, mut visit: F) -> Result<(), TransportError>
where
    F: FnMut(XmlEvent<'_>),
{
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                text.clear();
                visit(XmlEvent::Start(&path));
            }
            Ok(Event::Empty(ref e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                visit(XmlEvent::Start(&path));
                visit(XmlEvent::End(&path, ""));
                path.pop();
                text.clear();
            }
            Ok(Event::Text(e)) => {
                let unescaped = e
                    .unescape()
                    .map_err(|e| TransportError::other(format!("Failed to parse XML: {}", e)))?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(_)) => {
                visit(XmlEvent::End(&path, &text));
                path.pop();
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(TransportError::other(format!("XML parsing error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn ends_with(path: &[String], suffix: &[&str]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| a == b)
}

/// Text of the first `element` in the document
fn find_text(xml: &str, element: &str) -> Result<String, TransportError> {
    let mut found = None;
    walk_xml(xml, |event| {
        if let XmlEvent::End(path, text) = event {
            if found.is_none() && ends_with(path, &[element]) {
                found = Some(text.to_string());
            }
        }
    })?;

    found.ok_or_else(|| TransportError::other(format!("{} not found in response", element)))
}

fn parse_error_response(xml: &str, status_code: u16) -> TransportError {
    let mut code = None;
    let mut message = None;
    let parsed = walk_xml(xml, |event| {
        if let XmlEvent::End(path, text) = event {
            if ends_with(path, &["Error", "Code"]) {
                code = Some(text.to_string());
            } else if ends_with(path, &["Error", "Message"]) {
                message = Some(text.to_string());
            }
        }
    });

    match (parsed, code) {
        (Ok(()), Some(code)) => TransportError::service(
            code,
            message.unwrap_or_else(|| "Unknown error".to_string()),
        ),
        _ => TransportError::other(format!("HTTP {}: {}", status_code, xml)),
    }
}

fn parse_queue_attributes(xml: &str) -> Result<HashMap<String, String>, TransportError> {
    let mut attributes = HashMap::new();
    let mut name = None;
    let mut value = None;
    walk_xml(xml, |event| {
        if let XmlEvent::End(path, text) = event {
            if ends_with(path, &["Attribute", "Name"]) {
                name = Some(text.to_string());
            } else if ends_with(path, &["Attribute", "Value"]) {
                value = Some(text.to_string());
            } else if ends_with(path, &["Attribute"]) {
                if let (Some(n), Some(v)) = (name.take(), value.take()) {
                    attributes.insert(n, v);
                }
            }
        }
    })?;

    Ok(attributes)
}

#[derive(Default)]
struct PendingAttribute {
    name: Option<String>,
    data_type: Option<String>,
    value: Option<String>,
}

fn parse_receive_message_response(xml: &str) -> Result<ReceiveResponse, TransportError> {
    let mut messages = Vec::new();
    let mut current: Option<TransportMessage> = None;
    let mut system = PendingAttribute::default();
    let mut custom = PendingAttribute::default();

    walk_xml(xml, |event| match event {
        XmlEvent::Start(path) => {
            if ends_with(path, &["ReceiveMessageResult", "Message"]) {
                current = Some(TransportMessage::new(String::new(), Bytes::new()));
            }
        }
        XmlEvent::End(path, text) => {
            let Some(message) = current.as_mut() else {
                return;
            };
            let text = text.to_string();

            if ends_with(path, &["Message", "MessageId"]) {
                message.message_id = Some(text);
            } else if ends_with(path, &["Message", "ReceiptHandle"]) {
                message.receipt_handle = text;
            } else if ends_with(path, &["Message", "MD5OfBody"]) {
                message.md5_of_body = Some(text);
            } else if ends_with(path, &["Message", "Body"]) {
                message.body = Bytes::from(text);
            } else if ends_with(path, &["Message", "Attribute", "Name"]) {
                system.name = Some(text);
            } else if ends_with(path, &["Message", "Attribute", "Value"]) {
                system.value = Some(text);
            } else if ends_with(path, &["Message", "Attribute"]) {
                if let (Some(name), Some(value)) = (system.name.take(), system.value.take()) {
                    message.attributes.insert(name, value);
                }
            } else if ends_with(path, &["MessageAttribute", "Name"]) {
                custom.name = Some(text);
            } else if ends_with(path, &["MessageAttribute", "Value", "DataType"]) {
                custom.data_type = Some(text);
            } else if ends_with(path, &["MessageAttribute", "Value", "StringValue"]) {
                custom.value = Some(text);
            } else if ends_with(path, &["Message", "MessageAttribute"]) {
                let pending = std::mem::take(&mut custom);
                if let Some(name) = pending.name {
                    message
                        .message_attributes
                        .get_or_insert_with(AttributeMap::new)
                        .insert(
                            name,
                            AttributeValue {
                                data_type: pending.data_type.unwrap_or_else(|| "String".to_string()),
                                string_value: pending.value,
                            },
                        );
                }
            } else if ends_with(path, &["ReceiveMessageResult", "Message"]) {
                if let Some(message) = current.take() {
                    messages.push(message);
                }
            }
        }
    })?;

    if messages.is_empty() {
        Ok(ReceiveResponse::empty())
    } else {
        Ok(ReceiveResponse::with_messages(messages))
    }
}

// ============================================================================
// SQS Client
// ============================================================================

/// Queue client speaking the SQS Query API
#[derive(Debug, Clone)]
pub struct SqsHttpClient {
    api: QueryApi,
}

#[async_trait]
impl TransportClient for SqsHttpClient {
    async fn close(&self) -> Result<(), TransportError> {
        debug!(endpoint = %self.api.endpoint, "Closed SQS client");
        Ok(())
    }
}

#[async_trait]
impl QueueClient for SqsHttpClient {
    async fn get_queue_url(&self, queue_name: &str) -> Result<String, TransportError> {
        let params = Params::new().with("QueueName", queue_name);
        let response = self.api.call("GetQueueUrl", params).await?;
        find_text(&response, "QueueUrl")
    }

    async fn create_queue(&self, queue_name: &str) -> Result<String, TransportError> {
        let params = Params::new().with("QueueName", queue_name);
        let response = self.api.call("CreateQueue", params).await?;
        find_text(&response, "QueueUrl")
    }

    async fn get_queue_attributes(
        &self,
        queue_url: &str,
        attribute_names: &[&str],
    ) -> Result<HashMap<String, String>, TransportError> {
        let mut params = Params::new().with("QueueUrl", queue_url);
        for (i, name) in attribute_names.iter().enumerate() {
            params.push(format!("AttributeName.{}", i + 1), *name);
        }

        let response = self.api.call("GetQueueAttributes", params).await?;
        parse_queue_attributes(&response)
    }

    async fn send_message(
        &self,
        queue_url: &str,
        body: Bytes,
        attributes: AttributeMap,
    ) -> Result<String, TransportError> {
        let mut params = Params::new()
            .with("QueueUrl", queue_url)
            .with("MessageBody", utf8_body(&body)?);
        for (i, (name, data_type, value)) in string_attributes(&attributes).enumerate() {
            let prefix = format!("MessageAttribute.{}", i + 1);
            params.push(format!("{}.Name", prefix), name);
            params.push(format!("{}.Value.DataType", prefix), data_type);
            params.push(format!("{}.Value.StringValue", prefix), value);
        }

        let response = self.api.call("SendMessage", params).await?;
        find_text(&response, "MessageId")
    }

    async fn receive_message(
        &self,
        queue_url: &str,
        wait: Duration,
        attribute_names: &[&str],
    ) -> Result<ReceiveResponse, TransportError> {
        let mut params = Params::new()
            .with("QueueUrl", queue_url)
            .with("WaitTimeSeconds", wait.as_secs().to_string());
        for (i, name) in attribute_names.iter().enumerate() {
            params.push(format!("MessageAttributeName.{}", i + 1), *name);
        }

        let response = self.api.call("ReceiveMessage", params).await?;
        parse_receive_message_response(&response)
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), TransportError> {
        let params = Params::new()
            .with("QueueUrl", queue_url)
            .with("ReceiptHandle", receipt_handle);
        self.api.call("DeleteMessage", params).await?;
        Ok(())
    }
}

// ============================================================================
// SNS Client
// ============================================================================

/// Topic client speaking the SNS Query API
#[derive(Debug, Clone)]
pub struct SnsHttpClient {
    api: QueryApi,
}

#[async_trait]
impl TransportClient for SnsHttpClient {
    async fn close(&self) -> Result<(), TransportError> {
        debug!(endpoint = %self.api.endpoint, "Closed SNS client");
        Ok(())
    }
}

#[async_trait]
impl TopicClient for SnsHttpClient {
    async fn create_topic(&self, topic_name: &str) -> Result<String, TransportError> {
        let params = Params::new().with("Name", topic_name);
        let response = self.api.call("CreateTopic", params).await?;
        find_text(&response, "TopicArn")
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        endpoint: &str,
        protocol: &str,
    ) -> Result<String, TransportError> {
        let params = Params::new()
            .with("TopicArn", topic_arn)
            .with("Endpoint", endpoint)
            .with("Protocol", protocol);
        let response = self.api.call("Subscribe", params).await?;
        find_text(&response, "SubscriptionArn")
    }

    async fn publish(
        &self,
        topic_arn: &str,
        body: Bytes,
        attributes: AttributeMap,
    ) -> Result<String, TransportError> {
        let mut params = Params::new()
            .with("TopicArn", topic_arn)
            .with("Message", utf8_body(&body)?);
        for (i, (name, data_type, value)) in string_attributes(&attributes).enumerate() {
            let prefix = format!("MessageAttributes.entry.{}", i + 1);
            params.push(format!("{}.Name", prefix), name);
            params.push(format!("{}.Value.DataType", prefix), data_type);
            params.push(format!("{}.Value.StringValue", prefix), value);
        }

        let response = self.api.call("Publish", params).await?;
        find_text(&response, "MessageId")
    }
}

// ============================================================================
// Client Factory
// ============================================================================

/// Creates HTTP clients from named credential profiles.
///
/// When the default profile is requested but not configured, credentials are
/// read from the `AWS_*` environment variables.
#[derive(Clone)]
pub struct AwsHttpClientFactory {
    http_client: HttpClient,
    profiles: HashMap<String, AwsProfile>,
}

impl AwsHttpClientFactory {
    pub fn new(profiles: HashMap<String, AwsProfile>) -> Result<Self, TransportError> {
        let http_client = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::with_http_client(http_client, profiles))
    }

    /// Use a preconfigured HTTP client
    pub fn with_http_client(http_client: HttpClient, profiles: HashMap<String, AwsProfile>) -> Self {
        Self {
            http_client,
            profiles,
        }
    }

    pub fn profiles(&self) -> &HashMap<String, AwsProfile> {
        &self.profiles
    }

    fn profile(&self, name: &str) -> Result<AwsProfile, TransportError> {
        match self.profiles.get(name) {
            Some(profile) => Ok(profile.clone()),
            None if name == DEFAULT_PROFILE => Ok(AwsProfile::from_env()),
            None => Err(TransportError::other(format!(
                "Unknown credential profile `{}`",
                name
            ))),
        }
    }

    fn api(&self, kind: ServiceKind, config: &ConnectionConfig) -> Result<QueryApi, TransportError> {
        let profile_name = config.profile.as_deref().unwrap_or(DEFAULT_PROFILE);
        let profile = self.profile(profile_name)?;

        let region = config
            .client_args
            .region
            .clone()
            .or(profile.region)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                TransportError::other(format!(
                    "No region configured for profile `{}`",
                    profile_name
                ))
            })?;

        let endpoint = match &config.client_args.endpoint_url {
            Some(url) => url.clone(),
            None => format!("https://{}.{}.amazonaws.com", kind, region),
        };
        let endpoint = Url::parse(&endpoint).map_err(|e| {
            TransportError::other(format!("Invalid endpoint URL `{}`: {}", endpoint, e))
        })?;
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(TransportError::other(format!(
                    "Endpoint URL `{}` has no host",
                    endpoint
                )))
            }
        };

        let signer = match (profile.aws_access_key_id, profile.aws_secret_access_key) {
            (Some(access_key), Some(secret_key)) => Some(AwsV4Signer::new(
                access_key,
                secret_key,
                profile.aws_session_token,
                region,
                kind.as_str(),
            )),
            _ => None,
        };

        debug!(service = %kind, profile = %profile_name, endpoint = %endpoint, "Created client");
        Ok(QueryApi {
            http_client: self.http_client.clone(),
            kind,
            endpoint,
            host,
            signer,
        })
    }
}

impl fmt::Debug for AwsHttpClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsHttpClientFactory")
            .field("profiles", &self.profiles.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl ClientFactory for AwsHttpClientFactory {
    async fn queue_client(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn QueueClient>, TransportError> {
        let api = self.api(ServiceKind::Sqs, config)?;
        Ok(Box::new(SqsHttpClient { api }))
    }

    async fn topic_client(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn TopicClient>, TransportError> {
        let api = self.api(ServiceKind::Sns, config)?;
        Ok(Box::new(SnsHttpClient { api }))
    }
}
