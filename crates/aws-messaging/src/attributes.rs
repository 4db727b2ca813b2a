//! Encoding of content metadata into transport message attributes.
//!
//! Only string attributes are produced. Fields without a value are left out
//! of the encoded map entirely.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Attribute carrying the payload content type.
pub const CONTENT_TYPE: &str = "ContentType";

/// Attribute carrying the payload content encoding.
pub const CONTENT_ENCODING: &str = "ContentEncoding";

/// Attribute names requested on every receive call.
pub const RECOGNIZED_ATTRIBUTES: [&str; 2] = [CONTENT_TYPE, CONTENT_ENCODING];

const STRING_DATA_TYPE: &str = "String";

/// A single typed message attribute as the transport represents it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    #[serde(rename = "DataType")]
    pub data_type: String,

    #[serde(rename = "StringValue", default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
}

impl AttributeValue {
    /// Create a string-typed attribute
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: STRING_DATA_TYPE.to_string(),
            string_value: Some(value.into()),
        }
    }
}

/// Attribute name to typed value
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Encode named optional fields into an attribute map.
pub fn encode<'a, I>(fields: I) -> AttributeMap
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    fields
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name.to_string(), AttributeValue::string(v))))
        .collect()
}

/// Decode an attribute map into plain strings.
///
/// A missing map decodes to an empty one. Entries without a string value
/// are skipped.
pub fn decode(attributes: Option<&AttributeMap>) -> HashMap<String, String> {
    attributes
        .into_iter()
        .flatten()
        .filter_map(|(name, value)| {
            value
                .string_value
                .as_ref()
                .map(|v| (name.clone(), v.clone()))
        })
        .collect()
}

/// Content metadata carried alongside a payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentAttributes {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
}

impl ContentAttributes {
    pub fn new(content_type: Option<&str>, content_encoding: Option<&str>) -> Self {
        Self {
            content_type: content_type.map(str::to_string),
            content_encoding: content_encoding.map(str::to_string),
        }
    }

    /// Encode into the transport attribute structure
    pub fn encode(&self) -> AttributeMap {
        encode([
            (CONTENT_TYPE, self.content_type.as_deref()),
            (CONTENT_ENCODING, self.content_encoding.as_deref()),
        ])
    }

    /// Pick the recognized fields out of decoded attributes
    pub fn from_decoded(mut decoded: HashMap<String, String>) -> Self {
        Self {
            content_type: decoded.remove(CONTENT_TYPE),
            content_encoding: decoded.remove(CONTENT_ENCODING),
        }
    }

    /// Decode straight from a transport attribute map
    pub fn decode(attributes: Option<&AttributeMap>) -> Self {
        Self::from_decoded(decode(attributes))
    }
}

#[cfg(test)]
#[path = "attributes_tests.rs"]
mod tests;
