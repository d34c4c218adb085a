//! Message values and destination identifiers
//!
//! A [`Message`] is a header map plus an opaque body. The body is a
//! reference-counted [`Bytes`] buffer, so cloning a message for fan-out
//! shares the payload while every clone owns its own header map.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Identifier assigned to an inbound message, reused as the correlation id of its parts.
pub const MESSAGE_ID: &str = "switchyard.message_id";
/// Groups all parts produced by splitting one message.
pub const CORRELATION_ID: &str = "switchyard.correlation_id";
/// 1-based position of a part within its split.
pub const SPLIT_INDEX: &str = "switchyard.split_index";
/// Number of parts the split produced.
pub const SPLIT_SIZE: &str = "switchyard.split_size";

pub type Headers = BTreeMap<String, String>;

/// Name of a logical channel or handler that can receive a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationId(String);

impl DestinationId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DestinationId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for DestinationId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Immutable message value.
///
/// The `with_*` methods consume the message and return a new value; there is
/// no way to change a message another owner can observe.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    headers: Headers,
    body: Bytes,
}

impl Message {
    /// Create a message with the given body and no headers
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// Create a message from an existing header map
    pub fn from_parts(headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            headers,
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn without_header(mut self, key: &str) -> Self {
        self.headers.remove(key);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8 text, if it is valid UTF-8
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    pub fn body_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn message_id(&self) -> Option<&str> {
        self.header(MESSAGE_ID)
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.header(CORRELATION_ID)
    }

    pub fn split_index(&self) -> Option<usize> {
        self.header(SPLIT_INDEX).and_then(|v| v.parse().ok())
    }

    pub fn split_size(&self) -> Option<usize> {
        self.header(SPLIT_SIZE).and_then(|v| v.parse().ok())
    }

    /// Copy the split bookkeeping headers of `part` onto this message
    pub fn with_split_headers_of(mut self, part: &Message) -> Self {
        for key in [CORRELATION_ID, SPLIT_INDEX, SPLIT_SIZE] {
            if let Some(value) = part.header(key) {
                self.headers.insert(key.to_string(), value.to_string());
            }
        }
        self
    }
}

impl From<&str> for Message {
    fn from(body: &str) -> Self {
        Message::new(body.to_string())
    }
}
