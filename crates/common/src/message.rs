//! Decoded inbound protocol message.
//!
//! The transport hands us already-unpacked, already-authenticated JSON
//! objects. Only a handful of fields are read by the dispatcher; everything
//! else (`to`, `lang`, `created_time`, ...) is carried in [`Message::extra`]
//! untouched.

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

use crate::{Error, Result};

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Protocol message type URI.
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Sending peer identifier (usually a DID).
    pub from: String,
    /// Thread identifier, when the message belongs to a thread.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub body: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(msg_type: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            msg_type: msg_type.into(),
            from: from.into(),
            thid: None,
            id: None,
            body: Value::Null,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_thid(mut self, thid: impl Into<String>) -> Self {
        self.thid = Some(thid.into());
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Set an extra top-level field such as `to` or `lang`.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Decode a raw JSON object, checking the routing fields first so a
    /// missing `type` or `from` is reported by name instead of as a generic
    /// deserialization failure.
    pub fn from_value(value: Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(Error::invalid_field("message", "a JSON object"));
        };
        for field in ["type", "from"] {
            match object.get(field) {
                None | Some(Value::Null) => return Err(Error::missing_field(field)),
                Some(Value::String(_)) => {},
                Some(_) => return Err(Error::invalid_field(field, "a string")),
            }
        }
        let message: Self = serde_json::from_value(value)?;
        message.validate()?;
        Ok(message)
    }

    /// Parse one JSON document (e.g. a line of newline-delimited input).
    pub fn from_json(raw: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(raw)?)
    }

    /// Reject messages the router cannot key on.
    pub fn validate(&self) -> Result<()> {
        if self.msg_type.trim().is_empty() {
            return Err(Error::missing_field("type"));
        }
        if self.from.trim().is_empty() {
            return Err(Error::missing_field("from"));
        }
        Ok(())
    }

    /// Text content of a basic message body, if any.
    pub fn content(&self) -> Option<&str> {
        self.body.get("content").and_then(Value::as_str)
    }
}
