//! Directory Types
//!
//! Stored entries and the wire payloads exchanged with sinks and the
//! HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest accepted gateway name
pub const MAX_NAME_LEN: usize = 255;

/// A gateway record held by a directory backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub gateway_name: String,
    pub gateway_id: String,
    /// Number of successful puts applied to this entry
    pub changes: u64,
    pub last_update: DateTime<Utc>,
    /// Write token bound to this gateway, never sent to readers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl DirectoryEntry {
    pub fn new(name: &str, id: &str) -> Self {
        Self {
            gateway_name: name.to_string(),
            gateway_id: id.to_string(),
            changes: 1,
            last_update: Utc::now(),
            token: None,
        }
    }

    /// Apply a put: new id, bumped counter, fresh timestamp
    pub fn update(&mut self, id: &str) {
        self.gateway_id = id.to_string();
        self.changes += 1;
        self.last_update = Utc::now();
    }

    /// Public view of the entry with the token stripped
    pub fn redacted(&self) -> Self {
        Self {
            token: None,
            ..self.clone()
        }
    }
}

/// Payload handed to sinks and accepted by `PUT /gateway/:name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayload {
    #[serde(default)]
    pub gateway_name: String,
    #[serde(default)]
    pub gateway_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl GatewayPayload {
    pub fn new(name: &str, id: &str, token: Option<&str>) -> Self {
        Self {
            gateway_name: name.to_string(),
            gateway_id: id.to_string(),
            token: token.map(str::to_string),
        }
    }
}

/// Body of `PUT /gateway/:name/token`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUpdate {
    /// Token to bind to the gateway
    pub token: String,
    /// Token authorizing this write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_token: Option<String>,
}

/// Reply body of the HTTP surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayReply {
    pub gateway_name: String,
    #[serde(default)]
    pub gateway_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GatewayReply {
    pub fn found(name: &str, id: &str) -> Self {
        Self {
            gateway_name: name.to_string(),
            gateway_id: id.to_string(),
            error: None,
        }
    }

    pub fn error(name: &str, message: impl Into<String>) -> Self {
        Self {
            gateway_name: name.to_string(),
            gateway_id: String::new(),
            error: Some(message.into()),
        }
    }
}

/// Check that a gateway name is addressable
///
/// Names are 1-255 characters of ASCII alphanumerics and `-_.:`; the colon
/// is allowed because propagated keys have the form `account:region:name`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}
