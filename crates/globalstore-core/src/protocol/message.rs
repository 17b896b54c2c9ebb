//! Request / reply envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GlobalStoreError, Result};

/// Readiness signal sent by the hub once it is listening.
pub const READY_SENTINEL: &str = "global-storage:ready";
/// Reserved correlation id for the readiness handshake.
pub const CONNECT_ID: &str = "connect";
/// Prefix of per-request correlation ids.
pub const REQUEST_ID_PREFIX: &str = "global-storage-request:";
/// Key sent with `clear` (ignored by the hub).
pub const CLEAR_KEY: &str = "*";

/// Operation requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "global-storage:get")]
    Get,
    #[serde(rename = "global-storage:set")]
    Set,
    #[serde(rename = "global-storage:delete")]
    Delete,
    #[serde(rename = "global-storage:clear")]
    Clear,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "global-storage:get",
            Method::Set => "global-storage:set",
            Method::Delete => "global-storage:delete",
            Method::Clear => "global-storage:clear",
        }
    }
}

/// Client -> hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    /// Pattern the caller declares for the record it touches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_origin: Option<String>,
    pub method: Method,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Request {
    /// Parse a request out of an arbitrary inbound message.
    pub fn from_value(data: &Value) -> Result<Self> {
        Request::deserialize(data)
            .map_err(|e| GlobalStoreError::BadRequest(format!("invalid request: {e}")))
    }
}

/// Hub -> client, correlated by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Reply {
    pub fn ok(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            value: Some(value),
            error: None,
            code: None,
        }
    }

    pub fn err(id: impl Into<String>, err: &GlobalStoreError) -> Self {
        Self {
            id: id.into(),
            value: None,
            error: Some(err.to_string()),
            code: Some(err.code().as_str().to_string()),
        }
    }

    /// Outcome as seen by the caller. A missing value reads as `null`.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(message) => Err(GlobalStoreError::from_reply(message, self.code.as_deref())),
            None => Ok(self.value.unwrap_or(Value::Null)),
        }
    }
}

/// What a client can receive from the hub.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Ready,
    Reply(Reply),
}

impl Inbound {
    /// Classify an inbound message; `None` for anything unrecognised.
    pub fn classify(data: &Value) -> Option<Self> {
        if data.as_str() == Some(READY_SENTINEL) {
            return Some(Inbound::Ready);
        }
        Reply::deserialize(data).ok().map(Inbound::Reply)
    }
}
