//! Shared error type across globalstore crates.

use thiserror::Error;

/// Stable machine-readable error codes (carried in hub replies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Fatal misconfiguration (bad pattern, bad URL, startup origin rejected).
    Configuration,
    /// Sender origin is undefined and the hub does not accept that.
    OriginRequired,
    /// Caller's declared pattern does not cover the caller itself.
    SelfPolicyMismatch,
    /// Record owner's pattern excludes the caller.
    RecordAccessDenied,
    /// Hub-global pattern excludes the caller.
    HubPolicyDenied,
    /// Delete of a key that does not exist.
    KeyNotFound,
    /// Request issued before the client reached `Ready`.
    NotReady,
    /// No reply before the deadline.
    Timeout,
    /// Invalid input / malformed message.
    BadRequest,
    /// Channel to the hub is gone.
    Transport,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Configuration => "CONFIGURATION",
            ErrorCode::OriginRequired => "ORIGIN_REQUIRED",
            ErrorCode::SelfPolicyMismatch => "SELF_POLICY_MISMATCH",
            ErrorCode::RecordAccessDenied => "RECORD_ACCESS_DENIED",
            ErrorCode::HubPolicyDenied => "HUB_POLICY_DENIED",
            ErrorCode::KeyNotFound => "KEY_NOT_FOUND",
            ErrorCode::NotReady => "NOT_READY",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    /// Parse a wire code. Unknown codes are `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let code = match s {
            "CONFIGURATION" => ErrorCode::Configuration,
            "ORIGIN_REQUIRED" => ErrorCode::OriginRequired,
            "SELF_POLICY_MISMATCH" => ErrorCode::SelfPolicyMismatch,
            "RECORD_ACCESS_DENIED" => ErrorCode::RecordAccessDenied,
            "HUB_POLICY_DENIED" => ErrorCode::HubPolicyDenied,
            "KEY_NOT_FOUND" => ErrorCode::KeyNotFound,
            "NOT_READY" => ErrorCode::NotReady,
            "TIMEOUT" => ErrorCode::Timeout,
            "BAD_REQUEST" => ErrorCode::BadRequest,
            "TRANSPORT" => ErrorCode::Transport,
            "INTERNAL" => ErrorCode::Internal,
            _ => return None,
        };
        Some(code)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, GlobalStoreError>;

/// Unified error type used by core, hub and client.
#[derive(Debug, Clone, Error)]
pub enum GlobalStoreError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("empty origin is not allowed by the hub (see allow_empty_origin)")]
    OriginRequired,
    #[error("origin {origin} is not allowed by its own pattern {pattern:?}")]
    SelfPolicyMismatch { origin: String, pattern: String },
    #[error("key {key:?} exists but is not accessible from origin {origin}")]
    RecordAccessDenied { key: String, origin: String },
    #[error("origin {0} is not allowed by the hub")]
    HubPolicyDenied(String),
    #[error("key not found: {0:?}")]
    KeyNotFound(String),
    #[error("not ready: call init() and wait for it to complete")]
    NotReady,
    #[error("timeout")]
    Timeout,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("internal: {0}")]
    Internal(String),
    /// Error reported by the hub in a reply.
    #[error("{message}")]
    Rejected { code: ErrorCode, message: String },
}

impl GlobalStoreError {
    /// Map error to its stable code. Remote errors keep the hub's code.
    pub fn code(&self) -> ErrorCode {
        match self {
            GlobalStoreError::Configuration(_) => ErrorCode::Configuration,
            GlobalStoreError::OriginRequired => ErrorCode::OriginRequired,
            GlobalStoreError::SelfPolicyMismatch { .. } => ErrorCode::SelfPolicyMismatch,
            GlobalStoreError::RecordAccessDenied { .. } => ErrorCode::RecordAccessDenied,
            GlobalStoreError::HubPolicyDenied(_) => ErrorCode::HubPolicyDenied,
            GlobalStoreError::KeyNotFound(_) => ErrorCode::KeyNotFound,
            GlobalStoreError::NotReady => ErrorCode::NotReady,
            GlobalStoreError::Timeout => ErrorCode::Timeout,
            GlobalStoreError::BadRequest(_) => ErrorCode::BadRequest,
            GlobalStoreError::Transport(_) => ErrorCode::Transport,
            GlobalStoreError::Internal(_) => ErrorCode::Internal,
            GlobalStoreError::Rejected { code, .. } => *code,
        }
    }

    /// Rebuild an error from a reply's `error`/`code` pair.
    pub fn from_reply(message: String, code: Option<&str>) -> Self {
        let code = code.and_then(ErrorCode::parse).unwrap_or(ErrorCode::Internal);
        GlobalStoreError::Rejected { code, message }
    }
}
