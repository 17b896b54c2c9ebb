//! Per-operation access decision.
//!
//! Three independent patterns must agree before the store is touched:
//! the caller's declared pattern (must cover the caller itself), the pattern
//! stored with an existing record, and the hub-global pattern. Checks run in
//! that order and stop at the first failure, so the reason tells a malformed
//! request apart from an owner lock and from a hub refusal.

use globalstore_core::error::GlobalStoreError;
use globalstore_core::protocol::Method;
use globalstore_core::{AccessPattern, Record};

/// Inputs of one decision. Borrowed; nothing here touches the store.
#[derive(Debug, Clone, Copy)]
pub struct AccessCheck<'a> {
    pub op: Method,
    pub key: &'a str,
    /// Caller's registrable domain (`None` when the origin is undefined).
    pub caller: Option<&'a str>,
    /// Pattern the caller declared on this request.
    pub declared: Option<&'a str>,
    /// Record currently stored under `key`, if any. Always `None` for `clear`.
    pub record: Option<&'a Record>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    OriginRequired,
    SelfPolicyMismatch,
    RecordAccessDenied,
    HubPolicyDenied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

/// Decide whether `check` may proceed under `global`.
pub fn decide(check: &AccessCheck<'_>, global: &AccessPattern, allow_empty_origin: bool) -> Decision {
    // 1) undefined origin: all or nothing
    let caller = match check.caller {
        Some(c) if !c.is_empty() => c,
        _ if allow_empty_origin => return Decision::Allow,
        _ => return Decision::Deny(DenyReason::OriginRequired),
    };

    // 2) declared pattern must cover the caller (optional for clear)
    match check.declared {
        Some(p) => {
            let covers = AccessPattern::new(p).map(|p| p.matches(caller)).unwrap_or(false);
            if !covers {
                return Decision::Deny(DenyReason::SelfPolicyMismatch);
            }
        }
        None if check.op == Method::Clear => {}
        None => return Decision::Deny(DenyReason::SelfPolicyMismatch),
    }

    // 3) owner lock
    if let Some(record) = check.record {
        if !record.permits(caller) {
            return Decision::Deny(DenyReason::RecordAccessDenied);
        }
    }

    // 4) hub-global
    if !global.matches(caller) {
        return Decision::Deny(DenyReason::HubPolicyDenied);
    }

    Decision::Allow
}

impl AccessCheck<'_> {
    /// Client-facing error for a denial of this check.
    pub fn deny_error(&self, reason: DenyReason) -> GlobalStoreError {
        let origin = self.caller.unwrap_or_default().to_string();
        match reason {
            DenyReason::OriginRequired => GlobalStoreError::OriginRequired,
            DenyReason::SelfPolicyMismatch => GlobalStoreError::SelfPolicyMismatch {
                origin,
                pattern: self.declared.unwrap_or_default().to_string(),
            },
            DenyReason::RecordAccessDenied => GlobalStoreError::RecordAccessDenied {
                key: self.key.to_string(),
                origin,
            },
            DenyReason::HubPolicyDenied => GlobalStoreError::HubPolicyDenied(origin),
        }
    }
}
