use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use globalstore_core::error::{GlobalStoreError, Result};
use globalstore_core::origin::{domain_of, DomainExtractor};
use globalstore_core::protocol::{Method, Reply, Request};
use globalstore_core::{AccessPattern, HeuristicExtractor, Record};

use crate::policy::{AccessCheck, Decision, HubPolicy};
use crate::store::Store;

/// Shared hub: policy, store and domain extractor.
///
/// A `Hub` does not answer requests by itself; [`Hub::start`] validates a
/// parent context and returns the [`HubHandler`] that does. Cheap to clone;
/// clones share the store.
#[derive(Clone)]
pub struct Hub {
    policy: Arc<HubPolicy>,
    store: Arc<Mutex<Box<dyn Store>>>,
    blocking: bool,
    extractor: Arc<dyn DomainExtractor>,
}

impl Hub {
    pub fn new(policy: HubPolicy, store: impl Store + 'static) -> Result<Self> {
        Ok(Self {
            policy: Arc::new(policy),
            blocking: store.is_blocking(),
            store: Arc::new(Mutex::new(Box::new(store))),
            extractor: Arc::new(HeuristicExtractor::new()?),
        })
    }

    /// Replace the registrable-domain heuristic.
    pub fn with_extractor(mut self, extractor: Arc<dyn DomainExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn policy(&self) -> &HubPolicy {
        &self.policy
    }

    /// Validate the embedding parent and enter the listening state.
    ///
    /// An error here is a configuration problem: the caller must not send the
    /// readiness signal and must not process messages.
    pub fn start(&self, parent_origin: Option<&str>) -> Result<HubHandler> {
        let parent = domain_of(parent_origin, self.extractor.as_ref())
            .map_err(|e| GlobalStoreError::Configuration(format!("parent origin: {e}")))?;
        self.policy.check_parent(parent.as_deref())?;
        tracing::info!(parent = ?parent_origin, allow = %self.policy.global(), "hub listening");
        Ok(HubHandler { hub: self.clone() })
    }

    // Held for the whole handling of one message.
    fn lock_store(&self) -> Result<MutexGuard<'_, Box<dyn Store>>> {
        self.store
            .lock()
            .map_err(|_| GlobalStoreError::Internal("store lock poisoned".into()))
    }
}

/// A hub in the listening state.
#[derive(Clone)]
pub struct HubHandler {
    hub: Hub,
}

impl HubHandler {
    /// Handle one inbound message from `sender_origin`.
    ///
    /// Returns the reply to send back, or `None` when the message is not a
    /// request at all (those are dropped without answer).
    pub fn handle(&self, sender_origin: Option<&str>, data: &Value) -> Option<Reply> {
        let req = match Request::from_value(data) {
            Ok(req) => req,
            Err(e) => {
                tracing::debug!(origin = ?sender_origin, error = %e, "ignoring non-request message");
                return None;
            }
        };

        let id = req.id.clone();
        let method = req.method;
        match self.execute(sender_origin, req) {
            Ok(value) => {
                tracing::debug!(%id, method = method.as_str(), origin = ?sender_origin, "request served");
                Some(Reply::ok(id, value))
            }
            Err(e) => {
                tracing::warn!(%id, method = method.as_str(), origin = ?sender_origin, code = %e.code(), error = %e, "request failed");
                Some(Reply::err(id, &e))
            }
        }
    }

    /// [`handle`](Self::handle) for async transports. Stores that block on
    /// I/O are driven from the blocking pool so runtime workers stay free.
    pub async fn handle_async(&self, sender_origin: Option<String>, data: Value) -> Option<Reply> {
        if !self.hub.blocking {
            return self.handle(sender_origin.as_deref(), &data);
        }
        let handler = self.clone();
        tokio::task::spawn_blocking(move || handler.handle(sender_origin.as_deref(), &data))
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "blocking request task failed");
                None
            })
    }

    fn execute(&self, sender_origin: Option<&str>, req: Request) -> Result<Value> {
        let caller = domain_of(sender_origin, self.hub.extractor.as_ref())?;

        let mut store = self.hub.lock_store()?;
        let existing = match req.method {
            Method::Clear => None,
            _ => load_record(&**store, &req.key)?,
        };

        let check = AccessCheck {
            op: req.method,
            key: &req.key,
            caller: caller.as_deref(),
            declared: req.allowed_origin.as_deref(),
            record: existing.as_ref(),
        };
        if let Decision::Deny(reason) = self.hub.policy.decide(&check) {
            return Err(check.deny_error(reason));
        }

        match req.method {
            Method::Get => Ok(existing.map(|r| r.value).unwrap_or(Value::Null)),
            Method::Set => {
                let allowed = req.allowed_origin.as_deref().ok_or_else(|| {
                    GlobalStoreError::BadRequest("set requires allowed_origin".into())
                })?;
                let pattern = AccessPattern::new(allowed)?;
                let value = req.value.unwrap_or(Value::Null);
                let blob = Record::new(&pattern, value.clone()).encode()?;
                store.set(&req.key, blob)?;
                Ok(value)
            }
            Method::Delete => {
                if existing.is_none() {
                    return Err(GlobalStoreError::KeyNotFound(req.key));
                }
                store.delete(&req.key)?;
                Ok(Value::Bool(true))
            }
            Method::Clear => {
                let removed = clear_permitted(&mut **store, caller.as_deref().unwrap_or_default())?;
                tracing::debug!(origin = ?caller, removed, "clear");
                Ok(Value::Bool(true))
            }
        }
    }
}

fn load_record(store: &dyn Store, key: &str) -> Result<Option<Record>> {
    match store.get(key)? {
        Some(blob) => Record::decode(&blob)
            .map(Some)
            .map_err(|e| GlobalStoreError::Internal(format!("record {key:?}: {e}"))),
        None => Ok(None),
    }
}

/// Remove every record whose owner pattern admits `caller`, in one store
/// mutation. Undecodable records are kept.
fn clear_permitted(store: &mut dyn Store, caller: &str) -> Result<usize> {
    let mut doomed = Vec::new();
    for (key, blob) in store.entries()? {
        match Record::decode(&blob) {
            Ok(rec) if rec.permits(caller) => doomed.push(key),
            Ok(_) => {}
            Err(e) => tracing::debug!(%key, error = %e, "clear skipped undecodable record"),
        }
    }
    store.delete_many(&doomed)
}
