//! Client protocol engine.
//!
//! States: `Idle -> Initializing -> Ready | Failed`. Requests are only sent
//! in `Ready`; anything earlier fails with `NotReady` instead of queuing.
//!
//! Correlation: every request registers a `oneshot` under a fresh id in the
//! pending map; the listener task completes it when the matching reply
//! arrives. Timed-out entries are removed, so a late reply finds nothing and
//! is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use url::Url;

use globalstore_core::error::{GlobalStoreError, Result};
use globalstore_core::origin::{host_of, origin_of, registrable_domain, DomainExtractor, LOCALHOST};
use globalstore_core::protocol::{Inbound, Method, Request, CLEAR_KEY, CONNECT_ID, REQUEST_ID_PREFIX};
use globalstore_core::transport::{Connector, PortReceiver, PortSender, TargetOrigin};
use globalstore_core::{AccessPattern, HeuristicExtractor};

use crate::options::ClientOptions;

/// Lifecycle of a client.
#[derive(Debug, Clone)]
pub enum ClientState {
    Idle,
    Initializing,
    Ready,
    /// Terminal. Holds the error `init` failed with.
    Failed(GlobalStoreError),
}

type Completion = oneshot::Sender<Result<Value>>;

/// Handle to the shared store, as seen from one page.
#[derive(Clone)]
pub struct GlobalStorage {
    inner: Arc<Inner>,
}

struct Inner {
    page_origin: String,
    domain: String,
    connector: Arc<dyn Connector>,
    state: watch::Sender<ClientState>,
    session: OnceLock<Session>,
    pending: DashMap<String, Completion>,
    seq: AtomicU64,
}

/// Established once the child context exists.
struct Session {
    sender: PortSender,
    hub_origin: String,
    allow: AccessPattern,
    timeout: Duration,
}

impl GlobalStorage {
    /// Client for a page at `page_origin` (e.g. `https://app.example.com`).
    pub fn new(page_origin: &str, connector: Arc<dyn Connector>) -> Result<Self> {
        Self::with_extractor(page_origin, connector, &HeuristicExtractor::new()?)
    }

    pub fn with_extractor(
        page_origin: &str,
        connector: Arc<dyn Connector>,
        extractor: &dyn DomainExtractor,
    ) -> Result<Self> {
        // pages without a host (file://) act as localhost
        let host = host_of(page_origin).unwrap_or_else(|| LOCALHOST.to_string());
        let domain = registrable_domain(&host, extractor).ok_or_else(|| {
            GlobalStoreError::Configuration(format!("cannot derive domain for page host {host}"))
        })?;
        let (state, _) = watch::channel(ClientState::Idle);

        Ok(Self {
            inner: Arc::new(Inner {
                page_origin: page_origin.to_string(),
                domain,
                connector,
                state,
                session: OnceLock::new(),
                pending: DashMap::new(),
                seq: AtomicU64::new(0),
            }),
        })
    }

    /// Registrable domain this client acts as.
    pub fn domain(&self) -> &str {
        &self.inner.domain
    }

    pub fn state(&self) -> ClientState {
        self.inner.state.borrow().clone()
    }

    /// Outstanding correlation entries (handshake included).
    pub fn pending(&self) -> usize {
        self.inner.pending.len()
    }

    fn is_ready(&self) -> bool {
        matches!(*self.inner.state.borrow(), ClientState::Ready)
    }

    /// Connect to the hub and wait for its readiness signal.
    ///
    /// Fails without contacting anything if the declared pattern does not
    /// cover this page. Only the first call creates the child context; once
    /// that has started, later calls ignore `opts` and share its outcome.
    ///
    /// The handshake runs on its own task, so dropping this future does not
    /// strand the client in `Initializing`.
    pub async fn init(&self, opts: ClientOptions) -> Result<()> {
        if !matches!(*self.inner.state.borrow(), ClientState::Idle) {
            return self.settled().await;
        }

        let url = opts.hub_url()?;
        let allow = opts.pattern(&self.inner.domain)?;
        let timeout = opts.timeout()?;

        if !allow.matches(&self.inner.domain) {
            tracing::error!(domain = %self.inner.domain, allow = %allow, "declared pattern excludes this page");
            return Err(GlobalStoreError::SelfPolicyMismatch {
                origin: self.inner.domain.clone(),
                pattern: allow.as_str().to_string(),
            });
        }

        let mut first = false;
        self.inner.state.send_if_modified(|s| {
            if matches!(s, ClientState::Idle) {
                *s = ClientState::Initializing;
                first = true;
            }
            first
        });
        if first {
            tokio::spawn(establish(self.inner.clone(), url, allow, timeout));
        }
        self.settled().await
    }

    // Wait until the handshake has a result.
    async fn settled(&self) -> Result<()> {
        let mut rx = self.inner.state.subscribe();
        let state = rx
            .wait_for(|s| matches!(s, ClientState::Ready | ClientState::Failed(_)))
            .await
            .map_err(|_| GlobalStoreError::Internal("client state closed".into()))?
            .clone();
        match state {
            ClientState::Failed(e) => Err(e),
            _ => Ok(()),
        }
    }

    async fn request(&self, method: Method, key: &str, value: Option<Value>) -> Result<Value> {
        if !self.is_ready() {
            return Err(GlobalStoreError::NotReady);
        }
        let session = self.inner.session.get().ok_or(GlobalStoreError::NotReady)?;

        let n = self.inner.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("{REQUEST_ID_PREFIX}{n}");
        let req = Request {
            id: id.clone(),
            allowed_origin: Some(session.allow.as_str().to_string()),
            method,
            key: key.to_string(),
            value,
        };
        let data = serde_json::to_value(&req)
            .map_err(|e| GlobalStoreError::BadRequest(format!("request encode failed: {e}")))?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(id.clone(), tx);
        if let Err(e) = session
            .sender
            .post(data, &TargetOrigin::Exact(session.hub_origin.clone()))
        {
            self.inner.pending.remove(&id);
            return Err(e);
        }
        tracing::debug!(%id, method = method.as_str(), key, "request sent");

        match tokio::time::timeout(session.timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(GlobalStoreError::Transport("hub link closed".into())),
            Err(_) => {
                self.inner.pending.remove(&id);
                tracing::warn!(%id, method = method.as_str(), key, "request timed out");
                Err(GlobalStoreError::Timeout)
            }
        }
    }

    /// Stored value, or `None` if the key was never set (or was removed).
    pub async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        match self.request(Method::Get, key, None).await? {
            Value::Null => Ok(None),
            v => Ok(Some(v)),
        }
    }

    /// Typed variant of [`get_item`](Self::get_item).
    pub async fn get_item_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get_item(key)
            .await?
            .map(|v| {
                serde_json::from_value(v)
                    .map_err(|e| GlobalStoreError::BadRequest(format!("value for {key:?}: {e}")))
            })
            .transpose()
    }

    /// Store `value` under `key`, replacing any previous value and pattern.
    /// Resolves to the stored value.
    pub async fn set_item<T: Serialize>(&self, key: &str, value: T) -> Result<Value> {
        let value = serde_json::to_value(value)
            .map_err(|e| GlobalStoreError::BadRequest(format!("value encode failed: {e}")))?;
        self.request(Method::Set, key, Some(value)).await
    }

    /// Delete `key`. Fails with `KeyNotFound` if it does not exist.
    pub async fn remove_item(&self, key: &str) -> Result<()> {
        self.request(Method::Delete, key, None).await.map(|_| ())
    }

    /// Delete every record whose pattern admits this page.
    pub async fn clear(&self) -> Result<()> {
        self.request(Method::Clear, CLEAR_KEY, None).await.map(|_| ())
    }
}

// --------------------
// Handshake
// --------------------

/// Drive `Initializing` to `Ready` or `Failed`. The deadline covers the
/// connect as well as the wait for the readiness signal.
async fn establish(inner: Arc<Inner>, url: Url, allow: AccessPattern, timeout: Duration) {
    let outcome = match tokio::time::timeout(timeout, handshake(&inner, url, allow, timeout)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            inner.pending.remove(CONNECT_ID);
            Err(GlobalStoreError::Timeout)
        }
    };

    match outcome {
        Ok(()) => {
            tracing::info!(domain = %inner.domain, "hub ready");
            inner.state.send_replace(ClientState::Ready);
        }
        Err(e) => {
            tracing::warn!(domain = %inner.domain, error = %e, "hub init failed");
            inner.state.send_replace(ClientState::Failed(e));
        }
    }
}

async fn handshake(inner: &Arc<Inner>, url: Url, allow: AccessPattern, timeout: Duration) -> Result<()> {
    let port = inner.connector.connect(&url, &inner.page_origin).await?;
    let (sender, receiver) = port.split();
    let hub_origin = origin_of(&url);

    let (tx, rx) = oneshot::channel();
    inner.pending.insert(CONNECT_ID.to_string(), tx);
    let session = Session {
        sender,
        hub_origin: hub_origin.clone(),
        allow,
        timeout,
    };
    if inner.session.set(session).is_err() {
        return Err(GlobalStoreError::Internal("hub session already established".into()));
    }
    tokio::spawn(listen(Arc::downgrade(inner), receiver, hub_origin));

    match rx.await {
        Ok(outcome) => outcome.map(|_| ()),
        Err(_) => Err(GlobalStoreError::Transport("hub closed before ready".into())),
    }
}

// --------------------
// Inbound listener
// --------------------
async fn listen(inner: Weak<Inner>, mut receiver: PortReceiver, hub_origin: String) {
    while let Some(env) = receiver.recv().await {
        let Some(client) = inner.upgrade() else { return };

        if env.origin.as_deref() != Some(hub_origin.as_str()) {
            tracing::warn!(origin = ?env.origin, "ignoring message from unexpected origin");
            continue;
        }

        match Inbound::classify(&env.data) {
            Some(Inbound::Ready) => match client.pending.remove(CONNECT_ID) {
                Some((_, tx)) => {
                    let _ = tx.send(Ok(Value::Null));
                }
                None => tracing::debug!("ignoring late or duplicate ready signal"),
            },
            Some(Inbound::Reply(reply)) if reply.id != CONNECT_ID => {
                match client.pending.remove(&reply.id) {
                    Some((_, tx)) => {
                        let _ = tx.send(reply.into_result());
                    }
                    None => tracing::debug!(id = %reply.id, "dropping reply for unknown or expired request"),
                }
            }
            _ => tracing::debug!("ignoring unrecognised message"),
        }
    }

    // link closed: fail everything still waiting instead of letting it time out
    if let Some(client) = inner.upgrade() {
        let dropped = client.pending.len();
        client.pending.clear();
        if dropped > 0 {
            tracing::warn!(dropped, "hub link closed with requests outstanding");
        }
    }
}
