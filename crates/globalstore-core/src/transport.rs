//! In-process parent <-> child message channel.
//!
//! Mirrors the semantics the protocol relies on:
//! - every delivered message carries the sender's origin, stamped by the
//!   channel, never by the sender;
//! - a send may name a target origin; if the other side's origin differs the
//!   message is dropped silently.
//!
//! [`Connector`] is the seam through which the client creates the hub's child
//! context; implementations decide where the hub actually runs.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use crate::error::{GlobalStoreError, Result};

/// One delivered message.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Sender origin (`None` for an undefined origin).
    pub origin: Option<String>,
    pub data: Value,
}

/// Delivery filter on send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOrigin {
    /// Deliver regardless of the receiver's origin.
    Any,
    /// Deliver only if the receiver's origin is exactly this.
    Exact(String),
}

impl TargetOrigin {
    /// Target for replying to `origin`; undefined origins get `Any`.
    pub fn reply_to(origin: Option<&str>) -> Self {
        match origin {
            Some(o) if !crate::origin::is_undefined(Some(o)) => TargetOrigin::Exact(o.to_string()),
            _ => TargetOrigin::Any,
        }
    }

    pub fn admits(&self, receiver: Option<&str>) -> bool {
        match self {
            TargetOrigin::Any => true,
            TargetOrigin::Exact(o) => receiver == Some(o.as_str()),
        }
    }
}

/// Create a connected pair: `(parent end, child end)`.
pub fn pair(parent_origin: Option<String>, child_origin: Option<String>) -> (Port, Port) {
    let (to_child, child_rx) = mpsc::unbounded_channel();
    let (to_parent, parent_rx) = mpsc::unbounded_channel();

    let parent = Port {
        sender: PortSender {
            local: parent_origin.clone(),
            remote: child_origin.clone(),
            tx: to_child,
        },
        receiver: PortReceiver { rx: parent_rx },
    };
    let child = Port {
        sender: PortSender {
            local: child_origin,
            remote: parent_origin,
            tx: to_parent,
        },
        receiver: PortReceiver { rx: child_rx },
    };
    (parent, child)
}

/// Sending half. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PortSender {
    local: Option<String>,
    remote: Option<String>,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl PortSender {
    /// Post `data` to the other side. Filtered-out messages are not an error.
    pub fn post(&self, data: Value, target: &TargetOrigin) -> Result<()> {
        if !target.admits(self.remote.as_deref()) {
            tracing::debug!(?target, remote = ?self.remote, "message dropped by target filter");
            return Ok(());
        }
        self.tx
            .send(Envelope {
                origin: self.local.clone(),
                data,
            })
            .map_err(|_| GlobalStoreError::Transport("peer context is gone".into()))
    }

    pub fn local_origin(&self) -> Option<&str> {
        self.local.as_deref()
    }

    pub fn remote_origin(&self) -> Option<&str> {
        self.remote.as_deref()
    }
}

/// Receiving half.
#[derive(Debug)]
pub struct PortReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl PortReceiver {
    /// Next message; `None` once the other side has dropped every sender.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

/// One end of a channel.
#[derive(Debug)]
pub struct Port {
    sender: PortSender,
    receiver: PortReceiver,
}

impl Port {
    pub fn split(self) -> (PortSender, PortReceiver) {
        (self.sender, self.receiver)
    }

    pub fn post(&self, data: Value, target: &TargetOrigin) -> Result<()> {
        self.sender.post(data, target)
    }

    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }

    pub fn local_origin(&self) -> Option<&str> {
        self.sender.local_origin()
    }

    pub fn remote_origin(&self) -> Option<&str> {
        self.sender.remote_origin()
    }
}

/// Creates the hub's child context and hands back the parent's end of it.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, hub_url: &Url, parent_origin: &str) -> Result<Port>;
}
