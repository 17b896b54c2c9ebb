use async_trait::async_trait;
use url::Url;

use globalstore_core::error::Result;
use globalstore_core::origin::origin_of;
use globalstore_core::transport::{pair, Connector, Port};

use super::port::serve_port;
use crate::dispatch::Hub;

/// Connector that runs the hub in-process, on its own task.
///
/// Every `connect` creates a fresh child context over the same [`Hub`], so
/// several clients (on different origins) share one store.
#[derive(Clone)]
pub struct EmbeddedHub {
    hub: Hub,
}

impl EmbeddedHub {
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }
}

#[async_trait]
impl Connector for EmbeddedHub {
    async fn connect(&self, hub_url: &Url, parent_origin: &str) -> Result<Port> {
        let (parent, child) = pair(Some(parent_origin.to_string()), Some(origin_of(hub_url)));
        let hub = self.hub.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_port(hub, child).await {
                tracing::debug!(error = %e, "embedded hub stopped");
            }
        });
        Ok(parent)
    }
}
