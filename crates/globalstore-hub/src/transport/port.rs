use serde_json::Value;

use globalstore_core::error::{GlobalStoreError, Result};
use globalstore_core::protocol::READY_SENTINEL;
use globalstore_core::transport::{Port, TargetOrigin};

use crate::dispatch::Hub;

/// Run the hub on the child end of an in-process channel until the parent
/// goes away.
///
/// The parent origin is the port's remote origin. If the hub refuses it the
/// error is returned before anything is sent, so the parent never sees the
/// readiness signal.
pub async fn serve_port(hub: Hub, mut port: Port) -> Result<()> {
    let parent = port.remote_origin().map(str::to_string);
    let handler = hub.start(parent.as_deref()).map_err(|e| {
        tracing::error!(parent = ?parent, error = %e, "hub refused to start");
        e
    })?;

    port.post(Value::String(READY_SENTINEL.into()), &TargetOrigin::Any)?;

    while let Some(env) = port.recv().await {
        let reply_to = TargetOrigin::reply_to(env.origin.as_deref());
        let Some(reply) = handler.handle_async(env.origin, env.data).await else {
            continue;
        };
        let data = serde_json::to_value(&reply)
            .map_err(|e| GlobalStoreError::Internal(format!("reply encode failed: {e}")))?;
        if port.post(data, &reply_to).is_err() {
            break;
        }
    }

    tracing::debug!(parent = ?parent, "hub port closed");
    Ok(())
}
