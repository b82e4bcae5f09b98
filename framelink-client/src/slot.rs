//! Client lifecycle slot
//!
//! An explicit process-wide handle owning at most one live client. The slot
//! is an ordinary value rather than a hidden static, so tests can run
//! several independent slots in one process. Re-initializing with an
//! identical identity triple returns the live instance untouched;
//! different identity tears the old instance down first.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::dispatcher::{ClientConfig, PluginClient};
use crate::endpoint::SigningEndpoint;
use crate::error::ClientError;
use crate::transport::{FrameTransport, InboundFrame};

/// Holder of the single live [`PluginClient`].
#[derive(Default)]
pub struct ClientSlot {
    current: Mutex<Option<Arc<PluginClient>>>,
}

impl ClientSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the client, idempotently.
    ///
    /// With an identity triple matching the live instance, that instance is
    /// returned as-is: its listeners stay installed and the supplied
    /// transport and inbound channel are simply dropped. Otherwise the old
    /// instance (if any) is torn down — its pending requests fail with
    /// [`ClientError::Shutdown`] — and a replacement is built, including the
    /// `init` handshake that establishes the plugin context.
    pub async fn initialize(
        &self,
        config: ClientConfig,
        transport: Arc<dyn FrameTransport>,
        inbound: mpsc::UnboundedReceiver<InboundFrame>,
        endpoint: Arc<dyn SigningEndpoint>,
    ) -> Result<Arc<PluginClient>, ClientError> {
        let mut current = self.current.lock().await;

        if let Some(existing) = current.as_ref() {
            if existing.identity_matches(&config) {
                tracing::debug!(iframe_uid = %config.iframe_uid, "initialize is idempotent, returning live client");
                return Ok(Arc::clone(existing));
            }
            tracing::info!(iframe_uid = %config.iframe_uid, "identity changed, replacing plugin client");
            existing.teardown();
            *current = None;
        }

        let client = PluginClient::connect(config, transport, inbound, endpoint).await?;
        *current = Some(Arc::clone(&client));
        Ok(client)
    }

    /// The live client, if any.
    pub async fn get(&self) -> Option<Arc<PluginClient>> {
        self.current.lock().await.clone()
    }

    /// Tear down the live client, failing its pending requests.
    pub async fn shutdown(&self) {
        if let Some(client) = self.current.lock().await.take() {
            client.teardown();
        }
    }
}
