//! Client dispatcher
//!
//! Orchestrates the send pipeline: obtain a signature (signed requests) or a
//! client-generated id (safe requests), pass the rate limiter, register a
//! pending listener, post the envelope, and retry on a fixed interval until
//! a correlated response arrives or attempts are exhausted. A spawned pump
//! task verifies and routes every inbound frame to the correlator.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use framelink_wire::{
    request_id_of, OutboundEnvelope, PluginContext, PublicKeyMaterial, RequestBody, ResponseBody,
    SafeRequestData, SignRequestBody, SignedCategory, SignedRequestData,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::correlator::{CorrelatedResponse, Correlator};
use crate::endpoint::SigningEndpoint;
use crate::error::ClientError;
use crate::rate::{RateLimitConfig, RateWindow};
use crate::transport::{FrameTransport, InboundFrame};

/// Fixed-interval retry policy for outbound requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total dispatch attempts before the request fails with `Timeout`
    pub max_attempts: u32,
    /// Wait per attempt for a correlated response
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_millis(2000),
        }
    }
}

/// Client configuration established at initialization.
///
/// The `(iframe_uid, sign_endpoint_url, public_key_pem)` triple is the
/// client's identity: re-initializing a slot with an identical triple is
/// idempotent, a different triple replaces the live instance.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Identifier of the plugin's iframe, assigned by the host page
    pub iframe_uid: String,
    /// URL of the external signing authority (reached through the
    /// `SigningEndpoint` implementation; recorded here for identity)
    pub sign_endpoint_url: String,
    /// PEM-encoded public key for inbound signature verification
    pub public_key_pem: String,
    /// Host page origin; inbound frames from any other origin are dropped.
    /// `None` accepts every origin, with a reduced authenticity guarantee.
    pub host_origin: Option<String>,
    pub retry: RetryConfig,
    pub rate: RateLimitConfig,
}

impl ClientConfig {
    /// Configuration with default retry and rate policies.
    pub fn new(
        iframe_uid: impl Into<String>,
        sign_endpoint_url: impl Into<String>,
        public_key_pem: impl Into<String>,
    ) -> Self {
        Self {
            iframe_uid: iframe_uid.into(),
            sign_endpoint_url: sign_endpoint_url.into(),
            public_key_pem: public_key_pem.into(),
            host_origin: None,
            retry: RetryConfig::default(),
            rate: RateLimitConfig::default(),
        }
    }

    /// Restrict inbound frames to the given host origin.
    pub fn with_host_origin(mut self, origin: impl Into<String>) -> Self {
        self.host_origin = Some(origin.into());
        self
    }

    fn validate(&self) -> Result<(), ClientError> {
        if self.iframe_uid.is_empty() {
            return Err(ClientError::Configuration("iframe uid is empty".into()));
        }
        if self.sign_endpoint_url.is_empty() {
            return Err(ClientError::Configuration(
                "signing endpoint url is empty".into(),
            ));
        }
        Ok(())
    }
}

/// A resolved operation: the typed payload plus the raw serialized response,
/// kept so callers can re-verify the signature independently.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope<T> {
    pub data: T,
    pub raw: String,
}

struct ClientInner {
    config: ClientConfig,
    key: PublicKeyMaterial,
    context: OnceLock<PluginContext>,
    rate: Mutex<RateWindow>,
    correlator: Correlator,
    transport: Arc<dyn FrameTransport>,
    endpoint: Arc<dyn SigningEndpoint>,
}

impl ClientInner {
    fn context(&self) -> Result<&PluginContext, ClientError> {
        self.context.get().ok_or(ClientError::Uninitialized)
    }

    /// Route an inbound frame to its pending listener.
    fn handle_frame(&self, frame: InboundFrame) {
        if let Some(expected) = &self.config.host_origin {
            let matches = frame.origin.as_deref() == Some(expected.as_str());
            if !matches {
                tracing::warn!(origin = ?frame.origin, "dropping frame from unexpected origin");
                return;
            }
        }

        let request_id = frame.message.request_id;
        let raw = frame.message.payload.response;

        if let Some(signature) = &frame.message.payload.signature {
            let verified = match self.key.verify(raw.as_bytes(), signature) {
                Ok(verified) => verified,
                Err(e) => {
                    tracing::warn!(request_id = %request_id, error = %e, "malformed inbound signature");
                    false
                }
            };
            if !verified {
                // A bad signature is raised to the waiting caller, not
                // swallowed: it may indicate an impersonated host.
                if !self
                    .correlator
                    .resolve(&request_id, Err(ClientError::SignatureInvalid))
                {
                    tracing::debug!(request_id = %request_id, "unverifiable response for unknown request");
                }
                return;
            }
        }

        let body: ResponseBody = match serde_json::from_str(&raw) {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(request_id = %request_id, error = %e, "dropping malformed inbound response");
                return;
            }
        };

        let outcome = match body.error_message() {
            Some(message) => Err(ClientError::Remote(message)),
            None => Ok(CorrelatedResponse { body, raw }),
        };

        if !self.correlator.resolve(&request_id, outcome) {
            tracing::debug!(request_id = %request_id, "ignoring response for unknown or already resolved request");
        }
    }

    /// Shared tail of the send pipeline: admit, register, post, retry.
    async fn dispatch(
        &self,
        request_id: String,
        envelope: OutboundEnvelope,
    ) -> Result<CorrelatedResponse, ClientError> {
        if !self.rate.lock().expect("rate window lock poisoned").admit() {
            tracing::warn!(request_id = %request_id, "send denied by rate limiter");
            return Err(ClientError::RateLimited);
        }

        let mut rx = self.correlator.register(&request_id);
        let max_attempts = self.config.retry.max_attempts;

        for attempt in 1..=max_attempts {
            if let Err(e) = self.transport.post(&envelope) {
                self.correlator.cancel(&request_id);
                return Err(e.into());
            }
            tracing::debug!(request_id = %request_id, attempt, "envelope posted");

            match tokio::time::timeout(self.config.retry.timeout, &mut rx).await {
                Ok(Ok(outcome)) => return outcome,
                // The listener was displaced or dropped without an outcome
                Ok(Err(_)) => return Err(ClientError::Shutdown),
                Err(_) => {
                    if attempt < max_attempts {
                        tracing::debug!(request_id = %request_id, attempt, "no correlated response, redispatching");
                    }
                }
            }
        }

        self.correlator.cancel(&request_id);
        tracing::warn!(request_id = %request_id, attempts = max_attempts, "request timed out");
        Err(ClientError::Timeout {
            attempts: max_attempts,
        })
    }

    async fn send_safe(&self, data: SafeRequestData) -> Result<CorrelatedResponse, ClientError> {
        let request_id = safe_request_id(&data);
        let request = RequestBody::safe(self.config.iframe_uid.as_str(), request_id.as_str(), data)
            .to_canonical_json()?;
        let envelope = OutboundEnvelope {
            request,
            signature: None,
        };
        self.dispatch(request_id, envelope).await
    }

    async fn send_signed(
        &self,
        category: SignedCategory,
        data: SignedRequestData,
    ) -> Result<CorrelatedResponse, ClientError> {
        let context = self.context()?;
        let body = SignRequestBody {
            plugin_id: context.plugin_id.clone(),
            iframe_uid: self.config.iframe_uid.clone(),
            category,
            data,
        };

        let payload = self.endpoint.sign(body).await?;
        let request_id = request_id_of(&payload.request)?;
        let envelope = OutboundEnvelope {
            request: payload.request,
            signature: Some(payload.signature),
        };
        self.dispatch(request_id, envelope).await
    }
}

/// Client-side request id: `safeRequest-<millis>-<operation>`.
fn safe_request_id(data: &SafeRequestData) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("safeRequest-{}-{}", millis, data.operation())
}

/// The live client instance for a plugin frame.
///
/// Created through [`crate::ClientSlot::initialize`], which performs the
/// `init` handshake before handing the instance out — every `PluginClient` a
/// caller can reach is fully initialized.
pub struct PluginClient {
    inner: Arc<ClientInner>,
    pump: JoinHandle<()>,
}

impl std::fmt::Debug for PluginClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginClient").finish_non_exhaustive()
    }
}

impl PluginClient {
    pub(crate) async fn connect(
        config: ClientConfig,
        transport: Arc<dyn FrameTransport>,
        inbound: mpsc::UnboundedReceiver<InboundFrame>,
        endpoint: Arc<dyn SigningEndpoint>,
    ) -> Result<Arc<Self>, ClientError> {
        config.validate()?;
        let key = PublicKeyMaterial::from_pem(&config.public_key_pem)
            .map_err(|e| ClientError::Configuration(format!("public key: {e}")))?;

        if config.host_origin.is_none() {
            tracing::warn!("no host origin configured, accepting frames from any origin");
        }

        let rate = RateWindow::new(config.rate.clone());
        let inner = Arc::new(ClientInner {
            config,
            key,
            context: OnceLock::new(),
            rate: Mutex::new(rate),
            correlator: Correlator::new(),
            transport,
            endpoint,
        });

        let pump = tokio::spawn(pump_inbound(Arc::clone(&inner), inbound));
        let client = Arc::new(Self { inner, pump });

        match client.inner.send_safe(SafeRequestData::Init).await {
            Ok(resolved) => {
                let context: PluginContext = resolved.body.decode()?;
                tracing::info!(
                    iframe_uid = %client.inner.config.iframe_uid,
                    plugin_id = %context.plugin_id,
                    "plugin client initialized"
                );
                let _ = client.inner.context.set(context);
                Ok(client)
            }
            Err(e) => {
                client.teardown();
                Err(e)
            }
        }
    }

    /// Identity snapshot established by the `init` handshake.
    pub fn context_data(&self) -> Result<PluginContext, ClientError> {
        self.inner.context().cloned()
    }

    /// Fetch the current user, as a signed read.
    pub async fn user_info(
        &self,
    ) -> Result<ResponseEnvelope<framelink_wire::UserInfo>, ClientError> {
        self.signed_op(SignedCategory::Request, SignedRequestData::UserInfo)
            .await
    }

    /// Fetch the embedding community, as a signed read.
    pub async fn community_info(
        &self,
    ) -> Result<ResponseEnvelope<framelink_wire::CommunityInfo>, ClientError> {
        self.signed_op(SignedCategory::Request, SignedRequestData::CommunityInfo)
            .await
    }

    /// Fetch a page of the user's friends, as a signed read.
    pub async fn user_friends(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<ResponseEnvelope<framelink_wire::UserFriends>, ClientError> {
        self.signed_op(
            SignedCategory::Request,
            SignedRequestData::UserFriends { limit, offset },
        )
        .await
    }

    /// Assign a role to a user, as a signed action.
    pub async fn give_role(
        &self,
        role_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<ResponseEnvelope<serde_json::Value>, ClientError> {
        self.signed_op(
            SignedCategory::Action,
            SignedRequestData::GiveRole {
                role_id: role_id.into(),
                user_id: user_id.into(),
            },
        )
        .await
    }

    /// Ask the host to navigate; safe category, no signing round trip.
    pub async fn navigate(
        &self,
        url: impl Into<String>,
    ) -> Result<ResponseEnvelope<serde_json::Value>, ClientError> {
        self.safe_op(SafeRequestData::Navigate { url: url.into() }).await
    }

    /// Prompt the user for permissions; safe category.
    pub async fn request_permission(
        &self,
        permissions: Vec<String>,
    ) -> Result<ResponseEnvelope<serde_json::Value>, ClientError> {
        self.safe_op(SafeRequestData::RequestPermission { permissions })
            .await
    }

    async fn signed_op<T: serde::de::DeserializeOwned>(
        &self,
        category: SignedCategory,
        data: SignedRequestData,
    ) -> Result<ResponseEnvelope<T>, ClientError> {
        let resolved = self.inner.send_signed(category, data).await?;
        Ok(ResponseEnvelope {
            data: resolved.body.decode()?,
            raw: resolved.raw,
        })
    }

    async fn safe_op(
        &self,
        data: SafeRequestData,
    ) -> Result<ResponseEnvelope<serde_json::Value>, ClientError> {
        self.inner.context()?;
        let resolved = self.inner.send_safe(data).await?;
        Ok(ResponseEnvelope {
            data: resolved.body.data,
            raw: resolved.raw,
        })
    }

    pub(crate) fn identity_matches(&self, config: &ClientConfig) -> bool {
        let own = &self.inner.config;
        own.iframe_uid == config.iframe_uid
            && own.sign_endpoint_url == config.sign_endpoint_url
            && own.public_key_pem == config.public_key_pem
    }

    /// Stop the inbound pump and fail every pending request.
    pub(crate) fn teardown(&self) {
        self.pump.abort();
        self.inner.correlator.fail_all(|| ClientError::Shutdown);
        tracing::info!(iframe_uid = %self.inner.config.iframe_uid, "plugin client torn down");
    }
}

impl Drop for PluginClient {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump_inbound(
    inner: Arc<ClientInner>,
    mut inbound: mpsc::UnboundedReceiver<InboundFrame>,
) {
    while let Some(frame) = inbound.recv().await {
        inner.handle_frame(frame);
    }
    tracing::debug!("inbound channel closed, pump exiting");
}
