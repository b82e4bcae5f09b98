//! Shared harness: an in-process host page and signing authority.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use framelink_client::{ClientConfig, EndpointError, InboundFrame, SigningEndpoint};
use framelink_signer::HostSigner;
use framelink_wire::{
    InboundMessage, InboundPayload, OutboundEnvelope, RequestBody, ResponseBody, SafeRequestData,
    SignRequestBody, SignedPayload, SignedRequestData,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Signing authority reached in-process, with a call counter.
pub struct LocalEndpoint {
    signer: Arc<HostSigner>,
    calls: AtomicUsize,
}

impl LocalEndpoint {
    pub fn new(signer: Arc<HostSigner>) -> Arc<Self> {
        Arc::new(Self {
            signer,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SigningEndpoint for LocalEndpoint {
    async fn sign(&self, body: SignRequestBody) -> Result<SignedPayload, EndpointError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.signer
            .sign(body)
            .map_err(|e| EndpointError::Rejected(e.to_string()))
    }
}

/// Behavior switches for the host page task.
#[derive(Default)]
pub struct HostOptions {
    /// Origin attached to every delivered frame
    pub origin: Option<String>,
    /// After the init handshake, deliver frames from this origin instead
    pub origin_after_init: Option<String>,
    /// Corrupt signatures on every response after the init handshake
    pub corrupt_after_init: bool,
    /// Answer signed reads with the explicit error shape
    pub remote_errors: bool,
    /// Leave safe requests (other than init) unanswered
    pub ignore_safe_after_init: bool,
    /// Deliver every response twice
    pub duplicate_responses: bool,
    /// Answer the init handshake with the explicit error shape
    pub fail_init: bool,
    /// Corrupt the signature on the init response itself
    pub corrupt_init: bool,
}

/// Run a host page: answer every request arriving on `outbound`, signing
/// responses with `signer`. Every parsed request body is forwarded to
/// `seen` for assertions.
pub fn spawn_host(
    signer: Arc<HostSigner>,
    mut outbound: mpsc::UnboundedReceiver<OutboundEnvelope>,
    inbound: mpsc::UnboundedSender<InboundFrame>,
    seen: mpsc::UnboundedSender<RequestBody>,
    options: HostOptions,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut init_done = false;
        while let Some(envelope) = outbound.recv().await {
            let body: RequestBody = serde_json::from_str(&envelope.request).unwrap();
            let _ = seen.send(body.clone());

            let is_init = matches!(
                body,
                RequestBody::Safe {
                    data: SafeRequestData::Init,
                    ..
                }
            );
            if !is_init && options.ignore_safe_after_init && matches!(body, RequestBody::Safe { .. })
            {
                continue;
            }

            let mut data = answer(&body, options.remote_errors);
            if is_init && options.fail_init {
                data = json!({ "error": "init refused" });
            }
            let request_id = body.request_id().to_string();
            let raw = serde_json::to_string(&ResponseBody {
                data,
                plugin_id: "p1".to_string(),
                request_id: request_id.clone(),
            })
            .unwrap();

            let mut signature = signer.sign_response(&raw);
            if (init_done && options.corrupt_after_init) || (is_init && options.corrupt_init) {
                signature = signer.sign_response("something else entirely");
            }

            let origin = match (&options.origin_after_init, init_done) {
                (Some(changed), true) => Some(changed.clone()),
                _ => options.origin.clone(),
            };
            let frame = InboundFrame {
                origin,
                message: InboundMessage {
                    request_id,
                    payload: InboundPayload {
                        response: raw,
                        signature: Some(signature),
                    },
                },
            };
            let _ = inbound.send(frame.clone());
            if options.duplicate_responses {
                let _ = inbound.send(frame);
            }
            if is_init {
                init_done = true;
            }
        }
    })
}

fn answer(body: &RequestBody, remote_errors: bool) -> serde_json::Value {
    match body {
        RequestBody::Safe { data, .. } => match data {
            SafeRequestData::Init => json!({
                "pluginId": "p1",
                "userId": "u1",
                "assignableRoles": ["r9"],
            }),
            SafeRequestData::Navigate { .. } => json!({ "ok": true }),
            SafeRequestData::RequestPermission { permissions } => {
                json!({ "granted": permissions })
            }
        },
        RequestBody::Request { data, .. } | RequestBody::Action { data, .. } => {
            if remote_errors {
                return json!({ "error": "operation refused" });
            }
            match data {
                SignedRequestData::UserInfo => json!({
                    "id": "u1",
                    "name": "Ann",
                    "roles": [],
                }),
                SignedRequestData::CommunityInfo => json!({
                    "id": "c1",
                    "title": "Rustaceans",
                    "roles": ["r9"],
                }),
                SignedRequestData::UserFriends { limit, offset } => json!({
                    "friends": [{ "id": "u2", "name": "Bo", "roles": [] }],
                    "limit": limit,
                    "offset": offset,
                }),
                SignedRequestData::GiveRole { .. } => json!({ "ok": true }),
            }
        }
    }
}

/// Client configuration pointed at the harness signer.
pub fn client_config(signer: &HostSigner) -> ClientConfig {
    ClientConfig::new(
        "iframe-1",
        "https://sign.example/sign",
        signer.key_material().public_pem(),
    )
}
