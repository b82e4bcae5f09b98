//! Request signing and response verification
//!
//! Stateless per call: `sign` assigns a fresh request id and signs the
//! canonical serialization, `verify` checks a signature over exact response
//! bytes. The only state is the loaded key pair.

use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use framelink_wire::{KeyError, RequestBody, SignRequestBody, SignedPayload};
use thiserror::Error;
use uuid::Uuid;

use crate::keys::{HostKeyMaterial, KeyMaterialError};

/// Errors raised by signing and verification.
#[derive(Debug, Error)]
pub enum SignError {
    /// Key material could not be loaded
    #[error("key material error: {0}")]
    Key(#[from] KeyMaterialError),

    /// The request body could not be serialized
    #[error("request serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The signature to verify is malformed (not base64, wrong length)
    #[error("malformed signature: {0}")]
    MalformedSignature(#[source] KeyError),
}

/// Host-side signer/verifier holding the loaded key pair.
pub struct HostSigner {
    keys: HostKeyMaterial,
}

impl HostSigner {
    /// Create a signer from loaded key material.
    pub fn new(keys: HostKeyMaterial) -> Self {
        Self { keys }
    }

    /// Import the key pair from PEM and create a signer.
    pub fn from_pem(private_pem: &str, public_pem: &str) -> Result<Self, SignError> {
        Ok(Self::new(HostKeyMaterial::from_pem(private_pem, public_pem)?))
    }

    /// Sign a request: assign a fresh request id, serialize the full body to
    /// canonical JSON, and sign the exact serialized bytes.
    ///
    /// The returned pair must reach the calling plugin verbatim — any
    /// re-serialization would invalidate the signature.
    pub fn sign(&self, body: SignRequestBody) -> Result<SignedPayload, SignError> {
        let request_id = Uuid::new_v4().to_string();
        let request = RequestBody::signed(body, request_id.as_str()).to_canonical_json()?;
        let signature = BASE64.encode(self.keys.sign_bytes(request.as_bytes()).to_bytes());

        tracing::debug!(request_id = %request_id, "request signed");
        Ok(SignedPayload { request, signature })
    }

    /// Sign exact response bytes, for delivery back into the plugin frame.
    ///
    /// No request id is assigned; the response body already carries the id
    /// of the request it answers.
    pub fn sign_response(&self, response: &str) -> String {
        BASE64.encode(self.keys.sign_bytes(response.as_bytes()).to_bytes())
    }

    /// Verify a base64 signature over exact response bytes.
    ///
    /// A mismatch is `Ok(false)`, never an error; malformed signature input
    /// is a hard failure.
    pub fn verify(&self, response: &str, signature_b64: &str) -> Result<bool, SignError> {
        self.keys
            .public()
            .verify(response.as_bytes(), signature_b64)
            .map_err(SignError::MalformedSignature)
    }

    /// The loaded key material.
    pub fn key_material(&self) -> &HostKeyMaterial {
        &self.keys
    }
}

/// Explicit process-wide slot holding at most one live signer.
///
/// Re-initializing with identical key material returns the existing
/// instance; different material replaces it. The slot is an ordinary value —
/// embedders create one and pass it where needed, so independent slots can
/// coexist in tests.
#[derive(Default)]
pub struct SignerSlot {
    current: Mutex<Option<Arc<HostSigner>>>,
}

impl SignerSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live signer for this key material, creating or replacing
    /// as needed.
    pub fn initialize(
        &self,
        private_pem: &str,
        public_pem: &str,
    ) -> Result<Arc<HostSigner>, SignError> {
        let mut current = self.current.lock().expect("signer slot lock poisoned");

        if let Some(existing) = current.as_ref() {
            let keys = existing.key_material();
            if keys.private_pem() == private_pem && keys.public_pem() == public_pem {
                return Ok(Arc::clone(existing));
            }
            tracing::info!("replacing host signer with new key material");
        }

        let signer = Arc::new(HostSigner::from_pem(private_pem, public_pem)?);
        *current = Some(Arc::clone(&signer));
        Ok(signer)
    }

    /// The live signer, if any.
    pub fn get(&self) -> Option<Arc<HostSigner>> {
        self.current
            .lock()
            .expect("signer slot lock poisoned")
            .clone()
    }

    /// Drop the live signer.
    pub fn shutdown(&self) {
        self.current
            .lock()
            .expect("signer slot lock poisoned")
            .take();
    }
}
