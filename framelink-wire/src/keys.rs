//! Public key material for signature verification
//!
//! The client half of the protocol holds only the public key; the private
//! half never crosses the trust boundary into the plugin frame.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::pkcs8::DecodePublicKey;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use thiserror::Error;

/// Errors raised while importing key material or decoding signatures.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The supplied PEM could not be parsed into an Ed25519 public key
    #[error("invalid public key material: {0}")]
    InvalidPublicKey(String),

    /// The signature text is not valid base64
    #[error("signature is not valid base64: {0}")]
    SignatureEncoding(#[source] base64::DecodeError),

    /// The decoded signature has the wrong length for Ed25519
    #[error("signature has invalid length {0}, expected 64 bytes")]
    SignatureLength(usize),
}

/// Imported Ed25519 public key.
///
/// A verification mismatch is reported as `Ok(false)`; only malformed input
/// (bad base64, wrong signature length) is an error.
#[derive(Debug, Clone)]
pub struct PublicKeyMaterial {
    key: VerifyingKey,
    pem: String,
}

impl PublicKeyMaterial {
    /// Import a public key from PEM (SubjectPublicKeyInfo) text.
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        let key = VerifyingKey::from_public_key_pem(pem)
            .map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
        Ok(Self {
            key,
            pem: pem.to_string(),
        })
    }

    /// The PEM text this key was imported from.
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Raw key bytes, for comparing key material across instances.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.key.as_bytes()
    }

    /// Verify a base64 signature over the exact message bytes.
    pub fn verify(&self, message: &[u8], signature_b64: &str) -> Result<bool, KeyError> {
        let bytes = BASE64
            .decode(signature_b64)
            .map_err(KeyError::SignatureEncoding)?;
        let signature =
            Signature::from_slice(&bytes).map_err(|_| KeyError::SignatureLength(bytes.len()))?;

        Ok(self.key.verify(message, &signature).is_ok())
    }
}

impl PartialEq for PublicKeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.key.as_bytes() == other.key.as_bytes()
    }
}

impl Eq for PublicKeyMaterial {}
