//! Host key material
//!
//! Loads exactly one Ed25519 key pair at initialization. The private key
//! never leaves this process; only the public PEM is handed to plugins.

use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer, SigningKey};
use framelink_wire::PublicKeyMaterial;
use thiserror::Error;

/// Errors raised while importing the host key pair.
#[derive(Debug, Error)]
pub enum KeyMaterialError {
    /// The supplied PEM could not be parsed into an Ed25519 private key
    #[error("invalid private key material: {0}")]
    InvalidPrivateKey(String),

    /// The supplied public key PEM could not be parsed
    #[error("invalid public key material: {0}")]
    InvalidPublicKey(#[source] framelink_wire::KeyError),

    /// The public key does not belong to the private key
    #[error("public key does not match the private key")]
    KeyMismatch,
}

/// Imported Ed25519 key pair for the host side.
pub struct HostKeyMaterial {
    signing: SigningKey,
    public: PublicKeyMaterial,
    private_pem: String,
}

impl HostKeyMaterial {
    /// Import a key pair from PEM text (PKCS#8 private key, SPKI public key).
    ///
    /// The pair is checked for consistency: a public key that does not
    /// belong to the private key is a configuration error.
    pub fn from_pem(private_pem: &str, public_pem: &str) -> Result<Self, KeyMaterialError> {
        let signing = SigningKey::from_pkcs8_pem(private_pem)
            .map_err(|e| KeyMaterialError::InvalidPrivateKey(e.to_string()))?;
        let public =
            PublicKeyMaterial::from_pem(public_pem).map_err(KeyMaterialError::InvalidPublicKey)?;

        if signing.verifying_key().as_bytes() != public.as_bytes() {
            return Err(KeyMaterialError::KeyMismatch);
        }

        Ok(Self {
            signing,
            public,
            private_pem: private_pem.to_string(),
        })
    }

    /// Generate a fresh key pair, for host provisioning and tests.
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut rand::rngs::OsRng);
        Self::from_signing_key(signing)
    }

    fn from_signing_key(signing: SigningKey) -> Self {
        let private_pem = signing
            .to_pkcs8_pem(LineEnding::LF)
            .expect("ed25519 key always encodes to PKCS#8")
            .to_string();
        let public_pem = signing
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .expect("ed25519 key always encodes to SPKI");
        let public =
            PublicKeyMaterial::from_pem(&public_pem).expect("freshly encoded PEM always parses");

        Self {
            signing,
            public,
            private_pem,
        }
    }

    /// Sign exact message bytes with the private key.
    pub(crate) fn sign_bytes(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }

    /// The public half of the pair.
    pub fn public(&self) -> &PublicKeyMaterial {
        &self.public
    }

    /// Public key PEM, as handed to the plugin at initialization.
    pub fn public_pem(&self) -> &str {
        self.public.pem()
    }

    /// Private key PEM, for comparing key material across instances.
    pub(crate) fn private_pem(&self) -> &str {
        &self.private_pem
    }
}

impl std::fmt::Debug for HostKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print private material
        f.debug_struct("HostKeyMaterial")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
