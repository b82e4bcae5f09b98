//! Signing endpoint seam
//!
//! The external signing authority holds the private key and is reached over
//! HTTP by the plugin author's own code. The core specifies only the
//! request/response contract; implementations of [`SigningEndpoint`] supply
//! the transport.

use async_trait::async_trait;
use framelink_wire::{SignRequestBody, SignedPayload};
use thiserror::Error;

/// Errors raised by a signing endpoint implementation.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The endpoint could not be reached
    #[error("signing endpoint unreachable: {0}")]
    Unreachable(String),

    /// The endpoint refused to sign the request
    #[error("signing endpoint rejected the request: {0}")]
    Rejected(String),

    /// The endpoint's reply was not a valid `{request, signature}` pair
    #[error("signing endpoint returned a malformed payload: {0}")]
    Malformed(String),
}

/// Contract with the external signing authority.
///
/// Given the pre-signature request body, the authority assigns a fresh
/// request id, signs the canonical serialization, and returns both verbatim.
#[async_trait]
pub trait SigningEndpoint: Send + Sync {
    async fn sign(&self, body: SignRequestBody) -> Result<SignedPayload, EndpointError>;
}
