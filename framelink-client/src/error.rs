//! Client error taxonomy
//!
//! Protocol-layer failures reject the specific pending operation they belong
//! to; they never take down the inbound message loop or other in-flight
//! requests.

use thiserror::Error;

use crate::endpoint::EndpointError;
use crate::transport::TransportError;

/// Errors surfaced by client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Malformed key material or missing initialization argument
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The sliding-window send ceiling was exceeded; nothing was dispatched
    #[error("send rate ceiling exceeded")]
    RateLimited,

    /// All retry attempts exhausted without a correlated response
    #[error("no correlated response after {attempts} attempts")]
    Timeout { attempts: u32 },

    /// An inbound signature failed verification; the host identity cannot
    /// be trusted for this message
    #[error("inbound signature failed verification")]
    SignatureInvalid,

    /// The resolved payload carried an explicit error shape
    #[error("host returned an error: {0}")]
    Remote(String),

    /// A public operation was invoked before successful initialization
    #[error("plugin client is not initialized")]
    Uninitialized,

    /// The client was torn down while the request was pending
    #[error("plugin client was shut down with the request pending")]
    Shutdown,

    /// The external signing authority failed
    #[error("signing endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    /// The cross-frame messaging channel failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A wire payload could not be serialized or decoded
    #[error("malformed wire payload: {0}")]
    Malformed(#[from] serde_json::Error),
}
