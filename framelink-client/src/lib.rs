//! framelink-client: Client-side dispatcher for framelink plugins
//!
//! This crate runs inside the sandboxed plugin frame. It owns message
//! framing, rate limiting, retries, and response matching; it never holds
//! the private signing key. Signed requests are authenticated by an external
//! signing authority reached through the [`SigningEndpoint`] seam, and
//! envelopes travel to the host page through the [`FrameTransport`] seam.

pub mod correlator;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod rate;
pub mod slot;
pub mod transport;

pub use correlator::{CorrelatedResponse, Correlator};
pub use dispatcher::{ClientConfig, PluginClient, ResponseEnvelope, RetryConfig};
pub use endpoint::{EndpointError, SigningEndpoint};
pub use error::ClientError;
pub use rate::{RateLimitConfig, RateWindow};
pub use slot::ClientSlot;
pub use transport::{inbound_channel, ChannelTransport, FrameTransport, InboundFrame, TransportError};

pub use framelink_wire::{
    CommunityInfo, InboundMessage, InboundPayload, OutboundEnvelope, PluginContext, ResponseBody,
    SignedPayload, UserFriends, UserInfo,
};
