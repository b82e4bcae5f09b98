//! Cross-frame transport seam
//!
//! Outbound envelopes go to the host page through [`FrameTransport`];
//! inbound messages arrive on an mpsc channel of [`InboundFrame`]s, each
//! tagged with the origin it was delivered from so the dispatcher can
//! enforce the origin recorded at initialization.

use framelink_wire::{InboundMessage, OutboundEnvelope};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised while posting an envelope.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The messaging channel to the host page is gone
    #[error("messaging channel closed")]
    Closed,

    /// The underlying channel failed to deliver
    #[error("dispatch failed: {0}")]
    Dispatch(String),
}

/// Outbound half of the cross-document messaging channel.
pub trait FrameTransport: Send + Sync {
    /// Post an envelope toward the host page.
    fn post(&self, envelope: &OutboundEnvelope) -> Result<(), TransportError>;
}

/// An inbound message plus the origin it arrived from, when known.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub origin: Option<String>,
    pub message: InboundMessage,
}

impl InboundFrame {
    /// Frame with a known sender origin.
    pub fn from_origin(origin: impl Into<String>, message: InboundMessage) -> Self {
        Self {
            origin: Some(origin.into()),
            message,
        }
    }

    /// Frame with no origin information.
    pub fn anonymous(message: InboundMessage) -> Self {
        Self {
            origin: None,
            message,
        }
    }
}

/// Build the inbound half of a messaging channel.
pub fn inbound_channel() -> (
    mpsc::UnboundedSender<InboundFrame>,
    mpsc::UnboundedReceiver<InboundFrame>,
) {
    mpsc::unbounded_channel()
}

/// In-process transport over a tokio channel, for tests and embedders that
/// own both halves of the boundary.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<OutboundEnvelope>,
}

impl ChannelTransport {
    /// Create a transport and the receiving half the host side reads from.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl FrameTransport for ChannelTransport {
    fn post(&self, envelope: &OutboundEnvelope) -> Result<(), TransportError> {
        self.tx
            .send(envelope.clone())
            .map_err(|_| TransportError::Closed)
    }
}
