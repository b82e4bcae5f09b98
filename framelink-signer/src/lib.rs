//! framelink-signer: Host-side signer and verifier for framelink
//!
//! This crate lives outside the plugin's trust boundary. It loads the
//! private/public key pair, assigns request ids to signed requests, and
//! produces/verifies signatures over exact serialized bytes.

pub mod keys;
pub mod signer;

pub use keys::{HostKeyMaterial, KeyMaterialError};
pub use signer::{HostSigner, SignError, SignerSlot};
