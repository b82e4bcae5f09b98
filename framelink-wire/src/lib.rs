//! framelink-wire: Shared types for the framelink plugin messaging system
//!
//! This crate defines the protocol between an embedded plugin and its host
//! page. Bodies travel as canonical JSON text; signatures are always computed
//! over the exact serialized bytes, so a body is serialized once and the
//! resulting string is carried verbatim from signer to verifier.

use serde::{Deserialize, Serialize};

pub mod keys;

pub use keys::{KeyError, PublicKeyMaterial};

/// Wire envelope posted from the plugin frame to the host page.
///
/// Safe requests carry no signature; signed requests carry the base64
/// signature produced by the external signing authority.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboundEnvelope {
    /// Serialized request body (canonical JSON text)
    pub request: String,

    /// Base64 signature over the exact bytes of `request`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Wire message delivered from the host page back into the plugin frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InboundMessage {
    /// Originating request id, used for correlation
    #[serde(rename = "type")]
    pub request_id: String,

    /// Response payload
    pub payload: InboundPayload,
}

/// Payload half of an inbound message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InboundPayload {
    /// Serialized response body (canonical JSON text)
    pub response: String,

    /// Base64 signature over the exact bytes of `response`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Pair returned by the signing authority: the serialized request (with a
/// freshly assigned request id) and its signature. Both travel verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedPayload {
    pub request: String,
    pub signature: String,
}

/// Category of a signed request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SignedCategory {
    /// Read operation (`userInfo`, `communityInfo`, `userFriends`)
    Request,
    /// Mutating operation (`giveRole`)
    Action,
}

/// Operation payload of a safe request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SafeRequestData {
    /// Initialization handshake establishing the plugin context
    Init,
    /// Host-gated navigation
    Navigate { url: String },
    /// Permission prompt
    RequestPermission { permissions: Vec<String> },
}

impl SafeRequestData {
    /// Operation name as it appears in client-generated request ids.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Navigate { .. } => "navigate",
            Self::RequestPermission { .. } => "requestPermission",
        }
    }
}

/// Operation payload of a signed request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SignedRequestData {
    UserInfo,
    CommunityInfo,
    UserFriends { limit: u32, offset: u32 },
    GiveRole { role_id: String, user_id: String },
}

/// Pre-signature request body POSTed to the signing authority.
///
/// The authority assigns the request id and returns the full serialized
/// [`RequestBody`] together with its signature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignRequestBody {
    pub plugin_id: String,
    pub iframe_uid: String,
    #[serde(rename = "type")]
    pub category: SignedCategory,
    pub data: SignedRequestData,
}

/// Complete serialized request body, discriminated by the wire `type` member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RequestBody {
    /// Unsigned request (initialization, navigation, permission prompts)
    #[serde(rename = "safeRequest", rename_all = "camelCase")]
    Safe {
        iframe_uid: String,
        request_id: String,
        data: SafeRequestData,
    },

    /// Signed read operation
    #[serde(rename = "request", rename_all = "camelCase")]
    Request {
        plugin_id: String,
        request_id: String,
        iframe_uid: String,
        data: SignedRequestData,
    },

    /// Signed mutating operation
    #[serde(rename = "action", rename_all = "camelCase")]
    Action {
        plugin_id: String,
        request_id: String,
        iframe_uid: String,
        data: SignedRequestData,
    },
}

impl RequestBody {
    /// Build a safe request body.
    pub fn safe(
        iframe_uid: impl Into<String>,
        request_id: impl Into<String>,
        data: SafeRequestData,
    ) -> Self {
        Self::Safe {
            iframe_uid: iframe_uid.into(),
            request_id: request_id.into(),
            data,
        }
    }

    /// Build a signed request body from its pre-signature form plus the
    /// request id assigned by the signer.
    pub fn signed(body: SignRequestBody, request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        match body.category {
            SignedCategory::Request => Self::Request {
                plugin_id: body.plugin_id,
                request_id,
                iframe_uid: body.iframe_uid,
                data: body.data,
            },
            SignedCategory::Action => Self::Action {
                plugin_id: body.plugin_id,
                request_id,
                iframe_uid: body.iframe_uid,
                data: body.data,
            },
        }
    }

    /// The request id carried by this body.
    pub fn request_id(&self) -> &str {
        match self {
            Self::Safe { request_id, .. }
            | Self::Request { request_id, .. }
            | Self::Action { request_id, .. } => request_id,
        }
    }

    /// Serialize to the canonical wire form.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Extract the `requestId` member from a serialized request without decoding
/// the full body. Used by the client after the external signer has assigned
/// the id.
pub fn request_id_of(serialized: &str) -> Result<String, serde_json::Error> {
    use serde::de::Error;

    let value: serde_json::Value = serde_json::from_str(serialized)?;
    value
        .get("requestId")
        .and_then(|id| id.as_str())
        .map(str::to_owned)
        .ok_or_else(|| serde_json::Error::custom("missing requestId member"))
}

/// Serialized response body delivered inside an [`InboundPayload`].
///
/// `data` is kept as raw JSON: operations decode their own typed view, and
/// an object carrying an `error` member is the explicit remote error shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    pub data: serde_json::Value,
    pub plugin_id: String,
    pub request_id: String,
}

impl ResponseBody {
    /// Remote error message, if `data` carries the explicit error shape.
    pub fn error_message(&self) -> Option<String> {
        let error = self.data.get("error")?;
        Some(match error.as_str() {
            Some(message) => message.to_owned(),
            None => error.to_string(),
        })
    }

    /// Decode the typed view of `data` for a specific operation.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

/// Identity snapshot established by a successful `init` handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PluginContext {
    pub plugin_id: String,
    pub user_id: String,
    /// Role identifiers the plugin is allowed to assign
    #[serde(default)]
    pub assignable_roles: Vec<String>,
}

/// Result payload of `userInfo`, and the element type of `userFriends`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Result payload of `communityInfo`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommunityInfo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Result payload of `userFriends`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserFriends {
    #[serde(default)]
    pub friends: Vec<UserInfo>,
}
