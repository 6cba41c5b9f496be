//! Protocol messages
//!
//! Every EXOsocket message is a JSON object tagged by its `method` field.
//! Before login they travel as text frames; after login the same JSON is
//! carried inside encrypted binary frames.
//!
//! # Message Flow
//!
//! ```text
//! client                              controller
//!   | -- versionOffer ------------------> |
//!   | <--------------------- versionAck -- |
//!   | -- identity ----------------------> |
//!   | <----------------------- identity -- |
//!   | -- getChallenge ------------------> |
//!   | <------------------ authChallenge -- |
//!   | -- authenticate ------------------> |
//!   | <-------------- authenticateReply -- |
//!   | == 16-byte seeds, then encrypted == |
//!   | <------------------- sessionLevel -- |
//!   | -- read / write (context) --------> |
//!   | <------------------ update (context) |
//! ```

use exo_core::{ExoError, ExoResult, Identity, PointValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Point kind used by read and write requests
pub const INDEXED_POINTS: &str = "indexedPoints";

/// Parameters of `versionOffer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionParams {
    pub version: u32,
    pub feature_level: u32,
    pub capabilities: u32,
}

impl Default for VersionParams {
    fn default() -> Self {
        Self {
            version: 1,
            feature_level: 0,
            capabilities: 0,
        }
    }
}

/// Parameters of `identity`, in either direction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_version: Option<String>,
    #[serde(rename = "sessionID", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
}

impl IdentityParams {
    /// Extract the controller identity
    pub fn to_identity(&self) -> Identity {
        Identity::new(
            self.controller_name.clone(),
            self.project_name.clone(),
            self.serial.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetChallengeParams {
    pub client_nonce1: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthChallengeParams {
    #[serde(default)]
    pub server_nonce: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateParams {
    pub user: String,
    pub client_nonce2: u32,
    pub challenge_response: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateReplyParams {
    #[serde(default)]
    pub confirmation: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLevelParams {
    #[serde(default)]
    pub session_level: Option<i64>,
}

/// One device's share of a read or write request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceItems {
    pub device: u32,
    pub items: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<PointValue>>,
}

/// Parameters of `read` and `write`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsRequest {
    pub kind: String,
    pub devices: Vec<DeviceItems>,
}

impl PointsRequest {
    pub fn indexed(devices: Vec<DeviceItems>) -> Self {
        Self {
            kind: INDEXED_POINTS.to_string(),
            devices,
        }
    }
}

/// One device's share of an `update`
///
/// `values` and `errors` are aligned by index with `items`; either may be
/// shorter than `items`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceUpdate {
    pub device: u32,
    #[serde(default)]
    pub items: Vec<u32>,
    #[serde(default)]
    pub values: Vec<PointValue>,
    #[serde(default)]
    pub errors: Vec<Option<i64>>,
}

/// Parameters of `update`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateParams {
    #[serde(default)]
    pub devices: Vec<DeviceUpdate>,
}

/// EXOsocket message, tagged by `method`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Message {
    VersionOffer {
        params: VersionParams,
    },
    VersionAck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
    },
    Identity {
        #[serde(default)]
        params: IdentityParams,
    },
    GetChallenge {
        params: GetChallengeParams,
    },
    AuthChallenge {
        #[serde(default)]
        params: AuthChallengeParams,
    },
    Authenticate {
        params: AuthenticateParams,
    },
    AuthenticateReply {
        #[serde(default)]
        params: AuthenticateReplyParams,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<Value>,
    },
    SessionLevel {
        #[serde(default)]
        params: SessionLevelParams,
    },
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
    },
    PingAck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
    },
    Read {
        context: u32,
        params: PointsRequest,
    },
    Write {
        context: u32,
        params: PointsRequest,
    },
    Update {
        #[serde(default)]
        context: Option<u32>,
        #[serde(default)]
        params: UpdateParams,
    },
    /// A message whose `method` this client does not handle
    #[serde(skip)]
    Unrecognized { method: String, payload: Value },
}

impl Message {
    /// Methods with a typed representation
    pub const METHODS: &'static [&'static str] = &[
        "versionOffer",
        "versionAck",
        "identity",
        "getChallenge",
        "authChallenge",
        "authenticate",
        "authenticateReply",
        "sessionLevel",
        "ping",
        "pingAck",
        "read",
        "write",
        "update",
    ];

    pub fn version_offer() -> Self {
        Message::VersionOffer {
            params: VersionParams::default(),
        }
    }

    pub fn identity_offer(implementation: &str, implementation_version: &str, session_id: u32) -> Self {
        Message::Identity {
            params: IdentityParams {
                implementation: Some(implementation.to_string()),
                implementation_version: Some(implementation_version.to_string()),
                session_id: Some(session_id),
                ..IdentityParams::default()
            },
        }
    }

    pub fn get_challenge(client_nonce1: u32) -> Self {
        Message::GetChallenge {
            params: GetChallengeParams { client_nonce1 },
        }
    }

    pub fn authenticate(user: &str, client_nonce2: u32, challenge_response: u32) -> Self {
        Message::Authenticate {
            params: AuthenticateParams {
                user: user.to_string(),
                client_nonce2,
                challenge_response,
            },
        }
    }

    pub fn ping() -> Self {
        Message::Ping { params: None }
    }

    /// Read request for one device chunk
    pub fn read(context: u32, device: u32, items: Vec<u32>) -> Self {
        Message::Read {
            context,
            params: PointsRequest::indexed(vec![DeviceItems {
                device,
                items,
                values: None,
            }]),
        }
    }

    /// Write request for a single point
    pub fn write(context: u32, device: u32, item: u32, value: PointValue) -> Self {
        Message::Write {
            context,
            params: PointsRequest::indexed(vec![DeviceItems {
                device,
                items: vec![item],
                values: Some(vec![value]),
            }]),
        }
    }

    /// Get the `method` tag
    pub fn method(&self) -> &str {
        match self {
            Message::VersionOffer { .. } => "versionOffer",
            Message::VersionAck { .. } => "versionAck",
            Message::Identity { .. } => "identity",
            Message::GetChallenge { .. } => "getChallenge",
            Message::AuthChallenge { .. } => "authChallenge",
            Message::Authenticate { .. } => "authenticate",
            Message::AuthenticateReply { .. } => "authenticateReply",
            Message::SessionLevel { .. } => "sessionLevel",
            Message::Ping { .. } => "ping",
            Message::PingAck { .. } => "pingAck",
            Message::Read { .. } => "read",
            Message::Write { .. } => "write",
            Message::Update { .. } => "update",
            Message::Unrecognized { method, .. } => method.as_str(),
        }
    }

    /// Parse a message from JSON text
    ///
    /// Objects with an unknown `method` become `Message::Unrecognized`.
    ///
    /// # Errors
    ///
    /// Returns `ExoError::Json` if the text is not JSON and
    /// `ExoError::Protocol` if it is not a `method`-tagged object or a known
    /// method has the wrong shape
    pub fn from_json(text: &str) -> ExoResult<Self> {
        let payload: Value = serde_json::from_str(text)?;
        let method = payload
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| ExoError::Protocol("Message has no method".to_string()))?
            .to_string();

        if !Self::METHODS.contains(&method.as_str()) {
            return Ok(Message::Unrecognized { method, payload });
        }

        serde_json::from_value(payload)
            .map_err(|e| ExoError::Protocol(format!("Malformed {} message: {}", method, e)))
    }

    /// Serialize the message to JSON text
    pub fn to_json(&self) -> ExoResult<String> {
        match self {
            Message::Unrecognized { payload, .. } => Ok(serde_json::to_string(payload)?),
            _ => Ok(serde_json::to_string(self)?),
        }
    }
}
