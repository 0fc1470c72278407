use bytes::Bytes;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::SecretResponse;

/// Errors that can be returned to a caller over the wire while processing a
/// secret request.
///
/// The wire representation is either a bare string (kinds that carry no
/// message, e.g. `"SecretNotFound"`) or a single-key object (kinds that do,
/// e.g. `{"UpstreamError":"host unreachable"}`). Both shapes round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GetSecretError {
    #[error("Secret not found")]
    SecretNotFound,
    #[error("Invalid request")]
    InvalidRequest,
    #[error("Invalid headers")]
    InvalidHeaders,
    #[error("Invalid payload")]
    InvalidPayload,
    #[error("Error encrypting secret")]
    EncryptionError,
    #[error("Error decrypting secret")]
    DecryptionError,
    #[error("Invalid Entity JWT: {0}")]
    InvalidEntityJWT(String),
    #[error("Invalid Host JWT: {0}")]
    InvalidHostJWT(String),
    #[error("Error fetching secret: {0}")]
    UpstreamError(String),
    #[error("Policy rejected request: {0}")]
    PolicyError(String),
    #[error("Encountered an unknown error fetching secret: {0}")]
    Other(String),
}

impl GetSecretError {
    /// The tag identifying this kind on the wire.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::SecretNotFound => "SecretNotFound",
            Self::InvalidRequest => "InvalidRequest",
            Self::InvalidHeaders => "InvalidHeaders",
            Self::InvalidPayload => "InvalidPayload",
            Self::EncryptionError => "EncryptionError",
            Self::DecryptionError => "DecryptionError",
            Self::InvalidEntityJWT(_) => "InvalidEntityJWT",
            Self::InvalidHostJWT(_) => "InvalidHostJWT",
            Self::UpstreamError(_) => "UpstreamError",
            Self::PolicyError(_) => "PolicyError",
            Self::Other(_) => "Other",
        }
    }

    fn message(&self) -> Option<&str> {
        match self {
            Self::InvalidEntityJWT(msg)
            | Self::InvalidHostJWT(msg)
            | Self::UpstreamError(msg)
            | Self::PolicyError(msg)
            | Self::Other(msg) => Some(msg),
            _ => None,
        }
    }

    fn from_wire(tag: &str, message: String) -> Option<Self> {
        let err = match tag {
            "SecretNotFound" => Self::SecretNotFound,
            "InvalidRequest" => Self::InvalidRequest,
            "InvalidHeaders" => Self::InvalidHeaders,
            "InvalidPayload" => Self::InvalidPayload,
            "EncryptionError" => Self::EncryptionError,
            "DecryptionError" => Self::DecryptionError,
            "InvalidEntityJWT" => Self::InvalidEntityJWT(message),
            "InvalidHostJWT" => Self::InvalidHostJWT(message),
            "UpstreamError" => Self::UpstreamError(message),
            "PolicyError" => Self::PolicyError(message),
            "Other" => Self::Other(message),
            _ => return None,
        };
        Some(err)
    }
}

impl Serialize for GetSecretError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.message() {
            None => serializer.serialize_str(self.tag()),
            Some(message) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(self.tag(), message)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for GetSecretError {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Tag(String),
            Tagged(std::collections::BTreeMap<String, String>),
        }

        match Wire::deserialize(deserializer)? {
            // Unknown bare tags become `Other` so that talking to a newer
            // peer degrades instead of failing to parse.
            Wire::Tag(tag) => Ok(Self::from_wire(&tag, String::new())
                .unwrap_or_else(|| Self::Other(tag))),
            Wire::Tagged(map) => {
                let mut entries = map.into_iter();
                let (tag, message) = match (entries.next(), entries.next()) {
                    (Some(entry), None) => entry,
                    _ => {
                        return Err(D::Error::custom(
                            "error object must contain exactly one kind",
                        ))
                    }
                };
                Self::from_wire(&tag, message)
                    .ok_or_else(|| D::Error::custom(format!("unknown error kind `{tag}`")))
            }
        }
    }
}

impl From<GetSecretError> for SecretResponse {
    fn from(e: GetSecretError) -> Self {
        SecretResponse {
            error: Some(e),
            ..Default::default()
        }
    }
}

impl TryFrom<SecretResponse> for Bytes {
    type Error = serde_json::Error;

    fn try_from(resp: SecretResponse) -> Result<Self, Self::Error> {
        serde_json::to_vec(&resp).map(Bytes::from)
    }
}

/// Fatal server errors. Anything that surfaces here tears the server down;
/// per-request failures are reported as [`GetSecretError`] instead.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid server configuration: {0}")]
    InvalidServerConfig(String),
    #[error("failed to subscribe: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),
}
