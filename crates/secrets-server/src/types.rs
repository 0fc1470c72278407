use anyhow::{ensure, Context as _};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use wascap::jwt::{validate_token, Claims, Component, Host};

use crate::errors::GetSecretError;

/// The application a requesting entity belongs to, along with the
/// application-level policy for this backend.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Application {
    pub name: String,
    /// JSON-encoded policy document of the form
    /// `{"type": <tag>, "properties": <raw JSON>}`.
    ///
    /// The properties are opaque here; each backend defines its own schema
    /// and parses them in its handler.
    #[serde(default)]
    pub policy: String,
}

/// Parsed form of [`Application::policy`].
#[derive(Deserialize, Debug, Clone)]
pub struct ApplicationPolicy {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl Application {
    pub fn policy(&self) -> anyhow::Result<ApplicationPolicy> {
        serde_json::from_str(&self.policy).context("failed to parse application policy")
    }

    /// The backend-specific policy properties, still undecoded.
    pub fn policy_properties(&self) -> anyhow::Result<serde_json::Value> {
        Ok(self.policy()?.properties)
    }
}

/// The request context used to authenticate a caller.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Context {
    /// The application the entity belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<Application>,
    /// The component's signed JWT.
    pub entity_jwt: String,
    /// The host's signed JWT.
    pub host_jwt: String,
}

impl Context {
    /// Validates the claims embedded in the context's JWTs.
    ///
    /// Both tokens are verified against the Ed25519 key carried in their
    /// own `iss` field. The entity token must embed component claims and
    /// the host token host claims; no authorization decision is made here.
    pub fn valid_claims(&self) -> Result<(), GetSecretError> {
        Self::valid_component(&self.entity_jwt)
            .map_err(|e| GetSecretError::InvalidEntityJWT(e.to_string()))?;
        Self::valid_host(&self.host_jwt)
            .map_err(|e| GetSecretError::InvalidHostJWT(e.to_string()))?;
        Ok(())
    }

    fn valid_component(token: &str) -> anyhow::Result<()> {
        let claims: Claims<Component> = Claims::decode(token)?;
        ensure!(claims.metadata.is_some(), "no component claims embedded");
        let v = validate_token::<Component>(token)?;
        ensure!(!v.expired, "token expired at `{}`", v.expires_human);
        ensure!(
            !v.cannot_use_yet,
            "token cannot be used before `{}`",
            v.not_before_human
        );
        ensure!(v.signature_valid, "signature is not valid");
        Ok(())
    }

    fn valid_host(token: &str) -> anyhow::Result<()> {
        let claims: Claims<Host> = Claims::decode(token)?;
        ensure!(claims.metadata.is_some(), "no host claims embedded");
        let v = validate_token::<Host>(token)?;
        ensure!(!v.expired, "token expired at `{}`", v.expires_human);
        ensure!(
            !v.cannot_use_yet,
            "token cannot be used before `{}`",
            v.not_before_human
        );
        ensure!(v.signature_valid, "signature is not valid");
        Ok(())
    }
}

/// A request to retrieve a single field of a named secret.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SecretRequest {
    /// The name of the secret.
    pub key: String,
    /// The sub-key within that secret.
    #[serde(default)]
    pub field: String,
    /// Which version to retrieve. The latest is served when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub context: Context,
}

/// A secret value, either textual or binary.
///
/// `binary_secret` intentionally serializes as a bare JSON array of byte
/// integers rather than base64.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_secret: Option<Vec<u8>>,
}

/// The reply to a secret request. Exactly one of the fields is set.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SecretResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<GetSecretError>,
}

/// The upstream source of secret values.
///
/// The server hands each decrypted, validated request to its handler and
/// never interprets the application policy itself. Handlers may fail with a
/// [`GetSecretError`] to pick the exact wire error; any other failure is
/// reported to the caller as `UpstreamError` with its display form.
#[async_trait]
pub trait SecretsHandler: Send + Sync {
    async fn get(
        &self,
        ctx: &CancellationToken,
        request: &SecretRequest,
    ) -> anyhow::Result<SecretValue>;
}
