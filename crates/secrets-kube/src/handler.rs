use anyhow::bail;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use wasmcloud_secrets_server::{GetSecretError, SecretRequest, SecretValue, SecretsHandler};

use crate::kube::KubeClient;

/// Application policy understood by this backend.
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct KubePolicy {
    /// Cluster identity to impersonate for the fetch, when the application
    /// is allowed to act as a different service account or user.
    pub impersonate: String,
    /// Namespace the secret lives in.
    pub namespace: String,
}

impl Default for KubePolicy {
    fn default() -> Self {
        Self {
            impersonate: String::new(),
            namespace: "default".to_string(),
        }
    }
}

impl KubePolicy {
    /// Extracts this backend's policy from a request. Requests without an
    /// application context or with an empty policy document get the
    /// defaults; a policy that fails to parse is a policy error.
    fn from_request(request: &SecretRequest) -> Result<Self, GetSecretError> {
        let Some(application) = &request.context.application else {
            return Ok(Self::default());
        };
        if application.policy.is_empty() {
            return Ok(Self::default());
        }
        let properties = application
            .policy_properties()
            .map_err(|e| GetSecretError::PolicyError(e.to_string()))?;
        if properties.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(properties).map_err(|e| GetSecretError::PolicyError(e.to_string()))
    }
}

/// Serves `get` requests from the secrets of the surrounding cluster.
pub struct KubeSecretsHandler {
    kube: KubeClient,
}

impl KubeSecretsHandler {
    pub fn new(kube: KubeClient) -> Self {
        Self { kube }
    }
}

#[async_trait]
impl SecretsHandler for KubeSecretsHandler {
    async fn get(
        &self,
        _ctx: &CancellationToken,
        request: &SecretRequest,
    ) -> anyhow::Result<SecretValue> {
        let policy = KubePolicy::from_request(request)?;
        let application = request
            .context
            .application
            .as_ref()
            .map(|app| app.name.as_str())
            .unwrap_or_default();
        info!(
            application,
            impersonate = %policy.impersonate,
            key = %request.key,
            field = %request.field,
            "get"
        );

        if request.key.is_empty() {
            bail!(GetSecretError::Other("missing secret name".to_string()));
        }
        if request.field.is_empty() {
            bail!(GetSecretError::Other(
                "missing secret key/field".to_string()
            ));
        }

        let secret = self
            .kube
            .get_secret(&policy.namespace, &request.key, &policy.impersonate)
            .await?;

        let Some(encoded) = secret.data.get(&request.field) else {
            bail!(GetSecretError::SecretNotFound);
        };
        let decoded = BASE64
            .decode(encoded)
            .map_err(|e| GetSecretError::UpstreamError(format!("malformed secret data: {e}")))?;

        let version = (!secret.metadata.resource_version.is_empty())
            .then(|| secret.metadata.resource_version.clone());
        let mut value = SecretValue {
            version,
            ..Default::default()
        };
        match String::from_utf8(decoded) {
            Ok(s) => value.string_secret = Some(s),
            Err(e) => value.binary_secret = Some(e.into_bytes()),
        }

        Ok(value)
    }
}
