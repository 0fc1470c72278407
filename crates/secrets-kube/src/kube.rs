use std::collections::HashMap;

use anyhow::Context as _;
use reqwest::StatusCode;
use serde::Deserialize;
use wasmcloud_secrets_server::GetSecretError;

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// A Kubernetes secret as returned by the core API, narrowed to the fields
/// this backend reads. Data values are base64-encoded.
#[derive(Deserialize, Debug)]
pub struct KubeSecret {
    #[serde(default)]
    pub metadata: KubeMetadata,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct KubeMetadata {
    #[serde(rename = "resourceVersion", default)]
    pub resource_version: String,
}

/// Read-only client for the cluster secrets API, authenticated with the
/// pod's service account and optionally impersonating another identity per
/// request.
pub struct KubeClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl KubeClient {
    /// Builds a client from the in-cluster environment: the API server
    /// address from the service env vars, the bearer token and CA bundle
    /// from the mounted service account.
    pub fn from_cluster_env() -> anyhow::Result<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .context("KUBERNETES_SERVICE_HOST is not set, not running in a cluster?")?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT")
            .context("KUBERNETES_SERVICE_PORT is not set, not running in a cluster?")?;

        let token = std::fs::read_to_string(format!("{SERVICE_ACCOUNT_DIR}/token"))
            .context("failed to read service account token")?;
        let ca = std::fs::read(format!("{SERVICE_ACCOUNT_DIR}/ca.crt"))
            .context("failed to read cluster CA bundle")?;
        let ca = reqwest::Certificate::from_pem(&ca).context("failed to parse cluster CA")?;

        let http = reqwest::Client::builder()
            .add_root_certificate(ca)
            .build()
            .context("failed to build cluster API client")?;

        Ok(Self {
            http,
            base_url: format!("https://{host}:{port}"),
            token: token.trim().to_string(),
        })
    }

    pub async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
        impersonate: &str,
    ) -> Result<KubeSecret, GetSecretError> {
        let url = format!(
            "{}/api/v1/namespaces/{namespace}/secrets/{name}",
            self.base_url
        );
        let mut request = self.http.get(&url).bearer_auth(&self.token);
        if !impersonate.is_empty() {
            request = request.header("Impersonate-User", impersonate);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GetSecretError::UpstreamError(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(GetSecretError::SecretNotFound),
            status if !status.is_success() => Err(GetSecretError::UpstreamError(format!(
                "cluster API returned {status}"
            ))),
            _ => response
                .json()
                .await
                .map_err(|e| GetSecretError::UpstreamError(e.to_string())),
        }
    }
}
