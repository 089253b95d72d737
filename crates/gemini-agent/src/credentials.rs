//! API key resolution for the generation provider.
//!
//! Order: the environment variable first, then Google Secret Manager
//! (only when a project id is configured). Nothing is cached; every call
//! resolves again.

use base64::Engine as _;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{GeminiError, Result};

pub const API_KEY_ENV: &str = "GOOGLE_GENERATIVE_AI_API_KEY";
pub const SECRET_NAME: &str = "GOOGLE_GENERATIVE_AI_API_KEY";

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com/v1";

#[derive(Debug, Clone)]
pub struct CredentialResolver {
    env_var: String,
    project_id: Option<String>,
    secret_name: String,
    http: reqwest::Client,
    metadata_token_url: String,
    secret_manager_url: String,
    env: fn(&str) -> Option<String>,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

#[derive(Deserialize)]
struct SecretVersion {
    payload: Option<SecretPayload>,
}

#[derive(Deserialize)]
struct SecretPayload {
    data: Option<String>,
}

impl CredentialResolver {
    pub fn new(project_id: Option<String>) -> Self {
        Self {
            env_var: API_KEY_ENV.to_string(),
            project_id: project_id.filter(|p| !p.trim().is_empty()),
            secret_name: SECRET_NAME.to_string(),
            http: reqwest::Client::new(),
            metadata_token_url: METADATA_TOKEN_URL.to_string(),
            secret_manager_url: SECRET_MANAGER_URL.to_string(),
            env: |name| std::env::var(name).ok(),
        }
    }

    /// Replace the environment lookup (tests inject a fixed map).
    pub fn with_env(mut self, env: fn(&str) -> Option<String>) -> Self {
        self.env = env;
        self
    }

    /// Override both Google endpoints (metadata server and Secret Manager).
    pub fn with_endpoints(
        mut self,
        metadata_token_url: impl Into<String>,
        secret_manager_url: impl Into<String>,
    ) -> Self {
        self.metadata_token_url = metadata_token_url.into();
        self.secret_manager_url = secret_manager_url.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn get_api_key(&self) -> Result<String> {
        if let Some(key) = (self.env)(&self.env_var).filter(|k| !k.trim().is_empty()) {
            debug!(source = "env", "resolved generation API key");
            return Ok(key);
        }

        let Some(project) = self.project_id.as_deref() else {
            return Err(GeminiError::Configuration(format!(
                "{} is not set",
                self.env_var
            )));
        };

        match self.fetch_secret(project).await {
            Ok(Some(key)) => {
                debug!(source = "secret-manager", "resolved generation API key");
                Ok(key)
            }
            Ok(None) => Err(GeminiError::Configuration(format!(
                "{} is not set and secret '{}' has no payload",
                self.env_var, self.secret_name
            ))),
            Err(e) => {
                warn!(error = %e, "secret manager lookup failed");
                Err(GeminiError::Configuration(format!(
                    "{} is not set (secret manager lookup failed: {e})",
                    self.env_var
                )))
            }
        }
    }

    async fn fetch_secret(&self, project: &str) -> Result<Option<String>> {
        let token: MetadataToken = self
            .http
            .get(&self.metadata_token_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let url = format!(
            "{}/projects/{}/secrets/{}/versions/latest:access",
            self.secret_manager_url, project, self.secret_name
        );
        let version: SecretVersion = self
            .http
            .get(url)
            .bearer_auth(&token.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(data) = version.payload.and_then(|p| p.data) else {
            return Ok(None);
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| GeminiError::Configuration(format!("secret payload is not base64: {e}")))?;
        let key = String::from_utf8_lossy(&bytes).trim().to_string();
        Ok(if key.is_empty() { None } else { Some(key) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn env_variable_wins() {
        let resolver = CredentialResolver::new(Some("proj".into()))
            .with_env(|_| Some("from-env".into()))
            .with_endpoints("http://127.0.0.1:9/unused", "http://127.0.0.1:9");
        assert_eq!(resolver.get_api_key().await.unwrap(), "from-env");
    }

    #[tokio::test]
    async fn missing_everything_is_configuration_error() {
        let resolver = CredentialResolver::new(None).with_env(|_| None);
        let err = resolver.get_api_key().await.unwrap_err();
        assert!(matches!(err, GeminiError::Configuration(_)));
        assert!(err.to_string().contains(API_KEY_ENV));
    }

    #[tokio::test]
    async fn blank_env_value_is_ignored() {
        let resolver = CredentialResolver::new(None).with_env(|_| Some("   ".into()));
        assert!(resolver.get_api_key().await.is_err());
    }

    #[tokio::test]
    async fn falls_back_to_secret_manager() {
        let mut server = mockito::Server::new_async().await;
        let token = server
            .mock("GET", "/token")
            .match_header("Metadata-Flavor", "Google")
            .with_body(r#"{"access_token":"ya29.test","expires_in":3599,"token_type":"Bearer"}"#)
            .create_async()
            .await;
        // "secret-key" in base64
        let secret = server
            .mock(
                "GET",
                "/projects/proj/secrets/GOOGLE_GENERATIVE_AI_API_KEY/versions/latest:access",
            )
            .match_header("authorization", "Bearer ya29.test")
            .with_body(r#"{"name":"x","payload":{"data":"c2VjcmV0LWtleQ=="}}"#)
            .create_async()
            .await;

        let resolver = CredentialResolver::new(Some("proj".into()))
            .with_env(|_| None)
            .with_endpoints(format!("{}/token", server.url()), server.url());
        assert_eq!(resolver.get_api_key().await.unwrap(), "secret-key");
        token.assert_async().await;
        secret.assert_async().await;
    }

    #[tokio::test]
    async fn secret_manager_failure_maps_to_configuration_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/token")
            .with_status(404)
            .create_async()
            .await;

        let resolver = CredentialResolver::new(Some("proj".into()))
            .with_env(|_| None)
            .with_endpoints(format!("{}/token", server.url()), server.url());
        let err = resolver.get_api_key().await.unwrap_err();
        assert!(matches!(err, GeminiError::Configuration(_)));
    }
}
