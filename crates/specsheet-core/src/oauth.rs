//! OAuth 2.0 authorization-code flow for the delegated credentials the
//! server acts with: sending mail and saving files to storage. One OAuth
//! client serves both grants.

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SpecsheetError};
use crate::mail::is_grant_error;

pub const GMAIL_SEND_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const SERVICE: &str = "oauth";

/// Which delegated credential a consent flow asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Email,
    Drive,
}

impl Grant {
    pub fn scope(self) -> &'static str {
        match self {
            Grant::Email => GMAIL_SEND_SCOPE,
            Grant::Drive => DRIVE_FILE_SCOPE,
        }
    }

    /// Short name used in cookies, logs and the post-consent redirect.
    pub fn as_str(self) -> &'static str {
        match self {
            Grant::Email => "email",
            Grant::Drive => "drive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Consent URL for `grant` carrying `state`.
    fn authorization_url(&self, grant: Grant, state: &str) -> Result<String>;

    async fn exchange_code(&self, grant: Grant, code: &str) -> Result<OAuthTokens>;
}

#[derive(Debug, Clone)]
pub struct GoogleOAuth {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    email_redirect: String,
    drive_redirect: String,
    auth_url: String,
    token_url: String,
}

impl GoogleOAuth {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        email_redirect: impl Into<String>,
        drive_redirect: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            email_redirect: email_redirect.into(),
            drive_redirect: drive_redirect.into(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Callback URI registered for `grant`; must match between consent and
    /// code exchange.
    pub fn redirect_uri(&self, grant: Grant) -> &str {
        match grant {
            Grant::Email => &self.email_redirect,
            Grant::Drive => &self.drive_redirect,
        }
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuth {
    fn authorization_url(&self, grant: Grant, state: &str) -> Result<String> {
        let url = Url::parse_with_params(
            &self.auth_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri(grant)),
                ("response_type", "code"),
                ("scope", grant.scope()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| SpecsheetError::Configuration(format!("bad OAuth URL: {e}")))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, grant: Grant, code: &str) -> Result<OAuthTokens> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri(grant)),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| SpecsheetError::transport(SERVICE, e))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            if is_grant_error(None, &detail) {
                return Err(SpecsheetError::ReauthRequired(
                    "authorization code rejected".into(),
                ));
            }
            return Err(SpecsheetError::upstream(SERVICE, Some(status.as_u16()), detail));
        }

        let tokens: OAuthTokens = resp
            .json()
            .await
            .map_err(|e| SpecsheetError::transport(SERVICE, e))?;
        info!(
            grant = grant.as_str(),
            has_refresh = tokens.refresh_token.is_some(),
            "oauth code exchanged"
        );
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn provider() -> GoogleOAuth {
        GoogleOAuth::new(
            "cid",
            "secret",
            "http://localhost:8080/api/email-callback",
            "http://localhost:8080/api/drive-callback",
        )
    }

    #[test]
    fn auth_url_carries_scope_state_and_consent() {
        let url = Url::parse(&provider().authorization_url(Grant::Email, "xyz").unwrap()).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "cid");
        assert_eq!(params["scope"], GMAIL_SEND_SCOPE);
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["prompt"], "consent");
        assert_eq!(params["state"], "xyz");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["redirect_uri"], "http://localhost:8080/api/email-callback");
    }

    #[test]
    fn drive_grant_uses_file_scope_and_its_own_callback() {
        let url = Url::parse(&provider().authorization_url(Grant::Drive, "s1").unwrap()).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["scope"], DRIVE_FILE_SCOPE);
        assert_eq!(params["redirect_uri"], "http://localhost:8080/api/drive-callback");
        assert_eq!(params["state"], "s1");
    }

    #[tokio::test]
    async fn drive_exchange_sends_drive_redirect() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded(
                "redirect_uri".into(),
                "http://localhost:8080/api/drive-callback".into(),
            ))
            .with_body(r#"{"access_token":"ya29.d","expires_in":3599}"#)
            .create_async()
            .await;

        let tokens = provider()
            .with_token_url(format!("{}/token", server.url()))
            .exchange_code(Grant::Drive, "c")
            .await
            .unwrap();
        assert_eq!(tokens.access_token, "ya29.d");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn exchange_posts_form_and_parses_tokens() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("code".into(), "the-code".into()),
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("client_secret".into(), "secret".into()),
            ]))
            .with_body(r#"{"access_token":"ya29.a","expires_in":3599,"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let tokens = provider()
            .with_token_url(format!("{}/token", server.url()))
            .exchange_code(Grant::Email, "the-code")
            .await
            .unwrap();
        assert_eq!(tokens.access_token, "ya29.a");
        assert_eq!(tokens.expires_in, Some(3599));
        assert!(tokens.refresh_token.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_code_is_reauth() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let err = provider()
            .with_token_url(format!("{}/token", server.url()))
            .exchange_code(Grant::Email, "used")
            .await
            .unwrap_err();
        assert!(matches!(err, SpecsheetError::ReauthRequired(_)));
    }
}
