//! Google OAuth token endpoint client.

use alarm_shared::api::TokenPayload;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Error)]
pub enum OAuthError {
    /// The token endpoint answered with a non-success status
    #[error("Token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Token request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

/// Result of refreshing an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Unix timestamp (seconds)
    pub expires_at: i64,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Exchange an authorization code and its PKCE verifier for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenPayload, OAuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, OAuthError>;
}

pub struct GoogleOAuth {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleOAuth {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    async fn post_form<F: Serialize + ?Sized>(&self, form: &F) -> Result<String, OAuthError> {
        let response = self.http.post(&self.token_url).form(form).send().await?;

        let status = response.status();
        let body = response.text().await?;
        tracing::info!("Google token response status={}", status);
        tracing::debug!("Google token response body={}", body);

        if !status.is_success() {
            tracing::warn!("Token endpoint rejected request: {}", body);
            return Err(OAuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

#[derive(Serialize)]
struct CodeExchangeForm<'a> {
    grant_type: &'static str,
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    code_verifier: &'a str,
}

#[derive(Serialize)]
struct RefreshForm<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

#[async_trait]
impl OAuthProvider for GoogleOAuth {
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenPayload, OAuthError> {
        let body = self
            .post_form(&CodeExchangeForm {
                grant_type: "authorization_code",
                code,
                client_id: &self.client_id,
                client_secret: &self.client_secret,
                redirect_uri: &self.redirect_uri,
                code_verifier,
            })
            .await?;

        serde_json::from_str(&body).map_err(|e| OAuthError::InvalidResponse(e.to_string()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, OAuthError> {
        let body = self
            .post_form(&RefreshForm {
                grant_type: "refresh_token",
                refresh_token,
                client_id: &self.client_id,
                client_secret: &self.client_secret,
            })
            .await?;

        let refreshed: RefreshResponse =
            serde_json::from_str(&body).map_err(|e| OAuthError::InvalidResponse(e.to_string()))?;

        Ok(RefreshedToken {
            access_token: refreshed.access_token,
            expires_at: Utc::now().timestamp() + refreshed.expires_in,
        })
    }
}
