//! Google OAuth 2.0 / OpenID Connect identity provider.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info_span, Instrument};
use url::Url;

use crate::session::{AuthError, ExternalIdentity, IdentityProvider};

pub const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
pub const USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";
pub const SCOPES: &str = "openid email profile";

#[derive(Clone, Debug)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct UserInfo {
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    given_name: Option<String>,
    family_name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct GoogleOAuth {
    config: GoogleConfig,
    client: Client,
    token_endpoint: String,
    userinfo_endpoint: String,
}

impl GoogleOAuth {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: GoogleConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            config,
            client,
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            userinfo_endpoint: USERINFO_ENDPOINT.to_string(),
        })
    }

    /// Point the provider at different token and userinfo endpoints.
    #[must_use]
    pub fn with_endpoints(mut self, token_endpoint: &str, userinfo_endpoint: &str) -> Self {
        self.token_endpoint = token_endpoint.to_string();
        self.userinfo_endpoint = userinfo_endpoint.to_string();
        self
    }

    /// Consent screen URL the frontend redirects the browser to.
    ///
    /// # Errors
    /// Returns an error if the endpoint URL cannot be parsed.
    pub fn auth_url(&self) -> Result<Url> {
        Url::parse_with_params(
            AUTH_ENDPOINT,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("access_type", "online"),
            ],
        )
        .context("Failed to build Google auth URL")
    }

    async fn fetch_access_token(&self, code: &str) -> Result<String, AuthError> {
        let span = info_span!("google.token", http.method = "POST", url = %self.token_endpoint);
        let response = self
            .client
            .post(&self.token_endpoint)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .instrument(span)
            .await
            .context("Google token request failed")?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "google rejected authorization code");
            return Err(AuthError::Unauthorized("Unauthorized"));
        }

        let body: TokenResponse = response
            .json()
            .await
            .context("Failed to decode Google token response")?;
        body.access_token
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::Unauthorized("Unauthorized"))
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<UserInfo, AuthError> {
        let span = info_span!("google.userinfo", http.method = "GET", url = %self.userinfo_endpoint);
        let response = self
            .client
            .get(&self.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .instrument(span)
            .await
            .context("Google userinfo request failed")?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "google userinfo rejected");
            return Err(AuthError::Unauthorized("Unauthorized"));
        }

        Ok(response
            .json()
            .await
            .context("Failed to decode Google userinfo response")?)
    }
}

#[async_trait]
impl IdentityProvider for GoogleOAuth {
    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity, AuthError> {
        if code.trim().is_empty() {
            return Err(AuthError::Unauthorized("Unauthorized"));
        }
        let access_token = self.fetch_access_token(code).await?;
        let info = self.fetch_userinfo(&access_token).await?;

        if !info.email_verified {
            return Err(AuthError::Unauthorized("Email is not verified"));
        }
        let email = info
            .email
            .filter(|email| !email.is_empty())
            .ok_or(AuthError::Unauthorized("Unauthorized"))?;

        Ok(ExternalIdentity {
            email,
            given_name: info.given_name,
            family_name: info.family_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Form,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;

    fn config() -> GoogleConfig {
        GoogleConfig {
            client_id: "client-id".to_string(),
            client_secret: SecretString::from("client-secret".to_string()),
            redirect_uri: "http://localhost:3000/confirm-google-auth".to_string(),
        }
    }

    async fn token(Form(form): Form<HashMap<String, String>>) -> impl IntoResponse {
        let ok = form.get("client_secret").map(String::as_str) == Some("client-secret")
            && form.get("grant_type").map(String::as_str) == Some("authorization_code");
        match (ok, form.get("code").map(String::as_str)) {
            (true, Some("verified")) => Json(json!({"access_token": "at-verified"})).into_response(),
            (true, Some("unverified")) => {
                Json(json!({"access_token": "at-unverified"})).into_response()
            }
            _ => (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"}))).into_response(),
        }
    }

    async fn userinfo(headers: HeaderMap) -> impl IntoResponse {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        match auth {
            "Bearer at-verified" => Json(json!({
                "email": "ann@example.com",
                "email_verified": true,
                "given_name": "Ann",
                "family_name": "Lee"
            }))
            .into_response(),
            "Bearer at-unverified" => Json(json!({
                "email": "bob@example.com",
                "email_verified": false
            }))
            .into_response(),
            _ => StatusCode::UNAUTHORIZED.into_response(),
        }
    }

    async fn mock_provider() -> anyhow::Result<GoogleOAuth> {
        let app = Router::new()
            .route("/token", post(token))
            .route("/userinfo", get(userinfo));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(GoogleOAuth::new(config())?.with_endpoints(
            &format!("http://{addr}/token"),
            &format!("http://{addr}/userinfo"),
        ))
    }

    #[test]
    fn auth_url_carries_client_and_scopes() -> anyhow::Result<()> {
        let url = GoogleOAuth::new(config())?.auth_url()?;
        assert!(url.as_str().starts_with(AUTH_ENDPOINT));
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params.get("client_id").map(String::as_str), Some("client-id"));
        assert_eq!(params.get("response_type").map(String::as_str), Some("code"));
        assert_eq!(params.get("scope").map(String::as_str), Some(SCOPES));
        assert_eq!(
            params.get("redirect_uri").map(String::as_str),
            Some("http://localhost:3000/confirm-google-auth")
        );
        assert!(!url.as_str().contains("client-secret"));
        Ok(())
    }

    #[tokio::test]
    async fn exchange_verified_code() -> anyhow::Result<()> {
        let provider = mock_provider().await?;
        let claim = provider.exchange_code("verified").await?;
        assert_eq!(claim.email, "ann@example.com");
        assert_eq!(claim.display_name(), "Ann Lee");
        Ok(())
    }

    #[tokio::test]
    async fn unverified_email_is_unauthorized() -> anyhow::Result<()> {
        let provider = mock_provider().await?;
        let result = provider.exchange_code("unverified").await;
        assert!(matches!(result, Err(AuthError::Unauthorized(_))));
        Ok(())
    }

    #[tokio::test]
    async fn rejected_code_is_unauthorized() -> anyhow::Result<()> {
        let provider = mock_provider().await?;
        assert!(matches!(
            provider.exchange_code("bogus").await,
            Err(AuthError::Unauthorized(_))
        ));
        assert!(matches!(
            provider.exchange_code("  ").await,
            Err(AuthError::Unauthorized(_))
        ));
        Ok(())
    }
}
