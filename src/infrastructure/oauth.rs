//! REST helpers behind the OAuth sign-in flow: authorize URL, code exchange
//! and the identity lookup that names the new account.

use super::error::ApiError;
use super::github_api::{GitHubClient, Method};
use reqwest::header;
use reqwest::Url;
use serde::{Deserialize, Serialize};

pub const DEFAULT_OAUTH_HOST: &str = "https://github.com";
pub const DEFAULT_REDIRECT_URI: &str = "devradar://oauth-callback";
pub const DEFAULT_SCOPES: &str = "repo read:user user:email notifications";

/// Registered OAuth application settings
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: String,
    pub host: String,
}

impl OAuthConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.to_string(),
            host: DEFAULT_OAUTH_HOST.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.host.trim_end_matches('/'), path)
    }

    /// Browser URL that starts the authorization flow
    pub fn authorize_url(&self, state: &str) -> Result<Url, ApiError> {
        Url::parse_with_params(
            &self.endpoint("/login/oauth/authorize"),
            [
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", self.scopes.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub scope: String,
}

/// `GET /user` subset used to identify the signed-in account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BasicUser {
    pub login: String,
    pub id: u64,
    pub avatar_url: String,
}

/// The token endpoint reports bad codes with a 200 and an error object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenExchange {
    Token(TokenResponse),
    Error {
        error: String,
        error_description: Option<String>,
    },
}

/// Trade an authorization code for an access token
pub async fn exchange_code(
    client: &GitHubClient,
    config: &OAuthConfig,
    code: &str,
) -> Result<TokenResponse, ApiError> {
    let request = client
        .http()
        .post(config.endpoint("/login/oauth/access_token"))
        .header(header::ACCEPT, "application/json")
        .query(&[
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
        ]);

    match client.send::<TokenExchange>(request).await? {
        TokenExchange::Token(token) => Ok(token),
        TokenExchange::Error {
            error,
            error_description,
        } => Err(ApiError::InvalidRequest(
            error_description.unwrap_or(error),
        )),
    }
}

/// Identify the account a token belongs to
pub async fn fetch_authenticated_user(
    client: &GitHubClient,
    token: &str,
) -> Result<BasicUser, ApiError> {
    client
        .execute_rest::<(), BasicUser>("/user", Method::GET, None, token)
        .await
}
