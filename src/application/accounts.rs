use crate::error::{Error, Result};
use crate::infrastructure::oauth::{exchange_code, fetch_authenticated_user};
use crate::infrastructure::{Cache, CredentialStore, GitHubClient, OAuthConfig};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, instrument};

const STATE_LENGTH: usize = 32;

/// Sign-in, sign-out and account selection on top of the credential store
pub struct AccountManager {
    api: GitHubClient,
    cache: Arc<Cache>,
    credentials: Arc<dyn CredentialStore>,
    oauth: Option<OAuthConfig>,
    preferred: Option<String>,
}

impl AccountManager {
    pub fn new(api: GitHubClient, cache: Arc<Cache>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            api,
            cache,
            credentials,
            oauth: None,
            preferred: None,
        }
    }

    pub fn with_oauth(mut self, config: Option<OAuthConfig>) -> Self {
        self.oauth = config;
        self
    }

    /// Account to use when several are stored
    pub fn with_preferred_account(mut self, account: Option<String>) -> Self {
        self.preferred = account;
        self
    }

    fn oauth(&self) -> Result<&OAuthConfig> {
        self.oauth.as_ref().ok_or(Error::OAuthNotConfigured)
    }

    /// Random anti-forgery value to round-trip through the authorize redirect
    pub fn new_state() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_LENGTH)
            .map(char::from)
            .collect()
    }

    pub fn authorize_url(&self, state: &str) -> Result<Url> {
        Ok(self.oauth()?.authorize_url(state)?)
    }

    /// Finish the browser flow: check state, trade the code, store the token.
    /// Returns the signed-in login.
    #[instrument(skip_all)]
    pub async fn complete_authorization(
        &self,
        code: &str,
        returned_state: &str,
        expected_state: &str,
    ) -> Result<String> {
        if returned_state != expected_state {
            return Err(Error::InvalidState);
        }
        let token = exchange_code(&self.api, self.oauth()?, code).await?;
        self.store_token(&token.access_token).await
    }

    /// Sign in with a personal access token
    #[instrument(skip_all)]
    pub async fn login_with_token(&self, token: &str) -> Result<String> {
        self.store_token(token).await
    }

    async fn store_token(&self, token: &str) -> Result<String> {
        let user = fetch_authenticated_user(&self.api, token).await?;
        self.credentials.save(token, &user.login).await?;
        info!(login = %user.login, "signed in");
        Ok(user.login)
    }

    /// Account behind a token that is used but never stored, such as one from
    /// `GITHUB_TOKEN`. Resolved through `GET /user` the first time, then
    /// remembered in the cache under a SHA-256 fingerprint of the token.
    #[instrument(skip_all)]
    pub async fn identify_token(&self, token: &str) -> Result<String> {
        let fingerprint = token_fingerprint(token);
        if let Some(account) = self.cache.token_account(&fingerprint)? {
            debug!(%account, "token account served from cache");
            return Ok(account);
        }
        let user = fetch_authenticated_user(&self.api, token).await?;
        self.cache.remember_token_account(&fingerprint, &user.login)?;
        Ok(user.login)
    }

    /// Forget the token and everything cached for the account
    #[instrument(skip(self))]
    pub async fn sign_out(&self, account: &str) -> Result<()> {
        self.credentials.delete(account).await?;
        self.cache.delete_user(account)?;
        info!("signed out");
        Ok(())
    }

    pub async fn accounts(&self) -> Result<Vec<String>> {
        Ok(self.credentials.list().await?)
    }

    /// The preferred account when it is stored, otherwise the first stored one
    pub async fn default_account(&self) -> Result<Option<String>> {
        let accounts = self.accounts().await?;
        if let Some(preferred) = &self.preferred {
            if accounts.contains(preferred) {
                return Ok(Some(preferred.clone()));
            }
        }
        Ok(accounts.into_iter().next())
    }
}

fn token_fingerprint(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}
