use super::error::CredentialError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

type Tokens = BTreeMap<String, String>;

/// Default credentials file location under the platform config directory
pub fn credentials_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("devradar").join("credentials.json"))
}

/// One secret token per account identifier.
///
/// Saving over an existing account replaces its token.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn save(&self, token: &str, account: &str) -> Result<(), CredentialError>;

    /// Fails with [`CredentialError::NotFound`] for unknown accounts
    async fn retrieve(&self, account: &str) -> Result<String, CredentialError>;

    async fn delete(&self, account: &str) -> Result<(), CredentialError>;

    /// Stored account identifiers, sorted
    async fn list(&self) -> Result<Vec<String>, CredentialError>;
}

/// Tokens kept in a JSON object on disk, readable only by the owner
pub struct FileCredentialStore {
    path: PathBuf,
    // serialises read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Tokens, CredentialError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Tokens::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| CredentialError::Corrupt(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Tokens::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a sibling temp file, then rename over the real one
    async fn store(&self, tokens: &Tokens) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(tokens)
            .map_err(|e| CredentialError::Corrupt(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        // a leftover from an interrupted write may carry looser permissions
        match tokio::fs::remove_file(&tmp).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        let mut file = owner_only(OpenOptions::new().write(true).create_new(true))
            .open(&tmp)
            .await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Token files are created with mode 0600 from the start
#[cfg(unix)]
fn owner_only(options: &mut OpenOptions) -> &mut OpenOptions {
    options.mode(0o600)
}

#[cfg(not(unix))]
fn owner_only(options: &mut OpenOptions) -> &mut OpenOptions {
    options
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn save(&self, token: &str, account: &str) -> Result<(), CredentialError> {
        let _guard = self.lock.lock().await;
        let mut tokens = self.load().await?;
        let replaced = tokens
            .insert(account.to_string(), token.to_string())
            .is_some();
        self.store(&tokens).await?;
        debug!(account, replaced, "saved credential");
        Ok(())
    }

    async fn retrieve(&self, account: &str) -> Result<String, CredentialError> {
        let _guard = self.lock.lock().await;
        self.load()
            .await?
            .remove(account)
            .ok_or_else(|| CredentialError::NotFound {
                account: account.to_string(),
            })
    }

    async fn delete(&self, account: &str) -> Result<(), CredentialError> {
        let _guard = self.lock.lock().await;
        let mut tokens = self.load().await?;
        if tokens.remove(account).is_some() {
            self.store(&tokens).await?;
            debug!(account, "deleted credential");
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, CredentialError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_keys().collect())
    }
}

/// Process-local store, used for `GITHUB_TOKEN` sessions and tests
#[derive(Default)]
pub struct MemoryCredentialStore {
    tokens: Mutex<Tokens>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(account: &str, token: &str) -> Self {
        let mut tokens = Tokens::new();
        tokens.insert(account.to_string(), token.to_string());
        Self {
            tokens: Mutex::new(tokens),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn save(&self, token: &str, account: &str) -> Result<(), CredentialError> {
        self.tokens
            .lock()
            .await
            .insert(account.to_string(), token.to_string());
        Ok(())
    }

    async fn retrieve(&self, account: &str) -> Result<String, CredentialError> {
        self.tokens
            .lock()
            .await
            .get(account)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound {
                account: account.to_string(),
            })
    }

    async fn delete(&self, account: &str) -> Result<(), CredentialError> {
        self.tokens.lock().await.remove(account);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, CredentialError> {
        Ok(self.tokens.lock().await.keys().cloned().collect())
    }
}
