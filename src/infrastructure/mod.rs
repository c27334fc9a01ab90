pub mod cache;
pub mod credentials;
pub mod error;
pub mod github_api;
pub mod graphql;
pub mod oauth;

pub use cache::{cache_path, Cache, CacheBatch, CacheStats, Cached, FRESHNESS_WINDOW};
pub use credentials::{
    credentials_path, CredentialStore, FileCredentialStore, MemoryCredentialStore,
};
pub use error::{ApiError, CacheError, CredentialError};
pub use github_api::{EmptyResponse, GitHubClient, Method, DEFAULT_API_URL};
pub use oauth::{BasicUser, OAuthConfig, TokenResponse};
