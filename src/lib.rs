//! GitHub data sync with a local SQLite cache.
//!
//! [`SyncEngine`] serves the signed-in user's profile, repositories and pull
//! requests from the cache while it is fresh (15 minutes) and refetches them
//! over the GraphQL API otherwise. Review requests, repository details and
//! contribution activity are always fetched live.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod git;
pub mod infrastructure;

pub use application::{load_dashboard, AccountManager, Origin, Session, SyncEngine, Synced};
pub use error::{Error, Result};
