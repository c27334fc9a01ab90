use crate::error::{Error, Result};
use crate::git::RepositorySlug;
use crate::infrastructure::oauth::{DEFAULT_OAUTH_HOST, DEFAULT_REDIRECT_URI, DEFAULT_SCOPES};
use crate::infrastructure::{cache_path, credentials_path, CacheError, OAuthConfig, DEFAULT_API_URL};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// devradar - your GitHub activity, cached locally
#[derive(Parser, Debug)]
#[command(name = "devradar")]
#[command(author, version)]
#[command(about = "Your GitHub profile, repositories and pull requests, cached locally", long_about = None)]
pub struct Cli {
    /// Account to act as (defaults to the first signed-in account)
    #[arg(global = true, long, env = "DEVRADAR_ACCOUNT")]
    pub account: Option<String>,

    /// GitHub API base URL
    #[arg(global = true, long, env = "DEVRADAR_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Cache database location
    #[arg(global = true, long, env = "DEVRADAR_CACHE")]
    pub cache_path: Option<PathBuf>,

    /// Credentials file location
    #[arg(global = true, long, env = "DEVRADAR_CREDENTIALS")]
    pub credentials_path: Option<PathBuf>,

    /// Personal access token, used instead of the stored credentials
    #[arg(global = true, long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// OAuth application client id
    #[arg(global = true, long, env = "GITHUB_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth application client secret
    #[arg(global = true, long, env = "GITHUB_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// OAuth redirect URI registered for the application
    #[arg(global = true, long, default_value = DEFAULT_REDIRECT_URI)]
    pub redirect_uri: String,

    /// Host serving the OAuth authorize and token endpoints
    #[arg(global = true, long, env = "DEVRADAR_OAUTH_HOST", default_value = DEFAULT_OAUTH_HOST)]
    pub oauth_host: String,

    /// Suppress progress indicators and non-error output
    #[arg(global = true, long, short)]
    pub quiet: bool,

    /// Print JSON instead of text
    #[arg(global = true, long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Sign in, sign out and list accounts
    Auth {
        #[command(subcommand)]
        action: AuthCommands,
    },

    /// Show the signed-in user's profile and contribution streaks
    User {
        /// Ignore the cache and fetch from GitHub
        #[arg(long)]
        refresh: bool,
    },

    /// List repositories, most recently updated first
    Repos {
        /// Ignore the cache and fetch from GitHub
        #[arg(long)]
        refresh: bool,
    },

    /// List your pull requests, most recently updated first
    #[command(alias = "pulls")]
    Prs {
        /// Ignore the cache and fetch from GitHub
        #[arg(long)]
        refresh: bool,
    },

    /// List open pull requests waiting for your review
    Reviews,

    /// Show one repository in detail
    Repo {
        /// OWNER/NAME (defaults to the origin remote of the current checkout)
        slug: Option<RepositorySlug>,
    },

    /// Show contributions between two dates (inclusive)
    Activity {
        /// First day, YYYY-MM-DD
        #[arg(long)]
        from: NaiveDate,
        /// Last day, YYYY-MM-DD
        #[arg(long)]
        to: NaiveDate,
    },

    /// Load profile, repositories, pull requests and review requests together
    Dashboard {
        /// Ignore the cache and fetch from GitHub
        #[arg(long)]
        refresh: bool,
    },

    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },

    /// Generate shell completion scripts
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum AuthCommands {
    /// Print the browser URL that starts an OAuth sign-in
    Url,

    /// Store a token, from a personal access token or an OAuth code
    Login {
        /// Personal access token
        #[arg(long, conflicts_with = "code")]
        token: Option<String>,

        /// Authorization code from the OAuth redirect
        #[arg(long, requires_all = ["state", "expected_state"])]
        code: Option<String>,

        /// `state` returned on the OAuth redirect
        #[arg(long)]
        state: Option<String>,

        /// `state` printed by `auth url`
        #[arg(long)]
        expected_state: Option<String>,
    },

    /// Forget an account's token and cached data
    Logout {
        /// Account to sign out (defaults to the current account)
        account: Option<String>,
    },

    /// List signed-in accounts
    Accounts,
}

#[derive(Subcommand, Debug, Clone)]
pub enum DataCommands {
    /// Clear local cache
    Clear,
    /// Show cache statistics
    Status,
    /// Show the database file path
    Reveal,
}

/// Resolved configuration handed to constructors
#[derive(Debug, Clone)]
pub struct Settings {
    pub account: Option<String>,
    pub api_url: String,
    pub cache_path: PathBuf,
    pub credentials_path: PathBuf,
    pub github_token: Option<String>,
    pub oauth: Option<OAuthConfig>,
    pub quiet: bool,
    pub json: bool,
}

impl Settings {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let cache_path = match &cli.cache_path {
            Some(path) => path.clone(),
            None => cache_path()?,
        };
        let credentials_path = match &cli.credentials_path {
            Some(path) => path.clone(),
            None => credentials_path().ok_or(Error::Cache(CacheError::NoConfigDir))?,
        };

        let oauth = match (non_empty(&cli.client_id), non_empty(&cli.client_secret)) {
            (Some(id), Some(secret)) => Some(OAuthConfig {
                client_id: id.to_string(),
                client_secret: secret.to_string(),
                redirect_uri: cli.redirect_uri.clone(),
                scopes: DEFAULT_SCOPES.to_string(),
                host: cli.oauth_host.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            account: non_empty(&cli.account).map(str::to_string),
            api_url: cli.api_url.clone(),
            cache_path,
            credentials_path,
            github_token: non_empty(&cli.github_token).map(str::to_string),
            oauth,
            quiet: cli.quiet,
            json: cli.json,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
