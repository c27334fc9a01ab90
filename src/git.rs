use git2::Repository;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// `owner/name` of a GitHub repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySlug {
    pub owner: String,
    pub name: String,
}

impl fmt::Display for RepositorySlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GitRepoError {
    #[error("Not currently in a git repository")]
    NotInGitRepo,

    #[error("Git repository does not have an 'origin' remote configured")]
    NoRemoteFound,

    #[error("The 'origin' remote is not a GitHub repository")]
    RemoteNotGitHub,

    #[error("Expected OWNER/NAME, got '{0}'")]
    InvalidSlug(String),
}

impl FromStr for RepositorySlug {
    type Err = GitRepoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        split_slug(value).ok_or_else(|| GitRepoError::InvalidSlug(value.to_string()))
    }
}

fn split_slug(path: &str) -> Option<RepositorySlug> {
    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, name) = path.split_once('/')?;
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some(RepositorySlug {
        owner: owner.to_string(),
        name: name.to_string(),
    })
}

/// Slug of the `origin` remote of the checkout containing the working
/// directory. Works from any depth inside the checkout.
pub fn current_repository() -> Result<RepositorySlug, GitRepoError> {
    let current_dir = std::env::current_dir().map_err(|_| GitRepoError::NotInGitRepo)?;
    let repo = Repository::discover(current_dir).map_err(|_| GitRepoError::NotInGitRepo)?;
    let remote = repo
        .find_remote("origin")
        .map_err(|_| GitRepoError::NoRemoteFound)?;
    let url = remote.url().ok_or(GitRepoError::NoRemoteFound)?;
    parse_github_url(url)
}

/// Parse a GitHub remote URL (SSH or HTTPS) into owner and repo name
pub fn parse_github_url(url: &str) -> Result<RepositorySlug, GitRepoError> {
    const PREFIXES: [&str; 4] = [
        "git@github.com:",
        "ssh://git@github.com/",
        "https://github.com/",
        "http://github.com/",
    ];

    PREFIXES
        .iter()
        .find_map(|prefix| url.strip_prefix(prefix))
        .and_then(|path| split_slug(path.trim_end_matches('/')))
        .ok_or(GitRepoError::RemoteNotGitHub)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slug(owner: &str, name: &str) -> RepositorySlug {
        RepositorySlug {
            owner: owner.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_parse_ssh_url() {
        assert_eq!(
            parse_github_url("git@github.com:octocat/Hello-World.git"),
            Ok(slug("octocat", "Hello-World"))
        );
        assert_eq!(
            parse_github_url("git@github.com:octocat/Hello-World"),
            Ok(slug("octocat", "Hello-World"))
        );
        assert_eq!(
            parse_github_url("ssh://git@github.com/octocat/Hello-World.git"),
            Ok(slug("octocat", "Hello-World"))
        );
    }

    #[test]
    fn test_parse_https_url() {
        assert_eq!(
            parse_github_url("https://github.com/octocat/Hello-World.git"),
            Ok(slug("octocat", "Hello-World"))
        );
        assert_eq!(
            parse_github_url("https://github.com/octocat/Hello-World/"),
            Ok(slug("octocat", "Hello-World"))
        );
        assert_eq!(
            parse_github_url("http://github.com/octocat/Hello-World"),
            Ok(slug("octocat", "Hello-World"))
        );
    }

    #[test]
    fn test_non_github_remote() {
        assert_eq!(
            parse_github_url("https://gitlab.com/octocat/Hello-World.git"),
            Err(GitRepoError::RemoteNotGitHub)
        );
        assert_eq!(
            parse_github_url("https://github.com/octocat"),
            Err(GitRepoError::RemoteNotGitHub)
        );
    }

    #[test]
    fn test_slug_from_str() {
        let parsed: RepositorySlug = "rust-lang/rust".parse().unwrap();
        assert_eq!(parsed, slug("rust-lang", "rust"));
        assert_eq!(parsed.to_string(), "rust-lang/rust");
        assert!("rust".parse::<RepositorySlug>().is_err());
        assert!("a/b/c".parse::<RepositorySlug>().is_err());
        assert!("/rust".parse::<RepositorySlug>().is_err());
    }
}
