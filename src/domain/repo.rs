use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const UNKNOWN_LANGUAGE_COLOR: &str = "#858585";

/// GitHub Repository
///
/// The detail-only fields (`watcher_count` through `collaborators`) are only
/// populated by the single-repository detail fetch. `None` means "not loaded",
/// never zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Repository {
    /// Opaque GraphQL node id
    pub id: String,
    pub name: String,
    pub name_with_owner: String, // "owner/repo"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub url: String,
    pub stargazer_count: u32,
    pub fork_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_language: Option<Language>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<LanguageSize>>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub is_private: bool,
    pub is_fork: bool,
    pub owner: RepositoryOwner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watcher_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_issue_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_pull_request_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    /// Default-branch history, newest first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commits: Option<Vec<Commit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<Branch>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaborators: Option<Vec<Collaborator>>,
}

impl Repository {
    pub fn display_language(&self) -> &str {
        self.primary_language
            .as_ref()
            .map(|l| l.name.as_str())
            .unwrap_or("Unknown")
    }

    pub fn language_color(&self) -> &str {
        self.primary_language
            .as_ref()
            .and_then(|l| l.color.as_deref())
            .unwrap_or(UNKNOWN_LANGUAGE_COLOR)
    }

    pub fn formatted_stars(&self) -> String {
        format_count(self.stargazer_count)
    }

    pub fn formatted_forks(&self) -> String {
        format_count(self.fork_count)
    }

    /// Share of the codebase per language, in percent.
    /// Empty when the breakdown wasn't loaded or every size is zero.
    pub fn language_breakdown(&self) -> Vec<(&Language, f64)> {
        let Some(languages) = self.languages.as_ref() else {
            return Vec::new();
        };
        let total: u64 = languages.iter().map(|l| l.size).sum();
        if total == 0 {
            return Vec::new();
        }
        languages
            .iter()
            .map(|l| (&l.language, l.size as f64 / total as f64 * 100.0))
            .collect()
    }

    /// True once the detail fetch has filled in the detail-only fields
    pub fn has_details(&self) -> bool {
        self.watcher_count.is_some()
    }
}

fn format_count(count: u32) -> String {
    if count >= 1000 {
        format!("{:.1}k", count as f64 / 1000.0)
    } else {
        count.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Language {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// A language and the number of bytes written in it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LanguageSize {
    pub language: Language,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositoryOwner {
    pub login: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Commit {
    pub oid: String,
    pub message: String,
    pub committed_date: DateTime<Utc>,
    pub author: CommitAuthor,
    pub additions: u32,
    pub deletions: u32,
}

impl Commit {
    pub fn short_message(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }

    pub fn change_count(&self) -> u32 {
        self.additions + self.deletions
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitAuthor {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Linked GitHub account, when the commit email maps to one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<RepositoryOwner>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub head_oid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Collaborator {
    pub login: String,
    pub avatar_url: String,
}
