use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PullRequestState {
    Open,
    Closed,
    Merged,
}

impl PullRequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PullRequestState::Open => "OPEN",
            PullRequestState::Closed => "CLOSED",
            PullRequestState::Merged => "MERGED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OPEN" => Some(PullRequestState::Open),
            "CLOSED" => Some(PullRequestState::Closed),
            "MERGED" => Some(PullRequestState::Merged),
            _ => None,
        }
    }
}

/// Aggregate reviewer verdict, independent of open/closed/merged
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Approved,
    ChangesRequested,
    ReviewRequired,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::Approved => "APPROVED",
            ReviewDecision::ChangesRequested => "CHANGES_REQUESTED",
            ReviewDecision::ReviewRequired => "REVIEW_REQUIRED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "APPROVED" => Some(ReviewDecision::Approved),
            "CHANGES_REQUESTED" => Some(ReviewDecision::ChangesRequested),
            "REVIEW_REQUIRED" => Some(ReviewDecision::ReviewRequired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Review {
    pub reviewer_login: String,
    pub state: ReviewState,
}

/// Repository a pull request belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequestRepository {
    pub name: String,
    pub name_with_owner: String,
    pub owner_login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequestAuthor {
    pub login: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequest {
    /// Opaque GraphQL node id
    pub id: String,
    pub title: String,
    pub number: u32,
    pub url: String,
    pub state: PullRequestState,
    pub is_draft: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    pub additions: u32,
    pub deletions: u32,
    pub repository: PullRequestRepository,
    pub author: PullRequestAuthor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_decision: Option<ReviewDecision>,
    /// Not persisted by the cache, so `None` on cache-derived values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<Review>>,
}

impl PullRequest {
    /// merged > closed > draft > review decision > open
    pub fn status(&self) -> PullRequestStatus {
        match self.state {
            PullRequestState::Merged => PullRequestStatus::Merged,
            PullRequestState::Closed => PullRequestStatus::Closed,
            PullRequestState::Open if self.is_draft => PullRequestStatus::Draft,
            PullRequestState::Open => match self.review_decision {
                Some(ReviewDecision::Approved) => PullRequestStatus::Approved,
                Some(ReviewDecision::ChangesRequested) => PullRequestStatus::ChangesRequested,
                Some(ReviewDecision::ReviewRequired) => PullRequestStatus::ReviewRequired,
                None => PullRequestStatus::Open,
            },
        }
    }

    pub fn status_text(&self) -> &'static str {
        self.status().text()
    }

    pub fn status_color(&self) -> &'static str {
        self.status().color()
    }

    pub fn change_count(&self) -> u32 {
        self.additions + self.deletions
    }

    /// Distinct reviewer logins across the loaded reviews
    pub fn reviewer_count(&self) -> usize {
        self.reviews
            .iter()
            .flatten()
            .map(|review| review.reviewer_login.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn is_open(&self) -> bool {
        self.state == PullRequestState::Open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullRequestStatus {
    Merged,
    Closed,
    Draft,
    Approved,
    ChangesRequested,
    ReviewRequired,
    Open,
}

impl PullRequestStatus {
    pub fn text(&self) -> &'static str {
        match self {
            PullRequestStatus::Merged => "Merged",
            PullRequestStatus::Closed => "Closed",
            PullRequestStatus::Draft => "Draft",
            PullRequestStatus::Approved => "Approved",
            PullRequestStatus::ChangesRequested => "Changes Requested",
            PullRequestStatus::ReviewRequired => "Review Required",
            PullRequestStatus::Open => "Open",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            PullRequestStatus::Merged => "#8957E5",
            PullRequestStatus::Approved => "#3FB950",
            PullRequestStatus::ChangesRequested => "#F85149",
            _ => "#858585",
        }
    }
}

impl fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}
