use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated GitHub user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: String,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributions: Option<ContributionsCollection>,
}

impl User {
    /// Human name when one is set, login otherwise
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.login)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UserStatus {
    pub message: Option<String>,
    pub emoji: Option<String>,
}

impl UserStatus {
    pub fn display_text(&self) -> &str {
        match self.message.as_deref() {
            Some(message) if !message.is_empty() => message,
            _ => "Active",
        }
    }
}

/// Contribution counters for a time window.
///
/// `total_contributions()` sums the four counters and is independent of the
/// calendar's own `total_contributions`; the two routinely disagree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ContributionsCollection {
    pub total_commit_contributions: u32,
    pub total_issue_contributions: u32,
    pub total_pull_request_contributions: u32,
    pub total_pull_request_review_contributions: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar: Option<ContributionCalendar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commits_by_repository: Option<Vec<RepositoryContribution>>,
}

impl ContributionsCollection {
    pub fn total_contributions(&self) -> u32 {
        self.total_commit_contributions
            + self.total_issue_contributions
            + self.total_pull_request_contributions
            + self.total_pull_request_review_contributions
    }

    pub fn calendar_or_empty(&self) -> ContributionCalendar {
        self.calendar.clone().unwrap_or_default()
    }
}

/// Weekly contribution grid, oldest week first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ContributionCalendar {
    pub total_contributions: u32,
    pub weeks: Vec<ContributionWeek>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ContributionWeek {
    pub days: Vec<ContributionDay>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContributionDay {
    pub count: u32,
    /// ISO-8601 date, e.g. `2026-10-19`
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl ContributionDay {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()
    }
}

impl ContributionCalendar {
    /// All days across all weeks, ordered by date (oldest first)
    pub fn days(&self) -> Vec<&ContributionDay> {
        let mut days: Vec<&ContributionDay> =
            self.weeks.iter().flat_map(|week| week.days.iter()).collect();
        // ISO dates order lexicographically
        days.sort_by(|a, b| a.date.cmp(&b.date));
        days
    }

    /// Consecutive active days counting back from the most recent day.
    /// A zero-count most recent day yields 0.
    pub fn current_streak(&self) -> u32 {
        self.days()
            .iter()
            .rev()
            .take_while(|day| day.count > 0)
            .count() as u32
    }

    /// Longest run of consecutive active days anywhere in the calendar
    pub fn longest_streak(&self) -> u32 {
        let mut longest = 0;
        let mut run = 0;
        for day in self.days() {
            if day.count > 0 {
                run += 1;
                longest = longest.max(run);
            } else {
                run = 0;
            }
        }
        longest
    }
}

/// Commit activity inside one repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositoryContribution {
    pub repository: RepositoryRef,
    pub contributions: Vec<CommitContribution>,
}

impl RepositoryContribution {
    pub fn commit_count(&self) -> u32 {
        self.contributions.iter().map(|c| c.commit_count).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitContribution {
    pub occurred_at: DateTime<Utc>,
    pub commit_count: u32,
}

/// Lightweight pointer to a repository (`owner/name`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositoryRef {
    pub name: String,
    pub name_with_owner: String,
    pub owner_login: String,
}
