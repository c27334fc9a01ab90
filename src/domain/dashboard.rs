use super::{PullRequest, Repository, User};
use serde::Serialize;

/// Everything the landing view shows, loaded in one go
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub user: User,
    pub repositories: Vec<Repository>,
    pub pull_requests: Vec<PullRequest>,
    pub review_requests: Vec<PullRequest>,
}

impl Dashboard {
    pub fn current_streak(&self) -> u32 {
        self.user
            .contributions
            .as_ref()
            .map(|c| c.calendar_or_empty().current_streak())
            .unwrap_or(0)
    }

    pub fn longest_streak(&self) -> u32 {
        self.user
            .contributions
            .as_ref()
            .map(|c| c.calendar_or_empty().longest_streak())
            .unwrap_or(0)
    }

    /// The calendar's own total, not the sum of the contribution counters
    pub fn total_contributions(&self) -> u32 {
        self.user
            .contributions
            .as_ref()
            .and_then(|c| c.calendar.as_ref())
            .map(|cal| cal.total_contributions)
            .unwrap_or(0)
    }

    pub fn total_commits(&self) -> u32 {
        self.user
            .contributions
            .as_ref()
            .map(|c| c.total_commit_contributions)
            .unwrap_or(0)
    }

    pub fn open_pull_request_count(&self) -> usize {
        self.pull_requests.iter().filter(|pr| pr.is_open()).count()
    }

    pub fn pending_review_count(&self) -> usize {
        self.review_requests.len()
    }
}
