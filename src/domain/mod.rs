pub mod dashboard;
pub mod pull_request;
pub mod repo;
pub mod user;

pub use dashboard::Dashboard;
pub use pull_request::{
    PullRequest, PullRequestAuthor, PullRequestRepository, PullRequestState, PullRequestStatus,
    Review, ReviewDecision, ReviewState,
};
pub use repo::{
    Branch, Collaborator, Commit, CommitAuthor, Language, LanguageSize, Repository,
    RepositoryOwner,
};
pub use user::{
    CommitContribution, ContributionCalendar, ContributionDay, ContributionWeek,
    ContributionsCollection, RepositoryContribution, RepositoryRef, User, UserStatus,
};
