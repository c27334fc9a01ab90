//! GraphQL operations used by the sync layer.
//!
//! Each operation pairs a query document with its variable type and the
//! shape of its `data` payload. Wire types mirror the GitHub schema and are
//! converted into domain types with `From` impls; nothing outside this module
//! sees the connection/edge nesting.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::error::ApiError;
use crate::domain::{
    Branch, Collaborator, Commit, CommitAuthor, CommitContribution, ContributionCalendar,
    ContributionDay, ContributionWeek, ContributionsCollection, Language, LanguageSize,
    PullRequest, PullRequestAuthor, PullRequestRepository, PullRequestState, Repository,
    RepositoryContribution, RepositoryOwner, RepositoryRef, Review, ReviewDecision, ReviewState,
    User, UserStatus,
};

/// Shared selection for pull request nodes, spliced into queries with `concat!`
macro_rules! pull_request_fragment {
    () => {
        r#"
fragment PullRequestFields on PullRequest {
    id
    title
    number
    url
    state
    isDraft
    createdAt
    updatedAt
    mergedAt
    closedAt
    additions
    deletions
    repository {
      name
      nameWithOwner
      owner {
        login
      }
    }
    author {
      login
      avatarUrl
    }
    reviewDecision
    reviews(first: 5) {
      nodes {
        author {
          login
        }
        state
      }
    }
}
"#
    };
}

/// Login shown for pull requests whose author account was deleted
const GHOST_LOGIN: &str = "ghost";

/// A named GraphQL query with typed variables and response data.
pub trait GraphQlOperation {
    type Variables: Serialize + Send + Sync;
    type Data: DeserializeOwned;

    const NAME: &'static str;
    const QUERY: &'static str;
}

/// Request body posted to `/graphql`
#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a, V: Serialize> {
    pub query: &'a str,
    pub variables: &'a V,
}

/// The `{data, errors}` envelope every GraphQL response arrives in.
/// `data` stays untyped until the error list has been checked, since partial
/// data sent alongside errors need not match the operation's shape.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub locations: Option<Vec<GraphQlLocation>>,
    #[serde(default)]
    pub path: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlLocation {
    pub line: u32,
    pub column: u32,
}

impl GraphQlResponse {
    /// Errors win over data: a response carrying both is a failure.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        if let Some(errors) = self.errors {
            if !errors.is_empty() {
                return Err(ApiError::GraphQl(
                    errors.into_iter().map(|e| e.message).collect(),
                ));
            }
        }
        let data = self.data.ok_or(ApiError::NoData)?;
        Ok(serde_path_to_error::deserialize(data)?)
    }
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct NoVariables {}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CursorVariables {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepositoryVariables {
    pub owner: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateRangeVariables {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<N> {
    pub page_info: PageInfo,
    pub nodes: Vec<N>,
}

/// Operations whose payload is one page of a cursor-paginated connection
pub trait PaginatedOperation: GraphQlOperation<Variables = CursorVariables> {
    type Node;

    fn into_page(data: Self::Data) -> Connection<Self::Node>;
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

pub struct ViewerQuery;

impl GraphQlOperation for ViewerQuery {
    type Variables = NoVariables;
    type Data = ViewerData;

    const NAME: &'static str = "Viewer";
    const QUERY: &'static str = r#"
query Viewer {
  viewer {
    login
    name
    email
    avatarUrl
    bio
    company
    location
    url
    status {
      message
      emoji
    }
    contributionsCollection {
      contributionCalendar {
        totalContributions
        weeks {
          contributionDays {
            contributionCount
            date
            color
          }
        }
      }
      totalCommitContributions
      totalIssueContributions
      totalPullRequestContributions
      totalPullRequestReviewContributions
    }
  }
}
"#;
}

pub struct RepositoriesQuery;

impl GraphQlOperation for RepositoriesQuery {
    type Variables = CursorVariables;
    type Data = RepositoriesData;

    const NAME: &'static str = "Repositories";
    const QUERY: &'static str = r#"
query Repositories($cursor: String) {
  viewer {
    repositories(first: 30, after: $cursor, orderBy: {field: UPDATED_AT, direction: DESC}, ownerAffiliations: [OWNER, COLLABORATOR]) {
      pageInfo {
        hasNextPage
        endCursor
      }
      nodes {
        id
        name
        nameWithOwner
        description
        url
        stargazerCount
        forkCount
        primaryLanguage {
          name
          color
        }
        updatedAt
        pushedAt
        createdAt
        isPrivate
        isFork
        owner {
          login
          avatarUrl
        }
      }
    }
  }
}
"#;
}

impl PaginatedOperation for RepositoriesQuery {
    type Node = RepositoryNode;

    fn into_page(data: RepositoriesData) -> Connection<RepositoryNode> {
        data.viewer.repositories
    }
}

pub struct PullRequestsQuery;

impl GraphQlOperation for PullRequestsQuery {
    type Variables = CursorVariables;
    type Data = PullRequestsData;

    const NAME: &'static str = "PullRequests";
    const QUERY: &'static str = concat!(
        r#"
query PullRequests($cursor: String) {
  viewer {
    pullRequests(first: 20, after: $cursor, orderBy: {field: UPDATED_AT, direction: DESC}) {
      pageInfo {
        hasNextPage
        endCursor
      }
      nodes {
        ...PullRequestFields
      }
    }
  }
}
"#,
        pull_request_fragment!()
    );
}

impl PaginatedOperation for PullRequestsQuery {
    type Node = PullRequestNode;

    fn into_page(data: PullRequestsData) -> Connection<PullRequestNode> {
        data.viewer.pull_requests
    }
}

pub struct ReviewRequestsQuery;

impl GraphQlOperation for ReviewRequestsQuery {
    type Variables = NoVariables;
    type Data = ReviewRequestsData;

    const NAME: &'static str = "ReviewRequests";
    const QUERY: &'static str = concat!(
        r#"
query ReviewRequests {
  search(query: "is:pr is:open review-requested:@me", type: ISSUE, first: 20) {
    nodes {
      ...PullRequestFields
    }
  }
}
"#,
        pull_request_fragment!()
    );
}

pub struct RepositoryDetailQuery;

impl GraphQlOperation for RepositoryDetailQuery {
    type Variables = RepositoryVariables;
    type Data = RepositoryDetailData;

    const NAME: &'static str = "RepositoryDetail";
    const QUERY: &'static str = r#"
query RepositoryDetail($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    id
    name
    nameWithOwner
    description
    url
    stargazerCount
    forkCount
    watchers {
      totalCount
    }
    issues(states: OPEN) {
      totalCount
    }
    pullRequests(states: OPEN) {
      totalCount
    }
    primaryLanguage {
      name
      color
    }
    languages(first: 10, orderBy: {field: SIZE, direction: DESC}) {
      edges {
        size
        node {
          name
          color
        }
      }
    }
    defaultBranchRef {
      name
      target {
        ... on Commit {
          history(first: 30) {
            nodes {
              oid
              message
              committedDate
              author {
                name
                email
                user {
                  login
                  avatarUrl
                }
              }
              additions
              deletions
            }
          }
        }
      }
    }
    refs(first: 5, refPrefix: "refs/heads/", orderBy: {field: ALPHABETICAL, direction: ASC}) {
      nodes {
        name
        target {
          ... on Commit {
            oid
          }
        }
      }
    }
    collaborators(first: 10) {
      nodes {
        login
        avatarUrl
      }
    }
    createdAt
    updatedAt
    pushedAt
    isPrivate
    isFork
    owner {
      login
      avatarUrl
    }
  }
}
"#;
}

pub struct ContributionActivityQuery;

impl GraphQlOperation for ContributionActivityQuery {
    type Variables = DateRangeVariables;
    type Data = ContributionActivityData;

    const NAME: &'static str = "ContributionActivity";
    const QUERY: &'static str = r#"
query ContributionActivity($from: DateTime!, $to: DateTime!) {
  viewer {
    contributionsCollection(from: $from, to: $to) {
      contributionCalendar {
        totalContributions
        weeks {
          contributionDays {
            contributionCount
            date
            color
          }
        }
      }
      totalCommitContributions
      totalIssueContributions
      totalPullRequestContributions
      totalPullRequestReviewContributions
      commitContributionsByRepository(maxRepositories: 10) {
        repository {
          name
          nameWithOwner
          owner {
            login
          }
        }
        contributions(first: 100) {
          nodes {
            occurredAt
            commitCount
          }
        }
      }
    }
  }
}
"#;
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ViewerData {
    pub viewer: UserNode,
}

#[derive(Debug, Deserialize)]
pub struct RepositoriesData {
    pub viewer: ViewerRepositories,
}

#[derive(Debug, Deserialize)]
pub struct ViewerRepositories {
    pub repositories: Connection<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestsData {
    pub viewer: ViewerPullRequests,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerPullRequests {
    pub pull_requests: Connection<PullRequestNode>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequestsData {
    pub search: SearchResults,
}

#[derive(Debug, Deserialize)]
pub struct SearchResults {
    pub nodes: Vec<SearchNode>,
}

/// A search hit. Hits that are not pull requests come back as empty
/// objects (or `null`); anything else must decode as a full pull request.
#[derive(Debug)]
pub struct SearchNode(Option<Box<PullRequestNode>>);

impl<'de> Deserialize<'de> for SearchNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match &value {
            Value::Null => return Ok(Self(None)),
            Value::Object(fields) if fields.is_empty() => return Ok(Self(None)),
            _ => {}
        }
        PullRequestNode::deserialize(value)
            .map(|pr| Self(Some(Box::new(pr))))
            .map_err(serde::de::Error::custom)
    }
}

impl ReviewRequestsData {
    pub fn into_pull_requests(self) -> Vec<PullRequest> {
        self.search
            .nodes
            .into_iter()
            .filter_map(|node| node.0)
            .map(|pr| PullRequest::from(*pr))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct RepositoryDetailData {
    pub repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
pub struct ContributionActivityData {
    pub viewer: ViewerContributions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerContributions {
    pub contributions_collection: ContributionsNode,
}

// ---------------------------------------------------------------------------
// Wire nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct NodeList<N> {
    pub nodes: Vec<N>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalCount {
    pub total_count: u32,
}

#[derive(Debug, Deserialize)]
pub struct LoginNode {
    pub login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountNode {
    pub login: String,
    pub avatar_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNode {
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: String,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub url: String,
    pub status: Option<StatusNode>,
    pub contributions_collection: Option<ContributionsNode>,
}

#[derive(Debug, Deserialize)]
pub struct StatusNode {
    pub message: Option<String>,
    pub emoji: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionsNode {
    pub contribution_calendar: Option<CalendarNode>,
    pub total_commit_contributions: u32,
    pub total_issue_contributions: u32,
    pub total_pull_request_contributions: u32,
    pub total_pull_request_review_contributions: u32,
    pub commit_contributions_by_repository: Option<Vec<RepositoryContributionNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarNode {
    pub total_contributions: u32,
    pub weeks: Vec<WeekNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekNode {
    pub contribution_days: Vec<DayNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayNode {
    pub contribution_count: u32,
    pub date: String,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryContributionNode {
    pub repository: RepositoryRefNode,
    pub contributions: NodeList<CommitContributionNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRefNode {
    pub name: String,
    pub name_with_owner: String,
    pub owner: LoginNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitContributionNode {
    pub occurred_at: DateTime<Utc>,
    pub commit_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryNode {
    pub id: String,
    pub name: String,
    pub name_with_owner: String,
    pub description: Option<String>,
    pub url: String,
    pub stargazer_count: u32,
    pub fork_count: u32,
    pub primary_language: Option<LanguageNode>,
    pub languages: Option<LanguageConnection>,
    pub updated_at: DateTime<Utc>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub is_private: bool,
    pub is_fork: bool,
    pub owner: AccountNode,
    pub watchers: Option<TotalCount>,
    pub issues: Option<TotalCount>,
    pub pull_requests: Option<TotalCount>,
    pub default_branch_ref: Option<BranchRefNode>,
    pub refs: Option<NodeList<RefNode>>,
    pub collaborators: Option<NodeList<AccountNode>>,
}

#[derive(Debug, Deserialize)]
pub struct LanguageNode {
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LanguageConnection {
    pub edges: Vec<LanguageEdge>,
}

#[derive(Debug, Deserialize)]
pub struct LanguageEdge {
    pub size: u64,
    pub node: LanguageNode,
}

#[derive(Debug, Deserialize)]
pub struct BranchRefNode {
    pub name: Option<String>,
    pub target: Option<CommitHistoryTarget>,
}

#[derive(Debug, Deserialize)]
pub struct CommitHistoryTarget {
    pub history: Option<NodeList<CommitNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitNode {
    pub oid: String,
    pub message: String,
    pub committed_date: DateTime<Utc>,
    pub author: Option<CommitAuthorNode>,
    pub additions: u32,
    pub deletions: u32,
}

#[derive(Debug, Deserialize)]
pub struct CommitAuthorNode {
    pub name: Option<String>,
    pub email: Option<String>,
    pub user: Option<AccountNode>,
}

#[derive(Debug, Deserialize)]
pub struct RefNode {
    pub name: String,
    pub target: Option<OidNode>,
}

#[derive(Debug, Deserialize)]
pub struct OidNode {
    pub oid: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestNode {
    pub id: String,
    pub title: String,
    pub number: u32,
    pub url: String,
    pub state: PullRequestState,
    pub is_draft: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub additions: u32,
    pub deletions: u32,
    pub repository: RepositoryRefNode,
    pub author: Option<AccountNode>,
    pub review_decision: Option<ReviewDecision>,
    pub reviews: Option<NodeList<ReviewNode>>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewNode {
    pub author: Option<LoginNode>,
    pub state: ReviewState,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<AccountNode> for RepositoryOwner {
    fn from(node: AccountNode) -> Self {
        RepositoryOwner {
            login: node.login,
            avatar_url: node.avatar_url,
        }
    }
}

impl From<UserNode> for User {
    fn from(node: UserNode) -> Self {
        User {
            login: node.login,
            name: node.name,
            email: node.email,
            avatar_url: node.avatar_url,
            bio: node.bio,
            company: node.company,
            location: node.location,
            url: node.url,
            status: node.status.map(|s| UserStatus {
                message: s.message,
                emoji: s.emoji,
            }),
            contributions: node.contributions_collection.map(ContributionsCollection::from),
        }
    }
}

impl From<ContributionsNode> for ContributionsCollection {
    fn from(node: ContributionsNode) -> Self {
        ContributionsCollection {
            total_commit_contributions: node.total_commit_contributions,
            total_issue_contributions: node.total_issue_contributions,
            total_pull_request_contributions: node.total_pull_request_contributions,
            total_pull_request_review_contributions: node.total_pull_request_review_contributions,
            calendar: node.contribution_calendar.map(ContributionCalendar::from),
            commits_by_repository: node.commit_contributions_by_repository.map(|repos| {
                repos
                    .into_iter()
                    .map(|entry| RepositoryContribution {
                        repository: RepositoryRef::from(entry.repository),
                        contributions: entry
                            .contributions
                            .nodes
                            .into_iter()
                            .map(|c| CommitContribution {
                                occurred_at: c.occurred_at,
                                commit_count: c.commit_count,
                            })
                            .collect(),
                    })
                    .collect()
            }),
        }
    }
}

impl From<CalendarNode> for ContributionCalendar {
    fn from(node: CalendarNode) -> Self {
        ContributionCalendar {
            total_contributions: node.total_contributions,
            weeks: node
                .weeks
                .into_iter()
                .map(|week| ContributionWeek {
                    days: week
                        .contribution_days
                        .into_iter()
                        .map(|day| ContributionDay {
                            count: day.contribution_count,
                            date: day.date,
                            color: day.color,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl From<RepositoryRefNode> for RepositoryRef {
    fn from(node: RepositoryRefNode) -> Self {
        RepositoryRef {
            name: node.name,
            name_with_owner: node.name_with_owner,
            owner_login: node.owner.login,
        }
    }
}

impl From<RepositoryNode> for Repository {
    fn from(node: RepositoryNode) -> Self {
        let (default_branch, commits) = match node.default_branch_ref {
            Some(branch) => {
                let commits = branch
                    .target
                    .and_then(|target| target.history)
                    .map(|history| history.nodes.into_iter().map(Commit::from).collect());
                (branch.name, commits)
            }
            None => (None, None),
        };

        Repository {
            id: node.id,
            name: node.name,
            name_with_owner: node.name_with_owner,
            description: node.description,
            url: node.url,
            stargazer_count: node.stargazer_count,
            fork_count: node.fork_count,
            primary_language: node.primary_language.map(Language::from),
            languages: node.languages.map(|langs| {
                langs
                    .edges
                    .into_iter()
                    .map(|edge| LanguageSize {
                        language: Language::from(edge.node),
                        size: edge.size,
                    })
                    .collect()
            }),
            updated_at: node.updated_at,
            pushed_at: node.pushed_at,
            created_at: node.created_at,
            is_private: node.is_private,
            is_fork: node.is_fork,
            owner: RepositoryOwner::from(node.owner),
            watcher_count: node.watchers.map(|w| w.total_count),
            open_issue_count: node.issues.map(|i| i.total_count),
            open_pull_request_count: node.pull_requests.map(|p| p.total_count),
            default_branch,
            commits,
            branches: node.refs.map(|refs| {
                refs.nodes
                    .into_iter()
                    .map(|r| Branch {
                        name: r.name,
                        head_oid: r.target.and_then(|t| t.oid),
                    })
                    .collect()
            }),
            collaborators: node.collaborators.map(|c| {
                c.nodes
                    .into_iter()
                    .map(|account| Collaborator {
                        login: account.login,
                        avatar_url: account.avatar_url,
                    })
                    .collect()
            }),
        }
    }
}

impl From<LanguageNode> for Language {
    fn from(node: LanguageNode) -> Self {
        Language {
            name: node.name,
            color: node.color,
        }
    }
}

impl From<CommitNode> for Commit {
    fn from(node: CommitNode) -> Self {
        let author = match node.author {
            Some(author) => CommitAuthor {
                name: author.name,
                email: author.email,
                user: author.user.map(RepositoryOwner::from),
            },
            None => CommitAuthor {
                name: None,
                email: None,
                user: None,
            },
        };
        Commit {
            oid: node.oid,
            message: node.message,
            committed_date: node.committed_date,
            author,
            additions: node.additions,
            deletions: node.deletions,
        }
    }
}

impl From<PullRequestNode> for PullRequest {
    fn from(node: PullRequestNode) -> Self {
        let author = node
            .author
            .map(|a| PullRequestAuthor {
                login: a.login,
                avatar_url: a.avatar_url,
            })
            .unwrap_or_else(|| PullRequestAuthor {
                login: GHOST_LOGIN.to_string(),
                avatar_url: String::new(),
            });

        PullRequest {
            id: node.id,
            title: node.title,
            number: node.number,
            url: node.url,
            state: node.state,
            is_draft: node.is_draft,
            created_at: node.created_at,
            updated_at: node.updated_at,
            merged_at: node.merged_at,
            closed_at: node.closed_at,
            additions: node.additions,
            deletions: node.deletions,
            repository: PullRequestRepository {
                name: node.repository.name,
                name_with_owner: node.repository.name_with_owner,
                owner_login: node.repository.owner.login,
            },
            author,
            review_decision: node.review_decision,
            reviews: node.reviews.map(|reviews| {
                reviews
                    .nodes
                    .into_iter()
                    .filter_map(|review| {
                        review.author.map(|author| Review {
                            reviewer_login: author.login,
                            state: review.state,
                        })
                    })
                    .collect()
            }),
        }
    }
}
