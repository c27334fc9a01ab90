use crate::domain::{ContributionsCollection, PullRequest, Repository, User};
use crate::error::{Error, Result};
use crate::infrastructure::graphql::{
    ContributionActivityQuery, CursorVariables, DateRangeVariables, NoVariables,
    PaginatedOperation, PullRequestsQuery, RepositoriesQuery, RepositoryDetailQuery,
    RepositoryVariables, ReviewRequestsQuery, ViewerQuery,
};
use crate::infrastructure::{ApiError, Cache, CacheBatch, Cached, CredentialStore, GitHubClient};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// The account every sync call acts for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub account: String,
}

impl Session {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }
}

/// Where a synced value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Origin {
    Cache { cached_at: DateTime<Utc> },
    Remote { fetched_at: DateTime<Utc> },
}

/// A fetched value tagged with its origin. Cache-derived values lack fields
/// the cache does not persist (reviews, repository details, per-repository
/// commit breakdowns), so callers can tell the two apart.
#[derive(Debug, Clone, Serialize)]
pub struct Synced<T> {
    pub data: T,
    pub origin: Origin,
}

impl<T> Synced<T> {
    fn cached(data: T, cached_at: DateTime<Utc>) -> Self {
        Self {
            data,
            origin: Origin::Cache { cached_at },
        }
    }

    fn remote(data: T, fetched_at: DateTime<Utc>) -> Self {
        Self {
            data,
            origin: Origin::Remote { fetched_at },
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self.origin, Origin::Cache { .. })
    }

    pub fn into_data(self) -> T {
        self.data
    }
}

/// Fetch-or-refresh orchestration over the API client, cache and credentials.
///
/// Gated fetches (user, repositories, pull requests) serve fresh cache hits
/// without a token lookup or network call; everything else is live.
pub struct SyncEngine {
    api: GitHubClient,
    cache: Arc<Cache>,
    credentials: Arc<dyn CredentialStore>,
    session: Session,
}

impl SyncEngine {
    pub fn new(
        api: GitHubClient,
        cache: Arc<Cache>,
        credentials: Arc<dyn CredentialStore>,
        session: Session,
    ) -> Self {
        Self {
            api,
            cache,
            credentials,
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    #[instrument(skip(self), fields(account = %self.session.account))]
    pub async fn fetch_user(&self, force_refresh: bool) -> Result<Synced<User>> {
        if !force_refresh {
            if let Some(cached) = self.cache.find_user(&self.session.account)? {
                if cached.is_fresh_at(Utc::now()) {
                    debug!(cached_at = %cached.cached_at, "serving user from cache");
                    return Ok(Synced::cached(cached.record, cached.cached_at));
                }
            }
        }

        let token = self.token().await?;
        let data = self.api.query::<ViewerQuery>(&NoVariables {}, &token).await?;
        let user = User::from(data.viewer);

        let fetched_at = Utc::now();
        self.cache
            .commit(&CacheBatch::new(&self.session.account, fetched_at).with_user(&user))?;
        info!(login = %user.login, "refreshed user");
        Ok(Synced::remote(user, fetched_at))
    }

    #[instrument(skip(self), fields(account = %self.session.account))]
    pub async fn fetch_repositories(&self, force_refresh: bool) -> Result<Synced<Vec<Repository>>> {
        if !force_refresh {
            let cached = self.cache.repositories_by_recency(&self.session.account)?;
            if let Some(hit) = fresh_collection(cached, Utc::now()) {
                debug!(count = hit.data.len(), "serving repositories from cache");
                return Ok(hit);
            }
        }

        let token = self.token().await?;
        let repositories: Vec<Repository> = self
            .paginate::<RepositoriesQuery>(&token)
            .await?
            .into_iter()
            .map(Repository::from)
            .collect();

        let fetched_at = Utc::now();
        self.cache.commit(
            &CacheBatch::new(&self.session.account, fetched_at).with_repositories(&repositories),
        )?;
        info!(count = repositories.len(), "refreshed repositories");
        Ok(Synced::remote(repositories, fetched_at))
    }

    #[instrument(skip(self), fields(account = %self.session.account))]
    pub async fn fetch_pull_requests(
        &self,
        force_refresh: bool,
    ) -> Result<Synced<Vec<PullRequest>>> {
        if !force_refresh {
            let cached = self.cache.pull_requests_by_recency(&self.session.account)?;
            if let Some(hit) = fresh_collection(cached, Utc::now()) {
                debug!(count = hit.data.len(), "serving pull requests from cache");
                return Ok(hit);
            }
        }

        let token = self.token().await?;
        let pull_requests: Vec<PullRequest> = self
            .paginate::<PullRequestsQuery>(&token)
            .await?
            .into_iter()
            .map(PullRequest::from)
            .collect();

        let fetched_at = Utc::now();
        self.cache.commit(
            &CacheBatch::new(&self.session.account, fetched_at)
                .with_pull_requests(&pull_requests),
        )?;
        info!(count = pull_requests.len(), "refreshed pull requests");
        Ok(Synced::remote(pull_requests, fetched_at))
    }

    /// Open pull requests awaiting the viewer's review. Always live.
    #[instrument(skip(self), fields(account = %self.session.account))]
    pub async fn fetch_review_requests(&self) -> Result<Vec<PullRequest>> {
        let token = self.token().await?;
        let data = self
            .api
            .query::<ReviewRequestsQuery>(&NoVariables {}, &token)
            .await?;
        Ok(data.into_pull_requests())
    }

    /// One repository with its detail-only fields loaded. Always live.
    #[instrument(skip(self), fields(account = %self.session.account))]
    pub async fn fetch_repository_details(&self, owner: &str, name: &str) -> Result<Repository> {
        let token = self.token().await?;
        let variables = RepositoryVariables {
            owner: owner.to_string(),
            name: name.to_string(),
        };
        let data = self
            .api
            .query::<RepositoryDetailQuery>(&variables, &token)
            .await?;
        let node = data.repository.ok_or(ApiError::NotFound)?;
        Ok(Repository::from(node))
    }

    /// Contributions between `from` and `to`, with the per-repository
    /// commit breakdown. Always live.
    #[instrument(skip(self), fields(account = %self.session.account))]
    pub async fn fetch_contribution_activity(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ContributionsCollection> {
        let token = self.token().await?;
        let data = self
            .api
            .query::<ContributionActivityQuery>(&DateRangeVariables { from, to }, &token)
            .await?;
        Ok(ContributionsCollection::from(
            data.viewer.contributions_collection,
        ))
    }

    async fn token(&self) -> Result<String> {
        Ok(self.credentials.retrieve(&self.session.account).await?)
    }

    /// Walk a connection to the end. Pages are requested strictly in cursor
    /// order and nothing is returned unless every page succeeds.
    async fn paginate<Q: PaginatedOperation>(&self, token: &str) -> Result<Vec<Q::Node>> {
        let mut nodes = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen = HashSet::new();

        loop {
            let variables = CursorVariables {
                cursor: cursor.clone(),
            };
            let page = Q::into_page(self.api.query::<Q>(&variables, token).await?);
            debug!(
                operation = Q::NAME,
                page = seen.len() + 1,
                nodes = page.nodes.len(),
                "fetched page"
            );
            nodes.extend(page.nodes);

            if !page.page_info.has_next_page {
                return Ok(nodes);
            }
            match page.page_info.end_cursor {
                Some(next) if seen.insert(next.clone()) => cursor = Some(next),
                stalled => return Err(Error::PaginationStalled { cursor: stalled }),
            }
        }
    }
}

/// Serve a cached collection when its most recently updated record was
/// cached inside the freshness window
fn fresh_collection<T>(cached: Vec<Cached<T>>, now: DateTime<Utc>) -> Option<Synced<Vec<T>>> {
    let newest = cached.first()?;
    if !newest.is_fresh_at(now) {
        return None;
    }
    let cached_at = newest.cached_at;
    Some(Synced::cached(
        cached.into_iter().map(|c| c.record).collect(),
        cached_at,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pull_request::tests::pull_request;
    use crate::domain::repo::tests::repository;
    use crate::infrastructure::{CredentialError, MemoryCredentialStore};
    use chrono::{TimeDelta, TimeZone};
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::{json, Value};

    fn engine_with(server: &ServerGuard, credentials: MemoryCredentialStore) -> SyncEngine {
        SyncEngine::new(
            GitHubClient::new(server.url()).unwrap(),
            Arc::new(Cache::open_in_memory().unwrap()),
            Arc::new(credentials),
            Session::new("octocat"),
        )
    }

    fn engine(server: &ServerGuard) -> SyncEngine {
        engine_with(server, MemoryCredentialStore::with_token("octocat", "t"))
    }

    fn repository_node(id: &str) -> Value {
        json!({
            "id": id, "name": id, "nameWithOwner": format!("octocat/{id}"),
            "description": null, "url": format!("https://github.com/octocat/{id}"),
            "stargazerCount": 1, "forkCount": 0, "primaryLanguage": null,
            "updatedAt": "2026-01-01T00:00:00Z", "pushedAt": null, "createdAt": null,
            "isPrivate": false, "isFork": false,
            "owner": {"login": "octocat", "avatarUrl": "https://a"}
        })
    }

    fn repositories_page(ids: &[&str], next: Option<&str>) -> String {
        json!({"data": {"viewer": {"repositories": {
            "pageInfo": {"hasNextPage": next.is_some(), "endCursor": next},
            "nodes": ids.iter().map(|id| repository_node(id)).collect::<Vec<_>>()
        }}}})
        .to_string()
    }

    fn pull_request_node(id: &str) -> Value {
        json!({
            "id": id, "title": "Fix", "number": 1, "url": "u", "state": "OPEN",
            "isDraft": false, "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-02T00:00:00Z", "mergedAt": null, "closedAt": null,
            "additions": 1, "deletions": 1,
            "repository": {"name": "r", "nameWithOwner": "octocat/r", "owner": {"login": "octocat"}},
            "author": {"login": "octocat", "avatarUrl": "https://a"},
            "reviewDecision": null,
            "reviews": {"nodes": [{"author": {"login": "hubot"}, "state": "APPROVED"}]}
        })
    }

    fn viewer_body() -> String {
        json!({"data": {"viewer": {
            "login": "octocat", "name": null, "email": null, "avatarUrl": "https://a",
            "bio": null, "company": null, "location": null, "url": "https://github.com/octocat",
            "status": null,
            "contributionsCollection": {
                "contributionCalendar": {"totalContributions": 3, "weeks": [
                    {"contributionDays": [
                        {"contributionCount": 1, "date": "2026-01-01", "color": "#9be9a8"},
                        {"contributionCount": 2, "date": "2026-01-02", "color": "#40c463"}
                    ]}
                ]},
                "totalCommitContributions": 3, "totalIssueContributions": 0,
                "totalPullRequestContributions": 0, "totalPullRequestReviewContributions": 0
            }
        }}})
        .to_string()
    }

    fn first_page() -> Matcher {
        Matcher::Regex(r#""variables":\{\}"#.to_string())
    }

    fn page_after(cursor: &str) -> Matcher {
        Matcher::Regex(format!(r#""cursor":"{cursor}""#))
    }

    fn seed_repositories(engine: &SyncEngine, age: TimeDelta) {
        let repos = vec![repository("R_cached")];
        engine
            .cache()
            .commit(&CacheBatch::new("octocat", Utc::now() - age).with_repositories(&repos))
            .unwrap();
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_network_and_token() {
        let mut server = Server::new_async().await;
        let mock = server.mock("POST", "/graphql").expect(0).create_async().await;
        // no token stored: a fresh hit must not need one
        let engine = engine_with(&server, MemoryCredentialStore::new());
        seed_repositories(&engine, TimeDelta::seconds(899));

        let synced = engine.fetch_repositories(false).await.unwrap();

        assert!(synced.is_cached());
        assert_eq!(synced.data[0].id, "R_cached");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stale_cache_fetches() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_body(first_page())
            .with_status(200)
            .with_body(repositories_page(&["R_remote"], None))
            .expect(1)
            .create_async()
            .await;
        let engine = engine(&server);
        seed_repositories(&engine, TimeDelta::seconds(901));

        let synced = engine.fetch_repositories(false).await.unwrap();

        assert!(!synced.is_cached());
        assert_eq!(synced.data.len(), 1);
        assert_eq!(synced.data[0].id, "R_remote");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forced_refresh_bypasses_fresh_cache() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(repositories_page(&["R_cached"], None))
            .expect(1)
            .create_async()
            .await;
        let engine = engine(&server);
        seed_repositories(&engine, TimeDelta::seconds(10));
        let before = engine.cache().find_repository("octocat", "R_cached").unwrap().unwrap();

        let synced = engine.fetch_repositories(true).await.unwrap();

        assert!(!synced.is_cached());
        let after = engine.cache().find_repository("octocat", "R_cached").unwrap().unwrap();
        assert!(after.cached_at > before.cached_at);
        assert_eq!(after.record.stargazer_count, 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(repositories_page(&["R_1"], None))
            .expect(2)
            .create_async()
            .await;
        let engine = engine(&server);

        engine.fetch_repositories(true).await.unwrap();
        let first = engine.cache().find_repository("octocat", "R_1").unwrap().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        engine.fetch_repositories(true).await.unwrap();
        let second = engine.cache().find_repository("octocat", "R_1").unwrap().unwrap();

        assert_eq!(engine.cache().stats().unwrap().repository_count, 1);
        assert!(second.cached_at > first.cached_at);
    }

    #[tokio::test]
    async fn test_pagination_follows_cursors_in_order() {
        let mut server = Server::new_async().await;
        let page1 = server
            .mock("POST", "/graphql")
            .match_body(first_page())
            .with_status(200)
            .with_body(repositories_page(&["R_1", "R_2"], Some("c1")))
            .expect(1)
            .create_async()
            .await;
        let page2 = server
            .mock("POST", "/graphql")
            .match_body(page_after("c1"))
            .with_status(200)
            .with_body(repositories_page(&["R_3"], Some("c2")))
            .expect(1)
            .create_async()
            .await;
        let page3 = server
            .mock("POST", "/graphql")
            .match_body(page_after("c2"))
            .with_status(200)
            .with_body(repositories_page(&["R_4"], None))
            .expect(1)
            .create_async()
            .await;
        let engine = engine(&server);

        let synced = engine.fetch_repositories(true).await.unwrap();

        let ids: Vec<_> = synced.data.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["R_1", "R_2", "R_3", "R_4"]);
        page1.assert_async().await;
        page2.assert_async().await;
        page3.assert_async().await;
        assert_eq!(engine.cache().stats().unwrap().repository_count, 4);
    }

    #[tokio::test]
    async fn test_repeated_cursor_is_an_error() {
        let mut server = Server::new_async().await;
        let _first = server
            .mock("POST", "/graphql")
            .match_body(first_page())
            .with_status(200)
            .with_body(repositories_page(&["R_1"], Some("c1")))
            .create_async()
            .await;
        let _again = server
            .mock("POST", "/graphql")
            .match_body(page_after("c1"))
            .with_status(200)
            .with_body(repositories_page(&["R_2"], Some("c1")))
            .expect(1)
            .create_async()
            .await;
        let engine = engine(&server);

        let err = engine.fetch_repositories(true).await.unwrap_err();

        assert!(matches!(
            err,
            Error::PaginationStalled { cursor: Some(ref c) } if c == "c1"
        ));
        assert_eq!(engine.cache().stats().unwrap().repository_count, 0);
    }

    #[tokio::test]
    async fn test_failed_page_discards_earlier_pages() {
        let mut server = Server::new_async().await;
        let _first = server
            .mock("POST", "/graphql")
            .match_body(first_page())
            .with_status(200)
            .with_body(repositories_page(&["R_1"], Some("c1")))
            .create_async()
            .await;
        let _second = server
            .mock("POST", "/graphql")
            .match_body(page_after("c1"))
            .with_status(502)
            .create_async()
            .await;
        let engine = engine(&server);

        let err = engine.fetch_repositories(true).await.unwrap_err();

        assert!(matches!(err, Error::Api(ApiError::ServerError { status: 502 })));
        assert_eq!(engine.cache().stats().unwrap().repository_count, 0);
    }

    #[tokio::test]
    async fn test_graphql_errors_abort_despite_data() {
        let mut server = Server::new_async().await;
        let body = json!({
            "data": {"viewer": {"pullRequests": {
                "pageInfo": {"hasNextPage": false, "endCursor": null},
                "nodes": [pull_request_node("PR_1")]
            }}},
            "errors": [{"message": "Resource not accessible by integration"}]
        });
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;
        let engine = engine(&server);

        let err = engine.fetch_pull_requests(true).await.unwrap_err();

        match err {
            Error::Api(ApiError::GraphQl(messages)) => {
                assert_eq!(messages, ["Resource not accessible by integration"])
            }
            other => panic!("expected GraphQL error, got {other:?}"),
        }
        assert_eq!(engine.cache().stats().unwrap().pull_request_count, 0);
    }

    #[tokio::test]
    async fn test_graphql_errors_win_over_partial_data_that_does_not_decode() {
        let mut server = Server::new_async().await;
        let body = json!({
            "data": {"viewer": {"pullRequests": {
                "pageInfo": {"hasNextPage": false, "endCursor": null},
                "nodes": [null]
            }}},
            "errors": [{"message": "Something went wrong while executing your query"}]
        });
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;
        let engine = engine(&server);

        let err = engine.fetch_pull_requests(true).await.unwrap_err();

        assert!(
            matches!(&err, Error::Api(ApiError::GraphQl(messages)) if messages.len() == 1),
            "expected GraphQL error, got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_remote_pull_requests_keep_reviews() {
        let mut server = Server::new_async().await;
        let body = json!({"data": {"viewer": {"pullRequests": {
            "pageInfo": {"hasNextPage": false, "endCursor": null},
            "nodes": [pull_request_node("PR_1")]
        }}}});
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(body.to_string())
            .expect(1)
            .create_async()
            .await;
        let engine = engine(&server);

        let remote = engine.fetch_pull_requests(false).await.unwrap();
        assert_eq!(remote.data[0].reviewer_count(), 1);

        // second call is served by the cache, which does not keep reviews
        let cached = engine.fetch_pull_requests(false).await.unwrap();
        assert!(cached.is_cached());
        assert!(cached.data[0].reviews.is_none());
    }

    #[tokio::test]
    async fn test_missing_token_fails_stale_fetch() {
        let mut server = Server::new_async().await;
        let mock = server.mock("POST", "/graphql").expect(0).create_async().await;
        let engine = engine_with(&server, MemoryCredentialStore::new());

        let err = engine.fetch_user(false).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Credential(CredentialError::NotFound { .. })
        ));
        assert!(err.requires_reauthentication());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_user_caches_calendar() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_header("authorization", "Bearer t")
            .with_status(200)
            .with_body(viewer_body())
            .expect(1)
            .create_async()
            .await;
        let engine = engine(&server);

        let remote = engine.fetch_user(false).await.unwrap();
        let cached = engine.fetch_user(false).await.unwrap();

        assert!(!remote.is_cached());
        assert!(cached.is_cached());
        assert_eq!(cached.data, remote.data);
        let calendar = cached.data.contributions.unwrap().calendar.unwrap();
        assert_eq!(calendar.current_streak(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_pull_requests_fresh_check_uses_newest_record() {
        let mut server = Server::new_async().await;
        let mock = server.mock("POST", "/graphql").expect(0).create_async().await;
        let engine = engine(&server);

        let mut newest = pull_request("PR_new");
        newest.updated_at = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let older = pull_request("PR_old");
        let now = Utc::now();
        engine
            .cache()
            .commit(&CacheBatch::new("octocat", now - TimeDelta::hours(2)).with_pull_requests(&[older]))
            .unwrap();
        engine
            .cache()
            .commit(&CacheBatch::new("octocat", now - TimeDelta::seconds(60)).with_pull_requests(&[newest]))
            .unwrap();

        let synced = engine.fetch_pull_requests(false).await.unwrap();

        assert!(synced.is_cached());
        assert_eq!(synced.data.len(), 2);
        assert_eq!(synced.data[0].id, "PR_new");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_review_requests_are_live() {
        let mut server = Server::new_async().await;
        let body = json!({"data": {"search": {"nodes": [pull_request_node("PR_9"), {}]}}});
        let mock = server
            .mock("POST", "/graphql")
            .match_body(Matcher::Regex("review-requested:@me".to_string()))
            .with_status(200)
            .with_body(body.to_string())
            .expect(2)
            .create_async()
            .await;
        let engine = engine(&server);

        assert_eq!(engine.fetch_review_requests().await.unwrap().len(), 1);
        assert_eq!(engine.fetch_review_requests().await.unwrap()[0].id, "PR_9");
        assert_eq!(engine.cache().stats().unwrap().pull_request_count, 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_review_request_fails_the_fetch() {
        let mut server = Server::new_async().await;
        let mut broken = pull_request_node("PR_9");
        broken.as_object_mut().unwrap().remove("number");
        let body = json!({"data": {"search": {"nodes": [pull_request_node("PR_1"), broken]}}});
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;
        let engine = engine(&server);

        match engine.fetch_review_requests().await.unwrap_err() {
            Error::Api(ApiError::DecodingFailed(detail)) => {
                assert!(detail.contains("nodes"), "{detail}");
                assert!(detail.contains("number"), "{detail}");
            }
            other => panic!("expected DecodingFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_repository_details_missing_repository() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJsonString(
                r#"{"variables":{"owner":"octocat","name":"gone"}}"#.to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"data":{"repository":null}}"#)
            .create_async()
            .await;
        let engine = engine(&server);

        let err = engine
            .fetch_repository_details("octocat", "gone")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn test_contribution_activity_sends_date_range() {
        let mut server = Server::new_async().await;
        let body = json!({"data": {"viewer": {"contributionsCollection": {
            "contributionCalendar": null,
            "totalCommitContributions": 12, "totalIssueContributions": 1,
            "totalPullRequestContributions": 2, "totalPullRequestReviewContributions": 3,
            "commitContributionsByRepository": [{
                "repository": {"name": "r", "nameWithOwner": "octocat/r", "owner": {"login": "octocat"}},
                "contributions": {"nodes": [
                    {"occurredAt": "2026-01-05T00:00:00Z", "commitCount": 4},
                    {"occurredAt": "2026-01-06T00:00:00Z", "commitCount": 8}
                ]}
            }]
        }}}});
        let mock = server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJsonString(
                r#"{"variables":{"from":"2026-01-01T00:00:00Z","to":"2026-02-01T00:00:00Z"}}"#
                    .to_string(),
            ))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;
        let engine = engine(&server);

        let activity = engine
            .fetch_contribution_activity(
                Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(activity.total_contributions(), 18);
        let by_repo = activity.commits_by_repository.unwrap();
        assert_eq!(by_repo[0].commit_count(), 12);
        mock.assert_async().await;
    }
}
