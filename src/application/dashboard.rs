use super::sync_engine::SyncEngine;
use crate::domain::Dashboard;
use crate::error::Result;
use tracing::instrument;

/// Load the user, repositories, pull requests and review requests concurrently.
///
/// Fails as soon as any of the four fails. Siblings that already committed
/// their cache writes keep them.
#[instrument(skip(engine), fields(account = %engine.session().account))]
pub async fn load_dashboard(engine: &SyncEngine, force_refresh: bool) -> Result<Dashboard> {
    let (user, repositories, pull_requests, review_requests) = tokio::try_join!(
        engine.fetch_user(force_refresh),
        engine.fetch_repositories(force_refresh),
        engine.fetch_pull_requests(force_refresh),
        engine.fetch_review_requests(),
    )?;

    Ok(Dashboard {
        user: user.into_data(),
        repositories: repositories.into_data(),
        pull_requests: pull_requests.into_data(),
        review_requests,
    })
}
