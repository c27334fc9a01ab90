use super::error::CacheError;
use crate::domain::{
    ContributionCalendar, ContributionDay, ContributionWeek, ContributionsCollection, Language,
    PullRequest, PullRequestAuthor, PullRequestRepository, PullRequestState, Repository,
    RepositoryOwner, ReviewDecision, User, UserStatus,
};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Records younger than this are served without touching the network
pub const FRESHNESS_WINDOW: TimeDelta = TimeDelta::seconds(900);

/// Default cache file location under the platform config directory
pub fn cache_path() -> Result<PathBuf, CacheError> {
    let base_dir = dirs::config_dir().ok_or(CacheError::NoConfigDir)?;
    Ok(base_dir.join("devradar").join("cache.db"))
}

/// A cached domain value and the moment it was written
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub record: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> Cached<T> {
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now - self.cached_at < FRESHNESS_WINDOW
    }
}

/// Everything one sync operation writes, committed as a single transaction
#[derive(Debug)]
pub struct CacheBatch<'a> {
    account: &'a str,
    cached_at: DateTime<Utc>,
    user: Option<&'a User>,
    repositories: &'a [Repository],
    pull_requests: &'a [PullRequest],
}

impl<'a> CacheBatch<'a> {
    pub fn new(account: &'a str, cached_at: DateTime<Utc>) -> Self {
        Self {
            account,
            cached_at,
            user: None,
            repositories: &[],
            pull_requests: &[],
        }
    }

    pub fn with_user(mut self, user: &'a User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_repositories(mut self, repositories: &'a [Repository]) -> Self {
        self.repositories = repositories;
        self
    }

    pub fn with_pull_requests(mut self, pull_requests: &'a [PullRequest]) -> Self {
        self.pull_requests = pull_requests;
        self
    }
}

/// SQLite cache of users, repositories, pull requests and contribution calendars.
///
/// Repositories and pull requests are owned by the account that fetched them;
/// the same remote entity may be cached once per account.
pub struct Cache {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Cache {
    /// Open or create the cache at the default location
    pub fn open() -> Result<Self, CacheError> {
        Self::open_at(cache_path()?)
    }

    /// Open or create the cache database at `path`
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let cache = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        cache.init_schema()?;
        debug!(path = %path.display(), "opened cache");
        Ok(cache)
    }

    /// A throwaway cache that lives only as long as this value
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let cache = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        };
        cache.init_schema()?;
        Ok(cache)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-write rolls the transaction back, so the connection stays usable
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn init_schema(&self) -> Result<(), CacheError> {
        let conn = self.conn();
        let exec = |sql: &str| -> Result<(), CacheError> {
            match conn.execute(sql, []) {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::ExecuteReturnedResults) => Ok(()),
                Err(e) => Err(e.into()),
            }
        };

        exec("PRAGMA journal_mode = WAL")?;
        exec("PRAGMA synchronous = NORMAL")?;

        exec("CREATE TABLE IF NOT EXISTS users (
                account TEXT PRIMARY KEY,
                login TEXT NOT NULL,
                name TEXT,
                email TEXT,
                avatar_url TEXT NOT NULL,
                bio TEXT,
                company TEXT,
                location TEXT,
                url TEXT NOT NULL,
                status_message TEXT,
                status_emoji TEXT,
                has_status INTEGER NOT NULL DEFAULT 0,
                has_contributions INTEGER NOT NULL DEFAULT 0,
                total_commit_contributions INTEGER NOT NULL DEFAULT 0,
                total_issue_contributions INTEGER NOT NULL DEFAULT 0,
                total_pull_request_contributions INTEGER NOT NULL DEFAULT 0,
                total_pull_request_review_contributions INTEGER NOT NULL DEFAULT 0,
                cached_at TEXT NOT NULL
            )")?;

        exec("CREATE TABLE IF NOT EXISTS token_accounts (
                fingerprint TEXT PRIMARY KEY,
                account TEXT NOT NULL,
                cached_at TEXT NOT NULL
            )")?;

        exec("CREATE TABLE IF NOT EXISTS contribution_calendars (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account TEXT UNIQUE NOT NULL,
                total_contributions INTEGER NOT NULL,
                cached_at TEXT NOT NULL
            )")?;

        exec("CREATE TABLE IF NOT EXISTS contribution_weeks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                calendar_id INTEGER NOT NULL,
                position INTEGER NOT NULL
            )")?;

        exec("CREATE TABLE IF NOT EXISTS contribution_days (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                week_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                date TEXT NOT NULL,
                count INTEGER NOT NULL,
                color TEXT
            )")?;

        exec("CREATE TABLE IF NOT EXISTS repositories (
                account TEXT NOT NULL,
                id TEXT NOT NULL,
                name TEXT NOT NULL,
                name_with_owner TEXT NOT NULL,
                description TEXT,
                url TEXT NOT NULL,
                stargazer_count INTEGER NOT NULL,
                fork_count INTEGER NOT NULL,
                language_name TEXT,
                language_color TEXT,
                updated_at TEXT NOT NULL,
                pushed_at TEXT,
                created_at TEXT,
                is_private INTEGER NOT NULL,
                is_fork INTEGER NOT NULL,
                owner_login TEXT NOT NULL,
                owner_avatar_url TEXT NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (account, id)
            )")?;

        exec("CREATE TABLE IF NOT EXISTS pull_requests (
                account TEXT NOT NULL,
                id TEXT NOT NULL,
                title TEXT NOT NULL,
                number INTEGER NOT NULL,
                url TEXT NOT NULL,
                state TEXT NOT NULL,
                is_draft INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                merged_at TEXT,
                closed_at TEXT,
                additions INTEGER NOT NULL,
                deletions INTEGER NOT NULL,
                repo_name TEXT NOT NULL,
                repo_name_with_owner TEXT NOT NULL,
                repo_owner_login TEXT NOT NULL,
                author_login TEXT NOT NULL,
                author_avatar_url TEXT NOT NULL,
                review_decision TEXT,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (account, id)
            )")?;

        exec("CREATE INDEX IF NOT EXISTS idx_repositories_recency ON repositories(account, updated_at DESC)")?;
        exec("CREATE INDEX IF NOT EXISTS idx_pull_requests_recency ON pull_requests(account, updated_at DESC)")?;
        exec("CREATE INDEX IF NOT EXISTS idx_weeks_calendar ON contribution_weeks(calendar_id)")?;
        exec("CREATE INDEX IF NOT EXISTS idx_days_week ON contribution_days(week_id)")?;

        Ok(())
    }

    /// Upsert every record in the batch inside one transaction.
    /// Nothing is durable unless the whole batch commits.
    pub fn commit(&self, batch: &CacheBatch<'_>) -> Result<(), CacheError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let scope = Scope {
            account: batch.account,
            cached_at: timestamp(&batch.cached_at),
        };

        if let Some(user) = batch.user {
            upsert(&tx, &scope, user)?;
        }
        for repository in batch.repositories {
            upsert(&tx, &scope, repository)?;
        }
        for pull_request in batch.pull_requests {
            upsert(&tx, &scope, pull_request)?;
        }

        tx.commit()?;
        debug!(
            account = batch.account,
            users = batch.user.is_some() as usize,
            repositories = batch.repositories.len(),
            pull_requests = batch.pull_requests.len(),
            "committed cache batch"
        );
        Ok(())
    }

    /// The user cached for `account`, whatever login the remote reported
    pub fn find_user(&self, account: &str) -> Result<Option<Cached<User>>, CacheError> {
        let conn = self.conn();
        let cached = conn
            .query_row("SELECT * FROM users WHERE account = ?1", [account], user_from_row)
            .optional()?;

        let Some(mut cached) = cached else {
            return Ok(None);
        };
        if let Some(contributions) = cached.record.contributions.as_mut() {
            contributions.calendar = load_calendar(&conn, account)?;
        }
        Ok(Some(cached))
    }

    pub fn find_repository(
        &self,
        account: &str,
        id: &str,
    ) -> Result<Option<Cached<Repository>>, CacheError> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                "SELECT * FROM repositories WHERE account = ?1 AND id = ?2",
                [account, id],
                repository_from_row,
            )
            .optional()?)
    }

    pub fn find_pull_request(
        &self,
        account: &str,
        id: &str,
    ) -> Result<Option<Cached<PullRequest>>, CacheError> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                "SELECT * FROM pull_requests WHERE account = ?1 AND id = ?2",
                [account, id],
                pull_request_from_row,
            )
            .optional()?)
    }

    /// The account's repositories, most recently updated first
    pub fn repositories_by_recency(
        &self,
        account: &str,
    ) -> Result<Vec<Cached<Repository>>, CacheError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM repositories WHERE account = ?1 ORDER BY updated_at DESC",
        )?;
        let rows = stmt
            .query_map([account], repository_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The account's pull requests, most recently updated first
    pub fn pull_requests_by_recency(
        &self,
        account: &str,
    ) -> Result<Vec<Cached<PullRequest>>, CacheError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM pull_requests WHERE account = ?1 ORDER BY updated_at DESC",
        )?;
        let rows = stmt
            .query_map([account], pull_request_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The account a token fingerprint was last resolved to
    pub fn token_account(&self, fingerprint: &str) -> Result<Option<String>, CacheError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT account FROM token_accounts WHERE fingerprint = ?1",
                [fingerprint],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn remember_token_account(
        &self,
        fingerprint: &str,
        account: &str,
    ) -> Result<(), CacheError> {
        self.conn().execute(
            "INSERT INTO token_accounts (fingerprint, account, cached_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(fingerprint) DO UPDATE SET account = ?2, cached_at = ?3",
            params![fingerprint, account, timestamp(&Utc::now())],
        )?;
        Ok(())
    }

    /// Remove a user and everything cached on their behalf
    pub fn delete_user(&self, account: &str) -> Result<(), CacheError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        delete_calendar(&tx, account)?;
        tx.execute("DELETE FROM pull_requests WHERE account = ?1", [account])?;
        tx.execute("DELETE FROM repositories WHERE account = ?1", [account])?;
        tx.execute("DELETE FROM users WHERE account = ?1", [account])?;
        tx.execute("DELETE FROM token_accounts WHERE account = ?1", [account])?;
        tx.commit()?;
        debug!(account, "deleted cached user");
        Ok(())
    }

    /// Clear all data from the cache
    pub fn clear(&self) -> Result<(), CacheError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for table in [
            "contribution_days",
            "contribution_weeks",
            "contribution_calendars",
            "pull_requests",
            "repositories",
            "users",
            "token_accounts",
        ] {
            tx.execute(&format!("DELETE FROM {table}"), [])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Get cache statistics
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let conn = self.conn();
        let count = |table: &str| -> Result<i64, CacheError> {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?)
        };

        let size_bytes = match &self.path {
            Some(path) => std::fs::metadata(path)?.len(),
            None => 0,
        };

        Ok(CacheStats {
            user_count: count("users")?,
            repository_count: count("repositories")?,
            pull_request_count: count("pull_requests")?,
            contribution_day_count: count("contribution_days")?,
            size_bytes,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub user_count: i64,
    pub repository_count: i64,
    pub pull_request_count: i64,
    pub contribution_day_count: i64,
    pub size_bytes: u64,
}

/// Owner and write time shared by every record of a batch
struct Scope<'a> {
    account: &'a str,
    cached_at: String,
}

/// A domain value persisted as one cache record, keyed by its identity
trait CachedEntity {
    fn exists(&self, tx: &Transaction<'_>, scope: &Scope<'_>) -> rusqlite::Result<bool>;
    fn insert(&self, tx: &Transaction<'_>, scope: &Scope<'_>) -> rusqlite::Result<()>;
    fn update(&self, tx: &Transaction<'_>, scope: &Scope<'_>) -> rusqlite::Result<()>;
}

/// Update the existing record in place, or insert a new one
fn upsert<E: CachedEntity>(
    tx: &Transaction<'_>,
    scope: &Scope<'_>,
    entity: &E,
) -> rusqlite::Result<()> {
    if entity.exists(tx, scope)? {
        entity.update(tx, scope)
    } else {
        entity.insert(tx, scope)
    }
}

impl CachedEntity for User {
    fn exists(&self, tx: &Transaction<'_>, scope: &Scope<'_>) -> rusqlite::Result<bool> {
        tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE account = ?1)",
            [scope.account],
            |row| row.get(0),
        )
    }

    fn insert(&self, tx: &Transaction<'_>, scope: &Scope<'_>) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT INTO users (account, login, avatar_url, url, cached_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![scope.account, &self.login, &self.avatar_url, &self.url, &scope.cached_at],
        )?;
        self.update(tx, scope)
    }

    fn update(&self, tx: &Transaction<'_>, scope: &Scope<'_>) -> rusqlite::Result<()> {
        let status = self.status.as_ref();
        tx.execute(
            "UPDATE users SET
                name = ?2, email = ?3, avatar_url = ?4, bio = ?5, company = ?6,
                location = ?7, url = ?8, status_message = ?9, status_emoji = ?10,
                has_status = ?11, cached_at = ?12, login = ?13
             WHERE account = ?1",
            params![
                scope.account,
                &self.name,
                &self.email,
                &self.avatar_url,
                &self.bio,
                &self.company,
                &self.location,
                &self.url,
                status.and_then(|s| s.message.as_deref()),
                status.and_then(|s| s.emoji.as_deref()),
                status.is_some(),
                &scope.cached_at,
                &self.login,
            ],
        )?;

        // A fetch without contribution data leaves the stored counters alone
        if let Some(contributions) = &self.contributions {
            tx.execute(
                "UPDATE users SET
                    has_contributions = 1,
                    total_commit_contributions = ?2,
                    total_issue_contributions = ?3,
                    total_pull_request_contributions = ?4,
                    total_pull_request_review_contributions = ?5
                 WHERE account = ?1",
                params![
                    scope.account,
                    contributions.total_commit_contributions,
                    contributions.total_issue_contributions,
                    contributions.total_pull_request_contributions,
                    contributions.total_pull_request_review_contributions,
                ],
            )?;
            if let Some(calendar) = &contributions.calendar {
                store_calendar(tx, scope.account, calendar, &scope.cached_at)?;
            }
        }
        Ok(())
    }
}

impl CachedEntity for Repository {
    fn exists(&self, tx: &Transaction<'_>, scope: &Scope<'_>) -> rusqlite::Result<bool> {
        tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM repositories WHERE account = ?1 AND id = ?2)",
            params![scope.account, &self.id],
            |row| row.get(0),
        )
    }

    fn insert(&self, tx: &Transaction<'_>, scope: &Scope<'_>) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT INTO repositories (
                account, id, name, name_with_owner, description, url, stargazer_count,
                fork_count, language_name, language_color, updated_at, pushed_at, created_at,
                is_private, is_fork, owner_login, owner_avatar_url, cached_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params_from_iter(self.row_params(scope)),
        )?;
        Ok(())
    }

    fn update(&self, tx: &Transaction<'_>, scope: &Scope<'_>) -> rusqlite::Result<()> {
        tx.execute(
            "UPDATE repositories SET
                name = ?3, name_with_owner = ?4, description = ?5, url = ?6,
                stargazer_count = ?7, fork_count = ?8, language_name = ?9,
                language_color = ?10, updated_at = ?11, pushed_at = ?12, created_at = ?13,
                is_private = ?14, is_fork = ?15, owner_login = ?16, owner_avatar_url = ?17,
                cached_at = ?18
             WHERE account = ?1 AND id = ?2",
            params_from_iter(self.row_params(scope)),
        )?;
        Ok(())
    }
}

impl Repository {
    fn row_params(&self, scope: &Scope<'_>) -> [Box<dyn rusqlite::ToSql>; 18] {
        let language = self.primary_language.as_ref();
        [
            Box::new(scope.account.to_string()),
            Box::new(self.id.clone()),
            Box::new(self.name.clone()),
            Box::new(self.name_with_owner.clone()),
            Box::new(self.description.clone()),
            Box::new(self.url.clone()),
            Box::new(self.stargazer_count),
            Box::new(self.fork_count),
            Box::new(language.map(|l| l.name.clone())),
            Box::new(language.and_then(|l| l.color.clone())),
            Box::new(timestamp(&self.updated_at)),
            Box::new(self.pushed_at.as_ref().map(timestamp)),
            Box::new(self.created_at.as_ref().map(timestamp)),
            Box::new(self.is_private),
            Box::new(self.is_fork),
            Box::new(self.owner.login.clone()),
            Box::new(self.owner.avatar_url.clone()),
            Box::new(scope.cached_at.clone()),
        ]
    }
}

impl CachedEntity for PullRequest {
    fn exists(&self, tx: &Transaction<'_>, scope: &Scope<'_>) -> rusqlite::Result<bool> {
        tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM pull_requests WHERE account = ?1 AND id = ?2)",
            params![scope.account, &self.id],
            |row| row.get(0),
        )
    }

    fn insert(&self, tx: &Transaction<'_>, scope: &Scope<'_>) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT INTO pull_requests (
                account, id, title, number, url, state, is_draft, created_at, updated_at,
                merged_at, closed_at, additions, deletions, repo_name, repo_name_with_owner,
                repo_owner_login, author_login, author_avatar_url, review_decision, cached_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            params_from_iter(self.row_params(scope)),
        )?;
        Ok(())
    }

    fn update(&self, tx: &Transaction<'_>, scope: &Scope<'_>) -> rusqlite::Result<()> {
        tx.execute(
            "UPDATE pull_requests SET
                title = ?3, number = ?4, url = ?5, state = ?6, is_draft = ?7,
                created_at = ?8, updated_at = ?9, merged_at = ?10, closed_at = ?11,
                additions = ?12, deletions = ?13, repo_name = ?14, repo_name_with_owner = ?15,
                repo_owner_login = ?16, author_login = ?17, author_avatar_url = ?18,
                review_decision = ?19, cached_at = ?20
             WHERE account = ?1 AND id = ?2",
            params_from_iter(self.row_params(scope)),
        )?;
        Ok(())
    }
}

impl PullRequest {
    fn row_params(&self, scope: &Scope<'_>) -> [Box<dyn rusqlite::ToSql>; 20] {
        [
            Box::new(scope.account.to_string()),
            Box::new(self.id.clone()),
            Box::new(self.title.clone()),
            Box::new(self.number),
            Box::new(self.url.clone()),
            Box::new(self.state.as_str()),
            Box::new(self.is_draft),
            Box::new(timestamp(&self.created_at)),
            Box::new(timestamp(&self.updated_at)),
            Box::new(self.merged_at.as_ref().map(timestamp)),
            Box::new(self.closed_at.as_ref().map(timestamp)),
            Box::new(self.additions),
            Box::new(self.deletions),
            Box::new(self.repository.name.clone()),
            Box::new(self.repository.name_with_owner.clone()),
            Box::new(self.repository.owner_login.clone()),
            Box::new(self.author.login.clone()),
            Box::new(self.author.avatar_url.clone()),
            Box::new(self.review_decision.map(|d| d.as_str())),
            Box::new(scope.cached_at.clone()),
        ]
    }
}

/// Replace the user's calendar. The calendar row is updated in place;
/// its weeks and days are rewritten.
fn store_calendar(
    tx: &Transaction<'_>,
    account: &str,
    calendar: &ContributionCalendar,
    cached_at: &str,
) -> rusqlite::Result<()> {
    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM contribution_calendars WHERE account = ?1",
            [account],
            |row| row.get(0),
        )
        .optional()?;

    let calendar_id = match existing {
        Some(id) => {
            tx.execute(
                "UPDATE contribution_calendars SET total_contributions = ?2, cached_at = ?3 WHERE id = ?1",
                params![id, calendar.total_contributions, cached_at],
            )?;
            delete_calendar_children(tx, id)?;
            id
        }
        None => {
            tx.execute(
                "INSERT INTO contribution_calendars (account, total_contributions, cached_at)
                 VALUES (?1, ?2, ?3)",
                params![account, calendar.total_contributions, cached_at],
            )?;
            tx.last_insert_rowid()
        }
    };

    let mut insert_week = tx.prepare(
        "INSERT INTO contribution_weeks (calendar_id, position) VALUES (?1, ?2)",
    )?;
    let mut insert_day = tx.prepare(
        "INSERT INTO contribution_days (week_id, position, date, count, color)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (week_position, week) in calendar.weeks.iter().enumerate() {
        let week_id = insert_week.insert(params![calendar_id, week_position as i64])?;
        for (day_position, day) in week.days.iter().enumerate() {
            insert_day.execute(params![
                week_id,
                day_position as i64,
                &day.date,
                day.count,
                &day.color
            ])?;
        }
    }
    Ok(())
}

fn delete_calendar_children(tx: &Transaction<'_>, calendar_id: i64) -> rusqlite::Result<()> {
    tx.execute(
        "DELETE FROM contribution_days WHERE week_id IN
            (SELECT id FROM contribution_weeks WHERE calendar_id = ?1)",
        [calendar_id],
    )?;
    tx.execute(
        "DELETE FROM contribution_weeks WHERE calendar_id = ?1",
        [calendar_id],
    )?;
    Ok(())
}

/// days -> weeks -> calendar
fn delete_calendar(tx: &Transaction<'_>, account: &str) -> rusqlite::Result<()> {
    let calendar_id: Option<i64> = tx
        .query_row(
            "SELECT id FROM contribution_calendars WHERE account = ?1",
            [account],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = calendar_id {
        delete_calendar_children(tx, id)?;
        tx.execute("DELETE FROM contribution_calendars WHERE id = ?1", [id])?;
    }
    Ok(())
}

fn load_calendar(
    conn: &Connection,
    account: &str,
) -> Result<Option<ContributionCalendar>, CacheError> {
    let calendar: Option<(i64, u32)> = conn
        .query_row(
            "SELECT id, total_contributions FROM contribution_calendars WHERE account = ?1",
            [account],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((calendar_id, total_contributions)) = calendar else {
        return Ok(None);
    };

    let mut weeks_stmt = conn.prepare(
        "SELECT id FROM contribution_weeks WHERE calendar_id = ?1 ORDER BY position",
    )?;
    let week_ids = weeks_stmt
        .query_map([calendar_id], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut days_stmt = conn.prepare(
        "SELECT date, count, color FROM contribution_days WHERE week_id = ?1 ORDER BY position",
    )?;
    let mut weeks = Vec::with_capacity(week_ids.len());
    for week_id in week_ids {
        let days = days_stmt
            .query_map([week_id], |row| {
                Ok(ContributionDay {
                    date: row.get(0)?,
                    count: row.get(1)?,
                    color: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        weeks.push(ContributionWeek { days });
    }

    Ok(Some(ContributionCalendar {
        total_contributions,
        weeks,
    }))
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    parse_stored_timestamp(row, column, &raw)
}

fn parse_optional_timestamp(
    row: &Row<'_>,
    column: &str,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|raw| parse_stored_timestamp(row, column, &raw))
        .transpose()
}

fn parse_stored_timestamp(
    row: &Row<'_>,
    column: &str,
    raw: &str,
) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            let index = row.as_ref().column_index(column).unwrap_or_default();
            rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
        })
}

fn invalid_text(column: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Text,
        format!("unrecognised value {value:?}").into(),
    )
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<Cached<User>> {
    let status = if row.get::<_, bool>("has_status")? {
        Some(UserStatus {
            message: row.get("status_message")?,
            emoji: row.get("status_emoji")?,
        })
    } else {
        None
    };

    let contributions = if row.get::<_, bool>("has_contributions")? {
        Some(ContributionsCollection {
            total_commit_contributions: row.get("total_commit_contributions")?,
            total_issue_contributions: row.get("total_issue_contributions")?,
            total_pull_request_contributions: row.get("total_pull_request_contributions")?,
            total_pull_request_review_contributions: row
                .get("total_pull_request_review_contributions")?,
            calendar: None,
            commits_by_repository: None,
        })
    } else {
        None
    };

    Ok(Cached {
        record: User {
            login: row.get("login")?,
            name: row.get("name")?,
            email: row.get("email")?,
            avatar_url: row.get("avatar_url")?,
            bio: row.get("bio")?,
            company: row.get("company")?,
            location: row.get("location")?,
            url: row.get("url")?,
            status,
            contributions,
        },
        cached_at: parse_timestamp(row, "cached_at")?,
    })
}

fn repository_from_row(row: &Row<'_>) -> rusqlite::Result<Cached<Repository>> {
    let language_name: Option<String> = row.get("language_name")?;
    let primary_language = match language_name {
        Some(name) => Some(Language {
            name,
            color: row.get("language_color")?,
        }),
        None => None,
    };

    Ok(Cached {
        record: Repository {
            id: row.get("id")?,
            name: row.get("name")?,
            name_with_owner: row.get("name_with_owner")?,
            description: row.get("description")?,
            url: row.get("url")?,
            stargazer_count: row.get("stargazer_count")?,
            fork_count: row.get("fork_count")?,
            primary_language,
            languages: None,
            updated_at: parse_timestamp(row, "updated_at")?,
            pushed_at: parse_optional_timestamp(row, "pushed_at")?,
            created_at: parse_optional_timestamp(row, "created_at")?,
            is_private: row.get("is_private")?,
            is_fork: row.get("is_fork")?,
            owner: RepositoryOwner {
                login: row.get("owner_login")?,
                avatar_url: row.get("owner_avatar_url")?,
            },
            watcher_count: None,
            open_issue_count: None,
            open_pull_request_count: None,
            default_branch: None,
            commits: None,
            branches: None,
            collaborators: None,
        },
        cached_at: parse_timestamp(row, "cached_at")?,
    })
}

fn pull_request_from_row(row: &Row<'_>) -> rusqlite::Result<Cached<PullRequest>> {
    let state: String = row.get("state")?;
    let state = PullRequestState::parse(&state)
        .ok_or_else(|| invalid_text(row.as_ref().column_index("state").unwrap_or_default(), &state))?;

    let decision: Option<String> = row.get("review_decision")?;
    let review_decision = match decision {
        Some(value) => Some(ReviewDecision::parse(&value).ok_or_else(|| {
            invalid_text(
                row.as_ref().column_index("review_decision").unwrap_or_default(),
                &value,
            )
        })?),
        None => None,
    };

    Ok(Cached {
        record: PullRequest {
            id: row.get("id")?,
            title: row.get("title")?,
            number: row.get("number")?,
            url: row.get("url")?,
            state,
            is_draft: row.get("is_draft")?,
            created_at: parse_timestamp(row, "created_at")?,
            updated_at: parse_timestamp(row, "updated_at")?,
            merged_at: parse_optional_timestamp(row, "merged_at")?,
            closed_at: parse_optional_timestamp(row, "closed_at")?,
            additions: row.get("additions")?,
            deletions: row.get("deletions")?,
            repository: PullRequestRepository {
                name: row.get("repo_name")?,
                name_with_owner: row.get("repo_name_with_owner")?,
                owner_login: row.get("repo_owner_login")?,
            },
            author: PullRequestAuthor {
                login: row.get("author_login")?,
                avatar_url: row.get("author_avatar_url")?,
            },
            review_decision,
            reviews: None,
        },
        cached_at: parse_timestamp(row, "cached_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pull_request::tests::pull_request;
    use crate::domain::repo::tests::repository;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn user_with_calendar(counts: &[u32]) -> User {
        let days = counts
            .iter()
            .enumerate()
            .map(|(i, count)| ContributionDay {
                count: *count,
                date: format!("2026-02-{:02}", i + 1),
                color: Some("#216e39".to_string()),
            })
            .collect();
        User {
            login: "octocat".to_string(),
            name: Some("The Octocat".to_string()),
            email: None,
            avatar_url: "https://avatars.example/octocat".to_string(),
            bio: None,
            company: Some("GitHub".to_string()),
            location: None,
            url: "https://github.com/octocat".to_string(),
            status: Some(UserStatus {
                message: Some("Shipping".to_string()),
                emoji: None,
            }),
            contributions: Some(ContributionsCollection {
                total_commit_contributions: 5,
                total_issue_contributions: 1,
                total_pull_request_contributions: 2,
                total_pull_request_review_contributions: 3,
                calendar: Some(ContributionCalendar {
                    total_contributions: counts.iter().sum(),
                    weeks: vec![ContributionWeek { days }],
                }),
                commits_by_repository: None,
            }),
        }
    }

    #[test]
    fn test_freshness_boundary() {
        let cached = Cached {
            record: (),
            cached_at: now() - TimeDelta::seconds(899),
        };
        assert!(cached.is_fresh_at(now()));

        let stale = Cached {
            record: (),
            cached_at: now() - TimeDelta::seconds(900),
        };
        assert!(!stale.is_fresh_at(now()));
    }

    #[test]
    fn test_user_round_trip_with_calendar() {
        let cache = Cache::open_in_memory().unwrap();
        let user = user_with_calendar(&[1, 0, 3]);
        cache
            .commit(&CacheBatch::new("octocat", now()).with_user(&user))
            .unwrap();

        let cached = cache.find_user("octocat").unwrap().unwrap();
        assert_eq!(cached.cached_at, now());
        assert_eq!(cached.record, user);
    }

    #[test]
    fn test_user_update_without_contributions_keeps_calendar() {
        let cache = Cache::open_in_memory().unwrap();
        let user = user_with_calendar(&[2, 2]);
        cache
            .commit(&CacheBatch::new("octocat", now()).with_user(&user))
            .unwrap();

        let mut partial = user.clone();
        partial.contributions = None;
        partial.bio = Some("Updated".to_string());
        let later = now() + TimeDelta::seconds(60);
        cache
            .commit(&CacheBatch::new("octocat", later).with_user(&partial))
            .unwrap();

        let cached = cache.find_user("octocat").unwrap().unwrap();
        assert_eq!(cached.cached_at, later);
        assert_eq!(cached.record.bio.as_deref(), Some("Updated"));
        assert_eq!(cached.record.contributions, user.contributions);
    }

    #[test]
    fn test_calendar_rewrite_replaces_days() {
        let cache = Cache::open_in_memory().unwrap();
        cache
            .commit(&CacheBatch::new("octocat", now()).with_user(&user_with_calendar(&[1, 1, 1])))
            .unwrap();
        cache
            .commit(&CacheBatch::new("octocat", now()).with_user(&user_with_calendar(&[4])))
            .unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.contribution_day_count, 1);
        let calendar = cache
            .find_user("octocat")
            .unwrap()
            .unwrap()
            .record
            .contributions
            .unwrap()
            .calendar
            .unwrap();
        assert_eq!(calendar.total_contributions, 4);
    }

    #[test]
    fn test_user_without_contributions_has_none() {
        let cache = Cache::open_in_memory().unwrap();
        let mut user = user_with_calendar(&[]);
        user.contributions = None;
        user.status = None;
        cache
            .commit(&CacheBatch::new("octocat", now()).with_user(&user))
            .unwrap();

        let cached = cache.find_user("octocat").unwrap().unwrap().record;
        assert!(cached.contributions.is_none());
        assert!(cached.status.is_none());
    }

    #[test]
    fn test_repository_upsert_keeps_one_record() {
        let cache = Cache::open_in_memory().unwrap();
        let repos = vec![repository("R_1")];

        cache
            .commit(&CacheBatch::new("octocat", now()).with_repositories(&repos))
            .unwrap();
        let later = now() + TimeDelta::seconds(30);
        cache
            .commit(&CacheBatch::new("octocat", later).with_repositories(&repos))
            .unwrap();

        let cached = cache.repositories_by_recency("octocat").unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].cached_at, later);
        assert_eq!(cached[0].record, repos[0]);
        assert_eq!(cache.stats().unwrap().repository_count, 1);
    }

    #[test]
    fn test_repositories_sorted_by_update_time() {
        let cache = Cache::open_in_memory().unwrap();
        let mut older = repository("R_old");
        older.updated_at = now() - TimeDelta::days(3);
        let mut newer = repository("R_new");
        newer.updated_at = now() - TimeDelta::hours(1);
        newer.primary_language = Some(Language {
            name: "Rust".to_string(),
            color: Some("#dea584".to_string()),
        });

        let repos = vec![older, newer.clone()];
        cache
            .commit(&CacheBatch::new("octocat", now()).with_repositories(&repos))
            .unwrap();

        let cached = cache.repositories_by_recency("octocat").unwrap();
        let ids: Vec<_> = cached.iter().map(|c| c.record.id.as_str()).collect();
        assert_eq!(ids, ["R_new", "R_old"]);
        assert_eq!(cached[0].record, newer);
    }

    #[test]
    fn test_collections_scoped_by_account() {
        let cache = Cache::open_in_memory().unwrap();
        let repos = vec![repository("R_1")];
        cache
            .commit(&CacheBatch::new("octocat", now()).with_repositories(&repos))
            .unwrap();

        assert!(cache.repositories_by_recency("hubot").unwrap().is_empty());
        assert!(cache.find_repository("hubot", "R_1").unwrap().is_none());
        assert!(cache.find_repository("octocat", "R_1").unwrap().is_some());
    }

    #[test]
    fn test_pull_request_round_trip_drops_reviews() {
        let cache = Cache::open_in_memory().unwrap();
        let mut pr = pull_request("PR_1");
        pr.state = PullRequestState::Merged;
        pr.merged_at = Some(now());
        pr.review_decision = Some(ReviewDecision::ChangesRequested);
        pr.reviews = Some(vec![]);
        let prs = vec![pr.clone()];

        cache
            .commit(&CacheBatch::new("octocat", now()).with_pull_requests(&prs))
            .unwrap();

        let cached = cache.find_pull_request("octocat", "PR_1").unwrap().unwrap();
        pr.reviews = None;
        assert_eq!(cached.record, pr);
    }

    #[test]
    fn test_delete_user_cascades() {
        let cache = Cache::open_in_memory().unwrap();
        let user = user_with_calendar(&[1, 2]);
        let repos = vec![repository("R_1")];
        let prs = vec![pull_request("PR_1")];
        cache
            .commit(
                &CacheBatch::new("octocat", now())
                    .with_user(&user)
                    .with_repositories(&repos)
                    .with_pull_requests(&prs),
            )
            .unwrap();
        cache
            .commit(&CacheBatch::new("hubot", now()).with_repositories(&repos))
            .unwrap();

        cache.delete_user("octocat").unwrap();

        assert!(cache.find_user("octocat").unwrap().is_none());
        let stats = cache.stats().unwrap();
        assert_eq!(stats.user_count, 0);
        assert_eq!(stats.pull_request_count, 0);
        assert_eq!(stats.contribution_day_count, 0);
        // the other account's copy survives
        assert_eq!(stats.repository_count, 1);
    }

    #[test]
    fn test_user_is_keyed_by_account_not_login() {
        let cache = Cache::open_in_memory().unwrap();
        let mut user = user_with_calendar(&[3]);
        user.login = "OctoCat".to_string();
        cache
            .commit(&CacheBatch::new("octocat", now()).with_user(&user))
            .unwrap();

        let cached = cache.find_user("octocat").unwrap().unwrap().record;
        assert_eq!(cached.login, "OctoCat");
        assert_eq!(cached.contributions.unwrap().calendar_or_empty().current_streak(), 1);
        assert!(cache.find_user("OctoCat").unwrap().is_none());

        cache.delete_user("octocat").unwrap();
        let stats = cache.stats().unwrap();
        assert_eq!(stats.user_count, 0);
        assert_eq!(stats.contribution_day_count, 0);
    }

    #[test]
    fn test_token_accounts_follow_the_account_lifecycle() {
        let cache = Cache::open_in_memory().unwrap();
        assert!(cache.token_account("f1").unwrap().is_none());

        cache.remember_token_account("f1", "octocat").unwrap();
        cache.remember_token_account("f1", "hubot").unwrap();
        cache.remember_token_account("f2", "octocat").unwrap();
        assert_eq!(cache.token_account("f1").unwrap().as_deref(), Some("hubot"));

        cache.delete_user("octocat").unwrap();
        assert!(cache.token_account("f2").unwrap().is_none());
        assert!(cache.token_account("f1").unwrap().is_some());

        cache.clear().unwrap();
        assert!(cache.token_account("f1").unwrap().is_none());
    }

    #[test]
    fn test_clear_and_file_stats() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::open_at(dir.path().join("nested").join("cache.db")).unwrap();
        let repos = vec![repository("R_1")];
        cache
            .commit(&CacheBatch::new("octocat", now()).with_repositories(&repos))
            .unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.repository_count, 1);
        assert!(stats.size_bytes > 0);

        cache.clear().unwrap();
        assert_eq!(cache.stats().unwrap().repository_count, 0);

        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("repository_count"));
    }
}
