use anyhow::{bail, Context};
use chrono::{NaiveDate, NaiveTime, TimeDelta};
use clap::CommandFactory;
use devradar::application::refresh_dashboard;
use devradar::config::{parse_args, AuthCommands, Cli, Commands, DataCommands, Settings};
use devradar::domain::{ContributionsCollection, PullRequest, Repository, User};
use devradar::git::current_repository;
use devradar::infrastructure::{
    Cache, CredentialStore, FileCredentialStore, GitHubClient, MemoryCredentialStore,
};
use devradar::{AccountManager, Error, Session, SyncEngine, Synced};
use serde::Serialize;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = parse_args();
    init_tracing();

    let result = run(cli).await;
    if let Err(err) = &result {
        if let Some(err) = err.downcast_ref::<Error>() {
            if err.requires_reauthentication() {
                eprintln!("hint: sign in again with `devradar auth login`");
            } else if let Some(Some(reset_at)) = err.is_rate_limited() {
                eprintln!("hint: the rate limit resets at {reset_at}");
            }
        }
    }
    result
}

/// Log to stderr, filtered by `DEVRADAR_LOG` (warnings only by default)
fn init_tracing() {
    let filter = EnvFilter::try_from_env("DEVRADAR_LOG")
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "devradar", &mut std::io::stdout());
        return Ok(());
    }

    let settings = Settings::from_cli(&cli)?;
    let app = App::open(settings)?;

    match cli.command {
        Commands::Auth { action } => app.auth(action).await?,

        Commands::User { refresh } => {
            let user = app.engine().await?.fetch_user(refresh).await?;
            app.output(&user, |user| print_user(&user.data))?;
            app.note_origin(&user);
        }

        Commands::Repos { refresh } => {
            let repositories = app.engine().await?.fetch_repositories(refresh).await?;
            app.output(&repositories, |repos| {
                if repos.data.is_empty() {
                    println!("No repositories");
                }
                repos.data.iter().for_each(print_repository_line);
            })?;
            app.note_origin(&repositories);
        }

        Commands::Prs { refresh } => {
            let pull_requests = app.engine().await?.fetch_pull_requests(refresh).await?;
            app.output(&pull_requests, |prs| {
                if prs.data.is_empty() {
                    println!("No pull requests");
                }
                prs.data.iter().for_each(print_pull_request_line);
            })?;
            app.note_origin(&pull_requests);
        }

        Commands::Reviews => {
            let reviews = app.engine().await?.fetch_review_requests().await?;
            app.output(&reviews, |reviews| {
                if reviews.is_empty() {
                    println!("Nothing waiting for your review");
                }
                reviews.iter().for_each(print_pull_request_line);
            })?;
        }

        Commands::Repo { slug } => {
            let slug = match slug {
                Some(slug) => slug,
                None => current_repository()
                    .context("No OWNER/NAME given and the current directory has no GitHub origin")?,
            };
            let repository = app
                .engine()
                .await?
                .fetch_repository_details(&slug.owner, &slug.name)
                .await
                .with_context(|| format!("Failed to load {slug}"))?;
            app.output(&repository, print_repository_details)?;
        }

        Commands::Activity { from, to } => {
            if from > to {
                bail!("--from ({from}) must not be after --to ({to})");
            }
            let activity = app
                .engine()
                .await?
                .fetch_contribution_activity(start_of_day(from), end_of_day(to))
                .await?;
            app.output(&activity, |activity| print_activity(activity, from, to))?;
        }

        Commands::Dashboard { refresh } => {
            let engine = app.engine().await?;
            let result = refresh_dashboard(&engine, refresh, app.settings.quiet || app.settings.json)
                .await?;
            let dashboard = &result.dashboard;
            app.output(dashboard, |dashboard| {
                print_user(&dashboard.user);
                println!();
                println!(
                    "{} open pull request(s), {} waiting for review",
                    dashboard.open_pull_request_count(),
                    dashboard.pending_review_count()
                );
                for pr in &dashboard.review_requests {
                    print_pull_request_line(pr);
                }
                println!();
                println!("Recently updated repositories:");
                for repository in dashboard.repositories.iter().take(10) {
                    print_repository_line(repository);
                }
            })?;
        }

        Commands::Data { action } => app.data(action)?,

        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn start_of_day(date: NaiveDate) -> chrono::DateTime<chrono::Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(date: NaiveDate) -> chrono::DateTime<chrono::Utc> {
    start_of_day(date) + TimeDelta::days(1) - TimeDelta::seconds(1)
}

struct App {
    settings: Settings,
    api: GitHubClient,
    cache: Arc<Cache>,
}

impl App {
    fn open(settings: Settings) -> anyhow::Result<Self> {
        let api = GitHubClient::new(settings.api_url.clone())
            .with_context(|| format!("Invalid API URL '{}'", settings.api_url))?;
        let cache = Cache::open_at(&settings.cache_path).with_context(|| {
            format!("Failed to open cache at {}", settings.cache_path.display())
        })?;
        Ok(Self {
            settings,
            api,
            cache: Arc::new(cache),
        })
    }

    fn accounts(&self) -> AccountManager {
        let store = Arc::new(FileCredentialStore::new(&self.settings.credentials_path));
        AccountManager::new(self.api.clone(), self.cache.clone(), store)
            .with_oauth(self.settings.oauth.clone())
            .with_preferred_account(self.settings.account.clone())
    }

    /// Engine for the current account. A token given on the command line or
    /// in `GITHUB_TOKEN` is kept in memory and never written to disk.
    async fn engine(&self) -> anyhow::Result<SyncEngine> {
        let (credentials, account): (Arc<dyn CredentialStore>, String) =
            match &self.settings.github_token {
                Some(token) => {
                    let store = Arc::new(MemoryCredentialStore::new());
                    let account = match &self.settings.account {
                        Some(account) => account.clone(),
                        None => self
                            .accounts()
                            .identify_token(token)
                            .await
                            .context("Failed to identify the GITHUB_TOKEN account")?,
                    };
                    store.save(token, &account).await?;
                    (store as Arc<dyn CredentialStore>, account)
                }
                None => {
                    let account = self.accounts().default_account().await?.ok_or(Error::NoAccount)?;
                    let store = Arc::new(FileCredentialStore::new(&self.settings.credentials_path));
                    (store as Arc<dyn CredentialStore>, account)
                }
            };

        Ok(SyncEngine::new(
            self.api.clone(),
            self.cache.clone(),
            credentials,
            Session::new(account),
        ))
    }

    /// JSON with `--json`, otherwise the text rendering unless `--quiet`
    fn output<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> anyhow::Result<()> {
        if self.settings.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else if !self.settings.quiet {
            text(value);
        }
        Ok(())
    }

    fn note_origin<T>(&self, synced: &Synced<T>) {
        if self.settings.json || self.settings.quiet {
            return;
        }
        if let devradar::Origin::Cache { cached_at } = synced.origin {
            eprintln!(
                "(cached {}, use --refresh to update)",
                cached_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
    }

    async fn auth(&self, action: AuthCommands) -> anyhow::Result<()> {
        let accounts = self.accounts();
        match action {
            AuthCommands::Url => {
                let state = AccountManager::new_state();
                let url = accounts.authorize_url(&state)?;
                #[derive(Serialize)]
                struct Authorize<'a> {
                    url: &'a str,
                    state: &'a str,
                }
                self.output(&Authorize { url: url.as_str(), state: &state }, |auth| {
                    println!("Open this URL in a browser to sign in:");
                    println!("  {}", auth.url);
                    println!();
                    println!("Then run:");
                    println!(
                        "  devradar auth login --code <code> --state <state> --expected-state {}",
                        auth.state
                    );
                })?;
            }

            AuthCommands::Login {
                token,
                code,
                state,
                expected_state,
            } => {
                let login = match (token, code) {
                    (Some(token), _) => accounts.login_with_token(token.trim()).await?,
                    (None, Some(code)) => {
                        let returned = state.unwrap_or_default();
                        let expected = expected_state.unwrap_or_default();
                        accounts
                            .complete_authorization(&code, &returned, &expected)
                            .await?
                    }
                    (None, None) => bail!("Pass --token, or --code with --state and --expected-state"),
                };
                if !self.settings.quiet {
                    println!("Signed in as {login}");
                }
            }

            AuthCommands::Logout { account } => {
                let account = match account.or_else(|| self.settings.account.clone()) {
                    Some(account) => account,
                    None => accounts.default_account().await?.ok_or(Error::NoAccount)?,
                };
                accounts.sign_out(&account).await?;
                if !self.settings.quiet {
                    println!("Signed out {account}");
                }
            }

            AuthCommands::Accounts => {
                let list = accounts.accounts().await?;
                let default = accounts.default_account().await?;
                self.output(&list, |list| {
                    if list.is_empty() {
                        println!("No accounts. Sign in with `devradar auth login`.");
                    }
                    for account in list {
                        let marker = if default.as_ref() == Some(account) { "*" } else { " " };
                        println!("{marker} {account}");
                    }
                })?;
            }
        }
        Ok(())
    }

    fn data(&self, action: DataCommands) -> anyhow::Result<()> {
        match action {
            DataCommands::Clear => {
                self.cache.clear()?;
                if !self.settings.quiet {
                    println!("Cache cleared");
                }
            }
            DataCommands::Status => {
                let stats = self.cache.stats()?;
                self.output(&stats, |stats| {
                    println!("Cache Statistics:");
                    println!("  Users: {}", stats.user_count);
                    println!("  Repositories: {}", stats.repository_count);
                    println!("  Pull requests: {}", stats.pull_request_count);
                    println!("  Contribution days: {}", stats.contribution_day_count);
                    println!("  Size: {} bytes", stats.size_bytes);
                })?;
            }
            DataCommands::Reveal => {
                println!("{}", self.settings.cache_path.display());
            }
        }
        Ok(())
    }
}

fn print_user(user: &User) {
    println!("{} (@{})", user.display_name(), user.login);
    if let Some(status) = &user.status {
        let text = status.display_text();
        if !text.is_empty() {
            println!("  {text}");
        }
    }
    for line in [&user.bio, &user.company, &user.location].into_iter().flatten() {
        println!("  {line}");
    }
    println!("  {}", user.url);

    if let Some(contributions) = &user.contributions {
        let calendar = contributions.calendar_or_empty();
        println!();
        println!(
            "{} contributions in the last year, {} commits",
            calendar.total_contributions, contributions.total_commit_contributions
        );
        println!(
            "Current streak: {} day(s), longest: {} day(s)",
            calendar.current_streak(),
            calendar.longest_streak()
        );
    }
}

fn print_repository_line(repository: &Repository) {
    let visibility = if repository.is_private { " (private)" } else { "" };
    println!(
        "{:<40} ★ {:>6}  {:<12} {}{}",
        repository.name_with_owner,
        repository.formatted_stars(),
        repository.display_language(),
        repository.updated_at.format("%Y-%m-%d"),
        visibility
    );
}

fn print_repository_details(repository: &Repository) {
    println!("{}", repository.name_with_owner);
    if let Some(description) = &repository.description {
        println!("  {description}");
    }
    println!("  {}", repository.url);
    println!(
        "  ★ {}  forks {}  watchers {}  open issues {}  open PRs {}",
        repository.formatted_stars(),
        repository.formatted_forks(),
        repository.watcher_count.unwrap_or(0),
        repository.open_issue_count.unwrap_or(0),
        repository.open_pull_request_count.unwrap_or(0)
    );
    if let Some(branch) = &repository.default_branch {
        println!("  default branch: {branch}");
    }

    let breakdown = repository.language_breakdown();
    if !breakdown.is_empty() {
        let languages: Vec<String> = breakdown
            .iter()
            .map(|(language, share)| format!("{} {share:.1}%", language.name))
            .collect();
        println!("  languages: {}", languages.join(", "));
    }

    if let Some(commits) = repository.commits.as_ref().filter(|c| !c.is_empty()) {
        println!();
        println!("Recent commits:");
        for commit in commits {
            println!(
                "  {} {} (+{} -{})",
                commit.oid.get(..7).unwrap_or(commit.oid.as_str()),
                commit.short_message(),
                commit.additions,
                commit.deletions
            );
        }
    }
    if let Some(branches) = &repository.branches {
        println!("{} branch(es)", branches.len());
    }
    if let Some(collaborators) = repository.collaborators.as_ref().filter(|c| !c.is_empty()) {
        let logins: Vec<&str> = collaborators.iter().map(|c| c.login.as_str()).collect();
        println!("Collaborators: {}", logins.join(", "));
    }
}

fn print_pull_request_line(pr: &PullRequest) {
    println!(
        "{:<12} {}#{} {} (+{} -{})",
        format!("[{}]", pr.status_text()),
        pr.repository.name_with_owner,
        pr.number,
        pr.title,
        pr.additions,
        pr.deletions
    );
}

fn print_activity(activity: &ContributionsCollection, from: NaiveDate, to: NaiveDate) {
    println!("Contributions {from} to {to}: {}", activity.total_contributions());
    println!("  commits: {}", activity.total_commit_contributions);
    println!("  pull requests: {}", activity.total_pull_request_contributions);
    println!("  reviews: {}", activity.total_pull_request_review_contributions);
    println!("  issues: {}", activity.total_issue_contributions);

    if let Some(by_repository) = activity.commits_by_repository.as_ref().filter(|r| !r.is_empty()) {
        println!();
        for entry in by_repository {
            println!(
                "  {:<40} {} commit(s)",
                entry.repository.name_with_owner,
                entry.commit_count()
            );
        }
    }
}
