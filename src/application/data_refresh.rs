use super::dashboard::load_dashboard;
use super::sync_engine::SyncEngine;
use crate::domain::Dashboard;
use crate::error::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

fn spinner_style(template: &str, ticks: &[&str]) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(ticks)
}

/// Load the dashboard, showing a spinner on stderr unless `quiet`
pub async fn refresh_dashboard(
    engine: &SyncEngine,
    force_refresh: bool,
    quiet: bool,
) -> Result<RefreshResult> {
    let spinner = if !quiet {
        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_style(spinner_style(
            "{spinner:.magenta.bold} {msg}",
            &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"],
        ));
        pb.set_message(if force_refresh {
            "🔄 Refreshing from GitHub..."
        } else {
            "📡 Syncing with GitHub..."
        });
        Some(pb)
    } else {
        None
    };

    let dashboard = match load_dashboard(engine, force_refresh).await {
        Ok(dashboard) => dashboard,
        Err(e) => {
            if let Some(pb) = spinner {
                pb.abandon_with_message("❌ Sync failed");
            }
            return Err(e);
        }
    };

    let result = RefreshResult { dashboard };
    if let Some(pb) = spinner {
        pb.set_style(spinner_style("{spinner:.green.bold} {msg:.dim}", &["✔", "✔"]));
        pb.finish_with_message(format!("✅ {result}"));
    }
    Ok(result)
}

#[derive(Debug)]
pub struct RefreshResult {
    pub dashboard: Dashboard,
}

impl std::fmt::Display for RefreshResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Loaded {} repo(s), {} pull request(s) and {} review request(s)",
            self.dashboard.repositories.len(),
            self.dashboard.pull_requests.len(),
            self.dashboard.review_requests.len()
        )
    }
}
