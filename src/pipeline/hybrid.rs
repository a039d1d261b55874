// src/pipeline/hybrid.rs

//! Recent scroll followed by a historical search up to the oldest post seen.

use chrono::{Duration, NaiveDate};

use crate::error::Result;
use crate::models::{DateRange, DateWindow, PostSet, XConfig};
use crate::pipeline::scroll;
use crate::pipeline::search::WindowSearch;
use crate::services::BrowserPage;

#[derive(Debug, Default)]
pub struct HybridOutcome {
    pub posts: PostSet,
    pub recent: usize,
    pub historical: usize,
    /// Range searched in the second phase, if any
    pub range: Option<DateRange>,
    pub failed_windows: Vec<DateWindow>,
}

/// Range for the historical phase: from `start` through `earliest` inclusive.
pub fn historical_range(start: NaiveDate, earliest: NaiveDate) -> Option<DateRange> {
    DateRange::new(start, earliest + Duration::days(1)).ok()
}

/// Scroll the profile, then search history older than what scrolling reached.
pub async fn fetch_hybrid(
    page: &mut dyn BrowserPage,
    config: &XConfig,
    username: &str,
    search: &WindowSearch<'_>,
) -> Result<HybridOutcome> {
    let mut outcome = HybridOutcome::default();

    match scroll::fetch_recent(page, config, username).await {
        Ok(recent) => {
            outcome.recent = recent.posts.len();
            outcome.posts = recent.posts;
        }
        Err(e) => log::warn!("Recent phase failed: {e}"),
    }

    let Some(earliest) = outcome.posts.earliest() else {
        log::info!("No dated posts from the recent phase, skipping history");
        return Ok(outcome);
    };

    let start = config.history_start()?;
    let Some(range) = historical_range(start, earliest.date_naive()) else {
        log::info!("Recent posts already reach {start}, nothing older to search");
        return Ok(outcome);
    };

    log::info!("Searching history {range} (earliest recent post {earliest})");
    let history = search.run(page, &range).await;
    outcome.historical = outcome.posts.extend(history.posts.into_vec());
    outcome.failed_windows = history.failed_windows;
    outcome.range = Some(range);

    log::info!(
        "Hybrid fetch: {} recent, {} more from history, {} total",
        outcome.recent,
        outcome.historical,
        outcome.posts.len()
    );
    Ok(outcome)
}
