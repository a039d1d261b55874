// src/pipeline/x.rs

//! X import: collect posts with one of the fetch strategies and write the
//! ones the destination does not have yet.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{Config, Post, RunStats, sort_oldest_first, text_signature};
use crate::pipeline::hybrid::fetch_hybrid;
use crate::pipeline::scroll::fetch_recent;
use crate::pipeline::search::WindowSearch;
use crate::pipeline::writer::DestinationWriter;
use crate::services::{BrowserPage, MediaFetcher, NoteStore};
use crate::utils;

/// How posts are collected from X.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Scroll the profile page
    Recent,
    /// Search the configured date range window by window
    Search,
    /// Scroll, then search everything older
    Hybrid,
}

/// Signatures of every existing note with non-blank content.
pub async fn existing_signatures(store: &dyn NoteStore) -> HashSet<String> {
    match store.list_notes().await {
        Ok(notes) => notes
            .iter()
            .filter(|n| !n.content.trim().is_empty())
            .map(|n| text_signature(&n.content))
            .collect(),
        Err(e) => {
            log::warn!("Could not list existing notes, duplicates will not be skipped: {e}");
            HashSet::new()
        }
    }
}

/// Drop posts already present and order the rest oldest first.
///
/// Media-only posts have no text to compare and are always written.
pub fn plan_writes(posts: Vec<Post>, existing: &HashSet<String>) -> (Vec<Post>, usize) {
    let total = posts.len();
    let mut fresh: Vec<Post> = posts
        .into_iter()
        .filter(|p| p.text.trim().is_empty() || !existing.contains(&text_signature(&p.text)))
        .collect();
    sort_oldest_first(&mut fresh);
    let skipped = total - fresh.len();
    (fresh, skipped)
}

/// Run an X import with the given strategy.
pub async fn run_x_import(
    config: &Config,
    strategy: Strategy,
    page: &mut dyn BrowserPage,
    store: &dyn NoteStore,
    media: &dyn MediaFetcher,
    today: NaiveDate,
) -> Result<RunStats> {
    let username = config.x.username.trim_start_matches('@');
    utils::log::header(&format!("X import for @{username} ({strategy:?})"));

    utils::log::step(1, 3, "Reading existing notes");
    let existing = existing_signatures(store).await;
    log::info!("{} existing notes", existing.len());

    utils::log::step(2, 3, "Collecting posts");
    let search = WindowSearch::new(&config.x, username, config.http.max_retries);
    let posts = match strategy {
        Strategy::Recent => fetch_recent(page, &config.x, username).await?.posts,
        Strategy::Search => {
            let range = config.x.search_range(today)?;
            let outcome = search.run(page, &range).await;
            log::info!(
                "{} windows, {} empty, {} failed, {} out-of-window posts dropped",
                outcome.windows,
                outcome.empty_windows,
                outcome.failed_windows.len(),
                outcome.out_of_window
            );
            outcome.posts
        }
        Strategy::Hybrid => fetch_hybrid(page, &config.x, username, &search).await?.posts,
    };
    log::info!("Collected {} unique posts", posts.len());

    utils::log::step(3, 3, "Writing notes");
    let (fresh, skipped) = plan_writes(posts.into_vec(), &existing);
    if skipped > 0 {
        log::info!("Skipping {skipped} posts already in the destination");
    }

    let writer = DestinationWriter::new(store, media).with_delay(config.http.request_delay_ms);
    let mut stats = writer.write_posts(&fresh, config.memos.visibility).await;
    stats.skipped += skipped;

    log::info!(
        "Done: {} created, {} skipped, {} failed",
        stats.created,
        stats.skipped,
        stats.failed
    );
    Ok(stats)
}
