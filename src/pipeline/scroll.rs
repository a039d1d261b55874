// src/pipeline/scroll.rs

//! Read-and-scroll collection from a rendered timeline.

use std::time::Duration;

use crate::error::Result;
use crate::models::{Post, PostSet, XConfig};
use crate::services::browser::{self, BrowserPage};
use crate::services::timeline;
use crate::utils::http;

/// Limits for one scroll session.
#[derive(Debug, Clone)]
pub struct ScrollOptions {
    pub max_scrolls: u32,
    pub max_posts: Option<usize>,
    pub stall_limit: u32,
    pub scroll_delay_ms: u64,
    pub wait_timeout: Duration,
}

impl ScrollOptions {
    pub fn from_config(config: &XConfig) -> Self {
        Self {
            max_scrolls: config.max_scrolls,
            max_posts: config.max_posts,
            stall_limit: config.stall_limit.max(1),
            scroll_delay_ms: config.scroll_delay_ms,
            wait_timeout: Duration::from_secs(config.wait_timeout_secs),
        }
    }
}

/// Why a scroll session ended. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Stalled,
    MaxPosts,
    ScrollLimit,
    EndOfTimeline,
}

#[derive(Debug)]
pub struct ScrollOutcome {
    pub posts: PostSet,
    pub scrolls: u32,
    pub stop: StopReason,
}

/// Collect posts from the current page until a stop condition holds.
///
/// Only posts accepted by `keep` are counted as new.
pub async fn collect(
    page: &mut dyn BrowserPage,
    options: &ScrollOptions,
    keep: impl Fn(&Post) -> bool + Send,
) -> Result<ScrollOutcome> {
    let mut posts = PostSet::new();
    let mut scrolls = 0;
    let mut stalls = 0;

    let stop = loop {
        let html = page.html().await?;
        let visible = match timeline::extract_posts(&html) {
            Ok(visible) => visible,
            Err(e) => {
                log::warn!("Could not read timeline: {e}");
                Vec::new()
            }
        };

        let mut added = 0;
        for post in visible.into_iter().filter(|p| keep(p)) {
            if posts.insert(post) {
                added += 1;
            }
            if options.max_posts.is_some_and(|max| posts.len() >= max) {
                break;
            }
        }
        log::debug!("Scroll {scrolls}: {added} new, {} total", posts.len());

        if options.max_posts.is_some_and(|max| posts.len() >= max) {
            break StopReason::MaxPosts;
        }
        if added == 0 {
            stalls += 1;
            if stalls >= options.stall_limit {
                break StopReason::Stalled;
            }
        } else {
            stalls = 0;
        }
        if timeline::is_exhausted(&html) {
            break StopReason::EndOfTimeline;
        }
        if scrolls >= options.max_scrolls {
            break StopReason::ScrollLimit;
        }

        page.scroll().await?;
        scrolls += 1;
        http::pause(options.scroll_delay_ms).await;
    };

    Ok(ScrollOutcome {
        posts,
        scrolls,
        stop,
    })
}

/// Fetch the most recent posts from a profile page.
pub async fn fetch_recent(
    page: &mut dyn BrowserPage,
    config: &XConfig,
    username: &str,
) -> Result<ScrollOutcome> {
    let options = ScrollOptions::from_config(config);
    let url = format!("https://x.com/{username}");
    log::info!("Loading profile {url}");

    if !browser::load(page, &url, options.wait_timeout).await? {
        log::warn!("Profile rendered without posts");
    }

    let outcome = collect(page, &options, |_| true).await?;
    log::info!(
        "Recent fetch stopped ({:?}) after {} scrolls with {} posts",
        outcome.stop,
        outcome.scrolls,
        outcome.posts.len()
    );
    Ok(outcome)
}
