// src/pipeline/search.rs

//! Chunked historical search.
//!
//! The date range is cut into fixed windows and each window is searched with
//! X's `since:`/`until:` operators. A window that cannot be loaded is logged
//! and listed in the outcome; the run carries on with the next one.

use std::time::Duration;

use url::Url;

use crate::error::Result;
use crate::models::{DateRange, DateWindow, Post, PostSet, XConfig};
use crate::pipeline::scroll::{self, ScrollOptions};
use crate::services::browser::{self, BrowserPage};
use crate::services::timeline;
use crate::utils::{self, http};

/// Search query for one window.
pub fn build_query(username: &str, window: &DateWindow, filter_replies: bool) -> String {
    let mut query = format!(
        "from:{username} since:{} until:{}",
        window.since.format("%Y-%m-%d"),
        window.until.format("%Y-%m-%d")
    );
    if filter_replies {
        query.push_str(" -filter:replies");
    }
    query
}

/// Live-results search URL for one window.
pub fn build_search_url(username: &str, window: &DateWindow, filter_replies: bool) -> Result<String> {
    let query = build_query(username, window, filter_replies);
    let url = Url::parse_with_params(
        "https://x.com/search",
        &[("q", query.as_str()), ("src", "typed_query"), ("f", "live")],
    )?;
    Ok(url.to_string())
}

/// Result of a whole search run.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub posts: PostSet,
    pub windows: usize,
    pub empty_windows: usize,
    pub failed_windows: Vec<DateWindow>,
    /// Posts dropped because their date fell outside the window
    pub out_of_window: usize,
}

/// Searches one account window by window.
pub struct WindowSearch<'a> {
    config: &'a XConfig,
    username: &'a str,
    options: ScrollOptions,
    max_attempts: u32,
    retry_delay: Duration,
}

impl<'a> WindowSearch<'a> {
    pub fn new(config: &'a XConfig, username: &'a str, max_retries: u32) -> Self {
        Self {
            config,
            username,
            options: ScrollOptions::from_config(config),
            max_attempts: max_retries.max(1),
            retry_delay: Duration::from_secs(5),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Navigate with linear backoff. `Ok(false)` means the search has no posts.
    async fn open(&self, page: &mut dyn BrowserPage, url: &str) -> Result<bool> {
        let mut attempt = 1;
        loop {
            match browser::load(page, url, self.options.wait_timeout).await {
                Ok(has_posts) => return Ok(has_posts),
                Err(e) if attempt < self.max_attempts => {
                    log::warn!("Load attempt {attempt}/{} failed: {e}", self.max_attempts);
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Collect the posts of one window, dropping any dated outside it.
    pub async fn search_window(
        &self,
        page: &mut dyn BrowserPage,
        window: &DateWindow,
    ) -> Result<(Vec<Post>, usize)> {
        let url = build_search_url(self.username, window, self.config.filter_replies)?;
        if !self.open(page, &url).await? {
            let html = page.html().await?;
            if timeline::has_no_results(&html) {
                log::debug!("Search reported no results");
            } else {
                log::debug!("Search page rendered without posts");
            }
            return Ok((Vec::new(), 0));
        }

        let window = *window;
        let outcome = scroll::collect(page, &self.options, move |post| match post.created_at {
            Some(ts) => window.contains(ts.date_naive()),
            None => true,
        })
        .await?;

        // count what the filter dropped on the final frame
        let html = page.html().await?;
        let leaked = timeline::extract_posts(&html)
            .map(|posts| {
                posts
                    .iter()
                    .filter(|p| p.created_at.is_some_and(|ts| !window.contains(ts.date_naive())))
                    .count()
            })
            .unwrap_or(0);

        Ok((outcome.posts.into_vec(), leaked))
    }

    /// Search every window of `range`.
    pub async fn run(&self, page: &mut dyn BrowserPage, range: &DateRange) -> SearchOutcome {
        let windows = range.windows(self.config.chunk_days);
        let mut outcome = SearchOutcome {
            windows: windows.len(),
            ..SearchOutcome::default()
        };
        log::info!(
            "Searching {} in {} windows of {} days ({range})",
            self.username,
            windows.len(),
            self.config.chunk_days
        );

        for (i, window) in windows.iter().enumerate() {
            utils::log::progress(i + 1, windows.len(), &window.to_string());
            match self.search_window(page, window).await {
                Ok((posts, leaked)) => {
                    outcome.out_of_window += leaked;
                    if posts.is_empty() {
                        outcome.empty_windows += 1;
                        log::info!("  No posts");
                    } else {
                        let found = posts.len();
                        let added = outcome.posts.extend(posts);
                        log::info!("  {found} posts, {added} new (total {})", outcome.posts.len());
                    }
                }
                Err(e) => {
                    log::warn!("  Window {window} failed: {e}");
                    outcome.failed_windows.push(*window);
                }
            }
            if i + 1 < windows.len() {
                http::pause(self.config.window_delay_ms).await;
            }
        }

        if !outcome.failed_windows.is_empty() {
            let listed: Vec<String> = outcome.failed_windows.iter().map(|w| w.to_string()).collect();
            log::warn!("Failed windows: {}", listed.join(", "));
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::window::parse_day;
    use crate::services::fakes::ScriptedPage;
    use crate::services::timeline::fixtures::{article, page};

    fn config() -> XConfig {
        XConfig {
            chunk_days: 5,
            scroll_delay_ms: 0,
            window_delay_ms: 0,
            wait_timeout_secs: 0,
            ..XConfig::default()
        }
    }

    fn window(since: &str, until: &str) -> DateWindow {
        DateWindow {
            since: parse_day(since).unwrap(),
            until: parse_day(until).unwrap(),
        }
    }

    #[test]
    fn test_query_and_url() {
        let w = window("2020-01-01", "2020-01-06");
        assert_eq!(
            build_query("alice", &w, true),
            "from:alice since:2020-01-01 until:2020-01-06 -filter:replies"
        );
        assert_eq!(build_query("alice", &w, false), "from:alice since:2020-01-01 until:2020-01-06");

        let url = build_search_url("alice", &w, false).unwrap();
        assert!(url.starts_with("https://x.com/search?q=from%3Aalice+since%3A2020-01-01"));
        assert!(url.ends_with("&src=typed_query&f=live"));
    }

    #[tokio::test]
    async fn test_windows_merge_skip_empty_and_drop_leakage() {
        let w1 = page(&[
            article("1", "jan 2", "2020-01-02T10:00:00Z", &[], false),
            article("9", "jan 20", "2020-01-20T10:00:00Z", &[], false),
        ]);
        let w2 = page(&[
            article("2", "jan 7", "2020-01-07T10:00:00Z", &[], false),
            article("1", "jan 2", "2020-01-02T10:00:00Z", &[], false),
        ]);
        let empty = page(&[]);

        let mut tab = ScriptedPage::new(vec![empty])
            .route("since%3A2020-01-01", vec![w1])
            .route("since%3A2020-01-06", vec![w2]);

        let range = DateRange::new(parse_day("2020-01-01").unwrap(), parse_day("2020-01-16").unwrap()).unwrap();
        let outcome = WindowSearch::new(&config(), "alice", 1).run(&mut tab, &range).await;

        assert_eq!(outcome.windows, 3);
        assert_eq!(outcome.empty_windows, 1);
        assert!(outcome.failed_windows.is_empty());
        // post 9 leaks into the first window, post 1 into the second
        assert_eq!(outcome.out_of_window, 2);
        let ids: Vec<_> = outcome.posts.iter().map(|p| p.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_failed_window_is_listed_and_run_continues() {
        let ok = page(&[article("5", "later", "2020-01-08T10:00:00Z", &[], false)]);
        let mut tab = ScriptedPage::new(vec![ok]).fail("since%3A2020-01-01");

        let range = DateRange::new(parse_day("2020-01-01").unwrap(), parse_day("2020-01-11").unwrap()).unwrap();
        let outcome = WindowSearch::new(&config(), "alice", 2)
            .with_retry_delay(Duration::ZERO)
            .run(&mut tab, &range)
            .await;

        assert_eq!(outcome.failed_windows, vec![window("2020-01-01", "2020-01-06")]);
        assert_eq!(outcome.posts.len(), 1);
        // two attempts on the failing window, one on the good one
        assert_eq!(tab.visited.len(), 3);
    }
}
