//! Application configuration structures.
//!
//! Values come from an optional TOML file and are then overlaid with
//! environment variables (a `.env` file is honored by the CLI).

use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::window::{DateRange, parse_day, year_start};
use crate::models::Visibility;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Destination Memos instance
    #[serde(default)]
    pub memos: MemosConfig,

    /// HTTP client behavior
    #[serde(default)]
    pub http: HttpConfig,

    /// Bluesky source
    #[serde(default)]
    pub bluesky: BlueskyConfig,

    /// X scraping
    #[serde(default)]
    pub x: XConfig,

    /// Duplicate and cutoff cleanup
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Account to account copy
    #[serde(default)]
    pub copy: CopyConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        if !path.as_ref().exists() {
            log::debug!("No config file at {:?}, using defaults", path.as_ref());
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| lookup(k))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get(&["MEMOS_HOST", "MEMOS_URL"]) {
            self.memos.host = v;
        }
        if let Some(v) = get(&["MEMOS_ACCESS_TOKEN", "MEMOS_TOKEN"]) {
            self.memos.token = v;
        }
        if let Some(v) = get(&["PAGE_SIZE"]) {
            self.memos.page_size = parse_num("PAGE_SIZE", &v)?;
        }

        if let Some(v) = get(&["RATE_LIMIT_DELAY"]) {
            let secs: f64 = parse_num("RATE_LIMIT_DELAY", &v)?;
            self.http.request_delay_ms = (secs * 1000.0).round() as u64;
        }
        if let Some(v) = get(&["MAX_RETRIES"]) {
            self.http.max_retries = parse_num("MAX_RETRIES", &v)?;
        }

        if let Some(v) = get(&["BLUESKY_SERVICE"]) {
            self.bluesky.service = v;
        }
        if let Some(v) = get(&["BLUESKY_HANDLE"]) {
            self.bluesky.handle = v;
        }
        if let Some(v) = get(&["BLUESKY_PASSWORD"]) {
            self.bluesky.password = v;
        }

        if let Some(v) = get(&["X_USERNAME"]) {
            self.x.username = v.trim_start_matches('@').to_string();
        }
        if let Some(v) = get(&["X_AUTH_TOKEN"]) {
            self.x.auth_token = v;
        }
        if let Some(v) = get(&["X_CT0"]) {
            self.x.ct0 = v;
        }
        if let Some(v) = get(&["WEBDRIVER_URL"]) {
            self.x.webdriver_url = v;
        }
        if let Some(v) = get(&["X_MAX_SCROLLS"]) {
            self.x.max_scrolls = parse_num("X_MAX_SCROLLS", &v)?;
        }
        if let Some(v) = get(&["X_MAX_POSTS"]) {
            self.x.max_posts = Some(parse_num("X_MAX_POSTS", &v)?);
        }
        if let Some(v) = get(&["X_START_YEAR"]) {
            self.x.start_year = parse_num("X_START_YEAR", &v)?;
        }
        if let Some(v) = get(&["X_END_YEAR"]) {
            self.x.end_year = Some(parse_num("X_END_YEAR", &v)?);
        }
        if let Some(v) = get(&["X_START_DATE"]) {
            self.x.start_date = Some(parse_day(&v)?);
        }
        if let Some(v) = get(&["X_END_DATE"]) {
            self.x.end_date = Some(parse_day(&v)?);
        }
        let (start_month, start_day) = (get(&["X_START_MONTH"]), get(&["X_START_DAY"]));
        if get(&["X_START_DATE"]).is_none() && (start_month.is_some() || start_day.is_some()) {
            self.x.start_date = Some(compose_day(
                "X_START",
                self.x.start_year,
                start_month.as_deref(),
                start_day.as_deref(),
            )?);
        }
        let (end_month, end_day) = (get(&["X_END_MONTH"]), get(&["X_END_DAY"]));
        if get(&["X_END_DATE"]).is_none() && (end_month.is_some() || end_day.is_some()) {
            let year = self
                .x
                .end_year
                .ok_or_else(|| AppError::config("X_END_MONTH and X_END_DAY need X_END_YEAR"))?;
            self.x.end_date = Some(compose_day("X_END", year, end_month.as_deref(), end_day.as_deref())?);
        }
        if let Some(v) = get(&["X_CHUNK_DAYS"]) {
            self.x.chunk_days = parse_num("X_CHUNK_DAYS", &v)?;
        }
        if let Some(v) = get(&["X_FILTER_REPLIES"]) {
            self.x.filter_replies = parse_bool("X_FILTER_REPLIES", &v)?;
        }

        if let Some(v) = get(&["CUTOFF_DATE"]) {
            self.cleanup.cutoff_date = Some(v);
        }
        if let Some(v) = get(&["DRY_RUN"]) {
            self.cleanup.dry_run = parse_bool("DRY_RUN", &v)?;
        }

        if let Some(v) = get(&["MIGRATION_SOURCE_HOST"]) {
            self.copy.source_host = v;
        }
        if let Some(v) = get(&["MIGRATION_SOURCE_TOKEN"]) {
            self.copy.source_token = v;
        }
        if let Some(v) = get(&["MIGRATION_DEST_HOST"]) {
            self.copy.dest_host = v;
        }
        if let Some(v) = get(&["MIGRATION_DEST_TOKEN"]) {
            self.copy.dest_token = v;
        }
        if let Some(v) = get(&["MIGRATION_ADD_PREFIX_HANDLE"]) {
            self.copy.add_prefix_handle = Some(v);
        }
        if let Some(v) = get(&["MIGRATION_FILTER_HANDLE"]) {
            self.copy.filter_handle = Some(v);
        }

        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.memos.page_size == 0 {
            return Err(AppError::validation("memos.page_size must be > 0"));
        }
        if self.x.chunk_days == 0 {
            return Err(AppError::validation("x.chunk_days must be > 0"));
        }
        if self.x.stall_limit == 0 {
            return Err(AppError::validation("x.stall_limit must be > 0"));
        }
        if let Some(cutoff) = &self.cleanup.cutoff_date {
            parse_cutoff(cutoff)?;
        }
        Ok(())
    }

    /// Require destination host and token.
    pub fn require_memos(&self) -> Result<()> {
        require(&self.memos.host, "MEMOS_HOST")?;
        require(&self.memos.token, "MEMOS_ACCESS_TOKEN")
    }

    /// Require Bluesky credentials.
    pub fn require_bluesky(&self) -> Result<()> {
        require(&self.bluesky.handle, "BLUESKY_HANDLE")?;
        require(&self.bluesky.password, "BLUESKY_PASSWORD")
    }

    /// Require the X account and its session cookies.
    pub fn require_x(&self) -> Result<()> {
        require(&self.x.username, "X_USERNAME")?;
        require(&self.x.auth_token, "X_AUTH_TOKEN")?;
        require(&self.x.ct0, "X_CT0")
    }

    /// Require both ends of an account copy.
    pub fn require_copy(&self) -> Result<()> {
        require(&self.copy.source_host, "MIGRATION_SOURCE_HOST")?;
        require(&self.copy.source_token, "MIGRATION_SOURCE_TOKEN")?;
        require(&self.copy.dest_host, "MIGRATION_DEST_HOST")?;
        require(&self.copy.dest_token, "MIGRATION_DEST_TOKEN")
    }

    /// Cutoff instant for bulk deletion.
    pub fn cutoff(&self) -> Result<DateTime<Utc>> {
        let raw = self
            .cleanup
            .cutoff_date
            .as_deref()
            .ok_or_else(|| AppError::config("Missing required setting CUTOFF_DATE"))?;
        parse_cutoff(raw)
    }
}

/// Destination Memos instance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemosConfig {
    /// Base URL, e.g. `https://memos.example.com`
    #[serde(default)]
    pub host: String,

    /// Access token sent as a bearer token
    #[serde(default)]
    pub token: String,

    /// Visibility of imported notes
    #[serde(default)]
    pub visibility: Visibility,

    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// Safety cap on list pagination
    #[serde(default = "defaults::max_pages")]
    pub max_pages: u32,
}

impl Default for MemosConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            token: String::new(),
            visibility: Visibility::Private,
            page_size: defaults::page_size(),
            max_pages: defaults::max_pages(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Longer timeout for attachment uploads and downloads
    #[serde(default = "defaults::upload_timeout")]
    pub upload_timeout_secs: u64,

    /// Delay between write requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Attempts for source page fetches
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            upload_timeout_secs: defaults::upload_timeout(),
            request_delay_ms: defaults::request_delay(),
            max_retries: defaults::max_retries(),
        }
    }
}

/// Bluesky account settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueskyConfig {
    /// PDS / entryway base URL
    #[serde(default = "defaults::bluesky_service")]
    pub service: String,

    #[serde(default)]
    pub handle: String,

    /// App password
    #[serde(default)]
    pub password: String,

    #[serde(default = "defaults::pagination_delay")]
    pub pagination_delay_ms: u64,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service: defaults::bluesky_service(),
            handle: String::new(),
            password: String::new(),
            pagination_delay_ms: defaults::pagination_delay(),
        }
    }
}

/// X scraping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XConfig {
    /// Account to scrape, without `@`
    #[serde(default)]
    pub username: String,

    /// `auth_token` session cookie
    #[serde(default)]
    pub auth_token: String,

    /// `ct0` session cookie
    #[serde(default)]
    pub ct0: String,

    /// WebDriver endpoint (chromedriver)
    #[serde(default = "defaults::webdriver_url")]
    pub webdriver_url: String,

    #[serde(default = "defaults::max_scrolls")]
    pub max_scrolls: u32,

    /// Stop the recent fetch after this many posts
    #[serde(default)]
    pub max_posts: Option<usize>,

    /// Consecutive scrolls without new posts before giving up
    #[serde(default = "defaults::stall_limit")]
    pub stall_limit: u32,

    #[serde(default = "defaults::scroll_delay")]
    pub scroll_delay_ms: u64,

    /// Pause between search windows
    #[serde(default = "defaults::window_delay")]
    pub window_delay_ms: u64,

    /// Search window size in days
    #[serde(default = "defaults::chunk_days")]
    pub chunk_days: u32,

    #[serde(default = "defaults::start_year")]
    pub start_year: i32,

    /// Defaults to the current year
    #[serde(default)]
    pub end_year: Option<i32>,

    /// Exact start date, overrides `start_year`
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// Exact exclusive end date, overrides `end_year`
    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    /// Append `-filter:replies` to search queries
    #[serde(default = "defaults::yes")]
    pub filter_replies: bool,

    /// Seconds to wait for timeline elements
    #[serde(default = "defaults::wait_timeout")]
    pub wait_timeout_secs: u64,

    /// yt-dlp executable for video attachments
    #[serde(default = "defaults::yt_dlp")]
    pub yt_dlp: String,
}

impl XConfig {
    /// Date range for the chunked search.
    pub fn search_range(&self, today: NaiveDate) -> Result<DateRange> {
        let start = match self.start_date {
            Some(d) => d,
            None => year_start(self.start_year)?,
        };
        let end = match (self.end_date, self.end_year) {
            (Some(d), _) => d,
            (None, Some(y)) => year_start(y + 1)?,
            (None, None) => today.succ_opt().unwrap_or(today),
        };
        DateRange::new(start, end)
    }

    /// First day the hybrid historical phase may search.
    pub fn history_start(&self) -> Result<NaiveDate> {
        match self.start_date {
            Some(d) => Ok(d),
            None => year_start(self.start_year),
        }
    }
}

impl Default for XConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            auth_token: String::new(),
            ct0: String::new(),
            webdriver_url: defaults::webdriver_url(),
            max_scrolls: defaults::max_scrolls(),
            max_posts: None,
            stall_limit: defaults::stall_limit(),
            scroll_delay_ms: defaults::scroll_delay(),
            window_delay_ms: defaults::window_delay(),
            chunk_days: defaults::chunk_days(),
            start_year: defaults::start_year(),
            end_year: None,
            start_date: None,
            end_date: None,
            filter_replies: true,
            wait_timeout_secs: defaults::wait_timeout(),
            yt_dlp: defaults::yt_dlp(),
        }
    }
}

/// Cleanup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Delete notes created before this date (`YYYY-MM-DD` or RFC 3339)
    #[serde(default)]
    pub cutoff_date: Option<String>,

    /// Report instead of deleting
    #[serde(default = "defaults::yes")]
    pub dry_run: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            cutoff_date: None,
            dry_run: true,
        }
    }
}

/// Account copy settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CopyConfig {
    #[serde(default)]
    pub source_host: String,
    #[serde(default)]
    pub source_token: String,
    #[serde(default)]
    pub dest_host: String,
    #[serde(default)]
    pub dest_token: String,

    /// Prepend `@handle:` to copied content
    #[serde(default)]
    pub add_prefix_handle: Option<String>,

    /// Only copy notes starting with `@handle:` and strip that prefix
    #[serde(default)]
    pub filter_handle: Option<String>,
}

/// Parse a cutoff as a day (UTC midnight) or a full RFC 3339 instant.
pub fn parse_cutoff(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let day = parse_day(raw)
        .map_err(|e| AppError::config(format!("Invalid cutoff date '{raw}': {e}")))?;
    Ok(day.and_time(NaiveTime::MIN).and_utc())
}

fn require(value: &str, key: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::config(format!("Missing required setting {key}")));
    }
    Ok(())
}

fn parse_num<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| AppError::config(format!("{key}='{raw}' is not a valid number: {e}")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::config(format!(
            "{key}='{raw}' is not a boolean (use true or false)"
        ))),
    }
}

/// Build a day from a year and optional `<prefix>_MONTH`/`<prefix>_DAY` values.
fn compose_day(prefix: &str, year: i32, month: Option<&str>, day: Option<&str>) -> Result<NaiveDate> {
    let month: u32 = match month {
        Some(m) => parse_num(&format!("{prefix}_MONTH"), m)?,
        None => 1,
    };
    let day: u32 = match day {
        Some(d) => parse_num(&format!("{prefix}_DAY"), d)?,
        None => 1,
    };
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        AppError::config(format!("{prefix}: {year}-{month}-{day} is not a valid date"))
    })
}

mod defaults {
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; memos-migrate/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn upload_timeout() -> u64 {
        120
    }
    pub fn request_delay() -> u64 {
        500
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn page_size() -> u32 {
        100
    }
    pub fn max_pages() -> u32 {
        1000
    }
    pub fn bluesky_service() -> String {
        "https://bsky.social".into()
    }
    pub fn pagination_delay() -> u64 {
        1000
    }
    pub fn webdriver_url() -> String {
        "http://localhost:9515".into()
    }
    pub fn max_scrolls() -> u32 {
        50
    }
    pub fn stall_limit() -> u32 {
        2
    }
    pub fn scroll_delay() -> u64 {
        3000
    }
    pub fn window_delay() -> u64 {
        5000
    }
    pub fn chunk_days() -> u32 {
        5
    }
    pub fn start_year() -> i32 {
        2015
    }
    pub fn wait_timeout() -> u64 {
        15
    }
    pub fn yt_dlp() -> String {
        "yt-dlp".into()
    }
    pub fn yes() -> bool {
        true
    }
}
