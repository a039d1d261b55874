//! memos-migrate CLI
//!
//! Imports Bluesky and X posts into Memos and cleans up the destination.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use memos_migrate::{
    error::Result,
    models::{Config, parse_cutoff},
    pipeline::{self, AccountCopier, AttachmentDigest, CopyOptions, DedupOptions, DeleteMode},
    services::{BlueskyClient, HttpMediaFetcher, MemosClient},
    utils::http,
};
use tokio::io::{AsyncBufReadExt, BufReader};

/// memos-migrate - move social posts into Memos
#[derive(Parser, Debug)]
#[command(
    name = "memos-migrate",
    version,
    about = "Import Bluesky and X posts into Memos and clean up the result"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "memos-migrate.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import posts and self-reply threads from Bluesky
    Bluesky,

    /// Import posts from X through a headless browser
    #[cfg(feature = "browser")]
    X {
        /// How to collect posts
        #[arg(value_enum, default_value = "hybrid")]
        strategy: StrategyArg,

        /// First year to search
        #[arg(long)]
        start_year: Option<i32>,

        /// Last year to search (inclusive)
        #[arg(long)]
        end_year: Option<i32>,

        /// Search window size in days
        #[arg(long)]
        chunk_days: Option<u32>,

        /// Maximum scrolls on the profile page
        #[arg(long)]
        max_scrolls: Option<u32>,

        /// Stop the recent fetch after this many posts
        #[arg(long)]
        max_posts: Option<usize>,
    },

    /// Delete duplicate notes, keeping the oldest of each group
    Dedup {
        /// Actually delete (default is a dry run)
        #[arg(long)]
        execute: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Only group notes created on the same day
        #[arg(long)]
        same_day: bool,

        /// Compare attachments by filename, type and size instead of
        /// downloading them (faster, but may group different images)
        #[arg(long)]
        metadata_only: bool,
    },

    /// Delete notes created before a cutoff date
    Prune {
        /// Cutoff as YYYY-MM-DD or RFC 3339 (overrides CUTOFF_DATE)
        #[arg(long)]
        cutoff: Option<String>,

        /// Actually delete (default is a dry run)
        #[arg(long)]
        execute: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Copy all notes from one Memos account to another
    Copy {
        /// Log what would be copied without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate configuration
    Validate,
}

#[cfg(feature = "browser")]
#[derive(ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    Recent,
    Search,
    Hybrid,
}

#[cfg(feature = "browser")]
impl From<StrategyArg> for pipeline::Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Recent => Self::Recent,
            StrategyArg::Search => Self::Search,
            StrategyArg::Hybrid => Self::Hybrid,
        }
    }
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Ask for `yes` on stdin.
async fn confirm(prompt: &str) -> Result<bool> {
    println!("{prompt} Type 'yes' to continue:");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim().eq_ignore_ascii_case("yes"))
}

async fn destination(config: &Config) -> Result<MemosClient> {
    config.require_memos()?;
    let client = http::create_client(&config.http)?;
    let store = MemosClient::from_config(client, &config.memos, &config.http);
    store.verify().await?;
    Ok(store)
}

#[cfg(feature = "browser")]
async fn run_x(config: &Config, strategy: pipeline::Strategy) -> Result<()> {
    use memos_migrate::services::{VideoDownloader, WebDriverPage, x_session_cookies};

    config.require_x()?;
    let store = destination(config).await?;
    let client = http::create_client(&config.http)?;

    let cookies = x_session_cookies(&config.x.auth_token, &config.x.ct0);
    let media = HttpMediaFetcher::new(client, Duration::from_secs(config.http.upload_timeout_secs))
        .with_video(VideoDownloader::new(&config.x.yt_dlp, &cookies)?);

    let mut page = WebDriverPage::connect(&config.x.webdriver_url).await?;
    if let Err(e) = page.install_cookies("https://x.com", &cookies).await {
        if let Err(close) = page.close().await {
            log::warn!("Browser session did not close cleanly: {close}");
        }
        return Err(e);
    }

    let today = chrono::Utc::now().date_naive();
    let result = pipeline::run_x_import(config, strategy, &mut page, &store, &media, today).await;
    if let Err(e) = page.close().await {
        log::warn!("Browser session did not close cleanly: {e}");
    }
    result.map(|_| ())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env()?;
    config.validate()?;

    match cli.command {
        Command::Bluesky => {
            config.require_bluesky()?;
            let store = destination(&config).await?;
            let client = http::create_client(&config.http)?;
            let media = HttpMediaFetcher::new(
                client.clone(),
                Duration::from_secs(config.http.upload_timeout_secs),
            );
            let bluesky = BlueskyClient::new(client, &config.bluesky, &config.http);
            pipeline::run_bluesky_import(&config, &bluesky, &store, &media).await?;
        }

        #[cfg(feature = "browser")]
        Command::X {
            strategy,
            start_year,
            end_year,
            chunk_days,
            max_scrolls,
            max_posts,
        } => {
            if let Some(y) = start_year {
                config.x.start_year = y;
                config.x.start_date = None;
            }
            if let Some(y) = end_year {
                config.x.end_year = Some(y);
                config.x.end_date = None;
            }
            if let Some(d) = chunk_days {
                config.x.chunk_days = d;
            }
            if let Some(n) = max_scrolls {
                config.x.max_scrolls = n;
            }
            if max_posts.is_some() {
                config.x.max_posts = max_posts;
            }
            config.validate()?;
            run_x(&config, strategy.into()).await?;
        }

        Command::Dedup {
            execute,
            yes,
            same_day,
            metadata_only,
        } => {
            let store = destination(&config).await?;
            let options = DedupOptions {
                digest: if metadata_only {
                    AttachmentDigest::Metadata
                } else {
                    AttachmentDigest::Content
                },
                same_day,
            };
            let plan = pipeline::plan_dedup(&store, options).await?;
            let doomed = plan.deletions();

            let mode = DeleteMode::from_flags(execute, config.cleanup.dry_run);
            if doomed.is_empty() {
                log::info!("No duplicates found");
            } else if mode.is_dry_run() || yes || confirm(&format!("Delete {} duplicate notes?", doomed.len())).await? {
                pipeline::delete_notes(&store, &doomed, mode, config.http.request_delay_ms).await;
            } else {
                log::info!("Cancelled");
            }
        }

        Command::Prune {
            cutoff,
            execute,
            yes,
        } => {
            let cutoff = match cutoff {
                Some(raw) => parse_cutoff(&raw)?,
                None => config.cutoff()?,
            };
            let store = destination(&config).await?;
            let mode = DeleteMode::from_flags(execute, config.cleanup.dry_run);
            if !mode.is_dry_run()
                && !yes
                && !confirm(&format!("Delete every note created before {cutoff}?")).await?
            {
                log::info!("Cancelled");
                return Ok(());
            }
            pipeline::run_prune(&store, cutoff, mode, config.http.request_delay_ms).await?;
        }

        Command::Copy { dry_run } => {
            config.require_copy()?;
            let client = http::create_client(&config.http)?;
            let copy = &config.copy;
            let source = MemosClient::new(client.clone(), &copy.source_host, &copy.source_token, &config.http)
                .with_paging(config.memos.page_size, config.memos.max_pages);
            let dest = MemosClient::new(client, &copy.dest_host, &copy.dest_token, &config.http);
            source.verify().await?;
            dest.verify().await?;

            let options = CopyOptions {
                add_prefix_handle: copy.add_prefix_handle.clone(),
                filter_handle: copy.filter_handle.clone(),
                dry_run,
                delay_ms: config.http.request_delay_ms,
            };
            let stats = AccountCopier::new(&source, &dest, options).run().await?;
            if stats.failed > 0 {
                log::warn!("{} notes could not be copied", stats.failed);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            let checks: [(&str, Result<()>); 4] = [
                ("memos", config.require_memos()),
                ("bluesky", config.require_bluesky()),
                ("x", config.require_x()),
                ("copy", config.require_copy()),
            ];
            for (section, check) in checks {
                match check {
                    Ok(()) => log::info!("✓ {section} credentials present"),
                    Err(e) => log::warn!("✗ {section}: {e}"),
                }
            }
            if let Some(raw) = &config.cleanup.cutoff_date {
                log::info!("✓ cutoff {}", parse_cutoff(raw)?);
            }
            log::info!("Config OK");
        }
    }

    Ok(())
}
