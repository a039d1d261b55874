// src/pipeline/bluesky.rs

//! Bluesky import with self-reply threading.

use std::collections::HashMap;

use crate::error::Result;
use crate::models::{Config, Post, PostId, RunStats, Visibility, sort_oldest_first};
use crate::pipeline::normalize::normalize;
use crate::pipeline::writer::DestinationWriter;
use crate::services::{BlueskyClient, MediaFetcher, NoteStore};
use crate::utils::{self, http, preview};

/// Write roots as notes and self-replies as comments on their thread's note.
///
/// Replies are handled after all roots, oldest first, so a parent is always
/// written before its children.
pub async fn import_posts(
    posts: Vec<Post>,
    writer: &DestinationWriter<'_>,
    visibility: Visibility,
    delay_ms: u64,
) -> RunStats {
    let (mut roots, mut replies): (Vec<Post>, Vec<Post>) =
        posts.into_iter().partition(|p| !p.is_reply());
    sort_oldest_first(&mut roots);
    sort_oldest_first(&mut replies);

    let mut stats = RunStats::default();
    // post id -> memo holding its thread
    let mut threads: HashMap<PostId, String> = HashMap::new();
    let total = roots.len() + replies.len();
    let mut index = 0;

    for post in &roots {
        index += 1;
        utils::log::progress(index, total, &preview(&post.text, 60));
        match writer.write(&normalize(post, visibility)).await {
            Ok(written) => {
                stats.created += 1;
                threads.insert(post.id.clone(), written.name);
            }
            Err(e) => {
                stats.failed += 1;
                log::error!("  Failed to import {}: {e}", post.id);
            }
        }
        http::pause(delay_ms).await;
    }

    for post in &replies {
        index += 1;
        let Some(parent) = post.reply_to.as_ref() else {
            continue;
        };
        let Some(memo) = threads.get(parent).cloned() else {
            stats.skipped += 1;
            log::warn!("[{index}/{total}] Parent of {} was not imported, skipping reply", post.id);
            continue;
        };

        utils::log::progress(index, total, &format!("reply: {}", preview(&post.text, 50)));
        match writer.write_comment(&memo, &memo, &normalize(post, visibility)).await {
            Ok(_) => {
                stats.created += 1;
                threads.insert(post.id.clone(), memo);
            }
            Err(e) => {
                stats.failed += 1;
                log::error!("  Failed to import reply {}: {e}", post.id);
            }
        }
        http::pause(delay_ms).await;
    }

    stats
}

/// Log in, collect the author feed and import it.
pub async fn run_bluesky_import(
    config: &Config,
    client: &BlueskyClient,
    store: &dyn NoteStore,
    media: &dyn MediaFetcher,
) -> Result<RunStats> {
    utils::log::header(&format!("Bluesky import for {}", config.bluesky.handle));

    utils::log::step(1, 3, "Authenticating");
    let session = client
        .login(&config.bluesky.handle, &config.bluesky.password)
        .await?;

    utils::log::step(2, 3, "Fetching posts");
    let posts = client.collect_posts(&session).await;
    let replies = posts.iter().filter(|p| p.is_reply()).count();
    log::info!(
        "Found {} posts ({} originals, {replies} self-replies)",
        posts.len(),
        posts.len() - replies
    );

    utils::log::step(3, 3, "Importing");
    let writer = DestinationWriter::new(store, media);
    let stats = import_posts(posts, &writer, config.memos.visibility, config.http.request_delay_ms).await;

    log::info!(
        "Done: {} imported, {} skipped, {} failed",
        stats.created,
        stats.skipped,
        stats.failed
    );
    Ok(stats)
}
