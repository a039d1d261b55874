// src/pipeline/writer.rs

//! Writes note drafts to the destination.

use crate::error::Result;
use crate::models::{NoteDraft, Post, RunStats, Visibility};
use crate::pipeline::normalize::normalize;
use crate::services::{MediaFetcher, NoteStore};
use crate::utils::{self, http, preview};

/// Outcome of writing one draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    /// Name of the created note or comment
    pub name: String,
    pub uploaded: usize,
    pub failed_attachments: usize,
}

/// Creates notes, back-dates them and uploads attachments in source order.
pub struct DestinationWriter<'a> {
    store: &'a dyn NoteStore,
    media: &'a dyn MediaFetcher,
    delay_ms: u64,
}

impl<'a> DestinationWriter<'a> {
    pub fn new(store: &'a dyn NoteStore, media: &'a dyn MediaFetcher) -> Self {
        Self {
            store,
            media,
            delay_ms: 0,
        }
    }

    /// Pause between consecutive posts in [`write_posts`](Self::write_posts).
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Create one note from a draft.
    ///
    /// Only the create call is fatal for the draft. A failed back-date or
    /// attachment is logged and the note is kept.
    pub async fn write(&self, draft: &NoteDraft) -> Result<Written> {
        let note = self.store.create_note(&draft.content, draft.visibility).await?;
        self.backdate(&note.name, draft).await;
        let (uploaded, failed_attachments) = self.upload_all(&note.name, draft).await;
        Ok(Written {
            name: note.name,
            uploaded,
            failed_attachments,
        })
    }

    /// Create a comment under `parent`; its attachments go to `attach_to`.
    pub async fn write_comment(
        &self,
        parent: &str,
        attach_to: &str,
        draft: &NoteDraft,
    ) -> Result<Written> {
        let comment = self.store.create_comment(parent, &draft.content).await?;
        self.backdate(&comment.name, draft).await;
        let (uploaded, failed_attachments) = self.upload_all(attach_to, draft).await;
        Ok(Written {
            name: comment.name,
            uploaded,
            failed_attachments,
        })
    }

    async fn backdate(&self, name: &str, draft: &NoteDraft) {
        if let Some(created_at) = draft.created_at {
            if let Err(e) = self.store.set_create_time(name, created_at).await {
                log::warn!("Could not back-date {name}: {e}");
            }
        }
    }

    async fn upload_all(&self, note_name: &str, draft: &NoteDraft) -> (usize, usize) {
        let mut uploaded = 0;
        let mut failed = 0;
        for attachment in &draft.attachments {
            let result = match self.media.fetch(attachment).await {
                Ok(blob) => self.store.upload_attachment(note_name, &blob).await.map(|_| ()),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => uploaded += 1,
                Err(e) => {
                    failed += 1;
                    log::warn!("Attachment {} not uploaded: {e}", attachment.url);
                }
            }
        }
        (uploaded, failed)
    }

    /// Write posts in the given order, one note each.
    pub async fn write_posts(&self, posts: &[Post], visibility: Visibility) -> RunStats {
        let mut stats = RunStats::default();
        for (i, post) in posts.iter().enumerate() {
            utils::log::progress(i + 1, posts.len(), &preview(&post.text, 60));
            match self.write(&normalize(post, visibility)).await {
                Ok(written) => {
                    stats.created += 1;
                    log::info!(
                        "  Created {} ({} attachments)",
                        written.name,
                        written.uploaded
                    );
                }
                Err(e) => {
                    stats.failed += 1;
                    log::error!("  Failed to write post {}: {e}", post.id);
                }
            }
            if i + 1 < posts.len() {
                http::pause(self.delay_ms).await;
            }
        }
        stats
    }
}
