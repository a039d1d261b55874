// src/pipeline/copy.rs

//! Copy every note of one Memos account to another.

use std::time::Instant;

use crate::error::Result;
use crate::models::{Note, NoteResource, RunStats};
use crate::services::NoteStore;
use crate::utils::{self, http, preview};

const PROGRESS_EVERY: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    /// Prepend `@handle:` to every copied note
    pub add_prefix_handle: Option<String>,
    /// Only copy notes starting with `@handle:`, without the prefix
    pub filter_handle: Option<String>,
    pub dry_run: bool,
    pub delay_ms: u64,
}

fn handle_prefix(handle: &str) -> String {
    format!("@{}:", handle.trim().trim_start_matches('@'))
}

/// Content to write for a source note, or `None` when the filter rejects it.
pub fn prepare_content(content: &str, options: &CopyOptions) -> Option<String> {
    if let Some(handle) = &options.filter_handle {
        let prefix = handle_prefix(handle);
        return content
            .trim_start()
            .strip_prefix(prefix.as_str())
            .map(|rest| rest.trim_start().to_string());
    }
    if let Some(handle) = &options.add_prefix_handle {
        return Some(format!("{}\n{content}", handle_prefix(handle)));
    }
    Some(content.to_string())
}

/// Copies notes between two stores.
pub struct AccountCopier<'a> {
    source: &'a dyn NoteStore,
    dest: &'a dyn NoteStore,
    options: CopyOptions,
}

impl<'a> AccountCopier<'a> {
    pub fn new(source: &'a dyn NoteStore, dest: &'a dyn NoteStore, options: CopyOptions) -> Self {
        Self {
            source,
            dest,
            options,
        }
    }

    async fn attachments_of(&self, note: &Note) -> Vec<NoteResource> {
        match self.source.list_attachments(&note.name).await {
            Ok(list) if !list.is_empty() => list,
            Ok(_) => note.resources().to_vec(),
            Err(e) => {
                log::warn!("Could not list attachments of {}: {e}", note.name);
                note.resources().to_vec()
            }
        }
    }

    /// Copy one note with its timestamp and attachments. Returns the number of
    /// attachments copied.
    pub async fn copy_note(&self, note: &Note, content: &str) -> Result<usize> {
        let resources = self.attachments_of(note).await;
        let created = self.dest.create_note(content, note.visibility).await?;

        if let Some(created_at) = note.created_at {
            if let Err(e) = self.dest.set_create_time(&created.name, created_at).await {
                log::warn!("Could not back-date {}: {e}", created.name);
            }
        }

        let mut copied = 0;
        for resource in &resources {
            let result = match self.source.download_attachment(resource).await {
                Ok(blob) => self.dest.upload_attachment(&created.name, &blob).await.map(|_| ()),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => copied += 1,
                Err(e) => log::warn!("Attachment {} not copied: {e}", resource.filename),
            }
        }
        Ok(copied)
    }

    pub async fn run(&self) -> Result<RunStats> {
        let notes = self.source.list_notes().await?;
        let total = notes.len();
        let mut stats = RunStats::default();
        let started = Instant::now();

        for (i, note) in notes.iter().enumerate() {
            let Some(content) = prepare_content(&note.content, &self.options) else {
                stats.skipped += 1;
                continue;
            };

            if self.options.dry_run {
                utils::log::progress(i + 1, total, &format!("would copy {}", preview(&content, 60)));
                stats.created += 1;
            } else {
                match self.copy_note(note, &content).await {
                    Ok(attachments) => {
                        stats.created += 1;
                        log::debug!("Copied {} with {attachments} attachments", note.name);
                    }
                    Err(e) => {
                        stats.failed += 1;
                        log::error!("Failed to copy {}: {e}", note.name);
                    }
                }
                http::pause(self.options.delay_ms).await;
            }

            let done = i + 1;
            if done % PROGRESS_EVERY == 0 {
                let elapsed = started.elapsed().as_secs_f64();
                let rate = if elapsed > 0.0 { done as f64 / elapsed } else { 0.0 };
                let eta = if rate > 0.0 { (total - done) as f64 / rate } else { 0.0 };
                log::info!(
                    "Progress {done}/{total} ({rate:.1} notes/s, ETA {:.0}m {:.0}s)",
                    (eta / 60.0).floor(),
                    eta % 60.0
                );
            }
        }

        log::info!(
            "Copy finished: {} copied, {} filtered out, {} failed",
            stats.created,
            stats.skipped,
            stats.failed
        );
        Ok(stats)
    }
}
