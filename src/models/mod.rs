// src/models/mod.rs

//! Domain models for the migration tools.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod fingerprint;
mod note;
mod post;
pub mod window;

// Re-export all public types
pub use config::{
    BlueskyConfig, CleanupConfig, Config, CopyConfig, HttpConfig, MemosConfig, XConfig,
    parse_cutoff,
};
pub use fingerprint::{Fingerprint, content_hash, metadata_hash, text_signature};
pub use note::{Blob, Note, NoteDraft, NoteResource, Visibility};
pub use post::{Attachment, MediaType, Post, PostId, PostSet, sort_oldest_first};
pub use window::{DateRange, DateWindow};

/// Counters reported at the end of a write run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunStats {
    pub fn total(&self) -> usize {
        self.created + self.skipped + self.failed
    }
}
