//! Service layer for the migration tools.
//!
//! This module contains the clients for:
//! - The destination note service (`MemosClient`)
//! - Bluesky (`BlueskyClient`)
//! - X timelines in a headless browser (`BrowserPage`, timeline extraction)
//! - Attachment downloads (`HttpMediaFetcher`)

pub mod bluesky;
pub mod browser;
pub mod media;
pub mod memos;
pub mod timeline;

#[cfg(test)]
pub(crate) mod fakes;

pub use bluesky::{BlueskyClient, Session};
#[cfg(feature = "browser")]
pub use browser::WebDriverPage;
pub use browser::{BrowserPage, SessionCookie, x_session_cookies};
pub use media::{HttpMediaFetcher, MediaFetcher, VideoDownloader};
pub use memos::{MemosClient, NoteStore};
