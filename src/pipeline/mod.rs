//! Pipeline entry points for the migration commands.
//!
//! - `run_bluesky_import`: Bluesky author feed into notes, self-replies as comments
//! - `run_x_import`: X posts via scrolling, chunked search or both
//! - `plan_dedup` / `run_prune`: destination cleanup
//! - `AccountCopier`: copy notes between Memos accounts

pub mod bluesky;
pub mod cleanup;
pub mod copy;
pub mod dedup;
pub mod hybrid;
pub mod normalize;
pub mod prune;
pub mod scroll;
pub mod search;
pub mod writer;
pub mod x;

pub use bluesky::run_bluesky_import;
pub use cleanup::{CleanupReport, DeleteMode, delete_notes};
pub use copy::{AccountCopier, CopyOptions};
pub use dedup::{AttachmentDigest, DedupOptions, DedupPlan, plan_dedup};
pub use prune::run_prune;
pub use writer::DestinationWriter;
pub use x::{Strategy, run_x_import};
