// src/pipeline/prune.rs

//! Bulk deletion of notes created before a cutoff.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::Note;
use crate::pipeline::cleanup::{CleanupReport, DeleteMode, delete_notes};
use crate::services::NoteStore;
use crate::utils;

/// Notes created strictly before `cutoff`. Undated notes are never selected.
pub fn select_before(notes: &[Note], cutoff: DateTime<Utc>) -> Vec<Note> {
    notes
        .iter()
        .filter(|n| n.created_at.is_some_and(|t| t < cutoff))
        .cloned()
        .collect()
}

/// Delete (or in dry-run mode list) every note older than `cutoff`.
pub async fn run_prune(
    store: &dyn NoteStore,
    cutoff: DateTime<Utc>,
    mode: DeleteMode,
    delay_ms: u64,
) -> Result<CleanupReport> {
    utils::log::header(&format!("Deleting notes created before {cutoff}"));
    let notes = store.list_notes().await?;
    let undated = notes.iter().filter(|n| n.created_at.is_none()).count();
    if undated > 0 {
        log::warn!("{undated} notes have no creation time and are left alone");
    }

    let doomed = select_before(&notes, cutoff);
    log::info!("{} of {} notes are older than the cutoff", doomed.len(), notes.len());
    Ok(delete_notes(store, &doomed, mode, delay_ms).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_cutoff;
    use crate::services::fakes::{MemoryStore, note};
    use chrono::TimeZone;

    fn fixture() -> MemoryStore {
        let day = |y, m, d| Some(Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap());
        MemoryStore::with_notes(vec![
            note("memos/1", "2019", day(2019, 1, 1)),
            note("memos/2", "2021", day(2021, 6, 1)),
            note("memos/3", "2023", day(2023, 1, 1)),
            note("memos/4", "undated", None),
        ])
    }

    #[tokio::test]
    async fn test_deletes_exactly_the_older_notes_and_is_idempotent() {
        let store = fixture();
        let cutoff = parse_cutoff("2022-01-01").unwrap();

        let first = run_prune(&store, cutoff, DeleteMode::Execute, 0).await.unwrap();
        assert_eq!(first.deleted, 2);
        assert_eq!(store.state().deleted, vec!["memos/1", "memos/2"]);

        let second = run_prune(&store, cutoff, DeleteMode::Execute, 0).await.unwrap();
        assert_eq!(second.planned, 0);
        assert_eq!(store.state().deleted.len(), 2);
        assert_eq!(store.contents(), vec!["2023", "undated"]);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_everything() {
        let store = fixture();
        let cutoff = parse_cutoff("2022-01-01").unwrap();
        let report = run_prune(&store, cutoff, DeleteMode::DryRun, 0).await.unwrap();
        assert_eq!(report.planned, 2);
        assert!(store.state().deleted.is_empty());
    }

    #[test]
    fn test_cutoff_is_strict() {
        let cutoff = Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap();
        let notes = vec![note("memos/2", "edge", Some(cutoff))];
        assert!(select_before(&notes, cutoff).is_empty());
    }
}
