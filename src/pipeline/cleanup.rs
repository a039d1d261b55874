// src/pipeline/cleanup.rs

//! Deletion shared by the duplicate and cutoff cleaners.

use crate::models::Note;
use crate::services::NoteStore;
use crate::utils::{self, http, preview};

/// Whether a cleaner only reports or actually deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    #[default]
    DryRun,
    Execute,
}

impl DeleteMode {
    pub fn from_flags(execute: bool, config_dry_run: bool) -> Self {
        if execute || !config_dry_run {
            Self::Execute
        } else {
            Self::DryRun
        }
    }

    pub fn is_dry_run(self) -> bool {
        self == Self::DryRun
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub planned: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Delete `notes`, or only list them in dry-run mode.
///
/// A failed delete is logged and counted; the rest still run.
pub async fn delete_notes(
    store: &dyn NoteStore,
    notes: &[Note],
    mode: DeleteMode,
    delay_ms: u64,
) -> CleanupReport {
    let mut report = CleanupReport {
        planned: notes.len(),
        ..CleanupReport::default()
    };

    for (i, note) in notes.iter().enumerate() {
        let created = note
            .created_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "undated".to_string());
        let label = format!("{} ({created}) {}", note.name, preview(&note.content, 50));

        if mode.is_dry_run() {
            utils::log::progress(i + 1, notes.len(), &format!("would delete {label}"));
            continue;
        }

        match store.delete_note(&note.name).await {
            Ok(()) => {
                report.deleted += 1;
                utils::log::progress(i + 1, notes.len(), &format!("deleted {label}"));
            }
            Err(e) => {
                report.failed += 1;
                log::error!("Failed to delete {}: {e}", note.name);
            }
        }
        if i + 1 < notes.len() {
            http::pause(delay_ms).await;
        }
    }

    if mode.is_dry_run() {
        log::info!("Dry run: {} notes would be deleted", report.planned);
    } else {
        log::info!("Deleted {} of {} notes ({} failed)", report.deleted, report.planned, report.failed);
    }
    report
}
