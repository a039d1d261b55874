// src/pipeline/dedup.rs

//! Duplicate note detection.
//!
//! Notes are grouped by [`Fingerprint`]; in each group the earliest note is
//! kept and the others are planned for deletion.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{Fingerprint, Note, content_hash, metadata_hash};
use crate::services::NoteStore;
use crate::utils::preview;

/// How attachments contribute to a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachmentDigest {
    /// Hash of filename, type and size, without downloading
    Metadata,
    /// Hash of the downloaded bytes
    #[default]
    Content,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DedupOptions {
    pub digest: AttachmentDigest,
    /// Only treat notes as duplicates when created on the same day
    pub same_day: bool,
}

#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub fingerprint: Fingerprint,
    pub keep: Note,
    pub duplicates: Vec<Note>,
}

#[derive(Debug, Default)]
pub struct DedupPlan {
    pub scanned: usize,
    pub groups: Vec<DuplicateGroup>,
}

impl DedupPlan {
    /// Every note planned for deletion, group by group.
    pub fn deletions(&self) -> Vec<Note> {
        self.groups
            .iter()
            .flat_map(|g| g.duplicates.iter().cloned())
            .collect()
    }
}

/// Order in which notes are retained: earliest first, undated last, then by name.
pub fn retention_order(a: &Note, b: &Note) -> Ordering {
    let by_time = match (a.created_at, b.created_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_time.then_with(|| a.name.cmp(&b.name))
}

/// Fingerprint one note.
///
/// With content digests, an attachment that cannot be downloaded falls back
/// to its metadata hash.
pub async fn fingerprint_note(
    note: &Note,
    store: &dyn NoteStore,
    digest: AttachmentDigest,
) -> Fingerprint {
    let mut hashes = Vec::with_capacity(note.resources().len());
    for resource in note.resources() {
        let hash = match digest {
            AttachmentDigest::Metadata => metadata_hash(resource),
            AttachmentDigest::Content => match store.download_attachment(resource).await {
                Ok(blob) => content_hash(&blob.bytes),
                Err(e) => {
                    log::warn!(
                        "Could not download {} of {}, using metadata: {e}",
                        resource.filename,
                        note.name
                    );
                    metadata_hash(resource)
                }
            },
        };
        hashes.push(hash);
    }
    Fingerprint::compute(&note.content, &hashes)
}

/// Group `notes` into duplicate sets.
pub async fn find_duplicates(
    notes: &[Note],
    store: &dyn NoteStore,
    options: DedupOptions,
) -> Vec<DuplicateGroup> {
    let mut buckets: BTreeMap<(Fingerprint, Option<NaiveDate>), Vec<Note>> = BTreeMap::new();

    for note in notes.iter().filter(|n| !n.is_blank()) {
        let fingerprint = fingerprint_note(note, store, options.digest).await;
        let day = if options.same_day {
            note.created_at.map(|t| t.date_naive())
        } else {
            None
        };
        buckets.entry((fingerprint, day)).or_default().push(note.clone());
    }

    buckets
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|((fingerprint, _), mut members)| {
            members.sort_by(retention_order);
            let keep = members.remove(0);
            DuplicateGroup {
                fingerprint,
                keep,
                duplicates: members,
            }
        })
        .collect()
}

/// List the destination and plan the duplicate deletions.
pub async fn plan_dedup(store: &dyn NoteStore, options: DedupOptions) -> Result<DedupPlan> {
    let notes = store.list_notes().await?;
    log::info!("Fingerprinting {} notes ({:?} attachment digests)", notes.len(), options.digest);

    let groups = find_duplicates(&notes, store, options).await;
    for group in &groups {
        log::info!(
            "Keeping {} {}, {} duplicate(s): {}",
            group.keep.name,
            preview(&group.keep.content, 40),
            group.duplicates.len(),
            group
                .duplicates
                .iter()
                .map(|n| n.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let plan = DedupPlan {
        scanned: notes.len(),
        groups,
    };
    log::info!(
        "{} duplicate groups, {} notes to delete",
        plan.groups.len(),
        plan.deletions().len()
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::cleanup::{DeleteMode, delete_notes};
    use crate::services::fakes::{MemoryStore, note};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(y: i32, m: u32, d: u32, h: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_later_copy_is_the_duplicate() {
        let store = MemoryStore::with_notes(vec![
            note("memos/b", "same text", at(2022, 5, 2, 9)),
            note("memos/a", "same  text\n", at(2022, 5, 1, 9)),
            note("memos/c", "different", at(2022, 5, 1, 9)),
        ]);
        store.add_file("memos/a", "p.jpg", "image/jpeg", b"pixels");
        store.add_file("memos/b", "p.jpg", "image/jpeg", b"pixels");

        let plan = plan_dedup(&store, DedupOptions::default()).await.unwrap();
        assert_eq!(plan.scanned, 3);
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].keep.name, "memos/a");
        let doomed: Vec<_> = plan.deletions().iter().map(|n| n.name.clone()).collect();
        assert_eq!(doomed, vec!["memos/b"]);
    }

    #[tokio::test]
    async fn test_attachments_distinguish_notes() {
        let store = MemoryStore::with_notes(vec![
            note("memos/a", "photo", at(2022, 1, 1, 0)),
            note("memos/b", "photo", at(2022, 1, 2, 0)),
        ]);
        store.add_file("memos/a", "p.jpg", "image/jpeg", b"one");
        store.add_file("memos/b", "p.jpg", "image/jpeg", b"two");

        // same name, type and size but different bytes
        let by_content = plan_dedup(&store, DedupOptions::default()).await.unwrap();
        assert!(by_content.groups.is_empty());
        assert!(store.state().deleted.is_empty());

        let by_metadata = plan_dedup(
            &store,
            DedupOptions {
                digest: AttachmentDigest::Metadata,
                same_day: false,
            },
        )
        .await
        .unwrap();
        assert_eq!(by_metadata.groups.len(), 1);
    }

    #[tokio::test]
    async fn test_ties_and_undated_notes() {
        let notes = vec![
            note("memos/z", "x", None),
            note("memos/y", "x", at(2021, 1, 1, 0)),
            note("memos/w", "x", at(2021, 1, 1, 0)),
            note("memos/blank", "  ", None),
            note("memos/blank2", "", None),
        ];
        let store = MemoryStore::new();
        let groups = find_duplicates(&notes, &store, DedupOptions::default()).await;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].keep.name, "memos/w");
        let names: Vec<_> = groups[0].duplicates.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["memos/y", "memos/z"]);
    }

    #[tokio::test]
    async fn test_same_day_narrows_groups() {
        let notes = vec![
            note("memos/1", "daily", at(2021, 1, 1, 8)),
            note("memos/2", "daily", at(2021, 1, 1, 20)),
            note("memos/3", "daily", at(2021, 1, 2, 8)),
        ];
        let store = MemoryStore::new();
        let options = DedupOptions {
            same_day: true,
            ..DedupOptions::default()
        };
        let groups = find_duplicates(&notes, &store, options).await;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].keep.name, "memos/1");
        assert_eq!(groups[0].duplicates[0].name, "memos/2");
    }

    #[tokio::test]
    async fn test_dry_run_never_deletes() {
        let store = MemoryStore::with_notes(vec![
            note("memos/1", "dup", at(2020, 1, 1, 0)),
            note("memos/2", "dup", at(2020, 1, 2, 0)),
        ]);
        let plan = plan_dedup(&store, DedupOptions::default()).await.unwrap();
        let report = delete_notes(&store, &plan.deletions(), DeleteMode::DryRun, 0).await;

        assert_eq!(report.planned, 1);
        assert_eq!(report.deleted, 0);
        assert!(store.state().deleted.is_empty());
        assert_eq!(store.state().notes.len(), 2);
    }
}
