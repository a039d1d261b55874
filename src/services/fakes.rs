// src/services/fakes.rs

//! In-memory service doubles for pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Attachment, Blob, Note, NoteResource, Visibility, content_hash};
use crate::services::browser::BrowserPage;
use crate::services::media::MediaFetcher;
use crate::services::memos::NoteStore;

pub fn note(name: &str, content: &str, created_at: Option<DateTime<Utc>>) -> Note {
    Note {
        name: name.to_string(),
        content: content.to_string(),
        created_at,
        visibility: Visibility::Private,
        attachments: Vec::new(),
        resources: Vec::new(),
    }
}

#[derive(Default)]
pub struct StoreState {
    pub notes: Vec<Note>,
    pub comments: Vec<(String, Note)>,
    pub uploads: Vec<(String, Blob)>,
    pub backdated: Vec<(String, DateTime<Utc>)>,
    pub deleted: Vec<String>,
    pub files: HashMap<String, Vec<u8>>,
    pub fail_create: HashSet<String>,
    pub fail_delete: HashSet<String>,
    pub fail_list: bool,
    next_id: u64,
}

/// A Memos instance held in memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notes(notes: Vec<Note>) -> Self {
        let store = Self::default();
        store.state().notes = notes;
        store
    }

    pub fn state(&self) -> MutexGuard<'_, StoreState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Attach a stored file to an existing note.
    pub fn add_file(&self, note_name: &str, filename: &str, mime_type: &str, bytes: &[u8]) {
        let mut state = self.state();
        state.next_id += 1;
        let resource = NoteResource {
            name: format!("attachments/f{}", state.next_id),
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            size: bytes.len() as u64,
        };
        state.files.insert(resource.name.clone(), bytes.to_vec());
        if let Some(n) = state.notes.iter_mut().find(|n| n.name == note_name) {
            n.attachments.push(resource);
        }
    }

    pub fn contents(&self) -> Vec<String> {
        self.state().notes.iter().map(|n| n.content.clone()).collect()
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn list_notes(&self) -> Result<Vec<Note>> {
        let state = self.state();
        if state.fail_list {
            return Err(AppError::api("list memos", 503, "unavailable"));
        }
        Ok(state.notes.clone())
    }

    async fn create_note(&self, content: &str, visibility: Visibility) -> Result<Note> {
        let mut state = self.state();
        if state.fail_create.contains(content) {
            return Err(AppError::api("create memo", 500, "rejected"));
        }
        state.next_id += 1;
        let mut created = note(&format!("memos/{}", state.next_id), content, None);
        created.visibility = visibility;
        state.notes.push(created.clone());
        Ok(created)
    }

    async fn set_create_time(&self, note_name: &str, created_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state();
        state.backdated.push((note_name.to_string(), created_at));
        if let Some(n) = state.notes.iter_mut().find(|n| n.name == note_name) {
            n.created_at = Some(created_at);
        }
        if let Some((_, c)) = state.comments.iter_mut().find(|(_, c)| c.name == note_name) {
            c.created_at = Some(created_at);
        }
        Ok(())
    }

    async fn create_comment(&self, parent_name: &str, content: &str) -> Result<Note> {
        let mut state = self.state();
        state.next_id += 1;
        let comment = note(&format!("memos/{}", state.next_id), content, None);
        state.comments.push((parent_name.to_string(), comment.clone()));
        Ok(comment)
    }

    async fn upload_attachment(&self, note_name: &str, blob: &Blob) -> Result<NoteResource> {
        let mut state = self.state();
        state.next_id += 1;
        let resource = NoteResource {
            name: format!("attachments/a{}", state.next_id),
            filename: blob.filename.clone(),
            mime_type: blob.mime_type.clone(),
            size: blob.bytes.len() as u64,
        };
        state.files.insert(resource.name.clone(), blob.bytes.clone());
        state.uploads.push((note_name.to_string(), blob.clone()));
        if let Some(n) = state.notes.iter_mut().find(|n| n.name == note_name) {
            n.attachments.push(resource.clone());
        }
        Ok(resource)
    }

    async fn list_attachments(&self, note_name: &str) -> Result<Vec<NoteResource>> {
        Ok(self
            .state()
            .notes
            .iter()
            .find(|n| n.name == note_name)
            .map(|n| n.resources().to_vec())
            .unwrap_or_default())
    }

    async fn download_attachment(&self, resource: &NoteResource) -> Result<Blob> {
        let state = self.state();
        let bytes = state
            .files
            .get(&resource.name)
            .cloned()
            .ok_or_else(|| AppError::api("download attachment", 404, &resource.name))?;
        Ok(Blob {
            filename: resource.filename.clone(),
            mime_type: resource.mime_type.clone(),
            bytes,
        })
    }

    async fn delete_note(&self, note_name: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail_delete.contains(note_name) {
            return Err(AppError::api("delete memo", 500, "rejected"));
        }
        state.notes.retain(|n| n.name != note_name);
        state.deleted.push(note_name.to_string());
        Ok(())
    }
}

/// Media fetcher that returns the URL as the file body.
#[derive(Default)]
pub struct FakeMedia {
    pub failing: HashSet<String>,
}

#[async_trait]
impl MediaFetcher for FakeMedia {
    async fn fetch(&self, attachment: &Attachment) -> Result<Blob> {
        if self.failing.contains(&attachment.url) {
            return Err(AppError::media(format!("cannot fetch {}", attachment.url)));
        }
        let stem = content_hash(attachment.url.as_bytes());
        Ok(Blob {
            filename: format!("{}.bin", &stem[..8]),
            mime_type: "application/octet-stream".to_string(),
            bytes: attachment.url.as_bytes().to_vec(),
        })
    }
}

/// A browser tab that serves canned HTML.
///
/// Each route maps a URL fragment to the frames shown after each scroll;
/// the last frame repeats once the script runs out.
#[derive(Default)]
pub struct ScriptedPage {
    routes: Vec<(String, Vec<String>)>,
    default: Vec<String>,
    failing: Vec<String>,
    frames: Vec<String>,
    index: usize,
    pub visited: Vec<String>,
    pub scrolls: usize,
}

impl ScriptedPage {
    pub fn new(frames: Vec<String>) -> Self {
        Self {
            default: frames,
            ..Self::default()
        }
    }

    /// Serve `frames` for URLs containing `fragment`.
    pub fn route(mut self, fragment: &str, frames: Vec<String>) -> Self {
        self.routes.push((fragment.to_string(), frames));
        self
    }

    /// Fail navigation to URLs containing `fragment`.
    pub fn fail(mut self, fragment: &str) -> Self {
        self.failing.push(fragment.to_string());
        self
    }

    fn current(&self) -> &str {
        match self.frames.get(self.index.min(self.frames.len().saturating_sub(1))) {
            Some(frame) => frame,
            None => "",
        }
    }
}

#[async_trait]
impl BrowserPage for ScriptedPage {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.visited.push(url.to_string());
        if self.failing.iter().any(|f| url.contains(f.as_str())) {
            return Err(AppError::browser(format!("navigation failed: {url}")));
        }
        self.frames = self
            .routes
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, frames)| frames.clone())
            .unwrap_or_else(|| self.default.clone());
        self.index = 0;
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, _timeout: Duration) -> Result<bool> {
        let selector = Selector::parse(selector)
            .map_err(|e| AppError::selector(selector, format!("{e:?}")))?;
        let document = Html::parse_document(self.current());
        let found = document.select(&selector).next().is_some();
        Ok(found)
    }

    async fn html(&mut self) -> Result<String> {
        Ok(self.current().to_string())
    }

    async fn scroll(&mut self) -> Result<()> {
        self.scrolls += 1;
        self.index += 1;
        Ok(())
    }
}
