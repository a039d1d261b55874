// src/services/memos.rs

//! Memos REST client.
//!
//! All note reads and writes go through the [`NoteStore`] trait so the
//! pipelines can run against an in-memory store in tests.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{Blob, HttpConfig, MemosConfig, Note, NoteResource, Visibility};
use crate::utils::{http, join_path};

/// Delay between list pages.
const PAGE_DELAY_MS: u64 = 100;

/// Operations the migration tools need from a note service.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// List every note, following pagination to the end.
    async fn list_notes(&self) -> Result<Vec<Note>>;

    async fn create_note(&self, content: &str, visibility: Visibility) -> Result<Note>;

    /// Back-date a note or comment.
    async fn set_create_time(&self, note_name: &str, created_at: DateTime<Utc>) -> Result<()>;

    /// Add a comment under `parent_name`.
    async fn create_comment(&self, parent_name: &str, content: &str) -> Result<Note>;

    async fn upload_attachment(&self, note_name: &str, blob: &Blob) -> Result<NoteResource>;

    async fn list_attachments(&self, note_name: &str) -> Result<Vec<NoteResource>>;

    async fn download_attachment(&self, resource: &NoteResource) -> Result<Blob>;

    async fn delete_note(&self, note_name: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ListMemosResponse {
    #[serde(default)]
    memos: Vec<Note>,
    #[serde(default, rename = "nextPageToken")]
    next_page_token: String,
}

#[derive(Debug, Deserialize)]
struct ListAttachmentsResponse {
    #[serde(default)]
    attachments: Vec<NoteResource>,
}

#[derive(Debug, Deserialize)]
struct AttachmentPayload {
    #[serde(default)]
    content: String,
}

/// HTTP client for one Memos instance.
#[derive(Clone)]
pub struct MemosClient {
    client: Client,
    host: String,
    token: String,
    page_size: u32,
    max_pages: u32,
    upload_timeout: Duration,
}

impl MemosClient {
    /// Create a client for `host` authenticated with `token`.
    pub fn new(client: Client, host: &str, token: &str, http: &HttpConfig) -> Self {
        Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            token: token.to_string(),
            page_size: 100,
            max_pages: 1000,
            upload_timeout: Duration::from_secs(http.upload_timeout_secs),
        }
    }

    /// Create the destination client from configuration.
    pub fn from_config(client: Client, memos: &MemosConfig, http: &HttpConfig) -> Self {
        Self::new(client, &memos.host, &memos.token, http).with_paging(memos.page_size, memos.max_pages)
    }

    pub fn with_paging(mut self, page_size: u32, max_pages: u32) -> Self {
        self.page_size = page_size.max(1);
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Check that the host answers and accepts the token.
    pub async fn verify(&self) -> Result<()> {
        let request = self
            .request(Method::GET, "api/v1/memos")
            .query(&[("pageSize", "1")]);
        match http::send(request, "verify access").await {
            Ok(_) => Ok(()),
            Err(AppError::Api { status, .. }) if status == 401 || status == 403 => Err(
                AppError::auth(format!("{} rejected the access token", self.host)),
            ),
            Err(e) => Err(e),
        }
    }

    fn url(&self, path: &str) -> String {
        join_path(&self.host, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(&self.token)
    }

    async fn fetch_page(&self, page_token: Option<&str>) -> Result<ListMemosResponse> {
        let mut query = vec![("pageSize", self.page_size.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        let request = self.request(Method::GET, "api/v1/memos").query(&query);
        Ok(http::send(request, "list memos").await?.json().await?)
    }
}

#[async_trait]
impl NoteStore for MemosClient {
    async fn list_notes(&self) -> Result<Vec<Note>> {
        log::info!("Fetching all memos from {}...", self.host);
        let mut notes = Vec::new();
        let mut page_token: Option<String> = None;

        for page in 1..=self.max_pages {
            let response = match self.fetch_page(page_token.as_deref()).await {
                Ok(response) => response,
                // some releases answer 400 for a token past the last page
                Err(AppError::Api { status: 400, .. }) if page > 1 => {
                    log::warn!("Pagination ended at page {page} (HTTP 400)");
                    break;
                }
                Err(e) => return Err(e),
            };

            if response.memos.is_empty() {
                break;
            }
            notes.extend(response.memos);
            log::info!("  Page {page}: total {} memos", notes.len());

            if response.next_page_token.is_empty() {
                break;
            }
            page_token = Some(response.next_page_token);
            http::pause(PAGE_DELAY_MS).await;
        }

        log::info!("Found {} memos", notes.len());
        Ok(notes)
    }

    async fn create_note(&self, content: &str, visibility: Visibility) -> Result<Note> {
        let request = self
            .request(Method::POST, "api/v1/memos")
            .json(&json!({ "content": content, "visibility": visibility.or_private() }));
        Ok(http::send(request, "create memo").await?.json().await?)
    }

    async fn set_create_time(&self, note_name: &str, created_at: DateTime<Utc>) -> Result<()> {
        let request = self
            .request(Method::PATCH, &format!("api/v1/{note_name}"))
            .json(&json!({ "createTime": created_at.to_rfc3339_opts(SecondsFormat::Secs, true) }));
        http::send(request, &format!("update timestamp of {note_name}")).await?;
        Ok(())
    }

    async fn create_comment(&self, parent_name: &str, content: &str) -> Result<Note> {
        let request = self
            .request(Method::POST, &format!("api/v1/{parent_name}/comments"))
            .json(&json!({ "content": content }));
        Ok(http::send(request, &format!("comment on {parent_name}"))
            .await?
            .json()
            .await?)
    }

    async fn upload_attachment(&self, note_name: &str, blob: &Blob) -> Result<NoteResource> {
        let request = self
            .request(Method::POST, "api/v1/attachments")
            .timeout(self.upload_timeout)
            .json(&json!({
                "filename": blob.filename,
                "content": BASE64.encode(&blob.bytes),
                "type": blob.mime_type,
                "memo": note_name,
            }));
        Ok(http::send(request, &format!("upload {}", blob.filename))
            .await?
            .json()
            .await?)
    }

    async fn list_attachments(&self, note_name: &str) -> Result<Vec<NoteResource>> {
        let request = self.request(Method::GET, &format!("api/v1/{note_name}/attachments"));
        let response: ListAttachmentsResponse =
            http::send(request, &format!("list attachments of {note_name}"))
                .await?
                .json()
                .await?;
        Ok(response.attachments)
    }

    async fn download_attachment(&self, resource: &NoteResource) -> Result<Blob> {
        let filename = if resource.filename.is_empty() {
            resource.id().to_string()
        } else {
            resource.filename.clone()
        };
        let mime_type = if resource.mime_type.is_empty() {
            "application/octet-stream".to_string()
        } else {
            resource.mime_type.clone()
        };

        // The API answers with base64 content on some releases; fall back to the file route.
        let api = self
            .request(Method::GET, &format!("api/v1/{}", resource.name))
            .timeout(self.upload_timeout);
        if let Ok(response) = http::send(api, "download attachment").await {
            let is_json = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains("application/json"));
            if is_json {
                if let Ok(payload) = response.json::<AttachmentPayload>().await {
                    if !payload.content.is_empty() {
                        let bytes = BASE64.decode(payload.content.as_bytes())?;
                        return Ok(Blob {
                            filename,
                            mime_type,
                            bytes,
                        });
                    }
                }
            }
        }

        let file = self
            .request(Method::GET, &format!("file/{}/{}", resource.name, filename))
            .timeout(self.upload_timeout);
        let bytes = http::send(file, &format!("download {filename}"))
            .await?
            .bytes()
            .await?;
        Ok(Blob {
            filename,
            mime_type,
            bytes: bytes.to_vec(),
        })
    }

    async fn delete_note(&self, note_name: &str) -> Result<()> {
        let request = self.request(Method::DELETE, &format!("api/v1/{note_name}"));
        http::send(request, &format!("delete {note_name}")).await?;
        Ok(())
    }
}
