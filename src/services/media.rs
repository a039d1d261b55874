// src/services/media.rs

//! Attachment downloads.
//!
//! Images are fetched over HTTP. X videos are handed to `yt-dlp` together
//! with a Netscape cookie file built from the session cookies.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tempfile::{NamedTempFile, TempDir};
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::models::{Attachment, Blob, MediaType, text_signature};
use crate::services::browser::SessionCookie;
use crate::utils::{extract_status_id, http};

const VIDEO_TIMEOUT: Duration = Duration::from_secs(60);

/// Turns an [`Attachment`] reference into uploadable bytes.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, attachment: &Attachment) -> Result<Blob>;
}

/// File extension for a MIME type.
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type.split(';').next().unwrap_or("").trim() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        _ => "bin",
    }
}

fn has_known_extension(name: &str) -> bool {
    let lower = name.to_lowercase();
    [".jpg", ".jpeg", ".png", ".gif", ".webp", ".mp4"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}

/// Filename for a downloaded image, from the last URL path segment.
pub fn filename_for(url: &str, mime_type: &str) -> String {
    let segment = url
        .split('?')
        .next()
        .unwrap_or(url)
        .rsplit('/')
        .next()
        .unwrap_or("")
        .split('@')
        .next()
        .unwrap_or("");
    let stem = if segment.is_empty() { "image" } else { segment };
    if has_known_extension(stem) {
        stem.to_string()
    } else {
        format!("{stem}.{}", extension_for(mime_type))
    }
}

/// Write cookies in the Netscape format understood by yt-dlp.
pub fn write_cookie_file(cookies: &[SessionCookie]) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("memos-migrate-cookies")
        .suffix(".txt")
        .tempfile()?;
    writeln!(file, "# Netscape HTTP Cookie File")?;
    for c in cookies {
        let include_subdomains = if c.domain.starts_with('.') { "TRUE" } else { "FALSE" };
        let secure = if c.secure { "TRUE" } else { "FALSE" };
        writeln!(
            file,
            "{}\t{}\t{}\t{}\t0\t{}\t{}",
            c.domain, include_subdomains, c.path, secure, c.name, c.value
        )?;
    }
    file.flush()?;
    Ok(file)
}

/// Runs yt-dlp for post URLs that carry a video.
pub struct VideoDownloader {
    program: String,
    cookie_file: Option<NamedTempFile>,
    timeout: Duration,
}

impl VideoDownloader {
    pub fn new(program: &str, cookies: &[SessionCookie]) -> Result<Self> {
        let cookie_file = if cookies.is_empty() {
            None
        } else {
            Some(write_cookie_file(cookies)?)
        };
        Ok(Self {
            program: program.to_string(),
            cookie_file,
            timeout: VIDEO_TIMEOUT,
        })
    }

    fn cookie_path(&self) -> Option<&Path> {
        self.cookie_file.as_ref().map(|f| f.path())
    }

    pub async fn download(&self, post_url: &str) -> Result<Blob> {
        let dir = TempDir::new()?;
        let output: PathBuf = dir.path().join("video.mp4");

        let mut cmd = Command::new(&self.program);
        cmd.arg("--quiet")
            .arg("--no-warnings")
            .arg("--format")
            .arg("best[ext=mp4]/best")
            .arg("--output")
            .arg(&output);
        if let Some(path) = self.cookie_path() {
            cmd.arg("--cookies").arg(path);
        }
        cmd.arg(post_url).kill_on_drop(true);

        let result = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| AppError::media(format!("yt-dlp timed out for {post_url}")))?
            .map_err(|e| AppError::media(format!("could not run {}: {e}", self.program)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(AppError::media(format!(
                "yt-dlp failed for {post_url}: {}",
                stderr.trim()
            )));
        }

        let bytes = tokio::fs::read(&output).await?;
        if bytes.is_empty() {
            return Err(AppError::media(format!("yt-dlp produced no file for {post_url}")));
        }

        let stem = extract_status_id(post_url)
            .unwrap_or_else(|| text_signature(post_url).chars().take(12).collect());
        Ok(Blob {
            filename: format!("x_video_{stem}.mp4"),
            mime_type: "video/mp4".to_string(),
            bytes,
        })
    }
}

/// Downloads images over HTTP and videos through yt-dlp.
pub struct HttpMediaFetcher {
    client: Client,
    timeout: Duration,
    video: Option<VideoDownloader>,
}

impl HttpMediaFetcher {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            video: None,
        }
    }

    pub fn with_video(mut self, downloader: VideoDownloader) -> Self {
        self.video = Some(downloader);
        self
    }

    async fn fetch_image(&self, url: &str) -> Result<Blob> {
        let response = http::send(self.client.get(url).timeout(self.timeout), "download image").await?;
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "image/jpeg".to_string());
        let bytes = response.bytes().await?.to_vec();
        Ok(Blob {
            filename: filename_for(url, &mime_type),
            mime_type,
            bytes,
        })
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, attachment: &Attachment) -> Result<Blob> {
        match attachment.media_type {
            MediaType::Image => self.fetch_image(&attachment.url).await,
            MediaType::Video => match &self.video {
                Some(downloader) => downloader.download(&attachment.url).await,
                None => Err(AppError::media(format!(
                    "no video downloader configured for {}",
                    attachment.url
                ))),
            },
        }
    }
}
