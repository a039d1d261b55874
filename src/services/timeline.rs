// src/services/timeline.rs

//! Extraction of posts from rendered X timeline HTML.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Attachment, Post, PostId, text_signature};
use crate::utils::{extract_status_id, resolve_url};

const X_ORIGIN: &str = "https://x.com";

const END_MARKERS: &[&str] = &["you're all caught up", "nothing more to load"];
const NO_RESULT_MARKERS: &[&str] = &["no results for"];

struct TimelineSelectors {
    article: Selector,
    text: Selector,
    time: Selector,
    status_link: Selector,
    image: Selector,
    video: Selector,
}

fn parse(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))
}

impl TimelineSelectors {
    fn build() -> Result<Self> {
        Ok(Self {
            article: parse(crate::services::browser::TWEET_SELECTOR)?,
            text: parse(r#"div[data-testid="tweetText"]"#)?,
            time: parse("time[datetime]")?,
            status_link: parse(r#"a[href*="/status/"]"#)?,
            image: parse(r#"img[src*="pbs.twimg.com/media"]"#)?,
            video: parse("video")?,
        })
    }
}

fn selectors() -> Result<&'static TimelineSelectors> {
    static SELECTORS: OnceLock<std::result::Result<TimelineSelectors, String>> = OnceLock::new();
    SELECTORS
        .get_or_init(|| TimelineSelectors::build().map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| AppError::browser(e))
}

/// Rewrite a media URL to request the large JPEG rendition.
pub fn large_image_url(src: &str) -> String {
    let base = src.split('?').next().unwrap_or(src);
    format!("{base}?format=jpg&name=large")
}

/// True when the page says the timeline has no more posts.
pub fn is_exhausted(html: &str) -> bool {
    contains_marker(html, END_MARKERS)
}

/// True when a search page reports no matches.
pub fn has_no_results(html: &str) -> bool {
    contains_marker(html, NO_RESULT_MARKERS)
}

fn contains_marker(html: &str, markers: &[&str]) -> bool {
    let document = Html::parse_document(html);
    let mut text = String::new();
    text_outside_posts(document.root_element(), &mut text);
    let lower = text.to_lowercase().replace('\u{2019}', "'");
    markers.iter().any(|m| lower.contains(m))
}

/// Page text with every rendered post left out, so post bodies never read as
/// timeline status messages.
fn text_outside_posts(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child) = ElementRef::wrap(child) {
            let value = child.value();
            if value.name() == "article" && value.attr("data-testid") == Some("tweet") {
                continue;
            }
            text_outside_posts(child, out);
        }
    }
}

/// Extract every post rendered in `html`, in page order.
pub fn extract_posts(html: &str) -> Result<Vec<Post>> {
    let sel = selectors()?;
    let document = Html::parse_document(html);
    let base = Url::parse(X_ORIGIN)?;

    Ok(document
        .select(&sel.article)
        .filter_map(|article| extract_post(article, sel, &base))
        .collect())
}

fn extract_post(article: ElementRef<'_>, sel: &TimelineSelectors, base: &Url) -> Option<Post> {
    let texts: Vec<String> = article
        .select(&sel.text)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .collect();
    let text = match texts.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        // quote posts render the quoted text as a second block
        [own, quoted, ..] => format!("{own}\n\n---\n\n{quoted}"),
    };

    let time = article.select(&sel.time).next();
    let created_at = time
        .and_then(|t| t.value().attr("datetime"))
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc));

    // the permalink is the anchor wrapping the timestamp
    let permalink = time
        .and_then(|t| t.parent())
        .and_then(ElementRef::wrap)
        .and_then(|a| a.value().attr("href"))
        .filter(|href| href.contains("/status/"))
        .or_else(|| {
            article
                .select(&sel.status_link)
                .filter_map(|a| a.value().attr("href"))
                .next()
        })
        .map(|href| resolve_url(base, href));

    let status_id = permalink.as_deref().and_then(extract_status_id);
    if text.is_empty() && status_id.is_none() {
        return None;
    }

    let author = permalink
        .as_deref()
        .and_then(|url| Url::parse(url).ok())
        .and_then(|url| url.path_segments()?.next().map(str::to_string))
        .unwrap_or_default();

    let mut attachments: Vec<Attachment> = Vec::new();
    for img in article.select(&sel.image) {
        if let Some(src) = img.value().attr("src") {
            let url = large_image_url(src);
            if !attachments.iter().any(|a| a.url == url) {
                attachments.push(Attachment::image(url));
            }
        }
    }
    if article.select(&sel.video).next().is_some() {
        if let Some(url) = &permalink {
            attachments.push(Attachment::video(url.clone()));
        }
    }

    let id = match status_id {
        Some(id) => PostId::new(id),
        None => {
            let stamp = created_at.map(|t| t.to_rfc3339()).unwrap_or_default();
            let sig = text_signature(&format!("{stamp}|{text}"));
            PostId::new(format!("sig-{}", &sig[..16.min(sig.len())]))
        }
    };

    Some(Post {
        id,
        author,
        text,
        created_at,
        attachments,
        reply_to: None,
        source_url: permalink,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Render one timeline article the way X does, reduced to the parts we read.
    pub fn article(id: &str, text: &str, datetime: &str, images: &[&str], video: bool) -> String {
        let imgs: String = images
            .iter()
            .map(|src| format!(r#"<div><img alt="Image" src="{src}"></div>"#))
            .collect();
        let video = if video { "<video src=\"blob:x\"></video>" } else { "" };
        format!(
            r#"<article data-testid="tweet">
                <div><a href="/alice/status/{id}"><time datetime="{datetime}">Mar 1</time></a></div>
                <div data-testid="tweetText"><span>{text}</span></div>
                {imgs}{video}
            </article>"#
        )
    }

    pub fn page(articles: &[String]) -> String {
        format!(
            r#"<html><body><main role="main"><div data-testid="primaryColumn">{}</div></main></body></html>"#,
            articles.concat()
        )
    }
}
