// src/services/bluesky.rs

//! Bluesky XRPC client.
//!
//! Logs in with an app password, pages through the author feed and turns
//! feed items into [`Post`]s. Reposts and replies to other accounts are dropped.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::{Attachment, BlueskyConfig, HttpConfig, Post, PostId};
use crate::utils::{http, join_path};

const FEED_PAGE_LIMIT: &str = "100";
const CDN_BASE: &str = "https://cdn.bsky.app/img/feed_fullsize/plain";

/// An authenticated XRPC session.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub did: String,

    #[serde(default)]
    pub handle: String,

    #[serde(rename = "accessJwt")]
    pub access_jwt: String,
}

/// One page of the author feed, items left raw so one bad item cannot sink the page.
#[derive(Debug, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub feed: Vec<Value>,

    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    post: PostView,

    /// Present on reposts
    #[serde(default)]
    reason: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PostView {
    uri: String,
    author: Author,
    record: PostRecord,
}

#[derive(Debug, Deserialize)]
struct Author {
    did: String,
    #[serde(default)]
    handle: String,
}

#[derive(Debug, Deserialize)]
struct PostRecord {
    #[serde(default)]
    text: String,

    #[serde(default, rename = "createdAt")]
    created_at: Option<String>,

    #[serde(default)]
    reply: Option<ReplyRef>,

    #[serde(default)]
    embed: Option<Embed>,
}

#[derive(Debug, Deserialize)]
struct ReplyRef {
    parent: StrongRef,
}

#[derive(Debug, Deserialize)]
struct StrongRef {
    uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "$type")]
enum Embed {
    #[serde(rename = "app.bsky.embed.images")]
    Images { images: Vec<ImageRef> },

    #[serde(rename = "app.bsky.embed.recordWithMedia")]
    RecordWithMedia { media: Box<Embed> },

    #[serde(other)]
    Other,
}

impl Embed {
    fn images(&self) -> &[ImageRef] {
        match self {
            Embed::Images { images } => images,
            Embed::RecordWithMedia { media } => media.images(),
            Embed::Other => &[],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImageRef {
    #[serde(default)]
    image: Option<BlobRef>,
}

/// Current blobs carry `ref.$link`, older records a bare `cid`.
#[derive(Debug, Deserialize)]
struct BlobRef {
    #[serde(rename = "ref", default)]
    link: Option<CidLink>,
    #[serde(default)]
    cid: Option<String>,
}

impl ImageRef {
    fn cid(&self) -> Option<&str> {
        let blob = self.image.as_ref()?;
        blob.link
            .as_ref()
            .map(|l| l.cid.as_str())
            .or(blob.cid.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct CidLink {
    #[serde(rename = "$link")]
    cid: String,
}

/// DID that owns an `at://did/collection/rkey` URI.
pub fn did_of_uri(uri: &str) -> Option<&str> {
    uri.strip_prefix("at://")?.split('/').next()
}

/// Public web URL of a post.
pub fn web_url(handle: &str, uri: &str) -> Option<String> {
    let rkey = uri.rsplit('/').next()?;
    Some(format!("https://bsky.app/profile/{handle}/post/{rkey}"))
}

/// Convert one raw feed item into a post owned by `user_did`.
///
/// Returns `Ok(None)` for items that are skipped on purpose (reposts and
/// replies to someone else) and `Err` for items that cannot be read.
pub fn feed_item_to_post(raw: &Value, user_did: &str) -> Result<Option<Post>> {
    let item: FeedItem = serde_json::from_value(raw.clone())?;
    if item.reason.is_some() {
        return Ok(None);
    }

    let post = item.post;
    let reply_to = match &post.record.reply {
        Some(reply) => {
            if did_of_uri(&reply.parent.uri) != Some(user_did) {
                return Ok(None);
            }
            Some(PostId::new(reply.parent.uri.clone()))
        }
        None => None,
    };

    let created_at = post
        .record
        .created_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let attachments = post
        .record
        .embed
        .as_ref()
        .map(|embed| {
            embed
                .images()
                .iter()
                .filter_map(|img| match img.cid() {
                    Some(cid) => Some(Attachment::image(format!(
                        "{CDN_BASE}/{}/{cid}@jpeg",
                        post.author.did
                    ))),
                    None => {
                        log::debug!("Skipping image without a blob reference in {}", post.uri);
                        None
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let handle = if post.author.handle.is_empty() {
        post.author.did.clone()
    } else {
        post.author.handle.clone()
    };

    Ok(Some(Post {
        source_url: web_url(&handle, &post.uri),
        id: PostId::new(post.uri),
        author: handle,
        text: post.record.text,
        created_at,
        attachments,
        reply_to,
    }))
}

/// Client for a Bluesky PDS.
pub struct BlueskyClient {
    client: Client,
    service: String,
    page_delay_ms: u64,
    max_retries: u32,
    retry_delay: Duration,
}

impl BlueskyClient {
    pub fn new(client: Client, config: &BlueskyConfig, http: &HttpConfig) -> Self {
        Self {
            client,
            service: config.service.trim_end_matches('/').to_string(),
            page_delay_ms: config.pagination_delay_ms,
            max_retries: http.max_retries,
            retry_delay: Duration::from_secs(5),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn xrpc(&self, method: &str) -> String {
        join_path(&self.service, &format!("xrpc/{method}"))
    }

    /// Create a session from a handle and app password.
    pub async fn login(&self, handle: &str, password: &str) -> Result<Session> {
        let request = self
            .client
            .request(Method::POST, self.xrpc("com.atproto.server.createSession"))
            .json(&json!({ "identifier": handle, "password": password }));
        match http::send(request, "create session").await {
            Ok(response) => {
                let session: Session = response.json().await?;
                log::info!("Authenticated as {} ({})", handle, session.did);
                Ok(session)
            }
            Err(AppError::Api { status, message, .. }) if status == 400 || status == 401 => Err(
                AppError::auth(format!("Bluesky rejected the login for {handle}: {message}")),
            ),
            Err(e) => Err(e),
        }
    }

    /// Fetch one page of the author feed.
    pub async fn author_feed(&self, session: &Session, cursor: Option<&str>) -> Result<FeedPage> {
        let mut query = vec![("actor", session.did.as_str()), ("limit", FEED_PAGE_LIMIT)];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        let request = self
            .client
            .request(Method::GET, self.xrpc("app.bsky.feed.getAuthorFeed"))
            .bearer_auth(&session.access_jwt)
            .query(&query);
        Ok(http::send(request, "get author feed").await?.json().await?)
    }

    async fn author_feed_with_retry(
        &self,
        session: &Session,
        cursor: Option<&str>,
    ) -> Result<FeedPage> {
        let mut attempt = 0;
        loop {
            match self.author_feed(session, cursor).await {
                Ok(page) => return Ok(page),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    log::warn!(
                        "Feed page failed ({e}), retry {attempt}/{}",
                        self.max_retries
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Collect every original post and self-reply of the session's account.
    ///
    /// A page that keeps failing after retries ends the collection with what
    /// was gathered so far.
    pub async fn collect_posts(&self, session: &Session) -> Vec<Post> {
        let mut posts = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page_num = 0;

        loop {
            page_num += 1;
            let page = match self.author_feed_with_retry(session, cursor.as_deref()).await {
                Ok(page) => page,
                Err(e) => {
                    log::error!("Giving up on feed page {page_num}: {e}");
                    break;
                }
            };

            let mut kept = 0;
            for raw in &page.feed {
                match feed_item_to_post(raw, &session.did) {
                    Ok(Some(post)) => {
                        posts.push(post);
                        kept += 1;
                    }
                    Ok(None) => {}
                    Err(e) => log::warn!("Skipping unreadable feed item: {e}"),
                }
            }
            log::info!(
                "  Page {page_num}: {} items, kept {kept} (total {})",
                page.feed.len(),
                posts.len()
            );

            match page.cursor {
                Some(next) if !next.is_empty() && !page.feed.is_empty() => cursor = Some(next),
                _ => break,
            }
            http::pause(self.page_delay_ms).await;
        }

        posts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DID: &str = "did:plc:alice";

    fn item(rkey: &str, text: &str) -> Value {
        json!({
            "post": {
                "uri": format!("at://{DID}/app.bsky.feed.post/{rkey}"),
                "author": {"did": DID, "handle": "alice.bsky.social"},
                "record": {"text": text, "createdAt": "2023-03-01T10:00:00.000Z"}
            }
        })
    }

    #[test]
    fn test_plain_post() {
        let post = feed_item_to_post(&item("k1", "hello"), DID).unwrap().unwrap();
        assert_eq!(post.id.as_str(), "at://did:plc:alice/app.bsky.feed.post/k1");
        assert_eq!(post.text, "hello");
        assert_eq!(post.author, "alice.bsky.social");
        assert_eq!(
            post.source_url.as_deref(),
            Some("https://bsky.app/profile/alice.bsky.social/post/k1")
        );
        assert!(post.created_at.is_some());
        assert!(!post.is_reply());
    }

    #[test]
    fn test_reposts_are_skipped() {
        let mut raw = item("k1", "boosted");
        raw["reason"] = json!({"$type": "app.bsky.feed.defs#reasonRepost"});
        assert!(feed_item_to_post(&raw, DID).unwrap().is_none());
    }

    #[test]
    fn test_replies_to_others_are_skipped() {
        let mut raw = item("k2", "hi bob");
        raw["post"]["record"]["reply"] = json!({
            "root": {"uri": "at://did:plc:bob/app.bsky.feed.post/r"},
            "parent": {"uri": "at://did:plc:bob/app.bsky.feed.post/r"}
        });
        assert!(feed_item_to_post(&raw, DID).unwrap().is_none());
    }

    #[test]
    fn test_self_reply_keeps_parent() {
        let mut raw = item("k3", "part two");
        raw["post"]["record"]["reply"] = json!({
            "root": {"uri": format!("at://{DID}/app.bsky.feed.post/k1")},
            "parent": {"uri": format!("at://{DID}/app.bsky.feed.post/k1")}
        });
        let post = feed_item_to_post(&raw, DID).unwrap().unwrap();
        assert_eq!(
            post.reply_to.unwrap().as_str(),
            "at://did:plc:alice/app.bsky.feed.post/k1"
        );
    }

    #[test]
    fn test_images_from_both_embed_kinds() {
        let mut raw = item("k4", "pics");
        raw["post"]["record"]["embed"] = json!({
            "$type": "app.bsky.embed.images",
            "images": [
                {"alt": "", "image": {"$type": "blob", "ref": {"$link": "cid1"}, "mimeType": "image/jpeg"}},
                {"alt": "", "image": {"$type": "blob", "ref": {"$link": "cid2"}, "mimeType": "image/png"}}
            ]
        });
        let post = feed_item_to_post(&raw, DID).unwrap().unwrap();
        let urls: Vec<_> = post.attachments.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://cdn.bsky.app/img/feed_fullsize/plain/did:plc:alice/cid1@jpeg",
                "https://cdn.bsky.app/img/feed_fullsize/plain/did:plc:alice/cid2@jpeg",
            ]
        );

        let mut quoted = item("k5", "quote with pic");
        quoted["post"]["record"]["embed"] = json!({
            "$type": "app.bsky.embed.recordWithMedia",
            "record": {"$type": "app.bsky.embed.record", "record": {"uri": "at://x/y/z", "cid": "c"}},
            "media": {
                "$type": "app.bsky.embed.images",
                "images": [{"image": {"ref": {"$link": "cid9"}}}]
            }
        });
        let post = feed_item_to_post(&quoted, DID).unwrap().unwrap();
        assert_eq!(post.attachments.len(), 1);

        let mut link = item("k6", "link card");
        link["post"]["record"]["embed"] = json!({"$type": "app.bsky.embed.external", "external": {}});
        assert!(feed_item_to_post(&link, DID).unwrap().unwrap().attachments.is_empty());
    }

    #[test]
    fn test_legacy_and_unreadable_blobs_keep_the_post() {
        let mut raw = item("k7", "old pics");
        raw["post"]["record"]["embed"] = json!({
            "$type": "app.bsky.embed.images",
            "images": [
                {"alt": "", "image": {"cid": "bafyold", "mimeType": "image/jpeg"}},
                {"alt": "", "image": {"mimeType": "image/jpeg"}},
                {"alt": ""}
            ]
        });
        let post = feed_item_to_post(&raw, DID).unwrap().unwrap();
        assert_eq!(post.text, "old pics");
        let urls: Vec<_> = post.attachments.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://cdn.bsky.app/img/feed_fullsize/plain/did:plc:alice/bafyold@jpeg"]
        );
    }

    #[test]
    fn test_malformed_item_is_an_error() {
        assert!(feed_item_to_post(&json!({"post": {"uri": 3}}), DID).is_err());
    }

    #[tokio::test]
    async fn test_login_and_collect_pages() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/xrpc/com.atproto.server.createSession"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "did": DID, "handle": "alice.bsky.social", "accessJwt": "jwt"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/xrpc/app.bsky.feed.getAuthorFeed"))
            .and(query_param("cursor", "c2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "feed": [item("k3", "three")]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/xrpc/app.bsky.feed.getAuthorFeed"))
            .and(header("Authorization", "Bearer jwt"))
            .and(query_param("actor", DID))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "feed": [item("k1", "one"), {"post": "broken"}, item("k2", "two")],
                "cursor": "c2"
            })))
            .mount(&server)
            .await;

        let config = BlueskyConfig {
            service: server.uri(),
            pagination_delay_ms: 0,
            ..BlueskyConfig::default()
        };
        let client = BlueskyClient::new(Client::new(), &config, &HttpConfig::default())
            .with_retry_delay(Duration::ZERO);

        let session = client.login("alice.bsky.social", "pw").await.unwrap();
        let posts = client.collect_posts(&session).await;
        let texts: Vec<_> = posts.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_bad_password_is_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/xrpc/com.atproto.server.createSession"))
            .respond_with(ResponseTemplate::new(401).set_body_string("AuthenticationRequired"))
            .mount(&server)
            .await;

        let config = BlueskyConfig {
            service: server.uri(),
            ..BlueskyConfig::default()
        };
        let client = BlueskyClient::new(Client::new(), &config, &HttpConfig::default());
        let err = client.login("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
    }
}
