//! Source post data structures.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of a post on its source platform.
///
/// Bluesky posts use their `at://` URI, X posts their numeric status id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub String);

impl PostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of media attached to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

/// A media reference on a source post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Download URL. For videos this is the post URL handed to yt-dlp.
    pub url: String,

    pub media_type: MediaType,
}

impl Attachment {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            media_type: MediaType::Image,
        }
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            media_type: MediaType::Video,
        }
    }
}

/// A post read from Bluesky or X. Never mutated after it is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,

    /// Handle or DID of the author
    pub author: String,

    pub text: String,

    /// Original creation time, when the source exposes it
    pub created_at: Option<DateTime<Utc>>,

    /// Media in source order
    #[serde(default)]
    pub attachments: Vec<Attachment>,

    /// Parent post for self-replies (Bluesky threads)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<PostId>,

    /// Public URL of the post
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl Post {
    pub fn is_reply(&self) -> bool {
        self.reply_to.is_some()
    }
}

/// Sort posts oldest first; posts without a timestamp keep their relative order at the end.
pub fn sort_oldest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| match (a.created_at, b.created_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Posts keyed by id, in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct PostSet {
    posts: Vec<Post>,
    ids: HashSet<PostId>,
}

impl PostSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a post unless its id is already present.
    pub fn insert(&mut self, post: Post) -> bool {
        if !self.ids.insert(post.id.clone()) {
            return false;
        }
        self.posts.push(post);
        true
    }

    /// Insert every post, returning how many were new.
    pub fn extend(&mut self, posts: impl IntoIterator<Item = Post>) -> usize {
        posts.into_iter().filter(|p| self.insert(p.clone())).count()
    }

    pub fn contains(&self, id: &PostId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.posts.iter()
    }

    /// Timestamp of the oldest dated post.
    pub fn earliest(&self) -> Option<DateTime<Utc>> {
        self.posts.iter().filter_map(|p| p.created_at).min()
    }

    pub fn into_vec(self) -> Vec<Post> {
        self.posts
    }
}
