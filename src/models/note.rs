//! Destination note (Memos memo) data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::Attachment;

/// Memo visibility as understood by the Memos API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[default]
    Private,
    Protected,
    Public,
    #[serde(other)]
    Unspecified,
}

impl Visibility {
    /// Visibility to send on create; unknown values fall back to private.
    pub fn or_private(self) -> Self {
        match self {
            Self::Unspecified => Self::Private,
            other => other,
        }
    }
}

/// A resource (attachment) linked to a memo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NoteResource {
    /// Resource name, e.g. `attachments/abc`
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub filename: String,

    /// MIME type
    #[serde(default, rename = "type")]
    pub mime_type: String,

    #[serde(default, deserialize_with = "lenient_size")]
    pub size: u64,
}

impl NoteResource {
    /// Short id part of the resource name.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// A memo stored in the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Resource name, e.g. `memos/abc`
    pub name: String,

    #[serde(default)]
    pub content: String,

    #[serde(
        default,
        rename = "createTime",
        deserialize_with = "lenient_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub visibility: Visibility,

    /// Attachments (Memos >= 0.25)
    #[serde(default)]
    pub attachments: Vec<NoteResource>,

    /// Resources (older Memos releases)
    #[serde(default)]
    pub resources: Vec<NoteResource>,
}

impl Note {
    /// Linked resources, whichever field the server populated.
    pub fn resources(&self) -> &[NoteResource] {
        if self.attachments.is_empty() {
            &self.resources
        } else {
            &self.attachments
        }
    }

    /// Short id part of the memo name.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// A note with nothing in it.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty() && self.resources().is_empty()
    }
}

/// A note to be created by the destination writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub visibility: Visibility,

    /// Attachments in the order they must be uploaded
    pub attachments: Vec<Attachment>,
}

/// Downloaded attachment bytes ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

fn lenient_time<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }))
}

// int64 fields arrive as JSON strings from the protobuf gateway
fn lenient_size<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    })
}
