//! Content fingerprints used to detect duplicate notes.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::NoteResource;
use crate::utils::normalize_whitespace;

/// Hash of normalized note text plus the sorted hashes of its attachments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Build a fingerprint from note text and per-attachment hashes.
    ///
    /// Attachment order does not matter.
    pub fn compute(content: &str, attachment_hashes: &[String]) -> Self {
        let mut sorted: Vec<&str> = attachment_hashes.iter().map(String::as_str).collect();
        sorted.sort_unstable();

        let mut hasher = Sha256::new();
        hasher.update(normalize_whitespace(content).as_bytes());
        hasher.update(b"||");
        hasher.update(sorted.join("|").as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-256 hex digest of raw bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hash identifying an attachment from its metadata alone.
pub fn metadata_hash(resource: &NoteResource) -> String {
    content_hash(format!("{}:{}:{}", resource.filename, resource.mime_type, resource.size).as_bytes())
}

/// Signature of raw text, used to skip posts already present in the destination.
pub fn text_signature(text: &str) -> String {
    content_hash(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_differences_do_not_change_fingerprint() {
        let a = Fingerprint::compute("hello   world\n", &[]);
        let b = Fingerprint::compute("  hello world", &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn attachment_order_does_not_matter() {
        let h1 = content_hash(b"one");
        let h2 = content_hash(b"two");
        let a = Fingerprint::compute("text", &[h1.clone(), h2.clone()]);
        let b = Fingerprint::compute("text", &[h2, h1]);
        assert_eq!(a, b);
    }

    #[test]
    fn attachments_distinguish_equal_text() {
        let a = Fingerprint::compute("text", &[content_hash(b"one")]);
        let b = Fingerprint::compute("text", &[content_hash(b"two")]);
        let c = Fingerprint::compute("text", &[]);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn metadata_hash_uses_filename_type_and_size() {
        let r = NoteResource {
            name: "attachments/1".into(),
            filename: "a.jpg".into(),
            mime_type: "image/jpeg".into(),
            size: 10,
        };
        let mut other = r.clone();
        other.name = "attachments/2".into();
        assert_eq!(metadata_hash(&r), metadata_hash(&other));
        other.size = 11;
        assert_ne!(metadata_hash(&r), metadata_hash(&other));
    }
}
