// src/pipeline/normalize.rs

//! Source posts to note drafts.

use crate::models::{NoteDraft, Post, Visibility};

/// Draft for one post. Text is carried verbatim and attachments keep their order.
pub fn normalize(post: &Post, visibility: Visibility) -> NoteDraft {
    NoteDraft {
        content: post.text.clone(),
        created_at: post.created_at,
        visibility,
        attachments: post.attachments.clone(),
    }
}

/// Drafts for a batch of posts, one per post, in input order.
pub fn normalize_all(posts: &[Post], visibility: Visibility) -> Vec<NoteDraft> {
    posts.iter().map(|p| normalize(p, visibility)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attachment, PostId};
    use chrono::{TimeZone, Utc};

    fn post(id: &str, text: &str, attachments: Vec<Attachment>) -> Post {
        Post {
            id: PostId::new(id),
            author: "alice".into(),
            text: text.into(),
            created_at: Some(Utc.with_ymd_and_hms(2021, 6, 1, 8, 0, 0).unwrap()),
            attachments,
            reply_to: None,
            source_url: None,
        }
    }

    #[test]
    fn test_one_draft_per_post_in_order() {
        let posts = vec![
            post("1", "  spaced  text\n", vec![]),
            post(
                "2",
                "two pics",
                vec![Attachment::image("https://a/2.jpg"), Attachment::image("https://a/1.jpg")],
            ),
            post("3", "", vec![Attachment::video("https://x.com/a/status/3")]),
        ];
        let drafts = normalize_all(&posts, Visibility::Public);

        assert_eq!(drafts.len(), posts.len());
        for (draft, post) in drafts.iter().zip(&posts) {
            assert_eq!(draft.content, post.text);
            assert_eq!(draft.created_at, post.created_at);
            assert_eq!(draft.attachments, post.attachments);
            assert_eq!(draft.visibility, Visibility::Public);
        }
    }
}
