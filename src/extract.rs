#![forbid(unsafe_code)]

//! Normalizes raw API comments into flat [`CommentRecord`] rows.

use serde::{Deserialize, Serialize};

use crate::api::{Comment, CommentThread};

/// One comment or reply, flattened. Replies carry their thread's top-level
/// comment id in `parent_id`; the API nests only one level deep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub comment_id: String,
    pub video_id: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub author_channel_id: String,
    pub comment_text: String,
    pub text_original: String,
    pub like_count: u64,
    pub published_at: String,
    pub updated_at: String,
    pub reply_count: u64,
    pub is_reply: bool,
    #[serde(default)]
    pub parent_id: String,
    pub reply_depth: u8,
}

/// Where a raw item came from. Thread items nest their comment one level
/// deeper than reply items do.
#[derive(Debug, Clone, Copy)]
pub enum RawItem<'a> {
    Thread(&'a CommentThread),
    Reply {
        comment: &'a Comment,
        parent_id: &'a str,
    },
}

pub fn extract(item: RawItem<'_>, video_id: &str) -> CommentRecord {
    let (comment, reply_count, parent_id) = match item {
        RawItem::Thread(thread) => (
            &thread.snippet.top_level_comment,
            thread.snippet.total_reply_count,
            "",
        ),
        RawItem::Reply { comment, parent_id } => (comment, 0, parent_id),
    };
    let snippet = &comment.snippet;
    let is_reply = matches!(item, RawItem::Reply { .. });
    // Thread ids double as the top-level comment id.
    let comment_id = match item {
        RawItem::Thread(thread) if !thread.id.is_empty() => thread.id.clone(),
        _ => comment.id.clone(),
    };

    CommentRecord {
        comment_id,
        video_id: video_id.to_string(),
        author: snippet.author_display_name.clone(),
        author_channel_id: snippet
            .author_channel_id
            .as_ref()
            .map(|channel| channel.value.clone())
            .unwrap_or_default(),
        comment_text: snippet.text_display.clone(),
        text_original: snippet.text_original.clone(),
        like_count: snippet.like_count,
        published_at: snippet.published_at.clone(),
        updated_at: snippet.updated_at.clone(),
        reply_count,
        is_reply,
        parent_id: parent_id.to_string(),
        reply_depth: u8::from(is_reply && !parent_id.is_empty()),
    }
}

pub fn extract_thread(thread: &CommentThread, video_id: &str) -> CommentRecord {
    extract(RawItem::Thread(thread), video_id)
}

pub fn extract_reply(comment: &Comment, video_id: &str, parent_id: &str) -> CommentRecord {
    extract(RawItem::Reply { comment, parent_id }, video_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChannelRef, CommentSnippet, ThreadReplies, ThreadSnippet};

    fn comment(id: &str, likes: u64) -> Comment {
        Comment {
            id: id.into(),
            snippet: CommentSnippet {
                author_display_name: format!("author-{id}"),
                author_channel_id: Some(ChannelRef {
                    value: format!("UC-{id}"),
                }),
                text_display: format!("<b>{id}</b>"),
                text_original: id.into(),
                like_count: likes,
                published_at: "2024-03-01T10:00:00Z".into(),
                updated_at: "2024-03-02T10:00:00Z".into(),
                parent_id: None,
            },
        }
    }

    #[test]
    fn thread_reads_nested_snippet_and_reply_total() {
        let thread = CommentThread {
            id: "t1".into(),
            snippet: ThreadSnippet {
                video_id: Some("vid".into()),
                top_level_comment: comment("t1", 9),
                total_reply_count: 12,
            },
            replies: Some(ThreadReplies {
                comments: vec![comment("t1.a", 1)],
            }),
        };
        let record = extract_thread(&thread, "vid");
        assert_eq!(record.comment_id, "t1");
        assert_eq!(record.author, "author-t1");
        assert_eq!(record.author_channel_id, "UC-t1");
        assert_eq!(record.comment_text, "<b>t1</b>");
        assert_eq!(record.text_original, "t1");
        assert_eq!(record.like_count, 9);
        assert_eq!(record.reply_count, 12);
        assert!(!record.is_reply);
        assert!(record.parent_id.is_empty());
        assert_eq!(record.reply_depth, 0);
    }

    #[test]
    fn reply_reports_zero_replies_and_depth_one() {
        let record = extract_reply(&comment("t1.a", 3), "vid", "t1");
        assert_eq!(record.comment_id, "t1.a");
        assert_eq!(record.video_id, "vid");
        assert_eq!(record.reply_count, 0);
        assert!(record.is_reply);
        assert_eq!(record.parent_id, "t1");
        assert_eq!(record.reply_depth, 1);
        assert_eq!(record.updated_at, "2024-03-02T10:00:00Z");
    }

    #[test]
    fn missing_author_channel_becomes_empty() {
        let mut raw = comment("x", 0);
        raw.snippet.author_channel_id = None;
        let record = extract_reply(&raw, "vid", "t1");
        assert_eq!(record.author_channel_id, "");
    }
}
