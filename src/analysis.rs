#![forbid(unsafe_code)]

//! Aggregate statistics over a finished comment set. Pure functions only.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::extract::CommentRecord;

const SUMMARY_TEXT_CHARS: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentStructure {
    pub total_comments: usize,
    pub top_level_comments: usize,
    pub replies: usize,
    pub total_threads: usize,
    pub threads_with_replies: usize,
    pub max_replies_per_thread: u64,
    pub average_replies_per_thread: f64,
    /// Collected replies per thread -> number of threads with that many.
    pub reply_distribution: BTreeMap<u64, usize>,
    pub most_replied_thread: Option<ThreadSummary>,
    pub total_likes: u64,
    pub average_likes_per_comment: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub comment_id: String,
    pub author: String,
    pub text: String,
    pub reply_count: u64,
    pub like_count: u64,
}

#[derive(Default)]
struct ThreadTally<'a> {
    collected: u64,
    declared: u64,
    top: Option<&'a CommentRecord>,
}

impl ThreadTally<'_> {
    /// Replies the thread is known to have: what was collected, or what the
    /// API declared when the replies endpoint came back short.
    fn size(&self) -> u64 {
        self.collected.max(self.declared)
    }
}

pub fn analyze_comment_structure(comments: &[CommentRecord]) -> CommentStructure {
    let mut analysis = CommentStructure::default();
    if comments.is_empty() {
        return analysis;
    }

    // Threads keyed by top-level id, kept in order of first appearance so ties
    // resolve to the earliest thread.
    let mut order: Vec<&str> = Vec::new();
    let mut tallies: HashMap<&str, ThreadTally<'_>> = HashMap::new();
    for comment in comments {
        let thread_id = if comment.is_reply {
            comment.parent_id.as_str()
        } else {
            comment.comment_id.as_str()
        };
        let tally = tallies.entry(thread_id).or_insert_with(|| {
            order.push(thread_id);
            ThreadTally::default()
        });
        if comment.is_reply {
            tally.collected += 1;
        } else {
            tally.declared = comment.reply_count;
            if tally.top.is_none() {
                tally.top = Some(comment);
            }
        }
    }

    let replies = comments.iter().filter(|comment| comment.is_reply).count();
    let top_level = comments.len() - replies;
    analysis.total_comments = comments.len();
    analysis.top_level_comments = top_level;
    analysis.replies = replies;
    analysis.total_threads = top_level;
    analysis.total_likes = comments.iter().map(|comment| comment.like_count).sum();
    analysis.average_likes_per_comment =
        round2(analysis.total_likes as f64 / comments.len() as f64);
    if top_level > 0 {
        analysis.average_replies_per_thread = round2(replies as f64 / top_level as f64);
    }

    let mut most_replied: Option<(&ThreadTally<'_>, u64)> = None;
    for thread_id in &order {
        let tally = &tallies[thread_id];
        if tally.collected > 0 {
            analysis.threads_with_replies += 1;
            *analysis
                .reply_distribution
                .entry(tally.collected)
                .or_default() += 1;
        }
        let size = tally.size();
        if size == 0 {
            continue;
        }
        analysis.max_replies_per_thread = analysis.max_replies_per_thread.max(size);
        if tally.top.is_some() && most_replied.is_none_or(|(_, best)| size > best) {
            most_replied = Some((tally, size));
        }
    }

    analysis.most_replied_thread = most_replied.and_then(|(tally, size)| {
        tally.top.map(|top| ThreadSummary {
            comment_id: top.comment_id.clone(),
            author: top.author.clone(),
            text: truncate_text(&top.text_original),
            reply_count: size,
            like_count: top.like_count,
        })
    });

    analysis
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn truncate_text(text: &str) -> String {
    if text.chars().count() <= SUMMARY_TEXT_CHARS {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(SUMMARY_TEXT_CHARS).collect();
    truncated.push_str("...");
    truncated
}
