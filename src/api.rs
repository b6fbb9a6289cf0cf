#![forbid(unsafe_code)]

//! Typed boundary to the YouTube Data API v3.
//!
//! Only the fields the collector reads are modelled. Every call takes the API
//! key explicitly so key rotation never needs to rebuild a client.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::{ApiError, ApiResult};

/// Hard maximum the API accepts for `maxResults` on list calls.
pub const MAX_PAGE_SIZE: u32 = 100;

const QUOTA_REASONS: &[&str] = &["quotaExceeded", "dailyLimitExceeded"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadListRequest {
    pub video_id: String,
    pub page_size: u32,
    pub page_token: Option<String>,
}

impl ThreadListRequest {
    pub fn new(video_id: &str, page_token: Option<String>) -> Self {
        Self {
            video_id: video_id.to_string(),
            page_size: MAX_PAGE_SIZE,
            page_token,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyListRequest {
    pub parent_id: String,
    pub page_size: u32,
    pub page_token: Option<String>,
}

impl ReplyListRequest {
    pub fn new(parent_id: &str, page_token: Option<String>) -> Self {
        Self {
            parent_id: parent_id.to_string(),
            page_size: MAX_PAGE_SIZE,
            page_token,
        }
    }
}

/// `commentThreads.list` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommentThreadListResponse {
    pub items: Vec<CommentThread>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentThread {
    pub id: String,
    pub snippet: ThreadSnippet,
    pub replies: Option<ThreadReplies>,
}

impl CommentThread {
    /// Replies returned inline with the thread; the API caps these at a
    /// handful regardless of the real reply count.
    pub fn embedded_replies(&self) -> &[Comment] {
        self.replies
            .as_ref()
            .map(|replies| replies.comments.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThreadSnippet {
    pub video_id: Option<String>,
    pub top_level_comment: Comment,
    #[serde(deserialize_with = "count")]
    pub total_reply_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThreadReplies {
    pub comments: Vec<Comment>,
}

/// `comments.list` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommentListResponse {
    pub items: Vec<Comment>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Comment {
    pub id: String,
    pub snippet: CommentSnippet,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommentSnippet {
    pub author_display_name: String,
    pub author_channel_id: Option<ChannelRef>,
    pub text_display: String,
    pub text_original: String,
    #[serde(deserialize_with = "count")]
    pub like_count: u64,
    pub published_at: String,
    pub updated_at: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChannelRef {
    pub value: String,
}

/// `videos.list` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VideoListResponse {
    pub items: Vec<VideoItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoItem {
    pub id: String,
    pub snippet: VideoSnippet,
    pub statistics: VideoStatistics,
    pub content_details: VideoContentDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoSnippet {
    pub title: String,
    pub channel_title: String,
    pub channel_id: String,
    pub published_at: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
}

/// Counts arrive as decimal strings; absent counts are hidden by the uploader.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoStatistics {
    #[serde(deserialize_with = "count")]
    pub view_count: u64,
    #[serde(deserialize_with = "count")]
    pub like_count: u64,
    #[serde(deserialize_with = "count")]
    pub comment_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VideoContentDetails {
    pub duration: String,
    pub definition: String,
    pub caption: String,
}

/// `channels.list` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChannelListResponse {
    pub items: Vec<ChannelItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChannelItem {
    pub id: String,
    pub etag: String,
    pub snippet: ChannelSnippet,
    pub statistics: ChannelStatistics,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSnippet {
    pub title: String,
    pub description: String,
    pub custom_url: String,
    pub published_at: String,
    pub country: String,
    /// Keyed by quality: `default`, `medium`, `high`, ...
    pub thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelStatistics {
    #[serde(deserialize_with = "count")]
    pub view_count: u64,
    #[serde(deserialize_with = "count")]
    pub subscriber_count: u64,
    pub hidden_subscriber_count: bool,
    #[serde(deserialize_with = "count")]
    pub video_count: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

fn count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(NumberOrString::Number(value)) => value,
        Some(NumberOrString::Text(text)) => text.trim().parse().unwrap_or(0),
        None => 0,
    })
}

/// A listing response that can be walked page by page.
pub trait Paginated {
    type Item;

    fn into_page(self) -> (Vec<Self::Item>, Option<String>);
}

impl Paginated for CommentThreadListResponse {
    type Item = CommentThread;

    fn into_page(self) -> (Vec<CommentThread>, Option<String>) {
        (self.items, non_empty(self.next_page_token))
    }
}

impl Paginated for CommentListResponse {
    type Item = Comment;

    fn into_page(self) -> (Vec<Comment>, Option<String>) {
        (self.items, non_empty(self.next_page_token))
    }
}

fn non_empty(token: Option<String>) -> Option<String> {
    token.filter(|token| !token.is_empty())
}

/// The endpoints the collector needs. Implemented over HTTP by
/// [`HttpYouTubeApi`]; tests substitute scripted fakes.
pub trait YouTubeApi {
    fn list_comment_threads(
        &self,
        key: &str,
        request: &ThreadListRequest,
    ) -> ApiResult<CommentThreadListResponse>;

    fn list_replies(&self, key: &str, request: &ReplyListRequest)
    -> ApiResult<CommentListResponse>;

    fn list_videos(&self, key: &str, video_id: &str) -> ApiResult<VideoListResponse>;

    /// `channel` is either a channel id or an `@handle`.
    fn list_channels(&self, key: &str, channel: &str) -> ApiResult<ChannelListResponse>;
}

impl<T: YouTubeApi + ?Sized> YouTubeApi for &T {
    fn list_comment_threads(
        &self,
        key: &str,
        request: &ThreadListRequest,
    ) -> ApiResult<CommentThreadListResponse> {
        (**self).list_comment_threads(key, request)
    }

    fn list_replies(
        &self,
        key: &str,
        request: &ReplyListRequest,
    ) -> ApiResult<CommentListResponse> {
        (**self).list_replies(key, request)
    }

    fn list_videos(&self, key: &str, video_id: &str) -> ApiResult<VideoListResponse> {
        (**self).list_videos(key, video_id)
    }

    fn list_channels(&self, key: &str, channel: &str) -> ApiResult<ChannelListResponse> {
        (**self).list_channels(key, channel)
    }
}

/// Blocking client over `ureq` with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpYouTubeApi {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpYouTubeApi {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        key: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut request = self.agent.get(&url).query("key", key);
        for (name, value) in query {
            request = request.query(name, value);
        }
        debug!(endpoint, "calling YouTube API");

        match request.call() {
            Ok(response) => response
                .into_json::<T>()
                .map_err(|err| ApiError::Transient(format!("decoding {endpoint} response: {err}"))),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(classify_status(status, &body))
            }
            Err(ureq::Error::Transport(transport)) => Err(ApiError::Transient(transport.to_string())),
        }
    }
}

impl YouTubeApi for HttpYouTubeApi {
    fn list_comment_threads(
        &self,
        key: &str,
        request: &ThreadListRequest,
    ) -> ApiResult<CommentThreadListResponse> {
        let mut query = vec![
            ("part", "snippet,replies".to_string()),
            ("videoId", request.video_id.clone()),
            ("maxResults", request.page_size.to_string()),
            ("order", "time".to_string()),
            ("textFormat", "html".to_string()),
        ];
        if let Some(token) = &request.page_token {
            query.push(("pageToken", token.clone()));
        }
        self.get("commentThreads", key, &query)
    }

    fn list_replies(
        &self,
        key: &str,
        request: &ReplyListRequest,
    ) -> ApiResult<CommentListResponse> {
        let mut query = vec![
            ("part", "snippet".to_string()),
            ("parentId", request.parent_id.clone()),
            ("maxResults", request.page_size.to_string()),
            ("textFormat", "html".to_string()),
        ];
        if let Some(token) = &request.page_token {
            query.push(("pageToken", token.clone()));
        }
        self.get("comments", key, &query)
    }

    fn list_videos(&self, key: &str, video_id: &str) -> ApiResult<VideoListResponse> {
        let query = [
            ("part", "snippet,statistics,contentDetails".to_string()),
            ("id", video_id.to_string()),
        ];
        self.get("videos", key, &query)
    }

    fn list_channels(&self, key: &str, channel: &str) -> ApiResult<ChannelListResponse> {
        let selector = if channel.starts_with('@') {
            "forHandle"
        } else {
            "id"
        };
        let query = [
            ("part", "snippet,statistics".to_string()),
            (selector, channel.to_string()),
        ];
        self.get("channels", key, &query)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    message: String,
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorDetail {
    reason: String,
}

/// Maps an HTTP error status plus the API's structured error body onto the
/// collector's error taxonomy.
pub fn classify_status(status: u16, body: &str) -> ApiError {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let reasons: Vec<&str> = envelope
        .error
        .errors
        .iter()
        .map(|detail| detail.reason.as_str())
        .collect();

    match status {
        403 if reasons.iter().any(|reason| QUOTA_REASONS.contains(reason)) => {
            ApiError::QuotaExceeded
        }
        404 => ApiError::NotFound,
        429 | 500..=599 => ApiError::Transient(format!("HTTP {status}")),
        _ => {
            let reason = reasons
                .first()
                .map(|reason| reason.to_string())
                .filter(|reason| !reason.is_empty())
                .unwrap_or(envelope.error.message);
            ApiError::Rejected { status, reason }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_body(reason: &str) -> String {
        serde_json::json!({
            "error": {
                "code": 403,
                "message": "The request cannot be completed.",
                "errors": [{ "domain": "youtube.quota", "reason": reason }]
            }
        })
        .to_string()
    }

    #[test]
    fn quota_reason_maps_to_quota_exceeded() {
        assert_eq!(classify_status(403, &error_body("quotaExceeded")), ApiError::QuotaExceeded);
        assert_eq!(
            classify_status(403, &error_body("dailyLimitExceeded")),
            ApiError::QuotaExceeded
        );
    }

    #[test]
    fn other_forbidden_reasons_are_rejections() {
        assert_eq!(
            classify_status(403, &error_body("commentsDisabled")),
            ApiError::Rejected {
                status: 403,
                reason: "commentsDisabled".into()
            }
        );
    }

    #[test]
    fn unparsable_forbidden_body_is_not_quota() {
        assert!(matches!(
            classify_status(403, "<html>nope</html>"),
            ApiError::Rejected { status: 403, .. }
        ));
    }

    #[test]
    fn not_found_and_server_errors() {
        assert_eq!(classify_status(404, ""), ApiError::NotFound);
        assert!(matches!(classify_status(503, ""), ApiError::Transient(_)));
        assert!(matches!(classify_status(429, ""), ApiError::Transient(_)));
    }

    #[test]
    fn parses_thread_page_with_embedded_replies() {
        let payload = serde_json::json!({
            "kind": "youtube#commentThreadListResponse",
            "nextPageToken": "CURSOR",
            "items": [{
                "id": "thread-1",
                "snippet": {
                    "videoId": "vid",
                    "totalReplyCount": 2,
                    "topLevelComment": {
                        "id": "thread-1",
                        "snippet": {
                            "authorDisplayName": "Ann",
                            "authorChannelId": { "value": "UC-ann" },
                            "textDisplay": "hi <b>there</b>",
                            "textOriginal": "hi there",
                            "likeCount": 4,
                            "publishedAt": "2024-01-01T00:00:00Z",
                            "updatedAt": "2024-01-01T00:00:00Z"
                        }
                    }
                },
                "replies": {
                    "comments": [{
                        "id": "thread-1.r1",
                        "snippet": { "textOriginal": "reply", "parentId": "thread-1" }
                    }]
                }
            }]
        });
        let response: CommentThreadListResponse = serde_json::from_value(payload).unwrap();
        let (items, next) = response.into_page();
        assert_eq!(next.as_deref(), Some("CURSOR"));
        let thread = &items[0];
        assert_eq!(thread.snippet.total_reply_count, 2);
        assert_eq!(thread.snippet.top_level_comment.snippet.like_count, 4);
        assert_eq!(thread.embedded_replies().len(), 1);
        assert_eq!(thread.embedded_replies()[0].snippet.like_count, 0);
    }

    #[test]
    fn empty_next_token_ends_pagination() {
        let response = CommentListResponse {
            items: Vec::new(),
            next_page_token: Some(String::new()),
        };
        assert_eq!(response.into_page().1, None);
    }

    #[test]
    fn video_statistics_accept_string_counts() {
        let payload = serde_json::json!({
            "items": [{
                "id": "vid",
                "statistics": { "viewCount": "1200", "likeCount": 30 },
                "contentDetails": { "duration": "PT4M13S" }
            }]
        });
        let response: VideoListResponse = serde_json::from_value(payload).unwrap();
        let stats = &response.items[0].statistics;
        assert_eq!(stats.view_count, 1200);
        assert_eq!(stats.like_count, 30);
        assert_eq!(stats.comment_count, 0);
    }

    #[test]
    fn parses_channel_listing() {
        let payload = serde_json::json!({
            "items": [{
                "id": "UC123",
                "etag": "tag",
                "snippet": {
                    "title": "Channel",
                    "customUrl": "@channel",
                    "publishedAt": "2015-03-01T00:00:00Z",
                    "thumbnails": { "high": { "url": "https://yt3/high.jpg" } }
                },
                "statistics": {
                    "viewCount": "9000",
                    "subscriberCount": "120",
                    "hiddenSubscriberCount": false,
                    "videoCount": "42"
                }
            }]
        });
        let response: ChannelListResponse = serde_json::from_value(payload).unwrap();
        let channel = &response.items[0];
        assert_eq!(channel.snippet.custom_url, "@channel");
        assert_eq!(channel.snippet.thumbnails["high"].url, "https://yt3/high.jpg");
        assert_eq!(channel.statistics.subscriber_count, 120);
        assert_eq!(channel.statistics.video_count, 42);
        assert!(channel.snippet.country.is_empty());
    }

    #[test]
    fn page_size_is_clamped() {
        let request = ThreadListRequest::new("vid", None).with_page_size(500);
        assert_eq!(request.page_size, MAX_PAGE_SIZE);
        let request = ThreadListRequest::new("vid", None).with_page_size(0);
        assert_eq!(request.page_size, 1);
    }
}
