#![forbid(unsafe_code)]

//! Channel-level metadata mapped from `channels.list`.

use serde::{Deserialize, Serialize};

use crate::api::{ChannelItem, ChannelSnippet};

const THUMBNAIL_PREFERENCE: [&str; 3] = ["high", "medium", "default"];

/// Row stored in the `channels` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetadata {
    pub channel_id: String,
    pub title: String,
    pub custom_url: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub published_at: String,
    pub etag: String,
    pub hidden_subscriber_count: bool,
    pub subscriber_count: u64,
    pub video_count: u64,
    pub view_count: u64,
    pub thumbnail_url: String,
}

impl ChannelMetadata {
    pub fn from_item(item: &ChannelItem) -> Self {
        let snippet = &item.snippet;
        let stats = &item.statistics;
        Self {
            channel_id: item.id.clone(),
            title: snippet.title.clone(),
            custom_url: snippet.custom_url.clone(),
            country: snippet.country.clone(),
            description: snippet.description.clone(),
            published_at: snippet.published_at.clone(),
            etag: item.etag.clone(),
            hidden_subscriber_count: stats.hidden_subscriber_count,
            subscriber_count: stats.subscriber_count,
            video_count: stats.video_count,
            view_count: stats.view_count,
            thumbnail_url: best_thumbnail(snippet),
        }
    }
}

/// Largest listed thumbnail, or an empty string when none is listed.
fn best_thumbnail(snippet: &ChannelSnippet) -> String {
    THUMBNAIL_PREFERENCE
        .iter()
        .filter_map(|quality| snippet.thumbnails.get(*quality))
        .map(|thumbnail| thumbnail.url.as_str())
        .find(|url| !url.is_empty())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChannelStatistics, Thumbnail};

    fn thumbnail(url: &str) -> Thumbnail {
        Thumbnail { url: url.into() }
    }

    #[test]
    fn maps_channel_item() {
        let item = ChannelItem {
            id: "UC123".into(),
            etag: "etag-1".into(),
            snippet: ChannelSnippet {
                title: "Channel".into(),
                custom_url: "@channel".into(),
                country: "KR".into(),
                published_at: "2015-03-01T00:00:00Z".into(),
                thumbnails: [
                    ("default".to_string(), thumbnail("https://yt3/default.jpg")),
                    ("medium".to_string(), thumbnail("https://yt3/medium.jpg")),
                ]
                .into_iter()
                .collect(),
                ..ChannelSnippet::default()
            },
            statistics: ChannelStatistics {
                view_count: 9_000,
                subscriber_count: 120,
                hidden_subscriber_count: false,
                video_count: 42,
            },
        };

        let channel = ChannelMetadata::from_item(&item);
        assert_eq!(channel.channel_id, "UC123");
        assert_eq!(channel.custom_url, "@channel");
        assert_eq!(channel.country, "KR");
        assert_eq!(channel.etag, "etag-1");
        assert_eq!(channel.subscriber_count, 120);
        assert_eq!(channel.video_count, 42);
        assert_eq!(channel.view_count, 9_000);
        assert_eq!(channel.thumbnail_url, "https://yt3/medium.jpg");
    }

    #[test]
    fn missing_thumbnails_leave_url_empty() {
        let channel = ChannelMetadata::from_item(&ChannelItem::default());
        assert!(channel.thumbnail_url.is_empty());
        assert!(!channel.hidden_subscriber_count);
    }
}
