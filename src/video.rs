#![forbid(unsafe_code)]

//! Video-level metadata mapped from `videos.list`, plus URL helpers.

use serde::{Deserialize, Serialize};

use crate::api::VideoItem;
use crate::error::CollectError;

const VIDEO_ID_LEN: usize = 11;

/// Row stored in the `videos` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    pub channel_title: String,
    pub channel_id: String,
    pub published_at: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub category_id: String,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub duration_iso: String,
    pub duration_seconds: u64,
    pub duration_formatted: String,
    pub definition: String,
    pub caption: bool,
    pub thumbnail_url: String,
    pub like_ratio: f64,
    pub engagement_rate: f64,
}

impl VideoMetadata {
    pub fn from_item(item: &VideoItem) -> Self {
        let snippet = &item.snippet;
        let stats = &item.statistics;
        let duration_seconds = parse_iso_duration(&item.content_details.duration).unwrap_or(0);
        let (like_ratio, engagement_rate) =
            engagement(stats.view_count, stats.like_count, stats.comment_count);

        Self {
            video_id: item.id.clone(),
            title: snippet.title.clone(),
            channel_title: snippet.channel_title.clone(),
            channel_id: snippet.channel_id.clone(),
            published_at: snippet.published_at.clone(),
            description: snippet.description.clone(),
            tags: snippet.tags.clone(),
            category_id: snippet.category_id.clone(),
            view_count: stats.view_count,
            like_count: stats.like_count,
            comment_count: stats.comment_count,
            duration_iso: item.content_details.duration.clone(),
            duration_seconds,
            duration_formatted: format_duration(duration_seconds),
            definition: item.content_details.definition.clone(),
            caption: item.content_details.caption.eq_ignore_ascii_case("true"),
            thumbnail_url: thumbnail_url(&item.id),
            like_ratio,
            engagement_rate,
        }
    }
}

/// Percentages of likes and of likes plus comments over views, rounded to
/// three decimals. Zero when the view count is unknown.
fn engagement(views: u64, likes: u64, comments: u64) -> (f64, f64) {
    if views == 0 {
        return (0.0, 0.0);
    }
    let views = views as f64;
    (
        round3(likes as f64 / views * 100.0),
        round3((likes + comments) as f64 / views * 100.0),
    )
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/maxresdefault.jpg")
}

/// Accepts a bare id or any of the usual watch/short/embed URL shapes.
pub fn extract_video_id(input: &str) -> Result<String, CollectError> {
    let trimmed = input.trim();
    if is_video_id(trimmed) {
        return Ok(trimmed.to_string());
    }

    let markers = [
        "youtube.com/watch?v=",
        "youtube.com/watch?",
        "youtu.be/",
        "youtube.com/embed/",
        "youtube.com/v/",
        "youtube.com/shorts/",
        "youtube.com/live/",
    ];
    for marker in markers {
        let Some(position) = trimmed.find(marker) else {
            continue;
        };
        let rest = &trimmed[position + marker.len()..];
        let rest = if marker.ends_with('?') {
            match rest.split('&').find_map(|pair| pair.strip_prefix("v=")) {
                Some(value) => value,
                None => continue,
            }
        } else {
            rest
        };
        let candidate: String = rest
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_')
            .collect();
        if is_video_id(&candidate) {
            return Ok(candidate);
        }
    }

    Err(CollectError::InvalidVideoRef(input.to_string()))
}

fn is_video_id(value: &str) -> bool {
    value.len() == VIDEO_ID_LEN
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

/// Parses ISO-8601 durations as the API reports them (`PT1H2M3S`, `P1DT2H`).
pub fn parse_iso_duration(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix('P')?;
    let mut total = 0u64;
    let mut digits = String::new();
    let mut in_time = false;
    let mut saw_component = false;

    for ch in rest.chars() {
        match ch {
            'T' => in_time = true,
            '0'..='9' => digits.push(ch),
            unit => {
                let amount: u64 = digits.parse().ok()?;
                digits.clear();
                let seconds = match (unit, in_time) {
                    ('W', false) => 7 * 86_400,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return None,
                };
                total = total.checked_add(amount.checked_mul(seconds)?)?;
                saw_component = true;
            }
        }
    }

    (digits.is_empty() && saw_component).then_some(total)
}

/// Renders durations as `H:MM:SS` or `M:SS` for short clips.
pub fn format_duration(duration: u64) -> String {
    let hours = duration / 3600;
    let minutes = (duration % 3600) / 60;
    let seconds = duration % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{VideoContentDetails, VideoSnippet, VideoStatistics};

    #[test]
    fn extracts_ids_from_common_urls() {
        for input in [
            "dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=10",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/v/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "  dQw4w9WgXcQ\n",
        ] {
            assert_eq!(extract_video_id(input).unwrap(), "dQw4w9WgXcQ", "{input}");
        }
    }

    #[test]
    fn rejects_non_video_input() {
        for input in ["", "short", "https://example.com/watch?v=123", "https://youtu.be/abc"] {
            assert!(matches!(
                extract_video_id(input),
                Err(CollectError::InvalidVideoRef(_))
            ));
        }
    }

    #[test]
    fn parses_iso_durations() {
        assert_eq!(parse_iso_duration("PT4M13S"), Some(253));
        assert_eq!(parse_iso_duration("PT1H"), Some(3600));
        assert_eq!(parse_iso_duration("P1DT2H3M4S"), Some(93_784));
        assert_eq!(parse_iso_duration("P0D"), Some(0));
        assert_eq!(parse_iso_duration("PT"), None);
        assert_eq!(parse_iso_duration("4M13S"), None);
        assert_eq!(parse_iso_duration("PT5X"), None);
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(253), "4:13");
        assert_eq!(format_duration(3_723), "1:02:03");
    }

    #[test]
    fn maps_video_item() {
        let item = VideoItem {
            id: "dQw4w9WgXcQ".into(),
            snippet: VideoSnippet {
                title: "Title".into(),
                channel_title: "Channel".into(),
                channel_id: "UC123".into(),
                published_at: "2009-10-25T06:57:33Z".into(),
                description: "desc".into(),
                tags: vec!["music".into()],
                category_id: "10".into(),
            },
            statistics: VideoStatistics {
                view_count: 2_000,
                like_count: 50,
                comment_count: 10,
            },
            content_details: VideoContentDetails {
                duration: "PT3M33S".into(),
                definition: "hd".into(),
                caption: "true".into(),
            },
        };
        let metadata = VideoMetadata::from_item(&item);
        assert_eq!(metadata.duration_seconds, 213);
        assert_eq!(metadata.duration_formatted, "3:33");
        assert!(metadata.caption);
        assert_eq!(metadata.like_ratio, 2.5);
        assert_eq!(metadata.engagement_rate, 3.0);
        assert_eq!(
            metadata.thumbnail_url,
            "https://img.youtube.com/vi/dQw4w9WgXcQ/maxresdefault.jpg"
        );
    }

    #[test]
    fn zero_views_give_zero_rates() {
        let metadata = VideoMetadata::from_item(&VideoItem::default());
        assert_eq!(metadata.like_ratio, 0.0);
        assert_eq!(metadata.engagement_rate, 0.0);
        assert_eq!(metadata.duration_seconds, 0);
        assert!(!metadata.caption);
    }
}
