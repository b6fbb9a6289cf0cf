#![forbid(unsafe_code)]

//! One video end to end: resolve the reference, fetch video and channel
//! metadata, collect the full comment tree, analyze it and persist
//! everything. Channels can also be looked up on their own.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::{CommentStructure, analyze_comment_structure};
use crate::api::YouTubeApi;
use crate::channel::ChannelMetadata;
use crate::collector::{CollectionStatus, CommentCollector, Fetch};
use crate::error::CollectError;
use crate::metadata::MetadataStore;
use crate::quota::CredentialSource;
use crate::video::{VideoMetadata, extract_video_id};

#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    /// Look up `videos.list` before collecting comments.
    pub include_metadata: bool,
    /// Also look up the owning channel. Needs `include_metadata`.
    pub include_channel: bool,
    /// Write results to the store when one is given.
    pub store: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            include_metadata: true,
            include_channel: true,
            store: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoReport {
    pub video_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VideoMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelMetadata>,
    pub comment_count: usize,
    /// Rows written to the store, when storing was enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_comments: Option<usize>,
    pub structure: CommentStructure,
    /// Units spent on this video across every key used.
    pub quota_used: u64,
    pub status: CollectionStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub truncated_threads: Vec<String>,
    pub credential_index: usize,
}

/// Quota exhaustion and unknown videos are errors. Interrupted walks come
/// back as a report whose `status` is partial.
pub async fn process_video<A: YouTubeApi, S: CredentialSource>(
    collector: &mut CommentCollector<A, S>,
    store: Option<&MetadataStore>,
    video_ref: &str,
    options: ProcessOptions,
) -> Result<VideoReport> {
    let video_id = extract_video_id(video_ref)?;
    let spent_before = collector.quota_spent();
    let store = store.filter(|_| options.store);

    let metadata = if options.include_metadata {
        match collector.fetch_video_metadata(&video_id)? {
            Fetch::Done(item) => Some(VideoMetadata::from_item(&item)),
            Fetch::NotFound => return Err(CollectError::MetadataMissing(video_id).into()),
            Fetch::Stopped(reason) => {
                warn!(%video_id, ?reason, "continuing without video metadata");
                None
            }
        }
    } else {
        None
    };

    if let (Some(store), Some(metadata)) = (store, &metadata) {
        store
            .upsert_video(metadata)
            .await
            .with_context(|| format!("saving metadata for {video_id}"))?;
        info!(%video_id, title = %metadata.title, "stored video metadata");
    }

    let channel = match &metadata {
        Some(metadata) if options.include_channel && !metadata.channel_id.is_empty() => {
            lookup_channel(collector, store, &metadata.channel_id).await?
        }
        _ => None,
    };

    let collection = collector.collect_complete_comments(&video_id)?;
    let structure = analyze_comment_structure(&collection.records);

    let stored_comments = match store {
        Some(store) => {
            let written = store
                .upsert_comments(&collection.records)
                .await
                .with_context(|| format!("saving comments for {video_id}"))?;
            info!(%video_id, written, "stored comments");
            Some(written)
        }
        None => None,
    };

    Ok(VideoReport {
        video_id,
        metadata,
        channel,
        comment_count: collection.records.len(),
        stored_comments,
        structure,
        quota_used: collector.quota_spent() - spent_before,
        status: collection.status,
        truncated_threads: collection.truncated_threads,
        credential_index: collector.active_key_index(),
    })
}

/// Channel lookup during a video run. A channel the API cannot return only
/// costs the video its channel row.
async fn lookup_channel<A: YouTubeApi, S: CredentialSource>(
    collector: &mut CommentCollector<A, S>,
    store: Option<&MetadataStore>,
    channel_id: &str,
) -> Result<Option<ChannelMetadata>> {
    let channel = match collector.fetch_channel_metadata(channel_id)? {
        Fetch::Done(item) => ChannelMetadata::from_item(&item),
        Fetch::NotFound => {
            warn!(channel_id, "channel not returned by the API");
            return Ok(None);
        }
        Fetch::Stopped(reason) => {
            warn!(channel_id, ?reason, "continuing without channel metadata");
            return Ok(None);
        }
    };
    if let Some(store) = store {
        store
            .upsert_channel(&channel)
            .await
            .with_context(|| format!("saving channel {channel_id}"))?;
        info!(channel_id, title = %channel.title, "stored channel metadata");
    }
    Ok(Some(channel))
}

/// Looks up one channel by id or `@handle` and stores it when a store is
/// given.
pub async fn process_channel<A: YouTubeApi, S: CredentialSource>(
    collector: &mut CommentCollector<A, S>,
    store: Option<&MetadataStore>,
    channel_ref: &str,
) -> Result<ChannelMetadata> {
    let channel_ref = channel_ref.trim();
    let channel = match collector.fetch_channel_metadata(channel_ref)? {
        Fetch::Done(item) => ChannelMetadata::from_item(&item),
        Fetch::NotFound => return Err(CollectError::ChannelMissing(channel_ref.to_string()).into()),
        Fetch::Stopped(reason) => bail!("channel lookup for {channel_ref} stopped: {reason:?}"),
    };
    if let Some(store) = store {
        store
            .upsert_channel(&channel)
            .await
            .with_context(|| format!("saving channel {channel_ref}"))?;
    }
    info!(
        channel_id = %channel.channel_id,
        title = %channel.title,
        subscribers = channel.subscriber_count,
        "processed channel"
    );
    Ok(channel)
}
