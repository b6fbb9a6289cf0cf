#![forbid(unsafe_code)]

//! Collects every comment and reply of one or more YouTube videos through the
//! Data API, rotating API keys as their daily quota runs out, and stores the
//! result in SQLite. Channels can be looked up on their own with `--channel`.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use yt_collector::api::HttpYouTubeApi;
use yt_collector::collector::{CollectionStatus, CommentCollector};
use yt_collector::config::{EnvCredentials, SettingsOverrides, resolve_settings};
use yt_collector::error::CollectError;
use yt_collector::metadata::MetadataStore;
use yt_collector::channel::ChannelMetadata;
use yt_collector::workflow::{ProcessOptions, VideoReport, process_channel, process_video};

#[derive(Parser, Debug)]
#[command(
    name = "collect_comments",
    about = "Collect complete comment threads for YouTube videos"
)]
struct Cli {
    /// Video URLs or 11-character ids
    #[arg(required_unless_present = "channels")]
    videos: Vec<String>,

    /// Channel id or @handle to look up and store; repeatable
    #[arg(long = "channel", value_name = "CHANNEL")]
    channels: Vec<String>,

    /// Dotenv file holding YOUTUBE_API_KEY1, YOUTUBE_API_KEY2, ...
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// SQLite database receiving videos and comments
    #[arg(long)]
    database: Option<PathBuf>,

    /// Quota units available per API key
    #[arg(long)]
    quota_limit: Option<u64>,

    /// Attempts per request before a transient failure ends the walk
    #[arg(long)]
    max_retries: Option<u32>,

    /// Do not call videos.list before collecting comments
    #[arg(long)]
    skip_metadata: bool,

    /// Do not look up the channel owning each video
    #[arg(long)]
    skip_channel: bool,

    /// Keep results in memory only
    #[arg(long)]
    no_store: bool,

    /// Print one JSON report per video instead of a summary
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|value| value.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let settings = resolve_settings(SettingsOverrides {
        quota_limit: cli.quota_limit,
        max_retries: cli.max_retries,
        api_base: None,
        database_path: cli.database.clone(),
        env_path: cli.env_file.clone(),
    })
    .context("loading configuration")?;

    let api = HttpYouTubeApi::new(&settings.api_base, settings.request_timeout);
    let credentials = EnvCredentials::new(settings.env_path.clone());
    let mut collector = CommentCollector::from_settings(api, credentials, &settings)
        .context("preparing API credentials")?;
    watch_for_interrupt(collector.abort_handle());

    let store = if cli.no_store {
        None
    } else {
        Some(
            MetadataStore::open(&settings.database_path)
                .await
                .context("initializing database")?,
        )
    };
    let options = ProcessOptions {
        include_metadata: !cli.skip_metadata,
        include_channel: !cli.skip_channel,
        store: !cli.no_store,
    };

    info!(
        videos = cli.videos.len(),
        channels = cli.channels.len(),
        quota_limit = settings.quota_limit,
        max_retries = settings.max_retries,
        "starting comment collection"
    );

    let abort = collector.abort_handle();
    let mut failures = 0usize;
    for channel_ref in &cli.channels {
        if abort.load(Ordering::Relaxed) {
            break;
        }
        match process_channel(&mut collector, store.as_ref(), channel_ref).await {
            Ok(channel) => {
                if cli.json {
                    println!("{}", serde_json::to_string(&channel)?);
                } else {
                    print_channel(&channel);
                }
            }
            Err(err) => {
                if is_quota_exhausted(&err) {
                    error!("{err:#}");
                    bail!("quota exhausted on every configured key");
                }
                error!(channel = %channel_ref, "{err:#}");
                failures += 1;
            }
        }
    }

    for video_ref in &cli.videos {
        if abort.load(Ordering::Relaxed) {
            warn!("interrupted; skipping remaining videos");
            break;
        }

        match process_video(&mut collector, store.as_ref(), video_ref, options).await {
            Ok(report) => {
                if cli.json {
                    println!("{}", serde_json::to_string(&report)?);
                } else {
                    print_summary(&report);
                }
            }
            Err(err) => {
                if is_quota_exhausted(&err) {
                    error!("{err:#}");
                    bail!("quota exhausted on every configured key");
                }
                error!(video = %video_ref, "{err:#}");
                failures += 1;
            }
        }
    }

    info!(
        quota_spent = collector.quota_spent(),
        key_index = collector.active_key_index(),
        "collection finished"
    );

    if failures > 0 {
        bail!(
            "{failures} of {} lookups failed",
            cli.videos.len() + cli.channels.len()
        );
    }
    Ok(())
}

fn is_quota_exhausted(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<CollectError>(),
        Some(CollectError::QuotaExhausted { .. })
    )
}

/// Sets the collector's abort flag on Ctrl-C so the current walk returns
/// what it already has.
fn watch_for_interrupt(abort: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing with partial results");
            abort.store(true, Ordering::Relaxed);
        }
    });
}

fn print_channel(channel: &ChannelMetadata) {
    println!("===================================");
    println!("{} ({})", channel.title, channel.channel_id);
    println!("===================================");
    if !channel.custom_url.is_empty() {
        println!("Handle: {}", channel.custom_url);
    }
    if channel.hidden_subscriber_count {
        println!("Subscribers: hidden");
    } else {
        println!("Subscribers: {}", channel.subscriber_count);
    }
    println!(
        "Videos: {}  Views: {}",
        channel.video_count, channel.view_count
    );
    println!();
}

fn print_summary(report: &VideoReport) {
    println!("===================================");
    match &report.metadata {
        Some(metadata) => println!("{} ({})", metadata.title, report.video_id),
        None => println!("{}", report.video_id),
    }
    println!("===================================");
    if let Some(metadata) = &report.metadata {
        match &report.channel {
            Some(channel) => println!(
                "Channel: {} ({} subscribers)",
                metadata.channel_title, channel.subscriber_count
            ),
            None => println!("Channel: {}", metadata.channel_title),
        }
        println!(
            "Views: {}  Likes: {}  Duration: {}",
            metadata.view_count, metadata.like_count, metadata.duration_formatted
        );
        println!(
            "Like ratio: {}%  Engagement: {}%",
            metadata.like_ratio, metadata.engagement_rate
        );
    }

    let structure = &report.structure;
    println!(
        "Comments: {} ({} top-level, {} replies)",
        structure.total_comments, structure.top_level_comments, structure.replies
    );
    println!(
        "Threads with replies: {}  Max replies: {}  Avg replies: {}",
        structure.threads_with_replies,
        structure.max_replies_per_thread,
        structure.average_replies_per_thread
    );
    if let Some(thread) = &structure.most_replied_thread {
        println!(
            "Most replied: {} replies by {}: {}",
            thread.reply_count, thread.author, thread.text
        );
    }
    println!(
        "Quota used: {} (key {})",
        report.quota_used, report.credential_index
    );
    if let Some(stored) = report.stored_comments {
        println!("Stored comments: {stored}");
    }
    match &report.status {
        CollectionStatus::Complete => println!("Status: complete"),
        CollectionStatus::Partial(reason) => println!("Status: partial ({reason:?})"),
    }
    if !report.truncated_threads.is_empty() {
        println!("Truncated threads: {}", report.truncated_threads.join(", "));
    }
    println!();
}
