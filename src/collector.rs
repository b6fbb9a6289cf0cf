#![forbid(unsafe_code)]

//! Full comment/reply walk for a single video.
//!
//! Thread pages are fetched newest first. Threads whose declared reply count
//! exceeds the replies embedded in the thread response get a second walk over
//! the replies endpoint; replies already seen are dropped so every
//! `comment_id` appears once in the result.
//!
//! Calls are strictly sequential. Each one passes through the quota manager,
//! which may rotate to the next API key. Running out of keys is the only
//! failure that aborts a collection; retry exhaustion, rejections and
//! cancellation end the walk early and are reported on the returned
//! [`CommentCollection`].

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::analysis::analyze_comment_structure;
use crate::api::{
    ChannelItem, CommentThread, Paginated, ReplyListRequest, ThreadListRequest, VideoItem,
    YouTubeApi,
};
use crate::config::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS, Settings};
use crate::error::{ApiError, ApiResult, CollectError};
use crate::extract::{CommentRecord, extract_reply, extract_thread};
use crate::quota::{CredentialSource, QuotaManager};

/// Quota units charged per list call.
pub const LIST_CALL_COST: u64 = 1;

/// Why a walk ended before the API ran out of pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    RetriesExhausted { attempts: u32, last_error: String },
    Rejected { status: u16, reason: String },
    NotFound,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum CollectionStatus {
    Complete,
    Partial(StopReason),
}

impl CollectionStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, CollectionStatus::Complete)
    }
}

/// Everything gathered for one video, plus how the walk ended.
#[derive(Debug, Clone, Serialize)]
pub struct CommentCollection {
    pub video_id: String,
    pub records: Vec<CommentRecord>,
    pub pages: usize,
    pub threads: usize,
    pub status: CollectionStatus,
    /// Threads whose reply walk stopped early.
    pub truncated_threads: Vec<String>,
    #[serde(skip)]
    seen: HashSet<String>,
}

impl CommentCollection {
    fn new(video_id: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            records: Vec::new(),
            pages: 0,
            threads: 0,
            status: CollectionStatus::Complete,
            truncated_threads: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Appends `record` unless its id is already present.
    fn admit(&mut self, record: CommentRecord) -> bool {
        if !self.seen.insert(record.comment_id.clone()) {
            return false;
        }
        self.records.push(record);
        true
    }
}

/// Result of a replies-endpoint walk for one parent.
#[derive(Debug, Clone, Default)]
pub struct ReplyCompletion {
    /// Replies not present in the caller's known set.
    pub replies: Vec<CommentRecord>,
    pub stopped: Option<StopReason>,
}

/// Outcome of one guarded remote call.
#[derive(Debug)]
pub enum Fetch<T> {
    Done(T),
    NotFound,
    Stopped(StopReason),
}

enum WalkState {
    FetchingPage(Option<String>),
    ProcessingItems {
        items: Vec<CommentThread>,
        next: Option<String>,
    },
    Done(CollectionStatus),
}

pub struct CommentCollector<A, S> {
    api: A,
    quota: QuotaManager<S>,
    max_retries: u32,
    retry_delay: Duration,
    abort: Arc<AtomicBool>,
}

impl<A: YouTubeApi, S: CredentialSource> CommentCollector<A, S> {
    pub fn new(api: A, quota: QuotaManager<S>) -> Self {
        Self {
            api,
            quota,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_settings(api: A, credentials: S, settings: &Settings) -> Result<Self, CollectError> {
        let quota = QuotaManager::new(settings.quota_limit, settings.rate_limit_delay, credentials)?;
        Ok(Self::new(api, quota).with_retry_policy(settings.max_retries, settings.retry_delay))
    }

    /// `max_retries` counts attempts per request; backoff before attempt
    /// `n + 1` is `retry_delay * n`.
    pub fn with_retry_policy(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// Flag polled before every remote call. Setting it ends the current walk
    /// with [`StopReason::Cancelled`].
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    pub fn quota_usage(&self) -> u64 {
        self.quota.usage()
    }

    pub fn quota_limit(&self) -> u64 {
        self.quota.limit()
    }

    /// Units charged across all keys since the collector was built.
    pub fn quota_spent(&self) -> u64 {
        self.quota.spent()
    }

    pub fn active_key_index(&self) -> usize {
        self.quota.active_index()
    }

    fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// Collects every top-level comment and every reply of `video_id`.
    pub fn collect_complete_comments(
        &mut self,
        video_id: &str,
    ) -> Result<CommentCollection, CollectError> {
        info!(video_id, "collecting all comments and replies");
        let mut collection = CommentCollection::new(video_id);
        let mut state = WalkState::FetchingPage(None);

        loop {
            state = match state {
                WalkState::FetchingPage(cursor) => {
                    let request = ThreadListRequest::new(video_id, cursor);
                    match self.fetch("comment threads", |api, key| {
                        api.list_comment_threads(key, &request)
                    })? {
                        Fetch::Done(response) => {
                            collection.pages += 1;
                            let (items, next) = response.into_page();
                            WalkState::ProcessingItems { items, next }
                        }
                        Fetch::NotFound => {
                            warn!(video_id, "comment threads not found for video");
                            WalkState::Done(CollectionStatus::Partial(StopReason::NotFound))
                        }
                        Fetch::Stopped(reason) => {
                            WalkState::Done(CollectionStatus::Partial(reason))
                        }
                    }
                }
                WalkState::ProcessingItems { items, next } => {
                    let before = collection.records.len();
                    let mut cancelled = false;
                    for thread in &items {
                        if let Some(reason) = self.process_thread(thread, video_id, &mut collection)? {
                            cancelled = matches!(reason, StopReason::Cancelled);
                            if cancelled {
                                break;
                            }
                        }
                    }
                    debug!(
                        video_id,
                        page = collection.pages,
                        added = collection.records.len() - before,
                        total = collection.records.len(),
                        threads = collection.threads,
                        "processed comment page"
                    );
                    match next {
                        _ if cancelled => {
                            WalkState::Done(CollectionStatus::Partial(StopReason::Cancelled))
                        }
                        Some(cursor) => WalkState::FetchingPage(Some(cursor)),
                        None => WalkState::Done(CollectionStatus::Complete),
                    }
                }
                WalkState::Done(status) => {
                    collection.status = status;
                    break;
                }
            };
        }

        self.log_summary(&collection);
        Ok(collection)
    }

    /// Adds one thread's top-level comment and all of its replies. Returns a
    /// stop reason only when the reply walk was cut short.
    fn process_thread(
        &mut self,
        thread: &CommentThread,
        video_id: &str,
        collection: &mut CommentCollection,
    ) -> Result<Option<StopReason>, CollectError> {
        // A thread repeated on a later page was already completed.
        if !collection.admit(extract_thread(thread, video_id)) {
            debug!(thread_id = %thread.id, "thread already collected, skipping");
            return Ok(None);
        }
        collection.threads += 1;

        let embedded = thread.embedded_replies();
        let mut known = HashSet::with_capacity(embedded.len());
        for reply in embedded {
            let record = extract_reply(reply, video_id, &thread.id);
            known.insert(record.comment_id.clone());
            collection.admit(record);
        }

        let total = thread.snippet.total_reply_count;
        if total <= embedded.len() as u64 {
            return Ok(None);
        }
        debug!(
            parent_id = %thread.id,
            total,
            embedded = embedded.len(),
            "thread has more replies than embedded, completing"
        );

        let completion = self.complete_replies(&thread.id, video_id, &known)?;
        let mut added = 0usize;
        for record in completion.replies {
            if collection.admit(record) {
                added += 1;
            }
        }
        if added > 0 {
            debug!(parent_id = %thread.id, added, "added completed replies");
        }

        match completion.stopped {
            None => Ok(None),
            Some(reason) => {
                if reason != StopReason::Cancelled {
                    warn!(parent_id = %thread.id, ?reason, "reply walk ended early");
                }
                collection.truncated_threads.push(thread.id.clone());
                Ok(Some(reason))
            }
        }
    }

    /// Walks the replies endpoint for `parent_id` and returns the replies that
    /// are not in `already_known`.
    pub fn complete_replies(
        &mut self,
        parent_id: &str,
        video_id: &str,
        already_known: &HashSet<String>,
    ) -> Result<ReplyCompletion, CollectError> {
        let mut completion = ReplyCompletion::default();
        let mut cursor = None;

        completion.stopped = loop {
            let request = ReplyListRequest::new(parent_id, cursor.take());
            match self.fetch("replies", |api, key| api.list_replies(key, &request))? {
                Fetch::Done(response) => {
                    let (items, next) = response.into_page();
                    completion.replies.extend(
                        items
                            .iter()
                            .map(|item| extract_reply(item, video_id, parent_id))
                            .filter(|record| !already_known.contains(&record.comment_id)),
                    );
                    match next {
                        Some(token) => cursor = Some(token),
                        None => break None,
                    }
                }
                Fetch::NotFound => {
                    debug!(parent_id, "replies endpoint reported no replies");
                    break None;
                }
                Fetch::Stopped(reason) => break Some(reason),
            }
        };

        Ok(completion)
    }

    /// Collects up to `max_results` top-level comments without completing
    /// replies.
    pub fn get_video_comments(
        &mut self,
        video_id: &str,
        max_results: usize,
    ) -> Result<CommentCollection, CollectError> {
        info!(video_id, max_results, "collecting top-level comments");
        let mut collection = CommentCollection::new(video_id);
        let mut cursor = None;

        while collection.records.len() < max_results {
            let remaining = (max_results - collection.records.len()).min(u32::MAX as usize) as u32;
            let request = ThreadListRequest::new(video_id, cursor.take()).with_page_size(remaining);
            let response = match self.fetch("comment threads", |api, key| {
                api.list_comment_threads(key, &request)
            })? {
                Fetch::Done(response) => response,
                Fetch::NotFound => {
                    collection.status = CollectionStatus::Partial(StopReason::NotFound);
                    break;
                }
                Fetch::Stopped(reason) => {
                    collection.status = CollectionStatus::Partial(reason);
                    break;
                }
            };
            collection.pages += 1;

            let (items, next) = response.into_page();
            for thread in &items {
                if collection.records.len() >= max_results {
                    break;
                }
                if collection.admit(extract_thread(thread, video_id)) {
                    collection.threads += 1;
                }
            }
            match next {
                Some(token) => cursor = Some(token),
                None => break,
            }
        }

        info!(video_id, collected = collection.records.len(), "finished top-level collection");
        Ok(collection)
    }

    /// Looks up the `videos.list` entry for `video_id`. An empty listing is
    /// reported as [`Fetch::NotFound`].
    pub fn fetch_video_metadata(&mut self, video_id: &str) -> Result<Fetch<VideoItem>, CollectError> {
        let fetched = self.fetch("video metadata", |api, key| api.list_videos(key, video_id))?;
        Ok(match fetched {
            Fetch::Done(response) => match response.items.into_iter().next() {
                Some(item) => Fetch::Done(item),
                None => Fetch::NotFound,
            },
            Fetch::NotFound => Fetch::NotFound,
            Fetch::Stopped(reason) => Fetch::Stopped(reason),
        })
    }

    /// Looks up a channel by id or `@handle` through `channels.list`.
    pub fn fetch_channel_metadata(
        &mut self,
        channel: &str,
    ) -> Result<Fetch<ChannelItem>, CollectError> {
        let fetched = self.fetch("channel metadata", |api, key| api.list_channels(key, channel))?;
        Ok(match fetched {
            Fetch::Done(response) => match response.items.into_iter().next() {
                Some(item) => Fetch::Done(item),
                None => Fetch::NotFound,
            },
            Fetch::NotFound => Fetch::NotFound,
            Fetch::Stopped(reason) => Fetch::Stopped(reason),
        })
    }

    /// Issues one remote call under quota, rotation and retry rules.
    ///
    /// Transient failures are retried with linear backoff up to
    /// `max_retries` attempts. A quota-exceeded response rotates the key and
    /// repeats the same request without spending an attempt.
    fn fetch<T>(
        &mut self,
        what: &str,
        call: impl Fn(&A, &str) -> ApiResult<T>,
    ) -> Result<Fetch<T>, CollectError> {
        let mut attempt = 0u32;
        loop {
            if self.is_aborted() {
                info!("{what}: collection cancelled");
                return Ok(Fetch::Stopped(StopReason::Cancelled));
            }

            let key = self.quota.acquire(LIST_CALL_COST)?;
            match call(&self.api, &key) {
                Ok(value) => {
                    self.quota.charge(LIST_CALL_COST);
                    return Ok(Fetch::Done(value));
                }
                Err(ApiError::QuotaExceeded) => {
                    warn!(
                        usage = self.quota.usage(),
                        key_index = self.quota.active_index(),
                        "{what}: API reported quota exceeded"
                    );
                    self.quota.rotate_or_fail()?;
                }
                Err(ApiError::NotFound) => return Ok(Fetch::NotFound),
                Err(ApiError::Rejected { status, reason }) => {
                    error!(status, %reason, "{what}: request rejected");
                    return Ok(Fetch::Stopped(StopReason::Rejected { status, reason }));
                }
                Err(ApiError::Transient(message)) => {
                    attempt += 1;
                    if attempt >= self.max_retries {
                        error!(attempt, "{what}: giving up after retries: {message}");
                        return Ok(Fetch::Stopped(StopReason::RetriesExhausted {
                            attempts: attempt,
                            last_error: message,
                        }));
                    }
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        "{what}: retrying after error: {message}"
                    );
                    thread::sleep(self.retry_delay * attempt);
                }
            }
        }
    }

    fn log_summary(&self, collection: &CommentCollection) {
        let structure = analyze_comment_structure(&collection.records);
        info!(
            video_id = %collection.video_id,
            total = structure.total_comments,
            top_level = structure.top_level_comments,
            replies = structure.replies,
            threads_with_replies = structure.threads_with_replies,
            average_replies = structure.average_replies_per_thread,
            max_replies = structure.max_replies_per_thread,
            pages = collection.pages,
            quota_usage = self.quota.usage(),
            complete = collection.status.is_complete(),
            "comment collection finished"
        );
    }
}
