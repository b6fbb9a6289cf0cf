//! Persistence layer for collected videos and comments.
//!
//! Rows mirror [`ChannelMetadata`], [`VideoMetadata`] and [`CommentRecord`]
//! one column per field; tags are stored as JSON and every row carries the
//! time it was collected.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use libsql::{Builder, Connection, Row, params};

use crate::channel::ChannelMetadata;
use crate::extract::CommentRecord;
use crate::video::VideoMetadata;

async fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA foreign_keys=ON;
        "#,
    )
    .await?;
    Ok(())
}

async fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS channels (
            channel_id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            custom_url TEXT DEFAULT '',
            country TEXT DEFAULT '',
            description TEXT DEFAULT '',
            published_at TEXT,
            etag TEXT DEFAULT '',
            hidden_subscriber_count INTEGER NOT NULL DEFAULT 0,
            subscriber_count INTEGER NOT NULL DEFAULT 0,
            video_count INTEGER NOT NULL DEFAULT 0,
            view_count INTEGER NOT NULL DEFAULT 0,
            thumbnail_url TEXT DEFAULT '',
            collection_time TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS videos (
            video_id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            channel_title TEXT DEFAULT '',
            channel_id TEXT DEFAULT '',
            published_at TEXT,
            description TEXT DEFAULT '',
            tags_json TEXT DEFAULT '[]',
            category_id TEXT DEFAULT '',
            view_count INTEGER NOT NULL DEFAULT 0,
            like_count INTEGER NOT NULL DEFAULT 0,
            comment_count INTEGER NOT NULL DEFAULT 0,
            duration_iso TEXT DEFAULT '',
            duration_seconds INTEGER NOT NULL DEFAULT 0,
            duration_formatted TEXT DEFAULT '',
            definition TEXT DEFAULT '',
            caption INTEGER NOT NULL DEFAULT 0,
            thumbnail_url TEXT DEFAULT '',
            like_ratio REAL NOT NULL DEFAULT 0,
            engagement_rate REAL NOT NULL DEFAULT 0,
            collection_time TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS comments (
            comment_id TEXT PRIMARY KEY,
            video_id TEXT NOT NULL,
            author TEXT DEFAULT '',
            author_channel_id TEXT DEFAULT '',
            comment_text TEXT DEFAULT '',
            text_original TEXT DEFAULT '',
            like_count INTEGER NOT NULL DEFAULT 0,
            published_at TEXT,
            updated_at TEXT,
            reply_count INTEGER NOT NULL DEFAULT 0,
            is_reply INTEGER NOT NULL DEFAULT 0,
            parent_id TEXT DEFAULT '',
            reply_depth INTEGER NOT NULL DEFAULT 0,
            collection_time TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_video_id ON comments(video_id);
        CREATE INDEX IF NOT EXISTS idx_comments_parent_id ON comments(parent_id);
        CREATE INDEX IF NOT EXISTS idx_comments_published_at ON comments(published_at);
        CREATE INDEX IF NOT EXISTS idx_videos_channel_id ON videos(channel_id);
        "#,
    )
    .await?;
    Ok(())
}

fn collection_time() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// SQLite stores signed integers; counts beyond `i64::MAX` saturate.
fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Wrapper around the SQLite-compatible connection that performs read/write operations.
#[derive(Debug)]
pub struct MetadataStore {
    conn: Connection,
}

impl MetadataStore {
    /// Opens (and if necessary creates) the SQLite DB and ensures the expected
    /// schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .with_context(|| format!("opening database {}", path.display()))?;

        let conn = db.connect()?;
        configure_connection(&conn).await?;
        ensure_schema(&conn).await?;
        Ok(Self { conn })
    }

    /// Inserts or refreshes a channel row, stamping the collection time.
    pub async fn upsert_channel(&self, channel: &ChannelMetadata) -> Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO channels (
                    channel_id, title, custom_url, country, description, published_at,
                    etag, hidden_subscriber_count, subscriber_count, video_count,
                    view_count, thumbnail_url, collection_time
                ) VALUES (
                    :channel_id, :title, :custom_url, :country, :description, :published_at,
                    :etag, :hidden_subscriber_count, :subscriber_count, :video_count,
                    :view_count, :thumbnail_url, :collection_time
                )
                ON CONFLICT(channel_id) DO UPDATE SET
                    title = excluded.title,
                    custom_url = excluded.custom_url,
                    country = excluded.country,
                    description = excluded.description,
                    published_at = excluded.published_at,
                    etag = excluded.etag,
                    hidden_subscriber_count = excluded.hidden_subscriber_count,
                    subscriber_count = excluded.subscriber_count,
                    video_count = excluded.video_count,
                    view_count = excluded.view_count,
                    thumbnail_url = excluded.thumbnail_url,
                    collection_time = excluded.collection_time
                "#,
                params![
                    channel.channel_id.as_str(),
                    channel.title.as_str(),
                    channel.custom_url.as_str(),
                    channel.country.as_str(),
                    channel.description.as_str(),
                    channel.published_at.as_str(),
                    channel.etag.as_str(),
                    channel.hidden_subscriber_count as i64,
                    to_sql_int(channel.subscriber_count),
                    to_sql_int(channel.video_count),
                    to_sql_int(channel.view_count),
                    channel.thumbnail_url.as_str(),
                    collection_time(),
                ],
            )
            .await
            .with_context(|| format!("storing channel {}", channel.channel_id))?;

        Ok(())
    }

    pub async fn get_channel(&self, channel_id: &str) -> Result<Option<ChannelMetadata>> {
        let stmt = self
            .conn
            .prepare(
                r#"
                SELECT channel_id, title, custom_url, country, description, published_at,
                       etag, hidden_subscriber_count, subscriber_count, video_count,
                       view_count, thumbnail_url
                FROM channels
                WHERE channel_id = ?1
                "#,
            )
            .await?;

        let mut rows = stmt.query([channel_id]).await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(row_to_channel(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Inserts or refreshes a video row, stamping the collection time.
    pub async fn upsert_video(&self, video: &VideoMetadata) -> Result<()> {
        let tags_json = serde_json::to_string(&video.tags).context("serializing tags")?;

        self.conn
            .execute(
                r#"
                INSERT INTO videos (
                    video_id, title, channel_title, channel_id, published_at,
                    description, tags_json, category_id, view_count, like_count,
                    comment_count, duration_iso, duration_seconds, duration_formatted,
                    definition, caption, thumbnail_url, like_ratio, engagement_rate,
                    collection_time
                ) VALUES (
                    :video_id, :title, :channel_title, :channel_id, :published_at,
                    :description, :tags_json, :category_id, :view_count, :like_count,
                    :comment_count, :duration_iso, :duration_seconds, :duration_formatted,
                    :definition, :caption, :thumbnail_url, :like_ratio, :engagement_rate,
                    :collection_time
                )
                ON CONFLICT(video_id) DO UPDATE SET
                    title = excluded.title,
                    channel_title = excluded.channel_title,
                    channel_id = excluded.channel_id,
                    published_at = excluded.published_at,
                    description = excluded.description,
                    tags_json = excluded.tags_json,
                    category_id = excluded.category_id,
                    view_count = excluded.view_count,
                    like_count = excluded.like_count,
                    comment_count = excluded.comment_count,
                    duration_iso = excluded.duration_iso,
                    duration_seconds = excluded.duration_seconds,
                    duration_formatted = excluded.duration_formatted,
                    definition = excluded.definition,
                    caption = excluded.caption,
                    thumbnail_url = excluded.thumbnail_url,
                    like_ratio = excluded.like_ratio,
                    engagement_rate = excluded.engagement_rate,
                    collection_time = excluded.collection_time
                "#,
                params![
                    video.video_id.as_str(),
                    video.title.as_str(),
                    video.channel_title.as_str(),
                    video.channel_id.as_str(),
                    video.published_at.as_str(),
                    video.description.as_str(),
                    tags_json,
                    video.category_id.as_str(),
                    to_sql_int(video.view_count),
                    to_sql_int(video.like_count),
                    to_sql_int(video.comment_count),
                    video.duration_iso.as_str(),
                    to_sql_int(video.duration_seconds),
                    video.duration_formatted.as_str(),
                    video.definition.as_str(),
                    video.caption as i64,
                    video.thumbnail_url.as_str(),
                    video.like_ratio,
                    video.engagement_rate,
                    collection_time(),
                ],
            )
            .await
            .with_context(|| format!("storing video {}", video.video_id))?;

        Ok(())
    }

    /// Writes every record in one transaction. Existing rows are updated in
    /// place so repeated runs refresh like counts and edits.
    pub async fn upsert_comments(&self, comments: &[CommentRecord]) -> Result<usize> {
        let collected_at = collection_time();
        let tx = self.conn.transaction().await?;

        for comment in comments {
            tx.execute(
                r#"
                INSERT INTO comments (
                    comment_id, video_id, author, author_channel_id, comment_text,
                    text_original, like_count, published_at, updated_at, reply_count,
                    is_reply, parent_id, reply_depth, collection_time
                ) VALUES (
                    :comment_id, :video_id, :author, :author_channel_id, :comment_text,
                    :text_original, :like_count, :published_at, :updated_at, :reply_count,
                    :is_reply, :parent_id, :reply_depth, :collection_time
                )
                ON CONFLICT(comment_id) DO UPDATE SET
                    video_id = excluded.video_id,
                    author = excluded.author,
                    author_channel_id = excluded.author_channel_id,
                    comment_text = excluded.comment_text,
                    text_original = excluded.text_original,
                    like_count = excluded.like_count,
                    published_at = excluded.published_at,
                    updated_at = excluded.updated_at,
                    reply_count = excluded.reply_count,
                    is_reply = excluded.is_reply,
                    parent_id = excluded.parent_id,
                    reply_depth = excluded.reply_depth,
                    collection_time = excluded.collection_time
                "#,
                params![
                    comment.comment_id.as_str(),
                    comment.video_id.as_str(),
                    comment.author.as_str(),
                    comment.author_channel_id.as_str(),
                    comment.comment_text.as_str(),
                    comment.text_original.as_str(),
                    to_sql_int(comment.like_count),
                    comment.published_at.as_str(),
                    comment.updated_at.as_str(),
                    to_sql_int(comment.reply_count),
                    comment.is_reply as i64,
                    comment.parent_id.as_str(),
                    i64::from(comment.reply_depth),
                    collected_at.as_str(),
                ],
            )
            .await
            .with_context(|| format!("storing comment {}", comment.comment_id))?;
        }

        tx.commit().await?;
        Ok(comments.len())
    }

    pub async fn get_video(&self, video_id: &str) -> Result<Option<VideoMetadata>> {
        let stmt = self
            .conn
            .prepare(
                r#"
                SELECT video_id, title, channel_title, channel_id, published_at,
                       description, tags_json, category_id, view_count, like_count,
                       comment_count, duration_iso, duration_seconds, duration_formatted,
                       definition, caption, thumbnail_url, like_ratio, engagement_rate
                FROM videos
                WHERE video_id = ?1
                "#,
            )
            .await?;

        let mut rows = stmt.query([video_id]).await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(row_to_video(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Comments for one video, oldest first.
    pub async fn get_comments(&self, video_id: &str) -> Result<Vec<CommentRecord>> {
        let stmt = self
            .conn
            .prepare(
                r#"
                SELECT comment_id, video_id, author, author_channel_id, comment_text,
                       text_original, like_count, published_at, updated_at, reply_count,
                       is_reply, parent_id, reply_depth
                FROM comments
                WHERE video_id = ?1
                ORDER BY datetime(published_at) IS NULL, datetime(published_at) ASC, rowid ASC
                "#,
            )
            .await?;

        let mut comments = Vec::new();
        let mut rows = stmt.query([video_id]).await?;
        while let Some(row) = rows.next().await? {
            comments.push(row_to_comment(&row)?);
        }
        Ok(comments)
    }

    pub async fn comment_count(&self, video_id: &str) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM comments WHERE video_id = ?1", [video_id])
            .await?;
        let row = rows.next().await?.context("missing count row")?;
        Ok(from_sql_int(row.get(0)?))
    }

    /// Distinct channels owning the stored videos.
    pub async fn unique_channel_ids(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                r#"
                SELECT DISTINCT channel_id
                FROM videos
                WHERE channel_id IS NOT NULL AND channel_id != ''
                ORDER BY channel_id
                "#,
                params![],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }
}

fn row_to_channel(row: &Row) -> Result<ChannelMetadata> {
    Ok(ChannelMetadata {
        channel_id: row.get(0)?,
        title: row.get(1)?,
        custom_url: row.get(2)?,
        country: row.get(3)?,
        description: row.get(4)?,
        published_at: row.get(5)?,
        etag: row.get(6)?,
        hidden_subscriber_count: row.get::<i64>(7)? != 0,
        subscriber_count: from_sql_int(row.get(8)?),
        video_count: from_sql_int(row.get(9)?),
        view_count: from_sql_int(row.get(10)?),
        thumbnail_url: row.get(11)?,
    })
}

/// Converts a SQL row into a `VideoMetadata`, decoding the JSON tag list.
fn row_to_video(row: &Row) -> Result<VideoMetadata> {
    // Column order must match the SELECT in get_video.
    let tags_json: String = row.get(6)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).context("parsing stored tags JSON")?;

    Ok(VideoMetadata {
        video_id: row.get(0)?,
        title: row.get(1)?,
        channel_title: row.get(2)?,
        channel_id: row.get(3)?,
        published_at: row.get(4)?,
        description: row.get(5)?,
        tags,
        category_id: row.get(7)?,
        view_count: from_sql_int(row.get(8)?),
        like_count: from_sql_int(row.get(9)?),
        comment_count: from_sql_int(row.get(10)?),
        duration_iso: row.get(11)?,
        duration_seconds: from_sql_int(row.get(12)?),
        duration_formatted: row.get(13)?,
        definition: row.get(14)?,
        caption: row.get::<i64>(15)? != 0,
        thumbnail_url: row.get(16)?,
        like_ratio: row.get(17)?,
        engagement_rate: row.get(18)?,
    })
}

/// Converts a SQL row into a `CommentRecord` while normalizing the boolean flag
/// stored as an INTEGER in SQLite.
fn row_to_comment(row: &Row) -> Result<CommentRecord> {
    Ok(CommentRecord {
        comment_id: row.get(0)?,
        video_id: row.get(1)?,
        author: row.get(2)?,
        author_channel_id: row.get(3)?,
        comment_text: row.get(4)?,
        text_original: row.get(5)?,
        like_count: from_sql_int(row.get(6)?),
        published_at: row.get(7)?,
        updated_at: row.get(8)?,
        reply_count: from_sql_int(row.get(9)?),
        is_reply: row.get::<i64>(10).map(|value| value != 0)?,
        parent_id: row.get(11)?,
        reply_depth: u8::try_from(row.get::<i64>(12)?).unwrap_or(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn sample_video(id: &str, channel: &str) -> VideoMetadata {
        VideoMetadata {
            video_id: id.to_owned(),
            title: format!("Video {id}"),
            channel_title: "Channel".into(),
            channel_id: channel.into(),
            published_at: "2024-01-01T00:00:00Z".into(),
            description: "desc".into(),
            tags: vec!["tech".into()],
            category_id: "28".into(),
            view_count: 1_000,
            like_count: 40,
            comment_count: 5,
            duration_iso: "PT2M".into(),
            duration_seconds: 120,
            duration_formatted: "2:00".into(),
            definition: "hd".into(),
            caption: true,
            thumbnail_url: crate::video::thumbnail_url(id),
            like_ratio: 4.0,
            engagement_rate: 4.5,
        }
    }

    /// Helper that produces deterministic comment rows; individual tests can
    /// tweak timestamps or threading without redefining the entire struct.
    fn sample_comment(id: &str, video_id: &str, published_at: &str) -> CommentRecord {
        CommentRecord {
            comment_id: id.into(),
            video_id: video_id.into(),
            author: format!("author-{id}"),
            author_channel_id: format!("UC-{id}"),
            comment_text: format!("<b>text-{id}</b>"),
            text_original: format!("text-{id}"),
            like_count: 1,
            published_at: published_at.into(),
            updated_at: published_at.into(),
            reply_count: 0,
            is_reply: false,
            parent_id: String::new(),
            reply_depth: 0,
        }
    }

    async fn create_store() -> Result<(tempfile::TempDir, MetadataStore, PathBuf)> {
        let dir = tempdir()?;
        let path = dir.path().join("data/test.db");
        let store = MetadataStore::open(&path).await?;
        Ok((dir, store, path))
    }

    /// Opening a store creates the file, turns on WAL and provisions every
    /// table and index the collector relies on.
    #[tokio::test]
    async fn opens_store_and_creates_schema() -> Result<()> {
        let (_temp, store, path) = create_store().await?;
        assert!(path.exists(), "database file should be created");

        let conn = &store.conn;
        let mut rows = conn.query("PRAGMA journal_mode", params![]).await?;
        let journal_row = rows.next().await?.context("missing journal_mode row")?;
        let journal: String = journal_row.get(0)?;
        assert_eq!(journal.to_lowercase(), "wal");

        let mut rows = conn.query("PRAGMA foreign_keys", params![]).await?;
        let row = rows.next().await?.context("missing foreign_keys row")?;
        let flag: i64 = row.get(0)?;
        assert_eq!(flag, 1);

        for (kind, name) in [
            ("table", "channels"),
            ("table", "videos"),
            ("table", "comments"),
            ("index", "idx_comments_video_id"),
            ("index", "idx_comments_parent_id"),
            ("index", "idx_comments_published_at"),
            ("index", "idx_videos_channel_id"),
        ] {
            let mut rows = conn
                .query(
                    "SELECT name FROM sqlite_master WHERE type=?1 AND name=?2",
                    [kind, name],
                )
                .await?;
            let exists: Option<String> = rows
                .next()
                .await?
                .map(|row| row.get::<String>(0))
                .transpose()?;
            assert_eq!(exists.as_deref(), Some(name));
        }
        Ok(())
    }

    #[tokio::test]
    async fn reopening_keeps_existing_rows() -> Result<()> {
        let (_temp, store, path) = create_store().await?;
        store.upsert_video(&sample_video("alpha", "UC1")).await?;
        drop(store);

        let reopened = MetadataStore::open(&path).await?;
        assert!(reopened.get_video("alpha").await?.is_some());
        Ok(())
    }

    /// Insert then update: JSON tags survive and ON CONFLICT rewrites fields.
    #[tokio::test]
    async fn upsert_video_roundtrip() -> Result<()> {
        let (_temp, store, _path) = create_store().await?;

        let mut video = sample_video("alpha", "UC1");
        store.upsert_video(&video).await?;
        let fetched = store.get_video("alpha").await?.expect("video fetched");
        assert_eq!(fetched, video);

        video.title = "Updated".into();
        video.tags.push("review".into());
        video.view_count = 2_000;
        store.upsert_video(&video).await?;
        let updated = store
            .get_video("alpha")
            .await?
            .expect("video fetched after update");
        assert_eq!(updated.title, "Updated");
        assert_eq!(updated.tags, vec!["tech".to_string(), "review".to_string()]);
        assert_eq!(updated.view_count, 2_000);
        Ok(())
    }

    #[tokio::test]
    async fn upsert_channel_roundtrip() -> Result<()> {
        let (_temp, store, _path) = create_store().await?;
        assert!(store.get_channel("UC1").await?.is_none());

        let mut channel = ChannelMetadata {
            channel_id: "UC1".into(),
            title: "Channel".into(),
            custom_url: "@channel".into(),
            country: "KR".into(),
            description: "about".into(),
            published_at: "2015-03-01T00:00:00Z".into(),
            etag: "etag-1".into(),
            hidden_subscriber_count: false,
            subscriber_count: 120,
            video_count: 42,
            view_count: 9_000,
            thumbnail_url: "https://yt3/high.jpg".into(),
        };
        store.upsert_channel(&channel).await?;
        assert_eq!(store.get_channel("UC1").await?, Some(channel.clone()));

        channel.subscriber_count = 150;
        channel.hidden_subscriber_count = true;
        store.upsert_channel(&channel).await?;
        let updated = store
            .get_channel("UC1")
            .await?
            .expect("channel fetched after update");
        assert_eq!(updated.subscriber_count, 150);
        assert!(updated.hidden_subscriber_count);
        Ok(())
    }

    #[tokio::test]
    async fn missing_video_is_none() -> Result<()> {
        let (_temp, store, _path) = create_store().await?;
        assert!(store.get_video("ghost").await?.is_none());
        assert_eq!(store.comment_count("ghost").await?, 0);
        assert!(store.get_comments("ghost").await?.is_empty());
        Ok(())
    }

    /// Replies keep their thread linkage and flags; rows come back in
    /// publish order regardless of insert order.
    #[tokio::test]
    async fn comments_roundtrip_in_publish_order() -> Result<()> {
        let (_temp, store, _path) = create_store().await?;

        let mut parent = sample_comment("parent", "vid", "2024-01-01T00:00:00Z");
        parent.reply_count = 1;
        let mut reply = sample_comment("child", "vid", "2024-01-01T00:05:00Z");
        reply.is_reply = true;
        reply.parent_id = "parent".into();
        reply.reply_depth = 1;
        let late = sample_comment("late", "vid", "2024-02-01T00:00:00Z");

        let written = store
            .upsert_comments(&[late.clone(), reply.clone(), parent.clone()])
            .await?;
        assert_eq!(written, 3);

        let comments = store.get_comments("vid").await?;
        assert_eq!(comments, vec![parent, reply, late]);
        Ok(())
    }

    /// Re-running a collection refreshes rows rather than duplicating them.
    #[tokio::test]
    async fn upsert_comments_updates_existing_rows() -> Result<()> {
        let (_temp, store, _path) = create_store().await?;

        let mut comment = sample_comment("1", "vid", "2024-01-01T00:00:00Z");
        store.upsert_comments(std::slice::from_ref(&comment)).await?;

        comment.like_count = 99;
        comment.text_original = "edited".into();
        let other = sample_comment("2", "vid", "2024-01-02T00:00:00Z");
        store.upsert_comments(&[comment, other]).await?;

        assert_eq!(store.comment_count("vid").await?, 2);
        let comments = store.get_comments("vid").await?;
        assert_eq!(comments[0].like_count, 99);
        assert_eq!(comments[0].text_original, "edited");
        Ok(())
    }

    #[tokio::test]
    async fn counts_are_scoped_per_video() -> Result<()> {
        let (_temp, store, _path) = create_store().await?;
        store
            .upsert_comments(&[
                sample_comment("a", "one", "2024-01-01T00:00:00Z"),
                sample_comment("b", "one", "2024-01-01T00:01:00Z"),
                sample_comment("c", "two", "2024-01-01T00:02:00Z"),
            ])
            .await?;
        assert_eq!(store.comment_count("one").await?, 2);
        assert_eq!(store.comment_count("two").await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn unique_channel_ids_skips_blanks_and_duplicates() -> Result<()> {
        let (_temp, store, _path) = create_store().await?;
        store.upsert_video(&sample_video("a", "UC2")).await?;
        store.upsert_video(&sample_video("b", "UC1")).await?;
        store.upsert_video(&sample_video("c", "UC2")).await?;
        store.upsert_video(&sample_video("d", "")).await?;

        assert_eq!(store.unique_channel_ids().await?, vec!["UC1", "UC2"]);
        Ok(())
    }
}
