#![forbid(unsafe_code)]

//! Error types shared by the API boundary and the collector.

/// Outcome of one failed remote call, already classified so callers can
/// pattern-match instead of inspecting raw HTTP errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("quota exceeded for the active API key")]
    QuotaExceeded,

    #[error("resource not found")]
    NotFound,

    #[error("request rejected with status {status}: {reason}")]
    Rejected { status: u16, reason: String },

    #[error("transient failure: {0}")]
    Transient(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors that end a whole collection call. Everything else is reported as a
/// partial result.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error(
        "every configured API key is out of quota (last key index {index}, usage {usage}/{limit})"
    )]
    QuotaExhausted { index: usize, usage: u64, limit: u64 },

    #[error("no API key configured under {0}")]
    MissingCredential(String),

    #[error("not a YouTube video URL or id: {0}")]
    InvalidVideoRef(String),

    #[error("video {0} was not returned by the API")]
    MetadataMissing(String),

    #[error("channel {0} was not returned by the API")]
    ChannelMissing(String),
}
