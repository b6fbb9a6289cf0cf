#![forbid(unsafe_code)]

//! Quota-aware YouTube comment collection.
//!
//! The crate walks every comment thread of a video, completes truncated reply
//! lists through the replies endpoint, and keeps a per-credential quota ledger
//! that rotates API keys when the daily budget runs out.

pub mod analysis;
pub mod api;
pub mod channel;
pub mod collector;
pub mod config;
pub mod error;
pub mod extract;
pub mod metadata;
pub mod quota;
pub mod video;
pub mod workflow;
