//! Telegram bot that mirrors media from Reddit posts into the chat.
//!
//! A link in a message is resolved, handed to an external downloader, and the files it
//! produces are re-uploaded in media groups that respect Telegram's size and count limits.

/// Telegram surface and per-message orchestration
pub mod bot;
/// Settings and allow-list
pub mod config;
/// External downloader invocation
pub mod downloader;
/// Link extraction and resolution
pub mod link;
/// Tracing setup
pub mod logging;
/// Classification, batching and upload of downloaded files
pub mod media;
