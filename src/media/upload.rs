//! Batch uploader with rate-limit retry.
//!
//! Every planned send is retried for as long as the chat provider answers with a
//! rate-limit signal, waiting exactly the advertised duration between attempts. The wait
//! suspends only the current request's task. Any other provider error drops that send
//! and the upload moves on to the next one.

use super::batch::{MediaBatch, PlannedSend, UploadPlan};
use super::classify::ClassifiedFile;
use async_trait::async_trait;
use std::time::Duration;
use teloxide::types::ChatId;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors reported by the chat provider for a single call
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Flood control: the call must be repeated after `retry_after`
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Wait requested by the provider
        retry_after: Duration,
    },
    /// Connection-level failure; the same call may succeed on a later attempt
    #[error("network error: {0}")]
    Network(String),
    /// Any other provider failure, such as an API rejection
    #[error("provider error: {0}")]
    Provider(String),
}

/// Destination for media uploads
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Send one media group
    async fn send_media_group(&self, chat_id: ChatId, batch: &MediaBatch)
        -> Result<(), SendError>;

    /// Send a single animation
    async fn send_animation(&self, chat_id: ChatId, file: &ClassifiedFile)
        -> Result<(), SendError>;
}

/// Result of one planned send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Delivered on the first attempt
    Sent,
    /// Delivered after waiting out one or more rate-limit signals
    RateLimitedThenSent {
        /// Number of rate-limit waits before delivery
        retries: u32,
    },
    /// Abandoned after a non rate-limit error
    PermanentlyFailed,
}

/// Summary of a whole upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Outcome per planned send, in plan order
    pub outcomes: Vec<UploadOutcome>,
    /// Files carried by delivered sends
    pub delivered_files: usize,
    /// Files carried by abandoned sends
    pub failed_files: usize,
}

impl UploadReport {
    fn record(&mut self, outcome: UploadOutcome, files: usize) {
        match outcome {
            UploadOutcome::PermanentlyFailed => self.failed_files += files,
            UploadOutcome::Sent | UploadOutcome::RateLimitedThenSent { .. } => {
                self.delivered_files += files;
            }
        }
        self.outcomes.push(outcome);
    }

    /// Number of abandoned sends
    #[must_use]
    pub fn failed_sends(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, UploadOutcome::PermanentlyFailed))
            .count()
    }

    /// Number of sends that hit flood control at least once
    #[must_use]
    pub fn rate_limited_sends(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, UploadOutcome::RateLimitedThenSent { .. }))
            .count()
    }
}

/// Sends an [`UploadPlan`] through a [`MediaSink`]
pub struct BatchUploader<'a, S: MediaSink + ?Sized> {
    sink: &'a S,
    chat_id: ChatId,
}

impl<'a, S: MediaSink + ?Sized> BatchUploader<'a, S> {
    /// Upload into `chat_id` through `sink`
    #[must_use]
    pub const fn new(sink: &'a S, chat_id: ChatId) -> Self {
        Self { sink, chat_id }
    }

    /// Send every planned item strictly in order, each fully settled before the next.
    pub async fn upload(&self, plan: &UploadPlan) -> UploadReport {
        let mut report = UploadReport::default();

        for (index, send) in plan.sends().iter().enumerate() {
            let outcome = self.send_until_settled(send).await;
            debug!(
                index,
                kind = send.kind().as_str(),
                files = send.file_count(),
                ?outcome,
                "Send settled"
            );
            report.record(outcome, send.file_count());
        }

        info!(
            chat_id = self.chat_id.0,
            sends = report.outcomes.len(),
            delivered = report.delivered_files,
            failed = report.failed_files,
            "Upload finished"
        );
        report
    }

    async fn send_until_settled(&self, send: &PlannedSend) -> UploadOutcome {
        let mut retries = 0_u32;
        loop {
            let result = match send {
                PlannedSend::Group(batch) => self.sink.send_media_group(self.chat_id, batch).await,
                PlannedSend::Animation(file) => self.sink.send_animation(self.chat_id, file).await,
            };

            match result {
                Ok(()) if retries == 0 => return UploadOutcome::Sent,
                Ok(()) => return UploadOutcome::RateLimitedThenSent { retries },
                Err(SendError::RateLimited { retry_after }) => {
                    retries = retries.saturating_add(1);
                    warn!(
                        chat_id = self.chat_id.0,
                        retry_after_secs = retry_after.as_secs_f64(),
                        attempt = retries,
                        "Flood control exceeded, waiting before retry"
                    );
                    tokio::time::sleep(retry_after).await;
                }
                Err(error @ (SendError::Network(_) | SendError::Provider(_))) => {
                    warn!(
                        chat_id = self.chat_id.0,
                        kind = send.kind().as_str(),
                        error = %error,
                        "Send failed, skipping"
                    );
                    return UploadOutcome::PermanentlyFailed;
                }
            }
        }
    }
}
