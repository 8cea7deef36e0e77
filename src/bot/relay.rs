//! Per-message orchestration: authorize, find link, download, classify, upload, clean up.

use crate::bot::gateway::ChatGateway;
use crate::bot::unauthorized_cache::UnauthorizedCache;
use crate::config::{AllowList, MAX_UPLOAD_SIZE_BYTES};
use crate::downloader::{DownloadError, MediaDownloader};
use crate::link::{extract_link, LinkResolver};
use crate::media::{classify_directory, BatchUploader, ClassifiedMedia, UploadPlan, UploadReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use teloxide::types::{ChatId, MessageId};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Reply to users outside the allow-list
pub const NOT_AUTHORIZED_TEXT: &str = "You are not authorized to use this bot.";
/// Reply when a message carries no Reddit post link
pub const NO_LINK_TEXT: &str = "Please send a valid Reddit post link.";
/// Transient status while the downloader runs
pub const DOWNLOADING_TEXT: &str = "Downloading media...";
/// Transient status while uploading
pub const UPLOADING_TEXT: &str = "Uploading media...";
/// Reply when the download step fails
pub const DOWNLOAD_FAILED_TEXT: &str = "Error downloading media.";
/// Final reply after delivery
pub const MEDIA_SENT_TEXT: &str = "Media sent!";

/// Why a message did not lead to an upload
#[derive(Debug, Error)]
pub enum RelayError {
    /// Sender is not on the allow-list
    #[error("user {0} is not authorized")]
    Unauthorized(i64),
    /// Message text has no Reddit post link
    #[error("no Reddit post link found")]
    NoLinkFound,
    /// External downloader failed
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),
    /// Scratch directory could not be read back
    #[error("failed to read downloaded files: {0}")]
    Scratch(#[source] std::io::Error),
}

/// The parts of an incoming chat message the relay looks at
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Chat the message arrived in
    pub chat_id: ChatId,
    /// Id of the message itself
    pub message_id: MessageId,
    /// Sender's user id
    pub user_id: i64,
    /// Message text
    pub text: String,
}

/// What a successful run delivered
#[derive(Debug, Clone)]
pub struct RelaySummary {
    /// Link passed to the downloader
    pub link: String,
    /// Per-send upload results
    pub report: UploadReport,
    /// Files left out for exceeding the size ceiling
    pub skipped_oversized: usize,
}

/// Handles link messages end to end
pub struct MessageRelay {
    allow_list: Arc<AllowList>,
    denials: Arc<UnauthorizedCache>,
    resolver: Arc<dyn LinkResolver>,
    downloader: Arc<dyn MediaDownloader>,
    scratch_root: PathBuf,
    max_file_size: u64,
}

impl MessageRelay {
    /// Build a relay; scratch directories are created under `scratch_root`
    #[must_use]
    pub fn new(
        allow_list: Arc<AllowList>,
        denials: Arc<UnauthorizedCache>,
        resolver: Arc<dyn LinkResolver>,
        downloader: Arc<dyn MediaDownloader>,
        scratch_root: PathBuf,
    ) -> Self {
        Self {
            allow_list,
            denials,
            resolver,
            downloader,
            scratch_root,
            max_file_size: MAX_UPLOAD_SIZE_BYTES,
        }
    }

    /// Override the per-file size ceiling
    #[must_use]
    pub const fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Run the whole flow for one message, posting status texts through `chat`.
    ///
    /// # Errors
    ///
    /// Returns the gate that stopped the flow. The user has already been told.
    #[instrument(skip_all, fields(chat_id = msg.chat_id.0, user_id = msg.user_id))]
    pub async fn handle<G>(&self, chat: &G, msg: &IncomingMessage) -> Result<RelaySummary, RelayError>
    where
        G: ChatGateway + ?Sized,
    {
        if !self.allow_list.contains(msg.user_id) {
            if self.denials.should_send(msg.user_id).await {
                info!("Unauthorized access, sending denial");
                if notify(chat, msg.chat_id, NOT_AUTHORIZED_TEXT).await.is_some() {
                    self.denials.mark_sent(msg.user_id).await;
                }
            }
            return Err(RelayError::Unauthorized(msg.user_id));
        }

        info!(text = %msg.text, "Received message");

        let Some(link) = extract_link(&msg.text) else {
            delete(chat, msg.chat_id, msg.message_id).await;
            notify(chat, msg.chat_id, NO_LINK_TEXT).await;
            return Err(RelayError::NoLinkFound);
        };

        let link = self.resolver.resolve(link).await;
        let scratch = self.scratch_dir(msg);

        let downloading = notify(chat, msg.chat_id, DOWNLOADING_TEXT).await;
        if let Err(e) = self.downloader.download(&link, &scratch).await {
            warn!(link = %link, error = %e, "Download failed");
            delete_opt(chat, msg.chat_id, downloading).await;
            notify(chat, msg.chat_id, DOWNLOAD_FAILED_TEXT).await;
            remove_scratch(&scratch).await;
            return Err(e.into());
        }
        delete_opt(chat, msg.chat_id, downloading).await;

        let uploading = notify(chat, msg.chat_id, UPLOADING_TEXT).await;
        let media = match classify(scratch.clone(), self.max_file_size).await {
            Ok(media) => media,
            Err(e) => {
                warn!(dir = %scratch.display(), error = %e, "Failed to classify downloads");
                delete_opt(chat, msg.chat_id, uploading).await;
                notify(chat, msg.chat_id, DOWNLOAD_FAILED_TEXT).await;
                remove_scratch(&scratch).await;
                return Err(RelayError::Scratch(e));
            }
        };

        let skipped_oversized = media.oversized.len();
        for file in &media.oversized {
            info!(path = %file.path.display(), size = file.size, "Skipping oversized file");
        }

        let plan = UploadPlan::from(media);
        let report = BatchUploader::new(chat, msg.chat_id).upload(&plan).await;

        remove_scratch(&scratch).await;

        delete_opt(chat, msg.chat_id, uploading).await;
        delete(chat, msg.chat_id, msg.message_id).await;
        notify(chat, msg.chat_id, &completion_text(skipped_oversized)).await;

        info!(link = %link, delivered = report.delivered_files, "Completed processing");
        Ok(RelaySummary {
            link,
            report,
            skipped_oversized,
        })
    }

    fn scratch_dir(&self, msg: &IncomingMessage) -> PathBuf {
        self.scratch_root.join(format!(
            "{}-{}-{}",
            msg.chat_id.0,
            msg.message_id.0,
            Uuid::new_v4().simple()
        ))
    }
}

/// Final status text, noting files dropped for size
#[must_use]
pub fn completion_text(skipped_oversized: usize) -> String {
    match skipped_oversized {
        0 => MEDIA_SENT_TEXT.to_string(),
        1 => format!("{MEDIA_SENT_TEXT} (1 file skipped: larger than 50 MB)"),
        n => format!("{MEDIA_SENT_TEXT} ({n} files skipped: larger than 50 MB)"),
    }
}

async fn classify(dir: PathBuf, max_size: u64) -> std::io::Result<ClassifiedMedia> {
    tokio::task::spawn_blocking(move || classify_directory(&dir, max_size))
        .await
        .map_err(std::io::Error::other)?
}

async fn notify<G: ChatGateway + ?Sized>(chat: &G, chat_id: ChatId, text: &str) -> Option<MessageId> {
    match chat.send_text(chat_id, text).await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(error = %e, text, "Failed to send status message");
            None
        }
    }
}

async fn delete<G: ChatGateway + ?Sized>(chat: &G, chat_id: ChatId, message_id: MessageId) {
    if let Err(e) = chat.delete_message(chat_id, message_id).await {
        warn!(error = %e, message_id = message_id.0, "Failed to delete message");
    }
}

async fn delete_opt<G: ChatGateway + ?Sized>(chat: &G, chat_id: ChatId, message_id: Option<MessageId>) {
    if let Some(id) = message_id {
        delete(chat, chat_id, id).await;
    }
}

async fn remove_scratch(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(dir = %dir.display(), error = %e, "Failed to remove scratch directory"),
    }
}
