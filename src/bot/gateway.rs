//! Chat operations used by the relay, and their Telegram implementation.

use crate::bot::resilient::{retry_telegram_operation, RetryDecision};
use crate::media::{ClassifiedFile, MediaBatch, MediaKind, MediaSink, SendError};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InputFile, InputMedia, InputMediaDocument, InputMediaPhoto, InputMediaVideo,
    MessageId,
};
use teloxide::RequestError;

/// Everything the relay needs from the chat platform
#[async_trait]
pub trait ChatGateway: MediaSink {
    /// Post a plain text message and return its id
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId, SendError>;

    /// Delete a message
    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId)
        -> Result<(), SendError>;
}

impl From<RequestError> for SendError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::RetryAfter(secs) => Self::RateLimited {
                retry_after: secs.duration(),
            },
            e @ (RequestError::Network(_) | RequestError::Io(_)) => Self::Network(e.to_string()),
            other => Self::Provider(other.to_string()),
        }
    }
}

/// Retry policy for text and delete calls: wait out flood control, back off on
/// network trouble, stop at once on API rejections.
#[must_use]
pub const fn retry_decision(error: &SendError) -> RetryDecision {
    match error {
        SendError::RateLimited { retry_after } => RetryDecision::After(*retry_after),
        SendError::Network(_) => RetryDecision::Backoff,
        SendError::Provider(_) => RetryDecision::GiveUp,
    }
}

/// [`ChatGateway`] over a teloxide [`Bot`]
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    /// Wrap a bot
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn input_media(file: &ClassifiedFile) -> InputMedia {
    let input = InputFile::file(file.path.clone());
    match file.kind {
        MediaKind::Image => InputMedia::Photo(InputMediaPhoto::new(input)),
        MediaKind::Video => InputMedia::Video(InputMediaVideo::new(input)),
        MediaKind::Document | MediaKind::Animation => {
            InputMedia::Document(InputMediaDocument::new(input))
        }
    }
}

#[async_trait]
impl MediaSink for TelegramGateway {
    async fn send_media_group(
        &self,
        chat_id: ChatId,
        batch: &MediaBatch,
    ) -> Result<(), SendError> {
        let media: Vec<InputMedia> = batch.files().iter().map(input_media).collect();
        self.bot.send_media_group(chat_id, media).await?;
        Ok(())
    }

    async fn send_animation(
        &self,
        chat_id: ChatId,
        file: &ClassifiedFile,
    ) -> Result<(), SendError> {
        self.bot
            .send_animation(chat_id, InputFile::file(file.path.clone()))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ChatGateway for TelegramGateway {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId, SendError> {
        retry_telegram_operation(
            || async {
                self.bot
                    .send_message(chat_id, text)
                    .await
                    .map(|msg| msg.id)
                    .map_err(SendError::from)
            },
            retry_decision,
        )
        .await
    }

    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), SendError> {
        retry_telegram_operation(
            || async {
                self.bot
                    .delete_message(chat_id, message_id)
                    .await
                    .map(|_| ())
                    .map_err(SendError::from)
            },
            retry_decision,
        )
        .await
    }
}
