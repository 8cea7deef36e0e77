//! Telegram update handlers.

use crate::bot::gateway::TelegramGateway;
use crate::bot::relay::{IncomingMessage, MessageRelay, RelayError};
use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{debug, info};

/// Greeting for `/start`
pub const START_TEXT: &str = "Send me a Reddit post link, and I'll download the media for you!";

/// Supported commands
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the greeting
    #[command(description = "Start using the bot.")]
    Start,
}

/// Returns the sender id, or 0 for messages without a sender (channel posts)
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Whether a text message belongs to the link flow. Commands, known or not, never do.
#[must_use]
pub fn is_relay_text(text: &str) -> bool {
    !text.starts_with('/')
}

/// Build the relay input from a Telegram text message
#[must_use]
pub fn incoming_message(msg: &Message) -> Option<IncomingMessage> {
    Some(IncomingMessage {
        chat_id: msg.chat.id,
        message_id: msg.id,
        user_id: get_user_id_safe(msg),
        text: msg.text()?.to_string(),
    })
}

/// `/start`
///
/// # Errors
///
/// Returns an error if the greeting cannot be sent.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, START_TEXT).await?;
    Ok(())
}

/// Any non-command text message
///
/// # Errors
///
/// Never fails for relay outcomes; those are reported to the user and logged.
pub async fn handle_text(bot: Bot, msg: Message, relay: Arc<MessageRelay>) -> Result<()> {
    let Some(incoming) = incoming_message(&msg) else {
        return Ok(());
    };

    let gateway = TelegramGateway::new(bot);
    match relay.handle(&gateway, &incoming).await {
        Ok(summary) => {
            info!(
                link = %summary.link,
                delivered = summary.report.delivered_files,
                failed = summary.report.failed_files,
                skipped = summary.skipped_oversized,
                "Relay finished"
            );
        }
        Err(RelayError::Unauthorized(user_id)) => {
            debug!(user_id, "Ignored message from unauthorized user");
        }
        Err(e) => info!(error = %e, "Relay stopped early"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_command() {
        assert!(matches!(
            Command::parse("/start", "relay_bot"),
            Ok(Command::Start)
        ));
        assert!(Command::parse("/stop", "relay_bot").is_err());
    }

    #[test]
    fn test_unknown_commands_skip_the_relay() {
        assert!(!is_relay_text("/help"));
        assert!(!is_relay_text("/start@relay_bot"));
        assert!(is_relay_text("https://reddit.com/r/a/comments/b"));
        assert!(is_relay_text("hello /help"));
    }

    #[test]
    fn test_command_descriptions_list_start() {
        let text = Command::descriptions().to_string();
        assert!(text.contains("/start"));
    }
}
