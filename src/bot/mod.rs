/// Chat operations and their Telegram implementation
pub mod gateway;
/// Command and message handlers
pub mod handlers;
/// Per-message orchestration
pub mod relay;
/// Retry helper for Telegram calls
pub mod resilient;
/// Cooldown for unauthorized replies
pub mod unauthorized_cache;

pub use gateway::{ChatGateway, TelegramGateway};
pub use relay::{IncomingMessage, MessageRelay, RelayError, RelaySummary};
pub use unauthorized_cache::UnauthorizedCache;
