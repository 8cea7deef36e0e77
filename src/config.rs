//! Configuration and settings management
//!
//! Loads bot settings from the legacy `config.json`, optional layered config files and
//! environment variables, and the allow-list of Telegram users from its JSON file.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Largest file (in bytes) that will be re-uploaded to Telegram
pub const MAX_UPLOAD_SIZE_BYTES: u64 = 50 * 1024 * 1024;
/// Maximum number of items Telegram accepts in a single media group
pub const MEDIA_GROUP_MAX_ITEMS: usize = 10;

/// Initial delay before retrying a failed Telegram text call
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound for the delay between Telegram text call retries
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Number of retries for Telegram text calls
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

/// Cooldown period (seconds) between "not authorized" replies for the same user.
/// Default: 0, every unauthorized message is answered. Raise it through
/// `UNAUTHORIZED_COOLDOWN_SECS` to silence repeat offenders.
pub const UNAUTHORIZED_COOLDOWN_SECS: u64 = 0;
/// Time-to-live (seconds) for cooldown entries.
pub const UNAUTHORIZED_CACHE_TTL_SECS: u64 = 7200;
/// Maximum cooldown cache capacity (number of entries).
pub const UNAUTHORIZED_CACHE_MAX_SIZE: u64 = 10_000;

/// Errors raised while loading the allow-list
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The allow-list file exists but could not be read
    #[error("failed to read allow-list {path}: {source}")]
    Read {
        /// Path of the allow-list file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// The allow-list file is not valid JSON of the expected shape
    #[error("malformed allow-list {path}: {source}")]
    Parse {
        /// Path of the allow-list file
        path: PathBuf,
        /// Underlying JSON error
        source: serde_json::Error,
    },
}

/// Application settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token (`bot_token` in the legacy `config.json`)
    #[serde(alias = "bot_token")]
    pub telegram_token: String,

    /// JSON file holding the `allowed_users` id array
    #[serde(default = "default_allowed_users_file")]
    pub allowed_users_file: PathBuf,

    /// Extra allowed user IDs, comma/semicolon/space separated
    #[serde(rename = "allowed_users")]
    pub allowed_users_str: Option<String>,

    /// Root under which per-request scratch directories are created
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// External downloader executable
    #[serde(default = "default_downloader_program")]
    pub downloader_program: String,

    /// Timeout for the redirect-following HEAD request
    #[serde(default = "default_resolve_timeout_secs")]
    pub resolve_timeout_secs: u64,
}

fn default_allowed_users_file() -> PathBuf {
    PathBuf::from("users.json")
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_downloader_program() -> String {
    "bdfr".to_string()
}

const fn default_resolve_timeout_secs() -> u64 {
    15
}

impl Settings {
    /// Create new settings by loading from files and environment
    ///
    /// Sources, later ones overriding earlier ones: `config.json` (legacy, with
    /// `bot_token`), `config/default`, `config/{RUN_MODE}`, `config/local`, `APP__*`
    /// variables, then plain environment variables such as `TELEGRAM_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or the token is missing.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reddit_media_relay::config::Settings;
    ///
    /// # fn example() -> Result<(), config::ConfigError> {
    /// let settings = Settings::new()?;
    /// println!("downloads go to {}", settings.download_dir.display());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .add_source(Environment::default().ignore_empty(true))
            .build()?
            .try_deserialize()
    }

    /// Inline user IDs from `allowed_users`
    #[must_use]
    pub fn inline_allowed_users(&self) -> HashSet<i64> {
        self.allowed_users_str
            .as_deref()
            .map(parse_id_list)
            .unwrap_or_default()
    }

    /// Load the allow-list file and merge it with the inline IDs
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is unreadable or malformed.
    pub fn load_allow_list(&self) -> Result<AllowList, ConfigurationError> {
        let mut list = AllowList::from_file(&self.allowed_users_file)?;
        list.extend(self.inline_allowed_users());
        Ok(list)
    }
}

fn parse_id_list(s: &str) -> HashSet<i64> {
    s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .filter_map(|id| id.parse::<i64>().ok())
        .collect()
}

#[derive(Deserialize)]
struct AllowListFile {
    #[serde(default)]
    allowed_users: Vec<i64>,
}

/// Telegram user IDs permitted to use the bot
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    users: HashSet<i64>,
}

impl AllowList {
    /// Build an allow-list from a fixed set of IDs
    ///
    /// # Examples
    ///
    /// ```
    /// use reddit_media_relay::config::AllowList;
    ///
    /// let list = AllowList::new([111, 222]);
    /// assert!(list.contains(111));
    /// assert!(!list.contains(333));
    /// ```
    #[must_use]
    pub fn new(users: impl IntoIterator<Item = i64>) -> Self {
        Self {
            users: users.into_iter().collect(),
        }
    }

    /// Read `{"allowed_users": [...]}` from `path`. A missing file gives an empty list.
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the allow-list JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reddit_media_relay::config::AllowList;
    /// use std::path::Path;
    ///
    /// # fn example() -> Result<(), reddit_media_relay::config::ConfigurationError> {
    /// let list = AllowList::from_file(Path::new("users.json"))?;
    /// if list.contains(123_456_789) {
    ///     println!("allowed");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Allow-list file not found, nobody is authorized by it");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigurationError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let file: AllowListFile =
            serde_json::from_str(&raw).map_err(|source| ConfigurationError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        info!(
            path = %path.display(),
            users = file.allowed_users.len(),
            "Allow-list loaded"
        );
        Ok(Self::new(file.allowed_users))
    }

    /// Add more IDs
    pub fn extend(&mut self, users: impl IntoIterator<Item = i64>) {
        self.users.extend(users);
    }

    /// Whether `user_id` may use the bot
    #[must_use]
    pub fn contains(&self, user_id: i64) -> bool {
        self.users.contains(&user_id)
    }

    /// Number of allowed users
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether nobody is allowed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Get unauthorized cooldown from env or default.
///
/// Environment variable: `UNAUTHORIZED_COOLDOWN_SECS`.
#[must_use]
pub fn get_unauthorized_cooldown() -> u64 {
    env_u64("UNAUTHORIZED_COOLDOWN_SECS", UNAUTHORIZED_COOLDOWN_SECS)
}

/// Get unauthorized cache TTL from env or default.
///
/// Environment variable: `UNAUTHORIZED_CACHE_TTL_SECS`.
#[must_use]
pub fn get_unauthorized_cache_ttl() -> u64 {
    env_u64("UNAUTHORIZED_CACHE_TTL_SECS", UNAUTHORIZED_CACHE_TTL_SECS)
}

/// Get unauthorized cache max size from env or default.
///
/// Environment variable: `UNAUTHORIZED_CACHE_MAX_SIZE`.
#[must_use]
pub fn get_unauthorized_cache_max_size() -> u64 {
    env_u64("UNAUTHORIZED_CACHE_MAX_SIZE", UNAUTHORIZED_CACHE_MAX_SIZE)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
