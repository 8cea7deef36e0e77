use async_trait::async_trait;
use reddit_media_relay::bot::relay::{
    DOWNLOADING_TEXT, DOWNLOAD_FAILED_TEXT, MEDIA_SENT_TEXT, NOT_AUTHORIZED_TEXT, NO_LINK_TEXT,
    UPLOADING_TEXT,
};
use reddit_media_relay::bot::{ChatGateway, IncomingMessage, MessageRelay, RelayError, UnauthorizedCache};
use reddit_media_relay::config::{AllowList, UNAUTHORIZED_COOLDOWN_SECS};
use reddit_media_relay::downloader::{DownloadError, MediaDownloader};
use reddit_media_relay::link::{canonicalize_link, LinkResolver};
use reddit_media_relay::media::{ClassifiedFile, MediaBatch, MediaKind, MediaSink, SendError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use teloxide::types::{ChatId, MessageId};

const CHAT: ChatId = ChatId(42);
const ALLOWED_USER: i64 = 7;
const STRANGER: i64 = 666;
const ORIGINAL_MESSAGE: MessageId = MessageId(1);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Text(String),
    Delete(i32),
    Group(MediaKind, Vec<String>),
    Animation(String),
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Records every chat call. The first `rate_limited_groups` media group sends answer
/// with a flood-control signal.
#[derive(Default)]
struct FakeChat {
    events: Mutex<Vec<Event>>,
    next_id: AtomicI32,
    rate_limited_groups: AtomicI32,
}

impl FakeChat {
    fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn push(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl MediaSink for FakeChat {
    async fn send_media_group(&self, _chat_id: ChatId, batch: &MediaBatch) -> Result<(), SendError> {
        if self.rate_limited_groups.fetch_sub(1, Ordering::SeqCst) > 0 {
            return Err(SendError::RateLimited {
                retry_after: Duration::from_millis(10),
            });
        }
        let names = batch.files().iter().map(|f| file_name(&f.path)).collect();
        self.push(Event::Group(batch.kind(), names));
        Ok(())
    }

    async fn send_animation(&self, _chat_id: ChatId, file: &ClassifiedFile) -> Result<(), SendError> {
        self.push(Event::Animation(file_name(&file.path)));
        Ok(())
    }
}

#[async_trait]
impl ChatGateway for FakeChat {
    async fn send_text(&self, _chat_id: ChatId, text: &str) -> Result<MessageId, SendError> {
        self.push(Event::Text(text.to_string()));
        Ok(MessageId(1000 + self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn delete_message(&self, _chat_id: ChatId, message_id: MessageId) -> Result<(), SendError> {
        self.push(Event::Delete(message_id.0));
        Ok(())
    }
}

/// Strips tracking parameters without touching the network
struct OfflineResolver;

#[async_trait]
impl LinkResolver for OfflineResolver {
    async fn resolve(&self, link: &str) -> String {
        canonicalize_link(link)
    }
}

/// Writes a fixed set of files (name, size) into the target directory
#[derive(Default)]
struct FakeDownloader {
    files: Vec<(String, usize)>,
    fail: bool,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeDownloader {
    fn with_files(files: &[(&str, usize)]) -> Self {
        Self {
            files: files.iter().map(|(n, s)| ((*n).to_string(), *s)).collect(),
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MediaDownloader for FakeDownloader {
    async fn download(&self, link: &str, target_dir: &Path) -> Result<(), DownloadError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((link.to_string(), target_dir.to_path_buf()));
        }
        if self.fail {
            return Err(DownloadError::Spawn {
                program: "bdfr".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "bdfr not found"),
            });
        }
        let io = |source| DownloadError::Io {
            path: target_dir.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(target_dir).map_err(io)?;
        for (name, size) in &self.files {
            std::fs::write(target_dir.join(name), vec![0_u8; *size]).map_err(io)?;
        }
        Ok(())
    }
}

fn relay(scratch_root: &Path, downloader: Arc<FakeDownloader>) -> MessageRelay {
    relay_with_cooldown(scratch_root, downloader, UNAUTHORIZED_COOLDOWN_SECS)
}

fn relay_with_cooldown(
    scratch_root: &Path,
    downloader: Arc<FakeDownloader>,
    cooldown_secs: u64,
) -> MessageRelay {
    MessageRelay::new(
        Arc::new(AllowList::new([ALLOWED_USER])),
        Arc::new(UnauthorizedCache::new(cooldown_secs, 120, 100)),
        Arc::new(OfflineResolver),
        downloader,
        scratch_root.to_path_buf(),
    )
    .with_max_file_size(1_000)
}

fn message(user_id: i64, text: &str) -> IncomingMessage {
    IncomingMessage {
        chat_id: CHAT,
        message_id: ORIGINAL_MESSAGE,
        user_id,
        text: text.to_string(),
    }
}

fn names(prefix: &str, ext: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}{i:02}.{ext}")).collect()
}

fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(false)
}

#[tokio::test]
async fn scenario_a_allowed_user_with_link_gets_media() -> anyhow::Result<()> {
    let scratch = tempfile::tempdir()?;
    let image_names = names("img", "jpg", 12);
    let mut files: Vec<(&str, usize)> = image_names.iter().map(|n| (n.as_str(), 10)).collect();
    files.extend([("clip.mp4", 10), ("post.json", 10), ("fun.gif", 10)]);
    let downloader = Arc::new(FakeDownloader::with_files(&files));
    let chat = FakeChat::default();

    let summary = relay(scratch.path(), downloader.clone())
        .handle(
            &chat,
            &message(
                ALLOWED_USER,
                "check this out https://reddit.com/r/test/comments/abc/xyz?utm=1",
            ),
        )
        .await?;

    let calls = downloader.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "https://reddit.com/r/test/comments/abc/xyz");
    assert!(calls[0].1.starts_with(scratch.path()));
    assert_eq!(summary.link, "https://reddit.com/r/test/comments/abc/xyz");

    assert_eq!(
        chat.events(),
        vec![
            Event::Text(DOWNLOADING_TEXT.to_string()),
            Event::Delete(1000),
            Event::Text(UPLOADING_TEXT.to_string()),
            Event::Group(MediaKind::Image, image_names[..10].to_vec()),
            Event::Group(MediaKind::Image, image_names[10..].to_vec()),
            Event::Group(MediaKind::Video, vec!["clip.mp4".to_string()]),
            Event::Group(MediaKind::Document, vec!["post.json".to_string()]),
            Event::Animation("fun.gif".to_string()),
            Event::Delete(1001),
            Event::Delete(ORIGINAL_MESSAGE.0),
            Event::Text(MEDIA_SENT_TEXT.to_string()),
        ]
    );

    assert_eq!(summary.report.delivered_files, 15);
    assert_eq!(summary.skipped_oversized, 0);
    assert!(is_empty_dir(scratch.path()), "scratch directory left behind");
    Ok(())
}

#[tokio::test]
async fn scenario_b_message_without_link_is_rejected() -> anyhow::Result<()> {
    let scratch = tempfile::tempdir()?;
    let downloader = Arc::new(FakeDownloader::default());
    let chat = FakeChat::default();

    let result = relay(scratch.path(), downloader.clone())
        .handle(&chat, &message(ALLOWED_USER, "hello"))
        .await;

    assert!(matches!(result, Err(RelayError::NoLinkFound)));
    assert!(downloader.calls().is_empty());
    assert_eq!(
        chat.events(),
        vec![
            Event::Delete(ORIGINAL_MESSAGE.0),
            Event::Text(NO_LINK_TEXT.to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn scenario_c_stranger_is_refused_on_every_message() -> anyhow::Result<()> {
    let scratch = tempfile::tempdir()?;
    let downloader = Arc::new(FakeDownloader::default());
    let chat = FakeChat::default();
    let relay = relay(scratch.path(), downloader.clone());
    let msg = message(STRANGER, "https://reddit.com/r/test/comments/abc/xyz");

    let first = relay.handle(&chat, &msg).await;
    let second = relay.handle(&chat, &msg).await;

    assert!(matches!(first, Err(RelayError::Unauthorized(STRANGER))));
    assert!(matches!(second, Err(RelayError::Unauthorized(STRANGER))));
    assert!(downloader.calls().is_empty());
    assert_eq!(
        chat.events(),
        vec![
            Event::Text(NOT_AUTHORIZED_TEXT.to_string()),
            Event::Text(NOT_AUTHORIZED_TEXT.to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn configured_cooldown_silences_repeat_strangers() -> anyhow::Result<()> {
    let scratch = tempfile::tempdir()?;
    let downloader = Arc::new(FakeDownloader::default());
    let chat = FakeChat::default();
    let relay = relay_with_cooldown(scratch.path(), downloader.clone(), 60);
    let msg = message(STRANGER, "https://reddit.com/r/test/comments/abc/xyz");

    let first = relay.handle(&chat, &msg).await;
    let second = relay.handle(&chat, &msg).await;

    assert!(matches!(first, Err(RelayError::Unauthorized(STRANGER))));
    assert!(matches!(second, Err(RelayError::Unauthorized(STRANGER))));
    assert!(downloader.calls().is_empty());
    assert_eq!(chat.events(), vec![Event::Text(NOT_AUTHORIZED_TEXT.to_string())]);
    Ok(())
}

#[tokio::test]
async fn download_failure_reports_error_and_keeps_original() -> anyhow::Result<()> {
    let scratch = tempfile::tempdir()?;
    let chat = FakeChat::default();

    let result = relay(scratch.path(), Arc::new(FakeDownloader::failing()))
        .handle(&chat, &message(ALLOWED_USER, "https://www.reddit.com/r/a/comments/b"))
        .await;

    assert!(matches!(result, Err(RelayError::Download(_))));
    assert_eq!(
        chat.events(),
        vec![
            Event::Text(DOWNLOADING_TEXT.to_string()),
            Event::Delete(1000),
            Event::Text(DOWNLOAD_FAILED_TEXT.to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn oversized_files_are_skipped_and_reported() -> anyhow::Result<()> {
    let scratch = tempfile::tempdir()?;
    let downloader = Arc::new(FakeDownloader::with_files(&[
        ("small.png", 500),
        ("huge.mp4", 5_000),
        ("huge.gif", 1_001),
    ]));
    let chat = FakeChat::default();

    let summary = relay(scratch.path(), downloader)
        .handle(&chat, &message(ALLOWED_USER, "https://reddit.com/r/a/comments/b"))
        .await?;

    let events = chat.events();
    assert!(events.contains(&Event::Group(MediaKind::Image, vec!["small.png".to_string()])));
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::Group(MediaKind::Video, _) | Event::Animation(_))));
    assert_eq!(
        events.last(),
        Some(&Event::Text(
            "Media sent! (2 files skipped: larger than 50 MB)".to_string()
        ))
    );
    assert_eq!(summary.skipped_oversized, 2);
    assert_eq!(summary.report.delivered_files, 1);
    Ok(())
}

#[tokio::test]
async fn rate_limited_group_is_retried_until_delivered() -> anyhow::Result<()> {
    let scratch = tempfile::tempdir()?;
    let downloader = Arc::new(FakeDownloader::with_files(&[("a.jpg", 1), ("b.mp4", 1)]));
    let chat = FakeChat::default();
    chat.rate_limited_groups.store(3, Ordering::SeqCst);

    let summary = relay(scratch.path(), downloader)
        .handle(&chat, &message(ALLOWED_USER, "https://reddit.com/r/a/comments/b"))
        .await?;

    let groups: Vec<_> = chat
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::Group(..)))
        .collect();
    assert_eq!(
        groups,
        vec![
            Event::Group(MediaKind::Image, vec!["a.jpg".to_string()]),
            Event::Group(MediaKind::Video, vec!["b.mp4".to_string()]),
        ]
    );
    assert_eq!(summary.report.delivered_files, 2);
    assert_eq!(summary.report.rate_limited_sends(), 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_requests_use_separate_scratch_directories() -> anyhow::Result<()> {
    let scratch = tempfile::tempdir()?;
    let downloader = Arc::new(FakeDownloader::with_files(&[("a.jpg", 1)]));
    let relay = relay(scratch.path(), downloader.clone());
    let chat_a = FakeChat::default();
    let chat_b = FakeChat::default();
    let msg = message(ALLOWED_USER, "https://reddit.com/r/a/comments/b");

    let (a, b) = tokio::join!(relay.handle(&chat_a, &msg), relay.handle(&chat_b, &msg));
    a?;
    b?;

    let calls = downloader.calls();
    assert_eq!(calls.len(), 2);
    assert_ne!(calls[0].1, calls[1].1);
    assert!(is_empty_dir(scratch.path()));
    Ok(())
}
