//! Media group batching and upload ordering.

use super::classify::{ClassifiedFile, ClassifiedMedia, MediaKind};
use crate::config::MEDIA_GROUP_MAX_ITEMS;

/// Up to [`MEDIA_GROUP_MAX_ITEMS`] files of one kind, sent in a single media group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBatch {
    kind: MediaKind,
    files: Vec<ClassifiedFile>,
}

impl MediaBatch {
    /// Kind shared by every file in the batch
    #[must_use]
    pub const fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Files in discovery order
    #[must_use]
    pub fn files(&self) -> &[ClassifiedFile] {
        &self.files
    }

    /// Number of files
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the batch is empty (never true for batches built by [`batches`])
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Split `files` into contiguous, order-preserving batches of at most
/// [`MEDIA_GROUP_MAX_ITEMS`].
#[must_use]
pub fn batches(kind: MediaKind, files: Vec<ClassifiedFile>) -> Vec<MediaBatch> {
    let mut out = Vec::with_capacity(files.len().div_ceil(MEDIA_GROUP_MAX_ITEMS));
    let mut files = files.into_iter().peekable();
    while files.peek().is_some() {
        let chunk: Vec<_> = files.by_ref().take(MEDIA_GROUP_MAX_ITEMS).collect();
        out.push(MediaBatch { kind, files: chunk });
    }
    out
}

/// One API call in an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedSend {
    /// `sendMediaGroup`
    Group(MediaBatch),
    /// `sendAnimation`; animations are never grouped
    Animation(ClassifiedFile),
}

impl PlannedSend {
    /// Number of files carried by this send
    #[must_use]
    pub fn file_count(&self) -> usize {
        match self {
            Self::Group(batch) => batch.len(),
            Self::Animation(_) => 1,
        }
    }

    /// Kind of the files carried by this send
    #[must_use]
    pub const fn kind(&self) -> MediaKind {
        match self {
            Self::Group(batch) => batch.kind(),
            Self::Animation(_) => MediaKind::Animation,
        }
    }
}

/// Ordered sends for one request: images, videos, documents, then animations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadPlan {
    sends: Vec<PlannedSend>,
}

impl UploadPlan {
    /// Sends in delivery order
    #[must_use]
    pub fn sends(&self) -> &[PlannedSend] {
        &self.sends
    }

    /// Total files across all sends
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.sends.iter().map(PlannedSend::file_count).sum()
    }

    /// Whether there is nothing to send
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sends.is_empty()
    }
}

impl From<ClassifiedMedia> for UploadPlan {
    fn from(media: ClassifiedMedia) -> Self {
        let ClassifiedMedia {
            images,
            videos,
            documents,
            animations,
            oversized: _,
        } = media;

        let sends = batches(MediaKind::Image, images)
            .into_iter()
            .chain(batches(MediaKind::Video, videos))
            .chain(batches(MediaKind::Document, documents))
            .map(PlannedSend::Group)
            .chain(animations.into_iter().map(PlannedSend::Animation))
            .collect();

        Self { sends }
    }
}
