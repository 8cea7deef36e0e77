//! Scratch directory classification.
//!
//! Walks a download directory in a stable order and buckets every regular file by
//! extension. Files above the upload ceiling are set aside instead of classified.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

static IMAGE_EXTENSIONS: &[&str] = &[
    "jpeg", "jpg", "png", "bmp", "tiff", "tif", "webp", "heif", "heic", "raw", "cr2", "nef", "arw",
    "orf", "sr2", "dng", "eps", "ai", "pdf", "svg", "ico", "emf", "wmf", "indd", "psd", "xpm",
    "wbmp", "j2k", "jpf", "jp2", "j2c", "pcx", "pict", "exif",
];

static VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "mpeg", "mpg", "m4v", "3gp", "rm", "rmvb",
    "ts", "ogv", "vob", "m2ts", "f4v", "mts", "asf", "svi", "yuv", "dv", "prx", "mxf",
];

static ANIMATION_EXTENSIONS: &[&str] = &["gif"];

/// How a file is delivered to the chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Sent as a photo in a media group
    Image,
    /// Sent as a video in a media group
    Video,
    /// Sent as a document in a media group
    Document,
    /// Sent on its own with `sendAnimation`
    Animation,
}

impl MediaKind {
    /// Classify a file name by its (case-insensitive) extension
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let Some(ext) = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
        else {
            return Self::Document;
        };

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Self::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Self::Video
        } else if ANIMATION_EXTENSIONS.contains(&ext.as_str()) {
            Self::Animation
        } else {
            Self::Document
        }
    }

    /// Lowercase name used in logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Document => "document",
            Self::Animation => "animation",
        }
    }
}

/// A downloaded file ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFile {
    /// Location on disk
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Delivery kind
    pub kind: MediaKind,
}

/// A file left out because it is larger than the ceiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OversizedFile {
    /// Location on disk
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
}

/// Output of [`classify_directory`], each bucket in walk order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedMedia {
    /// Photos
    pub images: Vec<ClassifiedFile>,
    /// Videos
    pub videos: Vec<ClassifiedFile>,
    /// Everything that is not image, video or animation
    pub documents: Vec<ClassifiedFile>,
    /// GIFs
    pub animations: Vec<ClassifiedFile>,
    /// Files above the size ceiling, not uploaded
    pub oversized: Vec<OversizedFile>,
}

impl ClassifiedMedia {
    /// Put a file into its bucket, or aside if it exceeds `max_size`
    pub fn push(&mut self, path: PathBuf, size: u64, max_size: u64) {
        if size > max_size {
            self.oversized.push(OversizedFile { path, size });
            return;
        }

        let kind = MediaKind::from_path(&path);
        let file = ClassifiedFile { path, size, kind };
        match kind {
            MediaKind::Image => self.images.push(file),
            MediaKind::Video => self.videos.push(file),
            MediaKind::Document => self.documents.push(file),
            MediaKind::Animation => self.animations.push(file),
        }
    }

    /// Number of files that will be uploaded
    #[must_use]
    pub fn uploadable_count(&self) -> usize {
        self.images.len() + self.videos.len() + self.documents.len() + self.animations.len()
    }

    /// Whether nothing is left to upload
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.uploadable_count() == 0
    }
}

/// Recursively classify every regular file under `dir`.
///
/// Entries are visited sorted by file name so the output is reproducible for a given tree.
///
/// # Errors
///
/// Returns an error if the directory cannot be walked or a file's metadata is unreadable.
pub fn classify_directory(dir: &Path, max_size: u64) -> std::io::Result<ClassifiedMedia> {
    let mut media = ClassifiedMedia::default();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let size = entry.metadata()?.len();
        media.push(entry.into_path(), size, max_size);
    }

    Ok(media)
}
