use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use crate::bookmarks::BookmarkId;

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by session commands and the bookmark store.
///
/// Boundary edits that would cross the loop bounds are not errors: they are
/// dropped where they happen.
#[derive(Debug)]
pub enum EngineError {
    MediaNotLoaded,
    MissingDuration(PathBuf),
    InvalidDuration {
        seconds: f64,
    },
    InvalidRate {
        rate: f64,
    },
    BookmarkNotFound {
        id: BookmarkId,
    },
    InvalidBookmarkRange {
        id: BookmarkId,
        start: f64,
        end: f64,
    },
    MalformedImport {
        reason: String,
    },
    BookmarkIo {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    BookmarkSerialization {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
    PlaybackBlocked {
        reason: String,
    },
    Media(media_ffmpeg::MediaFfmpegError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MediaNotLoaded => write!(f, "no video is loaded"),
            Self::MissingDuration(path) => {
                write!(f, "media duration is missing: {}", path.display())
            }
            Self::InvalidDuration { seconds } => {
                write!(f, "media duration must be positive: {seconds}")
            }
            Self::InvalidRate { rate } => write!(f, "playback rate must be positive: {rate}"),
            Self::BookmarkNotFound { id } => write!(f, "step not found: {id}"),
            Self::InvalidBookmarkRange { id, start, end } => {
                write!(f, "step {id} has a range outside this video: {start}..{end}")
            }
            Self::MalformedImport { reason } => write!(f, "import rejected: {reason}"),
            Self::BookmarkIo {
                context,
                path,
                source,
            } => write!(f, "{context}: {} ({source})", path.display()),
            Self::BookmarkSerialization { path, source } => match path {
                Some(path) => write!(
                    f,
                    "import rejected: step file {} is malformed ({source})",
                    path.display()
                ),
                None => write!(f, "import rejected: step data is malformed ({source})"),
            },
            Self::PlaybackBlocked { reason } => write!(f, "playback could not start: {reason}"),
            Self::Media(err) => write!(f, "media backend error: {err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::BookmarkIo { source, .. } => Some(source),
            Self::BookmarkSerialization { source, .. } => Some(source),
            Self::Media(err) => Some(err),
            _ => None,
        }
    }
}

impl From<media_ffmpeg::MediaFfmpegError> for EngineError {
    fn from(value: media_ffmpeg::MediaFfmpegError) -> Self {
        Self::Media(value)
    }
}
