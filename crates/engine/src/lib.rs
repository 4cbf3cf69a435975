//! UI-agnostic timeline, loop, and step controller for practicing a video.

pub mod api;
pub mod bookmarks;
pub mod drag;
pub mod error;
pub mod looping;
pub mod playback;
pub mod time;

pub use api::{
    BookmarksSnapshot, Command, EngineErrorEvent, EngineErrorKind, Event, LoopSnapshot, Session,
    SessionSettings, SourceSummary,
};
pub use bookmarks::{Bookmark, BookmarkId, BookmarkRecord};
pub use drag::{Handle, PointerTarget};
pub use error::{EngineError, Result};
pub use looping::LoopRange;
pub use playback::{ClockPlayer, FfmpegMediaBackend, MediaBackend, PlaybackEngine, ProbedMedia};
pub use time::{TrackGeometry, format_time};
