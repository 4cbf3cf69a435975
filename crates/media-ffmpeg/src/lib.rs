mod error;
mod probe;

pub use error::{MediaFfmpegError, Result};
pub use probe::{MediaInfo, VideoInfo, probe_media};
