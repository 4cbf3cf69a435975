use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{MediaFfmpegError, Result};

/// Picture size of the first video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
}

/// Media probe result.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub path: PathBuf,
    /// Container duration. `None` when ffprobe reports `N/A`.
    pub duration_seconds: Option<f64>,
    /// `None` for audio-only files.
    pub video: Option<VideoInfo>,
}

/// Probes duration and picture size of a media file via `ffprobe`.
///
/// # Example
/// ```no_run
/// use media_ffmpeg::probe_media;
///
/// let info = probe_media("routine.mp4").expect("probe should succeed");
/// assert!(info.duration_seconds.is_some());
/// ```
pub fn probe_media(path: impl AsRef<Path>) -> Result<MediaInfo> {
    let path = path.as_ref();

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration:stream=codec_type,width,height",
            "-of",
            "compact=p=0:nk=0",
        ])
        .arg(path)
        .output()
        .map_err(|source| MediaFfmpegError::Io {
            context: "run ffprobe",
            source,
        })?;

    if !output.status.success() {
        return Err(MediaFfmpegError::CommandFailed {
            command: format!("ffprobe {}", path.display()),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8(output.stdout)?;
    parse_probe_output(path, &stdout)
}

/// Parses `compact=p=0:nk=0` output: one line per stream plus one format line.
fn parse_probe_output(path: &Path, stdout: &str) -> Result<MediaInfo> {
    let mut duration_seconds = None;
    let mut video = None;

    for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
        let fields = parse_fields(line)?;

        if let Some(raw) = fields.get("duration") {
            duration_seconds = parse_optional_seconds(raw)?;
            continue;
        }
        if video.is_none() && fields.get("codec_type") == Some(&"video") {
            let width = parse_optional_u32(fields.get("width").copied(), "width")?;
            let height = parse_optional_u32(fields.get("height").copied(), "height")?;
            let (Some(width), Some(height)) = (width, height) else {
                return Err(MediaFfmpegError::MissingVideoDimensions(path.to_path_buf()));
            };
            video = Some(VideoInfo { width, height });
        }
    }

    Ok(MediaInfo {
        path: path.to_path_buf(),
        duration_seconds,
        video,
    })
}

fn parse_fields(line: &str) -> Result<HashMap<&str, &str>> {
    let mut map = HashMap::new();
    for field in line.split('|') {
        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| MediaFfmpegError::Parse {
                context: "probe field",
                value: field.to_string(),
            })?;
        map.insert(key.trim(), value.trim().trim_matches('"'));
    }
    Ok(map)
}

fn parse_optional_seconds(raw: &str) -> Result<Option<f64>> {
    if raw.is_empty() || raw == "N/A" {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| MediaFfmpegError::Parse {
            context: "format duration seconds",
            value: raw.to_string(),
        })
}

fn parse_optional_u32(value: Option<&str>, context: &'static str) -> Result<Option<u32>> {
    let Some(raw) = value else {
        return Ok(None);
    };
    if raw.is_empty() || raw == "N/A" {
        return Ok(None);
    }

    raw.parse::<u32>()
        .map(Some)
        .map_err(|_| MediaFfmpegError::Parse {
            context,
            value: raw.to_string(),
        })
}
