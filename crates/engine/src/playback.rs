use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::{EngineError, Result};

/// Playback engine driven by the session.
///
/// The engine owns the playback position. The session only reads it, asks for
/// seeks, and receives position notifications through [`PlaybackEngine::poll`].
pub trait PlaybackEngine {
    /// Prepares the engine for a new source of `duration` seconds, paused at 0.
    fn load(&mut self, duration: f64);

    /// Starts playback. Fails when the platform refuses to start.
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    /// Requests a seek. Completion is reported by a later notification.
    fn seek(&mut self, seconds: f64);

    fn set_rate(&mut self, rate: f64);

    /// Current position in seconds, including a requested but unreported seek.
    fn position(&self) -> f64;

    fn is_playing(&self) -> bool;

    /// Whether playback stopped by reaching the end of the media.
    fn has_ended(&self) -> bool;

    fn rate(&self) -> f64;

    /// Advances the engine by one update step and returns the position
    /// notification for it, if any.
    fn poll(&mut self, elapsed: Duration) -> Option<f64>;
}

/// Software clock implementing [`PlaybackEngine`].
///
/// Advances `rate` seconds of media per second of wall time while playing and
/// stops at the end of the media. Seeks take effect on the next poll.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockPlayer {
    duration: Option<f64>,
    position: f64,
    rate: f64,
    playing: bool,
    ended: bool,
    pending_seek: Option<f64>,
    autoplay_blocked: bool,
}

impl Default for ClockPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockPlayer {
    pub fn new() -> Self {
        Self {
            duration: None,
            position: 0.0,
            rate: 1.0,
            playing: false,
            ended: false,
            pending_seek: None,
            autoplay_blocked: false,
        }
    }

    /// Makes every `play` call fail, as a browser autoplay policy would.
    pub fn set_autoplay_blocked(&mut self, blocked: bool) {
        self.autoplay_blocked = blocked;
    }
}

impl PlaybackEngine for ClockPlayer {
    fn load(&mut self, duration: f64) {
        self.duration = Some(duration);
        self.position = 0.0;
        self.playing = false;
        self.ended = false;
        self.pending_seek = None;
    }

    fn play(&mut self) -> Result<()> {
        let duration = self.duration.ok_or(EngineError::MediaNotLoaded)?;
        if self.autoplay_blocked {
            return Err(EngineError::PlaybackBlocked {
                reason: String::from("autoplay is blocked"),
            });
        }
        if self.position() >= duration {
            self.seek(0.0);
        }

        self.playing = true;
        self.ended = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, seconds: f64) {
        let Some(duration) = self.duration else {
            return;
        };
        let target = if seconds.is_nan() {
            0.0
        } else {
            seconds.clamp(0.0, duration)
        };

        self.ended = false;
        self.pending_seek = Some(target);
    }

    fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn position(&self) -> f64 {
        self.pending_seek.unwrap_or(self.position)
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn has_ended(&self) -> bool {
        self.ended
    }

    fn rate(&self) -> f64 {
        self.rate
    }

    fn poll(&mut self, elapsed: Duration) -> Option<f64> {
        let duration = self.duration?;
        if let Some(target) = self.pending_seek.take() {
            self.position = target;
            return Some(target);
        }
        if !self.playing {
            return None;
        }

        self.position = (self.position + elapsed.as_secs_f64() * self.rate).min(duration);
        if self.position >= duration {
            debug!(duration, "clock reached end of media");
            self.playing = false;
            self.ended = true;
        }
        Some(self.position)
    }
}

/// Result of probing one local video file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbedMedia {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Media metadata lookups required by the session.
pub trait MediaBackend {
    /// Probes the duration and picture size of a local file.
    fn probe(&self, path: &Path) -> Result<ProbedMedia>;
}

/// FFmpeg CLI-backed backend used by production wiring.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegMediaBackend;

impl MediaBackend for FfmpegMediaBackend {
    fn probe(&self, path: &Path) -> Result<ProbedMedia> {
        let info = media_ffmpeg::probe_media(path)?;
        let duration_seconds = info
            .duration_seconds
            .ok_or_else(|| EngineError::MissingDuration(path.to_path_buf()))?;

        Ok(ProbedMedia {
            path: path.to_path_buf(),
            duration_seconds,
            width: info.video.map(|video| video.width),
            height: info.video.map(|video| video.height),
        })
    }
}
