use std::path::PathBuf;
use std::time::Duration;

use crate::bookmarks::{
    Bookmark, BookmarkBinder, BookmarkId, BookmarkStore, load_records_from_path,
};
use crate::drag::{DragAction, DragState, Handle, PointerTarget};
use crate::error::{EngineError, Result};
use crate::looping::{LoopModel, LoopRange, LoopWatcher};
use crate::playback::{ClockPlayer, FfmpegMediaBackend, MediaBackend, PlaybackEngine};
use crate::time::{TrackGeometry, to_time};
use tracing::{debug, info, warn};

/// Commands accepted by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Probes a local file and starts a new session on it.
    LoadSource {
        path: PathBuf,
    },
    /// Metadata notification from a playback engine that loads sources itself.
    MetadataReady {
        duration: f64,
    },
    /// Position notification from the playback engine.
    PositionChanged {
        seconds: f64,
    },
    /// Lets the playback engine advance by `elapsed` and report its position.
    Tick {
        elapsed: Duration,
    },
    Play,
    Pause,
    TogglePlayback,
    Seek {
        seconds: f64,
    },
    SetRate {
        rate: f64,
    },
    SetLoopStartToCurrent,
    SetLoopEndToCurrent,
    ToggleLooping,
    /// Pointer pressed on the strip. `x` and `track` share one coordinate space.
    PointerDown {
        target: PointerTarget,
        x: f32,
        track: TrackGeometry,
    },
    PointerMove {
        x: f32,
        track: TrackGeometry,
    },
    PointerUp,
    PointerCancel,
    /// Saves the current loop range as a new step.
    AddBookmark,
    RenameBookmark {
        id: BookmarkId,
        name: String,
    },
    RemoveBookmark {
        id: BookmarkId,
    },
    /// Plays one step: loads its range, loops it, and keeps it in sync with
    /// later loop edits.
    ActivateBookmark {
        id: BookmarkId,
    },
    DeactivateBookmark,
    ExportBookmarks {
        path: PathBuf,
    },
    ImportBookmarks {
        path: PathBuf,
    },
}

/// Events emitted by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SourceLoaded(SourceSummary),
    PositionChanged { seconds: f64 },
    SeekRequested { seconds: f64 },
    LoopChanged(LoopSnapshot),
    DragChanged { captured: Option<Handle> },
    PlaybackChanged { playing: bool, rate: f64 },
    BookmarksChanged(BookmarksSnapshot),
    BookmarksExported { path: PathBuf, count: usize },
    Error(EngineErrorEvent),
}

/// User-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    ImportRejected,
    PlaybackBlocked,
    MediaRejected,
    Other,
}

impl From<&EngineError> for EngineErrorKind {
    fn from(value: &EngineError) -> Self {
        match value {
            EngineError::MalformedImport { .. } | EngineError::BookmarkSerialization { .. } => {
                Self::ImportRejected
            }
            EngineError::PlaybackBlocked { .. } => Self::PlaybackBlocked,
            EngineError::Media(_)
            | EngineError::MissingDuration(_)
            | EngineError::InvalidDuration { .. } => Self::MediaRejected,
            _ => Self::Other,
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineErrorEvent {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: EngineErrorKind::from(error),
            message: error.to_string(),
        }
    }
}

/// Loaded video as seen by the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSummary {
    pub path: Option<PathBuf>,
    pub duration_seconds: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Loop state as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSnapshot {
    pub range: LoopRange,
    pub looping: bool,
}

/// Step list as seen by the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarksSnapshot {
    pub bookmarks: Vec<Bookmark>,
    pub active: Option<BookmarkId>,
}

/// Session knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// New steps are named `"{prefix} N"`.
    pub step_name_prefix: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            step_name_prefix: String::from("Step"),
        }
    }
}

/// Timeline and loop controller for one practice session.
///
/// Every command is applied synchronously; seeks decided while handling a
/// command reach the playback engine before the command returns.
#[derive(Debug)]
pub struct Session<P, M> {
    playback: P,
    media: M,
    source: Option<SourceSummary>,
    loop_model: LoopModel,
    watcher: LoopWatcher,
    drag: DragState,
    store: BookmarkStore,
    binder: BookmarkBinder,
}

impl<P, M> Session<P, M>
where
    P: PlaybackEngine,
    M: MediaBackend,
{
    /// Creates a session with no video loaded.
    ///
    /// # Example
    /// ```no_run
    /// use loop_engine::{ClockPlayer, FfmpegMediaBackend, Session, SessionSettings};
    ///
    /// let _session = Session::new(
    ///     ClockPlayer::new(),
    ///     FfmpegMediaBackend,
    ///     SessionSettings::default(),
    /// );
    /// ```
    pub fn new(playback: P, media: M, settings: SessionSettings) -> Self {
        Self {
            playback,
            media,
            source: None,
            loop_model: LoopModel::default(),
            watcher: LoopWatcher::default(),
            drag: DragState::default(),
            store: BookmarkStore::new(settings.step_name_prefix),
            binder: BookmarkBinder::default(),
        }
    }

    /// Applies one command and returns emitted events.
    pub fn handle_command(&mut self, command: Command) -> Result<Vec<Event>> {
        match command {
            Command::LoadSource { path } => self.load_source(path),
            Command::MetadataReady { duration } => {
                let path = self.source.as_ref().and_then(|source| source.path.clone());
                self.begin_source(SourceSummary {
                    path,
                    duration_seconds: duration,
                    width: None,
                    height: None,
                })
            }
            Command::PositionChanged { seconds } => Ok(self.position_changed(seconds)),
            Command::Tick { elapsed } => Ok(self.tick(elapsed)),
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::TogglePlayback => {
                if self.playback.is_playing() {
                    self.pause()
                } else {
                    self.play()
                }
            }
            Command::Seek { seconds } => self.seek(seconds),
            Command::SetRate { rate } => self.set_rate(rate),
            Command::SetLoopStartToCurrent => {
                let position = self.playback.position();
                let accepted = self.loop_model.set_start_to_current(position);
                Ok(self.loop_edited(accepted))
            }
            Command::SetLoopEndToCurrent => {
                let position = self.playback.position();
                let accepted = self.loop_model.set_end_to_current(position);
                Ok(self.loop_edited(accepted))
            }
            Command::ToggleLooping => Ok(self.toggle_looping()),
            Command::PointerDown { target, x, track } => self.pointer_down(target, x, track),
            Command::PointerMove { x, track } => self.pointer_move(x, track),
            Command::PointerUp | Command::PointerCancel => Ok(self.pointer_release()),
            Command::AddBookmark => self.add_bookmark(),
            Command::RenameBookmark { id, name } => {
                self.store.rename(id, name)?;
                Ok(vec![self.bookmarks_event()])
            }
            Command::RemoveBookmark { id } => self.remove_bookmark(id),
            Command::ActivateBookmark { id } => self.activate_bookmark(id),
            Command::DeactivateBookmark => {
                if let Some(id) = self.binder.deactivate() {
                    debug!(id, "step unbound");
                }
                Ok(vec![self.bookmarks_event()])
            }
            Command::ExportBookmarks { path } => {
                let count = self.store.save_to_path(&path)?;
                Ok(vec![Event::BookmarksExported { path, count }])
            }
            Command::ImportBookmarks { path } => self.import_bookmarks(path),
        }
    }

    pub fn source(&self) -> Option<&SourceSummary> {
        self.source.as_ref()
    }

    pub fn loop_snapshot(&self) -> LoopSnapshot {
        LoopSnapshot {
            range: self.loop_model.range(),
            looping: self.loop_model.is_looping(),
        }
    }

    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    pub fn bookmarks(&self) -> &BookmarkStore {
        &self.store
    }

    pub fn active_bookmark(&self) -> Option<BookmarkId> {
        self.binder.active()
    }

    pub fn playback(&self) -> &P {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut P {
        &mut self.playback
    }

    fn load_source(&mut self, path: PathBuf) -> Result<Vec<Event>> {
        let probed = self.media.probe(&path)?;
        self.begin_source(SourceSummary {
            path: Some(probed.path),
            duration_seconds: probed.duration_seconds,
            width: probed.width,
            height: probed.height,
        })
    }

    fn begin_source(&mut self, source: SourceSummary) -> Result<Vec<Event>> {
        let range = self.loop_model.reset_for_new_media(source.duration_seconds)?;
        self.playback.load(source.duration_seconds);
        self.watcher.rearm();
        self.drag.release();
        self.binder.deactivate();

        info!(
            path = ?source.path,
            duration = source.duration_seconds,
            loop_end = range.end,
            "source loaded"
        );
        self.source = Some(source.clone());

        Ok(vec![
            Event::SourceLoaded(source),
            Event::DragChanged { captured: None },
            Event::LoopChanged(self.loop_snapshot()),
            self.playback_event(),
            Event::PositionChanged { seconds: 0.0 },
            self.bookmarks_event(),
        ])
    }

    fn position_changed(&mut self, seconds: f64) -> Vec<Event> {
        if self.loop_model.duration().is_none() {
            return Vec::new();
        }

        let mut events = vec![Event::PositionChanged { seconds }];
        let Some(target) = self.watcher.observe(seconds, &self.loop_model) else {
            return events;
        };

        let resume = self.playback.has_ended();
        self.playback.seek(target);
        debug!(position = seconds, target, resume, "loop wrapped");
        events.push(Event::SeekRequested {
            seconds: self.playback.position(),
        });

        if resume {
            match self.playback.play() {
                Ok(()) => events.push(self.playback_event()),
                Err(error) => {
                    warn!(%error, "could not resume after wrapping at end of media");
                    events.push(Event::Error(EngineErrorEvent::from_error(&error)));
                }
            }
        }
        events
    }

    fn tick(&mut self, elapsed: Duration) -> Vec<Event> {
        let was_playing = self.playback.is_playing();
        let Some(position) = self.playback.poll(elapsed) else {
            return Vec::new();
        };

        let mut events = Vec::new();
        if self.playback.is_playing() != was_playing {
            events.push(self.playback_event());
        }
        events.extend(self.position_changed(position));
        events
    }

    fn play(&mut self) -> Result<Vec<Event>> {
        self.ensure_loaded()?;
        if let Err(error) = self.playback.play() {
            warn!(%error, "playback did not start");
            return Err(error);
        }
        Ok(vec![self.playback_event()])
    }

    fn pause(&mut self) -> Result<Vec<Event>> {
        self.ensure_loaded()?;
        self.playback.pause();
        Ok(vec![self.playback_event()])
    }

    fn seek(&mut self, seconds: f64) -> Result<Vec<Event>> {
        self.ensure_loaded()?;
        Ok(self.request_seek(seconds))
    }

    fn set_rate(&mut self, rate: f64) -> Result<Vec<Event>> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(EngineError::InvalidRate { rate });
        }

        self.playback.set_rate(rate);
        Ok(vec![self.playback_event()])
    }

    fn toggle_looping(&mut self) -> Vec<Event> {
        let Some(looping) = self.loop_model.toggle_looping() else {
            return Vec::new();
        };

        self.watcher.rearm();
        info!(looping, "looping toggled");
        vec![Event::LoopChanged(self.loop_snapshot())]
    }

    fn pointer_down(
        &mut self,
        target: PointerTarget,
        x: f32,
        track: TrackGeometry,
    ) -> Result<Vec<Event>> {
        let Some(duration) = self.loop_model.duration() else {
            return Ok(Vec::new());
        };
        if let Some(captured) = self.drag.captured() {
            debug!(?captured, ?target, "pointer-down ignored: capture in progress");
            return Ok(Vec::new());
        }

        match target {
            PointerTarget::Track => {
                let time = to_time(track.fraction_at(x), duration);
                Ok(self.request_seek(time))
            }
            PointerTarget::Handle(handle) => {
                self.drag.begin(handle);
                Ok(vec![Event::DragChanged {
                    captured: Some(handle),
                }])
            }
        }
    }

    fn pointer_move(&mut self, x: f32, track: TrackGeometry) -> Result<Vec<Event>> {
        let Some(duration) = self.loop_model.duration() else {
            return Ok(Vec::new());
        };
        let time = to_time(track.fraction_at(x), duration);

        let events = match self.drag.action_for(time) {
            None => Vec::new(),
            Some(DragAction::Seek(time)) => self.request_seek(time),
            Some(DragAction::MoveStart(time)) => {
                let accepted = self.loop_model.drag_start_to(time);
                self.loop_edited(accepted)
            }
            Some(DragAction::MoveEnd(time)) => {
                let accepted = self.loop_model.drag_end_to(time);
                self.loop_edited(accepted)
            }
        };
        Ok(events)
    }

    fn pointer_release(&mut self) -> Vec<Event> {
        match self.drag.release() {
            Some(handle) => {
                debug!(?handle, "capture released");
                vec![Event::DragChanged { captured: None }]
            }
            None => Vec::new(),
        }
    }

    fn add_bookmark(&mut self) -> Result<Vec<Event>> {
        self.ensure_loaded()?;
        let range = self.loop_model.range();
        let id = self.store.add(range);
        info!(id, start = range.start, end = range.end, "step saved");
        Ok(vec![self.bookmarks_event()])
    }

    fn remove_bookmark(&mut self, id: BookmarkId) -> Result<Vec<Event>> {
        self.store.remove(id)?;

        let mut events = Vec::new();
        if self.binder.on_removed(id, &mut self.loop_model) {
            info!(id, "active step removed; looping off");
            self.watcher.rearm();
            events.push(Event::LoopChanged(self.loop_snapshot()));
        }
        events.push(self.bookmarks_event());
        Ok(events)
    }

    fn activate_bookmark(&mut self, id: BookmarkId) -> Result<Vec<Event>> {
        let range = self
            .binder
            .activate(id, &self.store, &mut self.loop_model)?;
        self.watcher.rearm();
        info!(id, start = range.start, end = range.end, "step activated");

        let mut events = vec![
            Event::LoopChanged(self.loop_snapshot()),
            self.bookmarks_event(),
        ];
        events.extend(self.request_seek(range.start));

        if !self.playback.is_playing() {
            match self.playback.play() {
                Ok(()) => events.push(self.playback_event()),
                Err(error) => {
                    warn!(%error, id, "step playback did not start");
                    events.push(Event::Error(EngineErrorEvent::from_error(&error)));
                }
            }
        }
        Ok(events)
    }

    fn import_bookmarks(&mut self, path: PathBuf) -> Result<Vec<Event>> {
        let records = match load_records_from_path(&path) {
            Ok(records) => records,
            Err(error) => {
                warn!(path = ?path, %error, "step import rejected");
                return Err(error);
            }
        };
        let count = records.len();
        self.store.replace_all(records)?;
        self.binder.deactivate();

        info!(path = ?path, count, "steps imported");
        Ok(vec![self.bookmarks_event()])
    }

    /// Routes an accepted range edit to observers. Rejected edits are silent.
    fn loop_edited(&mut self, accepted: Option<LoopRange>) -> Vec<Event> {
        let Some(range) = accepted else {
            return Vec::new();
        };

        self.watcher.rearm();
        let mut events = vec![Event::LoopChanged(self.loop_snapshot())];
        match self.binder.mirror(range, &mut self.store) {
            Ok(true) => events.push(self.bookmarks_event()),
            Ok(false) => {}
            Err(error) => {
                warn!(%error, "bound step vanished; unbinding");
                self.binder.deactivate();
                events.push(self.bookmarks_event());
            }
        }
        events
    }

    fn request_seek(&mut self, seconds: f64) -> Vec<Event> {
        self.playback.seek(seconds);
        self.watcher.rearm();
        vec![Event::SeekRequested {
            seconds: self.playback.position(),
        }]
    }

    fn ensure_loaded(&self) -> Result<f64> {
        self.loop_model.duration().ok_or(EngineError::MediaNotLoaded)
    }

    fn playback_event(&self) -> Event {
        Event::PlaybackChanged {
            playing: self.playback.is_playing(),
            rate: self.playback.rate(),
        }
    }

    fn bookmarks_event(&self) -> Event {
        Event::BookmarksChanged(BookmarksSnapshot {
            bookmarks: self.store.list().to_vec(),
            active: self.binder.active(),
        })
    }
}

impl Session<ClockPlayer, FfmpegMediaBackend> {
    /// Creates a session wired to the software clock and the FFmpeg probe.
    pub fn with_ffmpeg() -> Self {
        Self::new(
            ClockPlayer::new(),
            FfmpegMediaBackend,
            SessionSettings::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use super::{Command, EngineErrorKind, Event, Session, SessionSettings};
    use crate::drag::{Handle, PointerTarget};
    use crate::error::EngineError;
    use crate::looping::LoopRange;
    use crate::playback::{ClockPlayer, MediaBackend, PlaybackEngine, ProbedMedia};
    use crate::time::TrackGeometry;

    const TRACK: TrackGeometry = TrackGeometry {
        left: 0.0,
        width: 600.0,
    };

    fn session_with(duration: f64) -> Session<ClockPlayer, FixedProbe> {
        let mut session = Session::new(
            ClockPlayer::new(),
            FixedProbe { duration },
            SessionSettings::default(),
        );
        session
            .handle_command(Command::LoadSource {
                path: PathBuf::from("routine.mp4"),
            })
            .expect("load should succeed");
        session
    }

    /// x coordinate of `seconds` on a 600px track over a 60s video.
    fn x_at(seconds: f64) -> f32 {
        (seconds * 10.0) as f32
    }

    #[test]
    fn load_emits_source_and_full_range_loop() {
        let mut session = Session::new(
            ClockPlayer::new(),
            FixedProbe { duration: 60.0 },
            SessionSettings::default(),
        );
        let events = session
            .handle_command(Command::LoadSource {
                path: PathBuf::from("routine.mp4"),
            })
            .expect("load should succeed");

        let Event::SourceLoaded(source) = &events[0] else {
            panic!("first event must be SourceLoaded");
        };
        assert_eq!(source.duration_seconds, 60.0);
        assert!(events.iter().any(|event| matches!(
            event,
            Event::LoopChanged(snapshot)
                if snapshot.range == LoopRange::new(0.0, 60.0) && !snapshot.looping
        )));
    }

    #[test]
    fn commands_before_load_are_inert_or_rejected() {
        let mut session = Session::new(
            ClockPlayer::new(),
            FixedProbe { duration: 60.0 },
            SessionSettings::default(),
        );

        assert!(
            session
                .handle_command(Command::ToggleLooping)
                .expect("inert")
                .is_empty()
        );
        assert!(session
            .handle_command(Command::PositionChanged { seconds: 3.0 })
            .expect("inert")
            .is_empty());
        assert!(session
            .handle_command(Command::PointerDown {
                target: PointerTarget::Handle(Handle::LoopStart),
                x: 10.0,
                track: TRACK,
            })
            .expect("inert")
            .is_empty());
        assert!(matches!(
            session.handle_command(Command::Play),
            Err(EngineError::MediaNotLoaded)
        ));
    }

    #[test]
    fn track_click_seeks_without_capturing() {
        let mut session = session_with(60.0);
        let events = session
            .handle_command(Command::PointerDown {
                target: PointerTarget::Track,
                x: x_at(12.0),
                track: TRACK,
            })
            .expect("click should succeed");

        assert_eq!(events, vec![Event::SeekRequested { seconds: 12.0 }]);
        assert_eq!(session.drag_state().captured(), None);
    }

    #[test]
    fn playhead_drag_seeks_and_leaves_loop_alone() {
        let mut session = session_with(60.0);
        session
            .handle_command(Command::PointerDown {
                target: PointerTarget::Handle(Handle::Playhead),
                x: 0.0,
                track: TRACK,
            })
            .expect("pointer down");
        let events = session
            .handle_command(Command::PointerMove {
                x: x_at(30.0),
                track: TRACK,
            })
            .expect("pointer move");

        assert_eq!(events, vec![Event::SeekRequested { seconds: 30.0 }]);
        assert_eq!(session.loop_snapshot().range, LoopRange::new(0.0, 60.0));
    }

    #[test]
    fn release_outside_track_still_ends_capture() {
        let mut session = session_with(60.0);
        session
            .handle_command(Command::PointerDown {
                target: PointerTarget::Handle(Handle::LoopEnd),
                x: x_at(60.0),
                track: TRACK,
            })
            .expect("pointer down");
        session
            .handle_command(Command::PointerMove {
                x: 9_000.0,
                track: TRACK,
            })
            .expect("pointer move outside track");

        let events = session
            .handle_command(Command::PointerCancel)
            .expect("cancel");
        assert_eq!(events, vec![Event::DragChanged { captured: None }]);
        assert_eq!(session.drag_state().captured(), None);
    }

    #[test]
    fn set_rate_rejects_non_positive_values() {
        let mut session = session_with(60.0);
        assert!(matches!(
            session.handle_command(Command::SetRate { rate: 0.0 }),
            Err(EngineError::InvalidRate { .. })
        ));
        let events = session
            .handle_command(Command::SetRate { rate: 0.75 })
            .expect("rate accepted");
        assert_eq!(
            events,
            vec![Event::PlaybackChanged {
                playing: false,
                rate: 0.75
            }]
        );
    }

    #[test]
    fn set_start_to_current_past_end_is_ignored() {
        let mut session = session_with(60.0);
        session
            .handle_command(Command::Seek { seconds: 20.0 })
            .expect("seek");
        session
            .handle_command(Command::SetLoopEndToCurrent)
            .expect("set end");
        session
            .handle_command(Command::Seek { seconds: 25.0 })
            .expect("seek");

        let events = session
            .handle_command(Command::SetLoopStartToCurrent)
            .expect("set start is not an error");
        assert!(events.is_empty());
        assert_eq!(session.loop_snapshot().range, LoopRange::new(0.0, 20.0));
    }

    #[test]
    fn tick_wraps_playback_inside_loop() {
        let mut session = session_with(60.0);
        session
            .handle_command(Command::Seek { seconds: 2.0 })
            .expect("seek");
        session
            .handle_command(Command::SetLoopStartToCurrent)
            .expect("set start");
        session
            .handle_command(Command::Seek { seconds: 3.0 })
            .expect("seek");
        session
            .handle_command(Command::SetLoopEndToCurrent)
            .expect("set end");
        session.handle_command(Command::ToggleLooping).expect("toggle");
        session.handle_command(Command::Play).expect("play");

        let mut seeks = Vec::new();
        for _ in 0..12 {
            let events = session
                .handle_command(Command::Tick {
                    elapsed: Duration::from_millis(250),
                })
                .expect("tick");
            seeks.extend(events.into_iter().filter_map(|event| match event {
                Event::SeekRequested { seconds } => Some(seconds),
                _ => None,
            }));
            assert!(session.playback().position() <= 3.0);
        }

        assert!(!seeks.is_empty());
        assert!(seeks.iter().all(|seconds| *seconds == 2.0));
    }

    #[test]
    fn loop_ending_at_media_end_resumes_after_wrap() {
        let mut session = session_with(1.0);
        session.handle_command(Command::ToggleLooping).expect("toggle");
        session.handle_command(Command::Play).expect("play");

        for _ in 0..4 {
            session
                .handle_command(Command::Tick {
                    elapsed: Duration::from_millis(300),
                })
                .expect("tick");
        }
        let events = session
            .handle_command(Command::Tick {
                elapsed: Duration::from_millis(300),
            })
            .expect("tick");

        assert!(session.playback().is_playing());
        assert!(!events.is_empty());
    }

    #[test]
    fn blocked_play_surfaces_error_kind() {
        let mut session = session_with(60.0);
        session.playback_mut().set_autoplay_blocked(true);

        let error = session
            .handle_command(Command::Play)
            .expect_err("play must fail");
        assert_eq!(EngineErrorKind::from(&error), EngineErrorKind::PlaybackBlocked);
        assert!(!session.playback().is_playing());
    }

    #[test]
    fn metadata_ready_rejects_zero_duration_and_keeps_state() {
        let mut session = session_with(60.0);
        session
            .handle_command(Command::Seek { seconds: 10.0 })
            .expect("seek");
        session
            .handle_command(Command::SetLoopStartToCurrent)
            .expect("set start");

        let result = session.handle_command(Command::MetadataReady { duration: 0.0 });
        assert!(matches!(result, Err(EngineError::InvalidDuration { .. })));
        assert_eq!(session.loop_snapshot().range, LoopRange::new(10.0, 60.0));
    }

    #[derive(Debug, Clone, Copy)]
    struct FixedProbe {
        duration: f64,
    }

    impl MediaBackend for FixedProbe {
        fn probe(&self, path: &Path) -> crate::Result<ProbedMedia> {
            Ok(ProbedMedia {
                path: path.to_path_buf(),
                duration_seconds: self.duration,
                width: Some(640),
                height: Some(360),
            })
        }
    }
}
