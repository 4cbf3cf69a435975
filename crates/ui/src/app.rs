use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc::TrySendError;

use iced::widget::{Column, button, canvas, column, row, scrollable, text, text_input};
use iced::{Element, Length, Subscription, Task};
use loop_engine::{
    Bookmark, BookmarkId, Command, Event, Handle, LoopSnapshot, SourceSummary, format_time,
};
use tracing::warn;

use crate::bridge::{BridgeEvent, SessionCommandSender, session_subscription};
use crate::widgets::timeline::{self, PointerInput, TimelineModel};

/// Playback speeds offered as one-click presets.
const RATE_PRESETS: [f64; 3] = [0.5, 0.75, 1.0];

/// UI messages handled by the iced app update loop.
#[derive(Debug, Clone)]
pub enum Message {
    SourcePathChanged(String),
    LoadPressed,
    PlayPausePressed,
    RateSelected(f64),
    SetStartPressed,
    SetEndPressed,
    LoopToggled,
    Pointer(PointerInput),
    AddStepPressed,
    StepPlayPressed(BookmarkId),
    StepDeletePressed(BookmarkId),
    StepRenameStarted(BookmarkId),
    StepNameChanged(String),
    StepRenameSubmitted,
    StepsPathChanged(String),
    ExportPressed,
    ImportPressed,
    Bridge(BridgeEvent),
}

/// Root UI state.
pub struct AppState {
    session_tx: Option<SessionCommandSender>,
    source: Option<SourceSummary>,
    position: f64,
    loop_snapshot: Option<LoopSnapshot>,
    captured: Option<Handle>,
    playing: bool,
    rate: f64,
    steps: Vec<Bookmark>,
    active_step: Option<BookmarkId>,
    renaming: Option<(BookmarkId, String)>,
    /// Pointer presses and releases that found the command queue full, oldest first.
    deferred_pointer: VecDeque<Command>,
    source_path: String,
    steps_path: String,
    timeline_cache: canvas::Cache,
    status: String,
}

impl AppState {
    /// Boots the app; the session bridge starts with the subscription.
    pub fn boot() -> (Self, Task<Message>) {
        (
            Self::with_sender(None, String::from("starting session bridge")),
            Task::none(),
        )
    }

    fn with_sender(session_tx: Option<SessionCommandSender>, status: String) -> Self {
        Self {
            session_tx,
            source: None,
            position: 0.0,
            loop_snapshot: None,
            captured: None,
            playing: false,
            rate: 1.0,
            steps: Vec::new(),
            active_step: None,
            renaming: None,
            deferred_pointer: VecDeque::new(),
            source_path: String::new(),
            steps_path: String::new(),
            timeline_cache: canvas::Cache::new(),
            status,
        }
    }

    /// Handles one UI message.
    pub fn update(&mut self, message: Message) -> Task<Message> {
        self.flush_deferred_pointer();

        match message {
            Message::SourcePathChanged(path) => {
                self.source_path = path;
            }
            Message::LoadPressed => {
                let path = self.source_path.trim().to_owned();
                if path.is_empty() {
                    self.status = String::from("video path is empty");
                } else if self.send_command(Command::LoadSource {
                    path: PathBuf::from(&path),
                }) {
                    self.status = format!("loading {path}");
                }
            }
            Message::PlayPausePressed => {
                self.send_command(Command::TogglePlayback);
            }
            Message::RateSelected(rate) => {
                self.send_command(Command::SetRate { rate });
            }
            Message::SetStartPressed => {
                self.send_command(Command::SetLoopStartToCurrent);
            }
            Message::SetEndPressed => {
                self.send_command(Command::SetLoopEndToCurrent);
            }
            Message::LoopToggled => {
                self.send_command(Command::ToggleLooping);
            }
            Message::Pointer(input) => {
                self.send_pointer(input.into_command());
            }
            Message::AddStepPressed => {
                self.send_command(Command::AddBookmark);
            }
            Message::StepPlayPressed(id) => {
                self.send_command(Command::ActivateBookmark { id });
            }
            Message::StepDeletePressed(id) => {
                if self.renaming.as_ref().is_some_and(|(editing, _)| *editing == id) {
                    self.renaming = None;
                }
                self.send_command(Command::RemoveBookmark { id });
            }
            Message::StepRenameStarted(id) => {
                if let Some(step) = self.steps.iter().find(|step| step.id == id) {
                    self.renaming = Some((id, step.name.clone()));
                }
            }
            Message::StepNameChanged(name) => {
                if let Some((_, draft)) = self.renaming.as_mut() {
                    *draft = name;
                }
            }
            Message::StepRenameSubmitted => {
                if let Some((id, name)) = self.renaming.take() {
                    let name = name.trim().to_owned();
                    if name.is_empty() {
                        self.status = String::from("step name is empty");
                    } else {
                        self.send_command(Command::RenameBookmark { id, name });
                    }
                }
            }
            Message::StepsPathChanged(path) => {
                self.steps_path = path;
            }
            Message::ExportPressed => {
                if let Some(path) = self.steps_path_or_status() {
                    self.send_command(Command::ExportBookmarks { path });
                }
            }
            Message::ImportPressed => {
                if let Some(path) = self.steps_path_or_status() {
                    if self.send_command(Command::ImportBookmarks { path: path.clone() }) {
                        self.status = format!("importing steps from {}", path.display());
                    }
                }
            }
            Message::Bridge(BridgeEvent::Ready(sender)) => {
                self.session_tx = Some(sender);
                self.status = String::from("ready");
            }
            Message::Bridge(BridgeEvent::Event(event)) => {
                self.apply_session_event(event);
            }
            Message::Bridge(BridgeEvent::Disconnected) => {
                warn!("session event channel closed");
                self.status = String::from("session event channel closed");
                self.session_tx = None;
                self.deferred_pointer.clear();
            }
        }

        Task::none()
    }

    fn steps_path_or_status(&mut self) -> Option<PathBuf> {
        let path = self.steps_path.trim();
        if path.is_empty() {
            self.status = String::from("steps file path is empty");
            return None;
        }
        Some(PathBuf::from(path))
    }

    fn send_command(&mut self, command: Command) -> bool {
        let Some(sender) = &self.session_tx else {
            self.status = String::from("session is not ready");
            return false;
        };

        match sender.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.status = String::from("session command queue is full");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.status = String::from("session command channel closed");
                self.session_tx = None;
                false
            }
        }
    }

    /// Sends pointer input. Moves that find the queue full are dropped; the next
    /// one supersedes them. Presses and releases are deferred, since a lost
    /// release would leave the session capturing a handle.
    fn send_pointer(&mut self, command: Command) {
        let is_move = matches!(command, Command::PointerMove { .. });
        if !self.deferred_pointer.is_empty() {
            if !is_move {
                self.deferred_pointer.push_back(command);
            }
            return;
        }

        let Some(sender) = &self.session_tx else {
            self.status = String::from("session is not ready");
            return;
        };
        match sender.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => {
                if !is_move {
                    self.deferred_pointer.push_back(command);
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                self.status = String::from("session command channel closed");
                self.session_tx = None;
            }
        }
    }

    fn flush_deferred_pointer(&mut self) {
        while let Some(command) = self.deferred_pointer.pop_front() {
            let Some(sender) = &self.session_tx else {
                self.deferred_pointer.clear();
                return;
            };
            match sender.try_send(command) {
                Ok(()) => {}
                Err(TrySendError::Full(command)) => {
                    self.deferred_pointer.push_front(command);
                    return;
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.status = String::from("session command channel closed");
                    self.session_tx = None;
                    self.deferred_pointer.clear();
                    return;
                }
            }
        }
    }

    fn apply_session_event(&mut self, event: Event) {
        match event {
            Event::SourceLoaded(source) => {
                self.status = match &source.path {
                    Some(path) => format!("loaded {}", path.display()),
                    None => String::from("video loaded"),
                };
                self.position = 0.0;
                self.renaming = None;
                self.source = Some(source);
            }
            Event::PositionChanged { seconds } | Event::SeekRequested { seconds } => {
                self.position = seconds;
            }
            Event::LoopChanged(snapshot) => {
                self.loop_snapshot = Some(snapshot);
            }
            Event::DragChanged { captured } => {
                self.captured = captured;
            }
            Event::PlaybackChanged { playing, rate } => {
                self.playing = playing;
                self.rate = rate;
            }
            Event::BookmarksChanged(snapshot) => {
                self.steps = snapshot.bookmarks;
                self.active_step = snapshot.active;
            }
            Event::BookmarksExported { path, count } => {
                self.status = format!("exported {count} steps to {}", path.display());
            }
            Event::Error(error) => {
                self.status = format!("error: {}", error.message);
            }
        }
    }

    fn timeline_model(&self) -> Option<TimelineModel> {
        let source = self.source.as_ref()?;
        let snapshot = self.loop_snapshot?;
        Some(TimelineModel {
            duration: source.duration_seconds,
            position: self.position,
            range: snapshot.range,
            looping: snapshot.looping,
            captured: self.captured,
        })
    }

    /// Renders the UI tree.
    pub fn view(&self) -> Element<'_, Message> {
        let source_row = row![
            text_input("video path", &self.source_path)
                .on_input(Message::SourcePathChanged)
                .on_submit(Message::LoadPressed),
            button("Load").on_press(Message::LoadPressed),
        ]
        .spacing(12);

        let duration = self
            .source
            .as_ref()
            .map(|source| source.duration_seconds)
            .unwrap_or(0.0);
        let mut transport = row![
            button(if self.playing { "Pause" } else { "Play" }).on_press(Message::PlayPausePressed),
            text(format!(
                "{} / {}",
                format_time(self.position),
                format_time(duration)
            )),
        ]
        .spacing(12);
        for preset in RATE_PRESETS {
            let label = if preset == self.rate {
                format!("[{preset}x]")
            } else {
                format!("{preset}x")
            };
            transport = transport.push(button(text(label)).on_press(Message::RateSelected(preset)));
        }

        let (loop_label, loop_range) = match self.loop_snapshot {
            Some(snapshot) => (
                if snapshot.looping { "Loop: on" } else { "Loop: off" },
                format!(
                    "{} to {}",
                    format_time(snapshot.range.start),
                    format_time(snapshot.range.end)
                ),
            ),
            None => ("Loop: off", String::from("no loop")),
        };
        let loop_row = row![
            button("Set start").on_press(Message::SetStartPressed),
            button("Set end").on_press(Message::SetEndPressed),
            button(loop_label).on_press(Message::LoopToggled),
            text(loop_range),
            button("Save step").on_press(Message::AddStepPressed),
        ]
        .spacing(12);

        let steps_row = row![
            text_input("steps file (.json)", &self.steps_path).on_input(Message::StepsPathChanged),
            button("Export").on_press(Message::ExportPressed),
            button("Import").on_press(Message::ImportPressed),
        ]
        .spacing(12);

        column![
            source_row,
            timeline::view(self.timeline_model(), &self.timeline_cache, Message::Pointer),
            transport,
            loop_row,
            scrollable(self.step_list()).height(Length::Fill),
            steps_row,
            text(format!("Status: {}", self.status)),
        ]
        .spacing(12)
        .padding(16)
        .into()
    }

    fn step_list(&self) -> Column<'_, Message> {
        let rows = self.steps.iter().map(|step| -> Element<'_, Message> {
            let marker = if self.active_step == Some(step.id) {
                "> "
            } else {
                "  "
            };
            let range = text(format!(
                "{} to {}",
                format_time(step.range.start),
                format_time(step.range.end)
            ));

            let name: Element<'_, Message> = match &self.renaming {
                Some((id, draft)) if *id == step.id => text_input("step name", draft)
                    .on_input(Message::StepNameChanged)
                    .on_submit(Message::StepRenameSubmitted)
                    .width(Length::Fixed(200.0))
                    .into(),
                _ => text(format!("{marker}{}", step.name))
                    .width(Length::Fixed(200.0))
                    .into(),
            };

            row![
                name,
                range,
                button("Play").on_press(Message::StepPlayPressed(step.id)),
                button("Rename").on_press(Message::StepRenameStarted(step.id)),
                button("Delete").on_press(Message::StepDeletePressed(step.id)),
            ]
            .spacing(12)
            .into()
        });

        Column::with_children(rows).spacing(6)
    }

    /// Subscribes to bridge events emitted by the session worker thread.
    pub fn subscription(&self) -> Subscription<Message> {
        session_subscription().map(Message::Bridge)
    }

    #[cfg(test)]
    fn from_sender_for_test(session_tx: SessionCommandSender) -> Self {
        Self::with_sender(Some(session_tx), String::from("idle"))
    }
}
