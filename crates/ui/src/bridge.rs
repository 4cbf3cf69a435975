use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use iced::futures::{SinkExt, StreamExt, channel::mpsc as futures_mpsc, executor};
use iced::{Subscription, stream};
use loop_engine::{Command, EngineErrorEvent, Event, MediaBackend, PlaybackEngine, Session};
use tracing::debug;

const COMMAND_CHANNEL_CAPACITY: usize = 64;
const EVENT_CHANNEL_CAPACITY: usize = 32;
const SUBSCRIPTION_CHANNEL_CAPACITY: usize = 32;

/// Cadence of playback clock updates while no command is pending.
pub const TICK_INTERVAL: Duration = Duration::from_millis(33);

/// Sender used by the UI thread to dispatch commands to the session thread.
pub type SessionCommandSender = mpsc::SyncSender<Command>;

/// Receiver used by the UI thread to read events emitted by the session thread.
pub type SessionEventReceiver = mpsc::Receiver<Event>;

/// Messages emitted by the session bridge subscription.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    Ready(SessionCommandSender),
    Event(Event),
    Disconnected,
}

/// Builds a subscription that starts the session bridge and forwards events.
pub fn session_subscription() -> Subscription<BridgeEvent> {
    Subscription::run(bridge_worker_stream)
}

fn bridge_worker_stream() -> impl iced::futures::Stream<Item = BridgeEvent> {
    bridge_worker_stream_with(spawn_ffmpeg_bridge)
}

/// Announces the session's command sender, then relays session events until
/// the session thread exits.
fn bridge_worker_stream_with(
    spawn_bridge: fn() -> (SessionCommandSender, SessionEventReceiver),
) -> impl iced::futures::Stream<Item = BridgeEvent> {
    stream::channel(
        SUBSCRIPTION_CHANNEL_CAPACITY,
        move |mut output| async move {
            let (session_tx, session_rx) = spawn_bridge();
            let _ = output.send(BridgeEvent::Ready(session_tx)).await;

            let (forward_tx, mut forward_rx) =
                futures_mpsc::channel::<BridgeEvent>(SUBSCRIPTION_CHANNEL_CAPACITY);

            // Blocks on a slow UI. The session's event channel then fills and
            // the session thread stalls, ticks included, until the UI catches up.
            thread::spawn(move || {
                let mut forward_tx = forward_tx;
                while let Ok(event) = session_rx.recv() {
                    if executor::block_on(forward_tx.send(BridgeEvent::Event(event))).is_err() {
                        return;
                    }
                }
                let _ = executor::block_on(forward_tx.send(BridgeEvent::Disconnected));
            });

            while let Some(event) = forward_rx.next().await {
                if output.send(event).await.is_err() {
                    break;
                }
            }
        },
    )
}

/// Spawns the production bridge: software clock plus the FFmpeg probe.
pub fn spawn_ffmpeg_bridge() -> (SessionCommandSender, SessionEventReceiver) {
    spawn_session_bridge(Session::with_ffmpeg())
}

/// Spawns a bridge around any session.
///
/// Commands are applied in arrival order, interleaved with a `Tick` every
/// [`TICK_INTERVAL`].
pub fn spawn_session_bridge<P, M>(
    mut session: Session<P, M>,
) -> (SessionCommandSender, SessionEventReceiver)
where
    P: PlaybackEngine + Send + 'static,
    M: MediaBackend + Send + 'static,
{
    let (command_tx, command_rx) = mpsc::sync_channel::<Command>(COMMAND_CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::sync_channel::<Event>(EVENT_CHANNEL_CAPACITY);

    thread::spawn(move || {
        let mut queue = CommandQueue::new(command_rx);
        let mut last_tick = Instant::now();

        loop {
            let wait = TICK_INTERVAL.saturating_sub(last_tick.elapsed());
            let received = if wait.is_zero() {
                Err(RecvTimeoutError::Timeout)
            } else {
                queue.next(wait)
            };
            let command = match received {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last_tick);
                    last_tick = now;
                    Command::Tick { elapsed }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("session bridge closed");
                    return;
                }
            };

            if !deliver(session.handle_command(command), &event_tx) {
                return;
            }
        }
    });

    (command_tx, event_rx)
}

fn deliver(result: loop_engine::Result<Vec<Event>>, event_tx: &mpsc::SyncSender<Event>) -> bool {
    match result {
        Ok(events) => events.into_iter().all(|event| event_tx.send(event).is_ok()),
        Err(error) => event_tx
            .send(Event::Error(EngineErrorEvent::from_error(&error)))
            .is_ok(),
    }
}

/// Command receiver that folds runs of queued pointer moves into the last one.
struct CommandQueue {
    receiver: mpsc::Receiver<Command>,
    held: Option<Command>,
}

impl CommandQueue {
    fn new(receiver: mpsc::Receiver<Command>) -> Self {
        Self {
            receiver,
            held: None,
        }
    }

    fn next(&mut self, timeout: Duration) -> Result<Command, RecvTimeoutError> {
        let command = match self.held.take() {
            Some(command) => command,
            None => self.receiver.recv_timeout(timeout)?,
        };
        if !matches!(command, Command::PointerMove { .. }) {
            return Ok(command);
        }

        let mut latest = command;
        loop {
            match self.receiver.try_recv() {
                Ok(next @ Command::PointerMove { .. }) => latest = next,
                Ok(other) => {
                    self.held = Some(other);
                    break;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use iced::futures::{StreamExt, executor, pin_mut};
    use loop_engine::{
        ClockPlayer, Command, EngineErrorKind, Event, MediaBackend, ProbedMedia, Session,
        SessionSettings, TrackGeometry,
    };

    use super::{BridgeEvent, CommandQueue, bridge_worker_stream_with, spawn_session_bridge};

    const TRACK: TrackGeometry = TrackGeometry {
        left: 0.0,
        width: 100.0,
    };

    #[test]
    fn bridge_forwards_session_events_for_load_command() {
        let (command_tx, event_rx) = spawn_session_bridge(mock_session());

        command_tx
            .send(Command::LoadSource {
                path: PathBuf::from("routine.mp4"),
            })
            .expect("send load command");

        let first = event_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("first event");
        let Event::SourceLoaded(source) = first else {
            panic!("expected Event::SourceLoaded");
        };
        assert_eq!(source.duration_seconds, 90.0);
    }

    #[test]
    fn bridge_emits_error_event_when_command_fails() {
        let (command_tx, event_rx) = spawn_session_bridge(mock_session());

        command_tx.send(Command::Play).expect("send play command");

        let event = event_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("error event");
        let Event::Error(error) = event else {
            panic!("expected Event::Error");
        };
        assert_eq!(error.kind, EngineErrorKind::Other);
        assert!(error.message.contains("no video is loaded"));
    }

    #[test]
    fn bridge_ticks_clock_while_playing() {
        let (command_tx, event_rx) = spawn_session_bridge(mock_session());
        command_tx
            .send(Command::LoadSource {
                path: PathBuf::from("routine.mp4"),
            })
            .expect("send load command");
        command_tx.send(Command::Play).expect("send play command");

        let advanced = (0..200)
            .filter_map(|_| event_rx.recv_timeout(Duration::from_secs(1)).ok())
            .any(|event| matches!(event, Event::PositionChanged { seconds } if seconds > 0.0));
        assert!(advanced, "clock position should advance without commands");
    }

    #[test]
    fn queued_pointer_moves_collapse_to_latest_without_reordering() {
        let (command_tx, command_rx) = mpsc::sync_channel(16);
        for x in [10.0, 20.0, 30.0] {
            command_tx
                .send(Command::PointerMove { x, track: TRACK })
                .expect("send move");
        }
        command_tx.send(Command::PointerUp).expect("send up");
        command_tx
            .send(Command::PointerMove {
                x: 40.0,
                track: TRACK,
            })
            .expect("send move");

        let mut queue = CommandQueue::new(command_rx);
        let timeout = Duration::from_millis(10);

        assert_eq!(
            queue.next(timeout).expect("first"),
            Command::PointerMove {
                x: 30.0,
                track: TRACK
            }
        );
        assert_eq!(queue.next(timeout).expect("second"), Command::PointerUp);
        assert_eq!(
            queue.next(timeout).expect("third"),
            Command::PointerMove {
                x: 40.0,
                track: TRACK
            }
        );
        assert!(queue.next(timeout).is_err());
    }

    #[test]
    fn bridge_worker_stream_emits_ready_forwards_events_and_disconnected() {
        let (bridge_tx, bridge_rx) = mpsc::channel::<BridgeEvent>();

        thread::spawn(move || {
            let stream = bridge_worker_stream_with(spawn_mock_bridge);
            executor::block_on(async move {
                pin_mut!(stream);
                while let Some(event) = stream.next().await {
                    if bridge_tx.send(event).is_err() {
                        break;
                    }
                }
            });
        });

        let ready = bridge_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("ready event");
        let BridgeEvent::Ready(command_tx) = ready else {
            panic!("expected BridgeEvent::Ready");
        };

        command_tx
            .send(Command::LoadSource {
                path: PathBuf::from("routine.mp4"),
            })
            .expect("send load command");

        let first = bridge_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("first forwarded event");
        assert!(matches!(
            first,
            BridgeEvent::Event(Event::SourceLoaded(_))
        ));

        drop(command_tx);

        let disconnected = (0..64)
            .filter_map(|_| bridge_rx.recv_timeout(Duration::from_secs(1)).ok())
            .any(|event| matches!(event, BridgeEvent::Disconnected));
        assert!(disconnected, "expected BridgeEvent::Disconnected");
    }

    fn spawn_mock_bridge() -> (super::SessionCommandSender, super::SessionEventReceiver) {
        spawn_session_bridge(mock_session())
    }

    fn mock_session() -> Session<ClockPlayer, MockBackend> {
        Session::new(ClockPlayer::new(), MockBackend, SessionSettings::default())
    }

    #[derive(Debug, Clone, Copy)]
    struct MockBackend;

    impl MediaBackend for MockBackend {
        fn probe(&self, path: &Path) -> loop_engine::Result<ProbedMedia> {
            Ok(ProbedMedia {
                path: path.to_path_buf(),
                duration_seconds: 90.0,
                width: Some(160),
                height: Some(90),
            })
        }
    }
}
