use iced::widget::canvas::{self, Path, Stroke};
use iced::widget::container;
use iced::{Color, Element, Length, Point, Rectangle, Size, Theme, mouse};
use loop_engine::time::to_fraction;
use loop_engine::{Command, Handle, LoopRange, PointerTarget, TrackGeometry};

/// Horizontal distance in pixels within which a press grabs a handle.
pub const HANDLE_HIT_RADIUS: f32 = 8.0;

/// Empty margin at both ends of the strip so edge handles stay grabbable.
const TRACK_INSET: f32 = 10.0;
const STRIP_HEIGHT: f32 = 64.0;

/// Everything the strip needs to draw one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineModel {
    pub duration: f64,
    pub position: f64,
    pub range: LoopRange,
    pub looping: bool,
    pub captured: Option<Handle>,
}

impl TimelineModel {
    /// Pixel x of `handle` on `track`.
    fn handle_x(&self, handle: Handle, track: TrackGeometry) -> f32 {
        let time = match handle {
            Handle::Playhead => self.position,
            Handle::LoopStart => self.range.start,
            Handle::LoopEnd => self.range.end,
        };
        track.left + to_fraction(time, self.duration) as f32 * track.width
    }

    /// Picks the handle under a press, or the bare track.
    ///
    /// The nearest handle within [`HANDLE_HIT_RADIUS`] wins. On a tie the lower
    /// half of the strip favors loop handles and the upper half the playhead,
    /// matching where each handle is drawn.
    fn hit_test(&self, x: f32, in_lower_half: bool, track: TrackGeometry) -> PointerTarget {
        let order = if in_lower_half {
            [Handle::LoopStart, Handle::LoopEnd, Handle::Playhead]
        } else {
            [Handle::Playhead, Handle::LoopStart, Handle::LoopEnd]
        };

        let mut best: Option<(Handle, f32)> = None;
        for handle in order {
            let distance = (self.handle_x(handle, track) - x).abs();
            if distance > HANDLE_HIT_RADIUS {
                continue;
            }
            if best.is_none_or(|(_, nearest)| distance < nearest) {
                best = Some((handle, distance));
            }
        }

        match best {
            Some((handle, _)) => PointerTarget::Handle(handle),
            None => PointerTarget::Track,
        }
    }
}

/// Pointer input from the strip, in widget-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerInput {
    Down {
        target: PointerTarget,
        x: f32,
        track: TrackGeometry,
    },
    Move {
        x: f32,
        track: TrackGeometry,
    },
    Up,
    Cancel,
}

impl PointerInput {
    pub fn into_command(self) -> Command {
        match self {
            Self::Down { target, x, track } => Command::PointerDown { target, x, track },
            Self::Move { x, track } => Command::PointerMove { x, track },
            Self::Up => Command::PointerUp,
            Self::Cancel => Command::PointerCancel,
        }
    }
}

fn track_for(bounds: Rectangle) -> TrackGeometry {
    TrackGeometry::new(TRACK_INSET, (bounds.width - 2.0 * TRACK_INSET).max(0.0))
}

#[derive(Debug, Default)]
struct TimelineState {
    holding_handle: bool,
}

#[derive(Debug)]
struct TimelineProgram<'a, Message> {
    model: Option<TimelineModel>,
    cache: &'a canvas::Cache,
    on_pointer: fn(PointerInput) -> Message,
}

impl<Message> canvas::Program<Message> for TimelineProgram<'_, Message> {
    type State = TimelineState;

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        let Some(model) = self.model else {
            return (canvas::event::Status::Ignored, None);
        };
        let track = track_for(bounds);

        match event {
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                let Some(local) = cursor.position_in(bounds) else {
                    return (canvas::event::Status::Ignored, None);
                };
                let target = model.hit_test(local.x, local.y >= bounds.height / 2.0, track);
                state.holding_handle = matches!(target, PointerTarget::Handle(_));
                let input = PointerInput::Down {
                    target,
                    x: local.x,
                    track,
                };
                (canvas::event::Status::Captured, Some((self.on_pointer)(input)))
            }
            // Moves and releases are tracked outside the bounds while a handle is held.
            canvas::Event::Mouse(mouse::Event::CursorMoved { position })
                if state.holding_handle =>
            {
                let input = PointerInput::Move {
                    x: position.x - bounds.x,
                    track,
                };
                (canvas::event::Status::Captured, Some((self.on_pointer)(input)))
            }
            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left))
                if state.holding_handle =>
            {
                state.holding_handle = false;
                (
                    canvas::event::Status::Captured,
                    Some((self.on_pointer)(PointerInput::Up)),
                )
            }
            canvas::Event::Mouse(mouse::Event::CursorLeft) if state.holding_handle => {
                state.holding_handle = false;
                (
                    canvas::event::Status::Captured,
                    Some((self.on_pointer)(PointerInput::Cancel)),
                )
            }
            _ => (canvas::event::Status::Ignored, None),
        }
    }

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &iced::Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        let track = track_for(bounds);
        let background = self.cache.draw(renderer, bounds.size(), |frame| {
            let backdrop = Path::rectangle(Point::ORIGIN, frame.size());
            frame.fill(&backdrop, Color::from_rgb8(22, 24, 29));

            let rail = Path::rectangle(
                Point::new(track.left, bounds.height / 2.0 - 2.0),
                Size::new(track.width.max(1.0), 4.0),
            );
            frame.fill(&rail, Color::from_rgb8(60, 64, 72));
        });

        let mut overlay = canvas::Frame::new(renderer, bounds.size());
        if let Some(model) = self.model {
            let start_x = model.handle_x(Handle::LoopStart, track);
            let end_x = model.handle_x(Handle::LoopEnd, track);
            let region_color = if model.looping {
                Color::from_rgba8(55, 110, 188, 0.55)
            } else {
                Color::from_rgba8(120, 120, 130, 0.35)
            };
            let region = Path::rectangle(
                Point::new(start_x, 8.0),
                Size::new((end_x - start_x).max(1.0), (bounds.height - 16.0).max(1.0)),
            );
            overlay.fill(&region, region_color);

            for handle in [Handle::LoopStart, Handle::LoopEnd] {
                let x = model.handle_x(handle, track);
                let knob = Path::rectangle(
                    Point::new(x - 3.0, bounds.height / 2.0),
                    Size::new(6.0, (bounds.height / 2.0 - 4.0).max(1.0)),
                );
                overlay.fill(&knob, handle_color(model.captured == Some(handle)));
            }

            let x = model.handle_x(Handle::Playhead, track);
            let line = Path::line(Point::new(x, 0.0), Point::new(x, bounds.height));
            overlay.stroke(
                &line,
                Stroke::default()
                    .with_width(2.0)
                    .with_color(Color::from_rgb8(255, 94, 77)),
            );
            let knob = Path::circle(Point::new(x, 6.0), 5.0);
            overlay.fill(&knob, Color::from_rgb8(255, 94, 77));
        }

        vec![background, overlay.into_geometry()]
    }

    fn mouse_interaction(
        &self,
        state: &Self::State,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> mouse::Interaction {
        let Some(model) = self.model else {
            return mouse::Interaction::None;
        };
        if state.holding_handle {
            return mouse::Interaction::Grabbing;
        }
        let Some(local) = cursor.position_in(bounds) else {
            return mouse::Interaction::None;
        };

        match model.hit_test(local.x, local.y >= bounds.height / 2.0, track_for(bounds)) {
            PointerTarget::Handle(_) => mouse::Interaction::Grab,
            PointerTarget::Track => mouse::Interaction::Pointer,
        }
    }
}

fn handle_color(captured: bool) -> Color {
    if captured {
        Color::from_rgb8(250, 214, 92)
    } else {
        Color::from_rgb8(230, 232, 236)
    }
}

/// Renders the interactive loop strip. `None` draws an empty, inert strip.
pub fn view<'a, Message>(
    model: Option<TimelineModel>,
    cache: &'a canvas::Cache,
    on_pointer: fn(PointerInput) -> Message,
) -> Element<'a, Message>
where
    Message: 'a,
{
    container(
        canvas::Canvas::new(TimelineProgram {
            model,
            cache,
            on_pointer,
        })
        .width(Length::Fill)
        .height(Length::Fixed(STRIP_HEIGHT)),
    )
    .width(Length::Fill)
    .into()
}
