use tracing::debug;

/// The three draggable handles on the timeline strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    Playhead,
    LoopStart,
    LoopEnd,
}

/// Where a pointer-down landed on the strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    Handle(Handle),
    /// Track background: a click seeks once and never starts a drag.
    Track,
}

/// Edit requested by one pointer-move sample during a capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragAction {
    Seek(f64),
    MoveStart(f64),
    MoveEnd(f64),
}

/// Pointer capture slot. At most one handle is captured at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Capturing(Handle),
}

impl DragState {
    /// Returns the captured handle, if a drag is in progress.
    pub fn captured(&self) -> Option<Handle> {
        match self {
            Self::Idle => None,
            Self::Capturing(handle) => Some(*handle),
        }
    }

    /// Starts capturing `handle`.
    ///
    /// Returns `false` and keeps the current capture when a drag is already in
    /// progress. Nothing is mutated until the first move sample arrives.
    pub fn begin(&mut self, handle: Handle) -> bool {
        if let Self::Capturing(current) = self {
            debug!(?current, ignored = ?handle, "pointer-down ignored: capture in progress");
            return false;
        }

        *self = Self::Capturing(handle);
        true
    }

    /// Ends the capture unconditionally and returns the released handle.
    pub fn release(&mut self) -> Option<Handle> {
        let released = self.captured();
        *self = Self::Idle;
        released
    }

    /// Routes a move sample, already mapped to seconds, to the captured handle.
    pub fn action_for(&self, time: f64) -> Option<DragAction> {
        match self {
            Self::Idle => None,
            Self::Capturing(Handle::Playhead) => Some(DragAction::Seek(time)),
            Self::Capturing(Handle::LoopStart) => Some(DragAction::MoveStart(time)),
            Self::Capturing(Handle::LoopEnd) => Some(DragAction::MoveEnd(time)),
        }
    }
}
