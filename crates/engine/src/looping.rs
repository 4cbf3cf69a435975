use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};

/// Loop range in seconds. A range is usable only when
/// `0 <= start < end <= duration` holds for the loaded video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopRange {
    pub start: f64,
    pub end: f64,
}

impl LoopRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Checks the range invariant against `duration`.
    pub fn fits_within(&self, duration: f64) -> bool {
        self.start.is_finite()
            && self.end.is_finite()
            && self.start >= 0.0
            && self.start < self.end
            && self.end <= duration
    }
}

/// Loop boundaries and the looping flag for one loaded video.
///
/// Every mutator validates the resulting state and either applies it whole or
/// leaves the model untouched. Range mutators return the new range when they
/// were accepted so observers can mirror the change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopModel {
    duration: Option<f64>,
    range: LoopRange,
    looping: bool,
}

impl LoopModel {
    /// Duration of the loaded video, `None` until metadata arrives.
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn range(&self) -> LoopRange {
        self.range
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Resets the loop to the whole video and turns looping off.
    ///
    /// # Example
    /// ```
    /// use loop_engine::looping::{LoopModel, LoopRange};
    ///
    /// let mut model = LoopModel::default();
    /// model.reset_for_new_media(42.0).expect("valid duration");
    /// assert_eq!(model.range(), LoopRange::new(0.0, 42.0));
    /// assert!(!model.is_looping());
    /// ```
    pub fn reset_for_new_media(&mut self, duration: f64) -> Result<LoopRange> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(EngineError::InvalidDuration { seconds: duration });
        }

        self.duration = Some(duration);
        self.range = LoopRange::new(0.0, duration);
        self.looping = false;
        Ok(self.range)
    }

    /// Moves the loop start to `position` when it stays before the end.
    pub fn set_start_to_current(&mut self, position: f64) -> Option<LoopRange> {
        self.replace_range(LoopRange::new(position, self.range.end), "set start")
    }

    /// Moves the loop end to `position` when it stays after the start.
    pub fn set_end_to_current(&mut self, position: f64) -> Option<LoopRange> {
        self.replace_range(LoopRange::new(self.range.start, position), "set end")
    }

    /// Drag sample for the start handle. Samples at or past the end are
    /// dropped rather than clamped, so the last valid start is kept.
    pub fn drag_start_to(&mut self, time: f64) -> Option<LoopRange> {
        self.replace_range(LoopRange::new(time, self.range.end), "drag start")
    }

    /// Drag sample for the end handle, symmetric to [`Self::drag_start_to`].
    pub fn drag_end_to(&mut self, time: f64) -> Option<LoopRange> {
        self.replace_range(LoopRange::new(self.range.start, time), "drag end")
    }

    /// Replaces both bounds at once and turns looping on.
    pub fn activate_range(&mut self, range: LoopRange) -> Option<LoopRange> {
        let duration = self.duration?;
        if !range.fits_within(duration) {
            debug!(
                start = range.start,
                end = range.end,
                duration,
                "activate rejected: range outside video"
            );
            return None;
        }

        self.range = range;
        self.looping = true;
        Some(range)
    }

    /// Flips the looping flag. Returns the new flag, or `None` before any video
    /// is loaded.
    pub fn toggle_looping(&mut self) -> Option<bool> {
        self.duration?;
        self.looping = !self.looping;
        Some(self.looping)
    }

    /// Turns looping off without touching the range. Returns whether the flag
    /// changed.
    pub fn disable_looping(&mut self) -> bool {
        let was_looping = self.looping;
        self.looping = false;
        was_looping
    }

    fn replace_range(&mut self, candidate: LoopRange, source: &'static str) -> Option<LoopRange> {
        let duration = self.duration?;
        if !candidate.fits_within(duration) {
            debug!(
                source,
                start = candidate.start,
                end = candidate.end,
                duration,
                "boundary edit rejected"
            );
            return None;
        }
        if candidate == self.range {
            return None;
        }

        self.range = candidate;
        Some(candidate)
    }
}

/// Wraps playback back to the loop start once per crossing of the loop end.
///
/// After a wrap seek is issued, further notifications at or past the end are
/// treated as stale until one arrives below the end (the seek took effect) or
/// the loop is edited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopWatcher {
    wrap_pending: bool,
}

impl LoopWatcher {
    /// Inspects one position notification and returns the seek target when the
    /// playback must wrap.
    pub fn observe(&mut self, position: f64, model: &LoopModel) -> Option<f64> {
        if !model.is_looping() || position.is_nan() {
            self.wrap_pending = false;
            return None;
        }

        let range = model.range();
        if position < range.end {
            self.wrap_pending = false;
            return None;
        }
        if self.wrap_pending {
            debug!(position, end = range.end, "wrap already requested");
            return None;
        }

        self.wrap_pending = true;
        Some(range.start)
    }

    /// Forgets an in-flight wrap so the next notification is checked against
    /// the current loop.
    pub fn rearm(&mut self) {
        self.wrap_pending = false;
    }

    pub fn is_wrap_pending(&self) -> bool {
        self.wrap_pending
    }
}

#[cfg(test)]
mod tests {
    use super::{LoopModel, LoopRange, LoopWatcher};
    use crate::error::EngineError;

    fn loaded(duration: f64) -> LoopModel {
        let mut model = LoopModel::default();
        model
            .reset_for_new_media(duration)
            .expect("duration should be accepted");
        model
    }

    #[test]
    fn mutators_are_inert_before_media_loads() {
        let mut model = LoopModel::default();
        assert_eq!(model.set_start_to_current(1.0), None);
        assert_eq!(model.drag_end_to(2.0), None);
        assert_eq!(model.toggle_looping(), None);
        assert_eq!(model.activate_range(LoopRange::new(0.0, 1.0)), None);
        assert_eq!(model, LoopModel::default());
    }

    #[test]
    fn reset_rejects_non_positive_duration() {
        let mut model = LoopModel::default();
        assert!(matches!(
            model.reset_for_new_media(0.0),
            Err(EngineError::InvalidDuration { .. })
        ));
        assert!(model.reset_for_new_media(f64::INFINITY).is_err());
        assert_eq!(model.duration(), None);
    }

    #[test]
    fn start_cannot_reach_end() {
        let mut model = loaded(20.0);
        model.set_end_to_current(10.0).expect("end accepted");

        assert_eq!(model.set_start_to_current(10.0), None);
        assert_eq!(model.set_start_to_current(12.0), None);
        assert_eq!(model.range(), LoopRange::new(0.0, 10.0));

        assert_eq!(
            model.set_start_to_current(4.0),
            Some(LoopRange::new(4.0, 10.0))
        );
    }

    #[test]
    fn end_cannot_reach_start() {
        let mut model = loaded(20.0);
        model.set_start_to_current(5.0).expect("start accepted");

        assert_eq!(model.drag_end_to(5.0), None);
        assert_eq!(model.drag_end_to(1.0), None);
        assert_eq!(model.drag_end_to(25.0), None);
        assert_eq!(model.range(), LoopRange::new(5.0, 20.0));
    }

    #[test]
    fn arbitrary_edit_sequences_keep_the_invariant() {
        let mut model = loaded(30.0);
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..2_000 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let time = (seed % 4_000) as f64 / 100.0 - 5.0;
            match seed % 4 {
                0 => {
                    model.set_start_to_current(time);
                }
                1 => {
                    model.set_end_to_current(time);
                }
                2 => {
                    model.drag_start_to(time);
                }
                _ => {
                    model.drag_end_to(time);
                }
            }
            let range = model.range();
            assert!(range.fits_within(30.0), "{range:?} broke the invariant");
        }
    }

    #[test]
    fn activate_replaces_range_and_enables_looping() {
        let mut model = loaded(20.0);
        assert_eq!(
            model.activate_range(LoopRange::new(2.0, 4.0)),
            Some(LoopRange::new(2.0, 4.0))
        );
        assert!(model.is_looping());

        assert_eq!(model.activate_range(LoopRange::new(15.0, 25.0)), None);
        assert_eq!(model.range(), LoopRange::new(2.0, 4.0));
    }

    #[test]
    fn toggle_keeps_range() {
        let mut model = loaded(20.0);
        model.drag_start_to(3.0);
        assert_eq!(model.toggle_looping(), Some(true));
        assert_eq!(model.toggle_looping(), Some(false));
        assert_eq!(model.range(), LoopRange::new(3.0, 20.0));
    }

    #[test]
    fn watcher_wraps_once_per_crossing() {
        let mut model = loaded(60.0);
        model
            .activate_range(LoopRange::new(5.0, 10.0))
            .expect("range accepted");
        let mut watcher = LoopWatcher::default();

        let seeks: Vec<(f64, f64)> = [5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 10.1]
            .into_iter()
            .filter_map(|position| {
                watcher
                    .observe(position, &model)
                    .map(|target| (position, target))
            })
            .collect();
        assert_eq!(seeks, vec![(10.0, 5.0)]);

        assert_eq!(watcher.observe(10.2, &model), None);
        assert_eq!(watcher.observe(5.0, &model), None);
        assert_eq!(watcher.observe(9.9, &model), None);
        assert_eq!(watcher.observe(10.0, &model), Some(5.0));
    }

    #[test]
    fn watcher_ignores_positions_when_not_looping() {
        let mut model = loaded(60.0);
        model.drag_end_to(10.0);
        let mut watcher = LoopWatcher::default();
        assert_eq!(watcher.observe(12.0, &model), None);
        assert!(!watcher.is_wrap_pending());
    }

    #[test]
    fn rearm_applies_an_edited_boundary_on_the_next_notification() {
        let mut model = loaded(60.0);
        model
            .activate_range(LoopRange::new(5.0, 10.0))
            .expect("range accepted");
        let mut watcher = LoopWatcher::default();
        assert_eq!(watcher.observe(10.0, &model), Some(5.0));

        model.drag_end_to(8.0).expect("end accepted");
        watcher.rearm();
        assert_eq!(watcher.observe(10.0, &model), Some(5.0));
    }
}
