/// Horizontal extent of the drawable timeline strip, in pointer coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackGeometry {
    pub left: f32,
    pub width: f32,
}

impl TrackGeometry {
    pub fn new(left: f32, width: f32) -> Self {
        Self { left, width }
    }

    /// Maps a pointer x coordinate to a fraction of this track.
    pub fn fraction_at(&self, pointer_x: f32) -> f64 {
        fraction_from_pointer(pointer_x, self.left, self.width)
    }
}

/// Converts a playback timestamp into a fraction of the media duration.
///
/// Returns `0` while the duration is unknown (`<= 0`), so early events before
/// metadata arrives are inert.
///
/// # Example
/// ```
/// use loop_engine::time::to_fraction;
///
/// assert_eq!(to_fraction(5.0, 10.0), 0.5);
/// assert_eq!(to_fraction(12.0, 10.0), 1.0);
/// assert_eq!(to_fraction(3.0, 0.0), 0.0);
/// ```
pub fn to_fraction(time: f64, duration: f64) -> f64 {
    if !(duration > 0.0) || !duration.is_finite() || time.is_nan() {
        return 0.0;
    }

    (time / duration).clamp(0.0, 1.0)
}

/// Converts a fraction of the strip into seconds.
///
/// # Example
/// ```
/// use loop_engine::time::to_time;
///
/// assert_eq!(to_time(0.25, 8.0), 2.0);
/// assert_eq!(to_time(-1.0, 8.0), 0.0);
/// ```
pub fn to_time(fraction: f64, duration: f64) -> f64 {
    if !(duration > 0.0) || !duration.is_finite() || fraction.is_nan() {
        return 0.0;
    }

    fraction.clamp(0.0, 1.0) * duration
}

/// Maps a pointer x coordinate into `[0, 1]` across a track.
///
/// Positions outside the track are clamped; a track with no width yet maps
/// everything to `0`.
pub fn fraction_from_pointer(pointer_x: f32, track_left: f32, track_width: f32) -> f64 {
    if !(track_width > 0.0) || pointer_x.is_nan() {
        return 0.0;
    }

    let ratio = f64::from(pointer_x - track_left) / f64::from(track_width);
    ratio.clamp(0.0, 1.0)
}

/// Formats seconds as `MM:SS.CC`.
///
/// Negative and NaN inputs render as `00:00.00`. Minutes keep growing past
/// two digits instead of wrapping into hours.
///
/// # Example
/// ```
/// use loop_engine::time::format_time;
///
/// assert_eq!(format_time(125.4), "02:05.40");
/// assert_eq!(format_time(f64::NAN), "00:00.00");
/// ```
pub fn format_time(seconds: f64) -> String {
    if !(seconds >= 0.0) || !seconds.is_finite() {
        return String::from("00:00.00");
    }

    let total_centis = (seconds * 100.0).round() as u64;
    let minutes = total_centis / 6_000;
    let secs = (total_centis / 100) % 60;
    let centis = total_centis % 100;
    format!("{minutes:02}:{secs:02}.{centis:02}")
}
