//! Bulk timing edits. Each function returns a fresh cue list which the
//! caller installs with `Session::replace_cues`.

use crate::cue::Cue;

/// Moves every cue by `seconds`. Times that would go negative are clamped
/// to zero.
pub fn shift(cues: &[Cue], seconds: f64) -> Vec<Cue> {
    shift_from(cues, 0, seconds)
}

/// Moves the cues at `first_index` and after by `seconds`, leaving earlier
/// cues untouched.
pub fn shift_from(cues: &[Cue], first_index: usize, seconds: f64) -> Vec<Cue> {
    if !seconds.is_finite() {
        return cues.to_vec();
    }
    cues.iter()
        .enumerate()
        .map(|(index, cue)| {
            if index < first_index {
                return cue.clone();
            }
            let start = (cue.start() + seconds).max(0.0);
            let end = (cue.end() + seconds).max(0.0);
            // Clamping keeps both times finite and ordered.
            cue.retimed(start, end).unwrap_or_else(|| cue.clone())
        })
        .collect()
}
