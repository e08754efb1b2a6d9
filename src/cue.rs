use crate::error::DualsubError;

use serde::{Deserialize, Serialize};

/// A single timed subtitle entry. Times are in seconds from the start of
/// the media, before any track offset is applied.
///
/// Times are finite, non-negative and ordered, and the text holds at least
/// one non-blank line with no blank lines in between. Cue markup ends a
/// cue's text at the first blank line, so this keeps every cue writable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CueFields")]
pub struct Cue {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Deserialize)]
struct CueFields {
    start: f64,
    end: f64,
    text: String,
}

impl TryFrom<CueFields> for Cue {
    type Error = DualsubError;

    fn try_from(fields: CueFields) -> Result<Self, Self::Error> {
        Cue::new(fields.start, fields.end, fields.text).ok_or(DualsubError::InvalidCue {
            start: fields.start,
            end: fields.end,
        })
    }
}

impl Cue {
    /// Builds a cue, returning `None` when the times are negative, not
    /// finite, or inverted, or when the text has nothing but blank lines.
    /// Blank lines inside the text are dropped.
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Option<Self> {
        if !start.is_finite() || !end.is_finite() || start < 0.0 || end < start {
            return None;
        }
        let text = text.into();
        let text = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if text.is_empty() {
            return None;
        }
        Some(Self { start, end, text })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The same text at new times, under the same rules as [`Cue::new`].
    pub fn retimed(&self, start: f64, end: f64) -> Option<Self> {
        Cue::new(start, end, self.text.as_str())
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Inclusive on both ends.
    pub fn contains(&self, media_time: f64) -> bool {
        self.start <= media_time && media_time <= self.end
    }
}
