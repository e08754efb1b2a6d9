//! Loaded subtitle tracks, their offsets and the primary/secondary
//! selection.
//!
//! Operations naming a track that isn't loaded are no-ops that report
//! `false`, since the caller may still be holding an id removed a moment ago.

use crate::cue::Cue;
use crate::error::{DualsubError, Result};
use crate::serialiser::serialize_to_vtt;
use crate::timeline::TimelineIndex;

use tracing::{debug, info};
use uuid::Uuid;

pub type TrackId = String;

#[derive(Debug, Clone)]
pub struct Track {
    id: TrackId,
    label: String,
    cues: Vec<Cue>,
    offset: f64,
    index: TimelineIndex,
}

impl Track {
    fn new(id: TrackId, label: String, cues: Vec<Cue>) -> Self {
        let index = TimelineIndex::build(&cues);
        Self {
            id,
            label,
            cues,
            offset: 0.0,
            index,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    /// Seconds added to every cue's timing. Positive values show subtitles
    /// later.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Indices of the cues on screen at `current_time`, with this track's
    /// offset applied.
    pub fn active_indices(&self, current_time: f64) -> Vec<usize> {
        self.index
            .active_indices(&self.cues, current_time, self.offset)
    }

    /// The cue list as intermediate markup, for persistence or export.
    pub fn markup(&self) -> String {
        serialize_to_vtt(&self.cues)
    }

    fn replace_cues(&mut self, cues: Vec<Cue>) {
        self.index = TimelineIndex::build(&cues);
        self.cues = cues;
    }
}

#[derive(Debug, Clone)]
pub struct TrackStore {
    tracks: Vec<Track>,
    primary: Option<TrackId>,
    secondary: Option<TrackId>,
    auto_primary: bool,
}

impl Default for TrackStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackStore {
    pub fn new() -> Self {
        Self::with_auto_primary(true)
    }

    /// With `auto_primary`, a track added while the primary slot is empty
    /// takes that slot.
    pub fn with_auto_primary(auto_primary: bool) -> Self {
        Self {
            tracks: Vec::new(),
            primary: None,
            secondary: None,
            auto_primary,
        }
    }

    pub fn add_track(&mut self, label: impl Into<String>, cues: Vec<Cue>) -> TrackId {
        let id = Uuid::new_v4().to_string();
        self.insert_track(id.clone(), label.into(), cues);
        id
    }

    /// Adds a track under a known id, replacing any track already using it.
    pub(crate) fn insert_track(&mut self, id: TrackId, label: String, cues: Vec<Cue>) {
        info!(track = %id, label = %label, cues = cues.len(), "adding subtitle track");
        let track = Track::new(id.clone(), label, cues);
        match self.position(&id) {
            Some(pos) => self.tracks[pos] = track,
            None => self.tracks.push(track),
        }
        if self.auto_primary
            && self.primary.is_none()
            && self.secondary.as_deref() != Some(id.as_str())
        {
            self.primary = Some(id);
        }
    }

    /// Removes a track, emptying whichever slot it occupied. No other track
    /// is promoted into the freed slot.
    pub fn remove_track(&mut self, id: &str) -> Option<Track> {
        let pos = self.position(id)?;
        if self.primary.as_deref() == Some(id) {
            self.primary = None;
        }
        if self.secondary.as_deref() == Some(id) {
            self.secondary = None;
        }
        info!(track = %id, "removing subtitle track");
        Some(self.tracks.remove(pos))
    }

    pub fn set_offset(&mut self, id: &str, seconds: f64) -> Result<bool> {
        if !seconds.is_finite() {
            return Err(DualsubError::NonFiniteOffset(seconds));
        }
        match self.track_mut(id) {
            Some(track) => {
                track.offset = seconds;
                Ok(true)
            }
            None => {
                debug!(track = %id, "offset change for unknown track ignored");
                Ok(false)
            }
        }
    }

    /// Selecting the current secondary as primary empties the secondary
    /// slot so both slots never name the same track.
    pub fn select_primary(&mut self, id: Option<&str>) -> bool {
        let Some(id) = id else {
            self.primary = None;
            return true;
        };
        if self.position(id).is_none() {
            debug!(track = %id, "primary selection of unknown track ignored");
            return false;
        }
        if self.secondary.as_deref() == Some(id) {
            self.secondary = None;
        }
        self.primary = Some(id.to_string());
        true
    }

    /// Rejects the track that is already primary.
    pub fn select_secondary(&mut self, id: Option<&str>) -> bool {
        let Some(id) = id else {
            self.secondary = None;
            return true;
        };
        if self.primary.as_deref() == Some(id) {
            debug!(track = %id, "track is already primary, secondary selection rejected");
            return false;
        }
        if self.position(id).is_none() {
            debug!(track = %id, "secondary selection of unknown track ignored");
            return false;
        }
        self.secondary = Some(id.to_string());
        true
    }

    /// Swaps in a whole new cue list, as produced by the timing editor.
    pub fn replace_cues(&mut self, id: &str, cues: Vec<Cue>) -> bool {
        match self.track_mut(id) {
            Some(track) => {
                track.replace_cues(cues);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Track> {
        self.tracks.iter().find(|track| track.id == id)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn primary_id(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    pub fn secondary_id(&self) -> Option<&str> {
        self.secondary.as_deref()
    }

    pub fn primary(&self) -> Option<&Track> {
        self.primary.as_deref().and_then(|id| self.get(id))
    }

    pub fn secondary(&self) -> Option<&Track> {
        self.secondary.as_deref().and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.primary = None;
        self.secondary = None;
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tracks.iter().position(|track| track.id == id)
    }

    fn track_mut(&mut self, id: &str) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|track| track.id == id)
    }
}
