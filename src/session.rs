//! The playback-session controller: owns the loaded tracks and the visual
//! pool, and runs query, compose and apply on every playback-time update.
//!
//! Everything here is single-threaded and synchronous. Each [`Session::tick`]
//! finishes before the next one starts, and repeating a tick with the same
//! time leaves the pool untouched.

use crate::composer::{compose, ActiveCue, CueKey, RenderPlan};
use crate::cue::Cue;
use crate::error::{DualsubError, Result};
use crate::format::SubtitleFormat;
use crate::normalizer::normalize;
use crate::parser::extract;
use crate::pool::{CaptureFn, Renderer, VisualPool};
use crate::processor;
use crate::store::{Track, TrackId, TrackStore};

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionOptions {
    /// Blur secondary-track cues.
    pub deemphasize_secondary: bool,
    /// A track loaded while no primary is selected becomes primary.
    pub auto_primary: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            deemphasize_secondary: false,
            auto_primary: true,
        }
    }
}

/// What the file loader reports back to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedTrack {
    pub id: TrackId,
    pub cue_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub label: String,
    pub markup: String,
    pub offset_seconds: f64,
}

/// Everything needed to rebuild a session, without any storage attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub tracks: Vec<TrackSnapshot>,
    pub primary: Option<TrackId>,
    pub secondary: Option<TrackId>,
    #[serde(default)]
    pub options: SessionOptions,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

pub struct Session<R: Renderer> {
    store: TrackStore,
    pool: VisualPool<R>,
    options: SessionOptions,
    capture: Option<CaptureFn>,
}

impl<R: Renderer> Session<R> {
    pub fn new(renderer: R) -> Self {
        Self::with_options(renderer, SessionOptions::default())
    }

    pub fn with_options(renderer: R, options: SessionOptions) -> Self {
        Self {
            store: TrackStore::with_auto_primary(options.auto_primary),
            pool: VisualPool::new(renderer),
            options,
            capture: None,
        }
    }

    /// Parses a subtitle file, picking the format from its extension, and
    /// adds it as a new track. A zero `cue_count` from a non-empty file
    /// means nothing in it could be read.
    pub fn load_subtitle(&mut self, raw: &str, filename: &str) -> LoadedTrack {
        let format = SubtitleFormat::from_filename(filename);
        let markup = normalize(raw, format);
        let label = Path::new(filename)
            .file_name()
            .map_or_else(|| filename.to_string(), |name| name.to_string_lossy().into_owned());
        let loaded = self.load_markup(&label, &markup);
        if loaded.cue_count == 0 && !raw.trim().is_empty() {
            warn!(file = %filename, ?format, "no cues could be extracted");
        }
        loaded
    }

    /// Adds a track from intermediate markup, e.g. a restored session blob.
    pub fn load_markup(&mut self, label: &str, markup: &str) -> LoadedTrack {
        let cues = extract(markup);
        let cue_count = cues.len();
        let id = self.add_track(label, cues);
        LoadedTrack { id, cue_count }
    }

    pub fn add_track(&mut self, label: &str, cues: Vec<Cue>) -> TrackId {
        let id = self.store.add_track(label, cues);
        self.materialize(&id);
        id
    }

    /// Removes the track and every pool entry belonging to it.
    pub fn remove_track(&mut self, id: &str) -> bool {
        self.pool.destroy(id);
        self.store.remove_track(id).is_some()
    }

    pub fn set_offset(&mut self, id: &str, seconds: f64) -> Result<bool> {
        self.store.set_offset(id, seconds)
    }

    pub fn select_primary(&mut self, id: Option<&str>) -> bool {
        self.store.select_primary(id)
    }

    pub fn select_secondary(&mut self, id: Option<&str>) -> bool {
        self.store.select_secondary(id)
    }

    pub fn set_deemphasize_secondary(&mut self, deemphasize: bool) {
        self.options.deemphasize_secondary = deemphasize;
    }

    /// Handler bound to every visible cue from the next tick on.
    pub fn set_capture_handler(&mut self, handler: Option<CaptureFn>) {
        self.capture = handler;
    }

    /// Installs an edited cue list and rebuilds the track's pool entries.
    pub fn replace_cues(&mut self, id: &str, cues: Vec<Cue>) -> bool {
        if !self.store.replace_cues(id, cues) {
            return false;
        }
        self.materialize(id);
        true
    }

    /// Permanently moves a track's cues, as opposed to `set_offset`.
    pub fn shift_track(&mut self, id: &str, seconds: f64) -> bool {
        let Some(track) = self.store.get(id) else {
            return false;
        };
        let shifted = processor::shift(track.cues(), seconds);
        self.replace_cues(id, shifted)
    }

    /// The plan for `current_time`, without touching the pool.
    pub fn plan_at(&self, current_time: f64) -> RenderPlan {
        let primary = active_in(self.store.primary(), current_time);
        let secondary = active_in(self.store.secondary(), current_time);
        compose(&primary, &secondary, self.options.deemphasize_secondary)
    }

    pub fn tick(&mut self, current_time: f64) -> RenderPlan {
        let plan = self.plan_at(current_time);
        self.pool.apply_render_plan(&plan, self.capture.as_ref());
        plan
    }

    pub fn trigger_capture(&self, key: &CueKey) -> bool {
        self.pool.trigger_capture(key)
    }

    /// Drops every track and pooled node.
    pub fn reset(&mut self) {
        self.pool.destroy_all();
        self.store.clear();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            tracks: self
                .store
                .tracks()
                .iter()
                .map(|track| TrackSnapshot {
                    id: track.id().to_string(),
                    label: track.label().to_string(),
                    markup: track.markup(),
                    offset_seconds: track.offset(),
                })
                .collect(),
            primary: self.store.primary_id().map(str::to_string),
            secondary: self.store.secondary_id().map(str::to_string),
            options: self.options,
        }
    }

    /// Replaces the whole session with `snapshot`, keeping its track ids.
    pub fn restore(&mut self, snapshot: &SessionSnapshot) -> Result<()> {
        if let Some(bad) = snapshot
            .tracks
            .iter()
            .find(|track| !track.offset_seconds.is_finite())
        {
            return Err(DualsubError::NonFiniteOffset(bad.offset_seconds));
        }

        self.reset();
        self.options = snapshot.options;
        self.store = TrackStore::with_auto_primary(snapshot.options.auto_primary);
        for track in &snapshot.tracks {
            self.store
                .insert_track(track.id.clone(), track.label.clone(), extract(&track.markup));
            self.store.set_offset(&track.id, track.offset_seconds)?;
            self.materialize(&track.id);
        }
        self.store.select_primary(snapshot.primary.as_deref());
        self.store.select_secondary(snapshot.secondary.as_deref());
        info!(tracks = snapshot.tracks.len(), "restored session");
        Ok(())
    }

    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    pub fn pool(&self) -> &VisualPool<R> {
        &self.pool
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    fn materialize(&mut self, id: &str) {
        if let Some(track) = self.store.get(id) {
            self.pool.materialize(id, track.cues());
        }
    }
}

fn active_in(track: Option<&Track>, current_time: f64) -> Vec<ActiveCue> {
    let Some(track) = track else {
        return Vec::new();
    };
    track
        .active_indices(current_time)
        .into_iter()
        .map(|index| {
            let cue = &track.cues()[index];
            ActiveCue {
                key: CueKey::new(track.id(), index),
                start: cue.start(),
                end: cue.end(),
            }
        })
        .collect()
}
