//! Merges the active cues of the primary and secondary tracks into one
//! render plan for the current tick.

use crate::store::TrackId;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Identifies one cue of one track, and with it one pooled node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CueKey {
    pub track_id: TrackId,
    pub index: usize,
}

impl CueKey {
    pub fn new(track_id: impl Into<TrackId>, index: usize) -> Self {
        Self {
            track_id: track_id.into(),
            index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayRole {
    Primary,
    Secondary,
}

/// A cue found active for one of the two slots.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveCue {
    pub key: CueKey,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    pub key: CueKey,
    pub role: DisplayRole,
    /// Only ever set on secondary entries.
    pub deemphasized: bool,
    pub start: f64,
    pub end: f64,
}

/// Cues to show this tick. Anything not listed is hidden.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderPlan {
    entries: Vec<PlanEntry>,
}

impl RenderPlan {
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn get(&self, key: &CueKey) -> Option<&PlanEntry> {
        self.entries.iter().find(|entry| &entry.key == key)
    }

    pub fn with_role(&self, role: DisplayRole) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(move |entry| entry.role == role)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Primary cues are always shown as primary. A secondary cue is dropped
/// when the very same cue was already claimed by the primary slot, so a
/// cue is never rendered twice.
pub fn compose(
    primary: &[ActiveCue],
    secondary: &[ActiveCue],
    deemphasize_secondary: bool,
) -> RenderPlan {
    let mut claimed: HashSet<&CueKey> = HashSet::with_capacity(primary.len());
    let mut entries = Vec::with_capacity(primary.len() + secondary.len());

    for active in primary {
        if claimed.insert(&active.key) {
            entries.push(PlanEntry {
                key: active.key.clone(),
                role: DisplayRole::Primary,
                deemphasized: false,
                start: active.start,
                end: active.end,
            });
        }
    }
    for active in secondary {
        if claimed.insert(&active.key) {
            entries.push(PlanEntry {
                key: active.key.clone(),
                role: DisplayRole::Secondary,
                deemphasized: deemphasize_secondary,
                start: active.start,
                end: active.end,
            });
        }
    }

    RenderPlan { entries }
}
