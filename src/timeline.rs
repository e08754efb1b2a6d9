//! Which cues of a track are on screen at a given playback time.
//!
//! A cue is active when `current_time - offset` lies in `[start, end]`,
//! both ends inclusive. Results are cue indices in source order.

use crate::cue::Cue;

/// Linear containment scan over the whole track.
pub fn active_indices(cues: &[Cue], current_time: f64, offset: f64) -> Vec<usize> {
    let media_time = current_time - offset;
    cues.iter()
        .enumerate()
        .filter(|(_, cue)| cue.contains(media_time))
        .map(|(index, _)| index)
        .collect()
}

pub fn active_cues(cues: &[Cue], current_time: f64, offset: f64) -> Vec<&Cue> {
    active_indices(cues, current_time, offset)
        .into_iter()
        .map(|index| &cues[index])
        .collect()
}

/// Start-sorted view of a track that narrows each query to the cues that
/// started no earlier than the longest cue duration ago. Answers are the
/// same as [`active_indices`].
#[derive(Debug, Clone, Default)]
pub struct TimelineIndex {
    by_start: Vec<usize>,
    starts: Vec<f64>,
    max_duration: f64,
}

impl TimelineIndex {
    pub fn build(cues: &[Cue]) -> Self {
        let mut by_start: Vec<usize> = (0..cues.len()).collect();
        by_start.sort_by(|&a, &b| cues[a].start().total_cmp(&cues[b].start()));
        let starts = by_start.iter().map(|&i| cues[i].start()).collect();
        let max_duration = cues
            .iter()
            .map(Cue::duration)
            .filter(|d| d.is_finite())
            .fold(0.0, f64::max);
        Self {
            by_start,
            starts,
            max_duration,
        }
    }

    pub fn len(&self) -> usize {
        self.by_start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_start.is_empty()
    }

    pub fn active_indices(&self, cues: &[Cue], current_time: f64, offset: f64) -> Vec<usize> {
        if cues.len() != self.by_start.len() {
            return active_indices(cues, current_time, offset);
        }
        let media_time = current_time - offset;
        if !media_time.is_finite() {
            return Vec::new();
        }
        // One extra second of slack keeps rounding in `duration` from
        // excluding a cue; the exact test below does the real filtering.
        let earliest = media_time - self.max_duration - 1.0;
        let lo = self.starts.partition_point(|&s| s < earliest);
        let hi = self.starts.partition_point(|&s| s <= media_time);
        if lo >= hi {
            return Vec::new();
        }

        let mut found: Vec<usize> = self.by_start[lo..hi]
            .iter()
            .copied()
            .filter(|&i| cues[i].contains(media_time))
            .collect();
        found.sort_unstable();
        found
    }
}
