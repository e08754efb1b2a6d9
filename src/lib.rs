//! Subtitle timeline and synchronisation engine for dual-track playback.
//!
//! Subtitle files (SRT, ASS/SSA, VTT) are normalised into one WebVTT-like
//! markup, read into [`Cue`]s and kept per track in a [`TrackStore`]. On
//! every playback-time update a [`Session`] finds the active cues of the
//! primary and secondary tracks, merges them into a [`RenderPlan`] and
//! applies it to a [`VisualPool`] of reusable nodes.
//!
//! ```rust,ignore
//! use dualsub::{NullRenderer, Session};
//!
//! let mut session = Session::new(NullRenderer);
//! let en = session.load_subtitle(&std::fs::read_to_string("movie.en.srt")?, "movie.en.srt");
//! let ja = session.load_subtitle(&std::fs::read_to_string("movie.ja.ass")?, "movie.ja.ass");
//! session.select_secondary(Some(ja.id.as_str()));
//! session.set_offset(&ja.id, -0.75)?;
//!
//! let plan = session.tick(12.4);
//! ```

pub mod composer;
pub mod cue;
pub mod error;
pub mod format;
pub mod normalizer;
pub mod parser;
pub mod pool;
pub mod processor;
pub mod serialiser;
pub mod session;
pub mod store;
pub mod timeline;

pub use composer::{compose, ActiveCue, CueKey, DisplayRole, PlanEntry, RenderPlan};
pub use cue::Cue;
pub use error::{DualsubError, Result};
pub use format::SubtitleFormat;
pub use normalizer::normalize;
pub use parser::extract;
pub use pool::{CaptureFn, EntryState, NullRenderer, Renderer, VisualPool};
pub use serialiser::{format_timestamp, serialize_to_srt, serialize_to_vtt};
pub use session::{LoadedTrack, Session, SessionOptions, SessionSnapshot, TrackSnapshot};
pub use store::{Track, TrackId, TrackStore};
pub use timeline::{active_cues, active_indices, TimelineIndex};
