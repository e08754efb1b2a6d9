use thiserror::Error;

#[derive(Debug, Error)]
pub enum DualsubError {
    #[error("offset must be a finite number of seconds, got {0}")]
    NonFiniteOffset(f64),
    #[error("invalid cue from {start} to {end}: times must be finite, non-negative and ordered, and the text must not be blank")]
    InvalidCue { start: f64, end: f64 },
    #[error("invalid session snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DualsubError>;
