//! Session recording and playback
//!
//! A session file is one JSON header line followed by one JSON entry per
//! recorded tick. Entries carry both the metrics snapshot and the visual
//! parameters derived from it, so playback can drive the field directly
//! from the recorded parameters.

mod player;
mod recorder;

pub use player::{PlaybackCursor, PlaybackStep, SessionPlayer};
pub use recorder::SessionRecorder;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mapper::VisualParameters;
use crate::metrics::MetricsSnapshot;

/// First line of every session file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHeader {
    /// Who recorded the session
    pub user: String,

    /// Free-form session title
    pub title: String,

    /// Wall-clock start, seconds since the Unix epoch
    pub start_time: f64,

    /// Tick rate the session was recorded at
    pub tick_rate_hz: f64,

    /// Capture sample rate, if the session came from live audio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate_hz: Option<u32>,
}

/// One recorded tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    /// Session-relative timestamp in seconds, non-decreasing
    pub timestamp_s: f64,

    pub metrics: MetricsSnapshot,
    pub params: VisualParameters,
}

/// Session recording and playback errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("entry timestamp {new} precedes the last recorded timestamp {last}")]
    OutOfOrderAppend { last: f64, new: f64 },

    #[error("recorder is corrupted after a write failure; no further appends accepted")]
    Corrupted,

    #[error("session file has no valid header: {0}")]
    CorruptHeader(String),

    #[error("session I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}
