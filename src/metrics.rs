//! Per-chunk metrics snapshot shared by the audio and camera analyzers

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Decibel floor applied to silent or near-silent input.
///
/// `20 * log10(rms)` diverges to negative infinity as the signal approaches
/// silence, so levels are clamped here instead.
pub const DB_FLOOR: f64 = -60.0;

/// One immutable set of perceptual metrics extracted from a single capture
/// chunk (audio) or frame (camera).
///
/// Snapshots are produced once per chunk and never mutated afterwards; the
/// capture thread publishes them through a latest-wins slot and the tick
/// driver consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Seconds since the capture source started
    pub timestamp_s: f64,

    /// Mean absolute sample value (0-1 after normalization)
    pub amplitude: f64,

    /// Root mean square level (0-1)
    pub rms: f64,

    /// Peak level with exponential peak-hold decay (0-1)
    pub peak: f64,

    /// Level in dBFS, clamped to [`DB_FLOOR`]
    pub decibels: f64,

    /// Frequency of the strongest FFT bin in Hz (0 for silence)
    pub dominant_frequency_hz: f64,

    /// Total signal energy of the chunk (sum of squared samples)
    pub energy: f64,

    /// True when the energy detector fired on this chunk
    pub beat: bool,

    /// Camera-mode metrics (motion intensity, brightness, dominant hue).
    /// Absent in plain audio mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<BTreeMap<String, f64>>,
}

impl MetricsSnapshot {
    /// Snapshot describing silence (or no input at all) at the given time.
    pub fn silent(timestamp_s: f64) -> Self {
        Self {
            timestamp_s,
            amplitude: 0.0,
            rms: 0.0,
            peak: 0.0,
            decibels: DB_FLOOR,
            dominant_frequency_hz: 0.0,
            energy: 0.0,
            beat: false,
            extra: None,
        }
    }
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self::silent(0.0)
    }
}
