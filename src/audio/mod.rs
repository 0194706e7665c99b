//! Audio capture and feature extraction module

mod capture;
mod extractor;
mod sources;

pub use capture::{AudioCaptureHandle, CaptureError};
pub use extractor::{ExtractError, FeatureExtractor, SampleChunk};
pub use sources::{list_sources, AudioSource, SourceError, SourceType};

/// Audio processing configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Samples per analysis chunk
    pub chunk_size: usize,

    /// Peak-hold decay factor applied once per extracted chunk (0-1)
    pub peak_decay: f64,

    /// Beat fires when chunk energy exceeds the rolling mean by this factor
    pub beat_threshold: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            chunk_size: 1024,
            peak_decay: 0.95,
            beat_threshold: 1.5,
        }
    }
}
