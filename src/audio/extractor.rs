//! Feature extraction - reduces a raw sample chunk to one metrics snapshot

use rustfft::{num_complex::Complex, FftPlanner};
use std::collections::VecDeque;
use thiserror::Error;

use super::AudioConfig;
use crate::metrics::{MetricsSnapshot, DB_FLOOR};

/// Number of chunk energies kept for beat detection
const ENERGY_HISTORY: usize = 10;

/// Beat detection stays silent until this many chunks have been seen
const ENERGY_WARMUP: usize = 5;

/// Feature extraction errors
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("empty sample chunk")]
    EmptyChunk,
}

/// A chunk of raw capture samples in one of the supported formats.
///
/// All variants are normalized to f64 in [-1, 1] before any metric is
/// computed, so a device switching bit depth never changes the metric
/// ranges downstream.
#[derive(Debug, Clone, Copy)]
pub enum SampleChunk<'a> {
    F32(&'a [f32]),
    I16(&'a [i16]),
    U16(&'a [u16]),
}

impl SampleChunk<'_> {
    pub fn len(&self) -> usize {
        match self {
            SampleChunk::F32(s) => s.len(),
            SampleChunk::I16(s) => s.len(),
            SampleChunk::U16(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Normalize into `out` as f64 samples in [-1, 1].
    fn normalize_into(&self, out: &mut Vec<f64>) {
        out.clear();
        match self {
            SampleChunk::F32(s) => out.extend(s.iter().map(|&x| f64::from(x))),
            SampleChunk::I16(s) => {
                out.extend(s.iter().map(|&x| f64::from(x) / f64::from(i16::MAX)))
            }
            SampleChunk::U16(s) => {
                // Unsigned samples are centered at half scale
                out.extend(
                    s.iter()
                        .map(|&x| (f64::from(x) - 32768.0) / f64::from(i16::MAX)),
                )
            }
        }
    }
}

/// Converts raw sample chunks into [`MetricsSnapshot`] values.
///
/// Owns the smoothing state that carries across chunks: the peak-hold level
/// and the rolling energy history used for beat detection. One extractor
/// instance belongs to exactly one capture source.
pub struct FeatureExtractor {
    config: AudioConfig,
    planner: FftPlanner<f32>,
    window: Vec<f32>,
    samples: Vec<f64>,
    fft_buffer: Vec<Complex<f32>>,
    peak_hold: f64,
    energy_history: VecDeque<f64>,
}

impl FeatureExtractor {
    pub fn new(config: AudioConfig) -> Self {
        let window = hann_window(config.chunk_size);
        Self {
            config,
            planner: FftPlanner::new(),
            window,
            samples: Vec::new(),
            fft_buffer: Vec::new(),
            peak_hold: 0.0,
            energy_history: VecDeque::with_capacity(ENERGY_HISTORY),
        }
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Extract one snapshot from a chunk of raw samples.
    ///
    /// A zero-length chunk is a caller error; an all-zero chunk extracts
    /// normally to the silent metric values.
    pub fn extract(
        &mut self,
        timestamp_s: f64,
        chunk: SampleChunk<'_>,
    ) -> Result<MetricsSnapshot, ExtractError> {
        if chunk.is_empty() {
            return Err(ExtractError::EmptyChunk);
        }

        let mut samples = std::mem::take(&mut self.samples);
        chunk.normalize_into(&mut samples);

        let len = samples.len() as f64;
        let amplitude = samples.iter().map(|x| x.abs()).sum::<f64>() / len;
        let energy = samples.iter().map(|x| x * x).sum::<f64>();
        let rms = (energy / len).sqrt();
        let raw_peak = samples.iter().fold(0.0f64, |acc, x| acc.max(x.abs()));

        // Peak-hold: decay once per chunk, reset whenever a higher peak lands
        self.peak_hold = raw_peak.max(self.peak_hold * self.config.peak_decay);

        let decibels = (20.0 * rms.max(1e-10).log10()).max(DB_FLOOR);

        let dominant_frequency_hz = self.dominant_frequency(&samples);
        let beat = self.detect_beat(energy);

        self.samples = samples;

        Ok(MetricsSnapshot {
            timestamp_s,
            amplitude,
            rms,
            peak: self.peak_hold,
            decibels,
            dominant_frequency_hz,
            energy,
            beat,
            extra: None,
        })
    }

    /// Recoverable variant used by the capture path: any extraction failure
    /// degrades to the silent snapshot instead of propagating.
    pub fn extract_or_silent(&mut self, timestamp_s: f64, chunk: SampleChunk<'_>) -> MetricsSnapshot {
        match self.extract(timestamp_s, chunk) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::debug!("extraction failed ({e}), falling back to silent snapshot");
                MetricsSnapshot::silent(timestamp_s)
            }
        }
    }

    /// Reset the cross-chunk smoothing state.
    pub fn reset(&mut self) {
        self.peak_hold = 0.0;
        self.energy_history.clear();
    }

    /// Frequency of the strongest spectral bin, via a Hann-windowed FFT.
    fn dominant_frequency(&mut self, samples: &[f64]) -> f64 {
        if self.window.len() != samples.len() {
            self.window = hann_window(samples.len());
        }

        self.fft_buffer.clear();
        self.fft_buffer.extend(
            samples
                .iter()
                .zip(self.window.iter())
                .map(|(&s, &w)| Complex::new(s as f32 * w, 0.0)),
        );

        let fft = self.planner.plan_fft_forward(samples.len());
        fft.process(&mut self.fft_buffer);

        // Skip the DC bin; only the first half of the spectrum is meaningful
        let mut peak_bin = 0usize;
        let mut peak_mag = 0.0f32;
        for (i, c) in self.fft_buffer.iter().enumerate().take(samples.len() / 2).skip(1) {
            let mag = c.norm();
            if mag > peak_mag {
                peak_mag = mag;
                peak_bin = i;
            }
        }

        if peak_mag <= f32::EPSILON {
            return 0.0;
        }

        peak_bin as f64 * f64::from(self.config.sample_rate) / samples.len() as f64
    }

    /// Energy-threshold beat detection over a short rolling history.
    fn detect_beat(&mut self, energy: f64) -> bool {
        self.energy_history.push_back(energy);
        if self.energy_history.len() > ENERGY_HISTORY {
            self.energy_history.pop_front();
        }

        if self.energy_history.len() < ENERGY_WARMUP {
            return false;
        }

        let prior = self.energy_history.len() - 1;
        let avg: f64 = self.energy_history.iter().take(prior).sum::<f64>() / prior as f64;
        energy > avg * self.config.beat_threshold
    }
}

/// Hann window to reduce spectral leakage before the FFT.
fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size as f32 - 1.0)).cos())
        })
        .collect()
}
