//! Camera frame analysis
//!
//! Folds frame metrics into the same [`MetricsSnapshot`] shape the audio
//! extractor produces, so the mapper and field never know which sense is
//! driving them: motion lands in `amplitude`, brightness in `rms`, and the
//! dominant color becomes a frequency on the same log scale the hue
//! mapping reads. The raw camera values ride along in `extra`.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mapper::{FREQ_MAX_HZ, FREQ_MIN_HZ};
use crate::metrics::{MetricsSnapshot, DB_FLOOR};

/// Per-pixel luma delta that counts as motion
const MOTION_THRESHOLD: u8 = 25;

/// Motion history depth for beat detection
const MOTION_HISTORY: usize = 10;
const MOTION_WARMUP: usize = 5;

/// Pixel layout of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
    Luma8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
            PixelFormat::Luma8 => 1,
        }
    }
}

/// One camera frame, borrowed from whatever capture layer produced it.
#[derive(Debug, Clone)]
pub struct PixelFrame<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: &'a [u8],
}

/// Frame analysis errors
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("frame buffer is {actual} bytes, expected {expected} for {width}x{height} {format:?}")]
    FormatMismatch {
        width: u32,
        height: u32,
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },

    #[error("frame dimensions changed from {prev_width}x{prev_height} to {width}x{height}")]
    DimensionChange {
        prev_width: u32,
        prev_height: u32,
        width: u32,
        height: u32,
    },

    #[error("zero-sized frame")]
    EmptyFrame,
}

/// Stateful frame analyzer. Holds the previous frame's luma plane for
/// motion detection, so one analyzer serves one camera.
pub struct FrameAnalyzer {
    prev_luma: Option<Vec<u8>>,
    prev_dims: Option<(u32, u32)>,
    peak_hold: f64,
    peak_decay: f64,
    motion_history: VecDeque<f64>,
    beat_threshold: f64,
}

impl Default for FrameAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAnalyzer {
    pub fn new() -> Self {
        Self {
            prev_luma: None,
            prev_dims: None,
            peak_hold: 0.0,
            peak_decay: 0.95,
            motion_history: VecDeque::with_capacity(MOTION_HISTORY),
            beat_threshold: 1.5,
        }
    }

    /// Forget the previous frame; the next analysis reports zero motion.
    pub fn reset(&mut self) {
        self.prev_luma = None;
        self.prev_dims = None;
        self.peak_hold = 0.0;
        self.motion_history.clear();
    }

    /// Analyze one frame into a metrics snapshot.
    pub fn analyze(
        &mut self,
        timestamp_s: f64,
        frame: &PixelFrame<'_>,
    ) -> Result<MetricsSnapshot, VisionError> {
        let pixel_count = frame.width as usize * frame.height as usize;
        if pixel_count == 0 {
            return Err(VisionError::EmptyFrame);
        }

        let expected = pixel_count * frame.format.bytes_per_pixel();
        if frame.data.len() != expected {
            return Err(VisionError::FormatMismatch {
                width: frame.width,
                height: frame.height,
                format: frame.format,
                expected,
                actual: frame.data.len(),
            });
        }

        if let Some((pw, ph)) = self.prev_dims {
            if (pw, ph) != (frame.width, frame.height) {
                return Err(VisionError::DimensionChange {
                    prev_width: pw,
                    prev_height: ph,
                    width: frame.width,
                    height: frame.height,
                });
            }
        }

        let (luma, avg_rgb) = luma_and_average(frame, pixel_count);

        let motion = match &self.prev_luma {
            Some(prev) => {
                let changed = luma
                    .iter()
                    .zip(prev.iter())
                    .filter(|(a, b)| a.abs_diff(**b) > MOTION_THRESHOLD)
                    .count();
                changed as f64 / pixel_count as f64
            }
            None => 0.0,
        };

        let brightness =
            luma.iter().map(|&l| f64::from(l)).sum::<f64>() / (pixel_count as f64 * 255.0);

        self.peak_hold = motion.max(self.peak_hold * self.peak_decay);

        let visual_energy = motion * brightness;
        let beat = self.detect_beat(motion);

        let hue = dominant_hue(avg_rgb);
        let frequency = hue_to_frequency(hue);

        let decibels = (20.0 * brightness.max(1e-10).log10()).max(DB_FLOOR);

        let mut extra = BTreeMap::new();
        extra.insert("motion_intensity".to_string(), motion);
        extra.insert("brightness".to_string(), brightness);
        extra.insert("dominant_hue_deg".to_string(), hue);
        extra.insert("visual_energy".to_string(), visual_energy);

        self.prev_luma = Some(luma);
        self.prev_dims = Some((frame.width, frame.height));

        Ok(MetricsSnapshot {
            timestamp_s,
            amplitude: motion,
            rms: brightness,
            peak: self.peak_hold,
            decibels,
            dominant_frequency_hz: frequency,
            energy: visual_energy,
            beat,
            extra: Some(extra),
        })
    }

    fn detect_beat(&mut self, motion: f64) -> bool {
        let beat = if self.motion_history.len() >= MOTION_WARMUP {
            let avg: f64 =
                self.motion_history.iter().sum::<f64>() / self.motion_history.len() as f64;
            avg > 0.0 && motion > avg * self.beat_threshold
        } else {
            false
        };

        if self.motion_history.len() >= MOTION_HISTORY {
            self.motion_history.pop_front();
        }
        self.motion_history.push_back(motion);
        beat
    }
}

/// Luma plane plus the frame's average RGB, one pass over the buffer.
fn luma_and_average(frame: &PixelFrame<'_>, pixel_count: usize) -> (Vec<u8>, [f64; 3]) {
    let mut luma = Vec::with_capacity(pixel_count);
    let mut sum = [0.0f64; 3];

    match frame.format {
        PixelFormat::Luma8 => {
            luma.extend_from_slice(frame.data);
            let mean: f64 =
                frame.data.iter().map(|&l| f64::from(l)).sum::<f64>() / pixel_count as f64;
            sum = [mean * pixel_count as f64; 3];
        }
        PixelFormat::Rgb8 | PixelFormat::Rgba8 => {
            let stride = frame.format.bytes_per_pixel();
            for px in frame.data.chunks_exact(stride) {
                let (r, g, b) = (f64::from(px[0]), f64::from(px[1]), f64::from(px[2]));
                luma.push(((r * 299.0 + g * 587.0 + b * 114.0) / 1000.0) as u8);
                sum[0] += r;
                sum[1] += g;
                sum[2] += b;
            }
        }
    }

    let n = pixel_count as f64;
    (luma, [sum[0] / n, sum[1] / n, sum[2] / n])
}

/// Hue of an RGB color in degrees [0, 360); gray maps to 0.
fn dominant_hue(rgb: [f64; 3]) -> f64 {
    let [r, g, b] = rgb.map(|c| c / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    if delta < 1e-9 {
        return 0.0;
    }

    let hue = if max == r {
        60.0 * ((g - b) / delta)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    hue.rem_euclid(360.0)
}

/// Place a hue on the audible log-frequency scale: 0 degrees at the bottom
/// of the range, 360 at the top. Inverse of the mapper's hue placement so
/// camera color and audio pitch drive the palette the same way.
fn hue_to_frequency(hue_deg: f64) -> f64 {
    let t = (hue_deg.rem_euclid(360.0)) / 360.0;
    FREQ_MIN_HZ * (FREQ_MAX_HZ / FREQ_MIN_HZ).powf(t)
}
