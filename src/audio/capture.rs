//! Audio capture on a dedicated thread
//!
//! The thread owns the cpal stream and the feature extractor; each analysis
//! pass publishes the newest [`MetricsSnapshot`] into a depth-one
//! latest-wins slot. The tick driver takes from that slot without ever
//! waiting on the capture cadence.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

use super::extractor::{FeatureExtractor, SampleChunk};
use super::AudioConfig;
use crate::metrics::MetricsSnapshot;

/// Audio capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no capture device found")]
    NoDevice,

    #[error("failed to get device config: {0}")]
    ConfigError(String),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to build audio stream: {0}")]
    StreamError(String),

    #[error("failed to start stream: {0}")]
    PlayError(String),

    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("thread error: {0}")]
    ThreadError(String),
}

/// Commands sent to the capture thread
enum CaptureCommand {
    Stop,
}

/// Shared latest-wins snapshot slot, depth one.
type SnapshotSlot = Arc<Mutex<Option<MetricsSnapshot>>>;

/// Handle to a running audio capture.
///
/// Does not hold the cpal stream itself; a dedicated thread owns the stream
/// so the handle stays Send + Sync for whatever owns the tick loop.
pub struct AudioCaptureHandle {
    command_tx: mpsc::Sender<CaptureCommand>,
    thread_handle: Option<JoinHandle<()>>,
    latest: SnapshotSlot,
}

impl AudioCaptureHandle {
    /// Start capturing from the given source (`None` = default input device).
    pub fn start(config: AudioConfig, source_id: Option<String>) -> Result<Self, CaptureError> {
        let (command_tx, command_rx) = mpsc::channel();
        let latest: SnapshotSlot = Arc::new(Mutex::new(None));
        let latest_clone = Arc::clone(&latest);

        let thread_handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                if let Err(e) = run_capture_thread(config, source_id, command_rx, latest_clone) {
                    log::error!("audio capture thread error: {e}");
                }
            })
            .map_err(|e| CaptureError::ThreadError(e.to_string()))?;

        Ok(Self {
            command_tx,
            thread_handle: Some(thread_handle),
            latest,
        })
    }

    /// Take the most recently published snapshot, if a new one arrived
    /// since the last call. Never blocks.
    pub fn latest_snapshot(&self) -> Option<MetricsSnapshot> {
        self.latest.lock().take()
    }

    /// Stop the capture thread. Idempotent; also runs on drop.
    pub fn stop(&mut self) {
        let _ = self.command_tx.send(CaptureCommand::Stop);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AudioCaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Circular mono sample buffer filled by the stream callback.
pub(crate) struct SampleRing {
    samples: Vec<f32>,
    write_pos: usize,
    filled: usize,
    capacity: usize,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            write_pos: 0,
            filled: 0,
            capacity,
        }
    }

    pub fn push_samples(&mut self, data: &[f32]) {
        for &sample in data {
            self.samples[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.capacity;
        }
        self.filled = (self.filled + data.len()).min(self.capacity);
    }

    /// Most recent `count` samples in time order. Returns fewer during
    /// warm-up so callers never analyze the zero-initialized tail.
    pub fn latest(&self, count: usize) -> Vec<f32> {
        let count = count.min(self.filled);
        let mut result = Vec::with_capacity(count);

        let start = (self.write_pos + self.capacity - count) % self.capacity;
        for i in 0..count {
            result.push(self.samples[(start + i) % self.capacity]);
        }
        result
    }
}

/// Run the capture loop: own the stream, analyze, publish.
fn run_capture_thread(
    config: AudioConfig,
    source_id: Option<String>,
    command_rx: mpsc::Receiver<CaptureCommand>,
    latest: SnapshotSlot,
) -> Result<(), CaptureError> {
    let host = cpal::default_host();

    let device = resolve_device(&host, source_id.as_deref())?;

    let device_config = device
        .default_input_config()
        .map_err(|e| CaptureError::ConfigError(e.to_string()))?;

    let sample_rate = device_config.sample_rate().0;
    let channels = device_config.channels() as usize;

    log::info!(
        "audio capture: {} @ {} Hz, {} channels",
        device.name().unwrap_or_else(|_| "unknown".to_string()),
        sample_rate,
        channels
    );

    // One second of mono audio is plenty of headroom for any chunk size
    let ring = Arc::new(Mutex::new(SampleRing::new(sample_rate as usize)));
    let ring_clone = Arc::clone(&ring);

    // The extractor follows the device's actual sample rate
    let mut extractor = FeatureExtractor::new(AudioConfig {
        sample_rate,
        ..config
    });
    let chunk_size = extractor.config().chunk_size;

    let sample_format = device_config.sample_format();
    let stream_config: StreamConfig = device_config.into();
    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, ring_clone, channels),
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, ring_clone, channels),
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, ring_clone, channels),
        other => return Err(CaptureError::UnsupportedFormat(format!("{other:?}"))),
    }
    .map_err(|e| CaptureError::StreamError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| CaptureError::PlayError(e.to_string()))?;

    log::info!("audio capture started");
    let started = Instant::now();

    loop {
        match command_rx.try_recv() {
            Ok(CaptureCommand::Stop) => {
                log::info!("audio capture stopping");
                break;
            }
            Err(mpsc::TryRecvError::Disconnected) => {
                log::info!("audio capture channel disconnected");
                break;
            }
            Err(mpsc::TryRecvError::Empty) => {}
        }

        // Copy samples under lock, release before the FFT runs. Holding the
        // ring lock during extraction would stall the stream callback.
        let samples = ring.lock().latest(chunk_size);

        if samples.len() >= chunk_size {
            let timestamp_s = started.elapsed().as_secs_f64();
            let snapshot = extractor.extract_or_silent(timestamp_s, SampleChunk::F32(&samples));
            *latest.lock() = Some(snapshot);
        }

        thread::sleep(Duration::from_millis(10));
    }

    Ok(())
}

/// Resolve a source id to a cpal input device.
fn resolve_device(host: &cpal::Host, source_id: Option<&str>) -> Result<Device, CaptureError> {
    match source_id {
        None | Some("default") => host.default_input_device().ok_or(CaptureError::NoDevice),
        Some(id) => {
            let name = id.strip_prefix("input:").unwrap_or(id);
            host.input_devices()
                .map_err(|e| CaptureError::ConfigError(e.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| CaptureError::SourceNotFound(name.to_string()))
        }
    }
}

/// Build an input stream for the given sample type, downmixing to mono.
fn build_stream<T: cpal::Sample + cpal::SizedSample>(
    device: &Device,
    config: &StreamConfig,
    ring: Arc<Mutex<SampleRing>>,
    channels: usize,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    f32: cpal::FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mono: Vec<f32> = data
                .chunks(channels)
                .map(|frame| {
                    let sum: f32 = frame
                        .iter()
                        .map(|s| -> f32 { cpal::Sample::from_sample(*s) })
                        .sum();
                    sum / channels as f32
                })
                .collect();

            ring.lock().push_samples(&mono);
        },
        |err| {
            log::error!("audio stream error: {err}");
        },
        None,
    )
}
