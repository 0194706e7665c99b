//! Fixed-rate tick driver
//!
//! Owns the whole per-tick pipeline: pull a snapshot from the active
//! source, map it to visual parameters, advance the particle field, and
//! optionally record the tick. Live capture and session playback feed the
//! exact same path; the field cannot tell them apart.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::audio::AudioCaptureHandle;
use crate::field::{DrawRecord, FieldConfig, ParticleField};
use crate::mapper::{map_parameters, VisualParameters};
use crate::metrics::MetricsSnapshot;
use crate::session::{SessionEntry, SessionHeader, SessionPlayer, SessionRecorder};
use crate::style::StyleConfig;

/// Where each tick's snapshot comes from.
pub enum SnapshotSource {
    /// Live audio capture
    Live(AudioCaptureHandle),

    /// Replay of a recorded session
    Playback(SessionPlayer),

    /// No input; the field idles on silence
    Idle,
}

/// Commands applied between ticks, never mid-tick.
pub enum DriverCommand {
    /// Replace the style for all subsequent ticks
    SetStyle(StyleConfig),

    /// Start recording ticks to a session file
    StartRecording {
        path: PathBuf,
        user: String,
        title: String,
    },

    /// Close the current recording, if any
    StopRecording,

    /// Stop the driver loop
    Stop,
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Ticks per second for the fixed-rate loop
    pub tick_rate_hz: f64,

    /// Capture sample rate stamped into recorded session headers
    pub sample_rate_hz: Option<u32>,

    pub field: FieldConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60.0,
            sample_rate_hz: None,
            field: FieldConfig::default(),
        }
    }
}

pub struct TickDriver {
    config: DriverConfig,
    style: StyleConfig,
    field: ParticleField,
    source: SnapshotSource,
    last_snapshot: MetricsSnapshot,
    last_params: VisualParameters,
    recorder: Option<SessionRecorder>,
    session_clock_s: f64,
    tick_count: u64,
    playback_done: bool,
}

impl TickDriver {
    pub fn new(config: DriverConfig, style: StyleConfig, source: SnapshotSource) -> Self {
        let mut field_config = config.field.clone();
        field_config.capacity = field_config.capacity.min(style.element_count_cap);
        let field = ParticleField::new(field_config);

        Self {
            config,
            style,
            field,
            source,
            last_snapshot: MetricsSnapshot::silent(0.0),
            last_params: VisualParameters::default(),
            recorder: None,
            session_clock_s: 0.0,
            tick_count: 0,
            playback_done: false,
        }
    }

    pub fn style(&self) -> &StyleConfig {
        &self.style
    }

    pub fn field(&self) -> &ParticleField {
        &self.field
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    /// True once a playback source has delivered its final entry.
    pub fn finished(&self) -> bool {
        self.playback_done
    }

    /// The parameters used on the most recent tick.
    pub fn last_parameters(&self) -> &VisualParameters {
        &self.last_params
    }

    /// Run one tick: snapshot, map, record, advance. Returns the tick's
    /// draw records.
    pub fn step(&mut self, dt: f64) -> &[DrawRecord] {
        let (snapshot, params) = match &mut self.source {
            SnapshotSource::Live(capture) => {
                // A stale slot means no new analysis landed this tick; the
                // last snapshot stays in effect
                if let Some(snapshot) = capture.latest_snapshot() {
                    self.last_snapshot = snapshot;
                }
                let params = map_parameters(&self.last_snapshot, &self.style);
                (self.last_snapshot.clone(), params)
            }
            SnapshotSource::Playback(player) => {
                use crate::session::PlaybackStep;
                match player.advance(dt) {
                    PlaybackStep::Entry(entry) => {
                        // Recorded parameters drive the field directly; the
                        // mapper is not re-run on replay
                        self.last_snapshot = entry.metrics.clone();
                        (entry.metrics.clone(), entry.params)
                    }
                    PlaybackStep::End => {
                        self.playback_done = true;
                        let mut params = self.last_params;
                        params.spawn_rate = 0;
                        params.burst = false;
                        (self.last_snapshot.clone(), params)
                    }
                }
            }
            SnapshotSource::Idle => {
                let snapshot = MetricsSnapshot::silent(self.session_clock_s);
                let params = map_parameters(&snapshot, &self.style);
                (snapshot, params)
            }
        };

        if let Some(recorder) = &mut self.recorder {
            let entry = SessionEntry {
                timestamp_s: self.session_clock_s,
                metrics: snapshot,
                params,
            };
            if let Err(e) = recorder.append(&entry) {
                // Recording failure degrades to live-only, never kills ticks
                log::error!("recording stopped: {e}");
                self.recorder = None;
            }
            self.session_clock_s += dt;
        }

        self.last_params = params;
        self.tick_count += 1;
        self.field.tick(&params, dt)
    }

    /// Apply a command between ticks. Returns false for
    /// [`DriverCommand::Stop`].
    pub fn apply(&mut self, command: DriverCommand) -> bool {
        match command {
            DriverCommand::SetStyle(style) => {
                self.field.set_capacity(style.element_count_cap);
                self.style = style;
            }
            DriverCommand::StartRecording { path, user, title } => {
                let start_time = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0);
                let header = SessionHeader {
                    user,
                    title,
                    start_time,
                    tick_rate_hz: self.config.tick_rate_hz,
                    sample_rate_hz: self.config.sample_rate_hz,
                };
                match SessionRecorder::create(&path, &header) {
                    Ok(recorder) => {
                        self.session_clock_s = 0.0;
                        self.recorder = Some(recorder);
                    }
                    Err(e) => log::error!("cannot record to {}: {e}", path.display()),
                }
            }
            DriverCommand::StopRecording => self.stop_recording(),
            DriverCommand::Stop => return false,
        }
        true
    }

    /// Close the active recording, if any.
    pub fn stop_recording(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            if let Err(e) = recorder.close() {
                log::error!("closing recording failed: {e}");
            }
        }
    }

    /// Run the fixed-rate loop until a stop command arrives, the playback
    /// source ends, or `max_ticks` elapse. Each tick's draw records go to
    /// `sink`.
    pub fn run<F>(
        mut self,
        command_rx: Receiver<DriverCommand>,
        max_ticks: Option<u64>,
        mut sink: F,
    ) where
        F: FnMut(&[DrawRecord]),
    {
        let dt = 1.0 / self.config.tick_rate_hz;
        let period = Duration::from_secs_f64(dt);
        let mut next_tick = Instant::now();

        log::info!("tick driver running at {} Hz", self.config.tick_rate_hz);

        loop {
            loop {
                match command_rx.try_recv() {
                    Ok(command) => {
                        if !self.apply(command) {
                            log::info!("tick driver stopping");
                            self.stop_recording();
                            return;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.stop_recording();
                        return;
                    }
                }
            }

            sink(self.step(dt));

            if self.playback_done {
                log::info!("playback finished after {} ticks", self.tick_count);
                break;
            }
            if max_ticks.is_some_and(|max| self.tick_count >= max) {
                break;
            }

            next_tick += period;
            let now = Instant::now();
            if next_tick > now {
                std::thread::sleep(next_tick - now);
            } else {
                // Fell behind; skip the missed deadlines rather than burst
                next_tick = now;
            }
        }

        self.stop_recording();
    }
}
