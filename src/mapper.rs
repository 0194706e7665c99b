//! Parameter mapping - metrics snapshot + style to visual parameters
//!
//! [`map_parameters`] is pure and total: identical inputs always produce
//! identical output, every finite or non-finite snapshot maps to something
//! drawable, and nothing is allocated.

use serde::{Deserialize, Serialize};

use crate::metrics::{MetricsSnapshot, DB_FLOOR};
use crate::style::StyleConfig;

/// Audible range used for the log-linear frequency-to-hue mapping.
pub const FREQ_MIN_HZ: f64 = 20.0;
pub const FREQ_MAX_HZ: f64 = 20_000.0;

/// Particles spawned per unit amplitude
const SPAWN_GAIN: f64 = 40.0;

/// Hard per-tick spawn ceiling, before the field's capacity throttle
pub const MAX_SPAWN_PER_TICK: u32 = 64;

/// Baseline particle size in field units
const BASE_SIZE: f64 = 0.01;

/// Size growth per unit RMS
const SIZE_GAIN: f64 = 2.0;

/// Baseline speed multiplier
const BASE_SPEED: f64 = 1.0;

/// Speed growth per unit amplitude
const SPEED_GAIN: f64 = 1.5;

/// Which optional effects are active this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EffectSet {
    pub particles: bool,
    pub wave: bool,
    pub symmetry: bool,
}

/// One tick's worth of visual control values, derived from a single
/// metrics snapshot. This is what gets recorded and what drives the field;
/// replaying these exactly reproduces the visuals without the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualParameters {
    /// Particles to spawn this tick
    pub spawn_rate: u32,

    /// Particle size scale (> 0, field units)
    pub size_scale: f64,

    /// Base hue in degrees [0, 360)
    pub hue: f64,

    /// Opacity scale [0, 1]
    pub alpha_scale: f64,

    /// Velocity multiplier (> 0)
    pub speed_scale: f64,

    /// Drive frequency for wave motion, carried so replayed parameters
    /// fully determine the field without the metrics
    pub wave_frequency_hz: f64,

    /// Spawn a burst ring this tick (beat + particles effect)
    pub burst: bool,

    /// Active effects
    pub effects: EffectSet,
}

impl Default for VisualParameters {
    fn default() -> Self {
        Self {
            spawn_rate: 0,
            size_scale: BASE_SIZE,
            hue: 0.0,
            alpha_scale: 0.0,
            speed_scale: BASE_SPEED,
            wave_frequency_hz: 0.0,
            burst: false,
            effects: EffectSet::default(),
        }
    }
}

/// Map one metrics snapshot to visual parameters under the given style.
pub fn map_parameters(metrics: &MetricsSnapshot, style: &StyleConfig) -> VisualParameters {
    let amplitude = finite_or_zero(metrics.amplitude).max(0.0);
    let rms = finite_or_zero(metrics.rms).max(0.0);
    let decibels = finite_or(metrics.decibels, DB_FLOOR);
    let frequency = finite_or_zero(metrics.dominant_frequency_hz).max(0.0);

    let spawn_rate = ((amplitude * SPAWN_GAIN).round() as u32).min(MAX_SPAWN_PER_TICK);

    let size_scale =
        (BASE_SIZE * (1.0 + rms * SIZE_GAIN) * sane_multiplier(style.size_multiplier)).max(1e-4);

    let hue = style.palette.hue_at(frequency_to_unit(frequency));

    let alpha_scale = ((decibels - DB_FLOOR) / -DB_FLOOR).clamp(0.0, 1.0);

    let speed_scale =
        (BASE_SPEED * (1.0 + amplitude * SPEED_GAIN) * sane_multiplier(style.speed_multiplier))
            .max(1e-4);

    VisualParameters {
        spawn_rate,
        size_scale,
        hue,
        alpha_scale,
        speed_scale,
        wave_frequency_hz: frequency,
        burst: metrics.beat && style.particles_enabled,
        effects: EffectSet {
            particles: style.particles_enabled,
            wave: style.wave_mode,
            symmetry: style.symmetry,
        },
    }
}

/// Log-linear position of a frequency within the audible range, in [0, 1].
/// Frequencies at or below `FREQ_MIN_HZ` (including silence) map to 0.
pub fn frequency_to_unit(hz: f64) -> f64 {
    if hz <= FREQ_MIN_HZ {
        return 0.0;
    }
    let clamped = hz.min(FREQ_MAX_HZ);
    (clamped / FREQ_MIN_HZ).ln() / (FREQ_MAX_HZ / FREQ_MIN_HZ).ln()
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn finite_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        fallback
    }
}

fn sane_multiplier(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Palette;

    fn snapshot(amplitude: f64, rms: f64, db: f64, freq: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp_s: 0.0,
            amplitude,
            rms,
            peak: rms,
            decibels: db,
            dominant_frequency_hz: freq,
            energy: 0.0,
            beat: false,
            extra: None,
        }
    }

    #[test]
    fn identical_inputs_produce_identical_parameters() {
        let metrics = snapshot(0.4, 0.3, -12.0, 880.0);
        let style = StyleConfig::default();

        let a = map_parameters(&metrics, &style);
        let b = map_parameters(&metrics, &style);
        assert_eq!(a, b);
    }

    #[test]
    fn silent_snapshot_maps_to_idle_parameters() {
        let params = map_parameters(&MetricsSnapshot::silent(0.0), &StyleConfig::default());

        assert_eq!(params.spawn_rate, 0);
        assert_eq!(params.alpha_scale, 0.0);
        assert_eq!(params.hue, 0.0);
        assert!(!params.burst);
        assert!(params.size_scale > 0.0);
        assert!(params.speed_scale > 0.0);
    }

    #[test]
    fn spawn_rate_is_clamped_to_the_per_tick_ceiling() {
        let params = map_parameters(&snapshot(10.0, 0.5, 0.0, 440.0), &StyleConfig::default());
        assert_eq!(params.spawn_rate, MAX_SPAWN_PER_TICK);
    }

    #[test]
    fn hue_follows_the_log_frequency_mapping() {
        let style = StyleConfig::default();
        let params = map_parameters(&snapshot(0.3, 0.3, -10.0, 440.0), &style);

        let expected = 360.0 * (440.0f64 / 20.0).ln() / (1000.0f64).ln();
        assert!(
            (params.hue - expected).abs() < 1e-9,
            "expected hue {expected}, got {}",
            params.hue
        );
    }

    #[test]
    fn subsonic_frequencies_map_to_the_palette_start() {
        let style = StyleConfig {
            palette: Palette::Ocean,
            ..Default::default()
        };

        let low = map_parameters(&snapshot(0.1, 0.1, -20.0, 5.0), &style);
        let silent = map_parameters(&snapshot(0.1, 0.1, -20.0, 0.0), &style);

        assert_eq!(low.hue, Palette::Ocean.hue_base());
        assert_eq!(silent.hue, Palette::Ocean.hue_base());
    }

    #[test]
    fn alpha_normalizes_the_db_floor_to_zero_and_full_scale_to_one() {
        let style = StyleConfig::default();

        let quiet = map_parameters(&snapshot(0.0, 0.0, DB_FLOOR, 0.0), &style);
        let loud = map_parameters(&snapshot(1.0, 1.0, 0.0, 440.0), &style);
        let over = map_parameters(&snapshot(1.0, 1.0, 6.0, 440.0), &style);

        assert_eq!(quiet.alpha_scale, 0.0);
        assert_eq!(loud.alpha_scale, 1.0);
        assert_eq!(over.alpha_scale, 1.0);
    }

    #[test]
    fn non_finite_metrics_map_without_panicking() {
        let metrics = snapshot(f64::NAN, f64::INFINITY, f64::NEG_INFINITY, f64::NAN);
        let params = map_parameters(&metrics, &StyleConfig::default());

        assert_eq!(params.spawn_rate, 0);
        assert!(params.size_scale.is_finite() && params.size_scale > 0.0);
        assert!(params.speed_scale.is_finite() && params.speed_scale > 0.0);
        assert!((0.0..360.0).contains(&params.hue));
        assert!((0.0..=1.0).contains(&params.alpha_scale));
    }

    #[test]
    fn effects_come_from_style_not_metrics() {
        let style = StyleConfig {
            wave_mode: true,
            symmetry: true,
            particles_enabled: false,
            ..Default::default()
        };

        let mut metrics = snapshot(0.9, 0.9, 0.0, 440.0);
        metrics.beat = true;
        let params = map_parameters(&metrics, &style);

        assert!(params.effects.wave);
        assert!(params.effects.symmetry);
        assert!(!params.effects.particles);
        // burst requires the particles effect, beat alone is not enough
        assert!(!params.burst);
    }

    #[test]
    fn user_multipliers_scale_size_and_speed() {
        let metrics = snapshot(0.5, 0.5, -10.0, 440.0);
        let base = map_parameters(&metrics, &StyleConfig::default());
        let doubled = map_parameters(
            &metrics,
            &StyleConfig {
                size_multiplier: 2.0,
                speed_multiplier: 2.0,
                ..Default::default()
            },
        );

        assert!((doubled.size_scale - base.size_scale * 2.0).abs() < 1e-12);
        assert!((doubled.speed_scale - base.speed_scale * 2.0).abs() < 1e-12);
    }
}
