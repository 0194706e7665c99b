//! User style configuration consumed by the parameter mapper
//!
//! This is a plain value threaded through mapper calls, never global state.
//! External collaborators (settings UI, natural-language style commands)
//! produce one of these; the core only ever reads it.

use serde::{Deserialize, Serialize};

/// Color palette selection.
///
/// A palette is a hue arc: the mapper places the (log-scaled) dominant
/// frequency onto `hue_base .. hue_base + hue_span`, wrapping at 360.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Palette {
    /// Full hue circle, low frequencies red through high frequencies violet
    Spectrum,
    /// Cyan through deep blue
    Ocean,
    /// Magenta through orange, wrapping past red
    Sunset,
    /// Green through electric blue
    Neon,
    /// Desaturated white
    Mono,
}

impl Palette {
    /// Start of the hue arc in degrees.
    pub fn hue_base(self) -> f64 {
        match self {
            Palette::Spectrum => 0.0,
            Palette::Ocean => 160.0,
            Palette::Sunset => 300.0,
            Palette::Neon => 90.0,
            Palette::Mono => 0.0,
        }
    }

    /// Width of the hue arc in degrees.
    pub fn hue_span(self) -> f64 {
        match self {
            Palette::Spectrum => 360.0,
            Palette::Ocean => 90.0,
            Palette::Sunset => 120.0,
            Palette::Neon => 120.0,
            Palette::Mono => 0.0,
        }
    }

    /// Hue for a unit position `t` in [0, 1] along the arc.
    pub fn hue_at(self, t: f64) -> f64 {
        (self.hue_base() + t.clamp(0.0, 1.0) * self.hue_span()).rem_euclid(360.0)
    }

    /// Base color saturation for this palette.
    pub fn saturation(self) -> f64 {
        match self {
            Palette::Mono => 0.0,
            _ => 0.85,
        }
    }

    /// Look up a palette by name (case-insensitive).
    pub fn by_name(name: &str) -> Option<Palette> {
        match name.to_lowercase().as_str() {
            "spectrum" => Some(Palette::Spectrum),
            "ocean" => Some(Palette::Ocean),
            "sunset" => Some(Palette::Sunset),
            "neon" => Some(Palette::Neon),
            "mono" => Some(Palette::Mono),
            _ => None,
        }
    }
}

/// User-facing visualization style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Color palette
    pub palette: Palette,

    /// Upper bound on live particles (clamped to the field's hard cap)
    pub element_count_cap: usize,

    /// User size multiplier applied on top of the audio-driven size
    pub size_multiplier: f64,

    /// User speed multiplier applied on top of the audio-driven speed
    pub speed_multiplier: f64,

    /// Enable beat-triggered burst particles
    pub particles_enabled: bool,

    /// Enable sinusoidal wave motion
    pub wave_mode: bool,

    /// Mirror emitted particles across the vertical center axis
    pub symmetry: bool,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            palette: Palette::Spectrum,
            element_count_cap: 2000,
            size_multiplier: 1.0,
            speed_multiplier: 1.0,
            particles_enabled: true,
            wave_mode: false,
            symmetry: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum_covers_the_full_hue_circle() {
        assert_eq!(Palette::Spectrum.hue_at(0.0), 0.0);
        assert_eq!(Palette::Spectrum.hue_at(0.5), 180.0);
        // t = 1.0 wraps back to 0
        assert_eq!(Palette::Spectrum.hue_at(1.0), 0.0);
    }

    #[test]
    fn sunset_wraps_past_red() {
        let hue = Palette::Sunset.hue_at(0.75);
        assert!((hue - 30.0).abs() < 1e-9, "300 + 90 should wrap to 30, got {hue}");
    }

    #[test]
    fn mono_palette_is_desaturated() {
        assert_eq!(Palette::Mono.saturation(), 0.0);
        assert_eq!(Palette::Mono.hue_span(), 0.0);
    }

    #[test]
    fn palette_lookup_is_case_insensitive() {
        assert_eq!(Palette::by_name("OCEAN"), Some(Palette::Ocean));
        assert_eq!(Palette::by_name("Neon"), Some(Palette::Neon));
        assert_eq!(Palette::by_name("nope"), None);
    }

    #[test]
    fn partial_style_json_fills_in_defaults() {
        let style: StyleConfig = serde_json::from_str(r#"{"palette":"ocean","symmetry":true}"#).unwrap();

        assert_eq!(style.palette, Palette::Ocean);
        assert!(style.symmetry);
        assert_eq!(style.element_count_cap, 2000);
        assert_eq!(style.size_multiplier, 1.0);
        assert!(style.particles_enabled);
    }
}
