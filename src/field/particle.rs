//! Particle entity and kind-specific motion

use serde::{Deserialize, Serialize};

/// Behavior class of a particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleKind {
    /// Falls under a gravity-like pull
    Spark,
    /// Rides a sinusoidal lateral displacement
    Wave,
    /// Drifts along a Perlin flow field
    Flow,
    /// Flies radially outward with decaying speed
    Burst,
}

/// One live visual entity. Owned exclusively by the field; nothing outside
/// the field ever mutates a particle.
#[derive(Debug, Clone, Copy)]
pub struct Particle {
    pub id: u64,

    /// Position in the unit square [0,1] x [0,1]
    pub x: f64,
    pub y: f64,

    /// Base velocity in field units per second, before the speed scale
    pub vx: f64,
    pub vy: f64,

    /// HSV color plus the alpha the particle was spawned with
    pub hue: f64,
    pub saturation: f64,
    pub value: f64,
    pub spawn_alpha: f64,

    pub size: f64,

    /// Age in ticks; the particle is evicted once `age >= max_age`
    pub age: u32,
    pub max_age: u32,

    pub kind: ParticleKind,

    /// Per-particle phase offset for wave motion
    pub phase: f64,
}

impl Particle {
    /// Remaining-life fraction in (0, 1]; drives the age fade.
    pub fn life_ratio(&self) -> f64 {
        if self.max_age == 0 {
            return 0.0;
        }
        (1.0 - f64::from(self.age) / f64::from(self.max_age)).clamp(0.0, 1.0)
    }
}

/// Convert HSV (h in degrees, s/v in [0,1]) to RGB in [0,1].
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> [f64; 3] {
    let h = h.rem_euclid(360.0) / 60.0;
    let i = h.floor();
    let f = h - i;

    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match i as u32 % 6 {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}
