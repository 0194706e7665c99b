//! Particle field simulation
//!
//! Owns every live particle and advances the whole set by one tick at a
//! time. The field never draws: each tick ends with an ordered list of
//! draw records handed to whatever renderer sits outside the core.

mod particle;

pub use particle::{hsv_to_rgb, Particle, ParticleKind};

use noise::{NoiseFn, Perlin};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::mapper::VisualParameters;

/// Hard ceiling on live particles regardless of configuration.
pub const MAX_FIELD_CAPACITY: usize = 4096;

/// Particles in a beat burst ring (before symmetry mirroring)
const BURST_RING: usize = 24;

/// Downward pull on spark particles, field units per second squared
const SPARK_GRAVITY: f64 = 0.25;

/// Lateral wave displacement amplitude, field units per second
const WAVE_AMPLITUDE: f64 = 0.12;

/// Flow field sampling scale and drift speed
const FLOW_SCALE: f64 = 3.0;
const FLOW_SPEED: f64 = 0.12;

/// Per-tick velocity retention for burst particles (at 60 ticks/s)
const BURST_DECAY: f64 = 0.92;

/// Field construction parameters.
#[derive(Debug, Clone)]
pub struct FieldConfig {
    /// Maximum live particles (clamped to [`MAX_FIELD_CAPACITY`])
    pub capacity: usize,

    /// Lifetime of ordinary particles, in ticks
    pub default_max_age: u32,

    /// Lifetime of burst particles, in ticks
    pub burst_max_age: u32,

    /// Seed for the flow noise and spawn jitter
    pub seed: u32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            capacity: 2000,
            default_max_age: 180,
            burst_max_age: 45,
            seed: 7,
        }
    }
}

/// One renderable particle, in field coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRecord {
    pub x: f64,
    pub y: f64,
    pub color: [f64; 3],
    pub alpha: f64,
    pub size: f64,
}

/// The particle simulation. Exclusively owns its particles; one tick
/// driver thread mutates it, nothing else.
pub struct ParticleField {
    config: FieldConfig,
    live: Vec<Particle>,
    pool: Vec<Particle>,
    draw: Vec<DrawRecord>,
    rng: StdRng,
    flow: Perlin,
    flow_t: f64,
    wave_phase: f64,
    next_id: u64,
}

impl ParticleField {
    pub fn new(config: FieldConfig) -> Self {
        let capacity = config.capacity.min(MAX_FIELD_CAPACITY);
        let seed = config.seed;
        Self {
            config: FieldConfig { capacity, ..config },
            live: Vec::with_capacity(capacity),
            pool: Vec::new(),
            draw: Vec::new(),
            rng: StdRng::seed_from_u64(u64::from(seed)),
            flow: Perlin::new(seed),
            flow_t: 0.0,
            wave_phase: 0.0,
            next_id: 0,
        }
    }

    /// Number of live particles.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Retarget the capacity (style changes land between ticks). Shrinking
    /// only throttles future spawns; existing particles age out normally.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.config.capacity = capacity.min(MAX_FIELD_CAPACITY);
    }

    /// Live particles in field order.
    pub fn particles(&self) -> &[Particle] {
        &self.live
    }

    /// Advance the simulation by one tick and return the draw records.
    ///
    /// Malformed parameters are clamped, never rejected: the field must
    /// keep rendering through whatever a broken mapper or a corrupt
    /// session entry feeds it.
    pub fn tick(&mut self, params: &VisualParameters, dt: f64) -> &[DrawRecord] {
        let params = sanitize(params);
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 1.0 / 60.0 };

        self.age_and_evict();
        self.spawn(&params);
        self.advance(&params, dt);
        self.emit();

        &self.draw
    }

    /// Draw records from the most recent tick.
    pub fn draw_records(&self) -> &[DrawRecord] {
        &self.draw
    }

    /// Age every particle one tick and return expired ones to the pool.
    fn age_and_evict(&mut self) {
        let pool = &mut self.pool;
        self.live.retain_mut(|p| {
            p.age += 1;
            if p.age >= p.max_age {
                pool.push(*p);
                false
            } else {
                true
            }
        });
    }

    /// Spawn up to `spawn_rate` particles plus any burst ring, silently
    /// capping at capacity. Symmetry mirrors each emitted particle as an
    /// independent sibling.
    fn spawn(&mut self, params: &VisualParameters) {
        let mut budget = params.spawn_rate as usize;
        if params.burst && params.effects.particles {
            budget += BURST_RING;
        }

        let mut spawned: Vec<Particle> = Vec::new();
        let mut burst_left = if params.burst && params.effects.particles {
            BURST_RING
        } else {
            0
        };

        for _ in 0..budget {
            if self.live.len() + spawned.len() >= self.config.capacity {
                break;
            }
            let particle = if burst_left > 0 {
                burst_left -= 1;
                self.make_burst_particle(params, burst_left)
            } else {
                self.make_particle(params)
            };
            spawned.push(particle);
        }

        if params.effects.symmetry {
            let mut mirrored = Vec::with_capacity(spawned.len());
            for p in &spawned {
                if self.live.len() + spawned.len() + mirrored.len() >= self.config.capacity {
                    break;
                }
                let mut m = *p;
                m.id = self.take_id();
                m.x = 1.0 - p.x;
                m.vx = -p.vx;
                m.phase = -p.phase;
                mirrored.push(m);
            }
            spawned.extend(mirrored);
        }

        self.live.extend(spawned);
    }

    fn make_particle(&mut self, params: &VisualParameters) -> Particle {
        let kind = if params.effects.wave {
            ParticleKind::Wave
        } else if self.rng.gen_bool(0.5) {
            ParticleKind::Spark
        } else {
            ParticleKind::Flow
        };

        let mut template = self.blank(params);
        template.kind = kind;
        template.x = self.rng.gen_range(0.0..1.0);
        template.y = self.rng.gen_range(0.0..1.0);
        template.vx = self.rng.gen_range(-0.15..0.15);
        template.vy = self.rng.gen_range(-0.15..0.15);
        template.max_age = self.config.default_max_age;
        template
    }

    fn make_burst_particle(&mut self, params: &VisualParameters, index: usize) -> Particle {
        let angle = index as f64 / BURST_RING as f64 * std::f64::consts::TAU;
        let speed = self.rng.gen_range(0.25..0.45);

        let mut template = self.blank(params);
        template.kind = ParticleKind::Burst;
        template.x = 0.5;
        template.y = 0.5;
        template.vx = angle.cos() * speed;
        template.vy = angle.sin() * speed;
        template.max_age = self.config.burst_max_age;
        template
    }

    /// Base particle carrying the tick's color and size, recycled from the
    /// pool when one is available.
    fn blank(&mut self, params: &VisualParameters) -> Particle {
        let id = self.take_id();
        let hue = (params.hue + self.rng.gen_range(-15.0..15.0)).rem_euclid(360.0);
        let size = params.size_scale * self.rng.gen_range(0.5..1.5);
        let phase = self.rng.gen_range(0.0..std::f64::consts::TAU);

        let mut p = self.pool.pop().unwrap_or(Particle {
            id: 0,
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            hue: 0.0,
            saturation: 0.0,
            value: 0.0,
            spawn_alpha: 0.0,
            size: 0.0,
            age: 0,
            max_age: 0,
            kind: ParticleKind::Spark,
            phase: 0.0,
        });

        p.id = id;
        p.age = 0;
        p.hue = hue;
        p.saturation = 0.85;
        p.value = 1.0;
        p.spawn_alpha = params.alpha_scale;
        p.size = size;
        p.phase = phase;
        p
    }

    fn take_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Integrate every particle with its kind-specific forces.
    fn advance(&mut self, params: &VisualParameters, dt: f64) {
        self.wave_phase += params.wave_frequency_hz.min(40.0) * std::f64::consts::TAU * dt * 0.05;
        self.flow_t += dt * FLOW_SPEED;

        let speed = params.speed_scale;
        let burst_retention = BURST_DECAY.powf(dt * 60.0);

        for p in &mut self.live {
            match p.kind {
                ParticleKind::Spark => {
                    p.vy += SPARK_GRAVITY * dt;
                }
                ParticleKind::Wave => {
                    p.x += (self.wave_phase + p.phase).sin() * WAVE_AMPLITUDE * speed * dt;
                }
                ParticleKind::Flow => {
                    let angle = self.flow.get([p.x * FLOW_SCALE, p.y * FLOW_SCALE, self.flow_t])
                        * std::f64::consts::TAU;
                    p.vx += (angle.cos() * 0.2 - p.vx) * (4.0 * dt).min(1.0);
                    p.vy += (angle.sin() * 0.2 - p.vy) * (4.0 * dt).min(1.0);
                }
                ParticleKind::Burst => {
                    p.vx *= burst_retention;
                    p.vy *= burst_retention;
                }
            }

            p.x += p.vx * speed * dt;
            p.y += p.vy * speed * dt;

            // Bounce at the unit-square edges
            if p.x < 0.0 || p.x > 1.0 {
                p.vx = -p.vx;
                p.x = p.x.clamp(0.0, 1.0);
            }
            if p.y < 0.0 || p.y > 1.0 {
                p.vy = -p.vy;
                p.y = p.y.clamp(0.0, 1.0);
            }
        }
    }

    /// Rebuild the draw list from the live set, applying the age fade.
    fn emit(&mut self) {
        self.draw.clear();
        self.draw.extend(self.live.iter().map(|p| {
            let life = p.life_ratio();
            // Fade out over the last fifth of a particle's life
            let fade = if life < 0.2 { life / 0.2 } else { 1.0 };
            DrawRecord {
                x: p.x,
                y: p.y,
                color: hsv_to_rgb(p.hue, p.saturation, p.value),
                alpha: (p.spawn_alpha * fade).clamp(0.0, 1.0),
                size: p.size,
            }
        }));
    }
}

/// Clamp malformed parameters into drawable ranges.
fn sanitize(params: &VisualParameters) -> VisualParameters {
    let mut p = *params;

    if !p.size_scale.is_finite() || p.size_scale <= 0.0 {
        log::debug!("clamping invalid size_scale {}", p.size_scale);
        p.size_scale = 0.01;
    }
    if !p.speed_scale.is_finite() || p.speed_scale <= 0.0 {
        log::debug!("clamping invalid speed_scale {}", p.speed_scale);
        p.speed_scale = 1.0;
    }
    if !p.alpha_scale.is_finite() {
        p.alpha_scale = 0.0;
    }
    p.alpha_scale = p.alpha_scale.clamp(0.0, 1.0);
    if !p.hue.is_finite() {
        p.hue = 0.0;
    }
    p.hue = p.hue.rem_euclid(360.0);
    if !p.wave_frequency_hz.is_finite() || p.wave_frequency_hz < 0.0 {
        p.wave_frequency_hz = 0.0;
    }

    p
}
