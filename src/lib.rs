//! Real-time sensory input to parametric particle visuals.
//!
//! The pipeline is three stages with plain value types between them:
//! a feature extractor turns audio chunks (or camera frames) into
//! [`metrics::MetricsSnapshot`]s, the mapper turns a snapshot plus a
//! [`style::StyleConfig`] into [`mapper::VisualParameters`], and the
//! [`field::ParticleField`] turns parameters into draw records. The
//! [`driver::TickDriver`] runs that pipeline at a fixed rate and can
//! record every tick to a session file that the
//! [`session::SessionPlayer`] replays through the identical path.

pub mod audio;
pub mod driver;
pub mod field;
pub mod mapper;
pub mod metrics;
pub mod session;
pub mod style;
pub mod vision;

pub use driver::{DriverCommand, DriverConfig, SnapshotSource, TickDriver};
pub use field::{DrawRecord, FieldConfig, ParticleField};
pub use mapper::{map_parameters, VisualParameters};
pub use metrics::MetricsSnapshot;
pub use session::{SessionPlayer, SessionRecorder};
pub use style::{Palette, StyleConfig};
