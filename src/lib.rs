// FallGuard - Fall detection engine
//
// Sensor samples go in, confirmed falls come out. The engine is plain
// synchronous Rust and runs unchanged on the watch and on a desktop; the
// `tasks` module wires it into threads and channels.
//
//   filter       exponential smoothing of accelerometer vectors
//   history      fixed-size rolling windows with mean/variance
//   orientation  upright vs. horizontal from the gravity sensor
//   classifier   free-fall / impact / orientation / tumbling heuristics
//   immobility   post-suspicion stillness check
//   controller   start/stop, sample routing, cooldown, alert delivery
//   simulation   scripted fall signatures
//   trace        recorded sensor traces for replay

pub mod classifier;
pub mod clock;
pub mod config;
pub mod controller;
pub mod events;
pub mod filter;
pub mod history;
pub mod immobility;
pub mod orientation;
pub mod simulation;
pub mod tasks;
pub mod trace;

pub use config::{ConfigError, FallConfig};
pub use controller::{AlertSink, DetectionController};
pub use events::{AlertEvent, FallType, FeedOutcome, Sample, SensorKind, Trigger};
