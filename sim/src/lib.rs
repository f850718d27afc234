//! `sim`: House simulator: occupant motion, sensor events, replay.

pub mod frame_sink;
pub mod occupant;
pub mod replay;
pub mod scenarios;
pub mod sensor_sim;

pub use frame_sink::JsonFrameSink;
pub use occupant::{Occupant, OccupantMotion};
pub use replay::{load_replay, replay, replay_with_sink, save_replay, ReplayLog, ReplayOutcome};
pub use scenarios::{Scenario, ScenarioKind};
pub use sensor_sim::{SensorEvent, SensorSimConfig, SensorSimulator};
