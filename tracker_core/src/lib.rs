//! `tracker_core`: Room-level occupant tracking from binary sensor events.
//!
//! # Module layout
//! - [`types`]         : Fundamental types (IDs, timestamps, observations)
//! - [`error`]         : Error types
//! - [`room_graph`]    : Room adjacency, BFS distance and next hop
//! - [`sensor_model`]  : Time-decayed "still present" likelihood per room
//! - [`person_tracker`]: Per-person particle filter
//! - [`disambiguation`]: Assigning shared-sensor events to tracks
//! - [`multi_tracker`] : Orchestrator owning every tracker and phone
//! - [`snapshot`]      : Serializable state dumps and event history
//! - [`debug`]         : Debug frame hand-off to an external renderer
//! - [`metrics`]       : Accuracy against ground truth

pub mod debug;
pub mod disambiguation;
pub mod error;
pub mod metrics;
pub mod multi_tracker;
pub mod person_tracker;
pub mod room_graph;
pub mod sensor_model;
pub mod snapshot;
pub mod types;

pub use debug::{DebugFrame, SinkStats, SnapshotSink};
pub use error::{SinkError, TrackerError, TrackerResult};
pub use multi_tracker::{MultiPersonTracker, TrackerConfig};
pub use room_graph::RoomGraph;
pub use snapshot::{EventKind, EventRecord, PersonSnapshot, TrackerSnapshot};
pub use types::{EventSource, PersonId, PhoneId, RoomId, RoomIdx, Timestamp};
