//! Error types for the tracking core.

use crate::types::RoomId;
use thiserror::Error;

/// Errors surfaced by graph construction, configuration and event handling.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// A room name that the room graph does not declare.
    #[error("unknown room: {0}")]
    UnknownRoom(RoomId),

    /// The adjacency description declared no rooms at all.
    #[error("room graph has no rooms")]
    EmptyGraph,

    /// A configuration value outside its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An event time that is NaN or infinite.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(f64),

    /// The snapshot sink worker thread could not be started.
    #[error("failed to start snapshot worker: {0}")]
    SinkWorker(String),
}

/// Result type for tracking operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Failure reported by a [`SnapshotSink`](crate::debug::SnapshotSink).
///
/// Sink failures are logged by the worker and never reach the tracker.
#[derive(Error, Debug)]
#[error("snapshot sink failed: {0}")]
pub struct SinkError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

impl SinkError {
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_room_names_the_room() {
        let err = TrackerError::UnknownRoom(RoomId::from("attic"));
        assert_eq!(err.to_string(), "unknown room: attic");
    }

    #[test]
    fn sink_error_wraps_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = SinkError::new(io);
        assert!(err.to_string().contains("read-only"));
    }
}
