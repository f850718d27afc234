//! Fundamental types used across the entire workspace.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Time: f64 seconds throughout (wall clock or simulation clock, caller's choice)
// ---------------------------------------------------------------------------

/// Event / query time in seconds.
pub type Timestamp = f64;

// ---------------------------------------------------------------------------
// Identifier types: newtype wrappers so IDs are never confused at compile time
// ---------------------------------------------------------------------------

/// Name of a room as declared in the adjacency description.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

/// Name of a tracked occupant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub String);

/// Name of a phone reporting location hints.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneId(pub String);

/// Dense index of a room inside one [`RoomGraph`](crate::room_graph::RoomGraph).
///
/// Rooms are stored sorted by name, so comparing indices compares names.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RoomIdx(pub usize);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PersonId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PhoneId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PhoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RoomIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PersonId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PersonId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PhoneId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PhoneId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// A sensor event attributed to a track: where and when it fired.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub time: Timestamp,
    pub room: RoomIdx,
}

// ---------------------------------------------------------------------------
// Event source
// ---------------------------------------------------------------------------

/// Who an incoming sensor event belongs to, as far as the caller knows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
    /// A person id, or a phone id associated with a person. Unknown ids
    /// create a new person of that name.
    Known(String),
    /// A shared sensor: any active occupant could have fired it.
    Ambient,
}

impl From<&str> for EventSource {
    fn from(s: &str) -> Self {
        EventSource::Known(s.to_owned())
    }
}

impl From<&PersonId> for EventSource {
    fn from(p: &PersonId) -> Self {
        EventSource::Known(p.0.clone())
    }
}

impl From<Option<&str>> for EventSource {
    fn from(s: Option<&str>) -> Self {
        s.map_or(EventSource::Ambient, EventSource::from)
    }
}
