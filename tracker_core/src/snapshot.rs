//! Serializable state dumps and the diagnostic event history.
//!
//! Snapshots carry numeric histograms, never rendered output; turning them
//! into pictures is up to whoever consumes them.

use crate::{
    person_tracker::PersonTracker,
    room_graph::RoomGraph,
    types::{PersonId, PhoneId, RoomId, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A past observation with the room resolved to its name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservedRoom {
    pub time: Timestamp,
    pub room: RoomId,
}

/// Belief of one tracker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersonSnapshot {
    /// Most occupied room
    pub estimate: RoomId,
    /// Particle count per occupied room; sums to the particle count
    pub histogram: BTreeMap<RoomId, usize>,
    /// Normalised occupancy per occupied room
    pub distribution: BTreeMap<RoomId, f64>,
    /// Last observations, oldest first
    pub observations: Vec<ObservedRoom>,
    pub generic: bool,
    pub degenerate_resamples: u64,
    pub last_updated: Option<Timestamp>,
}

impl PersonSnapshot {
    pub fn from_tracker(tracker: &PersonTracker, graph: &RoomGraph) -> Self {
        let n = tracker.particle_count().max(1) as f64;
        let mut histogram = BTreeMap::new();
        let mut distribution = BTreeMap::new();
        for (i, &count) in tracker.histogram().iter().enumerate() {
            if count == 0 {
                continue;
            }
            let room = graph.rooms()[i].clone();
            distribution.insert(room.clone(), count as f64 / n);
            histogram.insert(room, count);
        }
        Self {
            estimate: graph.room(tracker.estimate()).clone(),
            histogram,
            distribution,
            observations: tracker
                .observations()
                .map(|o| ObservedRoom {
                    time: o.time,
                    room: graph.room(o.room).clone(),
                })
                .collect(),
            generic: tracker.generic,
            degenerate_resamples: tracker.degenerate_resamples,
            last_updated: tracker.last_updated,
        }
    }

    /// Total particles represented by the histogram.
    pub fn particle_total(&self) -> usize {
        self.histogram.values().sum()
    }
}

/// Phone bookkeeping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhoneSnapshot {
    pub person: Option<PersonId>,
    pub location: Option<RoomId>,
    pub last_update: Option<Timestamp>,
}

/// Everything the tracker believes at one moment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    /// Latest event or step time seen
    pub time: Option<Timestamp>,
    pub persons: BTreeMap<PersonId, PersonSnapshot>,
    pub phones: BTreeMap<PhoneId, PhoneSnapshot>,
}

impl TrackerSnapshot {
    pub fn estimates(&self) -> BTreeMap<PersonId, RoomId> {
        self.persons
            .iter()
            .map(|(id, p)| (id.clone(), p.estimate.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Event history
// ---------------------------------------------------------------------------

/// What an entry of the event history records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Motion trigger, resolved to a person.
    Motion { room: RoomId, person: PersonId },
    /// Presence sensor change; only "present" is attributed.
    Presence {
        room: RoomId,
        present: bool,
        person: Option<PersonId>,
    },
    /// Phone location hint; attributed when the phone is associated.
    Phone {
        phone: PhoneId,
        room: RoomId,
        person: Option<PersonId>,
    },
}

/// One processed event, kept for diagnostics only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub time: Timestamp,
    pub event: EventKind,
}
