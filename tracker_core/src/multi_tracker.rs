//! Multi-person orchestrator: routes events to per-person particle filters.
//!
//! # Processing an event
//! 1. Resolve the room name (unknown rooms fail before anything changes)
//! 2. Resolve the person: known person → phone association → create, or for
//!    ambient sensors: disambiguation against live tracks → new generic person
//! 3. Record the trigger / presence in the shared sensor model
//! 4. Run that person's filter step
//! 5. Append to the event history (pruned to `history_window`)
//! 6. Hand a debug frame to the sink worker, at most once per
//!    `snapshot_interval`
//!
//! `step` advances every tracker without evidence; trackers only read the
//! shared graph and sensor model and own their RNG, so they are stepped in
//! parallel without affecting reproducibility.

use crate::{
    debug::{DebugFrame, SinkStats, SinkWorker, SnapshotSink},
    disambiguation::{assign, Assignment, DisambiguationConfig},
    error::{TrackerError, TrackerResult},
    person_tracker::{ParticleFilterConfig, PersonTracker},
    room_graph::RoomGraph,
    sensor_model::{SensorModel, SensorModelConfig},
    snapshot::{EventKind, EventRecord, PersonSnapshot, PhoneSnapshot, TrackerSnapshot},
    types::{EventSource, PersonId, PhoneId, RoomId, RoomIdx, Timestamp},
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for a tracking session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub particles: ParticleFilterConfig,
    pub sensor: SensorModelConfig,
    pub disambiguation: DisambiguationConfig,
    /// Seconds of event history kept for diagnostics
    pub history_window: f64,
    /// Minimum tracker-time seconds between two debug frames
    pub snapshot_interval: f64,
    /// Debug frames buffered before new ones are dropped
    pub snapshot_queue: usize,
    /// Base seed; tracker k is seeded with `seed + k`
    pub seed: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            particles: ParticleFilterConfig::default(),
            sensor: SensorModelConfig::default(),
            disambiguation: DisambiguationConfig::default(),
            history_window: 3600.0,
            snapshot_interval: 60.0,
            snapshot_queue: 64,
            seed: 0,
        }
    }
}

impl TrackerConfig {
    /// Reject any configuration the tracker cannot run with.
    pub fn validate(&self) -> TrackerResult<()> {
        self.particles.validate()?;
        self.sensor.validate()?;
        self.disambiguation.validate()?;
        if self.history_window < 0.0 || self.history_window.is_nan() {
            return Err(TrackerError::InvalidConfig(format!(
                "history_window must be non-negative, got {}",
                self.history_window
            )));
        }
        if self.snapshot_interval < 0.0 || self.snapshot_interval.is_nan() {
            return Err(TrackerError::InvalidConfig(format!(
                "snapshot_interval must be non-negative, got {}",
                self.snapshot_interval
            )));
        }
        if self.snapshot_queue == 0 {
            return Err(TrackerError::InvalidConfig(
                "snapshot_queue must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Phone
// ---------------------------------------------------------------------------

/// A phone that reports location hints, optionally tied to a person.
#[derive(Clone, Debug, PartialEq)]
pub struct Phone {
    pub id: PhoneId,
    pub person: Option<PersonId>,
    pub location: Option<RoomIdx>,
    pub last_update: Option<Timestamp>,
}

impl Phone {
    fn new(id: PhoneId) -> Self {
        Self {
            id,
            person: None,
            location: None,
            last_update: None,
        }
    }
}

// ---------------------------------------------------------------------------
// MultiPersonTracker
// ---------------------------------------------------------------------------

/// Owns every tracker, phone and the shared sensor model of one session.
pub struct MultiPersonTracker {
    pub config: TrackerConfig,
    graph: RoomGraph,
    sensors: SensorModel,
    people: BTreeMap<PersonId, PersonTracker>,
    phones: BTreeMap<PhoneId, Phone>,
    history: VecDeque<EventRecord>,
    /// Next suffix for `unknown_<n>` persons
    generic_counter: u64,
    /// Trackers created this session, used to derive per-tracker seeds
    trackers_created: u64,
    /// Latest event or step time seen
    latest_time: Option<Timestamp>,
    sink: Option<SinkWorker>,
    frames_emitted: u64,
    last_frame_time: Option<Timestamp>,
}

impl MultiPersonTracker {
    /// Create a session over `graph`. Fails on an invalid configuration.
    pub fn new(graph: RoomGraph, config: TrackerConfig) -> TrackerResult<Self> {
        config.validate()?;
        let sensors = SensorModel::new(graph.len(), config.sensor.clone());
        Ok(Self {
            config,
            graph,
            sensors,
            people: BTreeMap::new(),
            phones: BTreeMap::new(),
            history: VecDeque::new(),
            generic_counter: 0,
            trackers_created: 0,
            latest_time: None,
            sink: None,
            frames_emitted: 0,
            last_frame_time: None,
        })
    }

    /// Drop all session state: sensors, trackers, phones and history.
    /// The graph, configuration and any attached sink are kept.
    pub fn reset(&mut self) {
        self.sensors = SensorModel::new(self.graph.len(), self.config.sensor.clone());
        self.people.clear();
        self.phones.clear();
        self.history.clear();
        self.generic_counter = 0;
        self.trackers_created = 0;
        self.latest_time = None;
        self.last_frame_time = None;
        tracing::debug!("tracker session reset");
    }

    pub fn graph(&self) -> &RoomGraph {
        &self.graph
    }

    pub fn sensors(&self) -> &SensorModel {
        &self.sensors
    }

    pub fn person(&self, id: &PersonId) -> Option<&PersonTracker> {
        self.people.get(id)
    }

    /// All trackers in person id order.
    pub fn persons(&self) -> impl Iterator<Item = &PersonTracker> {
        self.people.values()
    }

    pub fn phone(&self, id: &PhoneId) -> Option<&Phone> {
        self.phones.get(id)
    }

    /// Event history inside the retention window, oldest first.
    pub fn recent_events(&self) -> impl Iterator<Item = &EventRecord> {
        self.history.iter()
    }

    // -----------------------------------------------------------------------
    // Lookup tables
    // -----------------------------------------------------------------------

    /// Tracker for `id`, created with a fresh particle set if absent.
    pub fn person_entry(&mut self, id: PersonId) -> &mut PersonTracker {
        let graph = &self.graph;
        let config = &self.config;
        let created = &mut self.trackers_created;
        self.people.entry(id).or_insert_with_key(|id| {
            let seed = config.seed.wrapping_add(*created);
            *created += 1;
            tracing::debug!(person = %id, seed, "creating person tracker");
            PersonTracker::new(id.clone(), graph, config.particles.clone(), seed)
        })
    }

    /// Create a new `unknown_<n>` person for an event nobody could claim.
    pub fn create_generic_person(&mut self) -> PersonId {
        let id = loop {
            let candidate = PersonId(format!("unknown_{}", self.generic_counter));
            self.generic_counter += 1;
            if !self.people.contains_key(&candidate) {
                break candidate;
            }
        };
        self.person_entry(id.clone()).generic = true;
        id
    }

    /// Register a phone. Idempotent.
    pub fn add_phone(&mut self, phone: impl Into<PhoneId>) -> &Phone {
        self.phone_entry(phone.into())
    }

    /// Tie a phone to a person, creating either if needed. Idempotent; a
    /// phone re-associated to another person leaves the previous one.
    pub fn associate_phone(&mut self, phone: impl Into<PhoneId>, person: impl Into<PersonId>) {
        let person = person.into();
        self.person_entry(person.clone());
        let phone = self.phone_entry(phone.into());
        if phone.person.as_ref() != Some(&person) {
            tracing::debug!(phone = %phone.id, person = %person, "phone associated");
            phone.person = Some(person);
        }
    }

    fn phone_entry(&mut self, id: PhoneId) -> &mut Phone {
        self.phones
            .entry(id)
            .or_insert_with_key(|id| Phone::new(id.clone()))
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// A motion sensor in `room` fired at `at`. Returns the person the
    /// event was attributed to.
    pub fn process_event(
        &mut self,
        source: impl Into<EventSource>,
        room: impl Into<RoomId>,
        at: Timestamp,
    ) -> TrackerResult<PersonId> {
        check_time(at)?;
        let room = room.into();
        let idx = self.graph.index_of(&room)?;
        let person = self.resolve_source(&source.into(), idx, at);

        self.sensors.record_trigger(idx, at);
        self.update_person(&person, idx, at);
        self.record(
            at,
            EventKind::Motion {
                room,
                person: person.clone(),
            },
        );
        self.maybe_emit(at);
        Ok(person)
    }

    /// A presence sensor in `room` changed state. "Present" is handled like
    /// a motion trigger and attributed; "absent" only updates the sensor
    /// model and returns `None`.
    pub fn process_presence(
        &mut self,
        source: impl Into<EventSource>,
        room: impl Into<RoomId>,
        is_present: bool,
        at: Timestamp,
    ) -> TrackerResult<Option<PersonId>> {
        check_time(at)?;
        let room = room.into();
        let idx = self.graph.index_of(&room)?;

        let person = if is_present {
            let person = self.resolve_source(&source.into(), idx, at);
            self.sensors.record_presence(idx, true, at);
            self.update_person(&person, idx, at);
            Some(person)
        } else {
            self.sensors.record_presence(idx, false, at);
            None
        };

        self.record(
            at,
            EventKind::Presence {
                room,
                present: is_present,
                person: person.clone(),
            },
        );
        self.maybe_emit(at);
        Ok(person)
    }

    /// A phone reported being in `room`. Moves the associated person's
    /// tracker like a motion event; unassociated phones only store the hint.
    pub fn process_phone_data(
        &mut self,
        phone: impl Into<PhoneId>,
        room: impl Into<RoomId>,
        at: Timestamp,
    ) -> TrackerResult<Option<PersonId>> {
        check_time(at)?;
        let room = room.into();
        let idx = self.graph.index_of(&room)?;
        let phone_id = phone.into();

        let entry = self.phone_entry(phone_id.clone());
        entry.location = Some(idx);
        entry.last_update = Some(at);
        let person = entry.person.clone();

        if let Some(person) = &person {
            self.person_entry(person.clone());
            self.sensors.record_trigger(idx, at);
            self.update_person(person, idx, at);
        }

        self.record(
            at,
            EventKind::Phone {
                phone: phone_id,
                room,
                person: person.clone(),
            },
        );
        self.maybe_emit(at);
        Ok(person)
    }

    /// Advance every tracker to `at` without new evidence. Generic tracks
    /// idle for longer than `max_track_age` are retired first. A NaN or
    /// infinite `at` is ignored.
    pub fn step(&mut self, at: Timestamp) {
        if check_time(at).is_err() {
            tracing::warn!(at, "ignoring step with non-finite time");
            return;
        }
        self.retire_stale_generics(at);
        let graph = &self.graph;
        let sensors = &self.sensors;
        let degenerate: usize = self
            .people
            .par_iter_mut()
            .map(|(_, tracker)| usize::from(tracker.step(graph, sensors, at).degenerate))
            .sum();
        if degenerate > 0 {
            tracing::debug!(at, degenerate, "step fell back to uniform resampling");
        }
        self.advance_clock(at);
        self.maybe_emit(at);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Current best room of every person.
    pub fn estimate_locations(&self) -> BTreeMap<PersonId, RoomId> {
        self.people
            .iter()
            .map(|(id, t)| (id.clone(), self.graph.room(t.estimate()).clone()))
            .collect()
    }

    pub fn estimate(&self, person: &PersonId) -> Option<RoomId> {
        self.people
            .get(person)
            .map(|t| self.graph.room(t.estimate()).clone())
    }

    /// Structured dump of every tracker and phone. Read-only.
    pub fn dump_state(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            time: self.latest_time,
            persons: self
                .people
                .iter()
                .map(|(id, t)| (id.clone(), PersonSnapshot::from_tracker(t, &self.graph)))
                .collect(),
            phones: self
                .phones
                .iter()
                .map(|(id, p)| {
                    (
                        id.clone(),
                        PhoneSnapshot {
                            person: p.person.clone(),
                            location: p.location.map(|r| self.graph.room(r).clone()),
                            last_update: p.last_update,
                        },
                    )
                })
                .collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Debug sink
    // -----------------------------------------------------------------------

    /// Start handing debug frames to `sink` on a worker thread. Replaces
    /// (and drains) any sink already attached.
    pub fn attach_sink<S: SnapshotSink>(&mut self, sink: S) -> TrackerResult<()> {
        self.detach_sink();
        let worker = SinkWorker::spawn(sink, self.config.snapshot_queue)
            .map_err(|e| TrackerError::SinkWorker(e.to_string()))?;
        self.sink = Some(worker);
        self.frames_emitted = 0;
        self.last_frame_time = None;
        Ok(())
    }

    /// Stop the sink worker after it drained its queue.
    pub fn detach_sink(&mut self) -> Option<SinkStats> {
        self.sink.take().map(SinkWorker::shutdown)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn resolve_source(&mut self, source: &EventSource, room: RoomIdx, at: Timestamp) -> PersonId {
        match source {
            EventSource::Known(id) => {
                let person = PersonId(id.clone());
                if self.people.contains_key(&person) {
                    return person;
                }
                if let Some(owner) = self
                    .phones
                    .get(&PhoneId(id.clone()))
                    .and_then(|p| p.person.clone())
                {
                    return owner;
                }
                self.person_entry(person.clone());
                person
            }
            EventSource::Ambient => {
                let result = assign(
                    &self.graph,
                    &self.config.disambiguation,
                    self.people.values(),
                    room,
                    at,
                );
                for s in &result.scores {
                    tracing::debug!(
                        person = %s.person,
                        distance = s.distance,
                        hop = s.hop,
                        direction = s.direction,
                        speed = s.speed,
                        total = s.total,
                        "disambiguation candidate"
                    );
                }
                match result.assignment {
                    Assignment::Existing(person) => person,
                    Assignment::NoPlausibleTrack => {
                        let person = self.create_generic_person();
                        tracing::debug!(person = %person, room = %self.graph.room(room), "no plausible track, opened new one");
                        person
                    }
                }
            }
        }
    }

    fn retire_stale_generics(&mut self, at: Timestamp) {
        let max_age = self.config.disambiguation.max_track_age;
        self.people.retain(|id, tracker| {
            let stale = tracker.generic
                && tracker
                    .last_observation()
                    .map_or(true, |o| at - o.time > max_age);
            if stale {
                tracing::debug!(person = %id, at, "retiring idle generic track");
            }
            !stale
        });
    }

    fn update_person(&mut self, person: &PersonId, room: RoomIdx, at: Timestamp) {
        if let Some(tracker) = self.people.get_mut(person) {
            tracker.update(&self.graph, &self.sensors, Some(room), at);
        }
    }

    fn record(&mut self, at: Timestamp, event: EventKind) {
        self.history.push_back(EventRecord { time: at, event });
        self.advance_clock(at);
        if let Some(now) = self.latest_time {
            let cutoff = now - self.config.history_window;
            while self.history.front().is_some_and(|e| e.time < cutoff) {
                self.history.pop_front();
            }
        }
    }

    fn advance_clock(&mut self, at: Timestamp) {
        self.latest_time = Some(self.latest_time.map_or(at, |t| t.max(at)));
    }

    fn maybe_emit(&mut self, at: Timestamp) {
        if self.sink.is_none() {
            return;
        }
        if let Some(last) = self.last_frame_time {
            if at - last < self.config.snapshot_interval {
                return;
            }
        }
        let frame = DebugFrame {
            sequence: self.frames_emitted,
            time: at,
            snapshot: self.dump_state(),
            recent_events: self.history.iter().cloned().collect(),
        };
        if let Some(sink) = self.sink.as_mut() {
            sink.submit(frame);
        }
        self.frames_emitted += 1;
        self.last_frame_time = Some(at);
    }
}

fn check_time(at: Timestamp) -> TrackerResult<()> {
    if at.is_finite() {
        Ok(())
    } else {
        Err(TrackerError::InvalidTimestamp(at))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
