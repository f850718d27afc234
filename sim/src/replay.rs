//! Replay: serialize/deserialize recorded sensor logs and run them through
//! the tracker for offline evaluation.

use crate::sensor_sim::SensorEvent;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracker_core::{
    metrics::PresenceMetrics,
    types::{PersonId, PhoneId, RoomId, Timestamp},
    MultiPersonTracker, RoomGraph, SinkStats, SnapshotSink, TrackerConfig, TrackerError,
    TrackerSnapshot,
};

/// A full recorded session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayLog {
    pub scenario_name: String,
    pub seed: u64,
    pub duration: f64,
    /// Room adjacency as declared by the installation
    pub adjacency: BTreeMap<String, Vec<String>>,
    /// Phones known to belong to a person
    pub phones: Vec<PhoneAssociation>,
    /// All sensor events in chronological order
    pub events: Vec<SensorEvent>,
    /// True room of every occupant, sampled periodically
    pub ground_truth: Vec<GroundTruthFrame>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhoneAssociation {
    pub phone: PhoneId,
    pub person: PersonId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthFrame {
    pub time: Timestamp,
    pub rooms: BTreeMap<PersonId, RoomId>,
}

/// Save a replay log to a JSON file.
pub fn save_replay(log: &ReplayLog, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating replay file {}", path.display()))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, log)?;
    Ok(())
}

/// Load a replay log from a JSON file.
pub fn load_replay(path: &Path) -> anyhow::Result<ReplayLog> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening replay file {}", path.display()))?;
    let reader = BufReader::new(file);
    let log: ReplayLog = serde_json::from_reader(reader)
        .with_context(|| format!("parsing replay file {}", path.display()))?;
    Ok(log)
}

// ---------------------------------------------------------------------------
// Offline evaluation
// ---------------------------------------------------------------------------

/// Result of running a log through the tracker.
#[derive(Clone, Debug)]
pub struct ReplayOutcome {
    /// Estimates after the last event
    pub estimates: BTreeMap<PersonId, RoomId>,
    pub snapshot: TrackerSnapshot,
    pub metrics: PresenceMetrics,
    pub events_processed: u64,
    /// Events naming rooms absent from the graph
    pub events_rejected: u64,
    /// Sink counters, when a sink was attached
    pub sink: Option<SinkStats>,
}

/// Feed every event of `log` to a fresh tracker, scoring the estimates
/// against each ground-truth frame.
pub fn replay(log: &ReplayLog, config: TrackerConfig) -> anyhow::Result<ReplayOutcome> {
    let mut tracker = prepare(log, config)?;
    run(log, &mut tracker)
}

/// Like [`replay`], with debug frames handed to `sink`.
pub fn replay_with_sink<S: SnapshotSink>(
    log: &ReplayLog,
    config: TrackerConfig,
    sink: S,
) -> anyhow::Result<ReplayOutcome> {
    let mut tracker = prepare(log, config)?;
    tracker.attach_sink(sink)?;
    let mut outcome = run(log, &mut tracker)?;
    outcome.sink = tracker.detach_sink();
    Ok(outcome)
}

fn prepare(log: &ReplayLog, config: TrackerConfig) -> anyhow::Result<MultiPersonTracker> {
    let graph = RoomGraph::from_adjacency(
        log.adjacency
            .iter()
            .map(|(room, neighbours)| (room.as_str(), neighbours.iter().map(String::as_str))),
    )
    .with_context(|| format!("building room graph for '{}'", log.scenario_name))?;
    let mut tracker = MultiPersonTracker::new(graph, config).context("invalid tracker config")?;
    for assoc in &log.phones {
        tracker.associate_phone(assoc.phone.clone(), assoc.person.clone());
    }
    Ok(tracker)
}

fn run(log: &ReplayLog, tracker: &mut MultiPersonTracker) -> anyhow::Result<ReplayOutcome> {
    let mut metrics = PresenceMetrics::default();
    let mut processed = 0u64;
    let mut rejected = 0u64;
    let mut events = log.events.iter().peekable();

    for frame in &log.ground_truth {
        while let Some(event) = events.next_if(|e| e.time() <= frame.time) {
            apply(tracker, event, &mut processed, &mut rejected)?;
        }
        tracker.step(frame.time);
        metrics.accumulate(&tracker.estimate_locations(), &frame.rooms);
    }
    for event in events {
        apply(tracker, event, &mut processed, &mut rejected)?;
    }

    tracing::info!(
        scenario = %log.scenario_name,
        processed,
        rejected,
        accuracy = ?metrics.accuracy(),
        "replay finished"
    );

    Ok(ReplayOutcome {
        estimates: tracker.estimate_locations(),
        snapshot: tracker.dump_state(),
        metrics,
        events_processed: processed,
        events_rejected: rejected,
        sink: None,
    })
}

fn apply(
    tracker: &mut MultiPersonTracker,
    event: &SensorEvent,
    processed: &mut u64,
    rejected: &mut u64,
) -> anyhow::Result<()> {
    let result = match event {
        SensorEvent::Motion { time, room, .. } => tracker
            .process_event(event.event_source(), room.clone(), *time)
            .map(|_| ()),
        SensorEvent::Presence {
            time,
            room,
            present,
            ..
        } => tracker
            .process_presence(event.event_source(), room.clone(), *present, *time)
            .map(|_| ()),
        SensorEvent::Phone { time, phone, room } => tracker
            .process_phone_data(phone.clone(), room.clone(), *time)
            .map(|_| ()),
    };
    match result {
        Ok(()) => *processed += 1,
        Err(TrackerError::UnknownRoom(room)) => {
            *rejected += 1;
            tracing::warn!(room = %room, time = event.time(), "event for unknown room skipped");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
