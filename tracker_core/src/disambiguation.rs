//! Track disambiguation: which occupant fired an unattributed sensor?
//!
//! # Scoring
//! Each candidate track is scored against the event room from its last two
//! observations:
//! - **hop**: 1 if the event room is the track's last room or exactly the
//!   next hop toward it, else 1/d (d = hop distance). Unreachable → rejected.
//! - **direction**: 1 if the last move was heading toward the event room,
//!   0.5 if neutral or unknown, 0 if moving away.
//! - **speed**: ratio of the implied speed (d / time since last observation)
//!   to the track's recent speed, min/max so 1 means identical.
//!
//! total = hop_weight·hop + direction_weight·direction + speed_weight·speed
//!
//! The best total wins if it reaches `min_score`; otherwise the event opens
//! a new track. The weighting is heuristic and meant to be tuned.

use crate::{
    error::{TrackerError, TrackerResult},
    person_tracker::PersonTracker,
    room_graph::RoomGraph,
    types::{Observation, PersonId, RoomIdx, Timestamp},
};
use serde::{Deserialize, Serialize};

/// Score given to a component when the track has too little history.
const NEUTRAL: f64 = 0.5;

/// Configuration for ambiguous event assignment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisambiguationConfig {
    /// Weight of the topological (next hop) score
    pub hop_weight: f64,
    /// Weight of the heading score
    pub direction_weight: f64,
    /// Weight of the speed consistency score
    pub speed_weight: f64,
    /// Minimum total for an existing track to take the event
    pub min_score: f64,
    /// Tracks whose last observation is older than this (s) are not candidates
    pub max_track_age: f64,
}

impl Default for DisambiguationConfig {
    fn default() -> Self {
        Self {
            hop_weight: 1.0,
            direction_weight: 0.5,
            speed_weight: 0.5,
            min_score: 0.9,
            max_track_age: 30.0 * 60.0,
        }
    }
}

impl DisambiguationConfig {
    pub fn validate(&self) -> TrackerResult<()> {
        for (name, w) in [
            ("hop_weight", self.hop_weight),
            ("direction_weight", self.direction_weight),
            ("speed_weight", self.speed_weight),
            ("min_score", self.min_score),
        ] {
            if w < 0.0 || !w.is_finite() {
                return Err(TrackerError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {w}"
                )));
            }
        }
        if self.max_track_age <= 0.0 || self.max_track_age.is_nan() {
            return Err(TrackerError::InvalidConfig(format!(
                "max_track_age must be positive, got {}",
                self.max_track_age
            )));
        }
        Ok(())
    }
}

/// Score breakdown for one candidate track.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateScore {
    pub person: PersonId,
    /// Hops from the track's last room to the event room
    pub distance: usize,
    pub hop: f64,
    pub direction: f64,
    pub speed: f64,
    pub total: f64,
}

/// Outcome of disambiguating one event.
#[derive(Clone, Debug, PartialEq)]
pub enum Assignment {
    /// The event belongs to this existing track.
    Existing(PersonId),
    /// No candidate was plausible; the caller opens a new track.
    NoPlausibleTrack,
}

/// Assignment plus every candidate's score, for logging.
#[derive(Clone, Debug, PartialEq)]
pub struct Disambiguation {
    pub assignment: Assignment,
    pub scores: Vec<CandidateScore>,
}

/// Score one track against an event in `event_room` at `at`.
///
/// Returns `None` when the track is not a candidate: no observations yet,
/// last observation too old, or the event room is unreachable from it.
pub fn score_track(
    graph: &RoomGraph,
    config: &DisambiguationConfig,
    track: &PersonTracker,
    event_room: RoomIdx,
    at: Timestamp,
) -> Option<CandidateScore> {
    let last = track.last_observation()?;
    if at - last.time > config.max_track_age {
        return None;
    }
    let d = graph.distance_idx(last.room, event_room)?;
    let prev = track.previous_observation();

    let hop = if graph.next_hop_idx(last.room, event_room) == Some(event_room) {
        1.0
    } else {
        1.0 / d as f64
    };
    let direction = direction_score(graph, prev, d, event_room);
    let speed = speed_score(graph, prev, last, d, at);
    let total =
        config.hop_weight * hop + config.direction_weight * direction + config.speed_weight * speed;

    Some(CandidateScore {
        person: track.id.clone(),
        distance: d,
        hop,
        direction,
        speed,
        total,
    })
}

/// Pick the track that most plausibly produced an event in `event_room`.
///
/// Candidates are scored in iteration order; on equal totals the first one
/// wins, so callers iterating an ordered map get a stable result.
pub fn assign<'a, I>(
    graph: &RoomGraph,
    config: &DisambiguationConfig,
    candidates: I,
    event_room: RoomIdx,
    at: Timestamp,
) -> Disambiguation
where
    I: IntoIterator<Item = &'a PersonTracker>,
{
    let scores: Vec<CandidateScore> = candidates
        .into_iter()
        .filter_map(|t| score_track(graph, config, t, event_room, at))
        .collect();

    let mut best: Option<&CandidateScore> = None;
    for s in &scores {
        if best.map_or(true, |b| s.total > b.total) {
            best = Some(s);
        }
    }

    let assignment = match best {
        Some(b) if b.total >= config.min_score => Assignment::Existing(b.person.clone()),
        _ => Assignment::NoPlausibleTrack,
    };
    Disambiguation { assignment, scores }
}

fn direction_score(
    graph: &RoomGraph,
    prev: Option<&Observation>,
    d: usize,
    event_room: RoomIdx,
) -> f64 {
    let Some(prev) = prev else {
        return NEUTRAL;
    };
    match graph.distance_idx(prev.room, event_room) {
        Some(dp) if dp > d => 1.0,
        Some(dp) if dp == d => NEUTRAL,
        Some(_) => 0.0,
        None => NEUTRAL,
    }
}

fn speed_score(
    graph: &RoomGraph,
    prev: Option<&Observation>,
    last: &Observation,
    d: usize,
    at: Timestamp,
) -> f64 {
    let since = at - last.time;
    let implied = if d == 0 {
        0.0
    } else if since <= 0.0 {
        // Would need to cross rooms in no time.
        return 0.0;
    } else {
        d as f64 / since
    };

    let Some(prev) = prev else {
        return NEUTRAL;
    };
    let span = last.time - prev.time;
    if span <= 0.0 {
        return NEUTRAL;
    }
    let Some(hops) = graph.distance_idx(prev.room, last.room) else {
        return NEUTRAL;
    };
    let observed = hops as f64 / span;

    if observed == 0.0 && implied == 0.0 {
        1.0
    } else {
        observed.min(implied) / observed.max(implied)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        person_tracker::ParticleFilterConfig,
        sensor_model::{SensorModel, SensorModelConfig},
    };

    /// bedroom - bathroom - hallway - office - laundry_room, plus isolated shed
    fn house() -> RoomGraph {
        RoomGraph::from_adjacency([
            ("bedroom", vec!["bathroom"]),
            ("bathroom", vec!["hallway"]),
            ("hallway", vec!["office"]),
            ("office", vec!["laundry_room"]),
            ("laundry_room", vec![]),
            ("shed", vec![]),
        ])
        .unwrap()
    }

    fn walked(graph: &RoomGraph, id: &str, path: &[(&str, f64)]) -> PersonTracker {
        let mut sensors = SensorModel::new(graph.len(), SensorModelConfig::default());
        let mut t = PersonTracker::new(id.into(), graph, ParticleFilterConfig::default(), 5);
        for (room, at) in path {
            let idx = graph.index_of(&(*room).into()).unwrap();
            sensors.record_trigger(idx, *at);
            t.update(graph, &sensors, Some(idx), *at);
        }
        t
    }

    fn room(graph: &RoomGraph, name: &str) -> RoomIdx {
        graph.index_of(&name.into()).unwrap()
    }

    #[test]
    fn heading_track_wins_over_receding_one() {
        let g = house();
        let alice = walked(&g, "alice", &[("bedroom", 0.0), ("bathroom", 1.0)]);
        let bob = walked(&g, "bob", &[("office", 0.0), ("laundry_room", 1.0)]);
        let cfg = DisambiguationConfig::default();

        let res = assign(&g, &cfg, [&alice, &bob], room(&g, "hallway"), 2.0);
        assert_eq!(res.assignment, Assignment::Existing("alice".into()));

        let a = &res.scores[0];
        assert_eq!(a.distance, 1);
        assert_eq!(a.hop, 1.0);
        assert_eq!(a.direction, 1.0);
        assert_eq!(a.speed, 1.0);
        let b = &res.scores[1];
        assert_eq!(b.distance, 2);
        assert_eq!(b.direction, 0.0);
        assert!(b.total < a.total);
    }

    #[test]
    fn same_room_counts_as_expected_hop() {
        let g = house();
        let alice = walked(&g, "alice", &[("hallway", 0.0)]);
        let s = score_track(
            &g,
            &DisambiguationConfig::default(),
            &alice,
            room(&g, "hallway"),
            30.0,
        )
        .unwrap();
        assert_eq!(s.distance, 0);
        assert_eq!(s.hop, 1.0);
        assert_eq!(s.direction, NEUTRAL);
        assert_eq!(s.speed, NEUTRAL);
    }

    #[test]
    fn unreachable_room_has_no_plausible_track() {
        let g = house();
        let alice = walked(&g, "alice", &[("bedroom", 0.0)]);
        let res = assign(
            &g,
            &DisambiguationConfig::default(),
            [&alice],
            room(&g, "shed"),
            5.0,
        );
        assert_eq!(res.assignment, Assignment::NoPlausibleTrack);
        assert!(res.scores.is_empty());
    }

    #[test]
    fn distant_room_falls_below_threshold() {
        let g = house();
        let alice = walked(&g, "alice", &[("bedroom", 0.0)]);
        let res = assign(
            &g,
            &DisambiguationConfig::default(),
            [&alice],
            room(&g, "office"),
            60.0,
        );
        assert_eq!(res.assignment, Assignment::NoPlausibleTrack);
        assert_eq!(res.scores[0].distance, 3);
    }

    #[test]
    fn stale_tracks_are_not_candidates() {
        let g = house();
        let alice = walked(&g, "alice", &[("bedroom", 0.0)]);
        let res = assign(
            &g,
            &DisambiguationConfig::default(),
            [&alice],
            room(&g, "bathroom"),
            4000.0,
        );
        assert_eq!(res.assignment, Assignment::NoPlausibleTrack);
        assert!(res.scores.is_empty());
    }

    #[test]
    fn tracks_without_observations_are_skipped() {
        let g = house();
        let fresh = PersonTracker::new("carol".into(), &g, ParticleFilterConfig::default(), 1);
        let res = assign(
            &g,
            &DisambiguationConfig::default(),
            [&fresh],
            room(&g, "hallway"),
            0.0,
        );
        assert_eq!(res.assignment, Assignment::NoPlausibleTrack);
    }

    #[test]
    fn teleport_in_zero_time_scores_no_speed() {
        let g = house();
        let alice = walked(&g, "alice", &[("bedroom", 0.0), ("bathroom", 10.0)]);
        let s = score_track(
            &g,
            &DisambiguationConfig::default(),
            &alice,
            room(&g, "hallway"),
            10.0,
        )
        .unwrap();
        assert_eq!(s.speed, 0.0);
    }

    #[test]
    fn equal_scores_keep_first_candidate() {
        let g = house();
        let a = walked(&g, "alice", &[("hallway", 0.0)]);
        let b = walked(&g, "bob", &[("hallway", 0.0)]);
        let res = assign(
            &g,
            &DisambiguationConfig::default(),
            [&a, &b],
            room(&g, "office"),
            5.0,
        );
        assert_eq!(res.assignment, Assignment::Existing("alice".into()));
    }

    #[test]
    fn config_validation() {
        assert!(DisambiguationConfig::default().validate().is_ok());
        let bad = DisambiguationConfig {
            speed_weight: -1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = DisambiguationConfig {
            max_track_age: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
