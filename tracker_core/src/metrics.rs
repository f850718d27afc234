//! Tracking metrics: room accuracy, missing estimates, estimate flips.

use crate::types::{PersonId, RoomId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ground-truth room of every occupant at one evaluation time.
pub type GroundTruth = BTreeMap<PersonId, RoomId>;

/// Per-person hit counts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonAccuracy {
    pub pairs: u64,
    pub correct: u64,
    /// Frames where this person had no estimate
    pub missing: u64,
}

impl PersonAccuracy {
    /// Correct frames over all frames this person appeared in; `None` when
    /// the person was never evaluated.
    pub fn accuracy(&self) -> Option<f64> {
        ratio(self.correct, self.pairs + self.missing)
    }
}

/// Accumulated metric statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PresenceMetrics {
    /// Number of frames evaluated
    pub frames: u64,
    /// (person, truth) pairs evaluated
    pub pairs: u64,
    /// Pairs whose estimate matched the true room
    pub correct: u64,
    /// Ground-truth persons without any estimate
    pub missing: u64,
    /// Times a person's estimate changed while the true room did not
    pub flips: u64,
    pub per_person: BTreeMap<PersonId, PersonAccuracy>,
    #[serde(skip)]
    previous: BTreeMap<PersonId, (RoomId, RoomId)>,
}

impl PresenceMetrics {
    /// Fraction of ground-truth entries whose estimate had the right room.
    /// Missing estimates count as wrong; `None` when nothing was evaluated.
    pub fn accuracy(&self) -> Option<f64> {
        ratio(self.correct, self.pairs + self.missing)
    }

    pub fn person_accuracy(&self, person: &PersonId) -> Option<f64> {
        self.per_person.get(person).and_then(PersonAccuracy::accuracy)
    }

    /// Accumulate one frame. Estimated persons absent from the ground truth
    /// (generic tracks, for instance) are ignored.
    pub fn accumulate(&mut self, estimates: &BTreeMap<PersonId, RoomId>, truth: &GroundTruth) {
        self.frames += 1;

        for (person, true_room) in truth {
            let entry = self.per_person.entry(person.clone()).or_default();
            let Some(estimate) = estimates.get(person) else {
                self.missing += 1;
                entry.missing += 1;
                continue;
            };
            let hit = estimate == true_room;
            self.pairs += 1;
            self.correct += u64::from(hit);
            entry.pairs += 1;
            entry.correct += u64::from(hit);

            if let Some((prev_est, prev_truth)) = self.previous.get(person) {
                if prev_truth == true_room && prev_est != estimate {
                    self.flips += 1;
                }
            }
            self.previous
                .insert(person.clone(), (estimate.clone(), true_room.clone()));
        }
    }
}

fn ratio(hits: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| hits as f64 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(pairs: &[(&str, &str)]) -> BTreeMap<PersonId, RoomId> {
        pairs
            .iter()
            .map(|&(p, r)| (PersonId::from(p), RoomId::from(r)))
            .collect()
    }

    #[test]
    fn empty_metrics_have_no_accuracy() {
        let m = PresenceMetrics::default();
        assert_eq!(m.accuracy(), None);
        assert_eq!(m.person_accuracy(&"alice".into()), None);
    }

    #[test]
    fn counts_hits_and_missing() {
        let mut m = PresenceMetrics::default();
        let truth = frame(&[("alice", "kitchen"), ("bob", "office")]);
        m.accumulate(&frame(&[("alice", "kitchen"), ("unknown_0", "hallway")]), &truth);
        m.accumulate(&frame(&[("alice", "hallway"), ("bob", "office")]), &truth);

        assert_eq!(m.frames, 2);
        assert_eq!(m.pairs, 3);
        assert_eq!(m.correct, 2);
        assert_eq!(m.missing, 1);
        assert_eq!(m.accuracy(), Some(0.5));
        assert_eq!(m.person_accuracy(&"alice".into()), Some(0.5));
        assert_eq!(m.person_accuracy(&"bob".into()), Some(0.5));
    }

    #[test]
    fn generic_only_estimates_score_zero() {
        let mut m = PresenceMetrics::default();
        let truth = frame(&[("alice", "kitchen"), ("bob", "office")]);
        let generic = frame(&[("unknown_0", "kitchen"), ("unknown_1", "office")]);
        for _ in 0..3 {
            m.accumulate(&generic, &truth);
        }
        assert_eq!(m.pairs, 0);
        assert_eq!(m.missing, 6);
        assert_eq!(m.accuracy(), Some(0.0));
        assert_eq!(m.person_accuracy(&"alice".into()), Some(0.0));
    }

    #[test]
    fn flips_only_count_without_true_movement() {
        let mut m = PresenceMetrics::default();
        m.accumulate(&frame(&[("alice", "kitchen")]), &frame(&[("alice", "kitchen")]));
        // Estimate follows a real move: not a flip
        m.accumulate(&frame(&[("alice", "hallway")]), &frame(&[("alice", "hallway")]));
        // Estimate jumps while alice stays: flip
        m.accumulate(&frame(&[("alice", "kitchen")]), &frame(&[("alice", "hallway")]));
        assert_eq!(m.flips, 1);
    }
}
