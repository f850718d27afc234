//! Simulated occupants and how they move between rooms.
//!
//! Each occupant has a true room and an `OccupantMotion` describing how it
//! moves. The simulator steps every occupant forward in time; moves always
//! follow an edge of the room graph, one hop per step.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracker_core::{
    types::{PersonId, PhoneId, RoomId, Timestamp},
    RoomGraph, TrackerResult,
};

/// Describes how an occupant moves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OccupantMotion {
    /// Never leaves the starting room.
    Stationary,
    /// Dwells an exponentially distributed time (mean `mean_dwell` seconds),
    /// then moves to a uniformly chosen neighbour.
    RandomWalk { mean_dwell: f64 },
    /// Walks towards each `(time, room)` waypoint once its time has come,
    /// one hop per step along the shortest path.
    Route { waypoints: Vec<(Timestamp, RoomId)> },
}

/// A simulated occupant with ground-truth location.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Occupant {
    pub id: PersonId,
    /// True current room
    pub room: RoomId,
    pub motion: OccupantMotion,
    /// Phone carried by this occupant, if any
    pub phone: Option<PhoneId>,
    /// Room transitions so far, `(time entered, room)`
    #[serde(skip)]
    pub history: Vec<(Timestamp, RoomId)>,
    #[serde(skip)]
    next_move: Option<Timestamp>,
}

impl Occupant {
    pub fn new(id: impl Into<PersonId>, room: impl Into<RoomId>, motion: OccupantMotion) -> Self {
        let room = room.into();
        Self {
            id: id.into(),
            history: vec![(0.0, room.clone())],
            room,
            motion,
            phone: None,
            next_move: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<PhoneId>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Advance to time `t`. Returns true if the occupant changed room.
    pub fn step<R: Rng>(
        &mut self,
        graph: &RoomGraph,
        t: Timestamp,
        rng: &mut R,
    ) -> TrackerResult<bool> {
        let current = graph.index_of(&self.room)?;
        let next = match &self.motion {
            OccupantMotion::Stationary => None,
            OccupantMotion::RandomWalk { mean_dwell } => {
                let due = *self
                    .next_move
                    .get_or_insert_with(|| t + exponential(rng, *mean_dwell));
                let neighbours = graph.neighbor_indices(current);
                if t < due || neighbours.is_empty() {
                    None
                } else {
                    self.next_move = Some(t + exponential(rng, *mean_dwell));
                    Some(neighbours[rng.gen_range(0..neighbours.len())])
                }
            }
            OccupantMotion::Route { waypoints } => {
                // Last waypoint whose time has come
                match waypoints.iter().filter(|(at, _)| *at <= t).last() {
                    Some((_, goal)) => {
                        let goal = graph.index_of(goal)?;
                        graph
                            .next_hop_idx(current, goal)
                            .filter(|&hop| hop != current)
                    }
                    None => None,
                }
            }
        };

        match next {
            Some(idx) => {
                self.room = graph.room(idx).clone();
                self.history.push((t, self.room.clone()));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Exponential sample with the given mean (inverse CDF).
fn exponential<R: Rng>(rng: &mut R, mean: f64) -> f64 {
    let u: f64 = rng.gen();
    -mean * (1.0 - u).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn chain() -> RoomGraph {
        RoomGraph::from_adjacency([
            ("bedroom", vec!["hallway"]),
            ("hallway", vec!["kitchen"]),
            ("kitchen", vec![]),
            ("shed", vec![]),
        ])
        .unwrap()
    }

    #[test]
    fn stationary_never_moves() {
        let g = chain();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut o = Occupant::new("alice", "kitchen", OccupantMotion::Stationary);
        for k in 1..100 {
            assert!(!o.step(&g, k as f64, &mut rng).unwrap());
        }
        assert_eq!(o.room, RoomId::from("kitchen"));
        assert_eq!(o.history.len(), 1);
    }

    #[test]
    fn route_walks_one_hop_per_step() {
        let g = chain();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut o = Occupant::new(
            "alice",
            "bedroom",
            OccupantMotion::Route {
                waypoints: vec![(10.0, "kitchen".into())],
            },
        );
        assert!(!o.step(&g, 5.0, &mut rng).unwrap());
        assert!(o.step(&g, 10.0, &mut rng).unwrap());
        assert_eq!(o.room, RoomId::from("hallway"));
        assert!(o.step(&g, 15.0, &mut rng).unwrap());
        assert_eq!(o.room, RoomId::from("kitchen"));
        assert!(!o.step(&g, 20.0, &mut rng).unwrap());
        let rooms: Vec<&str> = o.history.iter().map(|(_, r)| r.as_str()).collect();
        assert_eq!(rooms, vec!["bedroom", "hallway", "kitchen"]);
    }

    #[test]
    fn random_walk_follows_edges() {
        let g = chain();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut o = Occupant::new(
            "bob",
            "bedroom",
            OccupantMotion::RandomWalk { mean_dwell: 20.0 },
        );
        for k in 1..2000 {
            o.step(&g, k as f64 * 5.0, &mut rng).unwrap();
        }
        assert!(o.history.len() > 10, "walker barely moved");
        for pair in o.history.windows(2) {
            assert_eq!(g.distance(&pair[0].1, &pair[1].1).unwrap(), Some(1));
        }
    }

    #[test]
    fn isolated_walker_stays_put() {
        let g = chain();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut o = Occupant::new("eve", "shed", OccupantMotion::RandomWalk { mean_dwell: 1.0 });
        for k in 1..100 {
            assert!(!o.step(&g, k as f64, &mut rng).unwrap());
        }
    }

    #[test]
    fn unknown_start_room_is_an_error() {
        let g = chain();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut o = Occupant::new("alice", "attic", OccupantMotion::Stationary);
        assert!(o.step(&g, 1.0, &mut rng).is_err());
    }
}
