//! Scenario definitions.
//!
//! Each scenario is a named house layout with occupants and a sensor
//! installation. All scenarios are deterministic given the same seed.

use crate::{
    occupant::{Occupant, OccupantMotion},
    replay::{GroundTruthFrame, PhoneAssociation, ReplayLog},
    sensor_sim::{SensorSimConfig, SensorSimulator},
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracker_core::{RoomGraph, TrackerResult};

/// Which pre-defined scenario to load.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// One occupant wandering a small apartment, attributed sensors
    Apartment,
    /// Two occupants sharing a house, shared sensors and false alarms
    SharedHouse,
    /// Two occupants, one carrying a phone across the apartment
    PhoneHandoff,
    /// An occupant in a detached room plus one in the main house
    Isolated,
}

/// A fully configured simulation scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    pub duration: f64,       // seconds
    pub sim_dt: f64,         // occupant / sensor tick (s)
    pub truth_interval: f64, // ground-truth sampling period (s)
    pub adjacency: BTreeMap<String, Vec<String>>,
    pub occupants: Vec<Occupant>,
    pub sensors: SensorSimConfig,
}

impl Scenario {
    /// Build the named scenario. Uses `seed` for repeatability.
    pub fn build(kind: ScenarioKind, seed: u64) -> Self {
        match kind {
            ScenarioKind::Apartment => Self::apartment(seed),
            ScenarioKind::SharedHouse => Self::shared_house(seed),
            ScenarioKind::PhoneHandoff => Self::phone_handoff(seed),
            ScenarioKind::Isolated => Self::isolated(seed),
        }
    }

    pub fn graph(&self) -> TrackerResult<RoomGraph> {
        RoomGraph::from_adjacency(
            self.adjacency
                .iter()
                .map(|(room, neighbours)| (room.as_str(), neighbours.iter().map(String::as_str))),
        )
    }

    /// Run the simulation and record every sensor event plus ground truth.
    pub fn record(&self) -> TrackerResult<ReplayLog> {
        let graph = self.graph()?;
        let mut occupants = self.occupants.clone();
        let mut motion_rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut sensors = SensorSimulator::new(
            graph.rooms().to_vec(),
            self.sensors.clone(),
            self.seed.wrapping_add(1),
        );

        let phones = occupants
            .iter()
            .filter_map(|o| {
                o.phone.clone().map(|phone| PhoneAssociation {
                    phone,
                    person: o.id.clone(),
                })
            })
            .collect();

        let mut events = Vec::new();
        let mut ground_truth = Vec::new();
        let mut next_truth = 0.0;
        let mut t = 0.0f64;
        let mut moved = vec![true; occupants.len()];

        while t <= self.duration {
            events.extend(sensors.generate(&occupants, &moved, t, self.sim_dt));

            if t >= next_truth {
                ground_truth.push(GroundTruthFrame {
                    time: t,
                    rooms: occupants
                        .iter()
                        .map(|o| (o.id.clone(), o.room.clone()))
                        .collect(),
                });
                next_truth += self.truth_interval;
            }

            t += self.sim_dt;
            for (occ, m) in occupants.iter_mut().zip(moved.iter_mut()) {
                *m = occ.step(&graph, t, &mut motion_rng)?;
            }
        }

        tracing::debug!(
            scenario = %self.name,
            events = events.len(),
            frames = ground_truth.len(),
            "scenario recorded"
        );

        Ok(ReplayLog {
            scenario_name: self.name.clone(),
            seed: self.seed,
            duration: self.duration,
            adjacency: self.adjacency.clone(),
            phones,
            events,
            ground_truth,
        })
    }

    // -----------------------------------------------------------------------
    // Scenario 1: Apartment
    // -----------------------------------------------------------------------
    fn apartment(seed: u64) -> Self {
        Scenario {
            name: "apartment".into(),
            seed,
            duration: 4.0 * 3600.0,
            sim_dt: 5.0,
            truth_interval: 60.0,
            adjacency: apartment_layout(),
            occupants: vec![Occupant::new(
                "alice",
                "bedroom",
                OccupantMotion::RandomWalk { mean_dwell: 900.0 },
            )],
            sensors: SensorSimConfig::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 2: Shared house
    // -----------------------------------------------------------------------
    fn shared_house(seed: u64) -> Self {
        let adjacency = layout(&[
            ("bedroom_a", &["hallway"]),
            ("bedroom_b", &["hallway"]),
            ("bathroom", &["hallway"]),
            ("hallway", &["living_room", "office"]),
            ("living_room", &["kitchen"]),
            ("kitchen", &[]),
            ("office", &[]),
        ]);
        Scenario {
            name: "shared_house".into(),
            seed,
            duration: 6.0 * 3600.0,
            sim_dt: 5.0,
            truth_interval: 60.0,
            adjacency,
            occupants: vec![
                Occupant::new(
                    "alice",
                    "bedroom_a",
                    OccupantMotion::RandomWalk { mean_dwell: 1200.0 },
                ),
                Occupant::new(
                    "bob",
                    "office",
                    OccupantMotion::RandomWalk { mean_dwell: 1800.0 },
                ),
            ],
            sensors: SensorSimConfig {
                attributed: false,
                false_alarm_rate: 1.0 / 3600.0,
                presence_rooms: vec!["office".into()],
                ..SensorSimConfig::default()
            },
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 3: Phone hand-off
    // -----------------------------------------------------------------------
    /// Alice carries her phone on a fixed route; bob stays in the kitchen.
    /// Motion sensors are shared, so her track is anchored by the phone.
    ///
    /// ```text
    /// t=0       bedroom
    /// t=600     walk to kitchen
    /// t=1800    walk to living_room
    /// t=3600    back to bedroom
    /// ```
    fn phone_handoff(seed: u64) -> Self {
        let route = vec![
            (600.0, "kitchen".into()),
            (1800.0, "living_room".into()),
            (3600.0, "bedroom".into()),
        ];
        Scenario {
            name: "phone_handoff".into(),
            seed,
            duration: 5400.0,
            sim_dt: 5.0,
            truth_interval: 30.0,
            adjacency: apartment_layout(),
            occupants: vec![
                Occupant::new("alice", "bedroom", OccupantMotion::Route { waypoints: route })
                    .with_phone("alice_phone"),
                Occupant::new("bob", "kitchen", OccupantMotion::Stationary),
            ],
            sensors: SensorSimConfig {
                attributed: false,
                phone_interval: Some(120.0),
                ..SensorSimConfig::default()
            },
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 4: Isolated room
    // -----------------------------------------------------------------------
    fn isolated(seed: u64) -> Self {
        let mut adjacency = apartment_layout();
        adjacency.insert("garage".into(), Vec::new());
        Scenario {
            name: "isolated".into(),
            seed,
            duration: 2.0 * 3600.0,
            sim_dt: 5.0,
            truth_interval: 60.0,
            adjacency,
            occupants: vec![
                Occupant::new("carol", "garage", OccupantMotion::Stationary),
                Occupant::new(
                    "dave",
                    "living_room",
                    OccupantMotion::RandomWalk { mean_dwell: 600.0 },
                ),
            ],
            sensors: SensorSimConfig::default(),
        }
    }
}

fn apartment_layout() -> BTreeMap<String, Vec<String>> {
    layout(&[
        ("bedroom", &["hallway"]),
        ("bathroom", &["hallway"]),
        ("hallway", &["kitchen", "living_room"]),
        ("kitchen", &["living_room"]),
        ("living_room", &[]),
    ])
}

fn layout(rooms: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    rooms
        .iter()
        .map(|(room, neighbours)| {
            (
                room.to_string(),
                neighbours.iter().map(|n| n.to_string()).collect(),
            )
        })
        .collect()
}
