//! Home sensor simulator.
//!
//! Generates the event stream a real installation would see:
//! - Motion sensors that fire on room entry, or again while the room stays
//!   occupied once their self-reset interval elapsed
//! - Missed detections (1 - p_detection)
//! - Per-room false alarms (ambient motion with nobody there)
//! - Presence sensors reporting occupancy changes
//! - Periodic phone location reports

use crate::occupant::Occupant;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracker_core::types::{EventSource, PhoneId, RoomId, Timestamp};

/// Sensor installation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSimConfig {
    /// Probability that a due motion trigger is reported
    pub p_detection: f64,
    /// Seconds a motion sensor stays latched after firing
    pub reset_interval: f64,
    /// Expected false alarms per room per second
    pub false_alarm_rate: f64,
    /// Rooms fitted with a presence sensor
    pub presence_rooms: Vec<RoomId>,
    /// Seconds between phone reports; `None` disables phones
    pub phone_interval: Option<f64>,
    /// Tag motion/presence events with the occupant who caused them
    pub attributed: bool,
}

impl Default for SensorSimConfig {
    fn default() -> Self {
        Self {
            p_detection: 0.95,
            reset_interval: 30.0,
            false_alarm_rate: 0.0,
            presence_rooms: Vec::new(),
            phone_interval: None,
            attributed: true,
        }
    }
}

/// One simulated sensor event, as recorded in a replay log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorEvent {
    Motion {
        time: Timestamp,
        /// Person id, or `None` for a shared sensor
        source: Option<String>,
        room: RoomId,
    },
    Presence {
        time: Timestamp,
        source: Option<String>,
        room: RoomId,
        present: bool,
    },
    Phone {
        time: Timestamp,
        phone: PhoneId,
        room: RoomId,
    },
}

impl SensorEvent {
    pub fn time(&self) -> Timestamp {
        match self {
            SensorEvent::Motion { time, .. }
            | SensorEvent::Presence { time, .. }
            | SensorEvent::Phone { time, .. } => *time,
        }
    }

    pub fn room(&self) -> &RoomId {
        match self {
            SensorEvent::Motion { room, .. }
            | SensorEvent::Presence { room, .. }
            | SensorEvent::Phone { room, .. } => room,
        }
    }

    /// Who the tracker should attribute this event to.
    pub fn event_source(&self) -> EventSource {
        match self {
            SensorEvent::Motion { source, .. } | SensorEvent::Presence { source, .. } => {
                EventSource::from(source.as_deref())
            }
            SensorEvent::Phone { phone, .. } => EventSource::from(phone.as_str()),
        }
    }
}

/// Generates sensor events from a set of occupants.
pub struct SensorSimulator {
    pub config: SensorSimConfig,
    rooms: Vec<RoomId>,
    /// Last report time per motion sensor
    last_fire: BTreeMap<RoomId, Timestamp>,
    /// Presence rooms currently reported occupied
    presence_state: BTreeSet<RoomId>,
    next_phone_report: Timestamp,
    rng: ChaCha8Rng,
}

impl SensorSimulator {
    pub fn new(rooms: Vec<RoomId>, config: SensorSimConfig, seed: u64) -> Self {
        Self {
            config,
            rooms,
            last_fire: BTreeMap::new(),
            presence_state: BTreeSet::new(),
            next_phone_report: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Generate every event due at time `t`, after occupants were stepped
    /// over the last `dt` seconds. `moved[i]` tells whether occupant `i`
    /// changed room during that step.
    pub fn generate(
        &mut self,
        occupants: &[Occupant],
        moved: &[bool],
        t: Timestamp,
        dt: f64,
    ) -> Vec<SensorEvent> {
        let mut events = Vec::new();
        let mut fired = BTreeSet::new();

        // True motion triggers
        for (i, occ) in occupants.iter().enumerate() {
            if fired.contains(&occ.room) {
                continue;
            }
            let entered = moved.get(i).copied().unwrap_or(false);
            let latched = self
                .last_fire
                .get(&occ.room)
                .is_some_and(|&last| t - last < self.config.reset_interval);
            if latched && !entered {
                continue;
            }
            if self.rng.gen::<f64>() > self.config.p_detection {
                continue;
            }
            self.last_fire.insert(occ.room.clone(), t);
            fired.insert(occ.room.clone());
            events.push(SensorEvent::Motion {
                time: t,
                source: self.config.attributed.then(|| occ.id.0.clone()),
                room: occ.room.clone(),
            });
        }

        // False alarms
        if self.config.false_alarm_rate > 0.0 {
            let p = (self.config.false_alarm_rate * dt).min(1.0);
            for room in &self.rooms {
                if fired.contains(room) || self.rng.gen::<f64>() >= p {
                    continue;
                }
                self.last_fire.insert(room.clone(), t);
                events.push(SensorEvent::Motion {
                    time: t,
                    source: None,
                    room: room.clone(),
                });
            }
        }

        // Presence changes
        for room in &self.config.presence_rooms {
            let occupant = occupants.iter().find(|o| &o.room == room);
            let present = occupant.is_some();
            if present == self.presence_state.contains(room) {
                continue;
            }
            if present {
                self.presence_state.insert(room.clone());
            } else {
                self.presence_state.remove(room);
            }
            events.push(SensorEvent::Presence {
                time: t,
                source: occupant
                    .filter(|_| self.config.attributed)
                    .map(|o| o.id.0.clone()),
                room: room.clone(),
                present,
            });
        }

        // Phone reports
        if let Some(interval) = self.config.phone_interval {
            if t >= self.next_phone_report {
                self.next_phone_report = t + interval;
                for occ in occupants {
                    if let Some(phone) = &occ.phone {
                        events.push(SensorEvent::Phone {
                            time: t,
                            phone: phone.clone(),
                            room: occ.room.clone(),
                        });
                    }
                }
            }
        }

        events
    }
}
