//! Per-room sensor state and the "still present" likelihood.
//!
//! # Likelihood model
//! Motion sensors fire once and then self-reset, so a trigger only says that
//! somebody was in the room at that instant. The belief that they are still
//! there decays linearly over `cooldown` seconds:
//!
//! L(e) = 1 − (e / cooldown)·(1 − floor)   for 0 ≤ e < cooldown
//! L(e) = floor                             for e ≥ cooldown
//!
//! Presence sensors report state directly and bypass the decay entirely.
//! `floor` is strictly positive so every room stays resample-able.

use crate::{
    error::{TrackerError, TrackerResult},
    types::{RoomIdx, Timestamp},
};
use serde::{Deserialize, Serialize};

/// Configuration for the sensor likelihood model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorModelConfig {
    /// Seconds for a motion trigger to decay to the floor (default 7 min)
    pub cooldown: f64,
    /// Likelihood of a room with no recent evidence, in (0, 1]
    pub floor: f64,
}

impl Default for SensorModelConfig {
    fn default() -> Self {
        Self {
            cooldown: 420.0,
            floor: 0.05,
        }
    }
}

impl SensorModelConfig {
    pub fn validate(&self) -> TrackerResult<()> {
        if self.cooldown <= 0.0 || !self.cooldown.is_finite() {
            return Err(TrackerError::InvalidConfig(format!(
                "cooldown must be positive, got {}",
                self.cooldown
            )));
        }
        if !(self.floor > 0.0 && self.floor <= 1.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "likelihood floor must lie in (0, 1], got {}",
                self.floor
            )));
        }
        Ok(())
    }
}

/// What is known about one room's sensors.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RoomSensorState {
    pub last_trigger_time: Option<Timestamp>,
    pub presence_override: Option<bool>,
    /// When the presence sensor last reported a state
    pub presence_changed_at: Option<Timestamp>,
}

/// Shared sensor model, one entry per room of the graph.
#[derive(Clone, Debug)]
pub struct SensorModel {
    pub config: SensorModelConfig,
    rooms: Vec<RoomSensorState>,
}

impl SensorModel {
    /// Create a model for `n_rooms` rooms with no recorded evidence.
    pub fn new(n_rooms: usize, config: SensorModelConfig) -> Self {
        Self {
            config,
            rooms: vec![RoomSensorState::default(); n_rooms],
        }
    }

    /// A motion sensor in `room` fired at `at`.
    pub fn record_trigger(&mut self, room: RoomIdx, at: Timestamp) {
        self.rooms[room.0].last_trigger_time = Some(at);
    }

    /// A presence sensor in `room` changed state at `at`.
    pub fn record_presence(&mut self, room: RoomIdx, is_present: bool, at: Timestamp) {
        let state = &mut self.rooms[room.0];
        state.presence_override = Some(is_present);
        state.presence_changed_at = Some(at);
        if is_present {
            state.last_trigger_time = Some(at);
        }
    }

    pub fn state(&self, room: RoomIdx) -> RoomSensorState {
        self.rooms[room.0]
    }

    pub fn last_trigger(&self, room: RoomIdx) -> Option<Timestamp> {
        self.rooms[room.0].last_trigger_time
    }

    /// Last presence report and when it arrived.
    pub fn presence(&self, room: RoomIdx) -> Option<(bool, Timestamp)> {
        let state = &self.rooms[room.0];
        state.presence_override.zip(state.presence_changed_at)
    }

    /// Likelihood in `[floor, 1.0]` that someone is still in `room` at `at`.
    pub fn likelihood_still_present(&self, room: RoomIdx, at: Timestamp) -> f64 {
        let floor = self.config.floor;
        let state = &self.rooms[room.0];
        if let Some(present) = state.presence_override {
            return if present { 1.0 } else { floor };
        }
        let Some(fired) = state.last_trigger_time else {
            return floor;
        };
        let elapsed = at - fired;
        if elapsed.is_nan() {
            return floor;
        }
        if elapsed <= 0.0 {
            // Trigger stamped at or after the query time.
            return 1.0;
        }
        if elapsed >= self.config.cooldown {
            return floor;
        }
        1.0 - (elapsed / self.config.cooldown) * (1.0 - floor)
    }

    /// Likelihood of every room at `at`, indexed by room index.
    pub fn likelihoods(&self, at: Timestamp) -> Vec<f64> {
        (0..self.rooms.len())
            .map(|i| self.likelihood_still_present(RoomIdx(i), at))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> SensorModel {
        SensorModel::new(3, SensorModelConfig::default())
    }

    #[test]
    fn untriggered_room_sits_at_floor() {
        let m = model();
        assert_eq!(m.likelihood_still_present(RoomIdx(0), 100.0), 0.05);
    }

    #[test]
    fn decay_is_monotone_and_bounded() {
        let mut m = model();
        m.record_trigger(RoomIdx(1), 10.0);
        let mut prev = f64::INFINITY;
        for k in 0..60 {
            let t = 10.0 + k as f64 * 10.0;
            let l = m.likelihood_still_present(RoomIdx(1), t);
            assert!(l <= prev, "likelihood rose at t={t}: {l} > {prev}");
            assert!((0.05..=1.0).contains(&l), "out of range at t={t}: {l}");
            prev = l;
        }
        assert_eq!(m.likelihood_still_present(RoomIdx(1), 10.0), 1.0);
        assert_eq!(m.likelihood_still_present(RoomIdx(1), 10.0 + 420.0), 0.05);
    }

    #[test]
    fn midpoint_of_linear_decay() {
        let mut m = model();
        m.record_trigger(RoomIdx(0), 0.0);
        let l = m.likelihood_still_present(RoomIdx(0), 210.0);
        assert!((l - 0.525).abs() < 1e-12);
    }

    #[test]
    fn absent_presence_forces_floor() {
        let mut m = model();
        m.record_trigger(RoomIdx(2), 100.0);
        m.record_presence(RoomIdx(2), false, 100.0);
        assert_eq!(m.likelihood_still_present(RoomIdx(2), 100.0), 0.05);
        // A later motion trigger does not outrank the presence sensor.
        m.record_trigger(RoomIdx(2), 101.0);
        assert_eq!(m.likelihood_still_present(RoomIdx(2), 101.0), 0.05);
    }

    #[test]
    fn present_presence_bypasses_cooldown() {
        let mut m = model();
        m.record_presence(RoomIdx(0), true, 0.0);
        assert_eq!(m.likelihood_still_present(RoomIdx(0), 10_000.0), 1.0);
        assert_eq!(m.state(RoomIdx(0)).last_trigger_time, Some(0.0));
    }

    #[test]
    fn diagnostics_report_raw_state() {
        let mut m = model();
        assert_eq!(m.last_trigger(RoomIdx(1)), None);
        assert_eq!(m.presence(RoomIdx(1)), None);
        m.record_trigger(RoomIdx(1), 5.0);
        m.record_presence(RoomIdx(1), false, 8.0);
        assert_eq!(m.last_trigger(RoomIdx(1)), Some(5.0));
        assert_eq!(m.presence(RoomIdx(1)), Some((false, 8.0)));
    }

    #[test]
    fn nan_times_stay_within_bounds() {
        let mut m = model();
        m.record_trigger(RoomIdx(0), f64::NAN);
        assert_eq!(m.likelihood_still_present(RoomIdx(0), 10.0), 0.05);
        m.record_trigger(RoomIdx(1), 0.0);
        assert_eq!(m.likelihood_still_present(RoomIdx(1), f64::NAN), 0.05);
    }

    #[test]
    fn likelihoods_cover_every_room() {
        let mut m = model();
        m.record_trigger(RoomIdx(0), 0.0);
        let ls = m.likelihoods(0.0);
        assert_eq!(ls, vec![1.0, 0.05, 0.05]);
    }

    #[test]
    fn config_validation() {
        assert!(SensorModelConfig::default().validate().is_ok());
        let bad = SensorModelConfig {
            cooldown: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = SensorModelConfig {
            floor: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = SensorModelConfig {
            floor: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
