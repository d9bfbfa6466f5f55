//! Planner configuration
//!
//! All tunables of the pipeline live in [`PlannerConfig`]. The defaults are
//! the values used on the reference highway; a TOML file may override any
//! subset of them.

use std::path::Path;

use serde::Deserialize;

use crate::common::{PlannerError, PlannerResult};

/// Number of lanes on the highway (0 = left, 1 = middle, 2 = right)
pub const LANE_COUNT: usize = 3;

/// Configuration for the highway planner
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerConfig {
    /// Cruise target speed [mph]
    pub cruise_speed: f64,
    /// Maximum reference speed change per tick [mph]
    pub speed_delta: f64,
    /// Control tick interval [s]
    pub tick_interval: f64,
    /// Longitudinal spacing of spline anchors [m]
    pub anchor_spacing: f64,
    /// Anchor spacing used while changing lane [m]
    pub lane_change_anchor_spacing: f64,
    /// Lane width [m]
    pub lane_width: f64,
    /// Minimum forward gap before a lane counts as blocked [m]
    pub front_margin: f64,
    /// Minimum rear gap for a lane to be entered [m]
    pub rear_margin: f64,
    /// Number of waypoints emitted per tick
    pub horizon: usize,
    /// Distance travelled after which a lane change is complete [m]
    pub lane_change_length: f64,
    /// Lane a fresh session starts in
    pub start_lane: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            cruise_speed: 49.7,
            speed_delta: 3.0 * 0.224,
            tick_interval: 0.02,
            anchor_spacing: 30.0,
            lane_change_anchor_spacing: 40.0,
            lane_width: 4.0,
            front_margin: 30.0,
            rear_margin: 5.0,
            horizon: 50,
            lane_change_length: 60.0,
            start_lane: 1,
        }
    }
}

impl PlannerConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(text: &str) -> PlannerResult<Self> {
        let config: PlannerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> PlannerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Lateral offset of a lane's centerline
    pub fn lane_center(&self, lane: usize) -> f64 {
        self.lane_width * (lane as f64 + 0.5)
    }

    pub fn validate(&self) -> PlannerResult<()> {
        let positive = [
            ("cruise_speed", self.cruise_speed),
            ("speed_delta", self.speed_delta),
            ("tick_interval", self.tick_interval),
            ("anchor_spacing", self.anchor_spacing),
            ("lane_change_anchor_spacing", self.lane_change_anchor_spacing),
            ("lane_width", self.lane_width),
            ("front_margin", self.front_margin),
            ("lane_change_length", self.lane_change_length),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(PlannerError::InvalidParameter(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if !(self.rear_margin.is_finite() && self.rear_margin >= 0.0) {
            return Err(PlannerError::InvalidParameter(format!(
                "rear_margin must be non-negative, got {}",
                self.rear_margin
            )));
        }
        if self.horizon < 2 {
            return Err(PlannerError::InvalidParameter(format!(
                "horizon must hold at least 2 points, got {}",
                self.horizon
            )));
        }
        if self.start_lane >= LANE_COUNT {
            return Err(PlannerError::InvalidParameter(format!(
                "start_lane {} outside of 0..{}",
                self.start_lane, LANE_COUNT
            )));
        }
        Ok(())
    }
}
