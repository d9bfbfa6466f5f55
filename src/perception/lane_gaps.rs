//! Per-lane gap aggregation from sensor fusion observations
//!
//! Every observed vehicle is projected forward by the lookahead time at its
//! current speed and compared against the ego vehicle's projected `s`. For
//! each lane only the nearest vehicle ahead and the nearest vehicle behind
//! are kept.

use crate::common::{mps_to_mph, wrapped_s_distance, Point2D};
use crate::config::LANE_COUNT;

/// Gap reported for a lane with no vehicle on that side
pub const LANE_CLEAR: f64 = f64::INFINITY;

/// A tracked vehicle from the sensor fusion list
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleObservation {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    /// Cartesian velocity [m/s]
    pub vx: f64,
    pub vy: f64,
    pub s: f64,
    pub d: f64,
}

impl VehicleObservation {
    pub fn new(id: u32, position: Point2D, velocity: (f64, f64), s: f64, d: f64) -> Self {
        VehicleObservation {
            id,
            x: position.x,
            y: position.y,
            vx: velocity.0,
            vy: velocity.1,
            s,
            d,
        }
    }

    /// Scalar speed [m/s]
    pub fn speed(&self) -> f64 {
        (self.vx.powi(2) + self.vy.powi(2)).sqrt()
    }
}

/// Nearest vehicle on one side of the ego vehicle in one lane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneGap {
    /// Longitudinal distance [m], [`LANE_CLEAR`] when nobody is there
    pub distance: f64,
    /// Speed of that vehicle [mph]
    pub speed: f64,
}

impl LaneGap {
    pub fn clear() -> Self {
        LaneGap { distance: LANE_CLEAR, speed: 0.0 }
    }

    pub fn new(distance: f64, speed: f64) -> Self {
        LaneGap { distance, speed }
    }

    pub fn is_clear(&self) -> bool {
        self.distance == LANE_CLEAR
    }

    fn offer(&mut self, distance: f64, speed: f64) {
        if distance < self.distance {
            self.distance = distance;
            self.speed = speed;
        }
    }
}

impl Default for LaneGap {
    fn default() -> Self {
        Self::clear()
    }
}

/// Nearest forward and rear vehicle for every lane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneGapSummary {
    pub front: [LaneGap; LANE_COUNT],
    pub rear: [LaneGap; LANE_COUNT],
}

impl LaneGapSummary {
    /// Summary with every lane clear in both directions
    pub fn all_clear() -> Self {
        LaneGapSummary {
            front: [LaneGap::clear(); LANE_COUNT],
            rear: [LaneGap::clear(); LANE_COUNT],
        }
    }

    pub fn is_all_clear(&self) -> bool {
        self.front.iter().chain(self.rear.iter()).all(LaneGap::is_clear)
    }
}

impl Default for LaneGapSummary {
    fn default() -> Self {
        Self::all_clear()
    }
}

/// Lane index for a lateral offset, `None` when off the road
pub fn lane_index(d: f64, lane_width: f64) -> Option<usize> {
    let lane = (d / lane_width).floor();
    if lane >= 0.0 && lane < LANE_COUNT as f64 {
        Some(lane as usize)
    } else {
        None
    }
}

/// Reduce a sensor fusion snapshot to per-lane nearest gaps
pub fn summarize(
    observations: &[VehicleObservation],
    lookahead_time: f64,
    ego_s: f64,
    lane_width: f64,
) -> LaneGapSummary {
    collect_gaps(observations, lookahead_time, lane_width, |s| s - ego_s)
}

/// Same as [`summarize`] on a closed track of `track_length`: a vehicle
/// counts as ahead when the shorter way round from the ego leads forward.
pub fn summarize_on_track(
    observations: &[VehicleObservation],
    lookahead_time: f64,
    ego_s: f64,
    lane_width: f64,
    track_length: f64,
) -> LaneGapSummary {
    collect_gaps(observations, lookahead_time, lane_width, |s| {
        wrapped_s_distance(ego_s, s, track_length)
    })
}

fn collect_gaps<F>(
    observations: &[VehicleObservation],
    lookahead_time: f64,
    lane_width: f64,
    offset_from_ego: F,
) -> LaneGapSummary
where
    F: Fn(f64) -> f64,
{
    let mut summary = LaneGapSummary::all_clear();

    for obs in observations {
        let lane = match lane_index(obs.d, lane_width) {
            Some(lane) => lane,
            None => continue,
        };
        let speed = obs.speed();
        let offset = offset_from_ego(obs.s + speed * lookahead_time);

        if offset > 0.0 {
            summary.front[lane].offer(offset, mps_to_mph(speed));
        } else {
            summary.rear[lane].offer(-offset, mps_to_mph(speed));
        }
    }

    summary
}
