//! Perception: turning the sensor fusion snapshot into per-lane gap summaries

pub mod lane_gaps;

pub use lane_gaps::*;
