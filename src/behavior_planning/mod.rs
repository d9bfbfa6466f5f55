//! Behaviour planning: lane selection and target speed policy

pub mod lane_planner;

pub use lane_planner::{LanePlanner, LaneState, PlannedIntent};
