//! highway_planner - a real-time motion planner for a simulated three-lane highway
//!
//! Each control tick turns telemetry (ego pose, the unconsumed part of the
//! previous path, surrounding traffic) into the next fixed-length batch of
//! waypoints: traffic is reduced to per-lane gaps, a small state machine picks
//! the lane and target speed, and a spline through road anchors is sampled at
//! the governed reference speed.

// Core modules
pub mod common;
pub mod config;
pub mod math;
pub mod utils;

// Pipeline stages
pub mod map;
pub mod perception;
pub mod behavior_planning;
pub mod control;

// Outer surfaces
pub mod driver;
pub mod simulation;

// Re-export common types for convenience
pub use common::{FrenetPoint, Point2D, Pose2D, Trajectory};
pub use common::{MapGeometry, Visualizable};
pub use common::{PlannerError, PlannerResult};
pub use config::{PlannerConfig, LANE_COUNT};
pub use driver::{ControlLoop, EgoState, Telemetry};
pub use map::RoadMap;
