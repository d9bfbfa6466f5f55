//! Utility modules for the highway planner

pub mod visualization;

pub use visualization::{colors, lane_boundaries, PathStyle, PointStyle, Visualizer};
