//! Road map loading and Frenet geometry

pub mod road_map;
pub mod frenet;

pub use road_map::{RoadMap, Waypoint, HIGHWAY_MAX_S};
