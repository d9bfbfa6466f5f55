//! Road map: the sampled centerline of a closed track
//!
//! The map file is a table of whitespace separated rows `x y s dx dy`:
//! Cartesian position, longitudinal position along the track, and the unit
//! normal pointing to the right of the direction of travel.

use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use itertools::Itertools;
use tracing::info;

use crate::common::{PlannerError, PlannerResult, Point2D};

/// Lap length of the reference highway track [m]
pub const HIGHWAY_MAX_S: f64 = 6945.554;

/// Accepted deviation of a lateral normal from unit length
const NORMAL_TOLERANCE: f64 = 0.05;

/// A single centerline sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
    pub s: f64,
    pub dx: f64,
    pub dy: f64,
}

impl Waypoint {
    pub fn new(x: f64, y: f64, s: f64, dx: f64, dy: f64) -> Self {
        Waypoint { x, y, s, dx, dy }
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }
}

/// Validated, read-only waypoint table of a closed track
#[derive(Debug, Clone)]
pub struct RoadMap {
    waypoints: Vec<Waypoint>,
    max_s: f64,
}

impl RoadMap {
    /// Build a map from waypoints, checking the table invariants
    pub fn new(waypoints: Vec<Waypoint>, max_s: f64) -> PlannerResult<Self> {
        if !(max_s.is_finite() && max_s > 0.0) {
            return Err(PlannerError::MapError(format!("invalid track length {}", max_s)));
        }
        if waypoints.len() < 2 {
            return Err(PlannerError::MapError(format!(
                "need at least 2 waypoints, got {}",
                waypoints.len()
            )));
        }
        if let Some((i, (a, b))) = waypoints.iter().tuple_windows().enumerate().find(|(_, (a, b))| b.s <= a.s) {
            return Err(PlannerError::MapError(format!(
                "s not strictly increasing at waypoint {}: {} then {}",
                i + 1,
                a.s,
                b.s
            )));
        }
        if let Some(wp) = waypoints.iter().find(|wp| wp.s < 0.0 || wp.s >= max_s) {
            return Err(PlannerError::MapError(format!(
                "waypoint s = {} outside of [0, {})",
                wp.s, max_s
            )));
        }
        if let Some((i, wp)) = waypoints.iter().enumerate()
            .find(|(_, wp)| ((wp.dx.powi(2) + wp.dy.powi(2)).sqrt() - 1.0).abs() > NORMAL_TOLERANCE)
        {
            return Err(PlannerError::MapError(format!(
                "lateral normal of waypoint {} is not unit length: ({}, {})",
                i, wp.dx, wp.dy
            )));
        }
        Ok(RoadMap { waypoints, max_s })
    }

    /// Parse a waypoint table from a reader
    pub fn from_reader<R: BufRead>(reader: R, max_s: f64) -> PlannerResult<Self> {
        let mut waypoints = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let values = line
                .split_whitespace()
                .map(|field| {
                    field.parse::<f64>().ok().filter(|v| v.is_finite()).ok_or_else(|| {
                        PlannerError::MapError(format!(
                            "line {}: invalid number '{}'",
                            line_no + 1,
                            field
                        ))
                    })
                })
                .collect::<PlannerResult<Vec<f64>>>()?;
            if values.len() != 5 {
                return Err(PlannerError::MapError(format!(
                    "line {}: expected 5 columns (x y s dx dy), got {}",
                    line_no + 1,
                    values.len()
                )));
            }
            waypoints.push(Waypoint::new(values[0], values[1], values[2], values[3], values[4]));
        }
        Self::new(waypoints, max_s)
    }

    /// Load a waypoint table from a file
    pub fn load(path: &Path, max_s: f64) -> PlannerResult<Self> {
        let file = File::open(path).map_err(|e| {
            PlannerError::MapError(format!("unable to open map file {}: {}", path.display(), e))
        })?;
        let map = Self::from_reader(BufReader::new(file), max_s)?;
        info!(waypoints = map.len(), max_s, "loaded road map from {}", path.display());
        Ok(map)
    }

    /// Counter-clockwise circular track centred on the origin
    pub fn circular(radius: f64, samples: usize) -> PlannerResult<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(PlannerError::InvalidParameter(format!("invalid track radius {}", radius)));
        }
        let waypoints = (0..samples)
            .map(|i| {
                let theta = 2.0 * PI * i as f64 / samples as f64;
                let (sin, cos) = theta.sin_cos();
                // travelling counter-clockwise, the right-hand side points outward
                Waypoint::new(radius * cos, radius * sin, radius * theta, cos, sin)
            })
            .collect();
        Self::new(waypoints, 2.0 * PI * radius)
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn max_s(&self) -> f64 {
        self.max_s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
784.6001 1135.571 0 -0.02359831 -0.9997216
815.2679 1134.93 30.6744785308838 -0.01099479 -0.9999396
844.6398 1134.911 60.0463714599609 -0.002048373 -0.9999979

875.0436 1134.808 90.4504146575928 -0.001847863 -0.9999983
";

    #[test]
    fn test_parse_waypoint_table() {
        let map = RoadMap::from_reader(SAMPLE.as_bytes(), HIGHWAY_MAX_S).unwrap();
        assert_eq!(map.len(), 4);
        assert!((map.waypoints()[1].s - 30.6744785308838).abs() < 1e-10);
        assert!((map.max_s() - HIGHWAY_MAX_S).abs() < 1e-10);
    }

    #[test]
    fn test_rejects_wrong_column_count() {
        let err = RoadMap::from_reader("1 2 3 4\n5 6 7 8\n".as_bytes(), 100.0).unwrap_err();
        assert!(matches!(err, PlannerError::MapError(_)));
    }

    #[test]
    fn test_rejects_garbage_number() {
        let err = RoadMap::from_reader("1 2 0 0 1\n1 2 x 0 1\n".as_bytes(), 100.0).unwrap_err();
        assert!(format!("{}", err).contains("line 2"));
    }

    #[test]
    fn test_rejects_non_increasing_s() {
        let text = "0 0 0 0 -1\n10 0 10 0 -1\n20 0 10 0 -1\n";
        assert!(RoadMap::from_reader(text.as_bytes(), 100.0).is_err());
    }

    #[test]
    fn test_rejects_s_beyond_track_length() {
        let text = "0 0 0 0 -1\n10 0 120 0 -1\n";
        assert!(RoadMap::from_reader(text.as_bytes(), 100.0).is_err());
    }

    #[test]
    fn test_rejects_non_unit_normal() {
        let text = "0 0 0 0 -1\n10 0 10 0 -3\n";
        assert!(RoadMap::from_reader(text.as_bytes(), 100.0).is_err());
    }

    #[test]
    fn test_rejects_empty_table() {
        assert!(RoadMap::from_reader("".as_bytes(), 100.0).is_err());
    }

    #[test]
    fn test_missing_file_is_map_error() {
        let err = RoadMap::load(Path::new("/nonexistent/highway_map.csv"), HIGHWAY_MAX_S).unwrap_err();
        assert!(matches!(err, PlannerError::MapError(_)));
    }

    #[test]
    fn test_circular_track() {
        let map = RoadMap::circular(500.0, 360).unwrap();
        assert_eq!(map.len(), 360);
        assert!((map.max_s() - 2.0 * PI * 500.0).abs() < 1e-9);
        let wp = map.waypoints()[90];
        assert!(wp.x.abs() < 1e-9);
        assert!((wp.y - 500.0).abs() < 1e-9);
        assert!((wp.dy - 1.0).abs() < 1e-9);
    }
}
