//! Common types used throughout highway_planner

use nalgebra::{Rotation2, Vector2};

use crate::common::error::{PlannerError, PlannerResult};

/// Segments shorter than this carry no heading [m]
pub const MIN_SEGMENT_LENGTH: f64 = 1e-6;

/// Conversion factor from metres per second to miles per hour
pub const MPH_PER_MPS: f64 = 2.24;

pub fn mps_to_mph(v: f64) -> f64 {
    v * MPH_PER_MPS
}

pub fn mph_to_mps(v: f64) -> f64 {
    v / MPH_PER_MPS
}

/// Signed longitudinal distance from `from` to `to` on a closed track,
/// folded into `(-track_length / 2, track_length / 2]`.
pub fn wrapped_s_distance(from: f64, to: f64, track_length: f64) -> f64 {
    let diff = (to - from).rem_euclid(track_length);
    if diff > track_length / 2.0 {
        diff - track_length
    } else {
        diff
    }
}

/// 2D point representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Heading of the segment from `self` to `other`
    pub fn heading_to(&self, other: &Point2D) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl From<Vector2<f64>> for Point2D {
    fn from(v: Vector2<f64>) -> Self {
        Self { x: v[0], y: v[1] }
    }
}

/// Road-relative position: `s` along the centerline, `d` to its right
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrenetPoint {
    pub s: f64,
    pub d: f64,
}

impl FrenetPoint {
    pub fn new(s: f64, d: f64) -> Self {
        Self { s, d }
    }
}

/// 2D pose (position + orientation), yaw in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0, yaw: 0.0 }
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    /// Express a world point in this pose's frame (translate, then rotate by -yaw)
    pub fn to_local(&self, p: Point2D) -> Point2D {
        let shifted = Vector2::new(p.x - self.x, p.y - self.y);
        Point2D::from(Rotation2::new(-self.yaw) * shifted)
    }

    /// Inverse of [`Pose2D::to_local`]
    pub fn to_world(&self, p: Point2D) -> Point2D {
        let rotated = Rotation2::new(self.yaw) * p.to_vector();
        Point2D::new(rotated.x + self.x, rotated.y + self.y)
    }

    /// Normalize yaw to [-pi, pi]
    pub fn normalize_yaw(&mut self) {
        while self.yaw > std::f64::consts::PI {
            self.yaw -= 2.0 * std::f64::consts::PI;
        }
        while self.yaw < -std::f64::consts::PI {
            self.yaw += 2.0 * std::f64::consts::PI;
        }
    }
}

/// Trajectory represented as a sequence of 2D waypoints, one tick apart
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trajectory {
    pub points: Vec<Point2D>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { points: Vec::with_capacity(capacity) }
    }

    pub fn from_points(points: Vec<Point2D>) -> Self {
        Self { points }
    }

    pub fn from_xy(x: &[f64], y: &[f64]) -> PlannerResult<Self> {
        if x.len() != y.len() {
            return Err(PlannerError::InvalidParameter(format!(
                "trajectory coordinate lengths differ: {} x vs {} y",
                x.len(),
                y.len()
            )));
        }
        let points = x.iter().zip(y.iter())
            .map(|(&x, &y)| Point2D::new(x, y))
            .collect();
        Ok(Self { points })
    }

    pub fn push(&mut self, point: Point2D) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&Point2D> {
        self.points.last()
    }

    pub fn x_coords(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.x).collect()
    }

    pub fn y_coords(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }

    /// Last point and the closest earlier point distinct from it; `None`
    /// when the trajectory has collapsed onto a single position
    pub fn tail_segment(&self) -> Option<(Point2D, Point2D)> {
        let (&last, rest) = self.points.split_last()?;
        rest.iter()
            .rev()
            .find(|p| p.distance(&last) > MIN_SEGMENT_LENGTH)
            .map(|&prev| (prev, last))
    }

    /// Pose at the end of the trajectory, heading taken from the last
    /// non-degenerate segment
    pub fn tail_pose(&self) -> Option<Pose2D> {
        self.tail_segment()
            .map(|(prev, last)| Pose2D::new(last.x, last.y, prev.heading_to(&last)))
    }
}
