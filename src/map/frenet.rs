//! Frenet <-> Cartesian conversion over a [`RoadMap`]
//!
//! Both directions work segment by segment on the piecewise linear
//! centerline between consecutive waypoints.

use std::f64::consts::PI;

use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::common::{FrenetPoint, MapGeometry, Point2D};
use crate::map::road_map::RoadMap;

impl RoadMap {
    /// Index of the waypoint nearest to `p`
    pub fn closest_waypoint(&self, p: Point2D) -> usize {
        self.waypoints()
            .iter()
            .position_min_by_key(|wp| OrderedFloat(wp.position().distance(&p)))
            .unwrap_or(0)
    }

    /// Index of the next waypoint ahead of a vehicle at `p` heading `yaw`
    pub fn next_waypoint(&self, p: Point2D, yaw: f64) -> usize {
        let closest = self.closest_waypoint(p);
        let heading = p.heading_to(&self.waypoints()[closest].position());
        let mut angle = (yaw - heading).abs().rem_euclid(2.0 * PI);
        angle = angle.min(2.0 * PI - angle);
        if angle > PI / 2.0 {
            (closest + 1) % self.len()
        } else {
            closest
        }
    }

    /// Index of the waypoint starting the segment that contains `s`
    fn segment_start(&self, s: f64) -> usize {
        let after = self.waypoints().partition_point(|wp| wp.s <= s);
        if after == 0 {
            // before the first sample: still on the closing segment of the lap
            self.len() - 1
        } else {
            after - 1
        }
    }
}

impl MapGeometry for RoadMap {
    fn track_length(&self) -> f64 {
        self.max_s()
    }

    fn to_cartesian(&self, frenet: FrenetPoint) -> Point2D {
        let s = frenet.s.rem_euclid(self.max_s());
        let prev_idx = self.segment_start(s);
        let prev = self.waypoints()[prev_idx];
        let next = self.waypoints()[(prev_idx + 1) % self.len()];

        let heading = prev.position().heading_to(&next.position());
        let seg_s = (s - prev.s).rem_euclid(self.max_s());
        let seg_x = prev.x + seg_s * heading.cos();
        let seg_y = prev.y + seg_s * heading.sin();

        let perp = heading - PI / 2.0;
        Point2D::new(seg_x + frenet.d * perp.cos(), seg_y + frenet.d * perp.sin())
    }

    fn to_frenet(&self, point: Point2D, yaw: f64) -> FrenetPoint {
        let next_idx = self.next_waypoint(point, yaw);
        let prev_idx = (next_idx + self.len() - 1) % self.len();
        let prev = self.waypoints()[prev_idx];
        let next = self.waypoints()[next_idx];

        let n_x = next.x - prev.x;
        let n_y = next.y - prev.y;
        let x_x = point.x - prev.x;
        let x_y = point.y - prev.y;

        let seg_len_sq = n_x * n_x + n_y * n_y;
        let proj_norm = (x_x * n_x + x_y * n_y) / seg_len_sq;
        let proj_x = proj_norm * n_x;
        let proj_y = proj_norm * n_y;

        let off_x = x_x - proj_x;
        let off_y = x_y - proj_y;
        let mut d = (off_x * off_x + off_y * off_y).sqrt();
        if off_x * prev.dx + off_y * prev.dy < 0.0 {
            d = -d;
        }

        let s = prev.s + proj_norm * seg_len_sq.sqrt();
        FrenetPoint::new(s.rem_euclid(self.max_s()), d)
    }
}
