//! Trajectory synthesizer
//!
//! Turns a desired lane and reference speed into the next fixed-length batch
//! of waypoints. Anchors are placed along the road, moved into the frame of
//! the reference pose (end of the previous path, or the vehicle itself on the
//! first tick), interpolated with a cubic spline in local `x`, and sampled so
//! that consecutive waypoints are one tick of travel apart.
//!
//! Unconsumed points of the previous path are always replayed first, so the
//! new path continues the old one without a heading jump.

use tracing::debug;

use crate::common::{
    mph_to_mps, FrenetPoint, MapGeometry, PlannerError, PlannerResult, Point2D, Pose2D, Trajectory,
};
use crate::config::{PlannerConfig, LANE_COUNT};
use crate::math::CubicSpline;

/// Number of spline anchors placed ahead of the vehicle
const FORWARD_ANCHORS: usize = 3;

pub struct TrajectoryController<'m, M: MapGeometry + ?Sized> {
    config: PlannerConfig,
    map: &'m M,
    pose: Pose2D,
    ego_s: f64,
    reference_speed: f64,
    previous: Trajectory,
}

impl<'m, M: MapGeometry + ?Sized> TrajectoryController<'m, M> {
    pub fn new(config: PlannerConfig, map: &'m M) -> Self {
        TrajectoryController {
            config,
            map,
            pose: Pose2D::origin(),
            ego_s: 0.0,
            reference_speed: 0.0,
            previous: Trajectory::new(),
        }
    }

    /// Take in this tick's vehicle feedback
    pub fn update_readings(&mut self, pose: Pose2D, ego_speed: f64, ego_s: f64, previous: &Trajectory) {
        self.pose = pose;
        self.reference_speed = ego_speed.max(0.0);
        self.ego_s = ego_s;
        self.previous = previous.clone();
    }

    /// Move the reference speed toward `target_speed` by at most one
    /// acceleration step and return it
    pub fn update_velocity(&mut self, target_speed: f64) -> f64 {
        let target = target_speed.max(0.0);
        let delta = target - self.reference_speed;
        if delta.abs() <= self.config.speed_delta {
            self.reference_speed = target;
        } else {
            self.reference_speed += self.config.speed_delta.copysign(delta);
        }
        self.reference_speed = self.reference_speed.max(0.0);
        self.reference_speed
    }

    pub fn reference_speed(&self) -> f64 {
        self.reference_speed
    }

    /// Reference pose and the two seed points the new path starts from
    fn seed(&self) -> (Pose2D, [Point2D; 2]) {
        match (self.previous.tail_segment(), self.previous.last()) {
            (Some((prev, last)), _) => (Pose2D::new(last.x, last.y, prev.heading_to(&last)), [prev, last]),
            // previous path collapsed onto one spot: restart from there along the vehicle yaw
            (None, Some(&last)) => {
                let reference = Pose2D::new(last.x, last.y, self.pose.yaw);
                (reference, [one_metre_behind(&reference), last])
            }
            (None, None) => (self.pose, [one_metre_behind(&self.pose), self.pose.position()]),
        }
    }

    /// Local-x distance between generated points at the reference speed
    fn local_step(&self, spline: &CubicSpline, anchor_spacing: f64) -> f64 {
        let target_x = anchor_spacing;
        let target_y = spline.calc(target_x);
        let target_dist = (target_x.powi(2) + target_y.powi(2)).sqrt();
        let travel = self.config.tick_interval * mph_to_mps(self.reference_speed);
        target_x * travel / target_dist
    }

    /// Synthesize the next `horizon` waypoints toward `lane`
    pub fn get_trajectory(&self, lane: usize, anchor_spacing: f64) -> PlannerResult<Trajectory> {
        if lane >= LANE_COUNT {
            return Err(PlannerError::InvalidParameter(format!("lane {} does not exist", lane)));
        }
        if !(anchor_spacing.is_finite() && anchor_spacing > 0.0) {
            return Err(PlannerError::InvalidParameter(format!(
                "anchor spacing must be positive, got {}",
                anchor_spacing
            )));
        }

        let horizon = self.config.horizon;
        if self.previous.len() >= horizon {
            return Ok(Trajectory::from_points(self.previous.points[..horizon].to_vec()));
        }

        let (reference, seeds) = self.seed();
        let d = self.config.lane_center(lane);

        let mut anchors: Vec<Point2D> = seeds.to_vec();
        anchors.extend((1..=FORWARD_ANCHORS).map(|k| {
            self.map.to_cartesian(FrenetPoint::new(self.ego_s + k as f64 * anchor_spacing, d))
        }));

        let (xs, ys): (Vec<f64>, Vec<f64>) = anchors
            .iter()
            .map(|&p| {
                let local = reference.to_local(p);
                (local.x, local.y)
            })
            .unzip();
        let spline = CubicSpline::new(&xs, &ys)?;

        let mut trajectory = Trajectory::with_capacity(horizon);
        trajectory.points.extend(self.previous.points.iter().copied());
        let reused = trajectory.len();

        let step = self.local_step(&spline, anchor_spacing);
        let mut x = 0.0;
        while trajectory.len() < horizon {
            x += step;
            trajectory.push(reference.to_world(Point2D::new(x, spline.calc(x))));
        }

        debug!(
            lane,
            reused,
            generated = horizon - reused,
            speed = self.reference_speed,
            "trajectory synthesized"
        );
        Ok(trajectory)
    }

    /// Previous path continued in a straight line along the reference
    /// heading; always `horizon` points long
    pub fn fallback_trajectory(&self) -> Trajectory {
        let (reference, _) = self.seed();
        let horizon = self.config.horizon;
        let step = self.config.tick_interval * mph_to_mps(self.reference_speed);

        let mut trajectory = Trajectory::with_capacity(horizon);
        trajectory.points.extend(self.previous.points.iter().take(horizon).copied());
        let mut x = 0.0;
        while trajectory.len() < horizon {
            x += step;
            trajectory.push(reference.to_world(Point2D::new(x, 0.0)));
        }
        trajectory
    }
}

fn one_metre_behind(pose: &Pose2D) -> Point2D {
    Point2D::new(pose.x - pose.yaw.cos(), pose.y - pose.yaw.sin())
}
