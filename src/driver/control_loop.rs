//! Per-tick control loop
//!
//! Owns all mutable session state and runs the pipeline once per telemetry
//! event: perception summary, lane decision, speed governance, synthesis.

use tracing::{debug, info, warn};

use crate::behavior_planning::{LanePlanner, PlannedIntent};
use crate::common::{MapGeometry, PlannerError, PlannerResult, Pose2D, Trajectory};
use crate::config::PlannerConfig;
use crate::control::TrajectoryController;
use crate::driver::telemetry::{decode_frame, encode_control, SimEvent, Telemetry, MANUAL_REPLY};
use crate::perception::summarize_on_track;

/// Ego state carried from one tick to the next
#[derive(Debug, Clone, PartialEq)]
pub struct EgoState {
    /// Desired lane
    pub lane: usize,
    /// Reference speed [mph]
    pub speed: f64,
    pub s: f64,
    pub pose: Pose2D,
    /// Unconsumed path reported on the last tick
    pub previous_path: Trajectory,
}

impl EgoState {
    pub fn new(start_lane: usize) -> Self {
        EgoState {
            lane: start_lane,
            speed: 0.0,
            s: 0.0,
            pose: Pose2D::origin(),
            previous_path: Trajectory::new(),
        }
    }

    pub fn reset(&mut self, start_lane: usize) {
        *self = EgoState::new(start_lane);
    }
}

pub struct ControlLoop<'m, M: MapGeometry + ?Sized> {
    config: PlannerConfig,
    planner: LanePlanner,
    controller: TrajectoryController<'m, M>,
    track_length: f64,
    ego: EgoState,
    ticks: u64,
}

impl<'m, M: MapGeometry + ?Sized> ControlLoop<'m, M> {
    pub fn new(config: PlannerConfig, map: &'m M) -> PlannerResult<Self> {
        config.validate()?;
        Ok(ControlLoop {
            planner: LanePlanner::new(config.clone(), map.track_length()),
            controller: TrajectoryController::new(config.clone(), map),
            track_length: map.track_length(),
            ego: EgoState::new(config.start_lane),
            config,
            ticks: 0,
        })
    }

    pub fn ego(&self) -> &EgoState {
        &self.ego
    }

    pub fn planner(&self) -> &LanePlanner {
        &self.planner
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Number of ticks run since the last connect
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// New simulator session: start from standstill in the start lane
    pub fn on_connect(&mut self) {
        info!(lane = self.config.start_lane, "session connected, state reset");
        self.ego.reset(self.config.start_lane);
        self.planner.reset();
        self.ticks = 0;
    }

    /// Run the pipeline for one telemetry report
    pub fn tick(&mut self, telemetry: &Telemetry) -> Trajectory {
        let previous = telemetry.previous_path().unwrap_or_else(|e| {
            warn!(error = %e, "dropping malformed previous path");
            Trajectory::new()
        });
        let pose = telemetry.pose();
        let ego_s = if previous.is_empty() { telemetry.s } else { telemetry.end_path_s };

        let lookahead = previous.len() as f64 * self.config.tick_interval;
        let summary = summarize_on_track(
            &telemetry.observations(),
            lookahead,
            ego_s,
            self.config.lane_width,
            self.track_length,
        );
        let intent = self.planner.update(&summary, self.ego.lane, ego_s);

        let previous_speed = self.ego.speed;
        self.controller.update_readings(pose, previous_speed, ego_s, &previous);
        self.controller.update_velocity(intent.target_speed);

        let trajectory = match self.controller.get_trajectory(intent.lane, intent.anchor_spacing) {
            Ok(trajectory) => {
                self.ego.lane = intent.lane;
                trajectory
            }
            Err(e) => self.degrade(e, &intent, pose, previous_speed, ego_s, &previous),
        };

        self.ego.speed = self.controller.reference_speed();
        self.ego.s = ego_s;
        self.ego.pose = pose;
        self.ego.previous_path = previous;
        self.ticks += 1;

        debug!(
            tick = self.ticks,
            lane = self.ego.lane,
            speed = self.ego.speed,
            state = %self.planner.state(),
            "tick"
        );
        trajectory
    }

    /// Hold the current lane and slow down after a failed synthesis
    fn degrade(
        &mut self,
        error: PlannerError,
        intent: &PlannedIntent,
        pose: Pose2D,
        previous_speed: f64,
        ego_s: f64,
        previous: &Trajectory,
    ) -> Trajectory {
        warn!(error = %error, lane = intent.lane, "trajectory synthesis failed, holding lane");
        self.planner.abort_lane_change();
        self.controller.update_readings(pose, previous_speed, ego_s, previous);
        self.controller.update_velocity(0.0);

        match self.controller.get_trajectory(self.ego.lane, self.config.anchor_spacing) {
            Ok(trajectory) => trajectory,
            Err(e) => {
                warn!(error = %e, "retry failed, extending previous path");
                self.controller.fallback_trajectory()
            }
        }
    }

    /// Handle one inbound text frame, returning the reply if any
    pub fn handle_frame(&mut self, frame: &str) -> Option<String> {
        if frame.starts_with("40") {
            self.on_connect();
            return None;
        }

        match decode_frame(frame) {
            Ok(Some(SimEvent::Telemetry(telemetry))) => Some(encode_control(&self.tick(&telemetry))),
            Ok(Some(SimEvent::Manual)) => Some(MANUAL_REPLY.to_string()),
            Ok(Some(SimEvent::Other(name))) => {
                debug!(event = %name, "ignoring event");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "undecodable frame");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{FrenetPoint, Point2D};
    use crate::driver::telemetry::encode_telemetry;
    use crate::map::RoadMap;

    fn track() -> RoadMap {
        RoadMap::circular(1000.0, 2000).unwrap()
    }

    /// Standing still on the middle lane at s = 0
    fn standstill() -> Telemetry {
        Telemetry {
            x: 1006.0,
            y: 0.0,
            s: 0.0,
            d: 6.0,
            yaw: 90.0,
            speed: 0.0,
            previous_path_x: vec![],
            previous_path_y: vec![],
            end_path_s: 0.0,
            end_path_d: 0.0,
            sensor_fusion: vec![],
        }
    }

    #[test]
    fn test_tick_accelerates_in_start_lane() {
        let map = track();
        let mut control = ControlLoop::new(PlannerConfig::default(), &map).unwrap();
        let trajectory = control.tick(&standstill());
        assert_eq!(trajectory.len(), 50);
        assert_eq!(control.ego().lane, 1);
        assert!((control.ego().speed - 0.672).abs() < 1e-10);
        assert_eq!(control.ticks(), 1);
    }

    #[test]
    fn test_on_connect_resets_state() {
        let map = track();
        let mut control = ControlLoop::new(PlannerConfig::default(), &map).unwrap();
        control.tick(&standstill());
        control.tick(&standstill());
        assert!(control.ego().speed > 0.0);

        control.on_connect();
        assert_eq!(control.ego(), &EgoState::new(1));
        assert_eq!(control.ticks(), 0);
    }

    #[test]
    fn test_end_path_s_used_with_previous_path() {
        let map = track();
        let mut control = ControlLoop::new(PlannerConfig::default(), &map).unwrap();
        let first = control.tick(&standstill());

        let rest = Trajectory::from_points(first.points[3..].to_vec());
        let end = rest.last().copied().unwrap();
        let mut telemetry = standstill();
        telemetry.previous_path_x = rest.x_coords();
        telemetry.previous_path_y = rest.y_coords();
        telemetry.end_path_s = map.to_frenet(end, rest.tail_pose().unwrap().yaw).s;
        telemetry.end_path_d = 6.0;

        let next = control.tick(&telemetry);
        assert_eq!(next.len(), 50);
        assert_eq!(&next.points[..rest.len()], &rest.points[..]);
        assert!((control.ego().s - telemetry.end_path_s).abs() < 1e-12);
    }

    #[test]
    fn test_failed_synthesis_degrades_to_fallback() {
        let map = track();
        let mut control = ControlLoop::new(PlannerConfig::default(), &map).unwrap();
        for _ in 0..15 {
            control.tick(&standstill());
        }
        let speed = control.ego().speed;

        // reported end of path lies on the far side of the track
        let mut telemetry = standstill();
        telemetry.previous_path_x = vec![1006.0, 1006.0];
        telemetry.previous_path_y = vec![0.0, 0.5];
        telemetry.end_path_s = std::f64::consts::PI * 1000.0;
        let trajectory = control.tick(&telemetry);

        assert_eq!(trajectory.len(), 50);
        assert_eq!(trajectory.points[0], Point2D::new(1006.0, 0.0));
        assert!((control.ego().speed - (speed - 0.672)).abs() < 1e-10);
        assert_eq!(control.ego().lane, 1);
        assert!(!control.planner().is_changing_lane());
    }

    #[test]
    fn test_restarts_after_full_stop() {
        let map = track();
        let mut control = ControlLoop::new(PlannerConfig::default(), &map).unwrap();

        // the unconsumed path has collapsed onto the spot where the car stopped
        let mut telemetry = standstill();
        telemetry.previous_path_x = vec![1006.0; 47];
        telemetry.previous_path_y = vec![0.0; 47];
        for _ in 0..50 {
            let trajectory = control.tick(&telemetry);
            assert_eq!(trajectory.len(), 50);
        }
        assert!((control.ego().speed - 50.0 * 0.672).abs() < 1e-9);

        let trajectory = control.tick(&telemetry);
        let last = trajectory.points[49];
        assert!(last.y > 0.0 && (last.x - 1006.0).abs() < 0.05, "{:?}", last);
    }

    #[test]
    fn test_blocked_lane_triggers_change_left() {
        let map = track();
        let mut control = ControlLoop::new(PlannerConfig::default(), &map).unwrap();
        for _ in 0..80 {
            control.tick(&standstill());
        }
        assert!((control.ego().speed - 49.7).abs() < 1e-10);

        // leader 15 m ahead in the middle lane, 20 mph slower
        let leader = map.to_cartesian(FrenetPoint::new(15.0, 6.0));
        let mut telemetry = standstill();
        telemetry.sensor_fusion = vec![[7.0, leader.x, leader.y, -(29.7 / 2.24), 0.0, 15.0, 6.0]];
        control.tick(&telemetry);

        assert_eq!(control.ego().lane, 0);
        assert!(control.planner().is_changing_lane());
    }

    #[test]
    fn test_handle_frame() {
        let map = track();
        let mut control = ControlLoop::new(PlannerConfig::default(), &map).unwrap();

        assert_eq!(control.handle_frame("0{\"sid\":\"abc\"}"), None);
        assert_eq!(control.handle_frame("42[\"telemetry\",null]"), Some(MANUAL_REPLY.to_string()));
        assert_eq!(control.handle_frame("42[\"telemetry\",{\"x\":1}]"), None);

        let frame = encode_telemetry(&standstill()).unwrap();
        let reply = control.handle_frame(&frame).unwrap();
        assert!(reply.starts_with("42[\"control\",{"));
        assert_eq!(control.ticks(), 1);

        assert_eq!(control.handle_frame("40"), None);
        assert_eq!(control.ticks(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let map = track();
        let config = PlannerConfig { horizon: 0, ..PlannerConfig::default() };
        assert!(ControlLoop::new(config, &map).is_err());
    }
}
