//! Closed-track highway simulator
//!
//! Stands in for the external simulator: the ego vehicle follows whatever
//! trajectory it is handed, consuming a fixed number of waypoints per step,
//! while traffic drives along lane centres at normally distributed speeds and
//! slows down behind anything in its lane.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::{debug, info};

use crate::common::{
    mph_to_mps, mps_to_mph, wrapped_s_distance, FrenetPoint, MapGeometry, PlannerError, PlannerResult, Point2D,
    Pose2D, Trajectory,
};
use crate::config::LANE_COUNT;
use crate::driver::{ControlLoop, Telemetry};
use crate::map::RoadMap;
use crate::perception::lane_index;

/// Simulator parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    pub traffic_count: usize,
    /// Mean traffic speed [m/s]
    pub traffic_speed_mean: f64,
    /// Traffic speed standard deviation [m/s]
    pub traffic_speed_std: f64,
    /// Waypoints the ego consumes per step
    pub points_per_step: usize,
    /// Time between consecutive waypoints [s]
    pub tick_interval: f64,
    pub lane_width: f64,
    pub ego_lane: usize,
    /// Traffic keeps at least this far from the ego at spawn [m]
    pub spawn_clearance: f64,
    /// Traffic matches the speed of a leader closer than this [m]
    pub follow_distance: f64,
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            traffic_count: 12,
            traffic_speed_mean: 19.0,
            traffic_speed_std: 2.5,
            points_per_step: 3,
            tick_interval: 0.02,
            lane_width: 4.0,
            ego_lane: 1,
            spawn_clearance: 60.0,
            follow_distance: 20.0,
            seed: 42,
        }
    }
}

/// A traffic vehicle holding its lane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficVehicle {
    pub id: u32,
    pub lane: usize,
    pub s: f64,
    /// Speed it drives at when unobstructed [m/s]
    pub desired_speed: f64,
    /// Current speed [m/s]
    pub speed: f64,
}

/// Snapshot taken after every step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRecord {
    /// Simulated time [s]
    pub time: f64,
    pub s: f64,
    pub d: f64,
    /// Measured ego speed [mph]
    pub speed: f64,
    /// Distance to the closest traffic vehicle [m]
    pub nearest_gap: f64,
}

pub struct HighwaySimulator<'m> {
    config: SimulatorConfig,
    map: &'m RoadMap,
    rng: StdRng,
    ego_pose: Pose2D,
    ego_frenet: FrenetPoint,
    /// Measured ego speed [mph]
    ego_speed: f64,
    previous: Trajectory,
    traffic: Vec<TrafficVehicle>,
    elapsed: f64,
    odometer: f64,
}

impl<'m> HighwaySimulator<'m> {
    pub fn new(config: SimulatorConfig, map: &'m RoadMap) -> PlannerResult<Self> {
        if config.points_per_step == 0 {
            return Err(PlannerError::InvalidParameter("points_per_step must be at least 1".to_string()));
        }
        if !(config.traffic_speed_std.is_finite() && config.traffic_speed_std >= 0.0) {
            return Err(PlannerError::InvalidParameter(format!(
                "traffic speed std {} must be finite and non-negative",
                config.traffic_speed_std
            )));
        }
        if config.ego_lane >= LANE_COUNT {
            return Err(PlannerError::InvalidParameter(format!("ego lane {} does not exist", config.ego_lane)));
        }
        let clearance = config.spawn_clearance;
        if traffic_needs_room(&config) && 2.0 * clearance >= map.track_length() {
            return Err(PlannerError::InvalidParameter(format!(
                "spawn clearance {} does not fit a track of {}",
                clearance,
                map.track_length()
            )));
        }

        let d = lane_center(&config, config.ego_lane);
        let ego_frenet = FrenetPoint::new(0.0, d);
        let ego_pose = pose_on_road(map, ego_frenet);

        let mut sim = HighwaySimulator {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            map,
            ego_pose,
            ego_frenet,
            ego_speed: 0.0,
            previous: Trajectory::new(),
            traffic: Vec::new(),
            elapsed: 0.0,
            odometer: 0.0,
        };
        sim.spawn_traffic()?;
        info!(traffic = sim.traffic.len(), seed = sim.config.seed, "simulator ready");
        Ok(sim)
    }

    fn spawn_traffic(&mut self) -> PlannerResult<()> {
        if !traffic_needs_room(&self.config) {
            return Ok(());
        }
        let normal = Normal::new(self.config.traffic_speed_mean, self.config.traffic_speed_std)
            .map_err(|e| PlannerError::InvalidParameter(format!("traffic speed distribution: {}", e)))?;
        let track = self.map.track_length();
        let clearance = self.config.spawn_clearance;

        for id in 0..self.config.traffic_count {
            let lane = self.rng.gen_range(0..LANE_COUNT);
            let offset = self.rng.gen_range(clearance..track - clearance);
            let speed = normal.sample(&mut self.rng).clamp(5.0, 30.0);
            self.traffic.push(TrafficVehicle {
                id: id as u32,
                lane,
                s: (self.ego_frenet.s + offset).rem_euclid(track),
                desired_speed: speed,
                speed,
            });
        }
        Ok(())
    }

    pub fn traffic(&self) -> &[TrafficVehicle] {
        &self.traffic
    }

    /// Replace the traffic, e.g. to stage a scenario
    pub fn set_traffic(&mut self, traffic: Vec<TrafficVehicle>) {
        self.traffic = traffic;
    }

    pub fn ego_pose(&self) -> Pose2D {
        self.ego_pose
    }

    pub fn ego_frenet(&self) -> FrenetPoint {
        self.ego_frenet
    }

    /// Measured ego speed [mph]
    pub fn ego_speed(&self) -> f64 {
        self.ego_speed
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Distance driven by the ego [m]
    pub fn odometer(&self) -> f64 {
        self.odometer
    }

    /// World position and velocity of a traffic vehicle
    fn traffic_state(&self, vehicle: &TrafficVehicle) -> (Point2D, f64, f64) {
        let d = lane_center(&self.config, vehicle.lane);
        let pose = pose_on_road(self.map, FrenetPoint::new(vehicle.s, d));
        let (sin, cos) = pose.yaw.sin_cos();
        (pose.position(), vehicle.speed * cos, vehicle.speed * sin)
    }

    /// Telemetry as the external simulator would report it
    pub fn telemetry(&self) -> Telemetry {
        let (end_path_s, end_path_d) = match (self.previous.tail_pose(), self.previous.last()) {
            (Some(tail), _) => {
                let f = self.map.to_frenet(tail.position(), tail.yaw);
                (f.s, f.d)
            }
            (None, Some(&last)) => {
                let f = self.map.to_frenet(last, self.ego_pose.yaw);
                (f.s, f.d)
            }
            (None, None) => (0.0, 0.0),
        };

        let sensor_fusion = self
            .traffic
            .iter()
            .map(|vehicle| {
                let (p, vx, vy) = self.traffic_state(vehicle);
                let d = lane_center(&self.config, vehicle.lane);
                [vehicle.id as f64, p.x, p.y, vx, vy, vehicle.s, d]
            })
            .collect();

        Telemetry {
            x: self.ego_pose.x,
            y: self.ego_pose.y,
            s: self.ego_frenet.s,
            d: self.ego_frenet.d,
            yaw: self.ego_pose.yaw.to_degrees(),
            speed: self.ego_speed,
            previous_path_x: self.previous.x_coords(),
            previous_path_y: self.previous.y_coords(),
            end_path_s,
            end_path_d,
            sensor_fusion,
        }
    }

    /// Drive the ego along `trajectory` for one step and move the traffic
    pub fn advance(&mut self, trajectory: &Trajectory) {
        let tick = self.config.tick_interval;
        let consumed = self.config.points_per_step.min(trajectory.len());

        if consumed > 0 {
            let here = self.ego_pose.position();
            let points = &trajectory.points[..consumed];
            self.odometer += here.distance(&points[0])
                + points.windows(2).map(|w| w[0].distance(&w[1])).sum::<f64>();

            let last = points[consumed - 1];
            let before = if consumed >= 2 { points[consumed - 2] } else { here };
            let step = before.distance(&last);
            let yaw = if step > 1e-9 { before.heading_to(&last) } else { self.ego_pose.yaw };
            self.ego_pose = Pose2D::new(last.x, last.y, yaw);
            self.ego_speed = mps_to_mph(step / tick);
        } else {
            self.ego_speed = 0.0;
        }

        self.previous = Trajectory::from_points(trajectory.points[consumed..].to_vec());
        self.ego_frenet = self.map.to_frenet(self.ego_pose.position(), self.ego_pose.yaw);

        let dt = self.config.points_per_step as f64 * tick;
        self.move_traffic(dt);
        self.elapsed += dt;
    }

    fn move_traffic(&mut self, dt: f64) {
        let track = self.map.track_length();
        let ego_lane = lane_index(self.ego_frenet.d, self.config.lane_width);
        let ego_s = self.ego_frenet.s;
        let ego_speed = mph_to_mps(self.ego_speed);
        let follow = self.config.follow_distance;

        let speeds: Vec<f64> = self
            .traffic
            .iter()
            .map(|vehicle| {
                let others = self
                    .traffic
                    .iter()
                    .filter(|other| other.id != vehicle.id && other.lane == vehicle.lane)
                    .map(|other| (other.s, other.speed));
                let ego = (ego_lane == Some(vehicle.lane)).then_some((ego_s, ego_speed));

                others
                    .chain(ego)
                    .map(|(s, speed)| (wrapped_s_distance(vehicle.s, s, track), speed))
                    .filter(|&(gap, _)| gap > 0.0 && gap < follow)
                    .fold(vehicle.desired_speed, |speed, (_, leader)| speed.min(leader))
            })
            .collect();

        for (vehicle, speed) in self.traffic.iter_mut().zip(speeds) {
            vehicle.speed = speed;
            vehicle.s = (vehicle.s + speed * dt).rem_euclid(track);
        }
    }

    /// Distance from the ego to the closest traffic vehicle
    pub fn nearest_gap(&self) -> f64 {
        let here = self.ego_pose.position();
        self.traffic
            .iter()
            .map(|vehicle| self.traffic_state(vehicle).0.distance(&here))
            .fold(f64::INFINITY, f64::min)
    }

    pub fn record(&self) -> StepRecord {
        StepRecord {
            time: self.elapsed,
            s: self.ego_frenet.s,
            d: self.ego_frenet.d,
            speed: self.ego_speed,
            nearest_gap: self.nearest_gap(),
        }
    }

    /// Close the loop with `control` for `steps` steps
    pub fn run<M: MapGeometry + ?Sized>(&mut self, control: &mut ControlLoop<'_, M>, steps: usize) -> Vec<StepRecord> {
        let mut records = Vec::with_capacity(steps);
        for _ in 0..steps {
            let telemetry = self.telemetry();
            let trajectory = control.tick(&telemetry);
            self.advance(&trajectory);
            records.push(self.record());
        }
        if let Some(last) = records.last() {
            debug!(steps, s = last.s, speed = last.speed, "simulation run finished");
        }
        records
    }
}

fn traffic_needs_room(config: &SimulatorConfig) -> bool {
    config.traffic_count > 0
}

fn lane_center(config: &SimulatorConfig, lane: usize) -> f64 {
    config.lane_width * (lane as f64 + 0.5)
}

/// Pose on the road at `frenet`, heading along the direction of travel
fn pose_on_road(map: &RoadMap, frenet: FrenetPoint) -> Pose2D {
    let p = map.to_cartesian(frenet);
    let ahead = map.to_cartesian(FrenetPoint::new(frenet.s + 1.0, frenet.d));
    Pose2D::new(p.x, p.y, p.heading_to(&ahead))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;

    fn track() -> RoadMap {
        RoadMap::circular(1000.0, 2000).unwrap()
    }

    fn empty_road() -> SimulatorConfig {
        SimulatorConfig { traffic_count: 0, ..SimulatorConfig::default() }
    }

    #[test]
    fn test_initial_telemetry() {
        let map = track();
        let sim = HighwaySimulator::new(SimulatorConfig::default(), &map).unwrap();
        let t = sim.telemetry();
        assert!((t.d - 6.0).abs() < 1e-9);
        assert_eq!(t.speed, 0.0);
        assert!(t.previous_path_x.is_empty());
        assert_eq!(t.sensor_fusion.len(), 12);

        for row in &t.sensor_fusion {
            let gap = wrapped_s_distance(0.0, row[5], map.track_length()).abs();
            assert!(gap >= 60.0 - 1e-9);
            assert!(lane_index(row[6], 4.0).is_some());
        }
    }

    #[test]
    fn test_same_seed_same_traffic() {
        let map = track();
        let a = HighwaySimulator::new(SimulatorConfig::default(), &map).unwrap();
        let b = HighwaySimulator::new(SimulatorConfig::default(), &map).unwrap();
        assert_eq!(a.traffic(), b.traffic());

        let c = HighwaySimulator::new(SimulatorConfig { seed: 7, ..SimulatorConfig::default() }, &map).unwrap();
        assert_ne!(a.traffic(), c.traffic());
    }

    #[test]
    fn test_advance_consumes_points() {
        let map = track();
        let mut sim = HighwaySimulator::new(empty_road(), &map).unwrap();
        let start = sim.ego_pose();
        // 0.2 m per point = 10 m/s
        let trajectory = Trajectory::from_points(
            (1..=50).map(|i| Point2D::new(start.x, 0.2 * i as f64)).collect(),
        );
        sim.advance(&trajectory);

        assert_eq!(sim.telemetry().previous_path_x.len(), 47);
        assert!((sim.ego_pose().y - 0.6).abs() < 1e-9);
        assert!((sim.ego_speed() - 22.4).abs() < 1e-6);
        // the ego starts marginally off the y = 0 axis
        assert!((sim.odometer() - 0.6).abs() < 0.02);
        assert!((sim.elapsed() - 0.06).abs() < 1e-12);
    }

    #[test]
    fn test_empty_trajectory_stops_the_ego() {
        let map = track();
        let mut sim = HighwaySimulator::new(empty_road(), &map).unwrap();
        let start = sim.ego_pose();
        sim.advance(&Trajectory::new());
        assert_eq!(sim.ego_pose().position(), start.position());
        assert_eq!(sim.ego_speed(), 0.0);
    }

    #[test]
    fn test_traffic_slows_behind_leader() {
        let map = track();
        let mut sim = HighwaySimulator::new(empty_road(), &map).unwrap();
        sim.set_traffic(vec![
            TrafficVehicle { id: 0, lane: 0, s: 500.0, desired_speed: 25.0, speed: 25.0 },
            TrafficVehicle { id: 1, lane: 0, s: 510.0, desired_speed: 15.0, speed: 15.0 },
        ]);
        sim.advance(&Trajectory::new());
        assert_eq!(sim.traffic()[0].speed, 15.0);
        assert!((sim.traffic()[1].s - (510.0 + 15.0 * 0.06)).abs() < 1e-9);
    }

    #[test]
    fn test_closed_loop_reaches_cruise_speed_in_lane() {
        let map = track();
        let mut sim = HighwaySimulator::new(empty_road(), &map).unwrap();
        let mut control = ControlLoop::new(PlannerConfig::default(), &map).unwrap();

        let records = sim.run(&mut control, 250);
        let last = records.last().unwrap();
        assert!((last.speed - 49.7).abs() < 0.5, "speed {}", last.speed);
        for record in &records {
            assert!(record.speed < 50.5, "speed {} at {}", record.speed, record.time);
            assert!((record.d - 6.0).abs() < 0.5, "d {} at {}", record.d, record.time);
        }
        assert!(last.s > 100.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let map = track();
        let config = SimulatorConfig { points_per_step: 0, ..SimulatorConfig::default() };
        assert!(HighwaySimulator::new(config, &map).is_err());
        let config = SimulatorConfig { traffic_speed_std: -1.0, ..SimulatorConfig::default() };
        assert!(matches!(HighwaySimulator::new(config, &map), Err(PlannerError::InvalidParameter(_))));
        let config = SimulatorConfig { traffic_speed_std: f64::NAN, ..SimulatorConfig::default() };
        assert!(HighwaySimulator::new(config, &map).is_err());
    }

    #[test]
    fn test_ego_pulls_away_once_road_clears() {
        let map = track();
        let mut sim = HighwaySimulator::new(empty_road(), &map).unwrap();
        let mut control = ControlLoop::new(PlannerConfig::default(), &map).unwrap();

        // parked cars 40 m ahead in every lane
        sim.set_traffic(
            (0..LANE_COUNT)
                .map(|lane| TrafficVehicle { id: lane as u32, lane, s: 40.0, desired_speed: 0.0, speed: 0.0 })
                .collect(),
        );
        sim.run(&mut control, 300);
        assert!(sim.ego_speed() < 0.5, "speed {}", sim.ego_speed());
        assert!(sim.ego_frenet().s < 40.0);

        sim.set_traffic(vec![]);
        let records = sim.run(&mut control, 300);
        assert!(sim.ego_speed() > 10.0, "speed {}", sim.ego_speed());
        assert!(records.last().unwrap().s > 60.0);
    }
}
