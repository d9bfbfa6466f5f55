//! Lane & speed planner
//!
//! A two-state machine deciding which lane to drive in and what speed to aim
//! for. While cruising, a blocked lane (leader closer than the front margin)
//! triggers a search over the adjacent lanes; the one with the larger forward
//! gap is tried first, and on a tie the left lane (lower index) wins. A lane is
//! only entered when both its forward gap and its rear gap clear their
//! margins. Once a change has started the target lane is held until the ego
//! vehicle has travelled `lane_change_length` metres.

use std::fmt;

use ordered_float::OrderedFloat;
use tracing::{debug, info};

use crate::common::wrapped_s_distance;
use crate::config::{PlannerConfig, LANE_COUNT};
use crate::perception::LaneGapSummary;

/// State of the lane-change state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LaneState {
    Cruising,
    ChangingLane {
        /// Lane being moved into
        target: usize,
        /// Ego `s` when the change started
        start_s: f64,
    },
}

impl fmt::Display for LaneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneState::Cruising => write!(f, "cruising"),
            LaneState::ChangingLane { target, .. } => write!(f, "changing to lane {}", target),
        }
    }
}

/// Decision for the upcoming horizon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedIntent {
    pub lane: usize,
    /// Target speed [mph]
    pub target_speed: f64,
    /// Spline anchor spacing to use this tick [m]
    pub anchor_spacing: f64,
}

pub struct LanePlanner {
    config: PlannerConfig,
    track_length: f64,
    state: LaneState,
}

impl LanePlanner {
    pub fn new(config: PlannerConfig, track_length: f64) -> Self {
        LanePlanner {
            config,
            track_length,
            state: LaneState::Cruising,
        }
    }

    pub fn state(&self) -> LaneState {
        self.state
    }

    pub fn is_changing_lane(&self) -> bool {
        matches!(self.state, LaneState::ChangingLane { .. })
    }

    /// Back to cruising, e.g. at the start of a new session
    pub fn reset(&mut self) {
        self.state = LaneState::Cruising;
    }

    /// Drop an ongoing lane change without completing it
    pub fn abort_lane_change(&mut self) {
        if let LaneState::ChangingLane { target, .. } = self.state {
            info!(lane = target, "lane change aborted");
        }
        self.state = LaneState::Cruising;
    }

    /// Decide lane and target speed for this tick
    pub fn update(&mut self, summary: &LaneGapSummary, current_lane: usize, ego_s: f64) -> PlannedIntent {
        let current_lane = current_lane.min(LANE_COUNT - 1);

        if let LaneState::ChangingLane { target, start_s } = self.state {
            if self.lane_change_complete(start_s, ego_s) {
                info!(lane = target, ego_s, "lane change complete");
                self.state = LaneState::Cruising;
                return self.cruise(summary, target, ego_s);
            }
            return PlannedIntent {
                lane: target,
                target_speed: self.follow_speed(summary, target),
                anchor_spacing: self.config.lane_change_anchor_spacing,
            };
        }

        self.cruise(summary, current_lane, ego_s)
    }

    fn cruise(&mut self, summary: &LaneGapSummary, lane: usize, ego_s: f64) -> PlannedIntent {
        if !self.is_blocked(summary, lane) {
            return PlannedIntent {
                lane,
                target_speed: self.config.cruise_speed,
                anchor_spacing: self.config.anchor_spacing,
            };
        }

        debug!(
            lane,
            gap = summary.front[lane].distance,
            leader_speed = summary.front[lane].speed,
            "lane blocked"
        );

        match self.select_adjacent_lane(summary, lane) {
            Some(target) => {
                info!(from = lane, to = target, ego_s, "starting lane change");
                self.state = LaneState::ChangingLane { target, start_s: ego_s };
                PlannedIntent {
                    lane: target,
                    target_speed: self.follow_speed(summary, target),
                    anchor_spacing: self.config.lane_change_anchor_spacing,
                }
            }
            None => PlannedIntent {
                lane,
                target_speed: self.follow_speed(summary, lane),
                anchor_spacing: self.config.anchor_spacing,
            },
        }
    }

    fn is_blocked(&self, summary: &LaneGapSummary, lane: usize) -> bool {
        summary.front[lane].distance < self.config.front_margin
    }

    /// Whether `lane` may be entered right now
    pub fn is_lane_acceptable(&self, summary: &LaneGapSummary, lane: usize) -> bool {
        summary.front[lane].distance > self.config.front_margin
            && summary.rear[lane].distance > self.config.rear_margin
    }

    /// Best acceptable neighbour of `lane`: larger forward gap first, left on ties
    pub fn select_adjacent_lane(&self, summary: &LaneGapSummary, lane: usize) -> Option<usize> {
        let mut candidates: Vec<usize> = [lane.checked_sub(1), Some(lane + 1)]
            .into_iter()
            .flatten()
            .filter(|&l| l < LANE_COUNT)
            .collect();
        // stable sort keeps the left lane first when gaps are equal
        candidates.sort_by_key(|&l| std::cmp::Reverse(OrderedFloat(summary.front[l].distance)));
        candidates.into_iter().find(|&l| self.is_lane_acceptable(summary, l))
    }

    /// Cruise speed, or the leader's speed when `lane` is blocked
    fn follow_speed(&self, summary: &LaneGapSummary, lane: usize) -> f64 {
        if self.is_blocked(summary, lane) {
            summary.front[lane].speed.clamp(0.0, self.config.cruise_speed)
        } else {
            self.config.cruise_speed
        }
    }

    fn lane_change_complete(&self, start_s: f64, ego_s: f64) -> bool {
        wrapped_s_distance(start_s, ego_s, self.track_length) >= self.config.lane_change_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::{LaneGap, LANE_CLEAR};

    const TRACK: f64 = 6945.554;

    fn planner() -> LanePlanner {
        LanePlanner::new(PlannerConfig::default(), TRACK)
    }

    fn blocked_middle() -> LaneGapSummary {
        let mut summary = LaneGapSummary::all_clear();
        summary.front[1] = LaneGap::new(15.0, 29.7);
        summary
    }

    #[test]
    fn test_clear_road_keeps_lane_at_cruise_speed() {
        let mut planner = planner();
        let intent = planner.update(&LaneGapSummary::all_clear(), 1, 100.0);
        assert_eq!(intent.lane, 1);
        assert!((intent.target_speed - 49.7).abs() < 1e-10);
        assert!((intent.anchor_spacing - 30.0).abs() < 1e-10);
        assert_eq!(planner.state(), LaneState::Cruising);
    }

    #[test]
    fn test_blocked_with_both_neighbours_clear_prefers_left() {
        let mut planner = planner();
        let intent = planner.update(&blocked_middle(), 1, 100.0);
        assert_eq!(intent.lane, 0);
        assert_eq!(planner.state(), LaneState::ChangingLane { target: 0, start_s: 100.0 });
        assert!((intent.anchor_spacing - 40.0).abs() < 1e-10);
        assert!((intent.target_speed - 49.7).abs() < 1e-10);
    }

    #[test]
    fn test_prefers_larger_forward_gap() {
        let mut summary = blocked_middle();
        summary.front[0] = LaneGap::new(45.0, 40.0);
        summary.front[2] = LaneGap::new(80.0, 40.0);
        let mut planner = planner();
        assert_eq!(planner.update(&summary, 1, 100.0).lane, 2);
    }

    #[test]
    fn test_falls_back_to_other_neighbour_when_preferred_unsafe() {
        let mut summary = blocked_middle();
        summary.front[2] = LaneGap::new(80.0, 40.0);
        summary.rear[2] = LaneGap::new(3.0, 55.0);
        summary.front[0] = LaneGap::new(45.0, 40.0);
        let mut planner = planner();
        assert_eq!(planner.update(&summary, 1, 100.0).lane, 0);
    }

    #[test]
    fn test_no_acceptable_lane_follows_leader() {
        let mut summary = blocked_middle();
        summary.rear[0] = LaneGap::new(2.0, 50.0);
        summary.front[2] = LaneGap::new(10.0, 20.0);
        let mut planner = planner();
        let intent = planner.update(&summary, 1, 100.0);
        assert_eq!(intent.lane, 1);
        assert!((intent.target_speed - 29.7).abs() < 1e-10);
        assert_eq!(planner.state(), LaneState::Cruising);
    }

    #[test]
    fn test_follow_speed_is_clamped() {
        let mut summary = LaneGapSummary::all_clear();
        summary.front[0] = LaneGap::new(10.0, 70.0);
        summary.rear[1] = LaneGap::new(1.0, 10.0);
        let mut planner = planner();
        let intent = planner.update(&summary, 0, 100.0);
        assert_eq!(intent.lane, 0);
        assert!((intent.target_speed - 49.7).abs() < 1e-10);
    }

    #[test]
    fn test_edge_lanes_only_consider_middle() {
        let mut summary = LaneGapSummary::all_clear();
        summary.front[2] = LaneGap::new(12.0, 30.0);
        let planner = planner();
        assert_eq!(planner.select_adjacent_lane(&summary, 2), Some(1));
        assert_eq!(planner.select_adjacent_lane(&summary, 0), Some(1));
    }

    #[test]
    fn test_lane_change_sweep_across_margins() {
        let planner = planner();
        let config = PlannerConfig::default();
        let front_values = [0.0, 15.0, 29.9, 30.0, 30.1, 45.0, LANE_CLEAR];
        let rear_values = [0.0, 2.5, 4.9, 5.0, 5.1, 12.0, LANE_CLEAR];
        for &front in &front_values {
            for &rear in &rear_values {
                let mut summary = LaneGapSummary::all_clear();
                summary.front[1] = LaneGap::new(10.0, 20.0);
                summary.front[0] = LaneGap::new(front, 40.0);
                summary.rear[0] = LaneGap::new(rear, 40.0);
                summary.front[2] = LaneGap::new(0.0, 40.0);
                let expected = front > config.front_margin && rear > config.rear_margin;
                let chosen = planner.select_adjacent_lane(&summary, 1);
                assert_eq!(chosen == Some(0), expected, "front {} rear {}", front, rear);
                assert_ne!(chosen, Some(2));
            }
        }
    }

    #[test]
    fn test_target_lane_held_until_complete() {
        let mut planner = planner();
        planner.update(&blocked_middle(), 1, 100.0);

        // middle lane clears up, but the change is still in progress
        let clear = LaneGapSummary::all_clear();
        let intent = planner.update(&clear, 1, 130.0);
        assert_eq!(intent.lane, 0);
        assert!(planner.is_changing_lane());

        let intent = planner.update(&clear, 0, 160.0);
        assert_eq!(intent.lane, 0);
        assert_eq!(planner.state(), LaneState::Cruising);
        assert!((intent.anchor_spacing - 30.0).abs() < 1e-10);
    }

    #[test]
    fn test_lane_change_completion_across_lap_boundary() {
        let mut planner = planner();
        planner.update(&blocked_middle(), 1, TRACK - 20.0);
        let clear = LaneGapSummary::all_clear();
        planner.update(&clear, 0, 10.0);
        assert!(planner.is_changing_lane());
        planner.update(&clear, 0, 45.0);
        assert!(!planner.is_changing_lane());
    }

    #[test]
    fn test_blocked_target_lane_during_change_follows_its_leader() {
        let mut planner = planner();
        planner.update(&blocked_middle(), 1, 100.0);
        let mut summary = LaneGapSummary::all_clear();
        summary.front[0] = LaneGap::new(20.0, 35.0);
        let intent = planner.update(&summary, 0, 110.0);
        assert_eq!(intent.lane, 0);
        assert!((intent.target_speed - 35.0).abs() < 1e-10);
    }

    #[test]
    fn test_planner_is_deterministic() {
        let mut summary = blocked_middle();
        summary.front[0] = LaneGap::new(50.0, 45.0);
        summary.rear[2] = LaneGap::new(8.0, 48.0);
        let mut a = planner();
        let mut b = planner();
        for step in 0..20 {
            let s = 100.0 + 5.0 * step as f64;
            let lane = if step == 0 { 1 } else { 0 };
            assert_eq!(a.update(&summary, lane, s), b.update(&summary, lane, s));
            assert_eq!(a.state(), b.state());
        }
    }

    #[test]
    fn test_abort_and_reset() {
        let mut planner = planner();
        planner.update(&blocked_middle(), 1, 100.0);
        assert!(planner.is_changing_lane());
        planner.abort_lane_change();
        assert_eq!(planner.state(), LaneState::Cruising);
        planner.update(&blocked_middle(), 1, 100.0);
        planner.reset();
        assert_eq!(planner.state(), LaneState::Cruising);
        assert_eq!(format!("{}", planner.state()), "cruising");
    }
}
