//! Simulator wire format
//!
//! The simulator talks socket.io: event frames are text starting with `42`
//! followed by a JSON array `["event", {data}]`. A payload of `null` means
//! the car is under manual control and expects a `manual` reply.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::common::{PlannerError, PlannerResult, Point2D, Pose2D, Trajectory};
use crate::perception::VehicleObservation;

/// Reply sent while the simulator is in manual mode
pub const MANUAL_REPLY: &str = "42[\"manual\",{}]";

/// Per-tick state report from the simulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub x: f64,
    pub y: f64,
    pub s: f64,
    pub d: f64,
    /// Heading [deg]
    pub yaw: f64,
    /// Speed [mph]
    pub speed: f64,
    pub previous_path_x: Vec<f64>,
    pub previous_path_y: Vec<f64>,
    pub end_path_s: f64,
    pub end_path_d: f64,
    /// Rows of `[id, x, y, vx, vy, s, d]`
    pub sensor_fusion: Vec<[f64; 7]>,
}

impl Telemetry {
    /// Ego pose with yaw converted to radians in [-pi, pi]
    pub fn pose(&self) -> Pose2D {
        let mut pose = Pose2D::new(self.x, self.y, self.yaw.to_radians());
        pose.normalize_yaw();
        pose
    }

    /// Unconsumed part of the path sent last tick
    pub fn previous_path(&self) -> PlannerResult<Trajectory> {
        Trajectory::from_xy(&self.previous_path_x, &self.previous_path_y)
            .map_err(|e| PlannerError::TelemetryError(format!("previous path: {}", e)))
    }

    pub fn observations(&self) -> Vec<VehicleObservation> {
        self.sensor_fusion
            .iter()
            .map(|&[id, x, y, vx, vy, s, d]| {
                VehicleObservation::new(id as u32, Point2D::new(x, y), (vx, vy), s, d)
            })
            .collect()
    }
}

/// Decoded simulator event
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Telemetry(Box<Telemetry>),
    /// Car under manual control, no data attached
    Manual,
    /// Any other named event
    Other(String),
}

/// Decode a text frame; frames that are not socket.io events yield `None`
pub fn decode_frame(frame: &str) -> PlannerResult<Option<SimEvent>> {
    if frame.len() <= 2 || !frame.starts_with("42") {
        return Ok(None);
    }

    let payload = match (frame.find('['), frame.rfind(']')) {
        (Some(start), Some(end)) if end > start && !frame.contains("null") => &frame[start..=end],
        _ => return Ok(Some(SimEvent::Manual)),
    };

    let value: Value = serde_json::from_str(payload)?;
    let event = value
        .get(0)
        .and_then(Value::as_str)
        .ok_or_else(|| PlannerError::TelemetryError("event frame without a name".to_string()))?;

    match event {
        "telemetry" => {
            let data = value
                .get(1)
                .cloned()
                .ok_or_else(|| PlannerError::TelemetryError("telemetry event without data".to_string()))?;
            let telemetry: Telemetry = serde_json::from_value(data)?;
            if telemetry.previous_path_x.len() != telemetry.previous_path_y.len() {
                return Err(PlannerError::TelemetryError(format!(
                    "previous path has {} x but {} y values",
                    telemetry.previous_path_x.len(),
                    telemetry.previous_path_y.len()
                )));
            }
            Ok(Some(SimEvent::Telemetry(Box::new(telemetry))))
        }
        other => Ok(Some(SimEvent::Other(other.to_string()))),
    }
}

/// `control` event carrying the next waypoints
pub fn encode_control(trajectory: &Trajectory) -> String {
    let msg = json!({
        "next_x": trajectory.x_coords(),
        "next_y": trajectory.y_coords(),
    });
    format!("42[\"control\",{}]", msg)
}

/// `telemetry` event as the simulator would send it
pub fn encode_telemetry(telemetry: &Telemetry) -> PlannerResult<String> {
    Ok(format!("42[\"telemetry\",{}]", serde_json::to_string(telemetry)?))
}
