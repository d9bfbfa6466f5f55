//! Simulator protocol and the per-tick control loop

pub mod control_loop;
pub mod telemetry;

pub use control_loop::{ControlLoop, EgoState};
pub use telemetry::{decode_frame, encode_control, encode_telemetry, SimEvent, Telemetry, MANUAL_REPLY};
