//! Offline closed-loop simulation

pub mod highway_sim;

pub use highway_sim::{HighwaySimulator, SimulatorConfig, StepRecord, TrafficVehicle};
