//! Control: speed governance and trajectory synthesis

pub mod trajectory_controller;

pub use trajectory_controller::TrajectoryController;
