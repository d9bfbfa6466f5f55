//! Error types for highway_planner

use std::fmt;

/// Main error type for the planning pipeline
#[derive(Debug)]
pub enum PlannerError {
    /// Road map is missing or malformed
    MapError(String),
    /// Telemetry frame could not be interpreted
    TelemetryError(String),
    /// Numerical computation failed (degenerate spline anchors, singular system)
    NumericalError(String),
    /// Invalid parameter
    InvalidParameter(String),
    /// Configuration file could not be parsed
    ConfigError(String),
    /// I/O error
    IoError(std::io::Error),
    /// JSON encoding/decoding error
    JsonError(serde_json::Error),
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::MapError(msg) => write!(f, "Map error: {}", msg),
            PlannerError::TelemetryError(msg) => write!(f, "Telemetry error: {}", msg),
            PlannerError::NumericalError(msg) => write!(f, "Numerical error: {}", msg),
            PlannerError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            PlannerError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            PlannerError::IoError(e) => write!(f, "I/O error: {}", e),
            PlannerError::JsonError(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for PlannerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlannerError::IoError(e) => Some(e),
            PlannerError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PlannerError {
    fn from(e: std::io::Error) -> Self {
        PlannerError::IoError(e)
    }
}

impl From<serde_json::Error> for PlannerError {
    fn from(e: serde_json::Error) -> Self {
        PlannerError::JsonError(e)
    }
}

impl From<toml::de::Error> for PlannerError {
    fn from(e: toml::de::Error) -> Self {
        PlannerError::ConfigError(e.to_string())
    }
}

/// Result type alias for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
