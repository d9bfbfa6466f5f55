//! Common traits defining the seams between pipeline components

use crate::common::types::*;

/// Road geometry: conversion between Frenet and Cartesian coordinates
/// on a closed track.
pub trait MapGeometry {
    /// Length of one lap; `s` wraps around at this value
    fn track_length(&self) -> f64;

    /// Convert a road-relative position to world coordinates
    fn to_cartesian(&self, frenet: FrenetPoint) -> Point2D;

    /// Project a world position (with heading in radians) onto the road
    fn to_frenet(&self, point: Point2D, yaw: f64) -> FrenetPoint;
}

impl<M: MapGeometry + ?Sized> MapGeometry for &M {
    fn track_length(&self) -> f64 {
        (**self).track_length()
    }

    fn to_cartesian(&self, frenet: FrenetPoint) -> Point2D {
        (**self).to_cartesian(frenet)
    }

    fn to_frenet(&self, point: Point2D, yaw: f64) -> FrenetPoint {
        (**self).to_frenet(point, yaw)
    }
}

/// Trait for visualizable objects
pub trait Visualizable {
    /// Draw current state to visualizer
    fn visualize(&self, vis: &mut crate::utils::Visualizer);
}
