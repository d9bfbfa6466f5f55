//! Visualization utilities for the highway planner
//!
//! Thin layer over gnuplot for drawing the road, traffic, the ego vehicle and
//! emitted trajectories.

use std::io;
use std::path::Path;

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};

use crate::common::{FrenetPoint, MapGeometry, PlannerError, PlannerResult, Point2D, Pose2D, Trajectory, Visualizable};
use crate::config::LANE_COUNT;
use crate::map::RoadMap;
use crate::perception::VehicleObservation;

/// Color palette for consistent styling
pub mod colors {
    pub const BLACK: &str = "#000000";
    pub const RED: &str = "#FF0000";
    pub const BLUE: &str = "#0000FF";
    pub const CYAN: &str = "#00FFFF";
    pub const GRAY: &str = "#808080";

    pub const ROAD_EDGE: &str = BLACK;
    pub const LANE_LINE: &str = GRAY;
    pub const TRAJECTORY: &str = RED;
    pub const EGO: &str = CYAN;
    pub const TRAFFIC: &str = BLUE;
}

/// Style for path rendering
#[derive(Debug, Clone)]
pub struct PathStyle {
    pub color: String,
    pub line_width: f64,
    pub caption: String,
}

impl PathStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            line_width: 2.0,
            caption: caption.to_string(),
        }
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }
}

impl Default for PathStyle {
    fn default() -> Self {
        Self::new(colors::TRAJECTORY, "Trajectory")
    }
}

/// Style for point rendering
#[derive(Debug, Clone)]
pub struct PointStyle {
    pub color: String,
    pub size: f64,
    pub symbol: char,
    pub caption: String,
}

impl PointStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            size: 1.0,
            symbol: 'O',
            caption: caption.to_string(),
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_symbol(mut self, symbol: char) -> Self {
        self.symbol = symbol;
        self
    }
}

/// Lane boundary polylines (`d = k * lane_width`, `k = 0..=LANE_COUNT`),
/// each sampled at the map waypoints and closed back onto its start
pub fn lane_boundaries(map: &RoadMap, lane_width: f64) -> Vec<Vec<Point2D>> {
    (0..=LANE_COUNT)
        .map(|k| {
            let d = k as f64 * lane_width;
            map.waypoints()
                .iter()
                .chain(map.waypoints().first())
                .map(|wp| map.to_cartesian(FrenetPoint::new(wp.s, d)))
                .collect()
        })
        .collect()
}

/// Main visualizer struct
pub struct Visualizer {
    figure: Figure,
    title: String,
    lane_width: f64,
    x_range: Option<(f64, f64)>,
    y_range: Option<(f64, f64)>,
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            figure: Figure::new(),
            title: String::new(),
            lane_width: 4.0,
            x_range: None,
            y_range: None,
        }
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    /// Lane width used when drawing a road
    pub fn set_lane_width(&mut self, lane_width: f64) -> &mut Self {
        self.lane_width = lane_width;
        self
    }

    pub fn set_x_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.x_range = Some((min, max));
        self
    }

    pub fn set_y_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.y_range = Some((min, max));
        self
    }

    /// Zoom to a square window around `center`
    pub fn focus_on(&mut self, center: Point2D, half_width: f64) -> &mut Self {
        self.set_x_range(center.x - half_width, center.x + half_width);
        self.set_y_range(center.y - half_width, center.y + half_width)
    }

    pub fn plot_path_xy(&mut self, x: &[f64], y: &[f64], style: &PathStyle) -> &mut Self {
        self.figure.axes2d()
            .lines(x, y, &[
                Caption(&style.caption),
                Color(&style.color),
                LineWidth(style.line_width),
            ]);
        self
    }

    pub fn plot_trajectory(&mut self, trajectory: &Trajectory, style: &PathStyle) -> &mut Self {
        self.plot_path_xy(&trajectory.x_coords(), &trajectory.y_coords(), style)
    }

    pub fn plot_points(&mut self, points: &[Point2D], style: &PointStyle) -> &mut Self {
        let x: Vec<f64> = points.iter().map(|p| p.x).collect();
        let y: Vec<f64> = points.iter().map(|p| p.y).collect();

        self.figure.axes2d()
            .points(&x, &y, &[
                Caption(&style.caption),
                Color(&style.color),
                PointSymbol(style.symbol),
                PointSize(style.size),
            ]);
        self
    }

    /// Road edges and lane separators
    pub fn plot_road(&mut self, map: &RoadMap) -> &mut Self {
        let boundaries = lane_boundaries(map, self.lane_width);
        let last = boundaries.len().saturating_sub(1);
        for (k, line) in boundaries.iter().enumerate() {
            let (color, width) = if k == 0 || k == last {
                (colors::ROAD_EDGE, 2.0)
            } else {
                (colors::LANE_LINE, 1.0)
            };
            let x: Vec<f64> = line.iter().map(|p| p.x).collect();
            let y: Vec<f64> = line.iter().map(|p| p.y).collect();
            self.figure.axes2d()
                .lines(&x, &y, &[Color(color), LineWidth(width)]);
        }
        self
    }

    /// Observed traffic vehicles
    pub fn plot_traffic(&mut self, vehicles: &[VehicleObservation]) -> &mut Self {
        let points: Vec<Point2D> = vehicles.iter().map(|v| Point2D::new(v.x, v.y)).collect();
        self.plot_points(&points, &PointStyle::new(colors::TRAFFIC, "Traffic").with_symbol('S').with_size(1.5))
    }

    /// Ego pose with a heading tick
    pub fn plot_ego(&mut self, pose: &Pose2D, size: f64) -> &mut Self {
        self.figure.axes2d()
            .points(&[pose.x], &[pose.y], &[
                Caption("Ego"),
                Color(colors::EGO),
                PointSymbol('O'),
                PointSize(size),
            ]);

        let arrow_len = size * 2.0;
        let end_x = pose.x + arrow_len * pose.yaw.cos();
        let end_y = pose.y + arrow_len * pose.yaw.sin();

        self.figure.axes2d()
            .lines(&[pose.x, end_x], &[pose.y, end_y], &[
                Color(colors::EGO),
                LineWidth(2.0),
            ]);
        self
    }

    /// Draw anything that knows how to draw itself
    pub fn draw<V: Visualizable + ?Sized>(&mut self, item: &V) -> &mut Self {
        item.visualize(self);
        self
    }

    pub fn save_png(&mut self, path: &Path, width: u32, height: u32) -> PlannerResult<()> {
        self.apply_settings();
        self.figure.save_to_png(path, width, height).map_err(plot_error)
    }

    fn apply_settings(&mut self) {
        let axes = self.figure.axes2d();

        if !self.title.is_empty() {
            axes.set_title(&self.title, &[]);
        }
        axes.set_x_label("X [m]", &[]);
        axes.set_y_label("Y [m]", &[]);

        if let Some((min, max)) = self.x_range {
            axes.set_x_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some((min, max)) = self.y_range {
            axes.set_y_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        axes.set_aspect_ratio(AutoOption::Fix(1.0));
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

fn plot_error<E: std::fmt::Display>(e: E) -> PlannerError {
    PlannerError::IoError(io::Error::new(io::ErrorKind::Other, format!("gnuplot: {}", e)))
}

impl Visualizable for RoadMap {
    fn visualize(&self, vis: &mut Visualizer) {
        vis.plot_road(self);
    }
}

impl Visualizable for Trajectory {
    fn visualize(&self, vis: &mut Visualizer) {
        vis.plot_trajectory(self, &PathStyle::default());
    }
}
