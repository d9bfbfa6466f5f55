// Closed-loop highway run on a circular test track.
//
// usage: highway_sim [planner.toml]
// Writes ./img/highway_sim.png (needs gnuplot) and ./img/speed_profile.svg.
use std::path::Path;

use plotlib::page::Page;
use plotlib::repr::Plot;
use plotlib::style::LineStyle;
use plotlib::view::ContinuousView;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use highway_planner::perception::lane_index;
use highway_planner::simulation::{HighwaySimulator, SimulatorConfig};
use highway_planner::utils::{PathStyle, Visualizer};
use highway_planner::{ControlLoop, PlannerConfig, PlannerResult, RoadMap};

const STEPS: usize = 1500;
const TRACK_RADIUS: f64 = 1000.0;

fn main() -> PlannerResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("highway_planner=info,highway_sim=info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            PlannerConfig::load(Path::new(&path))?
        }
        None => PlannerConfig::default(),
    };

    let map = RoadMap::circular(TRACK_RADIUS, 2000)?;
    let sim_config = SimulatorConfig {
        lane_width: config.lane_width,
        tick_interval: config.tick_interval,
        ego_lane: config.start_lane,
        ..SimulatorConfig::default()
    };
    let mut sim = HighwaySimulator::new(sim_config, &map)?;
    let mut control = ControlLoop::new(config.clone(), &map)?;

    let records = sim.run(&mut control, STEPS);

    let lane_changes = records
        .windows(2)
        .filter(|w| lane_index(w[0].d, config.lane_width) != lane_index(w[1].d, config.lane_width))
        .count();
    let min_gap = records.iter().map(|r| r.nearest_gap).fold(f64::INFINITY, f64::min);
    let max_speed = records.iter().map(|r| r.speed).fold(0.0, f64::max);
    info!(
        time = sim.elapsed(),
        distance = sim.odometer(),
        max_speed,
        min_gap,
        lane_changes,
        "run finished"
    );

    std::fs::create_dir_all("./img")?;

    // final scene
    let telemetry = sim.telemetry();
    let trajectory = control.tick(&telemetry);
    let mut vis = Visualizer::new();
    vis.set_title("Highway planner")
        .set_lane_width(config.lane_width)
        .focus_on(sim.ego_pose().position(), 60.0);
    vis.draw(&map)
        .plot_traffic(&telemetry.observations())
        .plot_trajectory(&trajectory, &PathStyle::default())
        .plot_ego(&sim.ego_pose(), 1.5);
    if let Err(e) = vis.save_png(Path::new("./img/highway_sim.png"), 800, 800) {
        warn!("could not render scene: {}", e);
    }

    // speed profile
    let profile: Vec<(f64, f64)> = records.iter().map(|r| (r.time, r.speed)).collect();
    let s0: Plot = Plot::new(profile).line_style(
        LineStyle::new()
            .colour("#35C788")
            .width(2.),
    );
    let limit: Plot = Plot::new(vec![(0.0, config.cruise_speed), (sim.elapsed(), config.cruise_speed)])
        .line_style(
            LineStyle::new()
                .colour("#DD3355")
                .width(1.),
        );
    let v = ContinuousView::new()
        .add(s0)
        .add(limit)
        .y_range(0., config.cruise_speed + 5.0)
        .x_label("time [s]")
        .y_label("speed [mph]");
    if let Err(e) = Page::single(&v).save("./img/speed_profile.svg") {
        warn!("could not write speed profile: {:?}", e);
    }

    Ok(())
}
