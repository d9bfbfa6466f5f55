// Line-oriented bridge to the simulator: one socket.io text frame per line on
// stdin, replies on stdout, logs on stderr.
//
// usage: telemetry_bridge <highway_map.csv> [planner.toml]
use std::io::{self, BufRead, Write};
use std::path::Path;

use tracing::info;
use tracing_subscriber::EnvFilter;

use highway_planner::map::HIGHWAY_MAX_S;
use highway_planner::{ControlLoop, PlannerConfig, PlannerError, PlannerResult, RoadMap};

fn main() -> PlannerResult<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("highway_planner=info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let map_path = args
        .get(1)
        .ok_or_else(|| PlannerError::InvalidParameter("usage: telemetry_bridge <map> [config.toml]".to_string()))?;

    // no map, no driving
    let map = RoadMap::load(Path::new(map_path), HIGHWAY_MAX_S)?;
    let config = match args.get(2) {
        Some(path) => PlannerConfig::load(Path::new(path))?,
        None => PlannerConfig::default(),
    };

    let mut control = ControlLoop::new(config, &map)?;
    info!("waiting for frames on stdin");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in stdin.lock().lines() {
        let line = line?;
        if let Some(reply) = control.handle_frame(line.trim_end()) {
            writeln!(out, "{}", reply)?;
            out.flush()?;
        }
    }

    info!(ticks = control.ticks(), "input closed");
    Ok(())
}
