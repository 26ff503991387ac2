use log::info;
use minvent::{batch, cycle::Trajectory};
use serde::Serialize;
use simple_error::try_with;

#[path = "../scenario_params.rs"]
mod scenario_params;

#[derive(Debug, Serialize)]
struct RunSummary {
    cell_type: String,
    num_cycles: usize,
    num_samples: usize,
    t_end: f64,
    final_state: [f64; 4],
    ap_min: f64,
    ap_max: f64,
}

fn summarize(cell_type: String, trajectory: &Trajectory) -> RunSummary {
    let aps = trajectory.action_potential();

    RunSummary {
        cell_type,
        num_cycles: trajectory.num_cycles(),
        num_samples: trajectory.len(),
        t_end: trajectory.times.last().copied().unwrap_or(0.0),
        final_state: trajectory
            .final_state()
            .map(|state| state.to_array())
            .unwrap_or([f64::NAN; 4]),
        ap_min: aps.iter().copied().fold(f64::INFINITY, f64::min),
        ap_max: aps.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let path = std::env::args().nth(1);
    let params = scenario_params::load_scenario_params(path.as_deref())?;
    info!("loaded {} simulations", params.simulations.len());

    let trajectories = try_with!(batch::run_batch(&params), "batch run failed");

    for (simulation_params, trajectory) in params.simulations.iter().zip(&trajectories) {
        let summary = summarize(simulation_params.cell_type.to_string(), trajectory);
        println!("{}", serde_json::to_string(&summary)?);
    }

    Ok(())
}
