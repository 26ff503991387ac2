use std::sync::mpsc::channel as mpsc_channel;
use std::thread;

use core_affinity::CoreId;
use log::info;

use crate::cycle::{self, LogProgress, Trajectory};
use crate::error::{MvError, MvResult};
use crate::params::{self, BatchParams, MvParams, SimulationParams};

/// Runs every simulation of the batch to completion. Simulations are
/// independent, so they are spread over worker threads; the cycles of a
/// single simulation always run on one thread.
pub fn run_batch(batch_params: &BatchParams) -> MvResult<Vec<Trajectory>> {
    params::validate_batch_params(batch_params)?;

    let num_simulations = batch_params.simulations.len();
    let num_threads = get_num_threads(batch_params).min(num_simulations.max(1));

    info!(
        "running {} simulations on {} threads",
        num_simulations, num_threads
    );

    let (result_tx, result_rx) = mpsc_channel();
    let mut join_handles = Vec::new();

    for thread_id in 0..num_threads {
        let result_tx = result_tx.clone();
        let pin_threads = batch_params.technical_params.pin_threads;
        let assigned: Vec<(usize, SimulationParams)> = batch_params
            .simulations
            .iter()
            .cloned()
            .enumerate()
            .skip(thread_id)
            .step_by(num_threads)
            .collect();

        join_handles.push(thread::spawn(move || {
            if pin_threads {
                let core_id = CoreId { id: thread_id };
                core_affinity::set_for_current(core_id);
            }

            for (idx, simulation_params) in assigned {
                let result = run_simulation(idx, &simulation_params);
                if result_tx.send((idx, result)).is_err() {
                    break;
                }
            }
        }));
    }

    drop(result_tx);

    let mut results: Vec<Option<MvResult<Trajectory>>> = vec![None; num_simulations];
    for (idx, result) in result_rx {
        results[idx] = Some(result);
    }

    for join_handle in join_handles {
        join_handle.join().map_err(|_| MvError::WorkerPanicked)?;
    }

    results
        .into_iter()
        .map(|result| result.unwrap_or(Err(MvError::WorkerPanicked)))
        .collect()
}

pub fn run_simulation(idx: usize, simulation_params: &SimulationParams) -> MvResult<Trajectory> {
    let model_params = MvParams::for_cell_type(simulation_params.cell_type);
    let mut progress = LogProgress::new(format!(
        "simulation {} ({})",
        idx, simulation_params.cell_type
    ));

    cycle::run_model_with(
        simulation_params.num_cycles,
        simulation_params.cycle_length,
        &model_params,
        &simulation_params.solver,
        &mut progress,
    )
}

fn get_num_threads(batch_params: &BatchParams) -> usize {
    batch_params
        .technical_params
        .num_threads
        .unwrap_or_else(num_cpus::get)
}
