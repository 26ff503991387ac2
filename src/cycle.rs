use std::ops::{ControlFlow, Range};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{MvError, MvResult};
use crate::model::{self, MvModel};
use crate::ode::{Dopri5Integrator, Integrator, OdeError, OdeSolution, SolverOptions};
use crate::params::{self, MvParams};
use crate::types::{CurrentVector, StateVector, NUM_STATE_VARS};
use crate::util;

const SAMPLES_PER_TIME_UNIT_WARN: f64 = 50.0;

/// Samples of a chained multi-cycle run. Rows of `times`, `states` and
/// `currents` correspond one to one.
///
/// `times` is non-decreasing: every cycle keeps its seed sample, so each
/// boundary instant `k * cycle_length` appears twice, as the last row of
/// cycle `k - 1` and the first row of cycle `k`, with equal states. Within
/// a cycle times strictly increase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub states: Vec<StateVector>,
    pub currents: Vec<CurrentVector>,
    cycle_starts: Vec<usize>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn num_cycles(&self) -> usize {
        self.cycle_starts.len()
    }

    /// Row range covered by each cycle, in cycle order.
    pub fn cycle_ranges(&self) -> Vec<Range<usize>> {
        self.cycle_starts
            .iter()
            .enumerate()
            .map(|(idx, &start)| {
                let end = self
                    .cycle_starts
                    .get(idx + 1)
                    .copied()
                    .unwrap_or(self.times.len());
                start..end
            })
            .collect()
    }

    pub fn states_matrix(&self) -> Vec<[f64; NUM_STATE_VARS]> {
        self.states.iter().map(|state| state.to_array()).collect()
    }

    pub fn currents_matrix(&self) -> Vec<[f64; NUM_STATE_VARS]> {
        self.currents
            .iter()
            .map(|current| current.to_array())
            .collect()
    }

    pub fn action_potential(&self) -> Vec<f64> {
        util::aps_from_states(&self.states)
    }

    pub fn final_state(&self) -> Option<StateVector> {
        self.states.last().copied()
    }

    fn append_cycle(&mut self, offset: f64, solution: OdeSolution, currents: Vec<CurrentVector>) {
        self.cycle_starts.push(self.times.len());
        self.times.extend(solution.t.iter().map(|t| t + offset));
        self.states.extend(solution.y);
        self.currents.extend(currents);
    }
}

/// Called between cycles; the only point at which a run can be stopped.
pub trait CycleObserver {
    fn on_cycle_complete(
        &mut self,
        cycle: usize,
        num_cycles: usize,
        final_state: &StateVector,
    ) -> ControlFlow<()>;
}

pub struct NoopObserver;

impl CycleObserver for NoopObserver {
    fn on_cycle_complete(&mut self, _: usize, _: usize, _: &StateVector) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

pub struct LogProgress {
    label: String,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl CycleObserver for LogProgress {
    fn on_cycle_complete(
        &mut self,
        cycle: usize,
        num_cycles: usize,
        final_state: &StateVector,
    ) -> ControlFlow<()> {
        info!(
            "{}: cycle {}/{} done, u={:.4}",
            self.label,
            cycle + 1,
            num_cycles,
            final_state.u
        );
        ControlFlow::Continue(())
    }
}

impl<F> CycleObserver for F
where
    F: FnMut(usize, usize, &StateVector) -> ControlFlow<()>,
{
    fn on_cycle_complete(
        &mut self,
        cycle: usize,
        num_cycles: usize,
        final_state: &StateVector,
    ) -> ControlFlow<()> {
        self(cycle, num_cycles, final_state)
    }
}

pub fn run_model(num_cycles: usize, cycle_length: f64, params: &MvParams) -> MvResult<Trajectory> {
    run_model_with(
        num_cycles,
        cycle_length,
        params,
        &SolverOptions::default(),
        &mut NoopObserver,
    )
}

/// Integrates `num_cycles` stimulation cycles of `cycle_length` each. Every
/// cycle starts from the last sample of the previous one; sample times are
/// shifted to absolute time while currents use the time within the cycle.
pub fn run_model_with(
    num_cycles: usize,
    cycle_length: f64,
    params: &MvParams,
    solver_options: &SolverOptions,
    observer: &mut dyn CycleObserver,
) -> MvResult<Trajectory> {
    let mut integrator = Dopri5Integrator::new(*solver_options)
        .map_err(|err| MvError::InvalidArgument(err.to_string()))?;

    run_model_using(num_cycles, cycle_length, params, &mut integrator, observer)
}

/// Same as [`run_model_with`] with the cycle integration delegated to
/// `integrator`. A `Break` from the observer stops the run only while
/// cycles remain; after the last cycle the finished trajectory is returned.
pub fn run_model_using(
    num_cycles: usize,
    cycle_length: f64,
    params: &MvParams,
    integrator: &mut dyn Integrator,
    observer: &mut dyn CycleObserver,
) -> MvResult<Trajectory> {
    params::validate_run_args(num_cycles, cycle_length)?;

    info!("running {} cycles of length {}", num_cycles, cycle_length);

    let model = MvModel::new(params);
    let mut trajectory = Trajectory::default();
    let mut y0 = params::get_initial_conditions();

    for cycle in 0..num_cycles {
        let solution = integrator
            .integrate(model, &y0, cycle_length)
            .map_err(|err| integration_failure(cycle, err))?;

        let currents = model::currents_many(&solution.t, &solution.y, params)?;

        if let Some((_, last)) = solution.last() {
            y0 = last;
        }

        let num_samples = solution.len();
        debug!(
            "cycle {}: {} samples, final state {:?}",
            cycle, num_samples, y0
        );
        if num_samples as f64 > SAMPLES_PER_TIME_UNIT_WARN * cycle_length {
            warn!(
                "cycle {} needed {} samples for a span of {}",
                cycle, num_samples, cycle_length
            );
        }

        trajectory.append_cycle(cycle as f64 * cycle_length, solution, currents);

        let flow = observer.on_cycle_complete(cycle, num_cycles, &y0);
        if flow.is_break() && cycle + 1 < num_cycles {
            return Err(MvError::Cancelled { cycle });
        }
    }

    info!("run finished with {} samples", trajectory.len());

    Ok(trajectory)
}

fn integration_failure(cycle: usize, err: OdeError) -> MvError {
    match err {
        OdeError::Stopped { t, state, reason } => MvError::IntegrationFailure {
            cycle,
            t,
            state,
            reason,
        },
        OdeError::InvalidOptions(_) => MvError::InvalidArgument(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::get_model_parameters;
    use float_cmp::assert_approx_eq;
    use itertools::Itertools;

    #[test]
    fn single_cycle() {
        let params = get_model_parameters("epi").unwrap();
        let trajectory = run_model(1, 500.0, &params).unwrap();

        assert_eq!(trajectory.times[0], 0.0);
        assert_approx_eq!(f64, *trajectory.times.last().unwrap(), 500.0);
        assert_eq!(trajectory.states.len(), trajectory.len());
        assert_eq!(trajectory.currents.len(), trajectory.len());
        assert!(trajectory.times.iter().tuple_windows().all(|(a, b)| a < b));
        assert_eq!(trajectory.cycle_ranges(), vec![0..trajectory.len()]);
    }

    #[test]
    fn action_potential_fires() {
        let params = get_model_parameters("epi").unwrap();
        let trajectory = run_model(1, 500.0, &params).unwrap();

        let u_max = trajectory
            .states
            .iter()
            .map(|state| state.u)
            .fold(f64::MIN, f64::max);
        assert!(u_max > 1.0);

        // back near rest at the end of the cycle
        let final_state = trajectory.final_state().unwrap();
        assert!(final_state.u < 0.1);
    }

    #[test]
    fn currents_use_local_time() {
        let params = get_model_parameters("endo").unwrap();
        let trajectory = run_model(3, 400.0, &params).unwrap();

        for range in trajectory.cycle_ranges() {
            let start = trajectory.times[range.start];
            for idx in range {
                let local_t = trajectory.times[idx] - start;
                let expected = if local_t < 1.0 - 1e-9 { 0.4 } else { 0.0 };
                if (local_t - 1.0).abs() > 1e-9 {
                    assert_eq!(trajectory.currents[idx].j_stim, expected);
                }
            }
        }
    }

    #[test]
    fn cycles_are_chained() {
        let params = get_model_parameters("m").unwrap();
        let trajectory = run_model(2, 300.0, &params).unwrap();
        let ranges = trajectory.cycle_ranges();

        assert_eq!(ranges.len(), 2);
        let last_of_first = trajectory.states[ranges[0].end - 1];
        let first_of_second = trajectory.states[ranges[1].start];
        assert_eq!(last_of_first, first_of_second);
        assert_approx_eq!(f64, trajectory.times[ranges[1].start], 300.0);
    }

    #[test]
    fn rejects_invalid_arguments() {
        let params = MvParams::default();

        assert!(matches!(
            run_model(0, 500.0, &params),
            Err(MvError::InvalidArgument(_))
        ));
        assert!(matches!(
            run_model(1, 0.0, &params),
            Err(MvError::InvalidArgument(_))
        ));
        assert!(matches!(
            run_model(1, -5.0, &params),
            Err(MvError::InvalidArgument(_))
        ));
    }

    #[test]
    fn observer_can_cancel() {
        let params = MvParams::default();
        let mut seen = Vec::new();
        let mut observer = |cycle: usize, _: usize, _: &StateVector| {
            seen.push(cycle);
            if cycle == 1 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };

        let result = run_model_with(5, 100.0, &params, &SolverOptions::default(), &mut observer);

        assert_eq!(result.unwrap_err(), MvError::Cancelled { cycle: 1 });
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn break_after_last_cycle_keeps_run() {
        let params = MvParams::default();
        let mut seen = Vec::new();
        let mut observer = |cycle: usize, num_cycles: usize, _: &StateVector| {
            seen.push(cycle);
            if cycle + 1 == num_cycles {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };

        let trajectory =
            run_model_with(3, 100.0, &params, &SolverOptions::default(), &mut observer).unwrap();

        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(trajectory.num_cycles(), 3);
        assert_approx_eq!(f64, *trajectory.times.last().unwrap(), 300.0);
    }

    #[test]
    fn solver_failure_names_cycle() {
        let params = MvParams::default();
        let options = SolverOptions {
            max_steps: 20,
            ..SolverOptions::default()
        };

        let result = run_model_with(2, 500.0, &params, &options, &mut NoopObserver);

        match result {
            Err(MvError::IntegrationFailure { cycle, t, .. }) => {
                assert_eq!(cycle, 0);
                assert!(t > 0.0 && t < 500.0);
            }
            other => panic!("expected IntegrationFailure, got {:?}", other),
        }
    }

    #[test]
    fn matrices_match_rows() {
        let params = MvParams::default();
        let trajectory = run_model(1, 50.0, &params).unwrap();

        let states = trajectory.states_matrix();
        let currents = trajectory.currents_matrix();
        assert_eq!(states.len(), trajectory.len());
        assert_eq!(states[0], [0.0, 1.0, 1.0, 0.0]);
        assert_eq!(currents[0][3], 0.4);
        assert_eq!(trajectory.action_potential()[0], -84.0);
    }
}
