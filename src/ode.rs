//! Glue between [`MvModel`] and the `ode_solvers` Dormand–Prince stepper.
//!
//! The stepper runs in sparse output mode with `dx = 0`, so the solution is
//! reported at every accepted step, starting with the initial point and
//! ending at the end of the span.

use log::debug;
use ode_solvers::dopri5::Dopri5;
use ode_solvers::dop_shared::OutputType;
use ode_solvers::Vector4;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::MvModel;
use crate::types::StateVector;

pub type State = Vector4<f64>;

const SAFETY_FACTOR: f64 = 0.9;
const BETA: f64 = 0.04;
const FAC_MIN: f64 = 0.2;
const FAC_MAX: f64 = 10.0;
const STIFFNESS_CHECK_INTERVAL: u32 = 1000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OdeError {
    #[error("invalid solver options: {0}")]
    InvalidOptions(String),

    #[error("integration stopped at t={t}: {reason}")]
    Stopped {
        t: f64,
        state: StateVector,
        reason: String,
    },
}

/// Step control of a single integration. Missing fields in a scenario file
/// take their default value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub first_step: f64,
    pub max_step: f64,
    pub rtol: f64,
    pub atol: f64,
    pub max_steps: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            first_step: 0.01,
            max_step: 1.0,
            rtol: 1e-3,
            atol: 1e-6,
            max_steps: 1_000_000,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> Result<(), OdeError> {
        if !self.first_step.is_finite() || self.first_step <= 0.0 {
            return Err(OdeError::InvalidOptions(
                "first_step must be finite and strictly positive".into(),
            ));
        }

        if self.max_step.is_nan() || self.max_step < self.first_step {
            return Err(OdeError::InvalidOptions(
                "max_step must not be less than first_step".into(),
            ));
        }

        if !self.rtol.is_finite() || self.rtol <= 0.0 {
            return Err(OdeError::InvalidOptions(
                "rtol must be finite and strictly positive".into(),
            ));
        }

        if !self.atol.is_finite() || self.atol <= 0.0 {
            return Err(OdeError::InvalidOptions(
                "atol must be finite and strictly positive".into(),
            ));
        }

        if self.max_steps == 0 {
            return Err(OdeError::InvalidOptions(
                "max_steps must be strictly positive".into(),
            ));
        }

        Ok(())
    }
}

/// Samples produced by one integration. Times are local to the span.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OdeSolution {
    pub t: Vec<f64>,
    pub y: Vec<StateVector>,
}

impl OdeSolution {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn last(&self) -> Option<(f64, StateVector)> {
        self.t.last().copied().zip(self.y.last().copied())
    }

    fn push(&mut self, t: f64, y: StateVector) {
        self.t.push(t);
        self.y.push(y);
    }
}

/// Integrates the model over `[0, t_end]` from `y0`.
pub trait Integrator {
    fn integrate(
        &mut self,
        model: MvModel<'_>,
        y0: &StateVector,
        t_end: f64,
    ) -> Result<OdeSolution, OdeError>;
}

#[derive(Debug, Clone)]
pub struct Dopri5Integrator {
    options: SolverOptions,
}

impl Dopri5Integrator {
    pub fn new(options: SolverOptions) -> Result<Self, OdeError> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }
}

impl Integrator for Dopri5Integrator {
    fn integrate(
        &mut self,
        model: MvModel<'_>,
        y0: &StateVector,
        t_end: f64,
    ) -> Result<OdeSolution, OdeError> {
        if !t_end.is_finite() || t_end <= 0.0 {
            return Err(OdeError::InvalidOptions(format!(
                "span end {} must be finite and strictly positive",
                t_end
            )));
        }

        let mut stepper = Dopri5::from_param(
            model,
            0.0,
            t_end,
            0.0,
            State::from(y0.to_array()),
            self.options.rtol,
            self.options.atol,
            SAFETY_FACTOR,
            BETA,
            FAC_MIN,
            FAC_MAX,
            self.options.max_step.min(t_end),
            self.options.first_step.min(t_end),
            u32::try_from(self.options.max_steps).unwrap_or(u32::MAX),
            STIFFNESS_CHECK_INTERVAL,
            OutputType::Sparse,
        );

        let outcome = stepper.integrate();
        let solution = collect_samples(y0, stepper.x_out(), stepper.y_out());

        match outcome {
            Ok(stats) => {
                debug!(
                    "integrated to {}: {} evaluations, {} accepted and {} rejected steps",
                    t_end, stats.num_eval, stats.accepted_steps, stats.rejected_steps
                );
                Ok(solution)
            }
            Err(err) => {
                let (t, state) = solution.last().unwrap_or((0.0, *y0));
                Err(OdeError::Stopped {
                    t,
                    state,
                    reason: err.to_string(),
                })
            }
        }
    }
}

/// Seed sample first, then every output row whose time moves forward.
fn collect_samples(y0: &StateVector, x_out: &[f64], y_out: &[State]) -> OdeSolution {
    let mut solution = OdeSolution::default();
    solution.push(0.0, *y0);

    for (&t, y) in x_out.iter().zip(y_out) {
        if t > solution.t[solution.len() - 1] {
            solution.push(t, StateVector::new(y[0], y[1], y[2], y[3]));
        }
    }

    solution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{get_initial_conditions, get_model_parameters, MvParams};
    use float_cmp::assert_approx_eq;
    use itertools::Itertools;

    fn integrate(options: SolverOptions, t_end: f64) -> Result<OdeSolution, OdeError> {
        let params = get_model_parameters("epi").unwrap();
        let mut integrator = Dopri5Integrator::new(options).unwrap();
        integrator.integrate(MvModel::new(&params), &get_initial_conditions(), t_end)
    }

    #[test]
    fn samples_span_interval() {
        let sol = integrate(SolverOptions::default(), 50.0).unwrap();

        assert_eq!(sol.t[0], 0.0);
        assert_eq!(sol.y[0], get_initial_conditions());
        assert_approx_eq!(f64, *sol.t.last().unwrap(), 50.0);
        assert_eq!(sol.t.len(), sol.y.len());
        assert!(sol.t.iter().tuple_windows().all(|(a, b)| a < b));
        assert!(sol.y.iter().all(StateVector::is_finite));
    }

    #[test]
    fn first_and_max_step_are_respected() {
        let opts = SolverOptions {
            first_step: 0.01,
            max_step: 0.5,
            ..SolverOptions::default()
        };
        let sol = integrate(opts, 20.0).unwrap();

        assert!(sol.t[1] <= 0.01 + 1e-12);
        assert!(sol
            .t
            .iter()
            .tuple_windows()
            .all(|(a, b)| b - a <= 0.5 + 1e-12));
        assert!(sol.len() >= 40);
    }

    #[test]
    fn stimulus_depolarizes() {
        let sol = integrate(SolverOptions::default(), 5.0).unwrap();
        let (_, last) = sol.last().unwrap();

        assert!(last.u > 0.3);
    }

    #[test]
    fn max_steps_exceeded() {
        let opts = SolverOptions {
            max_steps: 5,
            ..SolverOptions::default()
        };

        match integrate(opts, 100.0) {
            Err(OdeError::Stopped { t, state, .. }) => {
                assert!(t > 0.0 && t < 100.0);
                assert_ne!(state, get_initial_conditions());
            }
            other => panic!("expected Stopped, got {:?}", other),
        }
    }

    #[test]
    fn invalid_span() {
        let params = MvParams::default();
        let mut integrator = Dopri5Integrator::new(SolverOptions::default()).unwrap();
        let result =
            integrator.integrate(MvModel::new(&params), &get_initial_conditions(), 0.0);

        assert!(matches!(result, Err(OdeError::InvalidOptions(_))));
    }

    #[test]
    fn output_rows_are_kept_in_order() {
        let y0 = StateVector::new(0.0, 1.0, 1.0, 0.0);
        let rows = [
            State::new(0.0, 1.0, 1.0, 0.0),
            State::new(0.1, 0.9, 1.0, 0.0),
            State::new(0.2, 0.8, 1.0, 0.0),
        ];

        let sol = collect_samples(&y0, &[0.0, 0.5, 1.0], &rows);

        assert_eq!(sol.t, vec![0.0, 0.5, 1.0]);
        assert_eq!(sol.y[0], y0);
        assert_eq!(sol.y[2], StateVector::new(0.2, 0.8, 1.0, 0.0));
    }

    #[test]
    fn missing_seed_row_is_added() {
        let y0 = StateVector::new(0.0, 1.0, 1.0, 0.0);
        let rows = [State::new(0.1, 0.9, 1.0, 0.0)];

        let sol = collect_samples(&y0, &[0.5], &rows);

        assert_eq!(sol.t, vec![0.0, 0.5]);
        assert_eq!(sol.y[0], y0);
    }

    #[test]
    fn invalid_options() {
        let mut opts = SolverOptions::default();
        opts.first_step = 0.0;
        assert_eq!(
            opts.validate().unwrap_err().to_string(),
            "invalid solver options: first_step must be finite and strictly positive"
        );
        assert!(Dopri5Integrator::new(opts).is_err());

        let mut opts = SolverOptions::default();
        opts.max_step = 0.001;
        assert_eq!(
            opts.validate().unwrap_err().to_string(),
            "invalid solver options: max_step must not be less than first_step"
        );

        let mut opts = SolverOptions::default();
        opts.rtol = -1.0;
        assert!(opts.validate().is_err());

        let mut opts = SolverOptions::default();
        opts.max_steps = 0;
        assert!(opts.validate().is_err());
    }
}
