//! Rate laws of the minimal ventricular model.

use ode_solvers::System;

use crate::error::{MvError, MvResult};
use crate::ode::State;
use crate::params::MvParams;
use crate::types::{CurrentVector, StateVector};

pub const STIMULUS_AMPLITUDE: f64 = 0.4;
pub const STIMULUS_DURATION: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    Derivatives,
    Currents,
}

/// Unit step with `heaviside(0) == 0`: a gate sitting exactly on its
/// threshold is closed.
pub fn heaviside(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else {
        0.0
    }
}

pub fn stimulus(t: f64) -> f64 {
    if t < STIMULUS_DURATION {
        STIMULUS_AMPLITUDE
    } else {
        0.0
    }
}

/// Evaluates the model at `(t, state)`. Returns `(du, dv, dw, ds)` in
/// derivative mode and `(J_fi, J_so, J_si, J_stim)` in current mode.
pub fn evaluate(t: f64, state: &StateVector, params: &MvParams, mode: EvalMode) -> [f64; 4] {
    let StateVector { u, v, w, s } = *state;
    let p = params;

    let h_v_minus = heaviside(u - p.th_v_minus);
    let h_v = heaviside(u - p.th_v);
    let h_w = heaviside(u - p.th_w);
    let h_o = heaviside(u - p.th_o);

    let tau_v_minus = (1.0 - h_v_minus) * p.tau_v1 + h_v_minus * p.tau_v2;
    let tau_w_minus =
        p.tau_w1 + (p.tau_w2 - p.tau_w1) * (1.0 + (p.kappa_w * (u - p.u_w)).tanh()) / 2.0;
    let tau_so =
        p.tau_so1 + (p.tau_so2 - p.tau_so1) * (1.0 + (p.kappa_so * (u - p.u_so)).tanh()) / 2.0;
    let tau_s = (1.0 - h_w) * p.tau_s1 + h_w * p.tau_s2;
    let tau_o = (1.0 - h_o) * p.tau_o1 + h_o * p.tau_o2;

    let v_inf = if u < p.th_v_minus { 1.0 } else { 0.0 };
    let w_inf = (1.0 - h_o) * (1.0 - u / p.tau_w_inf) + h_o * p.w_inf_star;

    let j_fi = -v * h_v * (u - p.th_v) * (p.u_u - u) / p.tau_fi;
    let j_so = (u - p.u_o) * (1.0 - h_w) / tau_o + h_w / tau_so;
    let j_si = -h_w * w * s / p.tau_si;
    let j_stim = stimulus(t);

    match mode {
        EvalMode::Currents => [j_fi, j_so, j_si, j_stim],
        EvalMode::Derivatives => {
            let du = -(j_fi + j_so + j_si) + j_stim;
            let dv = (1.0 - h_v) * (v_inf - v) / tau_v_minus - h_v * v / p.tau_v;
            let dw = (1.0 - h_w) * (w_inf - w) / tau_w_minus - h_w * w / p.tau_w;
            let ds = ((1.0 + (p.kappa_s * (u - p.u_s)).tanh()) / 2.0 - s) / tau_s;
            [du, dv, dw, ds]
        }
    }
}

pub fn derivatives(t: f64, state: &StateVector, params: &MvParams) -> StateVector {
    StateVector::from_array(evaluate(t, state, params, EvalMode::Derivatives))
}

pub fn currents(t: f64, state: &StateVector, params: &MvParams) -> CurrentVector {
    CurrentVector::from_array(evaluate(t, state, params, EvalMode::Currents))
}

/// Elementwise [`evaluate`] over paired times and states.
pub fn evaluate_many(
    times: &[f64],
    states: &[StateVector],
    params: &MvParams,
    mode: EvalMode,
) -> MvResult<Vec<[f64; 4]>> {
    if times.len() != states.len() {
        return Err(MvError::InvalidArgument(format!(
            "got {} times but {} states",
            times.len(),
            states.len()
        )));
    }

    Ok(times
        .iter()
        .zip(states)
        .map(|(&t, state)| evaluate(t, state, params, mode))
        .collect())
}

pub fn currents_many(
    times: &[f64],
    states: &[StateVector],
    params: &MvParams,
) -> MvResult<Vec<CurrentVector>> {
    Ok(evaluate_many(times, states, params, EvalMode::Currents)?
        .into_iter()
        .map(CurrentVector::from_array)
        .collect())
}

/// Binds a parameter set to the derivative mode for use by an ODE solver.
#[derive(Debug, Clone, Copy)]
pub struct MvModel<'a> {
    params: &'a MvParams,
}

impl<'a> MvModel<'a> {
    pub fn new(params: &'a MvParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &MvParams {
        self.params
    }
}

impl System<f64, State> for MvModel<'_> {
    fn system(&self, t: f64, y: &State, dy: &mut State) {
        let state = StateVector::new(y[0], y[1], y[2], y[3]);
        *dy = State::from(evaluate(t, &state, self.params, EvalMode::Derivatives));
    }
}
