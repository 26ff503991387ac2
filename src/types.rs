use serde::{Deserialize, Serialize};

/// Model state `(u, v, w, s)`: the dimensionless membrane variable and the
/// three gating variables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    pub u: f64,
    pub v: f64,
    pub w: f64,
    pub s: f64,
}

/// Instantaneous currents `(J_fi, J_so, J_si, J_stim)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentVector {
    pub j_fi: f64,
    pub j_so: f64,
    pub j_si: f64,
    pub j_stim: f64,
}

pub const NUM_STATE_VARS: usize = 4;

impl StateVector {
    pub const fn new(u: f64, v: f64, w: f64, s: f64) -> Self {
        Self { u, v, w, s }
    }

    pub fn from_array(values: [f64; NUM_STATE_VARS]) -> Self {
        let [u, v, w, s] = values;
        Self { u, v, w, s }
    }

    pub fn to_array(self) -> [f64; NUM_STATE_VARS] {
        [self.u, self.v, self.w, self.s]
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|x| x.is_finite())
    }
}

impl CurrentVector {
    pub fn from_array(values: [f64; NUM_STATE_VARS]) -> Self {
        let [j_fi, j_so, j_si, j_stim] = values;
        Self {
            j_fi,
            j_so,
            j_si,
            j_stim,
        }
    }

    pub fn to_array(self) -> [f64; NUM_STATE_VARS] {
        [self.j_fi, self.j_so, self.j_si, self.j_stim]
    }
}
