use crate::types::StateVector;

pub const AP_SCALE_MV: f64 = 85.7;
pub const AP_OFFSET_MV: f64 = -84.0;

/// Action potential in mV for the dimensionless membrane variable `u`.
pub fn u_to_action_potential(u: f64) -> f64 {
    u * AP_SCALE_MV + AP_OFFSET_MV
}

pub fn us_to_action_potential(us: &[f64]) -> Vec<f64> {
    us.iter().copied().map(u_to_action_potential).collect()
}

pub fn aps_from_states(states: &[StateVector]) -> Vec<f64> {
    states
        .iter()
        .map(|state| u_to_action_potential(state.u))
        .collect()
}
