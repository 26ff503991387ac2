use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MvError, MvResult};
use crate::ode::SolverOptions;
use crate::types::StateVector;

/// Constants of the minimal ventricular model for one cell type. Defaults to
/// the epicardial table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MvParams {
    pub u_o: f64,
    pub u_u: f64,
    pub th_v: f64,
    pub th_w: f64,
    pub th_v_minus: f64,
    pub th_o: f64,
    pub tau_v1: f64,
    pub tau_v2: f64,
    pub tau_v: f64,
    pub tau_w1: f64,
    pub tau_w2: f64,
    pub kappa_w: f64,
    pub u_w: f64,
    pub tau_w: f64,
    pub tau_fi: f64,
    pub tau_o1: f64,
    pub tau_o2: f64,
    pub tau_so1: f64,
    pub tau_so2: f64,
    pub kappa_so: f64,
    pub u_so: f64,
    pub tau_s1: f64,
    pub tau_s2: f64,
    pub kappa_s: f64,
    pub u_s: f64,
    pub tau_si: f64,
    pub tau_w_inf: f64,
    pub w_inf_star: f64,
}

pub const EPI_PARAMS: MvParams = MvParams {
    u_o: 0.0,
    u_u: 1.55,
    th_v: 0.3,
    th_w: 0.13,
    th_v_minus: 0.006,
    th_o: 0.006,
    tau_v1: 60.0,
    tau_v2: 1150.0,
    tau_v: 1.4506,
    tau_w1: 60.0,
    tau_w2: 15.0,
    kappa_w: 65.0,
    u_w: 0.03,
    tau_w: 200.0,
    tau_fi: 0.11,
    tau_o1: 400.0,
    tau_o2: 6.0,
    tau_so1: 30.0181,
    tau_so2: 0.9957,
    kappa_so: 2.0458,
    u_so: 0.65,
    tau_s1: 2.7342,
    tau_s2: 16.0,
    kappa_s: 2.0994,
    u_s: 0.9087,
    tau_si: 1.8875,
    tau_w_inf: 0.07,
    w_inf_star: 0.94,
};

pub const ENDO_PARAMS: MvParams = MvParams {
    u_o: 0.0,
    u_u: 1.56,
    th_v: 0.3,
    th_w: 0.13,
    th_v_minus: 0.2,
    th_o: 0.006,
    tau_v1: 75.0,
    tau_v2: 10.0,
    tau_v: 1.4506,
    tau_w1: 6.0,
    tau_w2: 140.0,
    kappa_w: 200.0,
    u_w: 0.016,
    tau_w: 280.0,
    tau_fi: 0.1,
    tau_o1: 470.0,
    tau_o2: 6.0,
    tau_so1: 40.0,
    tau_so2: 1.2,
    kappa_so: 2.0,
    u_so: 0.65,
    tau_s1: 2.7342,
    tau_s2: 2.0,
    kappa_s: 2.0994,
    u_s: 0.9087,
    tau_si: 2.9013,
    tau_w_inf: 0.0273,
    w_inf_star: 0.78,
};

pub const MID_PARAMS: MvParams = MvParams {
    u_o: 0.0,
    u_u: 1.61,
    th_v: 0.3,
    th_w: 0.13,
    th_v_minus: 0.1,
    th_o: 0.005,
    tau_v1: 80.0,
    tau_v2: 1.4506,
    tau_v: 1.4506,
    tau_w1: 70.0,
    tau_w2: 8.0,
    kappa_w: 200.0,
    u_w: 0.016,
    tau_w: 280.0,
    tau_fi: 0.078,
    tau_o1: 410.0,
    tau_o2: 7.0,
    tau_so1: 91.0,
    tau_so2: 0.8,
    kappa_so: 2.1,
    u_so: 0.6,
    tau_s1: 2.7342,
    tau_s2: 4.0,
    kappa_s: 2.0994,
    u_s: 0.9087,
    tau_si: 3.3849,
    tau_w_inf: 0.01,
    w_inf_star: 0.5,
};

impl Default for MvParams {
    fn default() -> Self {
        EPI_PARAMS
    }
}

impl MvParams {
    pub fn for_cell_type(cell_type: CellType) -> Self {
        match cell_type {
            CellType::Epi => EPI_PARAMS,
            CellType::Endo => ENDO_PARAMS,
            CellType::Mid => MID_PARAMS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    #[serde(rename = "epi")]
    Epi,
    #[serde(rename = "endo")]
    Endo,
    #[serde(rename = "m")]
    Mid,
}

impl CellType {
    pub fn tag(&self) -> &'static str {
        match self {
            CellType::Epi => "epi",
            CellType::Endo => "endo",
            CellType::Mid => "m",
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for CellType {
    type Err = MvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "epi" => Ok(CellType::Epi),
            "endo" => Ok(CellType::Endo),
            "m" => Ok(CellType::Mid),
            other => Err(MvError::InvalidPhenotype(other.to_string())),
        }
    }
}

pub fn get_model_parameters(cell_type: &str) -> MvResult<MvParams> {
    Ok(MvParams::for_cell_type(cell_type.parse()?))
}

pub fn get_initial_conditions() -> StateVector {
    StateVector::new(0.0, 1.0, 1.0, 0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub cell_type: CellType,
    pub num_cycles: usize,
    pub cycle_length: f64,
    #[serde(default)]
    pub solver: SolverOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalParams {
    pub num_threads: Option<usize>,
    pub pin_threads: bool,
}

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct BatchParams {
    pub simulations: Vec<SimulationParams>,
    #[serde(default)]
    pub technical_params: TechnicalParams,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            cell_type: CellType::Epi,
            num_cycles: 1,
            cycle_length: 1000.0,
            solver: SolverOptions::default(),
        }
    }
}

impl Default for TechnicalParams {
    fn default() -> Self {
        Self {
            num_threads: Some(1),
            pin_threads: false,
        }
    }
}

pub fn validate_run_args(num_cycles: usize, cycle_length: f64) -> MvResult<()> {
    if num_cycles == 0 {
        return Err(MvError::InvalidArgument(
            "num_cycles must be strictly positive".to_string(),
        ));
    }

    if !cycle_length.is_finite() || cycle_length <= 0.0 {
        return Err(MvError::InvalidArgument(
            "cycle_length must be finite and strictly positive".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_simulation_params(simulation_params: &SimulationParams) -> MvResult<()> {
    validate_run_args(simulation_params.num_cycles, simulation_params.cycle_length)?;

    simulation_params
        .solver
        .validate()
        .map_err(|err| MvError::InvalidArgument(err.to_string()))
}

pub fn validate_batch_params(batch_params: &BatchParams) -> MvResult<()> {
    for simulation_params in &batch_params.simulations {
        validate_simulation_params(simulation_params)?;
    }

    validate_technical_params(&batch_params.technical_params)
}

fn validate_technical_params(technical_params: &TechnicalParams) -> MvResult<()> {
    if let Some(num_threads) = technical_params.num_threads {
        if num_threads == 0 {
            return Err(MvError::InvalidArgument(
                "num_threads must be strictly positive".to_string(),
            ));
        }

        if num_cpus::get() < num_threads {
            return Err(MvError::InvalidArgument(
                "num_threads must not be greater than number of available CPUs".to_string(),
            ));
        }
    }

    Ok(())
}
