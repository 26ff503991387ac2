pub mod batch;
pub mod cycle;
pub mod error;
pub mod model;
pub mod ode;
pub mod params;
pub mod types;
pub mod util;

pub use cycle::{run_model, run_model_with, Trajectory};
pub use error::{MvError, MvResult};
pub use params::{get_initial_conditions, get_model_parameters, CellType, MvParams};
pub use types::{CurrentVector, StateVector};
pub use util::u_to_action_potential;
