use thiserror::Error;

use crate::types::StateVector;

pub type MvResult<T> = Result<T, MvError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MvError {
    #[error("cell type ({0}) not recognised")]
    InvalidPhenotype(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("integration failed in cycle {cycle} at t={t}: {reason} (state: {state:?})")]
    IntegrationFailure {
        cycle: usize,
        t: f64,
        state: StateVector,
        reason: String,
    },

    #[error("run cancelled after cycle {cycle}")]
    Cancelled { cycle: usize },

    #[error("simulation worker thread panicked")]
    WorkerPanicked,
}
