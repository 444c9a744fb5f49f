use seihrd_core::{CoreError, SimulationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibrationError {
    /// The argmin solver rejected its configuration or failed while running.
    #[error("optimization failed: {0}")]
    Solver(String),

    #[error("invalid parameter bounds: {0}")]
    InvalidBounds(String),

    #[error("observed series contain no data")]
    NoObservations,

    #[error(transparent)]
    Core(#[from] CoreError),

    /// The best parameters could not be re-simulated.
    #[error("final simulation failed: {0}")]
    Simulation(#[from] SimulationError),
}
