//! Core data structures for the age-stratified SEIHRD model.
//!
//! This crate defines the typed state and parameter vectors, the ODE
//! right-hand side, and the [`SimulationEngine`] seam that calibration code
//! drives without knowing which integrator sits behind it.

pub mod error;
pub mod model;
pub mod types;

pub use error::{CoreError, SimulationError};
pub use model::SeihrdModel;
pub use types::age_band::{AgeBand, BandValues, NUM_BANDS};
pub use types::parameters::{ParameterSet, RateKind, NUM_PARAMETERS};
pub use types::population::{InitialConditions, Population};
pub use types::state::{Compartment, State, STATE_SIZE};
pub use types::time::{TimeGrid, Trajectory};

/// A simulator that can be cloned per evaluation and run from its fixed
/// initial state with any parameter set.
///
/// Implementations own their integration scratch space, so two clones never
/// share mutable state and may be evaluated independently.
pub trait SimulationEngine: Clone {
    /// Per-band population totals the model divides by.
    fn population(&self) -> &Population;

    /// State at simulation day 0.
    fn initial_state(&self) -> &State;

    /// Integrate from the initial state and sample every day of `grid`.
    fn run(
        &mut self,
        parameters: &ParameterSet,
        grid: &TimeGrid,
    ) -> Result<Trajectory, SimulationError>;
}
