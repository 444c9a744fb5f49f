//! ODE simulator for the SEIHRD model.
//!
//! [`Simulator`] integrates [`SeihrdModel`] from a fixed day-0 state and
//! samples the solution on every day of a [`TimeGrid`]. It implements
//! [`SimulationEngine`], so calibration code can clone it once per
//! likelihood evaluation.

pub mod solver;

use log::debug;
use seihrd_core::{
    CoreError, InitialConditions, ParameterSet, Population, SeihrdModel, SimulationEngine,
    SimulationError, State, TimeGrid, Trajectory, STATE_SIZE,
};

pub use solver::{Integrator, OdeOptions, Workspace};

#[derive(Debug, Clone)]
pub struct Simulator {
    model: SeihrdModel,
    initial_state: State,
    integrator: Integrator,
    workspace: Workspace,
}

impl Simulator {
    /// Build a simulator whose day-0 state is derived from seeded
    /// compartments.
    pub fn new(
        population: Population,
        initial_conditions: &InitialConditions,
        integrator: Integrator,
    ) -> Result<Self, CoreError> {
        let initial_state = initial_conditions.to_state(&population)?;
        Ok(Self::from_state(population, initial_state, integrator))
    }

    /// Build a simulator from an explicit day-0 state.
    pub fn from_state(population: Population, initial_state: State, integrator: Integrator) -> Self {
        Self {
            model: SeihrdModel::new(population),
            initial_state,
            integrator,
            workspace: Workspace::new(STATE_SIZE),
        }
    }

    pub fn with_integrator(mut self, integrator: Integrator) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn model(&self) -> &SeihrdModel {
        &self.model
    }

    pub fn integrator(&self) -> &Integrator {
        &self.integrator
    }

    /// Integrate over `grid` with `params`.
    ///
    /// Each call starts from the stored initial state and resets the solver,
    /// so results depend only on the arguments.
    pub fn simulate(
        &mut self,
        params: &ParameterSet,
        grid: &TimeGrid,
    ) -> Result<Trajectory, SimulationError> {
        let model = self.model;
        let y0 = self.initial_state.to_flat();

        let rows = solver::solve_daily(
            &self.integrator,
            &y0,
            grid.num_days(),
            &mut self.workspace,
            |_t, y, dydt| model.rhs(params, y, dydt),
        )
        .inspect_err(|e| debug!("{} failed: {}", self.integrator, e))?;

        let states = rows
            .iter()
            .map(|row| State::from_flat(row))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SimulationError::InvalidSettings(e.to_string()))?;

        Trajectory::new(*grid, states).map_err(|e| SimulationError::InvalidSettings(e.to_string()))
    }
}

impl SimulationEngine for Simulator {
    fn population(&self) -> &Population {
        self.model.population()
    }

    fn initial_state(&self) -> &State {
        &self.initial_state
    }

    fn run(
        &mut self,
        parameters: &ParameterSet,
        grid: &TimeGrid,
    ) -> Result<Trajectory, SimulationError> {
        self.simulate(parameters, grid)
    }
}
