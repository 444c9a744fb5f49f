//! Final simulation split into per-compartment series for presentation.

use chrono::NaiveDate;
use seihrd_core::{
    AgeBand, Compartment, ParameterSet, SimulationEngine, SimulationError, TimeGrid, Trajectory,
};
use serde::{Deserialize, Serialize};

/// One compartment of one band over the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompartmentSeries {
    pub compartment: Compartment,
    pub band: AgeBand,
    pub values: Vec<f64>,
}

/// Every compartment/band series of a trajectory with the grid's dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSeries {
    pub dates: Vec<NaiveDate>,
    pub series: Vec<CompartmentSeries>,
}

impl ExtractedSeries {
    pub fn from_trajectory(trajectory: &Trajectory) -> Self {
        let series = Compartment::ALL
            .iter()
            .flat_map(|&compartment| {
                AgeBand::ALL.iter().map(move |&band| CompartmentSeries {
                    compartment,
                    band,
                    values: trajectory.series(compartment, band),
                })
            })
            .collect();

        Self {
            dates: trajectory.grid().dates(),
            series,
        }
    }

    pub fn get(&self, compartment: Compartment, band: AgeBand) -> Option<&CompartmentSeries> {
        self.series
            .iter()
            .find(|s| s.compartment == compartment && s.band == band)
    }
}

/// Re-runs the simulation once with fitted parameters.
#[derive(Debug, Clone)]
pub struct ResultExtractor<E: SimulationEngine> {
    engine: E,
    grid: TimeGrid,
}

impl<E: SimulationEngine> ResultExtractor<E> {
    pub fn new(engine: E, grid: TimeGrid) -> Self {
        Self { engine, grid }
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn simulate(&self, params: &ParameterSet) -> Result<Trajectory, SimulationError> {
        self.engine.clone().run(params, &self.grid)
    }

    pub fn extract(&self, params: &ParameterSet) -> Result<ExtractedSeries, SimulationError> {
        Ok(ExtractedSeries::from_trajectory(&self.simulate(params)?))
    }
}
