use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::age_band::{AgeBand, BandValues};
use crate::types::state::State;

/// Constant total population of each age band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BandValues", into = "BandValues")]
pub struct Population {
    totals: BandValues,
}

impl Population {
    pub fn new(totals: BandValues) -> Result<Self, CoreError> {
        for band in AgeBand::ALL {
            let value = totals[band.index()];
            if !value.is_finite() || value <= 0.0 {
                return Err(CoreError::InvalidPopulation { band, value });
            }
        }
        Ok(Self { totals })
    }

    /// England 2020 census totals for 0-17, 18-64 and 65+.
    pub fn england_2020() -> Self {
        Self {
            totals: [12_798_907.0, 32_215_341.0, 10_147_838.0],
        }
    }

    pub fn total(&self, band: AgeBand) -> f64 {
        self.totals[band.index()]
    }

    pub fn totals(&self) -> &BandValues {
        &self.totals
    }
}

impl Default for Population {
    fn default() -> Self {
        Self::england_2020()
    }
}

impl TryFrom<BandValues> for Population {
    type Error = CoreError;

    fn try_from(totals: BandValues) -> Result<Self, Self::Error> {
        Self::new(totals)
    }
}

impl From<Population> for BandValues {
    fn from(population: Population) -> Self {
        population.totals
    }
}

/// Seeded compartments at day 0; the susceptibles are whatever is left of
/// each band's population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialConditions {
    pub exposed: BandValues,
    pub infectious: BandValues,
    pub recovered: BandValues,
    pub hospitalised: BandValues,
    pub deceased: BandValues,
}

impl Default for InitialConditions {
    fn default() -> Self {
        Self {
            exposed: [1000.0, 500.0, 200.0],
            infectious: [500.0, 2000.0, 1000.0],
            recovered: [0.0; 3],
            hospitalised: [0.0; 3],
            deceased: [0.0; 3],
        }
    }
}

impl InitialConditions {
    /// Build the day-0 state, with `S = N - E - I - R - H`.
    ///
    /// Deaths at day 0 are carried as given and are not subtracted from the
    /// susceptibles.
    pub fn to_state(&self, population: &Population) -> Result<State, CoreError> {
        let seeds = [
            ("E", &self.exposed),
            ("I", &self.infectious),
            ("R", &self.recovered),
            ("H", &self.hospitalised),
            ("D", &self.deceased),
        ];

        let mut state = State {
            exposed: self.exposed,
            infectious: self.infectious,
            recovered: self.recovered,
            hospitalised: self.hospitalised,
            deceased: self.deceased,
            ..State::default()
        };

        for band in AgeBand::ALL {
            let i = band.index();
            for &(compartment, values) in &seeds {
                let value = values[i];
                if !value.is_finite() || value < 0.0 {
                    return Err(CoreError::NegativeSeed {
                        band,
                        compartment,
                        value,
                    });
                }
            }

            let seeded =
                self.exposed[i] + self.infectious[i] + self.recovered[i] + self.hospitalised[i];
            let n = population.total(band);
            if seeded > n {
                return Err(CoreError::SeedsExceedPopulation {
                    band,
                    seeded,
                    population: n,
                });
            }
            state.susceptible[i] = n - seeded;
        }

        Ok(state)
    }
}
