use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::age_band::{AgeBand, BandValues, NUM_BANDS};

/// Number of scalars in a flattened [`State`].
pub const STATE_SIZE: usize = Compartment::ALL.len() * NUM_BANDS;

/// A disease compartment within an age band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Compartment {
    #[serde(rename = "S")]
    Susceptible,
    #[serde(rename = "E")]
    Exposed,
    #[serde(rename = "I")]
    Infectious,
    #[serde(rename = "R")]
    Recovered,
    #[serde(rename = "H")]
    Hospitalised,
    #[serde(rename = "D")]
    Deceased,
}

impl Compartment {
    /// Compartments in flat-vector order.
    pub const ALL: [Compartment; 6] = [
        Compartment::Susceptible,
        Compartment::Exposed,
        Compartment::Infectious,
        Compartment::Recovered,
        Compartment::Hospitalised,
        Compartment::Deceased,
    ];

    pub const fn index(self) -> usize {
        match self {
            Compartment::Susceptible => 0,
            Compartment::Exposed => 1,
            Compartment::Infectious => 2,
            Compartment::Recovered => 3,
            Compartment::Hospitalised => 4,
            Compartment::Deceased => 5,
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Compartment::Susceptible => "S",
            Compartment::Exposed => "E",
            Compartment::Infectious => "I",
            Compartment::Recovered => "R",
            Compartment::Hospitalised => "H",
            Compartment::Deceased => "D",
        }
    }

    /// Position of `(self, band)` in the flat state vector.
    ///
    /// Layout is compartment-major: `[S0, S1, S2, E0, ..., D2]`.
    pub const fn flat_index(self, band: AgeBand) -> usize {
        self.index() * NUM_BANDS + band.index()
    }
}

impl std::fmt::Display for Compartment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Compartment sizes for every age band at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct State {
    pub susceptible: BandValues,
    pub exposed: BandValues,
    pub infectious: BandValues,
    pub recovered: BandValues,
    pub hospitalised: BandValues,
    pub deceased: BandValues,
}

impl State {
    pub fn compartment(&self, compartment: Compartment) -> &BandValues {
        match compartment {
            Compartment::Susceptible => &self.susceptible,
            Compartment::Exposed => &self.exposed,
            Compartment::Infectious => &self.infectious,
            Compartment::Recovered => &self.recovered,
            Compartment::Hospitalised => &self.hospitalised,
            Compartment::Deceased => &self.deceased,
        }
    }

    pub fn compartment_mut(&mut self, compartment: Compartment) -> &mut BandValues {
        match compartment {
            Compartment::Susceptible => &mut self.susceptible,
            Compartment::Exposed => &mut self.exposed,
            Compartment::Infectious => &mut self.infectious,
            Compartment::Recovered => &mut self.recovered,
            Compartment::Hospitalised => &mut self.hospitalised,
            Compartment::Deceased => &mut self.deceased,
        }
    }

    pub fn get(&self, compartment: Compartment, band: AgeBand) -> f64 {
        self.compartment(compartment)[band.index()]
    }

    pub fn set(&mut self, compartment: Compartment, band: AgeBand, value: f64) {
        self.compartment_mut(compartment)[band.index()] = value;
    }

    /// Sum of all six compartments of one band.
    pub fn band_total(&self, band: AgeBand) -> f64 {
        Compartment::ALL
            .iter()
            .map(|&c| self.get(c, band))
            .sum()
    }

    /// Flatten into the compartment-major vector used by the integrators.
    pub fn to_flat(&self) -> [f64; STATE_SIZE] {
        let mut flat = [0.0; STATE_SIZE];
        self.write_flat(&mut flat);
        flat
    }

    /// Write into an existing buffer of length [`STATE_SIZE`].
    pub fn write_flat(&self, out: &mut [f64]) {
        for compartment in Compartment::ALL {
            let offset = compartment.index() * NUM_BANDS;
            out[offset..offset + NUM_BANDS].copy_from_slice(self.compartment(compartment));
        }
    }

    pub fn from_flat(flat: &[f64]) -> Result<Self, CoreError> {
        if flat.len() != STATE_SIZE {
            return Err(CoreError::LengthMismatch {
                expected: STATE_SIZE,
                actual: flat.len(),
            });
        }
        Ok(Self::read_flat(flat))
    }

    fn read_flat(flat: &[f64]) -> Self {
        let mut state = State::default();
        for compartment in Compartment::ALL {
            let offset = compartment.index() * NUM_BANDS;
            state
                .compartment_mut(compartment)
                .copy_from_slice(&flat[offset..offset + NUM_BANDS]);
        }
        state
    }

    /// True when every compartment is finite and non-negative.
    pub fn is_physical(&self) -> bool {
        Compartment::ALL
            .iter()
            .flat_map(|&c| self.compartment(c).iter())
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

impl From<[f64; STATE_SIZE]> for State {
    fn from(flat: [f64; STATE_SIZE]) -> Self {
        Self::read_flat(&flat)
    }
}
