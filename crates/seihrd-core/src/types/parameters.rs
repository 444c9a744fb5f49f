use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::age_band::{AgeBand, BandValues, NUM_BANDS};

/// Number of scalars in a flattened [`ParameterSet`].
pub const NUM_PARAMETERS: usize = RateKind::ALL.len() * NUM_BANDS;

/// The six per-band rate families of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateKind {
    /// Transmission
    Beta,
    /// Incubation (E -> I)
    Sigma,
    /// Recovery (I -> R)
    Gamma,
    /// Relative infectiousness of the exposed
    Alpha,
    /// Hospitalisation (I -> H)
    Delta,
    /// Hospital exit
    Rho,
}

impl RateKind {
    /// Rate families in flat-vector slot order.
    pub const ALL: [RateKind; 6] = [
        RateKind::Beta,
        RateKind::Sigma,
        RateKind::Gamma,
        RateKind::Alpha,
        RateKind::Delta,
        RateKind::Rho,
    ];

    pub const fn index(self) -> usize {
        match self {
            RateKind::Beta => 0,
            RateKind::Sigma => 1,
            RateKind::Gamma => 2,
            RateKind::Alpha => 3,
            RateKind::Delta => 4,
            RateKind::Rho => 5,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            RateKind::Beta => "beta",
            RateKind::Sigma => "sigma",
            RateKind::Gamma => "gamma",
            RateKind::Alpha => "alpha",
            RateKind::Delta => "delta",
            RateKind::Rho => "rho",
        }
    }

    /// Slot of `(self, band)` in the flat optimizer vector.
    pub const fn slot(self, band: AgeBand) -> usize {
        self.index() * NUM_BANDS + band.index()
    }
}

/// Per-band rate constants (per day) governing every transition.
///
/// This is the only representation used outside the optimizer; the flat
/// vector exists solely at the argmin boundary (see [`ParameterSet::to_vec`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub beta: BandValues,
    pub sigma: BandValues,
    pub gamma: BandValues,
    pub alpha: BandValues,
    pub delta: BandValues,
    pub rho: BandValues,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::prior()
    }
}

impl ParameterSet {
    /// Initial guess used for the England 2020 fit.
    pub fn prior() -> Self {
        Self {
            beta: [0.02, 0.04, 0.06],
            sigma: [1.0 / 10.0, 1.0 / 10.0, 1.0 / 10.0],
            gamma: [1.0 / 100.0, 1.0 / 100.0, 1.0 / 100.0],
            alpha: [1.0 / 100.0, 1.0 / 80.0, 1.0 / 60.0],
            delta: [1.0 / 300.0, 1.0 / 80.0, 1.0 / 50.0],
            rho: [1.0 / 1000.0, 1.0 / 400.0, 1.0 / 100.0],
        }
    }

    /// Same rates for every band.
    pub fn uniform(beta: f64, sigma: f64, gamma: f64, alpha: f64, delta: f64, rho: f64) -> Self {
        Self {
            beta: [beta; NUM_BANDS],
            sigma: [sigma; NUM_BANDS],
            gamma: [gamma; NUM_BANDS],
            alpha: [alpha; NUM_BANDS],
            delta: [delta; NUM_BANDS],
            rho: [rho; NUM_BANDS],
        }
    }

    pub fn rates(&self, kind: RateKind) -> &BandValues {
        match kind {
            RateKind::Beta => &self.beta,
            RateKind::Sigma => &self.sigma,
            RateKind::Gamma => &self.gamma,
            RateKind::Alpha => &self.alpha,
            RateKind::Delta => &self.delta,
            RateKind::Rho => &self.rho,
        }
    }

    pub fn rates_mut(&mut self, kind: RateKind) -> &mut BandValues {
        match kind {
            RateKind::Beta => &mut self.beta,
            RateKind::Sigma => &mut self.sigma,
            RateKind::Gamma => &mut self.gamma,
            RateKind::Alpha => &mut self.alpha,
            RateKind::Delta => &mut self.delta,
            RateKind::Rho => &mut self.rho,
        }
    }

    pub fn get(&self, kind: RateKind, band: AgeBand) -> f64 {
        self.rates(kind)[band.index()]
    }

    pub fn set(&mut self, kind: RateKind, band: AgeBand, value: f64) {
        self.rates_mut(kind)[band.index()] = value;
    }

    /// Flatten in slot order `beta, sigma, gamma, alpha, delta, rho`,
    /// each as `[young, adult, elderly]`.
    pub fn to_vec(&self) -> Vec<f64> {
        RateKind::ALL
            .iter()
            .flat_map(|&kind| self.rates(kind).iter().copied())
            .collect()
    }

    pub fn from_slice(values: &[f64]) -> Result<Self, CoreError> {
        if values.len() != NUM_PARAMETERS {
            return Err(CoreError::LengthMismatch {
                expected: NUM_PARAMETERS,
                actual: values.len(),
            });
        }
        let mut params = Self::uniform(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        for kind in RateKind::ALL {
            let offset = kind.index() * NUM_BANDS;
            params
                .rates_mut(kind)
                .copy_from_slice(&values[offset..offset + NUM_BANDS]);
        }
        Ok(params)
    }

    /// Slot names in flat order, e.g. `beta_young`, ..., `rho_elderly`.
    pub fn slot_names() -> Vec<String> {
        RateKind::ALL
            .iter()
            .flat_map(|kind| {
                AgeBand::ALL
                    .iter()
                    .map(move |band| format!("{}_{}", kind.name(), band.name()))
            })
            .collect()
    }

    /// True when every rate is finite and non-negative.
    pub fn is_non_negative(&self) -> bool {
        self.to_vec().iter().all(|v| v.is_finite() && *v >= 0.0)
    }
}
