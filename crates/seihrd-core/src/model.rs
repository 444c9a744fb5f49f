//! Right-hand side of the SEIHRD ODE system.
//!
//! Per age band `i`:
//!
//! ```text
//! dS/dt = -beta * S * (I + alpha * E) / N
//! dE/dt =  beta * S * (I + alpha * E) / N - sigma * E
//! dI/dt =  sigma * E - gamma * I - delta * I
//! dH/dt =  delta * I - rho * H
//! dR/dt =  gamma * I + rho * H
//! dD/dt =  rho * H
//! ```
//!
//! Bands share no compartments. Leaving hospital credits both R and D with
//! the full `rho * H`, so `S + E + I + R + H` stays at `N` while the
//! six-compartment total grows by `D`.

use serde::{Deserialize, Serialize};

use crate::types::age_band::NUM_BANDS;
use crate::types::parameters::ParameterSet;
use crate::types::population::Population;
use crate::types::state::{Compartment, State, STATE_SIZE};

const S: usize = Compartment::Susceptible.index() * NUM_BANDS;
const E: usize = Compartment::Exposed.index() * NUM_BANDS;
const I: usize = Compartment::Infectious.index() * NUM_BANDS;
const R: usize = Compartment::Recovered.index() * NUM_BANDS;
const H: usize = Compartment::Hospitalised.index() * NUM_BANDS;
const D: usize = Compartment::Deceased.index() * NUM_BANDS;

/// The compartmental model for a fixed population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeihrdModel {
    population: Population,
}

impl SeihrdModel {
    pub fn new(population: Population) -> Self {
        Self { population }
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Derivative of every compartment at `state`.
    pub fn derivative(&self, state: &State, params: &ParameterSet) -> State {
        let y = state.to_flat();
        let mut dydt = [0.0; STATE_SIZE];
        self.rhs(params, &y, &mut dydt);
        State::from(dydt)
    }

    /// Flat form of [`derivative`](Self::derivative) for the integrators.
    ///
    /// No clamping: out-of-domain parameters or states produce whatever the
    /// arithmetic yields.
    pub fn rhs(&self, params: &ParameterSet, y: &[f64], dydt: &mut [f64]) {
        debug_assert_eq!(y.len(), STATE_SIZE);
        debug_assert_eq!(dydt.len(), STATE_SIZE);

        let n = self.population.totals();
        for b in 0..NUM_BANDS {
            let (s, e, i, h) = (y[S + b], y[E + b], y[I + b], y[H + b]);

            let infection = params.beta[b] * s * (i + params.alpha[b] * e) / n[b];
            let incubation = params.sigma[b] * e;
            let recovery = params.gamma[b] * i;
            let admission = params.delta[b] * i;
            let discharge = params.rho[b] * h;

            dydt[S + b] = -infection;
            dydt[E + b] = infection - incubation;
            dydt[I + b] = incubation - recovery - admission;
            dydt[H + b] = admission - discharge;
            dydt[R + b] = recovery + discharge;
            dydt[D + b] = discharge;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::age_band::AgeBand;
    use approx::assert_relative_eq;

    fn toy_model() -> SeihrdModel {
        SeihrdModel::new(Population::new([1000.0, 2000.0, 500.0]).unwrap())
    }

    fn toy_state() -> State {
        State {
            susceptible: [900.0, 1800.0, 400.0],
            exposed: [40.0, 100.0, 30.0],
            infectious: [30.0, 60.0, 40.0],
            recovered: [20.0, 30.0, 20.0],
            hospitalised: [10.0, 10.0, 10.0],
            deceased: [0.0, 0.0, 0.0],
        }
    }

    #[test]
    fn test_derivative_matches_equations() {
        let model = toy_model();
        let params = ParameterSet::prior();
        let state = toy_state();
        let d = model.derivative(&state, &params);

        let b = AgeBand::Adult.index();
        let infection = params.beta[b]
            * state.susceptible[b]
            * (state.infectious[b] + params.alpha[b] * state.exposed[b])
            / 2000.0;
        assert_relative_eq!(d.susceptible[b], -infection);
        assert_relative_eq!(
            d.exposed[b],
            infection - params.sigma[b] * state.exposed[b]
        );
        assert_relative_eq!(
            d.infectious[b],
            params.sigma[b] * state.exposed[b]
                - (params.gamma[b] + params.delta[b]) * state.infectious[b]
        );
        assert_relative_eq!(
            d.hospitalised[b],
            params.delta[b] * state.infectious[b] - params.rho[b] * state.hospitalised[b]
        );
        assert_relative_eq!(d.deceased[b], params.rho[b] * state.hospitalised[b]);
    }

    #[test]
    fn test_hospital_exit_is_credited_twice() {
        let model = toy_model();
        let d = model.derivative(&toy_state(), &ParameterSet::prior());

        for band in AgeBand::ALL {
            let living = d.get(Compartment::Susceptible, band)
                + d.get(Compartment::Exposed, band)
                + d.get(Compartment::Infectious, band)
                + d.get(Compartment::Recovered, band)
                + d.get(Compartment::Hospitalised, band);
            assert_relative_eq!(living, 0.0, epsilon = 1e-12);
            assert_relative_eq!(
                d.band_total(band),
                d.get(Compartment::Deceased, band),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_bands_are_independent() {
        let model = toy_model();
        let params = ParameterSet::prior();
        let base = model.derivative(&toy_state(), &params);

        let mut perturbed = toy_state();
        perturbed.infectious[AgeBand::Elderly.index()] *= 3.0;
        let d = model.derivative(&perturbed, &params);

        assert_eq!(d.susceptible[0], base.susceptible[0]);
        assert_eq!(d.exposed[1], base.exposed[1]);
        assert_ne!(d.susceptible[2], base.susceptible[2]);
    }

    #[test]
    fn test_no_clamping_for_negative_rates() {
        let model = toy_model();
        let params = ParameterSet::uniform(0.0, 0.0, 0.0, 0.0, 0.0, -0.5);
        let d = model.derivative(&toy_state(), &params);
        assert_eq!(d.deceased[0], -5.0);
        assert_eq!(d.hospitalised[0], 5.0);
    }
}
