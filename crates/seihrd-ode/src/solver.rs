//! Explicit Runge–Kutta integrators sampling a solution once per day.
//!
//! - [`Integrator::DormandPrince`]: Dormand–Prince 5(4) pair with error
//!   control, steps clipped so every day boundary is hit exactly.
//! - [`Integrator::Rk4`]: classical fixed-step RK4, a whole number of steps
//!   per day.
//!
//! Both take the right-hand side as `f(t, y, dydt)` and keep their stage
//! buffers in a reusable [`Workspace`].

use seihrd_core::SimulationError;
use serde::{Deserialize, Serialize};

/// Tolerances and step bounds for the adaptive solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdeOptions {
    /// Relative tolerance (default: 1e-6).
    pub rtol: f64,
    /// Absolute tolerance (default: 1e-6).
    pub atol: f64,
    /// Initial step size in days (default: 0.1).
    pub h0: f64,
    /// Minimum step size (default: 1e-10).
    pub h_min: f64,
    /// Maximum step size (default: 1 day).
    pub h_max: f64,
    /// Maximum number of attempted steps per simulation (default: 100_000).
    pub max_steps: usize,
}

impl Default for OdeOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-6,
            h0: 0.1,
            h_min: 1e-10,
            h_max: 1.0,
            max_steps: 100_000,
        }
    }
}

impl OdeOptions {
    fn validate(&self) -> Result<(), SimulationError> {
        if !self.rtol.is_finite() || self.rtol <= 0.0 {
            return Err(SimulationError::InvalidSettings(
                "rtol must be finite and > 0".into(),
            ));
        }
        if !self.atol.is_finite() || self.atol <= 0.0 {
            return Err(SimulationError::InvalidSettings(
                "atol must be finite and > 0".into(),
            ));
        }
        if !(self.h_min > 0.0 && self.h_min <= self.h0 && self.h0 <= self.h_max) {
            return Err(SimulationError::InvalidSettings(
                "step sizes must satisfy 0 < h_min <= h0 <= h_max".into(),
            ));
        }
        if self.max_steps == 0 {
            return Err(SimulationError::InvalidSettings(
                "max_steps must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Integration method, fixed for a whole fitting run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Integrator {
    DormandPrince(OdeOptions),
    Rk4 { step: f64 },
}

impl Default for Integrator {
    fn default() -> Self {
        Integrator::DormandPrince(OdeOptions::default())
    }
}

impl std::fmt::Display for Integrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Integrator::DormandPrince(opts) => write!(
                f,
                "Dormand-Prince 5(4) (rtol={}, atol={})",
                opts.rtol, opts.atol
            ),
            Integrator::Rk4 { step } => write!(f, "RK4 (step={} d)", step),
        }
    }
}

/// Stage buffers shared by both methods.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    k: [Vec<f64>; 7],
    ytmp: Vec<f64>,
    ynew: Vec<f64>,
    /// Step size carried between days by the adaptive method.
    h: f64,
    /// `k[0]` already holds `f(t, y)` (first-same-as-last).
    fsal: bool,
}

impl Workspace {
    pub fn new(n: usize) -> Self {
        let mut ws = Self::default();
        ws.resize(n);
        ws
    }

    fn resize(&mut self, n: usize) {
        if self.ytmp.len() != n {
            for k in &mut self.k {
                k.resize(n, 0.0);
            }
            self.ytmp.resize(n, 0.0);
            self.ynew.resize(n, 0.0);
        }
    }

    fn reset(&mut self, h0: f64) {
        self.h = h0;
        self.fsal = false;
    }
}

/// Integrate from `y0` at `t = 0` and return the solution at
/// `t = 0, 1, ..., num_days - 1`.
pub fn solve_daily<F>(
    integrator: &Integrator,
    y0: &[f64],
    num_days: usize,
    ws: &mut Workspace,
    mut f: F,
) -> Result<Vec<Vec<f64>>, SimulationError>
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    ws.resize(y0.len());

    let mut out = Vec::with_capacity(num_days);
    if num_days == 0 {
        return Ok(out);
    }

    let mut y = y0.to_vec();
    out.push(y.clone());

    match integrator {
        Integrator::DormandPrince(opts) => {
            opts.validate()?;
            ws.reset(opts.h0);
            let mut steps = 0usize;
            for day in 1..num_days {
                let t0 = (day - 1) as f64;
                dopri_advance(&mut y, t0, day as f64, opts, ws, &mut steps, &mut f)?;
                out.push(y.clone());
            }
        }
        Integrator::Rk4 { step } => {
            let steps_per_day = rk4_steps_per_day(*step)?;
            let dt = 1.0 / steps_per_day as f64;
            for day in 1..num_days {
                let t0 = (day - 1) as f64;
                for s in 0..steps_per_day {
                    rk4_step_ws(&mut y, t0 + s as f64 * dt, dt, ws, &mut f);
                }
                if y.iter().any(|v| !v.is_finite()) {
                    return Err(SimulationError::NonFinite { t: day as f64 });
                }
                out.push(y.clone());
            }
        }
    }

    Ok(out)
}

fn rk4_steps_per_day(step: f64) -> Result<usize, SimulationError> {
    if !step.is_finite() || step <= 0.0 || step > 1.0 {
        return Err(SimulationError::InvalidSettings(format!(
            "RK4 step must be in (0, 1], got {}",
            step
        )));
    }
    let steps = (1.0 / step).round();
    if (steps * step - 1.0).abs() > 1e-9 {
        return Err(SimulationError::InvalidSettings(format!(
            "RK4 step {} does not divide one day",
            step
        )));
    }
    Ok(steps as usize)
}

/// Fixed-step RK4 using preallocated workspace.
pub fn rk4_step_ws<F>(y: &mut [f64], t: f64, dt: f64, ws: &mut Workspace, f: &mut F)
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    let n = y.len();
    ws.resize(n);

    let [k1, k2, k3, k4, ..] = &mut ws.k;
    let ytmp = &mut ws.ytmp;

    f(t, y, k1);

    for i in 0..n {
        ytmp[i] = y[i] + 0.5 * dt * k1[i];
    }
    f(t + 0.5 * dt, ytmp, k2);

    for i in 0..n {
        ytmp[i] = y[i] + 0.5 * dt * k2[i];
    }
    f(t + 0.5 * dt, ytmp, k3);

    for i in 0..n {
        ytmp[i] = y[i] + dt * k3[i];
    }
    f(t + dt, ytmp, k4);

    for i in 0..n {
        y[i] += (dt / 6.0) * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
    }
}

// Dormand–Prince 5(4) tableau.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// 5th-order weights (also the last stage row, FSAL).
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// 5th minus embedded 4th-order weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Advance `y` from `t0` to exactly `t1` with error-controlled steps.
fn dopri_advance<F>(
    y: &mut [f64],
    t0: f64,
    t1: f64,
    opts: &OdeOptions,
    ws: &mut Workspace,
    steps: &mut usize,
    f: &mut F,
) -> Result<(), SimulationError>
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    let n = y.len();
    let mut t = t0;

    while t < t1 {
        if *steps >= opts.max_steps {
            return Err(SimulationError::StepLimit {
                t,
                max_steps: opts.max_steps,
            });
        }
        *steps += 1;

        let remaining = t1 - t;
        let h = ws.h.min(opts.h_max).min(remaining);
        let lands_on_boundary = h >= remaining;

        let Workspace {
            k, ytmp, ynew, fsal, ..
        } = &mut *ws;
        let [k1, k2, k3, k4, k5, k6, k7] = k;

        if !*fsal {
            f(t, y, k1);
            *fsal = true;
        }

        for i in 0..n {
            ytmp[i] = y[i] + h * A21 * k1[i];
        }
        f(t + C2 * h, ytmp, k2);

        for i in 0..n {
            ytmp[i] = y[i] + h * (A31 * k1[i] + A32 * k2[i]);
        }
        f(t + C3 * h, ytmp, k3);

        for i in 0..n {
            ytmp[i] = y[i] + h * (A41 * k1[i] + A42 * k2[i] + A43 * k3[i]);
        }
        f(t + C4 * h, ytmp, k4);

        for i in 0..n {
            ytmp[i] = y[i] + h * (A51 * k1[i] + A52 * k2[i] + A53 * k3[i] + A54 * k4[i]);
        }
        f(t + C5 * h, ytmp, k5);

        for i in 0..n {
            ytmp[i] = y[i]
                + h * (A61 * k1[i] + A62 * k2[i] + A63 * k3[i] + A64 * k4[i] + A65 * k5[i]);
        }
        f(t + h, ytmp, k6);

        for i in 0..n {
            ynew[i] = y[i]
                + h * (B1 * k1[i] + B3 * k3[i] + B4 * k4[i] + B5 * k5[i] + B6 * k6[i]);
        }
        f(t + h, ynew, k7);

        let mut sum_sq = 0.0;
        for i in 0..n {
            let err = h
                * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
            let scale = opts.atol + opts.rtol * y[i].abs().max(ynew[i].abs());
            sum_sq += (err / scale).powi(2);
        }
        let err_norm = (sum_sq / n as f64).sqrt();

        if !err_norm.is_finite() {
            ws.h = h * MIN_FACTOR;
            if ws.h < opts.h_min {
                return Err(SimulationError::NonFinite { t });
            }
            continue;
        }

        if err_norm <= 1.0 {
            y.copy_from_slice(ynew);
            std::mem::swap(k1, k7);
            t = if lands_on_boundary { t1 } else { t + h };

            let factor = if err_norm == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * err_norm.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
            };
            // A step shortened to land on the boundary says little about the
            // next one; never let it shrink the carried step.
            ws.h = if lands_on_boundary {
                (h * factor).max(ws.h)
            } else {
                h * factor
            };
        } else {
            ws.h = h * (SAFETY * err_norm.powf(-0.2)).max(MIN_FACTOR);
            if ws.h < opts.h_min {
                return Err(SimulationError::StepSizeUnderflow { t, h: ws.h });
            }
        }
    }

    if y.iter().any(|v| !v.is_finite()) {
        return Err(SimulationError::NonFinite { t: t1 });
    }
    Ok(())
}
