use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use chrono::{Duration, NaiveDate};
use seihrd_calibration::{LikelihoodConfig, OptimizationConfig, ParameterBounds};
use seihrd_core::{InitialConditions, ParameterSet, Population, TimeGrid};
use seihrd_data::{DateWindow, MissingPolicy};
use seihrd_ode::Integrator;
use serde::{Deserialize, Serialize};

/// Everything a fitting run needs. Every field defaults to the England 2020
/// scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitConfig {
    pub hospital_data: PathBuf,
    pub deaths_data: PathBuf,
    /// First in-window date; consumed as the differencing baseline.
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub population: Population,
    pub initial_conditions: InitialConditions,
    /// Starting point of the search.
    pub prior: ParameterSet,
    pub bounds: ParameterBounds,
    pub integrator: Integrator,
    pub likelihood: LikelihoodConfig,
    pub missing: MissingPolicy,
    pub optimizer: OptimizationConfig,
}

impl Default for FitConfig {
    fn default() -> Self {
        let window = DateWindow::england_2020();
        Self {
            hospital_data: PathBuf::from("dataHospitalisation.json"),
            deaths_data: PathBuf::from("dataMorts.json"),
            window_start: window.first,
            window_end: window.last,
            population: Population::default(),
            initial_conditions: InitialConditions::default(),
            prior: ParameterSet::prior(),
            bounds: ParameterBounds::default(),
            integrator: Integrator::default(),
            likelihood: LikelihoodConfig::default(),
            missing: MissingPolicy::default(),
            optimizer: OptimizationConfig::default(),
        }
    }
}

impl FitConfig {
    /// Read a JSON config. Relative data paths are taken relative to the
    /// config file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        let mut config: FitConfig = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config '{}'", path.display()))?;

        if let Some(dir) = path.parent() {
            config.hospital_data = resolve(dir, &config.hospital_data);
            config.deaths_data = resolve(dir, &config.deaths_data);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.window_start < self.window_end,
            "window_start ({}) must precede window_end ({})",
            self.window_start,
            self.window_end
        );
        self.bounds.validate()?;
        Ok(())
    }

    pub fn window(&self) -> DateWindow {
        DateWindow::new(self.window_start, self.window_end)
    }

    /// Simulation grid: the window minus its baseline day.
    pub fn grid(&self) -> Result<TimeGrid> {
        let first = self.window_start + Duration::days(1);
        Ok(TimeGrid::between(first, self.window_end)?)
    }
}

fn resolve(dir: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        dir.join(path)
    } else {
        path.to_path_buf()
    }
}
