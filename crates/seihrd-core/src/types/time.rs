use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;
use crate::types::age_band::AgeBand;
use crate::types::state::{Compartment, State};

/// Integer simulation days anchored to a calendar start date.
///
/// Day `k` of the grid is `start + k days`; simulation time `t = k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeGrid {
    start: NaiveDate,
    num_days: usize,
}

impl TimeGrid {
    pub fn new(start: NaiveDate, num_days: usize) -> Result<Self, CoreError> {
        if num_days == 0 {
            return Err(CoreError::EmptyGrid);
        }
        Ok(Self { start, num_days })
    }

    /// Grid covering `first..=last`.
    pub fn between(first: NaiveDate, last: NaiveDate) -> Result<Self, CoreError> {
        let days = (last - first).num_days();
        if days < 0 {
            return Err(CoreError::EmptyGrid);
        }
        Self::new(first, days as usize + 1)
    }

    /// 2020-03-20 ..= 2020-12-31, the 287 observed days of the England fit.
    pub fn england_2020() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2020, 3, 20).expect("valid calendar date"),
            num_days: 287,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.date(self.num_days - 1)
    }

    pub fn num_days(&self) -> usize {
        self.num_days
    }

    pub fn date(&self, day: usize) -> NaiveDate {
        self.start + Duration::days(day as i64)
    }

    /// Grid day of `date`, if it lies on the grid.
    pub fn day_of(&self, date: NaiveDate) -> Option<usize> {
        let offset = (date - self.start).num_days();
        if offset < 0 || offset as usize >= self.num_days {
            None
        } else {
            Some(offset as usize)
        }
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        (0..self.num_days).map(|day| self.date(day)).collect()
    }
}

impl<'de> Deserialize<'de> for TimeGrid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            start: NaiveDate,
            num_days: usize,
        }

        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.start, raw.num_days).map_err(serde::de::Error::custom)
    }
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self::england_2020()
    }
}

/// The model state sampled once per grid day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    grid: TimeGrid,
    states: Vec<State>,
}

impl Trajectory {
    pub fn new(grid: TimeGrid, states: Vec<State>) -> Result<Self, CoreError> {
        if states.len() != grid.num_days() {
            return Err(CoreError::LengthMismatch {
                expected: grid.num_days(),
                actual: states.len(),
            });
        }
        Ok(Self { grid, states })
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, day: usize) -> Option<&State> {
        self.states.get(day)
    }

    pub fn last(&self) -> Option<&State> {
        self.states.last()
    }

    /// One compartment of one band across every day.
    pub fn series(&self, compartment: Compartment, band: AgeBand) -> Vec<f64> {
        self.states
            .iter()
            .map(|state| state.get(compartment, band))
            .collect()
    }
}
