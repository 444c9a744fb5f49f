use log::{info, warn};
use seihrd_core::{AgeBand, BandValues, TimeGrid, NUM_BANDS};
use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::provider::{BandedSeries, Observation};

/// What to do when a band has no value on some grid day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Fail with [`DataError::DataShape`].
    #[default]
    Reject,
    /// Leave the slot empty; the likelihood ignores it.
    Skip,
}

type DayRow = [Option<Observation>; NUM_BANDS];

/// Hospital and mortality observations laid out on a simulation grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedSeries {
    grid: TimeGrid,
    hospital: Vec<DayRow>,
    deaths: Vec<DayRow>,
}

impl ObservedSeries {
    /// Place provider output on `grid` by calendar date.
    ///
    /// Dates outside the grid are dropped. A band with no value on any grid
    /// day is always an error; gaps are handled per `policy`.
    pub fn align(
        grid: TimeGrid,
        hospital: &BandedSeries,
        deaths: &BandedSeries,
        policy: MissingPolicy,
    ) -> Result<Self, DataError> {
        let hospital = place(&grid, "hospital admissions", hospital, policy)?;
        let deaths = place(&grid, "deaths", deaths, policy)?;
        info!(
            "Aligned observations on {} days from {} to {}",
            grid.num_days(),
            grid.start(),
            grid.end()
        );
        Ok(Self {
            grid,
            hospital,
            deaths,
        })
    }

    /// Fully observed series from cumulative per-day values.
    ///
    /// The daily figure of day 0 equals its cumulative value.
    pub fn from_columns(
        grid: TimeGrid,
        hospital: Vec<BandValues>,
        deaths: Vec<BandValues>,
    ) -> Result<Self, DataError> {
        for (name, column) in [("hospital", &hospital), ("deaths", &deaths)] {
            if column.len() != grid.num_days() {
                return Err(DataError::DataShape(format!(
                    "{} column has {} days, grid has {}",
                    name,
                    column.len(),
                    grid.num_days()
                )));
            }
        }
        Ok(Self {
            grid,
            hospital: differenced(&hospital),
            deaths: differenced(&deaths),
        })
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn num_days(&self) -> usize {
        self.grid.num_days()
    }

    pub fn hospital(&self, day: usize, band: AgeBand) -> Option<Observation> {
        self.hospital.get(day).and_then(|row| row[band.index()])
    }

    pub fn deaths(&self, day: usize, band: AgeBand) -> Option<Observation> {
        self.deaths.get(day).and_then(|row| row[band.index()])
    }

    /// Number of filled (day, band) slots across both datasets.
    pub fn observed_count(&self) -> usize {
        self.hospital
            .iter()
            .chain(&self.deaths)
            .flat_map(|row| row.iter())
            .filter(|slot| slot.is_some())
            .count()
    }
}

fn differenced(cumulative: &[BandValues]) -> Vec<DayRow> {
    let mut previous = [0.0; NUM_BANDS];
    cumulative
        .iter()
        .map(|values| {
            let row = std::array::from_fn(|b| {
                Some(Observation {
                    cumulative: values[b],
                    daily: values[b] - previous[b],
                })
            });
            previous = *values;
            row
        })
        .collect()
}

fn place(
    grid: &TimeGrid,
    name: &str,
    series: &BandedSeries,
    policy: MissingPolicy,
) -> Result<Vec<DayRow>, DataError> {
    let mut rows = vec![[None; NUM_BANDS]; grid.num_days()];

    for band in AgeBand::ALL {
        let mut placed = 0;
        for (date, observation) in &series[band.index()] {
            if let Some(day) = grid.day_of(*date) {
                rows[day][band.index()] = Some(*observation);
                placed += 1;
            }
        }

        if placed == 0 {
            return Err(DataError::DataShape(format!(
                "{} has no observations for band {} between {} and {}",
                name,
                band,
                grid.start(),
                grid.end()
            )));
        }

        let missing = grid.num_days() - placed;
        if missing == 0 {
            continue;
        }
        match policy {
            MissingPolicy::Reject => {
                let first_gap = rows
                    .iter()
                    .position(|row| row[band.index()].is_none())
                    .map(|day| grid.date(day));
                return Err(DataError::DataShape(format!(
                    "{} band {} is missing {} of {} grid days (first on {})",
                    name,
                    band,
                    missing,
                    grid.num_days(),
                    first_gap.map(|d| d.to_string()).unwrap_or_default()
                )));
            }
            MissingPolicy::Skip => {
                warn!(
                    "{} band {} is missing {} of {} grid days; those days are skipped",
                    name,
                    band,
                    missing,
                    grid.num_days()
                );
            }
        }
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use std::collections::BTreeMap;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, 20).unwrap()
    }

    fn full_series(days: i64, skip: Option<i64>) -> BandedSeries {
        std::array::from_fn(|b| {
            (0..days)
                .filter(|day| Some(*day) != skip)
                .map(|day| {
                    let value = (day + 1) as f64 * (b + 1) as f64;
                    (
                        start() + Duration::days(day),
                        Observation {
                            cumulative: value,
                            daily: (b + 1) as f64,
                        },
                    )
                })
                .collect()
        })
    }

    #[test]
    fn test_align_by_calendar_date() {
        let grid = TimeGrid::new(start(), 5).unwrap();
        // Two extra trailing days fall outside the grid.
        let series = full_series(7, None);

        let observed =
            ObservedSeries::align(grid, &series, &series, MissingPolicy::Reject).unwrap();
        assert_eq!(observed.num_days(), 5);
        assert_eq!(observed.observed_count(), 30);
        assert_eq!(
            observed.hospital(4, AgeBand::Elderly),
            Some(Observation {
                cumulative: 15.0,
                daily: 3.0
            })
        );
        let adult_deaths: Vec<Option<f64>> = (0..5)
            .map(|day| observed.deaths(day, AgeBand::Adult).map(|obs| obs.cumulative))
            .collect();
        assert_eq!(
            adult_deaths,
            vec![Some(2.0), Some(4.0), Some(6.0), Some(8.0), Some(10.0)]
        );
        assert_eq!(observed.deaths(5, AgeBand::Adult), None);
    }

    #[test]
    fn test_missing_day_rejected_by_default() {
        let grid = TimeGrid::new(start(), 5).unwrap();
        let complete = full_series(5, None);
        let gappy = full_series(5, Some(2));

        let err = ObservedSeries::align(grid, &complete, &gappy, MissingPolicy::default())
            .unwrap_err();
        assert!(matches!(err, DataError::DataShape(ref msg) if msg.contains("2020-03-22")));
    }

    #[test]
    fn test_missing_day_skipped() {
        let grid = TimeGrid::new(start(), 5).unwrap();
        let complete = full_series(5, None);
        let gappy = full_series(5, Some(2));

        let observed =
            ObservedSeries::align(grid, &gappy, &complete, MissingPolicy::Skip).unwrap();
        assert_eq!(observed.hospital(2, AgeBand::Young), None);
        assert!(observed.hospital(3, AgeBand::Young).is_some());
        assert_eq!(observed.observed_count(), 30 - 3);
    }

    #[test]
    fn test_empty_band_fails_under_both_policies() {
        let grid = TimeGrid::new(start(), 3).unwrap();
        let complete = full_series(3, None);
        let mut without_elderly = complete.clone();
        without_elderly[AgeBand::Elderly.index()] = BTreeMap::new();

        for policy in [MissingPolicy::Reject, MissingPolicy::Skip] {
            let result = ObservedSeries::align(grid, &complete, &without_elderly, policy);
            assert!(matches!(result, Err(DataError::DataShape(_))));
        }
    }

    #[test]
    fn test_from_columns_differences() {
        let grid = TimeGrid::new(start(), 3).unwrap();
        let hospital = vec![[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [4.0, 4.0, 9.0]];
        let deaths = vec![[0.0; 3], [0.0, 1.0, 1.0], [0.0, 1.0, 3.0]];

        let observed = ObservedSeries::from_columns(grid, hospital, deaths.clone()).unwrap();
        assert_eq!(
            observed.hospital(0, AgeBand::Young),
            Some(Observation {
                cumulative: 1.0,
                daily: 1.0
            })
        );
        assert_eq!(observed.hospital(2, AgeBand::Adult).unwrap().daily, 0.0);
        assert_eq!(observed.deaths(2, AgeBand::Elderly).unwrap().daily, 2.0);

        assert!(ObservedSeries::from_columns(grid, vec![[0.0; 3]], deaths).is_err());
    }
}
