use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use log::{debug, info};
use seihrd_core::{AgeBand, NUM_BANDS};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dataset::{Accumulation, DatasetSpec, DateWindow};
use crate::error::DataError;

/// One band's figures on one date.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation {
    /// Running total up to and including the date.
    pub cumulative: f64,
    /// Change since the previous reported date.
    pub daily: f64,
}

/// Per-band observations keyed by calendar date, indexed by [`AgeBand::index`].
pub type BandedSeries = [BTreeMap<NaiveDate, Observation>; NUM_BANDS];

#[derive(Debug, Deserialize)]
struct RawDocument {
    data: Vec<RawRecord>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    date: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

/// Reads one age-stratified dataset and reduces it to three bands.
#[derive(Debug, Clone)]
pub struct TimeSeriesProvider {
    spec: DatasetSpec,
    window: DateWindow,
}

impl TimeSeriesProvider {
    pub fn new(spec: DatasetSpec, window: DateWindow) -> Self {
        Self { spec, window }
    }

    pub fn spec(&self) -> &DatasetSpec {
        &self.spec
    }

    pub fn window(&self) -> &DateWindow {
        &self.window
    }

    /// Load and reduce the JSON document at `path`.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<BandedSeries, DataError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loading {} from '{}'", self.spec.name, path.display());
        self.parse_str(&contents)
    }

    /// Reduce a JSON document already in memory.
    ///
    /// The first in-window date of each band only serves as the baseline
    /// for differencing and yields no observation.
    pub fn parse_str(&self, json: &str) -> Result<BandedSeries, DataError> {
        let document: RawDocument = serde_json::from_str(json).map_err(|e| {
            DataError::MalformedInput(format!("{} document: {}", self.spec.name, e))
        })?;

        let buckets = self.bucket(&document.data)?;

        let series: BandedSeries = std::array::from_fn(|b| {
            let band_values = buckets
                .iter()
                .filter_map(|(date, values)| values[b].map(|v| (*date, v)));
            accumulate(band_values, self.spec.accumulation)
        });

        for band in AgeBand::ALL {
            let observed = &series[band.index()];
            debug!(
                "{} [{}]: {} dated observations{}",
                self.spec.name,
                self.spec.mapping.label(band),
                observed.len(),
                observed
                    .iter()
                    .next_back()
                    .map(|(date, obs)| format!(", cumulative {} on {}", obs.cumulative, date))
                    .unwrap_or_default()
            );
        }

        Ok(series)
    }

    /// Sum mapped age labels per date and band, keeping only in-window dates.
    fn bucket(
        &self,
        records: &[RawRecord],
    ) -> Result<BTreeMap<NaiveDate, [Option<f64>; NUM_BANDS]>, DataError> {
        let mut buckets: BTreeMap<NaiveDate, [Option<f64>; NUM_BANDS]> = BTreeMap::new();

        for record in records {
            let date = NaiveDate::parse_from_str(&record.date, "%Y-%m-%d").map_err(|e| {
                DataError::MalformedInput(format!(
                    "{}: invalid date '{}': {}",
                    self.spec.name, record.date, e
                ))
            })?;
            if !self.window.contains(date) {
                continue;
            }

            let breakdown = record
                .fields
                .get(&self.spec.breakdown_field)
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    DataError::MalformedInput(format!(
                        "{}: record {} has no '{}' array",
                        self.spec.name, date, self.spec.breakdown_field
                    ))
                })?;

            let slot = buckets.entry(date).or_insert([None; NUM_BANDS]);
            for entry in breakdown {
                let age = entry
                    .get(&self.spec.age_field)
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        DataError::MalformedInput(format!(
                            "{}: entry on {} has no string '{}'",
                            self.spec.name, date, self.spec.age_field
                        ))
                    })?;
                let Some(band) = self.spec.mapping.band_of(age) else {
                    continue;
                };
                let value = entry
                    .get(&self.spec.value_field)
                    .and_then(Value::as_f64)
                    .ok_or_else(|| {
                        DataError::MalformedInput(format!(
                            "{}: age '{}' on {} has no numeric '{}'",
                            self.spec.name, age, date, self.spec.value_field
                        ))
                    })?;

                let total = slot[band.index()].get_or_insert(0.0);
                *total += value;
            }
        }

        Ok(buckets)
    }
}

fn accumulate(
    values: impl Iterator<Item = (NaiveDate, f64)>,
    accumulation: Accumulation,
) -> BTreeMap<NaiveDate, Observation> {
    let mut observations = BTreeMap::new();
    let mut previous: Option<f64> = None;
    let mut running = 0.0;

    for (date, value) in values {
        if let Some(prev) = previous {
            let observation = match accumulation {
                Accumulation::Cumulative => Observation {
                    cumulative: value,
                    daily: value - prev,
                },
                Accumulation::Daily => {
                    running += value;
                    Observation {
                        cumulative: running,
                        daily: value,
                    }
                }
            };
            observations.insert(date, observation);
        }
        previous = Some(value);
    }

    observations
}
