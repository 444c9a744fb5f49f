use chrono::NaiveDate;
use seihrd_core::AgeBand;
use serde::{Deserialize, Serialize};

/// How the per-date bucket sums of a dataset relate to time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accumulation {
    /// Values are running totals; the daily figure is the difference from
    /// the previous date.
    Cumulative,
    /// Values are daily counts; the running total starts after the baseline
    /// date.
    Daily,
}

/// Which dataset age labels make up one model band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandEntry {
    pub band: AgeBand,
    /// The dataset's own name for the bucket, e.g. `0-17`.
    pub label: String,
    /// Raw age labels summed into this bucket.
    pub ages: Vec<String>,
}

/// Explicit correspondence between model bands and a dataset's buckets.
///
/// The two datasets cut ages differently (0-17 vs 0-19, 18-64 vs 20-64);
/// this table is the only place the model band of a raw label is decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<BandEntry>", into = "Vec<BandEntry>")]
pub struct BandMapping {
    entries: Vec<BandEntry>,
}

impl BandMapping {
    /// Build from one entry per band; entries may come in any order.
    pub fn new(mut entries: Vec<BandEntry>) -> Result<Self, String> {
        entries.sort_by_key(|entry| entry.band);
        let bands: Vec<AgeBand> = entries.iter().map(|entry| entry.band).collect();
        if bands != AgeBand::ALL {
            return Err(format!(
                "band mapping must list each of {:?} exactly once, got {:?}",
                AgeBand::ALL,
                bands
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for entry in &entries {
            for age in &entry.ages {
                if !seen.insert(age.as_str()) {
                    return Err(format!("age label '{}' mapped to more than one band", age));
                }
            }
        }

        Ok(Self { entries })
    }

    /// Admissions buckets: 0-17 / 18-64 / 65+.
    pub fn hospital_admissions() -> Self {
        Self::from_static([
            (AgeBand::Young, "0-17", &["0_to_5", "6_to_17"][..]),
            (AgeBand::Adult, "18-64", &["18_to_64"][..]),
            (AgeBand::Elderly, "65+", &["65_to_84", "85+"][..]),
        ])
    }

    /// Mortality buckets: 0-19 / 20-64 / 65+.
    pub fn deaths_by_age() -> Self {
        Self::from_static([
            (AgeBand::Young, "0-19", &["00_04", "05_09", "10_14", "15_19"][..]),
            (
                AgeBand::Adult,
                "20-64",
                &[
                    "20_24", "25_29", "30_34", "35_39", "40_44", "45_49", "50_54", "55_59",
                    "60_64",
                ][..],
            ),
            (
                AgeBand::Elderly,
                "65+",
                &["65_69", "70_74", "75_79", "80_84", "85_89", "90+"][..],
            ),
        ])
    }

    fn from_static(table: [(AgeBand, &str, &[&str]); 3]) -> Self {
        Self {
            entries: table
                .iter()
                .map(|(band, label, ages)| BandEntry {
                    band: *band,
                    label: label.to_string(),
                    ages: ages.iter().map(|age| age.to_string()).collect(),
                })
                .collect(),
        }
    }

    /// Model band for a raw age label, if the label is mapped.
    pub fn band_of(&self, age: &str) -> Option<AgeBand> {
        self.entries
            .iter()
            .find(|entry| entry.ages.iter().any(|a| a == age))
            .map(|entry| entry.band)
    }

    /// Dataset bucket name of a model band.
    pub fn label(&self, band: AgeBand) -> &str {
        &self.entries[band.index()].label
    }

    pub fn entries(&self) -> &[BandEntry] {
        &self.entries
    }
}

impl TryFrom<Vec<BandEntry>> for BandMapping {
    type Error = String;

    fn try_from(entries: Vec<BandEntry>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<BandMapping> for Vec<BandEntry> {
    fn from(mapping: BandMapping) -> Self {
        mapping.entries
    }
}

/// Inclusive calendar window of records to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DateWindow {
    pub fn new(first: NaiveDate, last: NaiveDate) -> Self {
        Self { first, last }
    }

    /// 2020-03-19 ..= 2020-12-31.
    pub fn england_2020() -> Self {
        Self {
            first: NaiveDate::from_ymd_opt(2020, 3, 19).expect("valid calendar date"),
            last: NaiveDate::from_ymd_opt(2020, 12, 31).expect("valid calendar date"),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last
    }
}

impl Default for DateWindow {
    fn default() -> Self {
        Self::england_2020()
    }
}

/// Where a dataset keeps its per-age breakdown and how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    /// Short name used in logs and errors.
    pub name: String,
    /// Record field holding the array of per-age entries.
    pub breakdown_field: String,
    /// Entry field holding the age label.
    pub age_field: String,
    /// Entry field holding the count.
    pub value_field: String,
    pub accumulation: Accumulation,
    pub mapping: BandMapping,
}

impl DatasetSpec {
    /// Cumulative hospital admissions by age.
    pub fn hospital_admissions() -> Self {
        Self {
            name: "hospital admissions".to_string(),
            breakdown_field: "cumAdmissionsByAge".to_string(),
            age_field: "age".to_string(),
            value_field: "value".to_string(),
            accumulation: Accumulation::Cumulative,
            mapping: BandMapping::hospital_admissions(),
        }
    }

    /// Daily deaths within 28 days of a positive test, by age.
    pub fn deaths_by_age() -> Self {
        Self {
            name: "deaths".to_string(),
            breakdown_field: "newDeaths28DaysByDeathDateAgeDemographics".to_string(),
            age_field: "age".to_string(),
            value_field: "deaths".to_string(),
            accumulation: Accumulation::Daily,
            mapping: BandMapping::deaths_by_age(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hospital_mapping_table() {
        let mapping = BandMapping::hospital_admissions();
        assert_eq!(mapping.band_of("0_to_5"), Some(AgeBand::Young));
        assert_eq!(mapping.band_of("6_to_17"), Some(AgeBand::Young));
        assert_eq!(mapping.band_of("18_to_64"), Some(AgeBand::Adult));
        assert_eq!(mapping.band_of("65_to_84"), Some(AgeBand::Elderly));
        assert_eq!(mapping.band_of("85+"), Some(AgeBand::Elderly));
        assert_eq!(mapping.band_of("00_04"), None);
        assert_eq!(mapping.label(AgeBand::Young), "0-17");
    }

    #[test]
    fn test_deaths_mapping_table() {
        let mapping = BandMapping::deaths_by_age();
        assert_eq!(mapping.band_of("15_19"), Some(AgeBand::Young));
        assert_eq!(mapping.band_of("20_24"), Some(AgeBand::Adult));
        assert_eq!(mapping.band_of("60_64"), Some(AgeBand::Adult));
        assert_eq!(mapping.band_of("90+"), Some(AgeBand::Elderly));
        // Aggregate buckets published alongside the fine ones are not mapped.
        assert_eq!(mapping.band_of("00_59"), None);
        assert_eq!(mapping.band_of("60+"), None);
        assert_eq!(mapping.label(AgeBand::Adult), "20-64");
    }

    #[test]
    fn test_bands_line_up_by_model_band_not_label() {
        let hospital = BandMapping::hospital_admissions();
        let deaths = BandMapping::deaths_by_age();
        for band in AgeBand::ALL {
            assert_eq!(hospital.entries()[band.index()].band, band);
            assert_eq!(deaths.entries()[band.index()].band, band);
        }
        assert_ne!(hospital.label(AgeBand::Young), deaths.label(AgeBand::Young));
        assert_eq!(hospital.label(AgeBand::Elderly), deaths.label(AgeBand::Elderly));
    }

    #[test]
    fn test_mapping_validation() {
        let entry = |band, ages: &[&str]| BandEntry {
            band,
            label: band.to_string(),
            ages: ages.iter().map(|a| a.to_string()).collect(),
        };

        let missing = BandMapping::new(vec![
            entry(AgeBand::Young, &["a"]),
            entry(AgeBand::Adult, &["b"]),
        ]);
        assert!(missing.is_err());

        let overlapping = BandMapping::new(vec![
            entry(AgeBand::Young, &["a"]),
            entry(AgeBand::Adult, &["a"]),
            entry(AgeBand::Elderly, &["c"]),
        ]);
        assert!(overlapping.is_err());

        let shuffled = BandMapping::new(vec![
            entry(AgeBand::Elderly, &["c"]),
            entry(AgeBand::Young, &["a"]),
            entry(AgeBand::Adult, &["b"]),
        ])
        .unwrap();
        assert_eq!(shuffled.band_of("c"), Some(AgeBand::Elderly));
        assert_eq!(shuffled.label(AgeBand::Young), "young");
    }

    #[test]
    fn test_window_is_inclusive() {
        let window = DateWindow::england_2020();
        assert!(window.contains(NaiveDate::from_ymd_opt(2020, 3, 19).unwrap()));
        assert!(window.contains(NaiveDate::from_ymd_opt(2020, 12, 31).unwrap()));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2020, 3, 18).unwrap()));
    }
}
