use serde::{Deserialize, Serialize};

/// Number of age cohorts the model is stratified into.
pub const NUM_BANDS: usize = 3;

/// One scalar per age band, indexed by [`AgeBand::index`].
pub type BandValues = [f64; NUM_BANDS];

/// A fixed population cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBand {
    Young,
    Adult,
    Elderly,
}

impl AgeBand {
    /// All bands in index order.
    pub const ALL: [AgeBand; NUM_BANDS] = [AgeBand::Young, AgeBand::Adult, AgeBand::Elderly];

    /// Position of this band inside every per-band vector.
    pub const fn index(self) -> usize {
        match self {
            AgeBand::Young => 0,
            AgeBand::Adult => 1,
            AgeBand::Elderly => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            AgeBand::Young => "young",
            AgeBand::Adult => "adult",
            AgeBand::Elderly => "elderly",
        }
    }
}

impl std::fmt::Display for AgeBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        for (i, band) in AgeBand::ALL.iter().enumerate() {
            assert_eq!(band.index(), i);
            assert_eq!(AgeBand::from_index(i), Some(*band));
        }
        assert_eq!(AgeBand::from_index(NUM_BANDS), None);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&AgeBand::Elderly).unwrap();
        assert_eq!(json, "\"elderly\"");
    }
}
