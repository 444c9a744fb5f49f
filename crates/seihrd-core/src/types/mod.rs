pub mod age_band;
pub mod parameters;
pub mod population;
pub mod state;
pub mod time;
