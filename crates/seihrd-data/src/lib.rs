//! Observed hospitalisation and mortality series.
//!
//! One parameterised [`TimeSeriesProvider`] reads either dataset, buckets its
//! age breakdown into the model's three bands through an explicit
//! [`BandMapping`], and [`ObservedSeries::align`] places the result on the
//! simulation's calendar grid.

pub mod alignment;
pub mod dataset;
pub mod error;
pub mod provider;

pub use alignment::{MissingPolicy, ObservedSeries};
pub use dataset::{Accumulation, BandEntry, BandMapping, DatasetSpec, DateWindow};
pub use error::DataError;
pub use provider::{BandedSeries, Observation, TimeSeriesProvider};
