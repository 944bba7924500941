//! Metrics module: session aggregation, display smoothing and units.

pub mod calculator;
pub mod smoothing;
pub mod units;

pub use calculator::{read_through, Accumulation, Aggregate, ReadThrough, WindowedAggregator};
pub use smoothing::WeightedSmoother;
pub use units::{format_elapsed, joule_to_cal};
