//! Result aggregation.
//!
//! Image jobs render many independently seeded samples of one frame; these
//! are merged into `{prefix}_average.{ext}` as they arrive. Animation jobs
//! are checked for frames that have not come back yet.

mod accumulator;
mod aggregator;
mod errors;

pub use accumulator::AverageAccumulator;
pub use aggregator::{average, average_files, AggregateReport, ResultAggregator};
pub use errors::{AggregateError, AggregateResult};
