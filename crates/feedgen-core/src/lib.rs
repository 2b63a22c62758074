//! Batch driver: tops a remote feedback generator up to a target count.

pub mod driver;

pub use driver::{run, DriverParams, RunSummary};
