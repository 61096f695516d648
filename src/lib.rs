//! A/B test simulation.
//!
//! Splits a dataset of users into variants A and B at an exact ratio,
//! aggregates binary outcomes per variant and tests whether conversion is
//! independent of the variant with a Pearson chi-square test.

pub mod assign;
pub mod config;
pub mod error;
pub mod generate;
pub mod ingest;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod significance;
pub mod summary;

pub use error::{AbTestError, Result};
