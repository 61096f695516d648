//! Run configuration.
//!
//! A [`RunConfig`] is built once from the command line, validated, and then
//! passed by reference into every stage of the pipeline.

use std::path::PathBuf;

use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use serde::Serialize;

use crate::error::{AbTestError, Result};
use crate::record::{Outcome, Variant};
use crate::summary::Attribute;

/// Seed used when reproducible runs are requested.
pub const FIXED_SEED: u64 = 42;

/// p-values strictly below this are reported as significant.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

pub const MIN_USERS: usize = 100;
pub const MAX_USERS: usize = 5000;
pub const MIN_SPLIT: u32 = 10;
pub const MAX_SPLIT: u32 = 90;
pub const SPLIT_STEP: u32 = 5;

pub const DEFAULT_VARIANT_A_NAME: &str = "Reward $5";
pub const DEFAULT_VARIANT_B_NAME: &str = "Reward $10";

/// Where the user records come from.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Synthetic { num_users: usize },
    Csv(PathBuf),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunConfig {
    pub source: DataSource,
    /// Percentage of records labelled "A".
    pub split_percent: u32,
    pub variant_a_name: String,
    pub variant_b_name: String,
    /// Drive generation and the shuffle from [`FIXED_SEED`].
    pub use_seed: bool,
    /// Track `engaged` and `signed_up` next to `converted`.
    pub extended: bool,
    /// Yates continuity correction on 1-dof tables.
    pub yates_correction: bool,
    /// Attribute broken down per variant in the distribution table.
    pub distribution: Attribute,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            source: DataSource::Synthetic { num_users: 1000 },
            split_percent: 50,
            variant_a_name: DEFAULT_VARIANT_A_NAME.to_string(),
            variant_b_name: DEFAULT_VARIANT_B_NAME.to_string(),
            use_seed: false,
            extended: false,
            yates_correction: true,
            distribution: Attribute::Location,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if let DataSource::Synthetic { num_users } = self.source {
            if !(MIN_USERS..=MAX_USERS).contains(&num_users) {
                return Err(AbTestError::InvalidConfig(format!(
                    "number of users must be within {MIN_USERS}..={MAX_USERS}, got {num_users}"
                )));
            }
        }
        if !(MIN_SPLIT..=MAX_SPLIT).contains(&self.split_percent)
            || self.split_percent % SPLIT_STEP != 0
        {
            return Err(AbTestError::InvalidConfig(format!(
                "split percentage must be a multiple of {SPLIT_STEP} within {MIN_SPLIT}..={MAX_SPLIT}, got {}",
                self.split_percent
            )));
        }
        if self.variant_a_name.trim().is_empty() || self.variant_b_name.trim().is_empty() {
            return Err(AbTestError::InvalidConfig(
                "variant names must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Outcome columns summarized by this run.
    pub fn outcomes(&self) -> &'static [Outcome] {
        if self.extended {
            Outcome::EXTENDED
        } else {
            Outcome::BASIC
        }
    }

    /// Display name for a variant. Purely cosmetic.
    pub fn display_name(&self, variant: Variant) -> &str {
        match variant {
            Variant::A => &self.variant_a_name,
            Variant::B => &self.variant_b_name,
        }
    }

    /// RNG for one run: fixed when `use_seed` is set, entropy otherwise.
    pub fn rng(&self) -> XorShiftRng {
        if self.use_seed {
            XorShiftRng::seed_from_u64(FIXED_SEED)
        } else {
            XorShiftRng::from_os_rng()
        }
    }
}
