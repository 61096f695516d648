//! Synthetic user data.
//!
//! Categorical attributes are uniform, `click_rate` is uniform on `[0, 1)` and
//! each binary outcome is an independent Bernoulli draw.

use rand::seq::IndexedRandom;
use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Uniform};
use tracing::debug;

use crate::error::{AbTestError, Result};
use crate::record::{Dataset, UserRecord};

pub const LOCATIONS: [&str; 4] = ["US", "IN", "UK", "CA"];
pub const DEVICES: [&str; 2] = ["Mobile", "Desktop"];

/// Ages are drawn from `MIN_AGE..MAX_AGE` (upper bound exclusive).
pub const MIN_AGE: u32 = 18;
pub const MAX_AGE: u32 = 65;

/// Success probability of each binary outcome.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OutcomeRates {
    pub converted: f64,
    pub engaged: f64,
    pub signed_up: f64,
}

impl Default for OutcomeRates {
    fn default() -> Self {
        Self {
            converted: 0.15,
            engaged: 0.7,
            signed_up: 0.5,
        }
    }
}

/// Draws [`UserRecord`]s with fixed attribute distributions.
#[derive(Clone, Debug)]
pub struct Generator {
    age: Uniform<u32>,
    converted: Bernoulli,
    engaged: Bernoulli,
    signed_up: Bernoulli,
    extended: bool,
}

fn bernoulli(column: &str, p: f64) -> Result<Bernoulli> {
    Bernoulli::new(p).map_err(|e| {
        AbTestError::InvalidConfig(format!("rate for `{column}` must be within [0, 1]: {e}"))
    })
}

impl Generator {
    pub fn new(rates: OutcomeRates, extended: bool) -> Result<Self> {
        let age = Uniform::new(MIN_AGE, MAX_AGE)
            .map_err(|e| AbTestError::InvalidConfig(format!("age range: {e}")))?;
        Ok(Self {
            age,
            converted: bernoulli("converted", rates.converted)?,
            engaged: bernoulli("engaged", rates.engaged)?,
            signed_up: bernoulli("signed_up", rates.signed_up)?,
            extended,
        })
    }

    /// Generate `num_users` records with ids `user_0..user_{n-1}`.
    pub fn generate(&self, num_users: usize, rng: &mut impl Rng) -> Dataset {
        let data: Dataset = (0..num_users)
            .map(|i| self.record(i, rng))
            .collect();
        debug!(num_users, extended = self.extended, "generated synthetic dataset");
        data
    }

    fn record(&self, index: usize, rng: &mut impl Rng) -> UserRecord {
        // Both arrays are non-empty constants.
        let location = LOCATIONS.choose(rng).copied().unwrap_or(LOCATIONS[0]);
        let device = DEVICES.choose(rng).copied().unwrap_or(DEVICES[0]);
        let age = self.age.sample(rng);
        let click_rate = rng.random::<f64>();
        let converted = self.converted.sample(rng);
        let (engaged, signed_up) = if self.extended {
            (Some(self.engaged.sample(rng)), Some(self.signed_up.sample(rng)))
        } else {
            (None, None)
        };

        UserRecord {
            user_id: format!("user_{index}"),
            age,
            location: location.to_string(),
            device: device.to_string(),
            click_rate,
            converted,
            engaged,
            signed_up,
        }
    }
}
