//! Typed user-level schema.
//!
//! Every row of an experiment is a [`UserRecord`]. Binary outcomes are held as
//! `bool` and written as `0`/`1`; the optional outcomes (`engaged`,
//! `signed_up`) are only populated when the extended outcome set is in use.

use std::fmt;

use serde::Serialize;

/// One of the two experimental treatment groups.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Variant {
    A,
    B,
}

impl Variant {
    pub fn label(self) -> &'static str {
        match self {
            Variant::A => "A",
            Variant::B => "B",
        }
    }

    /// The other group.
    pub fn swapped(self) -> Variant {
        match self {
            Variant::A => Variant::B,
            Variant::B => Variant::A,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A binary outcome column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Converted,
    Engaged,
    SignedUp,
}

impl Outcome {
    /// Outcomes tracked by the basic pipeline.
    pub const BASIC: &'static [Outcome] = &[Outcome::Converted];

    /// Outcomes tracked by the extended pipeline.
    pub const EXTENDED: &'static [Outcome] =
        &[Outcome::Converted, Outcome::Engaged, Outcome::SignedUp];

    pub fn column(self) -> &'static str {
        match self {
            Outcome::Converted => "converted",
            Outcome::Engaged => "engaged",
            Outcome::SignedUp => "signed_up",
        }
    }

    /// Human readable rate header, e.g. "Conversion Rate (%)".
    pub fn rate_title(self) -> &'static str {
        match self {
            Outcome::Converted => "Conversion Rate (%)",
            Outcome::Engaged => "Engagement Rate (%)",
            Outcome::SignedUp => "Signup Rate (%)",
        }
    }

    /// Value of this outcome on `record`, `None` when the column is absent.
    pub fn value(self, record: &UserRecord) -> Option<bool> {
        match self {
            Outcome::Converted => Some(record.converted),
            Outcome::Engaged => record.engaged,
            Outcome::SignedUp => record.signed_up,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserRecord {
    pub user_id: String,
    pub age: u32,
    pub location: String,
    pub device: String,
    pub click_rate: f64,
    pub converted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engaged: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_up: Option<bool>,
}

/// Ordered user records, as produced by a data source.
pub type Dataset = Vec<UserRecord>;

/// A record with its variant label attached.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssignedRecord {
    #[serde(flatten)]
    pub record: UserRecord,
    pub variant: Variant,
}

/// Records after assignment and permutation.
pub type AssignedDataset = Vec<AssignedRecord>;
