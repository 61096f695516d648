//! Per-variant aggregation.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::Serialize;

use crate::error::{AbTestError, Result};
use crate::record::{AssignedRecord, Outcome, UserRecord, Variant};

/// Count, sum and rate of one outcome within one group.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutcomeStats {
    pub outcome: Outcome,
    pub sum: usize,
    /// `sum / users`.
    pub mean: f64,
    /// `mean * 100`.
    pub rate_percent: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupSummary {
    pub variant: Variant,
    pub users: usize,
    pub outcomes: Vec<OutcomeStats>,
}

impl GroupSummary {
    pub fn stats(&self, outcome: Outcome) -> Option<&OutcomeStats> {
        self.outcomes.iter().find(|s| s.outcome == outcome)
    }
}

/* ---------------------------------------------------------------------------
 *  Per-variant summary
 * ---------------------------------------------------------------------------
 * Records are grouped by variant in a `BTreeMap`, so groups come back ordered
 * A then B and only variants present in the data are reported. Each group
 * keeps a user count and one integer sum per requested outcome; the mean is
 * computed once at the end as `sum / users`.
 *
 * Assumptions:
 *   * Outcomes are 0/1, so sums are exact integers and the result does not
 *     depend on row order.
 *   * Every record carries every requested outcome; a missing value is a
 *     schema mismatch, not a zero.
 */
pub fn summarize(data: &[AssignedRecord], outcomes: &[Outcome]) -> Result<Vec<GroupSummary>> {
    if data.is_empty() {
        return Err(AbTestError::EmptyDataset);
    }

    // variant -> (users, per-outcome sums)
    let mut groups: BTreeMap<Variant, (usize, Vec<usize>)> = BTreeMap::new();
    for r in data {
        let (users, sums) = groups
            .entry(r.variant)
            .or_insert_with(|| (0, vec![0; outcomes.len()]));
        *users += 1;
        for (sum, &outcome) in sums.iter_mut().zip(outcomes) {
            let value = outcome
                .value(&r.record)
                .ok_or_else(|| AbTestError::SchemaMismatch {
                    column: outcome.column().to_string(),
                })?;
            *sum += usize::from(value);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(variant, (users, sums))| GroupSummary {
            variant,
            users,
            outcomes: outcomes
                .iter()
                .zip(sums)
                .map(|(&outcome, sum)| {
                    let mean = sum as f64 / users as f64;
                    OutcomeStats {
                        outcome,
                        sum,
                        mean,
                        rate_percent: mean * 100.0,
                    }
                })
                .collect(),
        })
        .collect())
}

/// Categorical attribute used for the user distribution breakdown.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Location,
    Device,
}

impl Attribute {
    pub fn column(self) -> &'static str {
        match self {
            Attribute::Location => "location",
            Attribute::Device => "device",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Attribute::Location => "Location",
            Attribute::Device => "Device",
        }
    }

    fn value(self, record: &UserRecord) -> &str {
        match self {
            Attribute::Location => &record.location,
            Attribute::Device => &record.device,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DistributionRow {
    pub variant: Variant,
    pub value: String,
    pub users: usize,
}

/// Number of users per (variant, attribute value), sorted by variant then value.
pub fn distribution(data: &[AssignedRecord], attribute: Attribute) -> Vec<DistributionRow> {
    data.iter()
        .map(|r| (r.variant, attribute.value(&r.record)))
        .counts()
        .into_iter()
        .map(|((variant, value), users)| DistributionRow {
            variant,
            value: value.to_string(),
            users,
        })
        .sorted_by(|a, b| (a.variant, &a.value).cmp(&(b.variant, &b.value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: usize, variant: Variant, converted: bool, location: &str) -> AssignedRecord {
        AssignedRecord {
            record: UserRecord {
                user_id: format!("user_{id}"),
                age: 30,
                location: location.into(),
                device: "Mobile".into(),
                click_rate: 0.1,
                converted,
                engaged: Some(!converted),
                signed_up: None,
            },
            variant,
        }
    }

    fn sample() -> Vec<AssignedRecord> {
        vec![
            row(0, Variant::B, true, "US"),
            row(1, Variant::A, true, "IN"),
            row(2, Variant::A, false, "US"),
            row(3, Variant::B, false, "US"),
            row(4, Variant::A, false, "UK"),
            row(5, Variant::A, true, "US"),
        ]
    }

    #[test]
    fn test_summarize_counts_and_rates() {
        let summary = summarize(&sample(), Outcome::BASIC).unwrap();
        assert_eq!(summary.len(), 2);

        let a = &summary[0];
        assert_eq!(a.variant, Variant::A);
        assert_eq!(a.users, 4);
        let conv = a.stats(Outcome::Converted).unwrap();
        assert_eq!(conv.sum, 2);
        assert!((conv.mean - 0.5).abs() < 1e-9);
        assert!((conv.rate_percent - 50.0).abs() < 1e-9);

        let b = &summary[1];
        assert_eq!(b.users, 2);
        assert_eq!(b.stats(Outcome::Converted).unwrap().sum, 1);
    }

    #[test]
    fn test_summarize_order_independent() {
        let data = sample();
        let mut reversed = data.clone();
        reversed.reverse();
        assert_eq!(
            summarize(&data, Outcome::BASIC).unwrap(),
            summarize(&reversed, Outcome::BASIC).unwrap()
        );
    }

    #[test]
    fn test_summarize_empty_is_error() {
        assert!(matches!(
            summarize(&[], Outcome::BASIC),
            Err(AbTestError::EmptyDataset)
        ));
    }

    #[test]
    fn test_summarize_missing_outcome_is_schema_mismatch() {
        match summarize(&sample(), Outcome::EXTENDED) {
            Err(AbTestError::SchemaMismatch { column }) => assert_eq!(column, "signed_up"),
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_summarize_multiple_outcomes() {
        let summary = summarize(&sample(), &[Outcome::Converted, Outcome::Engaged]).unwrap();
        let a = &summary[0];
        assert_eq!(a.stats(Outcome::Engaged).unwrap().sum, 2);
    }

    #[test]
    fn test_distribution_by_location() {
        let rows = distribution(&sample(), Attribute::Location);
        let got: Vec<_> = rows
            .iter()
            .map(|r| (r.variant, r.value.as_str(), r.users))
            .collect();
        assert_eq!(
            got,
            vec![
                (Variant::A, "IN", 1),
                (Variant::A, "UK", 1),
                (Variant::A, "US", 2),
                (Variant::B, "US", 2),
            ]
        );
    }

    #[test]
    fn test_distribution_by_device() {
        let rows = distribution(&sample(), Attribute::Device);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].users, 4);
        assert_eq!(rows[1].users, 2);
        assert_eq!(Attribute::Device.column(), "device");
    }
}
