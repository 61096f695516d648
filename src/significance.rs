//! Chi-square test of independence between variant and a binary outcome.
//!
//! The table is built from the values actually present in the data. If either
//! dimension collapses to a single level the statistic is undefined and the
//! caller gets [`AbTestError::DegenerateContingency`] instead of a number.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::config::SIGNIFICANCE_LEVEL;
use crate::error::{AbTestError, Result};
use crate::record::{AssignedRecord, Outcome, Variant};

/// Observed counts of variant (rows) × outcome value (columns).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContingencyTable {
    pub outcome: Outcome,
    pub rows: Vec<Variant>,
    pub columns: Vec<bool>,
    pub observed: Vec<Vec<usize>>,
}

impl ContingencyTable {
    pub fn from_records(data: &[AssignedRecord], outcome: Outcome) -> Result<Self> {
        if data.is_empty() {
            return Err(AbTestError::EmptyDataset);
        }
        let mut cells: BTreeMap<(Variant, bool), usize> = BTreeMap::new();
        for r in data {
            let value = outcome
                .value(&r.record)
                .ok_or_else(|| AbTestError::SchemaMismatch {
                    column: outcome.column().to_string(),
                })?;
            *cells.entry((r.variant, value)).or_default() += 1;
        }

        let rows: Vec<Variant> = cells
            .keys()
            .map(|(v, _)| *v)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let columns: Vec<bool> = cells
            .keys()
            .map(|(_, o)| *o)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let observed = rows
            .iter()
            .map(|&v| {
                columns
                    .iter()
                    .map(|&o| cells.get(&(v, o)).copied().unwrap_or(0))
                    .collect()
            })
            .collect();

        Ok(Self {
            outcome,
            rows,
            columns,
            observed,
        })
    }

    pub fn total(&self) -> usize {
        self.observed.iter().flatten().sum()
    }

    pub fn degrees_of_freedom(&self) -> usize {
        self.rows.len().saturating_sub(1) * self.columns.len().saturating_sub(1)
    }

    /// Expected counts under independence: `row_total * col_total / total`.
    pub fn expected(&self) -> Vec<Vec<f64>> {
        let total = self.total() as f64;
        let col_totals: Vec<usize> = (0..self.columns.len())
            .map(|j| self.observed.iter().map(|row| row[j]).sum())
            .collect();
        self.observed
            .iter()
            .map(|row| {
                let row_total: usize = row.iter().sum();
                col_totals
                    .iter()
                    .map(|&c| row_total as f64 * c as f64 / total)
                    .collect()
            })
            .collect()
    }

    fn check_degenerate(&self) -> Result<()> {
        if self.rows.len() < 2 {
            let present = self.rows.iter().map(|v| v.label()).collect::<Vec<_>>().join(", ");
            return Err(AbTestError::DegenerateContingency {
                reason: format!("only variant(s) [{present}] have records"),
            });
        }
        if self.columns.len() < 2 {
            let value = self.columns.first().map(|&o| u8::from(o)).unwrap_or(0);
            return Err(AbTestError::DegenerateContingency {
                reason: format!(
                    "outcome `{}` is constant ({value}) across all records",
                    self.outcome
                ),
            });
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Significant,
    NotSignificant,
}

impl Verdict {
    pub fn from_p_value(p_value: f64) -> Self {
        if p_value < SIGNIFICANCE_LEVEL {
            Verdict::Significant
        } else {
            Verdict::NotSignificant
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Significant => f.write_str("statistically significant"),
            Verdict::NotSignificant => f.write_str("not statistically significant"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SignificanceResult {
    pub outcome: Outcome,
    pub chi2: f64,
    pub p_value: f64,
    pub dof: usize,
    pub expected: Vec<Vec<f64>>,
    pub yates_correction: bool,
    pub verdict: Verdict,
}

/// Pearson chi-square on `table`. With `correction` set, 1-dof tables get the
/// Yates continuity correction: each |O - E| shrinks by at most 0.5.
pub fn chi_square(table: &ContingencyTable, correction: bool) -> Result<SignificanceResult> {
    table.check_degenerate()?;

    let dof = table.degrees_of_freedom();
    let expected = table.expected();
    let yates = correction && dof == 1;

    let chi2: f64 = table
        .observed
        .iter()
        .flatten()
        .zip(expected.iter().flatten())
        .map(|(&o, &e)| {
            let mut diff = (o as f64 - e).abs();
            if yates {
                diff -= diff.min(0.5);
            }
            diff * diff / e
        })
        .sum();
    let p_value = chi2_sf(chi2, dof as f64);

    debug!(outcome = %table.outcome, chi2, p_value, dof, yates, "chi-square test");
    Ok(SignificanceResult {
        outcome: table.outcome,
        chi2,
        p_value,
        dof,
        expected,
        yates_correction: yates,
        verdict: Verdict::from_p_value(p_value),
    })
}

/// Build the variant × `outcome` table from `data` and test it.
pub fn significance(
    data: &[AssignedRecord],
    outcome: Outcome,
    correction: bool,
) -> Result<SignificanceResult> {
    let table = ContingencyTable::from_records(data, outcome)?;
    chi_square(&table, correction)
}

/* ---------------------------------------------------------------------------
 *  Chi-square survival function
 * ---------------------------------------------------------------------------
 * P(X >= x) for X ~ chi2(k) is the regularized upper incomplete gamma
 * Q(k/2, x/2). Q is evaluated with the power series when x < a + 1 and with
 * a Lentz continued fraction otherwise.
 */
const EPS: f64 = 1e-15;
const TINY: f64 = 1e-300;
const MAX_ITER: usize = 1000;

pub fn chi2_sf(x: f64, k: f64) -> f64 {
    if x <= 0.0 || k <= 0.0 {
        return 1.0;
    }
    gamma_q(k / 2.0, x / 2.0).clamp(0.0, 1.0)
}

fn ln_gamma(x: f64) -> f64 {
    // Lanczos approximation, g = 7.
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + 7.5;
    let series = COEF[1..]
        .iter()
        .enumerate()
        .fold(COEF[0], |acc, (i, &c)| acc + c / (x + i as f64 + 1.0));
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

fn gamma_q(a: f64, x: f64) -> f64 {
    let prefactor = (-x + a * x.ln() - ln_gamma(a)).exp();
    if x < a + 1.0 {
        let mut ap = a;
        let mut term = 1.0 / a;
        let mut sum = term;
        for _ in 0..MAX_ITER {
            ap += 1.0;
            term *= x / ap;
            sum += term;
            if term.abs() < sum.abs() * EPS {
                break;
            }
        }
        1.0 - sum * prefactor
    } else {
        let mut b = x + 1.0 - a;
        let mut c = 1.0 / TINY;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..MAX_ITER {
            let an = -(i as f64) * (i as f64 - a);
            b += 2.0;
            d = an * d + b;
            if d.abs() < TINY {
                d = TINY;
            }
            c = b + an / c;
            if c.abs() < TINY {
                c = TINY;
            }
            d = 1.0 / d;
            let delta = d * c;
            h *= delta;
            if (delta - 1.0).abs() < EPS {
                break;
            }
        }
        prefactor * h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::UserRecord;

    fn records(a: (usize, usize), b: (usize, usize)) -> Vec<AssignedRecord> {
        // (converted, not converted) per variant
        let mut out = Vec::new();
        let mut push = |variant, converted, n| {
            for _ in 0..n {
                out.push(AssignedRecord {
                    record: UserRecord {
                        user_id: format!("user_{}", out.len()),
                        age: 30,
                        location: "US".into(),
                        device: "Mobile".into(),
                        click_rate: 0.3,
                        converted,
                        engaged: None,
                        signed_up: None,
                    },
                    variant,
                });
            }
        };
        push(Variant::A, true, a.0);
        push(Variant::A, false, a.1);
        push(Variant::B, true, b.0);
        push(Variant::B, false, b.1);
        out
    }

    #[test]
    fn test_chi2_sf_known_values() {
        // dof 2 has closed form exp(-x/2).
        for x in [0.5, 1.0, 3.0, 10.0] {
            assert!((chi2_sf(x, 2.0) - (-x / 2.0).exp()).abs() < 1e-10);
        }
        assert!((chi2_sf(3.841_458_820_694_124, 1.0) - 0.05).abs() < 1e-6);
        assert!((chi2_sf(6.634_896_601_021_214, 1.0) - 0.01).abs() < 1e-6);
        assert!((chi2_sf(11.070_497_693_516_35, 5.0) - 0.05).abs() < 1e-6);
        assert_eq!(chi2_sf(0.0, 1.0), 1.0);
    }

    #[test]
    fn test_perfect_separation_is_significant() {
        let data = records((100, 0), (0, 100));
        let result = significance(&data, Outcome::Converted, true).unwrap();
        assert_eq!(result.dof, 1);
        assert!((result.chi2 - 196.02).abs() < 1e-9);
        assert!(result.p_value < 1e-10);
        assert_eq!(result.verdict, Verdict::Significant);
        assert_eq!(result.verdict.to_string(), "statistically significant");
    }

    #[test]
    fn test_uncorrected_perfect_separation() {
        let data = records((100, 0), (0, 100));
        let result = significance(&data, Outcome::Converted, false).unwrap();
        assert!((result.chi2 - 200.0).abs() < 1e-9);
        assert!(!result.yates_correction);
    }

    #[test]
    fn test_identical_rates_not_significant() {
        let data = records((15, 85), (15, 85));
        for correction in [true, false] {
            let result = significance(&data, Outcome::Converted, correction).unwrap();
            assert!(result.chi2.abs() < 1e-12);
            assert!((result.p_value - 1.0).abs() < 1e-12);
            assert_eq!(result.verdict, Verdict::NotSignificant);
        }
    }

    #[test]
    fn test_label_swap_symmetry() {
        let data = records((30, 70), (18, 82));
        let swapped: Vec<_> = data
            .iter()
            .cloned()
            .map(|mut r| {
                r.variant = r.variant.swapped();
                r
            })
            .collect();
        let a = significance(&data, Outcome::Converted, true).unwrap();
        let b = significance(&swapped, Outcome::Converted, true).unwrap();
        assert!((a.chi2 - b.chi2).abs() < 1e-12);
        assert!((a.p_value - b.p_value).abs() < 1e-12);
    }

    #[test]
    fn test_expected_frequencies() {
        let table = ContingencyTable::from_records(&records((10, 30), (30, 30)), Outcome::Converted)
            .unwrap();
        assert_eq!(table.columns, vec![false, true]);
        assert_eq!(table.observed, vec![vec![30, 10], vec![30, 30]]);
        let expected = table.expected();
        assert!((expected[0][0] - 24.0).abs() < 1e-12);
        assert!((expected[0][1] - 16.0).abs() < 1e-12);
        assert!((expected[1][0] - 36.0).abs() < 1e-12);
        assert!((expected[1][1] - 24.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_group_is_degenerate() {
        let data = records((10, 10), (0, 0));
        assert!(matches!(
            significance(&data, Outcome::Converted, true),
            Err(AbTestError::DegenerateContingency { .. })
        ));
    }

    #[test]
    fn test_constant_outcome_is_degenerate() {
        let data = records((0, 50), (0, 50));
        match significance(&data, Outcome::Converted, true) {
            Err(AbTestError::DegenerateContingency { reason }) => {
                assert!(reason.contains("constant"))
            }
            other => panic!("expected degenerate table, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_is_error() {
        assert!(matches!(
            significance(&[], Outcome::Converted, true),
            Err(AbTestError::EmptyDataset)
        ));
    }
}
