//! One complete run: load → assign → summarize → test.
//!
//! Nothing is shared between runs; every call recomputes from the
//! configuration it is given.

use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::assign::assign;
use crate::config::{DataSource, RunConfig};
use crate::error::{AbTestError, Result};
use crate::generate::{Generator, OutcomeRates};
use crate::ingest::load_csv;
use crate::record::{AssignedDataset, Dataset, Outcome, UserRecord};
use crate::significance::{significance, SignificanceResult};
use crate::summary::{distribution, summarize, DistributionRow, GroupSummary};

/// Groups smaller than this get a warning; the chi-square approximation is
/// poor on tiny samples.
const SMALL_GROUP: usize = 30;

/// The significance section of a report. A degenerate table is kept apart
/// from a real result so it can never be read as a p-value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignificanceOutcome {
    Tested(SignificanceResult),
    Undefined { reason: String },
}

impl SignificanceOutcome {
    pub fn result(&self) -> Option<&SignificanceResult> {
        match self {
            SignificanceOutcome::Tested(r) => Some(r),
            SignificanceOutcome::Undefined { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub config: RunConfig,
    pub assigned: AssignedDataset,
    pub summary: Vec<GroupSummary>,
    pub significance: SignificanceOutcome,
    pub distribution: Vec<DistributionRow>,
}

/// Produce the raw dataset named by `config.source`.
pub fn load(config: &RunConfig, rng: &mut impl Rng) -> Result<Dataset> {
    match &config.source {
        DataSource::Synthetic { num_users } => {
            let generator = Generator::new(OutcomeRates::default(), config.extended)?;
            Ok(generator.generate(*num_users, rng))
        }
        DataSource::Csv(path) => load_csv(path, config.outcomes()),
    }
}

/// Run the analysis on an already loaded dataset.
pub fn analyze(config: &RunConfig, data: &[UserRecord], rng: &mut impl Rng) -> Result<RunReport> {
    let assigned = assign(data, config.split_percent, rng)?;
    let summary = summarize(&assigned, config.outcomes())?;
    for group in &summary {
        if group.users < SMALL_GROUP {
            warn!(variant = %group.variant, users = group.users, "small group");
        }
    }

    let significance = match significance(&assigned, Outcome::Converted, config.yates_correction) {
        Ok(result) => SignificanceOutcome::Tested(result),
        Err(AbTestError::DegenerateContingency { reason }) => {
            warn!(%reason, "significance test undefined");
            SignificanceOutcome::Undefined { reason }
        }
        Err(e) => return Err(e),
    };
    if let Some(result) = significance.result() {
        info!(
            chi2 = result.chi2,
            p_value = result.p_value,
            verdict = %result.verdict,
            "significance"
        );
    }

    let distribution = distribution(&assigned, config.distribution);
    Ok(RunReport {
        config: config.clone(),
        assigned,
        summary,
        significance,
        distribution,
    })
}

/// Validate `config`, load its data and analyze it with the run's RNG.
pub fn run(config: &RunConfig) -> Result<RunReport> {
    config.validate()?;
    let mut rng = config.rng();
    let data = load(config, &mut rng)?;
    info!(users = data.len(), split = config.split_percent, "starting run");
    analyze(config, &data, &mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Variant;
    use crate::summary::Attribute;

    fn seeded(num_users: usize) -> RunConfig {
        RunConfig {
            source: DataSource::Synthetic { num_users },
            use_seed: true,
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_seeded_run_is_reproducible() {
        let a = run(&seeded(1000)).unwrap();
        let b = run(&seeded(1000)).unwrap();
        assert_eq!(a.assigned, b.assigned);
        assert_eq!(a.summary, b.summary);
        assert_eq!(a.significance, b.significance);
    }

    #[test]
    fn test_run_split_counts() {
        let config = RunConfig {
            split_percent: 30,
            ..seeded(1000)
        };
        let report = run(&config).unwrap();
        assert_eq!(report.summary[0].variant, Variant::A);
        assert_eq!(report.summary[0].users, 300);
        assert_eq!(report.summary[1].users, 700);
    }

    #[test]
    fn test_extended_run_summarizes_three_outcomes() {
        let config = RunConfig {
            extended: true,
            ..seeded(500)
        };
        let report = run(&config).unwrap();
        assert!(report.summary.iter().all(|g| g.outcomes.len() == 3));
    }

    #[test]
    fn test_invalid_config_fails_before_loading() {
        let config = RunConfig {
            split_percent: 95,
            source: DataSource::Csv("/nonexistent/data.csv".into()),
            ..RunConfig::default()
        };
        assert!(matches!(run(&config), Err(AbTestError::InvalidConfig(_))));
    }

    #[test]
    fn test_distribution_follows_config() {
        let config = RunConfig {
            distribution: Attribute::Device,
            ..seeded(400)
        };
        let report = run(&config).unwrap();
        assert!(report
            .distribution
            .iter()
            .all(|r| r.value == "Mobile" || r.value == "Desktop"));
        let total: usize = report.distribution.iter().map(|r| r.users).sum();
        assert_eq!(total, 400);
    }

    #[test]
    fn test_empty_dataset_errors() {
        let mut rng = RunConfig::default().rng();
        assert!(matches!(
            analyze(&RunConfig::default(), &[], &mut rng),
            Err(AbTestError::EmptyDataset)
        ));
    }

    #[test]
    fn test_degenerate_table_reported_not_failed() {
        let data: Dataset = (0..100)
            .map(|i| UserRecord {
                user_id: format!("user_{i}"),
                age: 40,
                location: "CA".into(),
                device: "Desktop".into(),
                click_rate: 0.2,
                converted: false,
                engaged: None,
                signed_up: None,
            })
            .collect();
        let mut rng = RunConfig::default().rng();
        let report = analyze(&seeded(100), &data, &mut rng).unwrap();
        assert!(matches!(
            report.significance,
            SignificanceOutcome::Undefined { .. }
        ));
        assert!(report.significance.result().is_none());
    }
}
