use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::alerts::ChangeNotifier;
use super::domain::{CohortKey, Confidence, ProbabilitySnapshot};
use super::repository::{CohortRepository, RepositoryError, SnapshotStore, UpsertOutcome};
use super::scoring::{Grade, TrendResult};
use super::service::ProbabilityService;

pub const DEFAULT_CACHE_VALIDITY_DAYS: i64 = 7;
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// How long snapshots stay valid and how many cohorts one run may recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecomputePolicy {
    pub validity_days: i64,
    pub batch_size: usize,
}

impl Default for RecomputePolicy {
    fn default() -> Self {
        Self {
            validity_days: DEFAULT_CACHE_VALIDITY_DAYS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl RecomputePolicy {
    pub fn freshness(
        &self,
        snapshot: Option<&ProbabilitySnapshot>,
        as_of: DateTime<Utc>,
    ) -> Freshness {
        match snapshot {
            Some(snapshot) if as_of - snapshot.calculated_at < Duration::days(self.validity_days) => {
                Freshness::Fresh
            }
            _ => Freshness::Stale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Fresh,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecomputedCohort {
    pub key: CohortKey,
    pub probability: f64,
    pub grade: Grade,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<TrendResult>,
    pub confidence: Confidence,
    pub turnover_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecomputeFailure {
    pub key: CohortKey,
    pub error: String,
}

/// Outcome of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecomputeReport {
    pub as_of: DateTime<Utc>,
    pub considered: usize,
    pub fresh: usize,
    /// Stale cohorts left for a later run because the batch was full.
    pub deferred: usize,
    pub recomputed: Vec<RecomputedCohort>,
    /// Cohorts whose stored snapshot turned out newer than this run's result.
    pub superseded: Vec<CohortKey>,
    pub failures: Vec<RecomputeFailure>,
    pub alerts_sent: usize,
    pub alerts_failed: usize,
}

/// Periodically refreshes stale snapshots across the facility population.
pub struct RecomputeScheduler<R, S, N> {
    service: Arc<ProbabilityService<R, S>>,
    repository: Arc<R>,
    notifier: Arc<N>,
    policy: RecomputePolicy,
}

impl<R, S, N> RecomputeScheduler<R, S, N>
where
    R: CohortRepository + 'static,
    S: SnapshotStore + 'static,
    N: ChangeNotifier + 'static,
{
    pub fn new(
        service: Arc<ProbabilityService<R, S>>,
        repository: Arc<R>,
        notifier: Arc<N>,
        policy: RecomputePolicy,
    ) -> Self {
        Self {
            service,
            repository,
            notifier,
            policy,
        }
    }

    /// Recompute up to `batch_size` stale cohorts, oldest snapshot first.
    ///
    /// A failure on one cohort is recorded in the report and does not stop the others.
    pub fn run_batch(&self, as_of: DateTime<Utc>) -> Result<RecomputeReport, RepositoryError> {
        let cohorts = self.repository.list_cohorts()?;
        let snapshots = self.service.snapshots();

        let mut report = RecomputeReport {
            as_of,
            considered: cohorts.len(),
            fresh: 0,
            deferred: 0,
            recomputed: Vec::new(),
            superseded: Vec::new(),
            failures: Vec::new(),
            alerts_sent: 0,
            alerts_failed: 0,
        };

        let mut stale = Vec::new();
        for key in cohorts {
            match snapshots.fetch_previous_snapshot(&key) {
                Ok(previous) => match self.policy.freshness(previous.as_ref(), as_of) {
                    Freshness::Fresh => report.fresh += 1,
                    Freshness::Stale => stale.push((key, previous)),
                },
                Err(err) => {
                    warn!(cohort = %key, error = %err, "snapshot lookup failed");
                    report.failures.push(RecomputeFailure {
                        key,
                        error: err.to_string(),
                    });
                }
            }
        }

        // Never-calculated cohorts first, then the oldest snapshots.
        stale.sort_by_key(|(key, previous)| {
            (
                previous.as_ref().map(|snapshot| snapshot.calculated_at),
                key.clone(),
            )
        });
        report.deferred = stale.len().saturating_sub(self.policy.batch_size);
        stale.truncate(self.policy.batch_size);

        for (key, previous) in stale {
            let calculated = match self
                .service
                .calculate_against(&key, None, previous.as_ref(), as_of)
            {
                Ok(calculated) => calculated,
                Err(err) => {
                    warn!(cohort = %key, error = %err, "probability recompute failed");
                    report.failures.push(RecomputeFailure {
                        key,
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            let replaced = match snapshots.upsert_if_newer(calculated.snapshot()) {
                Ok(UpsertOutcome::Inserted) => None,
                Ok(UpsertOutcome::Replaced { previous }) => Some(previous),
                Ok(UpsertOutcome::Superseded { current }) => {
                    info!(
                        cohort = %key,
                        stored_at = %current.calculated_at,
                        "newer snapshot already stored"
                    );
                    report.superseded.push(key);
                    continue;
                }
                Err(err) => {
                    warn!(cohort = %key, error = %err, "snapshot write failed");
                    report.failures.push(RecomputeFailure {
                        key,
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            if let Some(replaced) = replaced {
                match self.notifier.probability_changed(
                    &key,
                    replaced.probability,
                    calculated.probability,
                    as_of,
                ) {
                    Ok(summary) => {
                        report.alerts_sent += summary.alerts_created;
                        report.alerts_failed += summary.failed_deliveries;
                    }
                    Err(err) => warn!(cohort = %key, error = %err, "probability alert failed"),
                }
            }

            report.recomputed.push(RecomputedCohort {
                key,
                probability: calculated.probability,
                grade: calculated.grade,
                trend: calculated.trend,
                confidence: calculated.confidence,
                turnover_samples: calculated.turnover_samples,
            });
        }

        info!(
            considered = report.considered,
            recomputed = report.recomputed.len(),
            deferred = report.deferred,
            failures = report.failures.len(),
            "probability recompute batch finished"
        );

        Ok(report)
    }
}
