use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{AgeCohortCapacity, CohortKey, ProbabilitySnapshot, TurnoverEvent};

/// Read access to cohort capacity and turnover history.
pub trait CohortRepository: Send + Sync {
    fn fetch_age_cohort_capacity(
        &self,
        key: &CohortKey,
    ) -> Result<Option<AgeCohortCapacity>, RepositoryError>;

    /// Turnover events for the cohort that occurred at or after `since`.
    fn fetch_turnover_events(
        &self,
        key: &CohortKey,
        since: DateTime<Utc>,
    ) -> Result<Vec<TurnoverEvent>, RepositoryError>;

    /// Every cohort that has a capacity record.
    fn list_cohorts(&self) -> Result<Vec<CohortKey>, RepositoryError>;
}

/// Storage for the single current snapshot of each cohort.
pub trait SnapshotStore: Send + Sync {
    fn fetch_previous_snapshot(
        &self,
        key: &CohortKey,
    ) -> Result<Option<ProbabilitySnapshot>, RepositoryError>;

    /// Write `snapshot` unless the stored one was calculated later.
    fn upsert_if_newer(&self, snapshot: ProbabilitySnapshot)
        -> Result<UpsertOutcome, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Replaced { previous: ProbabilitySnapshot },
    /// A newer snapshot was already stored; nothing was written.
    Superseded { current: ProbabilitySnapshot },
}

/// Error enumeration for collaborator store failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
