use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::domain::{ApplicantContext, CohortKey, Confidence};
use super::repository::{CohortRepository, RepositoryError};
use super::scoring::Factors;

/// Length of the turnover lookback window.
pub const TURNOVER_WINDOW_DAYS: i64 = 365;

/// Months the windowed seat total is averaged over.
const TURNOVER_WINDOW_MONTHS: f64 = 12.0;

pub const DEFAULT_MIN_TURNOVER_SAMPLES: usize = 3;

/// Queue position assumed when the applicant did not state one: the middle of the list.
pub fn mid_queue_position(total_waiting: i64) -> i64 {
    total_waiting - total_waiting.div_euclid(2)
}

/// Factors for one cohort plus what the caller needs to judge their reliability.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFactors {
    pub key: CohortKey,
    pub factors: Factors,
    pub turnover_samples: usize,
    pub confidence: Confidence,
}

/// Assembles scoring inputs from the cohort repository.
pub struct FactorExtractor<R> {
    repository: Arc<R>,
    min_turnover_samples: usize,
    default_queue_position: fn(i64) -> i64,
}

impl<R> FactorExtractor<R>
where
    R: CohortRepository,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            min_turnover_samples: DEFAULT_MIN_TURNOVER_SAMPLES,
            default_queue_position: mid_queue_position,
        }
    }

    pub fn with_min_turnover_samples(mut self, samples: usize) -> Self {
        self.min_turnover_samples = samples;
        self
    }

    /// Replace the policy used when an applicant has no stated queue position.
    pub fn with_default_queue_position(mut self, policy: fn(i64) -> i64) -> Self {
        self.default_queue_position = policy;
        self
    }

    pub fn extract(
        &self,
        key: &CohortKey,
        applicant: Option<&ApplicantContext>,
        as_of: DateTime<Utc>,
    ) -> Result<ExtractedFactors, ExtractionError> {
        let capacity = self
            .repository
            .fetch_age_cohort_capacity(key)?
            .ok_or_else(|| ExtractionError::NotFound(key.clone()))?;

        let since = as_of - Duration::days(TURNOVER_WINDOW_DAYS);
        let events = self.repository.fetch_turnover_events(key, since)?;
        let windowed: Vec<_> = events
            .iter()
            .filter(|event| event.occurred_at >= since && event.occurred_at <= as_of)
            .collect();
        let seats_freed: u64 = windowed
            .iter()
            .map(|event| u64::from(event.seats_freed))
            .sum();
        let turnover_samples = windowed.len();

        let confidence = if turnover_samples < self.min_turnover_samples {
            Confidence::Low
        } else {
            Confidence::Normal
        };

        let total_waiting = capacity.waiting_count;
        let applicant = applicant.cloned().unwrap_or_default();
        let factors = Factors {
            queue_position: applicant
                .queue_position
                .unwrap_or_else(|| (self.default_queue_position)(total_waiting)),
            total_waiting,
            class_capacity: capacity.capacity,
            current_enroll: capacity.current_enrollment,
            historical_to_rate: seats_freed as f64 / TURNOVER_WINDOW_MONTHS,
            priority: applicant.priority.unwrap_or(1),
            bonus_points: applicant.bonus_points.unwrap_or(0.0),
        };

        debug!(
            cohort = %key,
            turnover_samples,
            historical_to_rate = factors.historical_to_rate,
            "extracted admission factors"
        );

        Ok(ExtractedFactors {
            key: key.clone(),
            factors,
            turnover_samples,
            confidence,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("no capacity record for {0}")]
    NotFound(CohortKey),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
