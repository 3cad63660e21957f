use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    AgeGroup, ApplicantContext, CohortKey, Confidence, FacilityId, ProbabilitySnapshot,
};
use super::extractor::{ExtractedFactors, ExtractionError, FactorExtractor};
use super::repository::{CohortRepository, RepositoryError, SnapshotStore};
use super::scoring::{
    Factors, Grade, ProbabilityBreakdown, ProbabilityEngine, ProbabilityResult, TrendResult,
};

/// Composite result for one cohort, ready for caching or display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityProbability {
    pub facility_id: FacilityId,
    pub age_group: AgeGroup,
    pub probability: f64,
    pub grade: Grade,
    pub grade_label: String,
    pub breakdown: ProbabilityBreakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<TrendResult>,
    pub confidence: Confidence,
    pub turnover_samples: usize,
    pub calculated_at: DateTime<Utc>,
}

impl FacilityProbability {
    pub fn key(&self) -> CohortKey {
        CohortKey {
            facility_id: self.facility_id.clone(),
            age_group: self.age_group.clone(),
        }
    }

    /// Snapshot the caller persists for the next trend comparison.
    pub fn snapshot(&self) -> ProbabilitySnapshot {
        ProbabilitySnapshot {
            facility_id: self.facility_id.clone(),
            age_group: self.age_group.clone(),
            probability: self.probability,
            grade: self.grade,
            calculated_at: self.calculated_at,
        }
    }
}

/// Service composing the factor extractor, snapshot lookup and scoring engine.
///
/// Reads only; persisting the returned snapshot is the caller's decision.
pub struct ProbabilityService<R, S> {
    extractor: FactorExtractor<R>,
    snapshots: Arc<S>,
    engine: Arc<ProbabilityEngine>,
}

impl<R, S> ProbabilityService<R, S>
where
    R: CohortRepository + 'static,
    S: SnapshotStore + 'static,
{
    pub fn new(extractor: FactorExtractor<R>, snapshots: Arc<S>, engine: ProbabilityEngine) -> Self {
        Self {
            extractor,
            snapshots,
            engine: Arc::new(engine),
        }
    }

    pub fn snapshots(&self) -> &Arc<S> {
        &self.snapshots
    }

    /// Calculate the cohort's probability, comparing against the stored snapshot.
    pub fn calculate(
        &self,
        key: &CohortKey,
        applicant: Option<&ApplicantContext>,
        as_of: DateTime<Utc>,
    ) -> Result<FacilityProbability, ProbabilityServiceError> {
        let previous = self.snapshots.fetch_previous_snapshot(key)?;
        self.calculate_against(key, applicant, previous.as_ref(), as_of)
    }

    /// Same as [`Self::calculate`] with a previous snapshot the caller already holds.
    pub fn calculate_against(
        &self,
        key: &CohortKey,
        applicant: Option<&ApplicantContext>,
        previous: Option<&ProbabilitySnapshot>,
        as_of: DateTime<Utc>,
    ) -> Result<FacilityProbability, ProbabilityServiceError> {
        let extracted = self.extractor.extract(key, applicant, as_of)?;
        let result = self.engine.calculate(&extracted.factors, as_of.month());
        let trend = previous.map(|snapshot| self.engine.trend(result.probability, snapshot.probability));

        info!(
            cohort = %key,
            probability = result.probability,
            grade = %result.grade,
            confidence = ?extracted.confidence,
            "calculated admission probability"
        );

        Ok(compose(extracted, result, trend, as_of))
    }

    /// Score caller-supplied factors without touching any store.
    pub fn score(&self, factors: &Factors, month: u32) -> ProbabilityResult {
        self.engine.calculate(factors, month)
    }
}

fn compose(
    extracted: ExtractedFactors,
    result: ProbabilityResult,
    trend: Option<TrendResult>,
    as_of: DateTime<Utc>,
) -> FacilityProbability {
    let ExtractedFactors {
        key,
        turnover_samples,
        confidence,
        ..
    } = extracted;

    FacilityProbability {
        facility_id: key.facility_id,
        age_group: key.age_group,
        probability: result.probability,
        grade: result.grade,
        grade_label: result.grade.label().to_string(),
        breakdown: result.breakdown,
        trend,
        confidence,
        turnover_samples,
        calculated_at: as_of,
    }
}

/// Error raised by the probability service.
#[derive(Debug, thiserror::Error)]
pub enum ProbabilityServiceError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ProbabilityServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ProbabilityServiceError::Extraction(ExtractionError::NotFound(_))
        )
    }
}
