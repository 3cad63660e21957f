//! Admission-likelihood workflow for childcare cohorts.
//!
//! Data flows extractor → scoring engine → trend, with snapshot persistence, batch
//! recompute and change alerts layered on top through collaborator traits.

pub mod alerts;
pub mod cache;
pub mod domain;
pub mod extractor;
pub mod recompute;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;

#[cfg(test)]
mod tests;

pub use alerts::{
    AlertError, AlertPublisher, AlertSummary, AudienceSource, ChangeDirection, ChangeNotifier,
    ProbabilityAlert, ProbabilityChangeDetector,
};
pub use cache::{KeyValueStore, StoreError, StoredValue};
pub use domain::{
    AgeCohortCapacity, AgeGroup, ApplicantContext, CohortKey, Confidence, FacilityId,
    ProbabilitySnapshot, TurnoverEvent,
};
pub use extractor::{ExtractedFactors, ExtractionError, FactorExtractor};
pub use recompute::{
    Freshness, RecomputeFailure, RecomputePolicy, RecomputeReport, RecomputeScheduler,
    RecomputedCohort,
};
pub use repository::{CohortRepository, RepositoryError, SnapshotStore, UpsertOutcome};
pub use router::{probability_router, recompute_router};
pub use scoring::{
    Factors, Grade, ProbabilityBreakdown, ProbabilityEngine, ProbabilityResult, ScoringConfig,
    TrendDirection, TrendResult,
};
pub use service::{FacilityProbability, ProbabilityService, ProbabilityServiceError};
