use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::scoring::Grade;

/// Identifier wrapper for childcare facilities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FacilityId(pub String);

impl fmt::Display for FacilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Age band a facility tracks capacity for independently (e.g. `age_2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgeGroup(pub String);

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One enrollment class: a facility and the age group it admits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CohortKey {
    pub facility_id: FacilityId,
    pub age_group: AgeGroup,
}

impl CohortKey {
    pub fn new(facility_id: impl Into<String>, age_group: impl Into<String>) -> Self {
        Self {
            facility_id: FacilityId(facility_id.into()),
            age_group: AgeGroup(age_group.into()),
        }
    }
}

impl fmt::Display for CohortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.facility_id, self.age_group)
    }
}

/// Seats, enrollment and waitlist length for one cohort. Enrollment may exceed capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeCohortCapacity {
    pub facility_id: FacilityId,
    pub age_group: AgeGroup,
    pub capacity: i64,
    pub current_enrollment: i64,
    pub waiting_count: i64,
}

impl AgeCohortCapacity {
    pub fn key(&self) -> CohortKey {
        CohortKey {
            facility_id: self.facility_id.clone(),
            age_group: self.age_group.clone(),
        }
    }
}

/// Historical record of seats becoming vacant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnoverEvent {
    pub facility_id: FacilityId,
    pub age_group: AgeGroup,
    pub occurred_at: DateTime<Utc>,
    pub seats_freed: u32,
}

/// Applicant-specific overrides. Anything left out falls back to the extractor policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicantContext {
    #[serde(default)]
    pub queue_position: Option<i64>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub bonus_points: Option<f64>,
}

/// Last persisted calculation for a cohort, kept for trend comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilitySnapshot {
    pub facility_id: FacilityId,
    pub age_group: AgeGroup,
    pub probability: f64,
    pub grade: Grade,
    pub calculated_at: DateTime<Utc>,
}

impl ProbabilitySnapshot {
    pub fn key(&self) -> CohortKey {
        CohortKey {
            facility_id: self.facility_id.clone(),
            age_group: self.age_group.clone(),
        }
    }
}

/// Whether the turnover rate rests on enough events to be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Normal,
    Low,
}
