//! Pure admission-likelihood formula.
//!
//! [`ProbabilityEngine::calculate`] turns [`Factors`] and a calendar month into a
//! probability, a grade and the five-way breakdown behind it. The engine holds only its
//! configuration, so a single instance can be shared across threads freely.

mod components;
mod config;
mod factors;
mod grade;
mod season;
mod trend;

pub use components::ProbabilityBreakdown;
pub use config::{
    ComponentWeights, GradeThresholds, PriorityTiers, ScoringConfig, ScoringConfigError,
    SeasonalTable, GRADE_THRESHOLDS, GRADE_THRESHOLDS_VERSION, SEASONAL_MULTIPLIERS,
    SEASONAL_TABLE_VERSION, TREND_PERIOD,
};
pub use factors::{Factors, InvalidFactor};
pub use grade::Grade;
pub use trend::{TrendDirection, TrendResult};

use components::score_components;
use serde::{Deserialize, Serialize};

/// Stateless calculator applying a [`ScoringConfig`] to factors.
#[derive(Debug, Clone, Default)]
pub struct ProbabilityEngine {
    config: ScoringConfig,
}

impl ProbabilityEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score `factors` as of `month` (1 = January).
    pub fn calculate(&self, factors: &Factors, month: u32) -> ProbabilityResult {
        let breakdown = score_components(factors, &self.config);
        let raw_total = breakdown.raw_total();
        let probability = self.config.seasonal.adjust(raw_total, month);

        ProbabilityResult {
            probability,
            grade: self.grade(probability),
            breakdown,
        }
    }

    pub fn grade(&self, probability: f64) -> Grade {
        self.config.grades.classify(probability)
    }

    /// Compare a fresh probability with the one from the previous snapshot.
    pub fn trend(&self, current: f64, previous: f64) -> TrendResult {
        trend::calculate_trend(
            current,
            previous,
            self.config.trend_dead_zone,
            &self.config.trend_period,
        )
    }
}

/// Probability, grade and the component scores that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityResult {
    pub probability: f64,
    pub grade: Grade,
    pub breakdown: ProbabilityBreakdown,
}
