use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Version tag of [`SEASONAL_MULTIPLIERS`].
pub const SEASONAL_TABLE_VERSION: &str = "seasonal-2024.1";

/// Month-indexed multipliers, January first. March is the primary intake season and
/// September the secondary one; summer and winter are the troughs.
pub const SEASONAL_MULTIPLIERS: [f64; 12] = [
    0.95, 1.05, 1.15, 1.08, 1.0, 0.98, 0.92, 0.92, 1.05, 1.0, 0.97, 0.93,
];

/// Version tag of [`GRADE_THRESHOLDS`].
pub const GRADE_THRESHOLDS_VERSION: &str = "grades-2024.1";

/// Minimum probability for grades A through E. Anything below the last entry is an F.
pub const GRADE_THRESHOLDS: [f64; 5] = [85.0, 70.0, 55.0, 40.0, 25.0];

/// Label attached to trends, describing the nominal recompute interval.
pub const TREND_PERIOD: &str = "30d";

/// Maximum points each breakdown component may contribute. Sums to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentWeights {
    pub position: f64,
    pub vacancy: f64,
    pub turnover: f64,
    pub priority: f64,
    pub bonus: f64,
}

impl ComponentWeights {
    pub fn total(&self) -> f64 {
        self.position + self.vacancy + self.turnover + self.priority + self.bonus
    }
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            position: 35.0,
            vacancy: 25.0,
            turnover: 15.0,
            priority: 15.0,
            bonus: 10.0,
        }
    }
}

/// Points awarded per priority tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityTiers {
    pub first_choice: f64,
    pub second_choice: f64,
    pub other: f64,
}

impl Default for PriorityTiers {
    fn default() -> Self {
        Self {
            first_choice: 15.0,
            second_choice: 8.0,
            other: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalTable {
    pub version: String,
    pub multipliers: [f64; 12],
}

impl Default for SeasonalTable {
    fn default() -> Self {
        Self {
            version: SEASONAL_TABLE_VERSION.to_string(),
            multipliers: SEASONAL_MULTIPLIERS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeThresholds {
    pub version: String,
    /// Descending minimums for A, B, C, D and E.
    pub minimums: [f64; 5],
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self {
            version: GRADE_THRESHOLDS_VERSION.to_string(),
            minimums: GRADE_THRESHOLDS,
        }
    }
}

/// Every tunable constant of the scoring formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ComponentWeights,
    /// Points per freed seat per month of historical turnover.
    pub turnover_scale: f64,
    /// Points per applicant bonus point.
    pub bonus_scale: f64,
    pub priority_tiers: PriorityTiers,
    pub seasonal: SeasonalTable,
    pub grades: GradeThresholds,
    /// Deltas within this many points either way are reported as stable.
    pub trend_dead_zone: f64,
    pub trend_period: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ComponentWeights::default(),
            turnover_scale: 7.5,
            bonus_scale: 2.5,
            priority_tiers: PriorityTiers::default(),
            seasonal: SeasonalTable::default(),
            grades: GradeThresholds::default(),
            trend_dead_zone: 1.0,
            trend_period: TREND_PERIOD.to_string(),
        }
    }
}

impl ScoringConfig {
    /// Read a JSON document and validate it. Missing fields fall back to defaults.
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, ScoringConfigError> {
        let raw = fs::read_to_string(path.as_ref()).map_err(|source| ScoringConfigError::Read {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        let config: ScoringConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ScoringConfigError> {
        let magnitudes = [
            ("weights.position", self.weights.position),
            ("weights.vacancy", self.weights.vacancy),
            ("weights.turnover", self.weights.turnover),
            ("weights.priority", self.weights.priority),
            ("weights.bonus", self.weights.bonus),
            ("priority_tiers.first_choice", self.priority_tiers.first_choice),
            ("priority_tiers.second_choice", self.priority_tiers.second_choice),
            ("priority_tiers.other", self.priority_tiers.other),
            ("turnover_scale", self.turnover_scale),
            ("bonus_scale", self.bonus_scale),
        ];
        if let Some((field, value)) = magnitudes
            .into_iter()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
        {
            return Err(ScoringConfigError::InvalidMagnitude { field, value });
        }

        let total = self.weights.total();
        if (total - 100.0).abs() > 1e-9 {
            return Err(ScoringConfigError::WeightTotal(total));
        }

        if self
            .priority_tiers
            .first_choice
            .max(self.priority_tiers.second_choice)
            .max(self.priority_tiers.other)
            > self.weights.priority
        {
            return Err(ScoringConfigError::PriorityTierAboveWeight);
        }

        if let Some(month) = self
            .seasonal
            .multipliers
            .iter()
            .position(|multiplier| !multiplier.is_finite() || *multiplier <= 0.0)
        {
            return Err(ScoringConfigError::SeasonalMultiplier { month: month + 1 });
        }

        let descending = self
            .grades
            .minimums
            .windows(2)
            .all(|pair| pair[0] > pair[1]);
        if !descending {
            return Err(ScoringConfigError::GradeOrdering);
        }

        if self.trend_dead_zone < 0.0 {
            return Err(ScoringConfigError::NegativeDeadZone);
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringConfigError {
    #[error("unable to read scoring config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("scoring config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} must be a finite, non-negative number, got {value}")]
    InvalidMagnitude { field: &'static str, value: f64 },
    #[error("component weights must sum to 100, got {0}")]
    WeightTotal(f64),
    #[error("priority tier points exceed the priority weight")]
    PriorityTierAboveWeight,
    #[error("seasonal multiplier for month {month} must be positive")]
    SeasonalMultiplier { month: usize },
    #[error("grade thresholds must be strictly descending")]
    GradeOrdering,
    #[error("trend dead zone must not be negative")]
    NegativeDeadZone,
}
