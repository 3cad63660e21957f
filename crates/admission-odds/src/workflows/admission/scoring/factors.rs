use serde::{Deserialize, Serialize};

/// Raw inputs for one (facility, age group, applicant) calculation.
///
/// Counts are signed so upstream data errors reach the engine intact; the formula clamps
/// them instead of rejecting the call. Use [`Factors::validate`] for strict intake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factors {
    pub queue_position: i64,
    pub total_waiting: i64,
    pub class_capacity: i64,
    pub current_enroll: i64,
    /// Average seats freed per month over the trailing year.
    pub historical_to_rate: f64,
    /// 1 for first choice, 2 for second choice, anything else for lower tiers.
    pub priority: i64,
    pub bonus_points: f64,
}

impl Factors {
    /// Strict check for callers that would rather reject than clamp.
    pub fn validate(&self) -> Result<(), InvalidFactor> {
        if self.class_capacity < 0 {
            return Err(InvalidFactor::NegativeCount {
                field: "class_capacity",
                value: self.class_capacity,
            });
        }
        if self.current_enroll < 0 {
            return Err(InvalidFactor::NegativeCount {
                field: "current_enroll",
                value: self.current_enroll,
            });
        }
        if self.total_waiting < 0 {
            return Err(InvalidFactor::NegativeCount {
                field: "total_waiting",
                value: self.total_waiting,
            });
        }
        if self.queue_position < 0 {
            return Err(InvalidFactor::NegativeCount {
                field: "queue_position",
                value: self.queue_position,
            });
        }
        if !self.historical_to_rate.is_finite() || self.historical_to_rate < 0.0 {
            return Err(InvalidFactor::TurnoverRate(self.historical_to_rate));
        }
        if !self.bonus_points.is_finite() || self.bonus_points < 0.0 {
            return Err(InvalidFactor::BonusPoints(self.bonus_points));
        }
        if self.priority < 1 {
            return Err(InvalidFactor::Priority(self.priority));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidFactor {
    #[error("{field} must not be negative (got {value})")]
    NegativeCount { field: &'static str, value: i64 },
    #[error("historical turnover rate must be a non-negative number (got {0})")]
    TurnoverRate(f64),
    #[error("bonus points must be a non-negative number (got {0})")]
    BonusPoints(f64),
    #[error("priority must be 1 or greater (got {0})")]
    Priority(i64),
}
