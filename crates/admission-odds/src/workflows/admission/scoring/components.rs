use serde::{Deserialize, Serialize};

use super::config::ScoringConfig;
use super::factors::Factors;

/// Points contributed by each factor, before the seasonal adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityBreakdown {
    pub position_score: f64,
    pub vacancy_score: f64,
    pub to_score: f64,
    pub priority_score: f64,
    pub bonus_score: f64,
}

impl ProbabilityBreakdown {
    pub fn raw_total(&self) -> f64 {
        self.position_score
            + self.vacancy_score
            + self.to_score
            + self.priority_score
            + self.bonus_score
    }
}

pub(crate) fn score_components(factors: &Factors, config: &ScoringConfig) -> ProbabilityBreakdown {
    let weights = &config.weights;

    ProbabilityBreakdown {
        position_score: position_ratio(factors.queue_position, factors.total_waiting)
            * weights.position,
        vacancy_score: vacancy_ratio(factors.class_capacity, factors.current_enroll)
            * weights.vacancy,
        to_score: capped(
            factors.historical_to_rate * config.turnover_scale,
            weights.turnover,
        ),
        priority_score: match factors.priority {
            1 => config.priority_tiers.first_choice,
            2 => config.priority_tiers.second_choice,
            _ => config.priority_tiers.other,
        },
        bonus_score: capped(factors.bonus_points * config.bonus_scale, weights.bonus),
    }
}

/// Fraction of the waitlist behind the applicant. An empty waitlist counts as the front.
fn position_ratio(queue_position: i64, total_waiting: i64) -> f64 {
    if total_waiting <= 0 {
        return 1.0;
    }
    (1.0 - queue_position as f64 / total_waiting as f64).clamp(0.0, 1.0)
}

fn vacancy_ratio(capacity: i64, current_enroll: i64) -> f64 {
    let open_seats = capacity.saturating_sub(current_enroll).max(0);
    (open_seats as f64 / capacity.max(1) as f64).clamp(0.0, 1.0)
}

fn capped(value: f64, cap: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.max(0.0).min(cap.max(0.0))
}
