use serde::{Deserialize, Serialize};

use super::season::round_one_decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

impl TrendDirection {
    pub fn label(&self) -> &'static str {
        match self {
            TrendDirection::Up => "up",
            TrendDirection::Down => "down",
            TrendDirection::Stable => "stable",
        }
    }
}

/// Movement of the probability since the previous snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    /// Percentage points, rounded to one decimal.
    pub delta: f64,
    pub direction: TrendDirection,
    pub period: String,
}

pub(crate) fn calculate_trend(
    current: f64,
    previous: f64,
    dead_zone: f64,
    period: &str,
) -> TrendResult {
    let delta = round_one_decimal(current - previous);
    let direction = if delta > dead_zone {
        TrendDirection::Up
    } else if delta < -dead_zone {
        TrendDirection::Down
    } else {
        TrendDirection::Stable
    };

    TrendResult {
        delta,
        direction,
        period: period.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_zone_edges_are_stable() {
        assert_eq!(
            calculate_trend(71.0, 70.0, 1.0, "30d").direction,
            TrendDirection::Stable
        );
        assert_eq!(
            calculate_trend(69.0, 70.0, 1.0, "30d").direction,
            TrendDirection::Stable
        );
        assert_eq!(
            calculate_trend(71.1, 70.0, 1.0, "30d").direction,
            TrendDirection::Up
        );
    }

    #[test]
    fn serializes_direction_in_lowercase() {
        let trend = calculate_trend(70.0, 65.0, 1.0, "30d");
        let json = serde_json::to_value(&trend).expect("serializes");
        assert_eq!(json["direction"], "up");
        assert_eq!(json["period"], "30d");
    }
}
