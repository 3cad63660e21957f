use serde::{Deserialize, Serialize};

use super::config::GradeThresholds;

/// Ordinal admission grade. Declaration order runs best to worst, so `A < F`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Grade {
    /// Grades that carry a threshold, in scan order.
    const RANKED: [Grade; 5] = [Grade::A, Grade::B, Grade::C, Grade::D, Grade::E];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
            Grade::F => "F",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::A => "Very high",
            Grade::B => "High",
            Grade::C => "Moderate",
            Grade::D => "Low",
            Grade::E => "Very low",
            Grade::F => "Extremely low",
        }
    }

    pub fn is_at_least(&self, other: Grade) -> bool {
        *self <= other
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GradeThresholds {
    /// First grade whose minimum the probability meets, scanning A to E.
    pub fn classify(&self, probability: f64) -> Grade {
        Grade::RANKED
            .iter()
            .zip(self.minimums.iter())
            .find(|(_, minimum)| probability >= **minimum)
            .map(|(grade, _)| *grade)
            .unwrap_or(Grade::F)
    }
}
