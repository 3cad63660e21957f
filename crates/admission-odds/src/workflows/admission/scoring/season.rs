use super::config::SeasonalTable;

impl SeasonalTable {
    /// Multiplier for a calendar month (1 = January). Unknown months are neutral.
    pub fn multiplier(&self, month: u32) -> f64 {
        month
            .checked_sub(1)
            .and_then(|index| self.multipliers.get(index as usize))
            .copied()
            .unwrap_or(1.0)
    }

    /// Apply the month's multiplier to a raw total and bring it into `[0, 100]`,
    /// rounded to one decimal.
    pub fn adjust(&self, raw_total: f64, month: u32) -> f64 {
        let adjusted = raw_total * self.multiplier(month);
        if adjusted.is_nan() {
            return 0.0;
        }
        round_one_decimal(adjusted.clamp(0.0, 100.0))
    }
}

/// Round half-up to one decimal place.
pub(crate) fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0 + 0.5).floor() / 10.0
}
