//! Severity scores: log-scaled outcome totals rescaled to 0-100.

use crate::data::DailyRecord;
use crate::stats::metric::{DateRange, MetricError};
use serde::Serialize;

/// Score of the most severe category.
pub const SEVERITY_SCALE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SeverityTotals {
    pub deaths: u64,
    pub icu: u64,
    pub hospitalised: u64,
}

impl SeverityTotals {
    pub fn over(records: &[DailyRecord], range: DateRange) -> Self {
        records
            .iter()
            .filter(|r| range.contains(r.date))
            .fold(Self::default(), |acc, r| Self {
                deaths: acc.deaths.saturating_add(r.deaths),
                icu: acc.icu.saturating_add(r.icu),
                hospitalised: acc.hospitalised.saturating_add(r.hospitalised),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeverityScores {
    pub totals: SeverityTotals,
    pub deaths: f64,
    pub icu: f64,
    pub hospitalised: f64,
}

impl SeverityScores {
    /// ln(1 + x) per category, divided by the largest and scaled to 100.
    pub fn from_totals(totals: SeverityTotals) -> Result<Self, MetricError> {
        let logs = [
            (totals.deaths as f64).ln_1p(),
            (totals.icu as f64).ln_1p(),
            (totals.hospitalised as f64).ln_1p(),
        ];
        let max = logs.iter().copied().fold(0.0_f64, f64::max);
        if max == 0.0 {
            return Err(MetricError::NoSeveritySignal);
        }

        Ok(Self {
            totals,
            deaths: logs[0] / max * SEVERITY_SCALE,
            icu: logs[1] / max * SEVERITY_SCALE,
            hospitalised: logs[2] / max * SEVERITY_SCALE,
        })
    }

    pub fn over(records: &[DailyRecord], range: DateRange) -> Result<Self, MetricError> {
        Self::from_totals(SeverityTotals::over(records, range))
    }
}
