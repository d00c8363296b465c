//! Stats module - derived metrics

mod density;
mod metric;
mod monthly;
mod severity;
mod smoothing;
mod zscore;

pub use density::{density_rates, DailyRates, DensityConstants, DensityTable, PER_POPULATION};
pub use metric::{DateRange, Metric, MetricError, UndefinedReason};
pub use monthly::{aggregate_monthly, month_start, MonthlyAggregate};
pub use severity::{SeverityScores, SeverityTotals, SEVERITY_SCALE};
pub use smoothing::{loess, moving_average};
pub use zscore::{GroupZScores, GroupedValue, ZScoreCalculator, ZScoreTable};
