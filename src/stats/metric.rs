//! Derived values that may be undefined, and the errors of the metric stage.

use crate::data::PopulationGroup;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("Date range is inverted: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("No severity signal: deaths, ICU and hospitalised all sum to zero")]
    NoSeveritySignal,
    #[error("Group '{group}' has {count} defined observations, at least 2 are needed")]
    InsufficientObservations { group: PopulationGroup, count: usize },
    #[error("Group '{group}' has zero variance")]
    ZeroVariance { group: PopulationGroup },
    #[error("Moving average window must be at least 1")]
    InvalidWindow,
    #[error("LOESS fraction {0} must lie in (0, 1] and cover at least 2 points")]
    InvalidBandwidth(f64),
}

/// Why a derived value could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UndefinedReason {
    /// No population/area constants for this year and group.
    UnknownYear { year: i32 },
    /// The input value was itself undefined.
    UndefinedInput,
}

/// A derived number, or an explicit marker that it does not exist.
/// A defined zero and `Undefined` are never conflated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Defined(f64),
    Undefined(UndefinedReason),
}

impl Metric {
    pub fn value(&self) -> Option<f64> {
        match self {
            Metric::Defined(v) => Some(*v),
            Metric::Undefined(_) => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Metric::Defined(_))
    }
}

/// Inclusive calendar window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, MetricError> {
        if start > end {
            return Err(MetricError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}
