//! Data Cleaner Module
//! Coerces designated columns to numeric and replaces missing numbers with zero.

use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CleanerError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column '{0}' is designated numeric but missing from the table")]
    MissingColumn(String),
}

/// Data-quality counters gathered while cleaning. Reporting only, never gating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    /// Nulls present in numeric columns before any zero was written.
    pub missing_before: usize,
    /// Zero-valued cells across numeric columns after cleaning.
    pub zeros_after: usize,
    /// Non-empty values that could not be read as a number, per column.
    pub coercion_failures: BTreeMap<String, usize>,
}

/// Per-column flags marking the cells whose zero was synthesised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImputationMask {
    columns: BTreeMap<String, Vec<bool>>,
}

impl ImputationMask {
    pub fn is_imputed(&self, column: &str, row: usize) -> bool {
        self.columns
            .get(column)
            .and_then(|flags| flags.get(row))
            .copied()
            .unwrap_or(false)
    }

    pub fn imputed_count(&self, column: &str) -> usize {
        self.columns
            .get(column)
            .map(|flags| flags.iter().filter(|f| **f).count())
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.columns
            .values()
            .map(|flags| flags.iter().filter(|f| **f).count())
            .sum()
    }
}

/// Output of [`DataCleaner::clean`]. The input frame is left untouched.
#[derive(Debug, Clone)]
pub struct CleanedTable {
    pub df: DataFrame,
    pub imputed: ImputationMask,
    pub report: CleaningReport,
}

/// Handles missing-value policy: a missing count is treated as zero reported.
pub struct DataCleaner;

impl DataCleaner {
    /// Clean a typed table.
    ///
    /// `coerce` names columns that must end up numeric. Text values in them are
    /// parsed leniently and every failure is counted instead of raised. Then
    /// every numeric column has its nulls replaced with zero. No row or
    /// column is dropped.
    pub fn clean(df: &DataFrame, coerce: &[String]) -> Result<CleanedTable, CleanerError> {
        let mut report = CleaningReport::default();
        let mut imputed = ImputationMask::default();

        for name in coerce {
            if df.column(name).is_err() {
                return Err(CleanerError::MissingColumn(name.clone()));
            }
        }

        let mut columns = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let name = column.name().to_string();
            let must_coerce = coerce.iter().any(|c| c == &name);

            if !must_coerce && !Self::is_numeric(column.dtype()) {
                columns.push(column.clone());
                continue;
            }

            report.missing_before += column.null_count();

            let numeric = if must_coerce {
                let (coerced, failures) = Self::coerce_to_float(column)?;
                if failures > 0 {
                    log::warn!("{failures} values in '{name}' could not be read as numbers");
                }
                report.coercion_failures.insert(name.clone(), failures);
                coerced
            } else {
                column.clone()
            };

            let series = numeric.as_materialized_series();
            let flags: Vec<bool> = series
                .is_null()
                .into_iter()
                .map(|v| v.unwrap_or(false))
                .collect();
            let filled = series.fill_null(FillNullStrategy::Zero)?;

            report.zeros_after += Self::count_zeros(&filled)?;
            log::debug!(
                "Cleaned '{name}': {} imputed zeros",
                flags.iter().filter(|f| **f).count()
            );

            imputed.columns.insert(name, flags);
            columns.push(Column::from(filled));
        }

        log::info!(
            "Cleaning done: {} missing before, {} zeros after",
            report.missing_before,
            report.zeros_after
        );

        Ok(CleanedTable {
            df: DataFrame::new(columns)?,
            imputed,
            report,
        })
    }

    fn is_numeric(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::Float32
                | DataType::Float64
                | DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }

    /// Returns the Float64 column and how many non-null values failed to parse.
    fn coerce_to_float(column: &Column) -> Result<(Column, usize), CleanerError> {
        if Self::is_numeric(column.dtype()) {
            return Ok((column.cast(&DataType::Float64)?, 0));
        }

        let text = column.cast(&DataType::String)?;
        let mut failures = 0usize;
        let values: Vec<Option<f64>> = text
            .str()?
            .into_iter()
            .map(|cell| {
                let cell = cell.map(str::trim).filter(|s| !s.is_empty())?;
                match cell.parse::<f64>() {
                    Ok(v) if v.is_finite() => Some(v),
                    _ => {
                        failures += 1;
                        None
                    }
                }
            })
            .collect();

        Ok((Column::new(column.name().clone(), values), failures))
    }

    fn count_zeros(series: &Series) -> Result<usize, CleanerError> {
        let floats = series.cast(&DataType::Float64)?;
        Ok(floats
            .f64()?
            .into_iter()
            .flatten()
            .filter(|v| *v == 0.0)
            .count())
    }
}
