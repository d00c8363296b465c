//! Pipeline configuration: dataset headers, density constants, phase
//! timeline and report window, read from TOML.

use crate::data::{DatasetColumns, PopulationGroup};
use crate::phase::{PhaseInterval, PhaseTimeline, TimelineError};
use crate::stats::{DateRange, DensityConstants, DensityTable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Built-in configuration for the Singapore dataset.
pub const DEFAULT_CONFIG: &str = include_str!("../config/singapore.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Density constants for {group} in {year} are given twice")]
    DuplicateDensity { year: i32, group: PopulationGroup },
    #[error("Density constants for {group} in {year} need a positive population and area")]
    InvalidDensity { year: i32, group: PopulationGroup },
    #[error("Invalid phase timeline: {0}")]
    Timeline(#[from] TimelineError),
    #[error("Invalid report settings: {0}")]
    InvalidReport(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityEntry {
    pub year: i32,
    pub group: PopulationGroup,
    pub population: u64,
    pub land_area_km2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default = "default_moving_average_window")]
    pub moving_average_window: usize,
    #[serde(default = "default_loess_fraction")]
    pub loess_fraction: f64,
}

fn default_moving_average_window() -> usize {
    7
}

fn default_loess_fraction() -> f64 {
    0.3
}

/// Raw TOML document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub columns: DatasetColumns,
    /// Columns the Cleaner must coerce to numbers.
    #[serde(default)]
    pub coerce: Vec<String>,
    #[serde(default)]
    pub density: Vec<DensityEntry>,
    pub phases: Vec<PhaseInterval>,
    pub report: ReportSettings,
}

/// Configuration after validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub columns: DatasetColumns,
    pub coerce: Vec<String>,
    pub density: DensityTable,
    pub timeline: PhaseTimeline,
    pub window: DateRange,
    pub moving_average_window: usize,
    pub loess_fraction: f64,
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        log::info!("Reading config {}", path.display());
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    pub fn density_table(&self) -> Result<DensityTable, ConfigError> {
        let mut table = DensityTable::new();
        for entry in &self.density {
            let valid = entry.population > 0
                && entry.land_area_km2.is_finite()
                && entry.land_area_km2 > 0.0;
            if !valid {
                return Err(ConfigError::InvalidDensity {
                    year: entry.year,
                    group: entry.group,
                });
            }
            let constants = DensityConstants {
                population: entry.population,
                land_area_km2: entry.land_area_km2,
            };
            if table.insert(entry.year, entry.group, constants).is_some() {
                return Err(ConfigError::DuplicateDensity {
                    year: entry.year,
                    group: entry.group,
                });
            }
        }
        Ok(table)
    }

    /// Validate everything up front.
    pub fn validate(self) -> Result<Settings, ConfigError> {
        let density = self.density_table()?;
        let timeline = PhaseTimeline::new(self.phases)?;

        let window = DateRange::new(self.report.start, self.report.end)
            .map_err(|e| ConfigError::InvalidReport(e.to_string()))?;
        if self.report.moving_average_window == 0 {
            return Err(ConfigError::InvalidReport(
                "moving_average_window must be at least 1".into(),
            ));
        }
        let fraction = self.report.loess_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ConfigError::InvalidReport(format!(
                "loess_fraction {fraction} must lie in (0, 1]"
            )));
        }

        log::debug!(
            "Config: {} density years, {} phases",
            density.years().count(),
            timeline.intervals().len()
        );

        Ok(Settings {
            columns: self.columns,
            coerce: self.coerce,
            density,
            timeline,
            window,
            moving_average_window: self.report.moving_average_window,
            loess_fraction: fraction,
        })
    }
}
