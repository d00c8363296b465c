//! Report pipeline: Loader -> Cleaner -> records -> Phase Annotator -> metrics.
//!
//! One run is fully isolated: it reads the source once and returns fresh
//! tables. Nothing is kept between runs.

use crate::config::Settings;
use crate::data::{
    CleanerError, CleaningReport, DailyRecord, DataCleaner, DataLoader, LoaderError,
    PopulationGroup, RecordError,
};
use crate::stats::{
    aggregate_monthly, density_rates, DailyRates, GroupZScores, GroupedValue, MetricError,
    MonthlyAggregate, SeverityScores, ZScoreCalculator, ZScoreTable,
};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    Cleaner(#[from] CleanerError),
    #[error(transparent)]
    Records(#[from] RecordError),
}

/// Everything the pipeline derives, handed to the renderer.
#[derive(Debug, Clone)]
pub struct ReportTables {
    pub cleaned: DataFrame,
    pub cleaning: CleaningReport,
    /// Date-sorted, phase-annotated daily records.
    pub records: Vec<DailyRecord>,
    pub daily_rates: Vec<DailyRates>,
    pub monthly: Vec<MonthlyAggregate>,
    pub severity: Result<SeverityScores, MetricError>,
    pub zscores: ZScoreTable,
    /// Window dates; each group's `scores[i]` belongs to `zscore_dates[i]`.
    pub zscore_dates: Vec<chrono::NaiveDate>,
}

/// JSON view of [`ReportTables`]; failed metrics become their error text.
#[derive(Debug, Serialize)]
pub struct ReportSummary<'a> {
    pub cleaning: &'a CleaningReport,
    pub records: usize,
    pub monthly: &'a [MonthlyAggregate],
    pub severity: Result<&'a SeverityScores, String>,
    pub zscores: BTreeMap<PopulationGroup, Result<&'a GroupZScores, String>>,
}

impl ReportTables {
    pub fn summary(&self) -> ReportSummary<'_> {
        ReportSummary {
            cleaning: &self.cleaning,
            records: self.records.len(),
            monthly: &self.monthly,
            severity: self.severity.as_ref().map_err(ToString::to_string),
            zscores: self
                .zscores
                .iter()
                .map(|(group, z)| (*group, z.as_ref().map_err(ToString::to_string)))
                .collect(),
        }
    }
}

pub struct ReportPipeline {
    settings: Settings,
}

impl ReportPipeline {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn run(&self, path: &Path) -> Result<ReportTables, PipelineError> {
        let mut loader = DataLoader::new(self.settings.columns.schema());
        let typed = loader.load_csv(path)?;
        self.run_typed(&typed)
    }

    /// Run from an all-text frame, as read from CSV.
    pub fn run_frame(&self, raw: &DataFrame) -> Result<ReportTables, PipelineError> {
        let typed = DataLoader::new(self.settings.columns.schema()).type_frame(raw)?;
        self.run_typed(&typed)
    }

    fn run_typed(&self, typed: &DataFrame) -> Result<ReportTables, PipelineError> {
        let settings = &self.settings;

        let cleaned = DataCleaner::clean(typed, &settings.coerce)?;
        let records = DailyRecord::from_frame(&cleaned.df, &settings.columns, &cleaned.imputed)?;
        let records = settings.timeline.annotate(&records);
        log::info!("{} daily records after cleaning", records.len());

        let daily_rates = density_rates(&records, &settings.density);
        let monthly = aggregate_monthly(&records, settings.window, &settings.density);

        let severity = SeverityScores::over(&records, settings.window);
        if let Err(err) = &severity {
            log::warn!("Severity scores unavailable: {err}");
        }

        let windowed: Vec<&DailyRates> = daily_rates
            .iter()
            .filter(|r| settings.window.contains(r.date))
            .collect();
        let grouped: Vec<GroupedValue> = windowed
            .iter()
            .flat_map(|r| {
                PopulationGroup::ALL.map(|group| GroupedValue {
                    group,
                    value: r.get(group),
                })
            })
            .collect();
        let zscores = ZScoreCalculator::compute_all(&grouped);
        let zscore_dates = windowed.iter().map(|r| r.date).collect();

        Ok(ReportTables {
            cleaned: cleaned.df,
            cleaning: cleaned.report,
            records,
            daily_rates,
            monthly,
            severity,
            zscores,
            zscore_dates,
        })
    }
}
