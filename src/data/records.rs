//! Typed daily records extracted from the cleaned table.

use crate::data::cleaner::ImputationMask;
use crate::data::loader::{ColumnSchema, ColumnType};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column '{0}' is missing from the cleaned table")]
    MissingColumn(String),
    #[error("Row {row} has no date")]
    MissingDate { row: usize },
    #[error("Date {0} appears more than once")]
    DuplicateDate(NaiveDate),
    #[error("Column '{column}' on {date} holds {value}, which is not a whole count in 0..=2^53")]
    InvalidCount {
        date: NaiveDate,
        column: String,
        value: f64,
    },
}

/// Largest count a float column holds exactly (2^53).
pub const MAX_EXACT_COUNT: f64 = 9_007_199_254_740_992.0;

/// The two population groups compared throughout the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopulationGroup {
    Dormitory,
    Community,
}

impl PopulationGroup {
    pub const ALL: [PopulationGroup; 2] = [PopulationGroup::Dormitory, PopulationGroup::Community];
}

impl fmt::Display for PopulationGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PopulationGroup::Dormitory => f.write_str("dormitory"),
            PopulationGroup::Community => f.write_str("community"),
        }
    }
}

/// Numeric fields of a daily record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Dormitory,
    Community,
    Deaths,
    Icu,
    Hospitalised,
    VaccinatedOneDose,
    VaccinatedFull,
}

impl Measure {
    pub const ALL: [Measure; 7] = [
        Measure::Dormitory,
        Measure::Community,
        Measure::Deaths,
        Measure::Icu,
        Measure::Hospitalised,
        Measure::VaccinatedOneDose,
        Measure::VaccinatedFull,
    ];

    pub fn is_count(self) -> bool {
        !matches!(self, Measure::VaccinatedOneDose | Measure::VaccinatedFull)
    }
}

/// Header names of the dataset columns the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetColumns {
    pub date: String,
    pub dormitory: String,
    pub community: String,
    pub deaths: String,
    pub icu: String,
    pub hospitalised: String,
    pub vaccinated_one_dose: String,
    pub vaccinated_full: String,
    pub phase: Option<String>,
}

impl Default for DatasetColumns {
    fn default() -> Self {
        Self {
            date: "Date".into(),
            dormitory: "Local cases residing in dorms MOH report".into(),
            community: "Local cases not residing in doms MOH report".into(),
            deaths: "Daily Deaths".into(),
            icu: "Intensive Care Unit (ICU)".into(),
            hospitalised: "Still Hospitalised".into(),
            vaccinated_one_dose: "Perc population completed at least one dose".into(),
            vaccinated_full: "Perc population completed vaccination".into(),
            phase: Some("Phase".into()),
        }
    }
}

impl DatasetColumns {
    pub fn column(&self, measure: Measure) -> &str {
        match measure {
            Measure::Dormitory => &self.dormitory,
            Measure::Community => &self.community,
            Measure::Deaths => &self.deaths,
            Measure::Icu => &self.icu,
            Measure::Hospitalised => &self.hospitalised,
            Measure::VaccinatedOneDose => &self.vaccinated_one_dose,
            Measure::VaccinatedFull => &self.vaccinated_full,
        }
    }

    /// Loader schema: counts are strict integers, vaccination columns stay text
    /// for the Cleaner to coerce. The phase column is optional and undeclared.
    pub fn schema(&self) -> ColumnSchema {
        let mut schema = ColumnSchema::new().with_column(&self.date, ColumnType::Date);
        for measure in Measure::ALL {
            let column_type = if measure.is_count() {
                ColumnType::Integer
            } else {
                ColumnType::String
            };
            schema = schema.with_column(self.column(measure), column_type);
        }
        schema
    }
}

/// One calendar day of the dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub dormitory: u64,
    pub community: u64,
    pub deaths: u64,
    pub icu: u64,
    pub hospitalised: u64,
    pub vaccinated_one_dose_pct: f64,
    pub vaccinated_full_pct: f64,
    pub phase: Option<String>,
    /// Fields whose value is a synthetic zero.
    pub imputed: BTreeSet<Measure>,
}

impl DailyRecord {
    /// A record with every count zero and nothing imputed.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            dormitory: 0,
            community: 0,
            deaths: 0,
            icu: 0,
            hospitalised: 0,
            vaccinated_one_dose_pct: 0.0,
            vaccinated_full_pct: 0.0,
            phase: None,
            imputed: BTreeSet::new(),
        }
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn cases(&self, group: PopulationGroup) -> u64 {
        match group {
            PopulationGroup::Dormitory => self.dormitory,
            PopulationGroup::Community => self.community,
        }
    }

    pub fn is_imputed(&self, measure: Measure) -> bool {
        self.imputed.contains(&measure)
    }

    /// Extract date-sorted records from a cleaned table.
    pub fn from_frame(
        df: &DataFrame,
        columns: &DatasetColumns,
        imputed: &ImputationMask,
    ) -> Result<Vec<DailyRecord>, RecordError> {
        let dates: Vec<Option<NaiveDate>> = Self::column(df, &columns.date)?
            .date()?
            .as_date_iter()
            .collect();

        let mut records: Vec<DailyRecord> = dates
            .into_iter()
            .enumerate()
            .map(|(row, date)| date.map(DailyRecord::new).ok_or(RecordError::MissingDate { row }))
            .collect::<Result<Vec<_>, _>>()?;

        for measure in Measure::ALL {
            let name = columns.column(measure);
            let values = Self::column(df, name)?.cast(&DataType::Float64)?;
            for (row, value) in values.f64()?.into_iter().enumerate() {
                let value = value.unwrap_or(0.0);
                let record = &mut records[row];
                if imputed.is_imputed(name, row) {
                    record.imputed.insert(measure);
                }
                if measure.is_count() {
                    let count = Self::to_count(value).ok_or_else(|| RecordError::InvalidCount {
                        date: record.date,
                        column: name.to_string(),
                        value,
                    })?;
                    record.set_count(measure, count);
                } else {
                    if !(0.0..=100.0).contains(&value) {
                        log::warn!(
                            "'{name}' on {} is {value}, outside 0-100",
                            record.date
                        );
                    }
                    record.set_percentage(measure, value);
                }
            }
        }

        if let Some(phase) = &columns.phase {
            // a phase header absent from the file just means no labels
            if let Ok(column) = df.column(phase) {
                let labels = column.cast(&DataType::String)?;
                for (record, label) in records.iter_mut().zip(labels.str()?.into_iter()) {
                    record.phase = label
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string);
                }
            }
        }

        records.sort_by_key(|r| r.date);
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.date) {
                return Err(RecordError::DuplicateDate(record.date));
            }
        }

        log::debug!("Extracted {} daily records", records.len());
        Ok(records)
    }

    fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, RecordError> {
        df.column(name)
            .map_err(|_| RecordError::MissingColumn(name.to_string()))
    }

    fn to_count(value: f64) -> Option<u64> {
        let whole = value.is_finite() && value.fract() == 0.0;
        (whole && (0.0..=MAX_EXACT_COUNT).contains(&value)).then_some(value as u64)
    }

    fn set_count(&mut self, measure: Measure, count: u64) {
        match measure {
            Measure::Dormitory => self.dormitory = count,
            Measure::Community => self.community = count,
            Measure::Deaths => self.deaths = count,
            Measure::Icu => self.icu = count,
            Measure::Hospitalised => self.hospitalised = count,
            Measure::VaccinatedOneDose | Measure::VaccinatedFull => {}
        }
    }

    fn set_percentage(&mut self, measure: Measure, pct: f64) {
        match measure {
            Measure::VaccinatedOneDose => self.vaccinated_one_dose_pct = pct,
            Measure::VaccinatedFull => self.vaccinated_full_pct = pct,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cleaner::DataCleaner;
    use crate::data::loader::{DataLoader, LoaderError};

    fn columns() -> DatasetColumns {
        DatasetColumns {
            date: "Date".into(),
            dormitory: "Dorm".into(),
            community: "Comm".into(),
            deaths: "Deaths".into(),
            icu: "ICU".into(),
            hospitalised: "Hosp".into(),
            vaccinated_one_dose: "One".into(),
            vaccinated_full: "Full".into(),
            phase: Some("Phase".into()),
        }
    }

    fn load(raw: DataFrame) -> Result<Vec<DailyRecord>, RecordError> {
        let columns = columns();
        let typed = DataLoader::new(columns.schema()).type_frame(&raw).unwrap();
        let coerce = vec![columns.vaccinated_one_dose.clone(), columns.vaccinated_full.clone()];
        let cleaned = DataCleaner::clean(&typed, &coerce).unwrap();
        DailyRecord::from_frame(&cleaned.df, &columns, &cleaned.imputed)
    }

    #[test]
    fn extracts_sorted_records_with_imputed_flags() {
        let raw = df!(
            "Date" => &["2020-04-02", "2020-04-01"],
            "Dorm" => &[Some("7"), None],
            "Comm" => &["1", "2"],
            "Deaths" => &["0", "0"],
            "ICU" => &["3", "4"],
            "Hosp" => &["10", "11"],
            "One" => &[Some("1.5"), None],
            "Full" => &["0.5", "0.25"],
            "Phase" => &[Some("Circuit Breaker"), None]
        )
        .unwrap();

        let records = load(raw).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2020, 4, 1).unwrap());
        assert_eq!(records[0].dormitory, 0);
        assert!(records[0].is_imputed(Measure::Dormitory));
        assert!(records[0].is_imputed(Measure::VaccinatedOneDose));
        assert_eq!(records[0].phase, None);

        assert_eq!(records[1].dormitory, 7);
        assert!(!records[1].is_imputed(Measure::Dormitory));
        assert_eq!(records[1].vaccinated_one_dose_pct, 1.5);
        assert_eq!(records[1].phase.as_deref(), Some("Circuit Breaker"));
        assert_eq!(records[1].cases(PopulationGroup::Community), 1);
    }

    fn one_row(dorm: &str, one: &str) -> DataFrame {
        df!(
            "Date" => &["2020-04-01"],
            "Dorm" => &[dorm],
            "Comm" => &["1"],
            "Deaths" => &["0"],
            "ICU" => &["0"],
            "Hosp" => &["0"],
            "One" => &[one],
            "Full" => &["0"],
            "Phase" => &["a"]
        )
        .unwrap()
    }

    #[test]
    fn count_columns_are_typed_as_integers() {
        let columns = columns();
        let loader = DataLoader::new(columns.schema());

        let typed = loader.type_frame(&one_row("5", "0")).unwrap();
        assert_eq!(typed.column("Dorm").unwrap().dtype(), &DataType::Int64);

        for bad in ["1.5", "1e20"] {
            match loader.type_frame(&one_row(bad, "0")) {
                Err(LoaderError::MalformedInput {
                    line,
                    column,
                    expected,
                    ..
                }) => {
                    assert_eq!(line, 2);
                    assert_eq!(column, "Dorm");
                    assert_eq!(expected, ColumnType::Integer);
                }
                other => panic!("unexpected result for {bad}: {other:?}"),
            }
        }
    }

    #[test]
    fn counts_beyond_exact_float_range_are_rejected() {
        assert_eq!(DailyRecord::to_count(MAX_EXACT_COUNT), Some(1 << 53));
        assert_eq!(DailyRecord::to_count(1e20), None);
        assert_eq!(DailyRecord::to_count(f64::MAX), None);

        let cleaned = df!(
            "Date" => &[NaiveDate::from_ymd_opt(2020, 4, 1).unwrap()],
            "Dorm" => &[1e20],
            "Comm" => &[1.0],
            "Deaths" => &[0.0],
            "ICU" => &[0.0],
            "Hosp" => &[0.0],
            "One" => &[0.0],
            "Full" => &[0.0]
        )
        .unwrap();
        let err = DailyRecord::from_frame(&cleaned, &columns(), &ImputationMask::default()).unwrap_err();
        assert!(matches!(err, RecordError::InvalidCount { value, .. } if value == 1e20));
    }

    #[test]
    fn null_date_is_reported_by_row() {
        let dates = [None, NaiveDate::from_ymd_opt(2020, 4, 1)];
        let cleaned = DataFrame::new(vec![
            Column::new("Date".into(), &dates),
            Column::new("Dorm".into(), &[0.0, 0.0]),
            Column::new("Comm".into(), &[0.0, 0.0]),
            Column::new("Deaths".into(), &[0.0, 0.0]),
            Column::new("ICU".into(), &[0.0, 0.0]),
            Column::new("Hosp".into(), &[0.0, 0.0]),
            Column::new("One".into(), &[0.0, 0.0]),
            Column::new("Full".into(), &[0.0, 0.0]),
        ])
        .unwrap();
        let err = DailyRecord::from_frame(&cleaned, &columns(), &ImputationMask::default()).unwrap_err();
        assert!(matches!(err, RecordError::MissingDate { row: 0 }));
    }

    #[test]
    fn out_of_range_percentages_are_kept() {
        let records = load(one_row("0", "120")).unwrap();
        assert_eq!(records[0].vaccinated_one_dose_pct, 120.0);
    }

    #[test]
    fn duplicate_dates_are_rejected() {
        let raw = df!(
            "Date" => &["2020-04-01", "2020-04-01"],
            "Dorm" => &["1", "2"],
            "Comm" => &["1", "2"],
            "Deaths" => &["0", "0"],
            "ICU" => &["0", "0"],
            "Hosp" => &["0", "0"],
            "One" => &["0", "0"],
            "Full" => &["0", "0"],
            "Phase" => &["a", "b"]
        )
        .unwrap();

        assert!(matches!(load(raw), Err(RecordError::DuplicateDate(_))));
    }

    #[test]
    fn negative_or_fractional_counts_are_rejected() {
        let raw = df!(
            "Date" => &["2020-04-01"],
            "Dorm" => &["-1"],
            "Comm" => &["1"],
            "Deaths" => &["0"],
            "ICU" => &["0"],
            "Hosp" => &["0"],
            "One" => &["0"],
            "Full" => &["0"],
            "Phase" => &["a"]
        )
        .unwrap();

        match load(raw) {
            Err(RecordError::InvalidCount { column, value, .. }) => {
                assert_eq!(column, "Dorm");
                assert_eq!(value, -1.0);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
