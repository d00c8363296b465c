//! CSV Data Loader Module
//! Reads the raw dataset with Polars and types the declared columns strictly.

use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// ISO calendar date, the only date format the dataset uses.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("Column '{0}' is declared in the schema but missing from the input")]
    MissingColumn(String),
    #[error("Malformed input at line {line}, column '{column}': '{value}' is not a valid {expected}")]
    MalformedInput {
        line: usize,
        column: String,
        value: String,
        expected: ColumnType,
    },
}

/// Declared type of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Date,
    Float,
    Integer,
    String,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Date => "date",
            ColumnType::Float => "float",
            ColumnType::Integer => "integer",
            ColumnType::String => "string",
        };
        f.write_str(name)
    }
}

/// Column name -> declared type. Columns not named here are kept as strings.
#[derive(Debug, Clone, Default)]
pub struct ColumnSchema {
    columns: BTreeMap<String, ColumnType>,
}

impl ColumnSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.insert(name.into(), column_type);
        self
    }

    pub fn get(&self, name: &str) -> Option<ColumnType> {
        self.columns.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.columns.iter().map(|(name, ty)| (name.as_str(), *ty))
    }
}

/// Loads the dataset with Polars, then applies the declared schema.
pub struct DataLoader {
    schema: ColumnSchema,
    file_path: Option<PathBuf>,
}

impl DataLoader {
    pub fn new(schema: ColumnSchema) -> Self {
        Self {
            schema,
            file_path: None,
        }
    }

    /// Load a CSV file. Every cell is first read as text so that typing
    /// errors can be reported with their line and column.
    pub fn load_csv(&mut self, file_path: &Path) -> Result<DataFrame, LoaderError> {
        self.file_path = Some(file_path.to_path_buf());
        log::info!("Loading dataset from {}", file_path.display());

        let raw = LazyCsvReader::new(file_path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()?
            .collect()?;

        log::debug!("Read {} rows x {} columns", raw.height(), raw.width());
        self.type_frame(&raw)
    }

    /// Apply the schema to an all-text frame.
    pub fn type_frame(&self, raw: &DataFrame) -> Result<DataFrame, LoaderError> {
        for (name, _) in self.schema.iter() {
            if raw.column(name).is_err() {
                return Err(LoaderError::MissingColumn(name.to_string()));
            }
        }

        let columns = raw
            .get_columns()
            .iter()
            .map(|column| match self.schema.get(column.name().as_str()) {
                Some(column_type) => Self::type_column(column, column_type),
                None => Ok(column.clone()),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DataFrame::new(columns)?)
    }

    fn type_column(column: &Column, column_type: ColumnType) -> Result<Column, LoaderError> {
        let name = column.name().clone();
        let text = column.cast(&DataType::String)?;
        let values = text.str()?;

        let malformed = |row: usize, value: &str| LoaderError::MalformedInput {
            // header is line 1
            line: row + 2,
            column: name.to_string(),
            value: value.to_string(),
            expected: column_type,
        };

        let cells = values
            .into_iter()
            .map(|cell| cell.map(str::trim).filter(|s| !s.is_empty()));

        let typed = match column_type {
            ColumnType::Date => {
                let dates = cells
                    .enumerate()
                    .map(|(row, cell)| {
                        let cell = cell.ok_or_else(|| malformed(row, ""))?;
                        NaiveDate::parse_from_str(cell, DATE_FORMAT)
                            .map_err(|_| malformed(row, cell))
                    })
                    .collect::<Result<Vec<NaiveDate>, _>>()?;
                Column::new(name.clone(), dates)
            }
            ColumnType::Float => {
                let floats = cells
                    .enumerate()
                    .map(|(row, cell)| {
                        cell.map(|s| {
                            s.parse::<f64>()
                                .ok()
                                .filter(|v| v.is_finite())
                                .ok_or_else(|| malformed(row, s))
                        })
                        .transpose()
                    })
                    .collect::<Result<Vec<Option<f64>>, _>>()?;
                Column::new(name.clone(), floats)
            }
            ColumnType::Integer => {
                let ints = cells
                    .enumerate()
                    .map(|(row, cell)| {
                        cell.map(|s| s.parse::<i64>().map_err(|_| malformed(row, s)))
                            .transpose()
                    })
                    .collect::<Result<Vec<Option<i64>>, _>>()?;
                Column::new(name.clone(), ints)
            }
            ColumnType::String => {
                let strings: Vec<Option<&str>> = cells.collect();
                Column::new(name.clone(), strings)
            }
        };

        Ok(typed)
    }

    /// Get file path of the last load.
    pub fn get_file_path(&self) -> Option<&PathBuf> {
        self.file_path.as_ref()
    }
}
