//! Data module - CSV loading, cleaning and typed records

mod cleaner;
mod loader;
mod records;

pub use cleaner::{CleanedTable, CleanerError, CleaningReport, DataCleaner, ImputationMask};
pub use loader::{ColumnSchema, ColumnType, DataLoader, LoaderError, DATE_FORMAT};
pub use records::{DailyRecord, DatasetColumns, Measure, PopulationGroup, RecordError};
