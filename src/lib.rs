//! Singapore COVID-19 Report - case data pipeline and static charts
//!
//! Loads the daily case dataset, cleans it, derives density-adjusted
//! metrics and phase annotations, and renders the report charts.

pub mod charts;
pub mod config;
pub mod data;
pub mod phase;
pub mod pipeline;
pub mod stats;

pub use config::{PipelineConfig, Settings};
pub use pipeline::{ReportPipeline, ReportTables};
