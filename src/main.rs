//! Singapore COVID-19 Report - command line entry point
//!
//! Runs the pipeline over one dataset and writes the report charts.

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use sg_covid_report::charts::StaticChartRenderer;
use sg_covid_report::data::DATE_FORMAT;
use sg_covid_report::stats::DateRange;
use sg_covid_report::{PipelineConfig, ReportPipeline};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sg_covid_report", about = "COVID-19 case data report generator")]
struct Cli {
    /// Input CSV dataset
    #[arg(short, long)]
    input: PathBuf,

    /// TOML configuration (defaults to the built-in Singapore config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory the chart images are written to
    #[arg(short, long, default_value = "charts")]
    output_dir: PathBuf,

    /// Override the report window start (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    start: Option<NaiveDate>,

    /// Override the report window end (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    end: Option<NaiveDate>,

    /// Chart width in pixels
    #[arg(long, default_value_t = 1400, value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,

    /// Chart height in pixels
    #[arg(long, default_value_t = 700, value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,

    /// Skip chart rendering
    #[arg(long)]
    no_render: bool,

    /// Print the derived tables as JSON
    #[arg(long)]
    summary: bool,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| format!("{s}: {e}"))
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::builtin().context("loading built-in config")?,
    };
    let mut settings = config.validate().context("validating config")?;

    if cli.start.is_some() || cli.end.is_some() {
        settings.window = DateRange::new(
            cli.start.unwrap_or(settings.window.start),
            cli.end.unwrap_or(settings.window.end),
        )
        .context("report window")?;
    }
    log::info!(
        "Report window {} .. {}",
        settings.window.start,
        settings.window.end
    );

    let renderer = StaticChartRenderer::new(settings.moving_average_window, settings.loess_fraction)
        .with_size(cli.width, cli.height);
    let pipeline = ReportPipeline::new(settings);
    let tables = pipeline
        .run(&cli.input)
        .with_context(|| format!("processing {}", cli.input.display()))?;

    if cli.summary {
        println!("{}", serde_json::to_string_pretty(&tables.summary())?);
    }

    if !cli.no_render {
        let written = renderer
            .render_all(&tables, &cli.output_dir)
            .context("rendering charts")?;
        log::info!(
            "{} charts written to {}",
            written.len(),
            cli.output_dir.display()
        );
    }

    Ok(())
}
