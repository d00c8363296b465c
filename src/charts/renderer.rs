//! Static Chart Renderer
//! Writes the report charts as PNG files with plotters.
//!
//! Charts:
//! 1. Daily local cases per group with a trailing moving average
//! 2. Monthly case totals, grouped bars per group
//! 3. Severity scores (deaths, ICU, hospitalised) on a 0-100 scale
//! 4. Z-score normalised density rates per group with a LOESS trend

use crate::data::PopulationGroup;
use crate::pipeline::ReportTables;
use crate::stats::{loess, moving_average, Metric, MetricError};
use plotters::prelude::*;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Colors (RGB)
const DORM_COLOR: RGBColor = RGBColor(237, 125, 49); // Dormitory
const COMMUNITY_COLOR: RGBColor = RGBColor(91, 155, 213); // Community
const SEVERITY_COLOR: RGBColor = RGBColor(156, 0, 6);
const TREND_COLOR: RGBColor = RGBColor(64, 64, 64);

const FONT: &str = "sans-serif";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to prepare output: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to draw chart: {0}")]
    Draw(String),
    #[error(transparent)]
    Metric(#[from] MetricError),
}

fn draw_err<E: std::fmt::Display>(err: E) -> RenderError {
    RenderError::Draw(err.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    DailyCases,
    MonthlyCases,
    Severity,
    ZScoreTrend,
}

impl ChartKind {
    pub const ALL: [ChartKind; 4] = [
        ChartKind::DailyCases,
        ChartKind::MonthlyCases,
        ChartKind::Severity,
        ChartKind::ZScoreTrend,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            ChartKind::DailyCases => "daily_cases.png",
            ChartKind::MonthlyCases => "monthly_cases.png",
            ChartKind::Severity => "severity_scores.png",
            ChartKind::ZScoreTrend => "zscore_trend.png",
        }
    }
}

fn group_color(group: PopulationGroup) -> RGBColor {
    match group {
        PopulationGroup::Dormitory => DORM_COLOR,
        PopulationGroup::Community => COMMUNITY_COLOR,
    }
}

fn group_label(group: PopulationGroup) -> &'static str {
    match group {
        PopulationGroup::Dormitory => "Dormitory",
        PopulationGroup::Community => "Community",
    }
}

pub struct StaticChartRenderer {
    width: u32,
    height: u32,
    moving_average_window: usize,
    loess_fraction: f64,
}

impl StaticChartRenderer {
    pub fn new(moving_average_window: usize, loess_fraction: f64) -> Self {
        Self {
            width: 1400,
            height: 700,
            moving_average_window,
            loess_fraction,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Render every chart into `out_dir` in parallel. Charts without data
    /// are skipped; the paths written are returned.
    pub fn render_all(
        &self,
        tables: &ReportTables,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, RenderError> {
        std::fs::create_dir_all(out_dir)?;

        let written: Vec<Option<PathBuf>> = ChartKind::ALL
            .par_iter()
            .map(|&kind| -> Result<Option<PathBuf>, RenderError> {
                let path = out_dir.join(kind.file_name());
                let drawn = match kind {
                    ChartKind::DailyCases => self.draw_daily_cases(tables, &path)?,
                    ChartKind::MonthlyCases => self.draw_monthly_cases(tables, &path)?,
                    ChartKind::Severity => self.draw_severity(tables, &path)?,
                    ChartKind::ZScoreTrend => self.draw_zscore_trend(tables, &path)?,
                };
                if drawn {
                    log::info!("Wrote {}", path.display());
                } else {
                    log::warn!("Skipped {}: nothing to plot", kind.file_name());
                }
                Ok(drawn.then_some(path))
            })
            .collect::<Result<_, _>>()?;

        Ok(written.into_iter().flatten().collect())
    }

    fn draw_daily_cases(&self, tables: &ReportTables, path: &Path) -> Result<bool, RenderError> {
        let records = &tables.records;
        if records.is_empty() {
            return Ok(false);
        }

        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        let series: Vec<(PopulationGroup, Vec<f64>)> = PopulationGroup::ALL
            .iter()
            .map(|&g| (g, records.iter().map(|r| r.cases(g) as f64).collect()))
            .collect();
        let y_max = series
            .iter()
            .flat_map(|(_, v)| v.iter().copied())
            .fold(1.0_f64, f64::max)
            * 1.1;

        let dates: Vec<_> = records.iter().map(|r| r.date).collect();
        let x_label = |x: &f64| {
            dates
                .get(x.round().max(0.0) as usize)
                .map(|d| d.format("%b %Y").to_string())
                .unwrap_or_default()
        };

        let mut chart = ChartBuilder::on(&root)
            .caption("Daily Local Cases: Dormitory vs Community", (FONT, 28))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0f64..records.len() as f64, 0f64..y_max)
            .map_err(draw_err)?;

        chart
            .configure_mesh()
            .x_labels(12)
            .x_label_formatter(&x_label)
            .y_desc("Cases")
            .draw()
            .map_err(draw_err)?;

        for (group, values) in &series {
            let color = group_color(*group);
            chart
                .draw_series(LineSeries::new(
                    values.iter().enumerate().map(|(i, v)| (i as f64, *v)),
                    &color.mix(0.35),
                ))
                .map_err(draw_err)?;

            let smoothed = moving_average(values, self.moving_average_window)?;
            chart
                .draw_series(LineSeries::new(
                    smoothed
                        .iter()
                        .enumerate()
                        .filter_map(|(i, v)| v.map(|v| (i as f64, v))),
                    color.stroke_width(2),
                ))
                .map_err(draw_err)?
                .label(format!(
                    "{} ({}-day average)",
                    group_label(*group),
                    self.moving_average_window
                ))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(draw_err)?;
        root.present().map_err(draw_err)?;
        Ok(true)
    }

    fn draw_monthly_cases(&self, tables: &ReportTables, path: &Path) -> Result<bool, RenderError> {
        let monthly = &tables.monthly;
        if monthly.is_empty() {
            return Ok(false);
        }

        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        let y_max = monthly
            .iter()
            .map(|m| m.dormitory.max(m.community) as f64)
            .fold(1.0_f64, f64::max)
            * 1.1;

        let x_label = |x: &f64| {
            monthly
                .get(x.floor().max(0.0) as usize)
                .map(|m| m.month.format("%b %y").to_string())
                .unwrap_or_default()
        };

        let mut chart = ChartBuilder::on(&root)
            .caption("Monthly Local Cases", (FONT, 28))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(70)
            .build_cartesian_2d(0f64..monthly.len() as f64, 0f64..y_max)
            .map_err(draw_err)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(monthly.len().min(24))
            .x_label_formatter(&x_label)
            .y_desc("Cases")
            .draw()
            .map_err(draw_err)?;

        for (slot, group) in PopulationGroup::ALL.iter().enumerate() {
            let color = group_color(*group);
            let offset = 0.1 + slot as f64 * 0.4;
            chart
                .draw_series(monthly.iter().enumerate().map(|(i, m)| {
                    let x = i as f64 + offset;
                    Rectangle::new([(x, 0.0), (x + 0.4, m.cases(*group) as f64)], color.filled())
                }))
                .map_err(draw_err)?
                .label(group_label(*group))
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.filled()));
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(draw_err)?;
        root.present().map_err(draw_err)?;
        Ok(true)
    }

    fn draw_severity(&self, tables: &ReportTables, path: &Path) -> Result<bool, RenderError> {
        let Ok(scores) = &tables.severity else {
            return Ok(false);
        };
        let bars = [
            ("Deaths", scores.deaths, scores.totals.deaths),
            ("ICU", scores.icu, scores.totals.icu),
            ("Hospitalised", scores.hospitalised, scores.totals.hospitalised),
        ];

        let root = BitMapBackend::new(path, (self.width / 2, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        let x_label = |x: &f64| {
            bars.get(x.floor().max(0.0) as usize)
                .map(|(name, _, _)| name.to_string())
                .unwrap_or_default()
        };

        let mut chart = ChartBuilder::on(&root)
            .caption("Severity Score (log-scaled, max = 100)", (FONT, 24))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0f64..bars.len() as f64, 0f64..110f64)
            .map_err(draw_err)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(bars.len() * 2)
            .x_label_formatter(&x_label)
            .y_desc("Score")
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(bars.iter().enumerate().map(|(i, (_, score, _))| {
                let x = i as f64;
                Rectangle::new([(x + 0.2, 0.0), (x + 0.8, *score)], SEVERITY_COLOR.mix(0.8).filled())
            }))
            .map_err(draw_err)?;

        chart
            .draw_series(bars.iter().enumerate().map(|(i, (_, score, total))| {
                Text::new(
                    format!("{total}"),
                    (i as f64 + 0.35, score + 4.0),
                    (FONT, 16).into_font(),
                )
            }))
            .map_err(draw_err)?;

        root.present().map_err(draw_err)?;
        Ok(true)
    }

    fn draw_zscore_trend(&self, tables: &ReportTables, path: &Path) -> Result<bool, RenderError> {
        let groups: Vec<(PopulationGroup, Vec<(f64, f64)>)> = tables
            .zscores
            .iter()
            .filter_map(|(group, z)| z.as_ref().ok().map(|z| (*group, z)))
            .map(|(group, z)| {
                let points: Vec<(f64, f64)> = z
                    .scores
                    .iter()
                    .enumerate()
                    .filter_map(|(i, m)| match m {
                        Metric::Defined(v) => Some((i as f64, *v)),
                        Metric::Undefined(_) => None,
                    })
                    .collect();
                (group, points)
            })
            .filter(|(_, points)| points.len() >= 2)
            .collect();
        if groups.is_empty() {
            return Ok(false);
        }

        let (y_min, y_max) = groups
            .iter()
            .flat_map(|(_, points)| points.iter().map(|(_, y)| *y))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| (lo.min(y), hi.max(y)));
        let pad = ((y_max - y_min) * 0.1).max(0.5);

        let dates = &tables.zscore_dates;
        let x_label = |x: &f64| {
            dates
                .get(x.round().max(0.0) as usize)
                .map(|d| d.format("%b %Y").to_string())
                .unwrap_or_default()
        };

        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Normalised Density-Adjusted Rates (z-score)", (FONT, 28))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0f64..dates.len().max(1) as f64, (y_min - pad)..(y_max + pad))
            .map_err(draw_err)?;

        chart
            .configure_mesh()
            .x_labels(12)
            .x_label_formatter(&x_label)
            .y_desc("z-score")
            .draw()
            .map_err(draw_err)?;

        for (group, points) in &groups {
            let color = group_color(*group);
            chart
                .draw_series(LineSeries::new(points.iter().copied(), &color.mix(0.5)))
                .map_err(draw_err)?
                .label(group_label(*group))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));

            let xs: Vec<f64> = points.iter().map(|(x, _)| *x).collect();
            let ys: Vec<f64> = points.iter().map(|(_, y)| *y).collect();
            let trend = loess(&xs, &ys, self.loess_fraction)?;
            chart
                .draw_series(LineSeries::new(
                    xs.iter().copied().zip(trend),
                    color.stroke_width(3),
                ))
                .map_err(draw_err)?;
        }

        chart
            .draw_series(LineSeries::new(
                [(0.0, 0.0), (dates.len() as f64, 0.0)],
                &TREND_COLOR.mix(0.4),
            ))
            .map_err(draw_err)?;

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(draw_err)?;
        root.present().map_err(draw_err)?;
        Ok(true)
    }
}
