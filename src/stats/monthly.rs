//! Monthly aggregation in the count domain.

use crate::data::{DailyRecord, Measure, PopulationGroup};
use crate::phase::mode_phase;
use crate::stats::density::DensityTable;
use crate::stats::metric::{DateRange, Metric};
use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

/// Summed counts for one calendar month of the window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyAggregate {
    /// First day of the month.
    pub month: NaiveDate,
    pub days: usize,
    pub dormitory: u64,
    pub community: u64,
    pub deaths: u64,
    pub icu: u64,
    pub hospitalised: u64,
    /// Most frequent phase label among the month's days.
    pub phase: Option<String>,
    /// Count cells in the month whose zero was synthesised.
    pub imputed_cells: usize,
    /// Rates of the monthly sums, converted once.
    pub dormitory_rate: Metric,
    pub community_rate: Metric,
}

impl MonthlyAggregate {
    fn empty(month: NaiveDate) -> Self {
        Self {
            month,
            days: 0,
            dormitory: 0,
            community: 0,
            deaths: 0,
            icu: 0,
            hospitalised: 0,
            phase: None,
            imputed_cells: 0,
            dormitory_rate: Metric::Defined(0.0),
            community_rate: Metric::Defined(0.0),
        }
    }

    pub fn cases(&self, group: PopulationGroup) -> u64 {
        match group {
            PopulationGroup::Dormitory => self.dormitory,
            PopulationGroup::Community => self.community,
        }
    }

    pub fn rate(&self, group: PopulationGroup) -> Metric {
        match group {
            PopulationGroup::Dormitory => self.dormitory_rate,
            PopulationGroup::Community => self.community_rate,
        }
    }

    /// No synthetic zeros and both rates defined.
    pub fn is_complete(&self) -> bool {
        self.imputed_cells == 0 && self.dormitory_rate.is_defined() && self.community_rate.is_defined()
    }
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// One row per month touched by `range`, in order, zero-filled where the
/// month has no records. Records are expected in date order.
pub fn aggregate_monthly(
    records: &[DailyRecord],
    range: DateRange,
    table: &DensityTable,
) -> Vec<MonthlyAggregate> {
    let mut months = Vec::new();
    let mut month = month_start(range.start);
    let last = month_start(range.end);

    while month <= last {
        let in_month: Vec<&DailyRecord> = records
            .iter()
            .filter(|r| range.contains(r.date) && month_start(r.date) == month)
            .collect();

        let mut row = MonthlyAggregate::empty(month);
        for record in &in_month {
            row.days += 1;
            // sums cap at u64::MAX
            row.dormitory = row.dormitory.saturating_add(record.dormitory);
            row.community = row.community.saturating_add(record.community);
            row.deaths = row.deaths.saturating_add(record.deaths);
            row.icu = row.icu.saturating_add(record.icu);
            row.hospitalised = row.hospitalised.saturating_add(record.hospitalised);
            row.imputed_cells += record
                .imputed
                .iter()
                .filter(|m| Measure::is_count(**m))
                .count();
        }
        row.phase = mode_phase(in_month.iter().filter_map(|r| r.phase.as_deref())).map(str::to_string);
        row.dormitory_rate = table.rate(row.dormitory as f64, month.year(), PopulationGroup::Dormitory);
        row.community_rate = table.rate(row.community as f64, month.year(), PopulationGroup::Community);

        months.push(row);
        month = match month.checked_add_months(Months::new(1)) {
            Some(next) => next,
            None => break,
        };
    }

    let incomplete = months.iter().filter(|m| !m.is_complete()).count();
    if incomplete > 0 {
        log::warn!("{incomplete} of {} months are incomplete", months.len());
    }
    months
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::density::{density_rates, DensityConstants};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn table() -> DensityTable {
        let mut table = DensityTable::new();
        for group in PopulationGroup::ALL {
            table.insert(
                2020,
                group,
                DensityConstants {
                    population: 311_100,
                    land_area_km2: 5.0,
                },
            );
        }
        table
    }

    fn record(date: NaiveDate, dormitory: u64, phase: &str) -> DailyRecord {
        let mut r = DailyRecord::new(date);
        r.dormitory = dormitory;
        r.phase = Some(phase.to_string());
        r
    }

    #[test]
    fn two_day_window_sums_counts() {
        let records = vec![
            record(date(2020, 4, 1), 5, "Circuit Breaker"),
            record(date(2020, 4, 2), 7, "Circuit Breaker"),
        ];
        let range = DateRange::new(date(2020, 4, 1), date(2020, 4, 2)).unwrap();
        let months = aggregate_monthly(&records, range, &table());

        assert_eq!(months.len(), 1);
        assert_eq!(months[0].month, date(2020, 4, 1));
        assert_eq!(months[0].dormitory, 12);
        assert_eq!(months[0].days, 2);
        assert_eq!(months[0].phase.as_deref(), Some("Circuit Breaker"));
    }

    #[test]
    fn huge_counts_saturate_instead_of_overflowing() {
        let records = vec![
            record(date(2020, 4, 1), u64::MAX - 1, "a"),
            record(date(2020, 4, 2), 7, "a"),
        ];
        let range = DateRange::new(date(2020, 4, 1), date(2020, 4, 2)).unwrap();
        let months = aggregate_monthly(&records, range, &table());
        assert_eq!(months[0].dormitory, u64::MAX);
    }

    #[test]
    fn empty_months_produce_zero_rows() {
        let records = vec![
            record(date(2020, 4, 1), 5, "a"),
            record(date(2020, 6, 1), 7, "b"),
        ];
        let range = DateRange::new(date(2020, 4, 1), date(2020, 6, 30)).unwrap();
        let months = aggregate_monthly(&records, range, &table());

        let keys: Vec<NaiveDate> = months.iter().map(|m| m.month).collect();
        assert_eq!(keys, vec![date(2020, 4, 1), date(2020, 5, 1), date(2020, 6, 1)]);
        assert_eq!(months[1].dormitory, 0);
        assert_eq!(months[1].days, 0);
        assert_eq!(months[1].phase, None);
        assert_eq!(months[1].dormitory_rate, Metric::Defined(0.0));
    }

    #[test]
    fn rows_outside_the_window_are_ignored() {
        let records = vec![
            record(date(2020, 4, 1), 5, "a"),
            record(date(2020, 4, 20), 100, "a"),
        ];
        let range = DateRange::new(date(2020, 4, 1), date(2020, 4, 10)).unwrap();
        let months = aggregate_monthly(&records, range, &table());
        assert_eq!(months[0].dormitory, 5);
    }

    #[test]
    fn month_phase_is_the_mode() {
        let records = vec![
            record(date(2020, 6, 1), 0, "Circuit Breaker"),
            record(date(2020, 6, 2), 0, "Phase 1"),
            record(date(2020, 6, 3), 0, "Phase 1"),
        ];
        let range = DateRange::new(date(2020, 6, 1), date(2020, 6, 30)).unwrap();
        let months = aggregate_monthly(&records, range, &table());
        assert_eq!(months[0].phase.as_deref(), Some("Phase 1"));
    }

    #[test]
    fn aggregation_happens_before_rate_conversion() {
        let records = vec![
            record(date(2020, 4, 1), 5, "a"),
            record(date(2020, 4, 2), 7, "a"),
            record(date(2020, 4, 3), 299, "a"),
        ];
        let table = table();
        let range = DateRange::new(date(2020, 4, 1), date(2020, 4, 30)).unwrap();
        let months = aggregate_monthly(&records, range, &table);

        let monthly = months[0].dormitory_rate.value().unwrap();
        let from_sum = table
            .rate(311.0, 2020, PopulationGroup::Dormitory)
            .value()
            .unwrap();
        assert_eq!(monthly, from_sum);
        assert!((monthly - 20.0).abs() < 1e-9);

        // the rate is linear in the count, so daily rates add up to the same figure
        let summed: f64 = density_rates(&records, &table)
            .iter()
            .filter_map(|r| r.dormitory.value())
            .sum();
        assert!((summed - monthly).abs() < 1e-9);
    }

    #[test]
    fn imputed_counts_mark_the_month_incomplete() {
        let mut day = record(date(2020, 4, 1), 0, "a");
        day.imputed.insert(Measure::Dormitory);
        day.imputed.insert(Measure::VaccinatedFull);
        let range = DateRange::new(date(2020, 4, 1), date(2020, 4, 1)).unwrap();
        let months = aggregate_monthly(&[day], range, &table());

        assert_eq!(months[0].imputed_cells, 1);
        assert!(!months[0].is_complete());
    }

    #[test]
    fn unknown_year_month_has_undefined_rate() {
        let range = DateRange::new(date(2022, 1, 1), date(2022, 1, 31)).unwrap();
        let months = aggregate_monthly(&[], range, &table());
        assert!(!months[0].dormitory_rate.is_defined());
        assert!(!months[0].is_complete());
    }
}
