//! Density-adjusted case rates.

use crate::data::{DailyRecord, PopulationGroup};
use crate::stats::metric::{Metric, UndefinedReason};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cases per 100,000 residents.
pub const PER_POPULATION: f64 = 100_000.0;

/// Resident population and land area of one group in one year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityConstants {
    pub population: u64,
    pub land_area_km2: f64,
}

/// Year -> group -> constants. Only the years present here yield rates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DensityTable {
    entries: BTreeMap<i32, BTreeMap<PopulationGroup, DensityConstants>>,
}

impl DensityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous constants if the pair was already present.
    pub fn insert(
        &mut self,
        year: i32,
        group: PopulationGroup,
        constants: DensityConstants,
    ) -> Option<DensityConstants> {
        self.entries.entry(year).or_default().insert(group, constants)
    }

    pub fn get(&self, year: i32, group: PopulationGroup) -> Option<&DensityConstants> {
        self.entries.get(&year).and_then(|groups| groups.get(&group))
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.entries.keys().copied()
    }

    /// rate = count / population * 100,000 / land area.
    pub fn rate(&self, count: f64, year: i32, group: PopulationGroup) -> Metric {
        match self.get(year, group) {
            Some(c) => Metric::Defined(count / c.population as f64 * PER_POPULATION / c.land_area_km2),
            None => Metric::Undefined(UndefinedReason::UnknownYear { year }),
        }
    }
}

/// Both groups' density rates for one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyRates {
    pub date: chrono::NaiveDate,
    pub dormitory: Metric,
    pub community: Metric,
}

impl DailyRates {
    pub fn get(&self, group: PopulationGroup) -> Metric {
        match group {
            PopulationGroup::Dormitory => self.dormitory,
            PopulationGroup::Community => self.community,
        }
    }
}

pub fn density_rates(records: &[DailyRecord], table: &DensityTable) -> Vec<DailyRates> {
    let rates: Vec<DailyRates> = records
        .iter()
        .map(|r| DailyRates {
            date: r.date,
            dormitory: table.rate(r.dormitory as f64, r.year(), PopulationGroup::Dormitory),
            community: table.rate(r.community as f64, r.year(), PopulationGroup::Community),
        })
        .collect();

    let undefined = rates
        .iter()
        .filter(|r| !r.dormitory.is_defined() || !r.community.is_defined())
        .count();
    if undefined > 0 {
        log::warn!("{undefined} days fall in years without density constants");
    }
    rates
}
