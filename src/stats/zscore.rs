//! Per-group z-score normalisation.

use crate::data::PopulationGroup;
use crate::stats::metric::{Metric, MetricError, UndefinedReason};
use rayon::prelude::*;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// A value tagged with the group it is normalised within.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupedValue {
    pub group: PopulationGroup,
    pub value: Metric,
}

/// Normalised values of one group. `rows[i]` is the input position of `scores[i]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupZScores {
    pub group: PopulationGroup,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub rows: Vec<usize>,
    pub scores: Vec<Metric>,
}

pub type ZScoreTable = BTreeMap<PopulationGroup, Result<GroupZScores, MetricError>>;

pub struct ZScoreCalculator;

impl ZScoreCalculator {
    /// z = (value - group mean) / group sample std dev, over defined values only.
    ///
    /// Undefined inputs stay undefined. A group with fewer than two defined
    /// values or with zero variance fails on its own, without affecting others.
    pub fn compute_group(
        group: PopulationGroup,
        values: &[GroupedValue],
    ) -> Result<GroupZScores, MetricError> {
        let (rows, members): (Vec<usize>, Vec<Metric>) = values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.group == group)
            .map(|(i, v)| (i, v.value))
            .unzip();

        let defined: Vec<f64> = members.iter().filter_map(Metric::value).collect();
        if defined.len() < 2 {
            return Err(MetricError::InsufficientObservations {
                group,
                count: defined.len(),
            });
        }

        // identical values leave rounding residue in the sample std dev
        let constant = defined.iter().all(|v| *v == defined[0]);
        let mean = defined.iter().mean();
        let std_dev = defined.iter().std_dev();
        if constant || std_dev == 0.0 || !std_dev.is_finite() {
            return Err(MetricError::ZeroVariance { group });
        }

        let scores = members
            .iter()
            .map(|m| match m {
                Metric::Defined(v) => Metric::Defined((v - mean) / std_dev),
                Metric::Undefined(_) => Metric::Undefined(UndefinedReason::UndefinedInput),
            })
            .collect();

        Ok(GroupZScores {
            group,
            count: defined.len(),
            mean,
            std_dev,
            rows,
            scores,
        })
    }

    /// Compute every group in parallel.
    pub fn compute_all(values: &[GroupedValue]) -> ZScoreTable {
        PopulationGroup::ALL
            .par_iter()
            .map(|&group| {
                let result = Self::compute_group(group, values);
                if let Err(err) = &result {
                    log::warn!("No z-scores for {group}: {err}");
                }
                (group, result)
            })
            .collect()
    }
}
