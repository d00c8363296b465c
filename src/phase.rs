//! Phase Annotator
//! Maps dates onto the named phases of the pandemic response timeline.

use crate::data::DailyRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    #[error("Phase timeline has no intervals")]
    Empty,
    #[error("Phase '{name}' does not end after it starts ({start} .. {end})")]
    EmptyInterval {
        name: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("Gap between '{previous}' (ends {end}) and '{next}' (starts {start})")]
    Gap {
        previous: String,
        next: String,
        end: NaiveDate,
        start: NaiveDate,
    },
    #[error("'{previous}' (ends {end}) overlaps '{next}' (starts {start})")]
    Overlap {
        previous: String,
        next: String,
        end: NaiveDate,
        start: NaiveDate,
    },
}

/// A half-open interval `[start, end)` named after a response phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseInterval {
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Result of a phase lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseLookup<'a> {
    Phase(&'a str),
    BeforeTimeline,
    AfterTimeline,
}

impl<'a> PhaseLookup<'a> {
    pub fn phase(self) -> Option<&'a str> {
        match self {
            PhaseLookup::Phase(name) => Some(name),
            _ => None,
        }
    }
}

/// Contiguous, non-overlapping phase intervals in chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTimeline {
    intervals: Vec<PhaseInterval>,
}

impl PhaseTimeline {
    /// Validates that every interval is non-empty and that
    /// `end[i] == start[i + 1]` holds for each adjacent pair.
    pub fn new(intervals: Vec<PhaseInterval>) -> Result<Self, TimelineError> {
        if intervals.is_empty() {
            return Err(TimelineError::Empty);
        }

        for interval in &intervals {
            if interval.start >= interval.end {
                return Err(TimelineError::EmptyInterval {
                    name: interval.name.clone(),
                    start: interval.start,
                    end: interval.end,
                });
            }
        }

        for pair in intervals.windows(2) {
            let (previous, next) = (&pair[0], &pair[1]);
            if previous.end < next.start {
                return Err(TimelineError::Gap {
                    previous: previous.name.clone(),
                    next: next.name.clone(),
                    end: previous.end,
                    start: next.start,
                });
            }
            if previous.end > next.start {
                return Err(TimelineError::Overlap {
                    previous: previous.name.clone(),
                    next: next.name.clone(),
                    end: previous.end,
                    start: next.start,
                });
            }
        }

        Ok(Self { intervals })
    }

    pub fn intervals(&self) -> &[PhaseInterval] {
        &self.intervals
    }

    pub fn start(&self) -> NaiveDate {
        self.intervals[0].start
    }

    pub fn end(&self) -> NaiveDate {
        self.intervals[self.intervals.len() - 1].end
    }

    /// Start is inclusive, end exclusive: a boundary date belongs to the
    /// interval that begins on it.
    pub fn lookup(&self, date: NaiveDate) -> PhaseLookup<'_> {
        if date < self.start() {
            return PhaseLookup::BeforeTimeline;
        }
        if date >= self.end() {
            return PhaseLookup::AfterTimeline;
        }
        let idx = self.intervals.partition_point(|i| i.end <= date);
        PhaseLookup::Phase(&self.intervals[idx].name)
    }

    /// Copy of `records` where unlabelled days carry the timeline's phase.
    /// Days outside the timeline stay unlabelled.
    pub fn annotate(&self, records: &[DailyRecord]) -> Vec<DailyRecord> {
        let mut filled = 0usize;
        let annotated = records
            .iter()
            .map(|record| {
                let mut record = record.clone();
                if record.phase.is_none() {
                    if let Some(name) = self.lookup(record.date).phase() {
                        record.phase = Some(name.to_string());
                        filled += 1;
                    }
                }
                record
            })
            .collect();
        log::debug!("Annotated {filled} unlabelled days from the phase timeline");
        annotated
    }
}

/// Most frequent label; ties go to the label encountered first.
pub fn mode_phase<'a, I>(labels: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (order, label) in labels.into_iter().enumerate() {
        counts.entry(label).or_insert((0, order)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(label, _)| label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn interval(name: &str, start: NaiveDate, end: NaiveDate) -> PhaseInterval {
        PhaseInterval {
            name: name.to_string(),
            start,
            end,
        }
    }

    fn timeline() -> PhaseTimeline {
        PhaseTimeline::new(vec![
            interval("Pre-Circuit Breaker", date(2020, 1, 23), date(2020, 4, 7)),
            interval("Circuit Breaker", date(2020, 4, 7), date(2020, 6, 2)),
            interval("Phase 1", date(2020, 6, 2), date(2020, 6, 19)),
        ])
        .unwrap()
    }

    #[test]
    fn start_boundary_is_inclusive() {
        assert_eq!(
            timeline().lookup(date(2020, 4, 7)),
            PhaseLookup::Phase("Circuit Breaker")
        );
    }

    #[test]
    fn end_boundary_belongs_to_next_phase() {
        assert_eq!(
            timeline().lookup(date(2020, 6, 2)),
            PhaseLookup::Phase("Phase 1")
        );
    }

    #[test]
    fn dates_outside_timeline_are_out_of_range() {
        let timeline = timeline();
        assert_eq!(timeline.lookup(date(2020, 1, 22)), PhaseLookup::BeforeTimeline);
        assert_eq!(timeline.lookup(date(2020, 6, 19)), PhaseLookup::AfterTimeline);
        assert_eq!(timeline.lookup(date(2020, 6, 19)).phase(), None);
    }

    #[test]
    fn gaps_and_overlaps_are_rejected() {
        let gap = PhaseTimeline::new(vec![
            interval("a", date(2020, 1, 1), date(2020, 2, 1)),
            interval("b", date(2020, 2, 2), date(2020, 3, 1)),
        ]);
        assert!(matches!(gap, Err(TimelineError::Gap { .. })));

        let overlap = PhaseTimeline::new(vec![
            interval("a", date(2020, 1, 1), date(2020, 2, 5)),
            interval("b", date(2020, 2, 1), date(2020, 3, 1)),
        ]);
        assert!(matches!(overlap, Err(TimelineError::Overlap { .. })));

        let empty = PhaseTimeline::new(vec![interval("a", date(2020, 1, 1), date(2020, 1, 1))]);
        assert!(matches!(empty, Err(TimelineError::EmptyInterval { .. })));

        assert_eq!(PhaseTimeline::new(Vec::new()), Err(TimelineError::Empty));
    }

    #[test]
    fn annotate_fills_only_missing_labels() {
        let mut labelled = DailyRecord::new(date(2020, 4, 10));
        labelled.phase = Some("Reported".to_string());
        let unlabelled = DailyRecord::new(date(2020, 4, 11));
        let outside = DailyRecord::new(date(2021, 1, 1));

        let annotated = timeline().annotate(&[labelled, unlabelled, outside]);
        assert_eq!(annotated[0].phase.as_deref(), Some("Reported"));
        assert_eq!(annotated[1].phase.as_deref(), Some("Circuit Breaker"));
        assert_eq!(annotated[2].phase, None);
    }

    #[test]
    fn mode_prefers_first_encountered_on_ties() {
        assert_eq!(mode_phase(["b", "a", "a", "b"]), Some("b"));
        assert_eq!(mode_phase(["b", "a", "a"]), Some("a"));
        assert_eq!(mode_phase(Vec::<&str>::new()), None);
    }

    proptest! {
        #[test]
        fn in_range_dates_resolve_to_their_interval(offset in 0i64..148) {
            let timeline = timeline();
            let day = timeline.start() + chrono::Duration::days(offset);
            let name = timeline.lookup(day).phase().unwrap();
            let interval = timeline
                .intervals()
                .iter()
                .find(|i| i.name == name)
                .unwrap();
            prop_assert!(interval.start <= day && day < interval.end);
        }
    }
}
