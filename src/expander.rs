// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{Datelike, NaiveDate};

use crate::error::{PlanError, Result};
use crate::models::{Boundary, Frequency, MAX_YEAR, MonthYear, SeriesDefinition};

/// Expands a schedule into its ordered occurrences.
///
/// Inverted ranges are rejected rather than producing an empty sequence.
pub fn expand(frequency: Frequency, start: MonthYear, end: MonthYear) -> Result<Vec<MonthYear>> {
    match frequency {
        Frequency::OneTime => {
            if start != end {
                return Err(PlanError::InvalidSchedule(format!(
                    "a one-time expense cannot span {} to {}",
                    start, end
                )));
            }
            Ok(vec![start])
        }
        Frequency::Monthly => {
            if end < start {
                return Err(inverted(start, end));
            }
            let count = (end.ordinal() - start.ordinal() + 1) as usize;
            let mut out = Vec::with_capacity(count);
            let mut cur = start;
            while cur <= end {
                out.push(cur);
                cur = cur.next();
            }
            Ok(out)
        }
        Frequency::Yearly => {
            if end.year() < start.year() {
                return Err(inverted(start, end));
            }
            Ok((start.year()..=end.year())
                .map(|y| start.with_year(y))
                .collect())
        }
    }
}

fn inverted(start: MonthYear, end: MonthYear) -> PlanError {
    PlanError::InvalidSchedule(format!("start {} is after end {}", start, end))
}

/// Default end for a recurring series created without one: the last
/// occurrence in the final year of the planning horizon.
pub fn default_end(
    frequency: Frequency,
    start: MonthYear,
    today: NaiveDate,
    plan_years: i32,
) -> MonthYear {
    let anchor = today.year().max(start.year());
    // the horizon never runs past the last representable year
    let last_year = anchor
        .saturating_add(plan_years.max(1) - 1)
        .min(MAX_YEAR);
    match frequency {
        Frequency::OneTime => start,
        Frequency::Yearly => start.with_year(last_year),
        // December always exists
        Frequency::Monthly => MonthYear::new(12, last_year).unwrap_or(start),
    }
}

/// A definition whose boundary has been resolved and checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub frequency: Frequency,
    pub start: MonthYear,
    pub end: MonthYear,
}

impl Schedule {
    pub fn resolve(def: &SeriesDefinition, today: NaiveDate, plan_years: i32) -> Result<Self> {
        let end = match (def.frequency, def.end) {
            (Frequency::OneTime, None) => def.start,
            (Frequency::OneTime, Some(end)) if end != def.start => {
                return Err(PlanError::InvalidSchedule(format!(
                    "a one-time expense in {} cannot end in {}",
                    def.start, end
                )));
            }
            (Frequency::Yearly, Some(end)) if end < def.start => {
                return Err(inverted(def.start, end));
            }
            (Frequency::Yearly, Some(end)) => def.start.with_year(end.year()),
            (_, Some(end)) => end,
            (freq, None) => default_end(freq, def.start, today, plan_years),
        };
        let schedule = Schedule {
            frequency: def.frequency,
            start: def.start,
            end,
        };
        // surfaces inverted ranges before anything is written
        expand(schedule.frequency, schedule.start, schedule.end)?;
        Ok(schedule)
    }

    pub fn occurrences(&self) -> Vec<MonthYear> {
        expand(self.frequency, self.start, self.end).unwrap_or_default()
    }

    pub fn boundary(&self) -> Option<Boundary> {
        self.frequency.is_recurring().then_some(Boundary {
            start: self.start,
            end: self.end,
        })
    }
}
