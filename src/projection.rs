// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Read-side rollups over materialized instances. Nothing here is cached.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Boundary, ExpenseInstance, ExpenseType, Frequency, MonthYear};

/// Planned and paid amounts over a set of instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub planned: Decimal,
    pub paid: Decimal,
    pub unpaid_count: usize,
}

impl Totals {
    pub fn of<'a>(instances: impl IntoIterator<Item = &'a ExpenseInstance>) -> Self {
        let mut t = Totals::default();
        for inst in instances {
            t.planned += inst.amount();
            if inst.payment.is_paid {
                t.paid += inst.amount();
            } else {
                t.unpaid_count += 1;
            }
        }
        t
    }
}

/// One row per series within a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesSummary {
    pub series_id: Uuid,
    pub name: String,
    pub frequency: Frequency,
    pub display_total: Decimal,
    /// Per-occurrence amount, only for monthly series.
    pub monthly_amount: Option<Decimal>,
    pub boundary: Option<Boundary>,
    pub instances: usize,
    pub paid: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearSection {
    pub year: i32,
    pub totals: Totals,
    pub items: Vec<SeriesSummary>,
}

/// Groups instances by year, then by series and frequency, ordered by year and
/// by each series' first occurrence within the year.
pub fn year_sections(instances: &[ExpenseInstance]) -> Vec<YearSection> {
    let mut by_year: BTreeMap<i32, Vec<&ExpenseInstance>> = BTreeMap::new();
    for inst in instances {
        by_year.entry(inst.occurrence().year()).or_default().push(inst);
    }
    by_year
        .into_iter()
        .map(|(year, items)| section(year, &items))
        .collect()
}

pub fn year_section(instances: &[ExpenseInstance], year: i32) -> Option<YearSection> {
    let items: Vec<&ExpenseInstance> = instances
        .iter()
        .filter(|i| i.occurrence().year() == year)
        .collect();
    (!items.is_empty()).then(|| section(year, &items))
}

fn section(year: i32, items: &[&ExpenseInstance]) -> YearSection {
    let mut groups: BTreeMap<(Uuid, &'static str), Vec<&ExpenseInstance>> = BTreeMap::new();
    for inst in items {
        groups
            .entry((inst.series_id(), inst.frequency().as_str()))
            .or_default()
            .push(inst);
    }
    let mut rows: Vec<(MonthYear, SeriesSummary)> = groups
        .into_values()
        .map(|group| {
            let first = group
                .iter()
                .min_by_key(|i| i.occurrence())
                .copied()
                .unwrap_or(group[0]);
            (first.occurrence(), summarize(first, &group))
        })
        .collect();
    rows.sort_by(|a, b| (a.0, &a.1.name).cmp(&(b.0, &b.1.name)));
    YearSection {
        year,
        totals: Totals::of(items.iter().copied()),
        items: rows.into_iter().map(|(_, s)| s).collect(),
    }
}

fn summarize(first: &ExpenseInstance, group: &[&ExpenseInstance]) -> SeriesSummary {
    let display_total: Decimal = group.iter().map(|i| i.amount()).sum();
    SeriesSummary {
        series_id: first.series_id(),
        name: first.name().to_string(),
        frequency: first.frequency(),
        display_total,
        monthly_amount: (first.frequency() == Frequency::Monthly).then(|| first.amount()),
        boundary: first.boundary(),
        instances: group.len(),
        paid: group.iter().filter(|i| i.payment.is_paid).count(),
    }
}

/// What one month of the plan looks like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthOverview {
    pub month: MonthYear,
    pub totals: Totals,
    pub fixed_total: Decimal,
    pub variable_total: Decimal,
    pub items: usize,
}

pub fn month_overview(instances: &[ExpenseInstance], month: MonthYear) -> MonthOverview {
    let items: Vec<&ExpenseInstance> = instances
        .iter()
        .filter(|i| i.occurrence() == month)
        .collect();
    let total_of = |kind: ExpenseType| -> Decimal {
        items
            .iter()
            .filter(|i| i.fields().expense_type == kind)
            .map(|i| i.amount())
            .sum()
    };
    MonthOverview {
        month,
        totals: Totals::of(items.iter().copied()),
        fixed_total: total_of(ExpenseType::Fixed),
        variable_total: total_of(ExpenseType::Variable),
        items: items.len(),
    }
}
