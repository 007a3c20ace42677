// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::{BTreeMap, HashSet};

use crate::db::SqliteStore;
use crate::models::{ExpenseInstance, Frequency};
use crate::store::{InstanceFilter, InstanceStore};
use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::Connection;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub kind: &'static str,
    pub detail: String,
}

fn issue(kind: &'static str, detail: String) -> Issue {
    Issue { kind, detail }
}

pub fn find_issues(instances: &[ExpenseInstance]) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut by_series: BTreeMap<Uuid, Vec<&ExpenseInstance>> = BTreeMap::new();
    for inst in instances {
        by_series.entry(inst.series_id()).or_default().push(inst);
    }

    for (series_id, group) in &by_series {
        let recurring: Vec<&&ExpenseInstance> = group
            .iter()
            .filter(|i| i.frequency().is_recurring())
            .collect();

        // 1) Series-level fields drifted apart
        if let Some(first) = recurring.first() {
            if recurring
                .iter()
                .any(|i| i.fields() != first.fields() || i.frequency() != first.frequency())
            {
                issues.push(issue("field_drift", series_id.to_string()));
            }
        }

        // 2) Two recurring instances on the same occurrence
        let mut seen = HashSet::new();
        for inst in &recurring {
            if !seen.insert(inst.occurrence()) {
                issues.push(issue(
                    "duplicate_occurrence",
                    format!("{} {}", series_id, inst.occurrence()),
                ));
            }
        }

        // 3) One-time series must hold exactly one instance
        if recurring.is_empty() && group.len() > 1 {
            issues.push(issue(
                "multiple_one_time",
                format!("{} ({} instances)", series_id, group.len()),
            ));
        }

        // 4) Recurring instances must sit inside their own boundary
        for inst in &recurring {
            match inst.boundary() {
                None => issues.push(issue("missing_boundary", inst.id().to_string())),
                Some(b) => {
                    let off_month = inst.frequency() == Frequency::Yearly
                        && inst.occurrence().month() != b.start.month();
                    if !b.contains(inst.occurrence()) || off_month {
                        issues.push(issue(
                            "out_of_range",
                            format!(
                                "{} {} not in {} to {}",
                                inst.id(),
                                inst.occurrence(),
                                b.start,
                                b.end
                            ),
                        ));
                    }
                }
            }
        }
    }
    issues
}

pub fn handle(conn: &mut Connection) -> Result<()> {
    let store = SqliteStore::new(conn);
    let issues = find_issues(&store.fetch_all(&InstanceFilter::all())?);
    if issues.is_empty() {
        println!("doctor: no issues found");
    } else {
        let rows = issues
            .into_iter()
            .map(|i| vec![i.kind.to_string(), i.detail])
            .collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
