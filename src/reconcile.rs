// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Turns series mutations into one atomic batch of instance writes.
//!
//! Every path plans its writes against a read of the series, then commits the
//! whole batch at once, so a failed store write never leaves a series with a
//! mix of old and new instances.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::PlanSettings;
use crate::error::{PlanError, Result};
use crate::expander::Schedule;
use crate::models::{
    Action, EditScope, ExpenseInstance, Frequency, MonthYear, MutationRequest, RebuildStrategy,
    SeriesDefinition,
};
use crate::snapshot::PaymentSnapshot;
use crate::store::{InstanceFilter, InstanceStore, WriteBatch};
use crate::validate::validate_definition;

/// Which reconciliation path a request took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePath {
    Materialized,
    PatchedInPlace,
    Rebuilt(RebuildStrategy),
    PatchedOneTime,
    Detached,
    DeletedOneTime,
    DeletedSeries,
    DetachedAndDeleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub series_id: Uuid,
    pub path: ReconcilePath,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// The only writer of series-level fields. Holds the store exclusively for the
/// duration of each request.
pub struct Reconciler<'s, S: InstanceStore + ?Sized> {
    store: &'s mut S,
    settings: PlanSettings,
}

impl<'s, S: InstanceStore + ?Sized> Reconciler<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self {
            store,
            settings: PlanSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PlanSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Applies one mutation. `today` anchors the default end of open-ended series.
    pub fn apply(&mut self, request: &MutationRequest, today: NaiveDate) -> Result<Reconciliation> {
        let def = &request.definition;
        let (batch, path) = match request.action {
            Action::Add => {
                validate_definition(def)?;
                let schedule = Schedule::resolve(def, today, self.settings.plan_years)?;
                self.plan_add(def, &schedule)?
            }
            Action::Update => {
                validate_definition(def)?;
                let schedule = Schedule::resolve(def, today, self.settings.plan_years)?;
                self.plan_update(request, &schedule)?
            }
            Action::Delete => self.plan_delete(request)?,
        };
        debug!(series = %def.series_id, ?path, ops = batch.len(), "committing reconciliation");
        let summary = self.store.commit(batch)?;
        info!(
            series = %def.series_id,
            ?path,
            inserted = summary.inserted,
            updated = summary.updated,
            deleted = summary.deleted,
            "series reconciled"
        );
        Ok(Reconciliation {
            series_id: def.series_id,
            path,
            inserted: summary.inserted,
            updated: summary.updated,
            deleted: summary.deleted,
        })
    }

    fn plan_add(
        &self,
        def: &SeriesDefinition,
        schedule: &Schedule,
    ) -> Result<(WriteBatch, ReconcilePath)> {
        if !self
            .store
            .fetch_all(&InstanceFilter::series(def.series_id))?
            .is_empty()
        {
            return Err(PlanError::DuplicateSeries {
                series_id: def.series_id,
            });
        }
        let mut batch = WriteBatch::new();
        for inst in materialize(def, schedule) {
            batch.insert(inst);
        }
        Ok((batch, ReconcilePath::Materialized))
    }

    fn plan_update(
        &self,
        request: &MutationRequest,
        schedule: &Schedule,
    ) -> Result<(WriteBatch, ReconcilePath)> {
        let def = &request.definition;
        let existing = self.store.fetch_all(&InstanceFilter::series(def.series_id))?;
        if existing.is_empty() {
            return Err(not_found(def));
        }
        let locator = request.locator();
        let mut batch = WriteBatch::new();

        if request.scope == EditScope::ThisInstanceOnly {
            let mut target =
                locate(&existing, locator, def.frequency).ok_or_else(|| not_found(def))?;
            let path = if target.frequency().is_recurring() {
                target.detach();
                ReconcilePath::Detached
            } else {
                ReconcilePath::PatchedOneTime
            };
            target.apply_fields(&def.fields);
            batch.replace(target);
            return Ok((batch, path));
        }

        let has_recurring = existing.iter().any(|i| i.frequency().is_recurring());
        let (members, detached): (Vec<_>, Vec<_>) = existing
            .into_iter()
            .partition(|i| !has_recurring || i.frequency().is_recurring());

        if !has_recurring && def.frequency == Frequency::OneTime {
            let mut target = members
                .into_iter()
                .find(|i| i.occurrence() == locator)
                .ok_or_else(|| not_found(def))?;
            target.apply_fields(&def.fields);
            if target.occurrence() != schedule.start {
                target.reschedule(Frequency::OneTime, schedule.start, None);
            }
            batch.replace(target);
            return Ok((batch, ReconcilePath::PatchedOneTime));
        }

        let unchanged = members
            .iter()
            .all(|m| m.frequency() == schedule.frequency && m.boundary() == schedule.boundary());
        if unchanged {
            for mut member in members {
                member.apply_fields(&def.fields);
                batch.replace(member);
            }
            return Ok((batch, ReconcilePath::PatchedInPlace));
        }

        let reserved: BTreeSet<MonthYear> = detached.iter().map(|d| d.occurrence()).collect();
        let targets: Vec<MonthYear> = schedule
            .occurrences()
            .into_iter()
            .filter(|occ| !reserved.contains(occ))
            .collect();
        let strategy = self.settings.rebuild_strategy;
        match strategy {
            RebuildStrategy::Incremental => {
                rebuild_incremental(def, schedule, members, &targets, &mut batch)
            }
            RebuildStrategy::Full => rebuild_full(def, schedule, members, &targets, &mut batch),
        }
        Ok((batch, ReconcilePath::Rebuilt(strategy)))
    }

    fn plan_delete(&self, request: &MutationRequest) -> Result<(WriteBatch, ReconcilePath)> {
        let def = &request.definition;
        let locator = request.locator();
        let mut batch = WriteBatch::new();

        if !def.frequency.is_recurring() {
            let filter = InstanceFilter::series(def.series_id)
                .with_frequency(Frequency::OneTime)
                .at(locator);
            let target = self
                .store
                .fetch_all(&filter)?
                .into_iter()
                .next()
                .ok_or_else(|| not_found(def))?;
            batch.delete(target.id());
            return Ok((batch, ReconcilePath::DeletedOneTime));
        }

        match request.scope {
            EditScope::AllOccurrences => {
                let filter = InstanceFilter::series(def.series_id).with_frequency(def.frequency);
                if self.store.fetch_all(&filter)?.is_empty() {
                    return Err(not_found(def));
                }
                batch.delete_where(filter);
                Ok((batch, ReconcilePath::DeletedSeries))
            }
            EditScope::ThisInstanceOnly => {
                let filter = InstanceFilter::series(def.series_id)
                    .with_frequency(def.frequency)
                    .at(locator);
                let mut target = self
                    .store
                    .fetch_all(&filter)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| not_found(def))?;
                target.detach();
                let id = target.id();
                batch.replace(target);
                batch.delete(id);
                Ok((batch, ReconcilePath::DetachedAndDeleted))
            }
        }
    }
}

fn materialize(def: &SeriesDefinition, schedule: &Schedule) -> Vec<ExpenseInstance> {
    schedule
        .occurrences()
        .into_iter()
        .map(|occ| {
            ExpenseInstance::materialize(
                def.series_id,
                &def.fields,
                schedule.frequency,
                occ,
                schedule.boundary(),
            )
        })
        .collect()
}

/// Keeps surviving instances (and their ids), drops the rest, fills the gaps.
fn rebuild_incremental(
    def: &SeriesDefinition,
    schedule: &Schedule,
    members: Vec<ExpenseInstance>,
    targets: &[MonthYear],
    batch: &mut WriteBatch,
) {
    let mut by_occurrence: BTreeMap<MonthYear, ExpenseInstance> = BTreeMap::new();
    for member in members {
        match by_occurrence.get(&member.occurrence()) {
            Some(kept) if kept.payment.is_paid || !member.payment.is_paid => {
                batch.delete(member.id());
            }
            _ => {
                if let Some(dup) = by_occurrence.insert(member.occurrence(), member) {
                    batch.delete(dup.id());
                }
            }
        }
    }
    for &occ in targets {
        match by_occurrence.remove(&occ) {
            Some(mut kept) => {
                kept.apply_fields(&def.fields);
                kept.reschedule(schedule.frequency, occ, schedule.boundary());
                batch.replace(kept);
            }
            None => batch.insert(ExpenseInstance::materialize(
                def.series_id,
                &def.fields,
                schedule.frequency,
                occ,
                schedule.boundary(),
            )),
        }
    }
    for dropped in by_occurrence.into_values() {
        debug!(occurrence = %dropped.occurrence(), "occurrence left the range");
        batch.delete(dropped.id());
    }
}

/// Tears the series down and rematerializes it, restoring payments by occurrence.
fn rebuild_full(
    def: &SeriesDefinition,
    schedule: &Schedule,
    members: Vec<ExpenseInstance>,
    targets: &[MonthYear],
    batch: &mut WriteBatch,
) {
    let snapshot = PaymentSnapshot::capture(&members);
    debug!(captured = snapshot.len(), paid = snapshot.paid_count(), "payment snapshot taken");
    for member in &members {
        batch.delete(member.id());
    }
    for &occ in targets {
        let mut inst = ExpenseInstance::materialize(
            def.series_id,
            &def.fields,
            schedule.frequency,
            occ,
            schedule.boundary(),
        );
        snapshot.restore(occ, &mut inst);
        batch.insert(inst);
    }
}

/// Finds the instance at `occurrence`, preferring the requested frequency.
fn locate(
    existing: &[ExpenseInstance],
    occurrence: MonthYear,
    frequency: Frequency,
) -> Option<ExpenseInstance> {
    let at: Vec<&ExpenseInstance> = existing
        .iter()
        .filter(|i| i.occurrence() == occurrence)
        .collect();
    at.iter()
        .find(|i| i.frequency() == frequency)
        .or_else(|| at.first())
        .map(|i| (*i).clone())
}

fn not_found(def: &SeriesDefinition) -> PlanError {
    PlanError::NotFound {
        series_id: def.series_id,
    }
}
