// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeMap;

use tracing::debug;
use uuid::Uuid;

use crate::error::{PlanError, Result};
use crate::models::{ExpenseInstance, Frequency, MonthYear, PaymentState};

/// Predicate over stored instances. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceFilter {
    pub id: Option<Uuid>,
    pub series_id: Option<Uuid>,
    pub frequencies: Option<Vec<Frequency>>,
    pub occurrence: Option<MonthYear>,
    pub year: Option<i32>,
}

impl InstanceFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn instance(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn series(series_id: Uuid) -> Self {
        Self {
            series_id: Some(series_id),
            ..Self::default()
        }
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequencies = Some(vec![frequency]);
        self
    }

    pub fn recurring(mut self) -> Self {
        self.frequencies = Some(vec![Frequency::Monthly, Frequency::Yearly]);
        self
    }

    pub fn at(mut self, occurrence: MonthYear) -> Self {
        self.occurrence = Some(occurrence);
        self
    }

    pub fn in_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn matches(&self, inst: &ExpenseInstance) -> bool {
        self.id.is_none_or(|id| inst.id() == id)
            && self.series_id.is_none_or(|s| inst.series_id() == s)
            && self
                .frequencies
                .as_ref()
                .is_none_or(|fs| fs.contains(&inst.frequency()))
            && self.occurrence.is_none_or(|o| inst.occurrence() == o)
            && self.year.is_none_or(|y| inst.occurrence().year() == y)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Insert(ExpenseInstance),
    /// Overwrites the stored instance with the same id.
    Replace(ExpenseInstance),
    SetPayment { id: Uuid, payment: PaymentState },
    Delete(Uuid),
    DeleteWhere(InstanceFilter),
}

/// Writes that must land together or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, instance: ExpenseInstance) {
        self.ops.push(WriteOp::Insert(instance));
    }

    pub fn replace(&mut self, instance: ExpenseInstance) {
        self.ops.push(WriteOp::Replace(instance));
    }

    pub fn set_payment(&mut self, id: Uuid, payment: PaymentState) {
        self.ops.push(WriteOp::SetPayment { id, payment });
    }

    pub fn delete(&mut self, id: Uuid) {
        self.ops.push(WriteOp::Delete(id));
    }

    pub fn delete_where(&mut self, filter: InstanceFilter) {
        self.ops.push(WriteOp::DeleteWhere(filter));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

impl IntoIterator for WriteBatch {
    type Item = WriteOp;
    type IntoIter = std::vec::IntoIter<WriteOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Storage the reconciler writes through. `commit` must be atomic.
pub trait InstanceStore {
    /// Matching instances ordered by occurrence, then name.
    fn fetch_all(&self, filter: &InstanceFilter) -> Result<Vec<ExpenseInstance>>;

    fn commit(&mut self, batch: WriteBatch) -> Result<CommitSummary>;

    fn get(&self, id: Uuid) -> Result<Option<ExpenseInstance>> {
        Ok(self
            .fetch_all(&InstanceFilter::instance(id))?
            .into_iter()
            .next())
    }

    fn insert(&mut self, instance: ExpenseInstance) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.insert(instance);
        self.commit(batch).map(|_| ())
    }

    fn delete_where(&mut self, filter: &InstanceFilter) -> Result<usize> {
        let mut batch = WriteBatch::new();
        batch.delete_where(filter.clone());
        Ok(self.commit(batch)?.deleted)
    }
}

/// In-process store. Batches are applied to a copy that replaces the live
/// map only when every op succeeded.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    instances: BTreeMap<Uuid, ExpenseInstance>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl InstanceStore for MemoryStore {
    fn fetch_all(&self, filter: &InstanceFilter) -> Result<Vec<ExpenseInstance>> {
        let mut out: Vec<ExpenseInstance> = self
            .instances
            .values()
            .filter(|inst| filter.matches(inst))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            (a.occurrence(), a.name(), a.id()).cmp(&(b.occurrence(), b.name(), b.id()))
        });
        Ok(out)
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<CommitSummary> {
        let mut staged = self.instances.clone();
        let mut summary = CommitSummary::default();
        for op in batch {
            match op {
                WriteOp::Insert(inst) => {
                    if staged.contains_key(&inst.id()) {
                        return Err(PlanError::CorruptRow(format!(
                            "duplicate instance id {}",
                            inst.id()
                        )));
                    }
                    staged.insert(inst.id(), inst);
                    summary.inserted += 1;
                }
                WriteOp::Replace(inst) => {
                    let slot = staged
                        .get_mut(&inst.id())
                        .ok_or(PlanError::InstanceNotFound(inst.id()))?;
                    *slot = inst;
                    summary.updated += 1;
                }
                WriteOp::SetPayment { id, payment } => {
                    let slot = staged
                        .get_mut(&id)
                        .ok_or(PlanError::InstanceNotFound(id))?;
                    slot.payment = payment;
                    summary.updated += 1;
                }
                WriteOp::Delete(id) => {
                    if staged.remove(&id).is_some() {
                        summary.deleted += 1;
                    }
                }
                WriteOp::DeleteWhere(filter) => {
                    let before = staged.len();
                    staged.retain(|_, inst| !filter.matches(inst));
                    summary.deleted += before - staged.len();
                }
            }
        }
        self.instances = staged;
        debug!(?summary, "memory store commit");
        Ok(summary)
    }
}
