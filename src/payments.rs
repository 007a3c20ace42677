// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use crate::error::{PlanError, Result};
use crate::models::{PaymentMethod, PaymentState};
use crate::store::{InstanceStore, WriteBatch};

/// Marks an instance paid, or unpaid (forgetting its details) if it already was.
pub fn toggle_paid<S: InstanceStore + ?Sized>(store: &mut S, id: Uuid) -> Result<PaymentState> {
    let inst = store.get(id)?.ok_or(PlanError::InstanceNotFound(id))?;
    let next = inst.payment.toggled();
    write_payment(store, id, next)
}

/// Stores payment details and marks the instance paid. A blank source is dropped.
pub fn record_payment<S: InstanceStore + ?Sized>(
    store: &mut S,
    id: Uuid,
    date: NaiveDate,
    method: Option<PaymentMethod>,
    source: Option<&str>,
) -> Result<PaymentState> {
    if store.get(id)?.is_none() {
        return Err(PlanError::InstanceNotFound(id));
    }
    write_payment(store, id, PaymentState::recorded(date, method, source))
}

fn write_payment<S: InstanceStore + ?Sized>(
    store: &mut S,
    id: Uuid,
    payment: PaymentState,
) -> Result<PaymentState> {
    let mut batch = WriteBatch::new();
    batch.set_payment(id, payment.clone());
    store.commit(batch)?;
    info!(instance = %id, paid = payment.is_paid, "payment state updated");
    Ok(payment)
}
