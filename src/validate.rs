// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;

use crate::error::{PlanError, Result};
use crate::models::{SeriesDefinition, SeriesFields};

/// Largest amount a single occurrence may carry. Keeps report totals well
/// inside `Decimal` range.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

pub fn validate_fields(fields: &SeriesFields) -> Result<()> {
    if fields.name.trim().is_empty() {
        return Err(PlanError::Validation("name must not be empty".into()));
    }
    if fields.amount.is_sign_negative() || fields.amount.is_zero() {
        return Err(PlanError::Validation(format!(
            "amount must be positive, got {}",
            fields.amount
        )));
    }
    if fields.amount > MAX_AMOUNT {
        return Err(PlanError::Validation(format!(
            "amount {} exceeds the limit of {}",
            fields.amount, MAX_AMOUNT
        )));
    }
    if let Some(day) = fields.due_day {
        if !(1..=31).contains(&day) {
            return Err(PlanError::Validation(format!(
                "due day {} is out of range (1-31)",
                day
            )));
        }
    }
    Ok(())
}

/// Caller-facing checks run before a definition reaches the reconciler.
/// Month ranges are already guaranteed by `MonthYear`.
pub fn validate_definition(def: &SeriesDefinition) -> Result<()> {
    validate_fields(&def.fields)
}
