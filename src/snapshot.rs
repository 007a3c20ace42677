// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;

use crate::models::{ExpenseInstance, MonthYear, PaymentState};

/// Payment state of one series keyed by occurrence, captured before a rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentSnapshot {
    states: HashMap<MonthYear, PaymentState>,
}

impl PaymentSnapshot {
    pub fn capture<'a>(instances: impl IntoIterator<Item = &'a ExpenseInstance>) -> Self {
        let mut states: HashMap<MonthYear, PaymentState> = HashMap::new();
        for inst in instances {
            match states.get(&inst.occurrence()) {
                // a paid duplicate wins over an unpaid one
                Some(existing) if existing.is_paid || !inst.payment.is_paid => {}
                _ => {
                    states.insert(inst.occurrence(), inst.payment.clone());
                }
            }
        }
        Self { states }
    }

    pub fn get(&self, occurrence: MonthYear) -> Option<&PaymentState> {
        self.states.get(&occurrence)
    }

    /// Copies the captured state onto a freshly materialized instance.
    /// Returns false when nothing was captured for that occurrence.
    pub fn restore(&self, occurrence: MonthYear, instance: &mut ExpenseInstance) -> bool {
        match self.states.get(&occurrence) {
            Some(state) => {
                instance.payment = state.clone();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn paid_count(&self) -> usize {
        self.states.values().filter(|s| s.is_paid).count()
    }
}
