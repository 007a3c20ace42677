// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, PlanError>;

/// Failures surfaced by validation, reconciliation and the instance stores.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
    #[error("Invalid expense: {0}")]
    Validation(String),
    #[error("No expense instances found for series {series_id}")]
    NotFound { series_id: Uuid },
    #[error("Series {series_id} already has instances")]
    DuplicateSeries { series_id: Uuid },
    #[error("No expense instance with id {0}")]
    InstanceNotFound(Uuid),
    #[error("Storage error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("Corrupt stored row: {0}")]
    CorruptRow(String),
}
