// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PlanError, Result};

pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

/// A calendar month. Field order makes the derived ordering chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawMonthYear")]
pub struct MonthYear {
    year: i32,
    month: u32,
}

#[derive(Deserialize)]
struct RawMonthYear {
    year: i32,
    month: u32,
}

impl TryFrom<RawMonthYear> for MonthYear {
    type Error = PlanError;

    fn try_from(raw: RawMonthYear) -> Result<Self> {
        MonthYear::new(raw.month, raw.year)
    }
}

impl MonthYear {
    pub fn new(month: u32, year: i32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(PlanError::Validation(format!(
                "month {} is out of range (1-12)",
                month
            )));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(PlanError::Validation(format!(
                "year {} is out of range ({}-{})",
                year, MIN_YEAR, MAX_YEAR
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn year(self) -> i32 {
        self.year
    }

    /// Months elapsed since year 0, used for span arithmetic.
    pub fn ordinal(self) -> i64 {
        self.year as i64 * 12 + self.month as i64
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub(crate) fn with_year(self, year: i32) -> Self {
        Self {
            year,
            month: self.month,
        }
    }
}

impl fmt::Display for MonthYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthYear {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || PlanError::Validation(format!("invalid month '{}', expected YYYY-MM", s));
        let (y, m) = s.split_once('-').ok_or_else(invalid)?;
        let year: i32 = y.parse().map_err(|_| invalid())?;
        let month: u32 = m.parse().map_err(|_| invalid())?;
        MonthYear::new(month, year)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[serde(rename = "once")]
    OneTime,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn is_recurring(self) -> bool {
        !matches!(self, Frequency::OneTime)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::OneTime => "once",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "once" | "one-time" | "onetime" => Ok(Frequency::OneTime),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(PlanError::Validation(format!(
                "unknown frequency '{}' (use once|monthly|yearly)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseType {
    Fixed,
    Variable,
}

impl ExpenseType {
    pub fn as_str(self) -> &'static str {
        match self {
            ExpenseType::Fixed => "fixed",
            ExpenseType::Variable => "variable",
        }
    }
}

impl FromStr for ExpenseType {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(ExpenseType::Fixed),
            "variable" => Ok(ExpenseType::Variable),
            other => Err(PlanError::Validation(format!(
                "unknown expense type '{}' (use fixed|variable)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    BankTransfer,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Cash => "cash",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "Credit Card",
            PaymentMethod::BankTransfer => "Bank Transfer",
            PaymentMethod::Cash => "Cash",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "credit_card" | "card" => Ok(PaymentMethod::CreditCard),
            "bank_transfer" | "bank" => Ok(PaymentMethod::BankTransfer),
            "cash" => Ok(PaymentMethod::Cash),
            other => Err(PlanError::Validation(format!(
                "unknown payment method '{}' (use card|bank|cash)",
                other
            ))),
        }
    }
}

/// Fields shared by every instance of a series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesFields {
    pub name: String,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub expense_type: ExpenseType,
    pub due_day: Option<u32>,
    pub note: Option<String>,
}

impl SeriesFields {
    pub fn new(name: impl Into<String>, amount: Decimal, expense_type: ExpenseType) -> Self {
        Self {
            name: name.into(),
            amount,
            expense_type,
            due_day: None,
            note: None,
        }
    }
}

/// Per-instance payment metadata, written independently of the series fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentState {
    pub is_paid: bool,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_source: Option<String>,
}

impl PaymentState {
    /// Flips the paid flag. Unmarking also forgets the payment details.
    pub fn toggled(&self) -> PaymentState {
        if self.is_paid {
            PaymentState::default()
        } else {
            PaymentState {
                is_paid: true,
                ..self.clone()
            }
        }
    }

    pub fn recorded(
        date: NaiveDate,
        method: Option<PaymentMethod>,
        source: Option<&str>,
    ) -> PaymentState {
        let source = source
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        PaymentState {
            is_paid: true,
            payment_date: Some(date),
            payment_method: method,
            payment_source: source,
        }
    }
}

/// Inclusive range of a recurring series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Boundary {
    pub start: MonthYear,
    pub end: MonthYear,
}

impl Boundary {
    pub fn contains(&self, occurrence: MonthYear) -> bool {
        self.start <= occurrence && occurrence <= self.end
    }
}

/// The logical definition of a series as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesDefinition {
    pub series_id: Uuid,
    pub fields: SeriesFields,
    pub frequency: Frequency,
    pub start: MonthYear,
    pub end: Option<MonthYear>,
}

impl SeriesDefinition {
    pub fn new(fields: SeriesFields, frequency: Frequency, start: MonthYear) -> Self {
        Self {
            series_id: Uuid::new_v4(),
            fields,
            frequency,
            start,
            end: None,
        }
    }

    pub fn with_end(mut self, end: MonthYear) -> Self {
        self.end = Some(end);
        self
    }

    /// Rebuilds the definition an instance was materialized from.
    pub fn from_instance(instance: &ExpenseInstance) -> Self {
        let (start, end) = match instance.boundary {
            Some(b) => (b.start, Some(b.end)),
            None => (instance.occurrence, None),
        };
        Self {
            series_id: instance.series_id,
            fields: instance.fields.clone(),
            frequency: instance.frequency,
            start,
            end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditScope {
    ThisInstanceOnly,
    #[default]
    AllOccurrences,
}

impl FromStr for EditScope {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "this" | "one" | "instance" => Ok(EditScope::ThisInstanceOnly),
            "all" | "series" => Ok(EditScope::AllOccurrences),
            other => Err(PlanError::Validation(format!(
                "unknown scope '{}' (use this|all)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildStrategy {
    /// Keep overlapping instances, delete the excess, insert the missing.
    #[default]
    Incremental,
    /// Snapshot payments, delete every instance, rematerialize, restore.
    Full,
}

impl RebuildStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            RebuildStrategy::Incremental => "incremental",
            RebuildStrategy::Full => "full",
        }
    }
}

impl FromStr for RebuildStrategy {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "incremental" => Ok(RebuildStrategy::Incremental),
            "full" => Ok(RebuildStrategy::Full),
            other => Err(PlanError::Validation(format!(
                "unknown rebuild strategy '{}' (use incremental|full)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRequest {
    pub definition: SeriesDefinition,
    pub action: Action,
    pub scope: EditScope,
    /// The occurrence being edited; defaults to the definition's start.
    pub occurrence: Option<MonthYear>,
}

impl MutationRequest {
    pub fn add(definition: SeriesDefinition) -> Self {
        Self {
            definition,
            action: Action::Add,
            scope: EditScope::AllOccurrences,
            occurrence: None,
        }
    }

    pub fn update(definition: SeriesDefinition, scope: EditScope) -> Self {
        Self {
            definition,
            action: Action::Update,
            scope,
            occurrence: None,
        }
    }

    pub fn delete(definition: SeriesDefinition, scope: EditScope) -> Self {
        Self {
            definition,
            action: Action::Delete,
            scope,
            occurrence: None,
        }
    }

    pub fn at(mut self, occurrence: MonthYear) -> Self {
        self.occurrence = Some(occurrence);
        self
    }

    pub fn locator(&self) -> MonthYear {
        self.occurrence.unwrap_or(self.definition.start)
    }
}

/// A materialized occurrence of a series. Everything but `payment` is owned by
/// the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseInstance {
    pub(crate) id: Uuid,
    pub(crate) series_id: Uuid,
    pub(crate) fields: SeriesFields,
    pub(crate) frequency: Frequency,
    pub(crate) occurrence: MonthYear,
    pub(crate) boundary: Option<Boundary>,
    pub payment: PaymentState,
}

impl ExpenseInstance {
    pub(crate) fn materialize(
        series_id: Uuid,
        fields: &SeriesFields,
        frequency: Frequency,
        occurrence: MonthYear,
        boundary: Option<Boundary>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            series_id,
            fields: fields.clone(),
            frequency,
            occurrence,
            boundary: boundary.filter(|_| frequency.is_recurring()),
            payment: PaymentState::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn series_id(&self) -> Uuid {
        self.series_id
    }

    pub fn fields(&self) -> &SeriesFields {
        &self.fields
    }

    pub fn name(&self) -> &str {
        &self.fields.name
    }

    pub fn amount(&self) -> Decimal {
        self.fields.amount
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn occurrence(&self) -> MonthYear {
        self.occurrence
    }

    pub fn boundary(&self) -> Option<Boundary> {
        self.boundary
    }

    pub(crate) fn apply_fields(&mut self, fields: &SeriesFields) {
        self.fields = fields.clone();
    }

    pub(crate) fn reschedule(
        &mut self,
        frequency: Frequency,
        occurrence: MonthYear,
        boundary: Option<Boundary>,
    ) {
        self.frequency = frequency;
        self.occurrence = occurrence;
        self.boundary = boundary.filter(|_| frequency.is_recurring());
    }

    /// Turns the instance into a one-off, keeping its series id and date.
    pub(crate) fn detach(&mut self) {
        self.frequency = Frequency::OneTime;
        self.boundary = None;
    }

    pub fn to_record(&self) -> InstanceRecord {
        InstanceRecord {
            id: self.id,
            series_id: self.series_id,
            name: self.fields.name.clone(),
            amount: self.fields.amount,
            expense_type: self.fields.expense_type,
            frequency: self.frequency,
            month: self.occurrence.month(),
            year: self.occurrence.year(),
            start_month: self.boundary.map(|b| b.start.month()),
            start_year: self.boundary.map(|b| b.start.year()),
            end_month: self.boundary.map(|b| b.end.month()),
            end_year: self.boundary.map(|b| b.end.year()),
            due_day: self.fields.due_day,
            note: self.fields.note.clone(),
            is_paid: self.payment.is_paid,
            payment_date: self.payment.payment_date,
            payment_method: self.payment.payment_method,
            payment_source: self.payment.payment_source.clone(),
        }
    }
}

/// Flat, canonical shape of a persisted instance (used for export).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub id: Uuid,
    pub series_id: Uuid,
    pub name: String,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub expense_type: ExpenseType,
    pub frequency: Frequency,
    pub month: u32,
    pub year: i32,
    pub start_month: Option<u32>,
    pub start_year: Option<i32>,
    pub end_month: Option<u32>,
    pub end_year: Option<i32>,
    pub due_day: Option<u32>,
    pub note: Option<String>,
    pub is_paid: bool,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_source: Option<String>,
}
