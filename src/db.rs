// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params, params_from_iter};
use rust_decimal::Decimal;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use crate::error::{PlanError, Result as PlanResult};
use crate::models::{
    Boundary, ExpenseInstance, ExpenseType, Frequency, MonthYear, PaymentMethod, PaymentState,
    SeriesFields,
};
use crate::store::{CommitSummary, InstanceFilter, InstanceStore, WriteBatch, WriteOp};
use crate::validate::MAX_AMOUNT;

static APP: Lazy<(&str, &str, &str)> = Lazy::new(|| ("com.duebook", "Duebook", "duebook"));

pub const DB_ENV: &str = "DUEBOOK_DB";

pub fn db_path() -> Result<PathBuf> {
    if let Ok(p) = std::env::var(DB_ENV) {
        if !p.trim().is_empty() {
            return Ok(PathBuf::from(p.trim()));
        }
    }
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("duebook.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    let conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS expense_instances(
        id TEXT PRIMARY KEY,
        series_id TEXT NOT NULL,
        name TEXT NOT NULL,
        amount TEXT NOT NULL,
        type TEXT NOT NULL CHECK(type IN ('fixed','variable')),
        frequency TEXT NOT NULL CHECK(frequency IN ('once','monthly','yearly')),
        month INTEGER NOT NULL CHECK(month BETWEEN 1 AND 12),
        year INTEGER NOT NULL,
        start_month INTEGER,
        start_year INTEGER,
        end_month INTEGER,
        end_year INTEGER,
        due_day INTEGER CHECK(due_day IS NULL OR due_day BETWEEN 1 AND 31),
        note TEXT,
        is_paid INTEGER NOT NULL DEFAULT 0,
        payment_date TEXT,
        payment_method TEXT,
        payment_source TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_instances_series ON expense_instances(series_id);
    CREATE INDEX IF NOT EXISTS idx_instances_occurrence ON expense_instances(year, month);
    "#,
    )?;
    Ok(())
}

/// Runs `f` under `BEGIN IMMEDIATE`, so the reads a change is planned from and
/// the commit that applies it see the same database state. Rolls back if `f` fails.
pub fn with_write_lock<T>(
    conn: &mut Connection,
    f: impl FnOnce(&mut Connection) -> Result<T>,
) -> Result<T> {
    conn.execute_batch("BEGIN IMMEDIATE")
        .context("Could not lock the database for writing")?;
    match f(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                debug!(error = %rollback, "rollback after failed write");
            }
            Err(e)
        }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, series_id, name, amount, type, frequency, month, year, \
     start_month, start_year, end_month, end_year, due_day, note, \
     is_paid, payment_date, payment_method, payment_source FROM expense_instances";

/// `InstanceStore` over the `expense_instances` table. Each batch runs in one
/// SQLite transaction.
pub struct SqliteStore<'c> {
    conn: &'c mut Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c mut Connection) -> Self {
        Self { conn }
    }
}

impl InstanceStore for SqliteStore<'_> {
    fn fetch_all(&self, filter: &InstanceFilter) -> PlanResult<Vec<ExpenseInstance>> {
        let (clause, values) = where_clause(filter);
        let sql = format!(
            "{}{} ORDER BY year, month, name, id",
            SELECT_COLUMNS, clause
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), RawRow::read)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.decode()?);
        }
        Ok(out)
    }

    fn commit(&mut self, batch: WriteBatch) -> PlanResult<CommitSummary> {
        // a savepoint nests inside `with_write_lock` and acts as a transaction outside it
        let tx = self.conn.savepoint()?;
        let mut summary = CommitSummary::default();
        for op in batch {
            match op {
                WriteOp::Insert(inst) => {
                    tx.execute(
                        "INSERT INTO expense_instances(id, series_id, name, amount, type, frequency, \
                         month, year, start_month, start_year, end_month, end_year, due_day, note, \
                         is_paid, payment_date, payment_method, payment_source) \
                         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)",
                        params_from_iter(row_values(&inst)),
                    )?;
                    summary.inserted += 1;
                }
                WriteOp::Replace(inst) => {
                    let mut values = row_values(&inst);
                    // id goes last for the WHERE clause
                    let id = values.remove(0);
                    values.push(id);
                    let changed = tx.execute(
                        "UPDATE expense_instances SET series_id=?1, name=?2, amount=?3, type=?4, \
                         frequency=?5, month=?6, year=?7, start_month=?8, start_year=?9, \
                         end_month=?10, end_year=?11, due_day=?12, note=?13, is_paid=?14, \
                         payment_date=?15, payment_method=?16, payment_source=?17 WHERE id=?18",
                        params_from_iter(values),
                    )?;
                    if changed == 0 {
                        return Err(PlanError::InstanceNotFound(inst.id()));
                    }
                    summary.updated += 1;
                }
                WriteOp::SetPayment { id, payment } => {
                    let changed = tx.execute(
                        "UPDATE expense_instances SET is_paid=?1, payment_date=?2, \
                         payment_method=?3, payment_source=?4 WHERE id=?5",
                        params![
                            payment.is_paid,
                            payment.payment_date.map(|d| d.to_string()),
                            payment.payment_method.map(PaymentMethod::as_str),
                            payment.payment_source,
                            id.to_string()
                        ],
                    )?;
                    if changed == 0 {
                        return Err(PlanError::InstanceNotFound(id));
                    }
                    summary.updated += 1;
                }
                WriteOp::Delete(id) => {
                    summary.deleted += tx.execute(
                        "DELETE FROM expense_instances WHERE id=?1",
                        params![id.to_string()],
                    )?;
                }
                WriteOp::DeleteWhere(filter) => {
                    let (clause, values) = where_clause(&filter);
                    let sql = format!("DELETE FROM expense_instances{}", clause);
                    summary.deleted += tx.execute(&sql, params_from_iter(values))?;
                }
            }
        }
        tx.commit()?;
        debug!(?summary, "sqlite store commit");
        Ok(summary)
    }
}

fn where_clause(filter: &InstanceFilter) -> (String, Vec<Value>) {
    let mut parts: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(id) = filter.id {
        values.push(Value::Text(id.to_string()));
        parts.push(format!("id=?{}", values.len()));
    }
    if let Some(series_id) = filter.series_id {
        values.push(Value::Text(series_id.to_string()));
        parts.push(format!("series_id=?{}", values.len()));
    }
    if let Some(freqs) = &filter.frequencies {
        if freqs.is_empty() {
            parts.push("0".into());
        } else {
            let mut slots = Vec::new();
            for f in freqs {
                values.push(Value::Text(f.as_str().to_string()));
                slots.push(format!("?{}", values.len()));
            }
            parts.push(format!("frequency IN ({})", slots.join(",")));
        }
    }
    if let Some(occ) = filter.occurrence {
        values.push(Value::Integer(occ.month() as i64));
        parts.push(format!("month=?{}", values.len()));
        values.push(Value::Integer(occ.year() as i64));
        parts.push(format!("year=?{}", values.len()));
    }
    if let Some(year) = filter.year {
        values.push(Value::Integer(year as i64));
        parts.push(format!("year=?{}", values.len()));
    }

    if parts.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", parts.join(" AND ")), values)
    }
}

fn row_values(inst: &ExpenseInstance) -> Vec<Value> {
    let opt_int = |v: Option<i64>| v.map(Value::Integer).unwrap_or(Value::Null);
    let opt_text = |v: Option<String>| v.map(Value::Text).unwrap_or(Value::Null);
    let fields = inst.fields();
    let boundary = inst.boundary();
    vec![
        Value::Text(inst.id().to_string()),
        Value::Text(inst.series_id().to_string()),
        Value::Text(fields.name.clone()),
        Value::Text(fields.amount.to_string()),
        Value::Text(fields.expense_type.as_str().to_string()),
        Value::Text(inst.frequency().as_str().to_string()),
        Value::Integer(inst.occurrence().month() as i64),
        Value::Integer(inst.occurrence().year() as i64),
        opt_int(boundary.map(|b| b.start.month() as i64)),
        opt_int(boundary.map(|b| b.start.year() as i64)),
        opt_int(boundary.map(|b| b.end.month() as i64)),
        opt_int(boundary.map(|b| b.end.year() as i64)),
        opt_int(fields.due_day.map(i64::from)),
        opt_text(fields.note.clone()),
        Value::Integer(inst.payment.is_paid as i64),
        opt_text(inst.payment.payment_date.map(|d| d.to_string())),
        opt_text(
            inst.payment
                .payment_method
                .map(|m| m.as_str().to_string()),
        ),
        opt_text(inst.payment.payment_source.clone()),
    ]
}

/// Column values as stored, before domain checks.
struct RawRow {
    id: String,
    series_id: String,
    name: String,
    amount: String,
    expense_type: String,
    frequency: String,
    month: u32,
    year: i32,
    start_month: Option<u32>,
    start_year: Option<i32>,
    end_month: Option<u32>,
    end_year: Option<i32>,
    due_day: Option<u32>,
    note: Option<String>,
    is_paid: bool,
    payment_date: Option<String>,
    payment_method: Option<String>,
    payment_source: Option<String>,
}

impl RawRow {
    fn read(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            series_id: r.get(1)?,
            name: r.get(2)?,
            amount: r.get(3)?,
            expense_type: r.get(4)?,
            frequency: r.get(5)?,
            month: r.get(6)?,
            year: r.get(7)?,
            start_month: r.get(8)?,
            start_year: r.get(9)?,
            end_month: r.get(10)?,
            end_year: r.get(11)?,
            due_day: r.get(12)?,
            note: r.get(13)?,
            is_paid: r.get(14)?,
            payment_date: r.get(15)?,
            payment_method: r.get(16)?,
            payment_source: r.get(17)?,
        })
    }

    fn decode(self) -> PlanResult<ExpenseInstance> {
        let corrupt = |what: &str, v: &str| {
            PlanError::CorruptRow(format!("{} '{}' in instance {}", what, v, self.id))
        };
        let id = Uuid::parse_str(&self.id).map_err(|_| corrupt("id", &self.id))?;
        let series_id =
            Uuid::parse_str(&self.series_id).map_err(|_| corrupt("series id", &self.series_id))?;
        let amount = Decimal::from_str(&self.amount)
            .ok()
            .filter(|a| *a <= MAX_AMOUNT)
            .ok_or_else(|| corrupt("amount", &self.amount))?;
        let expense_type = ExpenseType::from_str(&self.expense_type)
            .map_err(|_| corrupt("type", &self.expense_type))?;
        let frequency = Frequency::from_str(&self.frequency)
            .map_err(|_| corrupt("frequency", &self.frequency))?;
        let occurrence = MonthYear::new(self.month, self.year)
            .map_err(|_| corrupt("month", &self.month.to_string()))?;
        let boundary = match (self.start_month, self.start_year, self.end_month, self.end_year) {
            (Some(sm), Some(sy), Some(em), Some(ey)) => Some(Boundary {
                start: MonthYear::new(sm, sy).map_err(|_| corrupt("start month", &sm.to_string()))?,
                end: MonthYear::new(em, ey).map_err(|_| corrupt("end month", &em.to_string()))?,
            }),
            _ => None,
        };
        let payment_date = match &self.payment_date {
            Some(d) => Some(
                chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d")
                    .map_err(|_| corrupt("payment date", d))?,
            ),
            None => None,
        };
        let payment_method = match &self.payment_method {
            Some(m) => Some(PaymentMethod::from_str(m).map_err(|_| corrupt("payment method", m))?),
            None => None,
        };
        Ok(ExpenseInstance {
            id,
            series_id,
            fields: SeriesFields {
                name: self.name,
                amount,
                expense_type,
                due_day: self.due_day,
                note: self.note,
            },
            frequency,
            occurrence,
            boundary,
            payment: PaymentState {
                is_paid: self.is_paid,
                payment_date,
                payment_method,
                payment_source: self.payment_source,
            },
        })
    }
}
