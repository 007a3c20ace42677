// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::load_settings;
use crate::db::{SqliteStore, with_write_lock};
use crate::models::{
    EditScope, ExpenseInstance, ExpenseType, Frequency, InstanceRecord, MonthYear,
    MutationRequest, SeriesDefinition, SeriesFields,
};
use crate::reconcile::{Reconciliation, Reconciler};
use crate::store::{InstanceFilter, InstanceStore};
use crate::utils::{
    fmt_amount, maybe_print_json, opt_arg, parse_decimal, parse_month, parse_uuid, pretty_table,
    req_arg, today,
};
use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;
use uuid::Uuid;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("update", sub)) => update(conn, sub)?,
        Some(("delete", sub)) => delete(conn, sub)?,
        Some(("show", sub)) => show(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn add(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let fields = SeriesFields {
        name: req_arg(sub, "name")?.to_string(),
        amount: parse_decimal(req_arg(sub, "amount")?)?,
        expense_type: opt_arg(sub, "type")
            .map(str::parse::<ExpenseType>)
            .transpose()?
            .unwrap_or(ExpenseType::Fixed),
        due_day: sub.get_one::<u32>("due_day").copied(),
        note: opt_arg(sub, "note").map(str::to_string),
    };
    let frequency = opt_arg(sub, "frequency")
        .map(str::parse::<Frequency>)
        .transpose()?
        .unwrap_or(Frequency::Monthly);
    let start = parse_month(req_arg(sub, "start")?)?;
    let mut def = SeriesDefinition::new(fields, frequency, start);
    if let Some(end) = opt_arg(sub, "end") {
        def = def.with_end(parse_month(end)?);
    }

    let outcome = reconcile(conn, &MutationRequest::add(def.clone()))?;
    println!(
        "Added '{}' ({}) as series {} with {} instance(s)",
        def.fields.name, def.frequency, outcome.series_id, outcome.inserted
    );
    Ok(())
}

fn update(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (current, scope, origin) = locate_definition(conn, sub)?;
    let mut def = current.clone();

    if let Some(name) = opt_arg(sub, "name") {
        def.fields.name = name.to_string();
    }
    if let Some(amount) = opt_arg(sub, "amount") {
        def.fields.amount = parse_decimal(amount)?;
    }
    if let Some(t) = opt_arg(sub, "type") {
        def.fields.expense_type = t.parse()?;
    }
    if let Some(day) = sub.get_one::<u32>("due_day") {
        def.fields.due_day = Some(*day);
    }
    if let Some(note) = opt_arg(sub, "note") {
        def.fields.note = Some(note.to_string());
    }
    if sub.get_flag("clear_note") {
        def.fields.note = None;
    }
    if let Some(f) = opt_arg(sub, "frequency") {
        def.frequency = f.parse()?;
        if def.frequency != current.frequency {
            def.end = None;
        }
    }
    if let Some(start) = opt_arg(sub, "start") {
        def.start = parse_month(start)?;
    }
    if let Some(end) = opt_arg(sub, "end") {
        def.end = Some(parse_month(end)?);
    }

    let request = MutationRequest::update(def, scope).at(origin);
    let outcome = reconcile(conn, &request)?;
    println!(
        "Updated series {} via {:?}: {} added, {} changed, {} removed",
        outcome.series_id, outcome.path, outcome.inserted, outcome.updated, outcome.deleted
    );
    Ok(())
}

fn delete(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (current, scope, origin) = locate_definition(conn, sub)?;
    let request = MutationRequest::delete(current, scope).at(origin);
    let outcome = reconcile(conn, &request)?;
    println!(
        "Removed {} instance(s) of series {}",
        outcome.deleted, outcome.series_id
    );
    Ok(())
}

/// Rebuilds the stored definition the command refers to, plus the scope and
/// the occurrence being edited.
fn locate_definition(
    conn: &mut Connection,
    sub: &clap::ArgMatches,
) -> Result<(SeriesDefinition, EditScope, MonthYear)> {
    let series_id = parse_uuid(req_arg(sub, "series")?)?;
    let scope: EditScope = opt_arg(sub, "scope").unwrap_or("all").parse()?;
    let at = opt_arg(sub, "at").map(parse_month).transpose()?;
    if scope == EditScope::ThisInstanceOnly && at.is_none() {
        return Err(anyhow!("--at is required with --scope this"));
    }

    let store = SqliteStore::new(conn);
    let instances = store.fetch_all(&InstanceFilter::series(series_id))?;
    let anchor = pick_anchor(&instances, at)
        .ok_or_else(|| anyhow!(not_found_message(series_id, at)))?;
    let def = SeriesDefinition::from_instance(anchor);
    let origin = at.unwrap_or(anchor.occurrence());
    Ok((def, scope, origin))
}

fn pick_anchor(instances: &[ExpenseInstance], at: Option<MonthYear>) -> Option<&ExpenseInstance> {
    match at {
        Some(at) => {
            let here: Vec<&ExpenseInstance> =
                instances.iter().filter(|i| i.occurrence() == at).collect();
            here.iter()
                .find(|i| i.frequency().is_recurring())
                .or_else(|| here.first())
                .copied()
        }
        None => instances
            .iter()
            .find(|i| i.frequency().is_recurring())
            .or_else(|| instances.first()),
    }
}

fn not_found_message(series_id: Uuid, at: Option<MonthYear>) -> String {
    match at {
        Some(at) => format!("Series {} has no instance in {}", series_id, at),
        None => format!("Series {} not found", series_id),
    }
}

fn reconcile(conn: &mut Connection, request: &MutationRequest) -> Result<Reconciliation> {
    with_write_lock(conn, |conn| {
        let settings = load_settings(conn)?;
        let mut store = SqliteStore::new(conn);
        let outcome = Reconciler::new(&mut store)
            .with_settings(settings)
            .apply(request, today())
            .with_context(|| {
                format!(
                    "Could not apply change to series {}",
                    request.definition.series_id
                )
            })?;
        Ok(outcome)
    })
}

/// The series as a whole: its stored definition plus every instance, detached
/// one-offs included.
#[derive(Debug, serde::Serialize)]
pub struct SeriesView {
    pub definition: SeriesDefinition,
    pub planned: rust_decimal::Decimal,
    pub paid: usize,
    pub instances: Vec<InstanceRecord>,
}

pub fn series_view(conn: &mut Connection, series_id: Uuid) -> Result<SeriesView> {
    let store = SqliteStore::new(conn);
    let instances = store.fetch_all(&InstanceFilter::series(series_id))?;
    let anchor = pick_anchor(&instances, None)
        .ok_or_else(|| anyhow!(not_found_message(series_id, None)))?;
    Ok(SeriesView {
        definition: SeriesDefinition::from_instance(anchor),
        planned: instances.iter().map(ExpenseInstance::amount).sum(),
        paid: instances.iter().filter(|i| i.payment.is_paid).count(),
        instances: instances.iter().map(ExpenseInstance::to_record).collect(),
    })
}

fn show(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let series_id = parse_uuid(req_arg(sub, "series")?)?;
    let view = series_view(conn, series_id)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &view)? {
        return Ok(());
    }
    let def = &view.definition;
    let range = match def.end {
        Some(end) if def.frequency.is_recurring() => format!("{} to {}", def.start, end),
        _ => def.start.to_string(),
    };
    println!(
        "{} ({}, {}) {} per occurrence, {}",
        def.fields.name,
        def.frequency,
        def.fields.expense_type.as_str(),
        fmt_amount(&def.fields.amount),
        range
    );
    println!(
        "{} instance(s), {} paid, {} planned",
        view.instances.len(),
        view.paid,
        fmt_amount(&view.planned)
    );
    let rows = view
        .instances
        .iter()
        .map(|r| {
            vec![
                format!("{:04}-{:02}", r.year, r.month),
                fmt_amount(&r.amount),
                r.frequency.to_string(),
                if r.is_paid { "yes".into() } else { "no".into() },
                r.id.to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Month", "Amount", "Freq", "Paid", "Id"], rows)
    );
    Ok(())
}

fn list(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let data = query_instances(conn, sub)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    format!("{:04}-{:02}", r.year, r.month),
                    r.name.clone(),
                    fmt_amount(&r.amount),
                    r.frequency.to_string(),
                    r.expense_type.as_str().to_string(),
                    r.due_day.map(|d| d.to_string()).unwrap_or_default(),
                    if r.is_paid { "yes".into() } else { "no".into() },
                    r.id.to_string(),
                    r.series_id.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Month", "Name", "Amount", "Freq", "Type", "Due", "Paid", "Id", "Series"],
                rows,
            )
        );
    }
    Ok(())
}

pub fn query_instances(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<Vec<InstanceRecord>> {
    let mut filter = InstanceFilter::all();
    if let Some(month) = opt_arg(sub, "month") {
        filter = filter.at(parse_month(month)?);
    }
    if let Some(year) = sub.get_one::<i32>("year") {
        filter = filter.in_year(*year);
    }
    if let Some(series) = opt_arg(sub, "series") {
        filter.series_id = Some(parse_uuid(series)?);
    }
    let store = SqliteStore::new(conn);
    Ok(store
        .fetch_all(&filter)?
        .iter()
        .map(ExpenseInstance::to_record)
        .collect())
}
