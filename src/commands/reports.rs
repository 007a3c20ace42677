// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db::SqliteStore;
use crate::models::MonthYear;
use crate::projection::{MonthOverview, YearSection, month_overview, year_section, year_sections};
use crate::store::{InstanceFilter, InstanceStore};
use crate::utils::{fmt_amount, maybe_print_json, opt_arg, parse_month, pretty_table, today};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("month", sub)) => month(conn, sub)?,
        Some(("year", sub)) => year(conn, sub)?,
        Some(("all", sub)) => all(conn, sub)?,
        _ => {}
    }
    Ok(())
}

pub fn month_report(conn: &mut Connection, month: MonthYear) -> Result<MonthOverview> {
    let store = SqliteStore::new(conn);
    let instances = store.fetch_all(&InstanceFilter::all().at(month))?;
    Ok(month_overview(&instances, month))
}

fn month(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let month = match opt_arg(sub, "month") {
        Some(m) => parse_month(m)?,
        None => MonthYear::from_date(today()),
    };
    let overview = month_report(conn, month)?;
    if !maybe_print_json(json_flag, jsonl_flag, &overview)? {
        let data = vec![
            vec!["Planned".into(), fmt_amount(&overview.totals.planned)],
            vec!["Paid".into(), fmt_amount(&overview.totals.paid)],
            vec!["Unpaid items".into(), overview.totals.unpaid_count.to_string()],
            vec!["Fixed".into(), fmt_amount(&overview.fixed_total)],
            vec!["Variable".into(), fmt_amount(&overview.variable_total)],
        ];
        let title = month.to_string();
        println!("{}", pretty_table(&[title.as_str(), ""], data));
    }
    Ok(())
}

pub fn year_report(conn: &mut Connection, year: i32) -> Result<Option<YearSection>> {
    let store = SqliteStore::new(conn);
    let instances = store.fetch_all(&InstanceFilter::all().in_year(year))?;
    Ok(year_section(&instances, year))
}

fn year(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let year = *sub
        .get_one::<i32>("year")
        .ok_or_else(|| anyhow!("--year is required"))?;
    let Some(section) = year_report(conn, year)? else {
        println!("Nothing planned for {}", year);
        return Ok(());
    };
    if maybe_print_json(json_flag, jsonl_flag, &section)? {
        return Ok(());
    }
    let data: Vec<Vec<String>> = section
        .items
        .iter()
        .map(|s| {
            let range = s
                .boundary
                .map(|b| format!("{} to {}", b.start, b.end))
                .unwrap_or_default();
            vec![
                s.name.clone(),
                s.frequency.to_string(),
                fmt_amount(&s.display_total),
                s.monthly_amount.map(|a| fmt_amount(&a)).unwrap_or_default(),
                format!("{}/{}", s.paid, s.instances),
                range,
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Expense", "Freq", "Total", "Per month", "Paid", "Range"],
            data
        )
    );
    println!(
        "Planned {} | Paid {} | {} unpaid",
        fmt_amount(&section.totals.planned),
        fmt_amount(&section.totals.paid),
        section.totals.unpaid_count
    );
    Ok(())
}

fn all(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let store = SqliteStore::new(conn);
    let sections = year_sections(&store.fetch_all(&InstanceFilter::all())?);
    let data: Vec<Vec<String>> = sections
        .iter()
        .map(|s| {
            vec![
                s.year.to_string(),
                s.items.len().to_string(),
                fmt_amount(&s.totals.planned),
                fmt_amount(&s.totals.paid),
                s.totals.unpaid_count.to_string(),
            ]
        })
        .collect();
    if !maybe_print_json(json_flag, jsonl_flag, &sections)? {
        println!(
            "{}",
            pretty_table(&["Year", "Series", "Planned", "Paid", "Unpaid"], data)
        );
    }
    Ok(())
}
