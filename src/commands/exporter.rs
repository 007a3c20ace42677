// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db::SqliteStore;
use crate::models::{ExpenseInstance, InstanceRecord};
use crate::store::{InstanceFilter, InstanceStore};
use crate::utils::req_arg;
use anyhow::{Result, anyhow};
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("instances", sub)) => export_instances(conn, sub),
        _ => Ok(()),
    }
}

fn export_instances(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = req_arg(sub, "format")?.to_lowercase();
    let out = req_arg(sub, "out")?;
    if fmt != "csv" && fmt != "json" {
        return Err(anyhow!("Unknown format: {} (use csv|json)", fmt));
    }

    let store = SqliteStore::new(conn);
    let records: Vec<InstanceRecord> = store
        .fetch_all(&InstanceFilter::all())?
        .iter()
        .map(ExpenseInstance::to_record)
        .collect();

    if fmt == "csv" {
        let mut wtr = csv::Writer::from_path(out)?;
        for record in &records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
    } else {
        std::fs::write(out, serde_json::to_string_pretty(&records)?)?;
    }
    println!("Exported {} instance(s) to {}", records.len(), out);
    Ok(())
}
