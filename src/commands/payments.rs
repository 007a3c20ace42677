// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db::{SqliteStore, with_write_lock};
use crate::models::PaymentMethod;
use crate::payments::{record_payment, toggle_paid};
use crate::utils::{opt_arg, parse_date, parse_uuid, req_arg, today};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("toggle", sub)) => {
            let id = parse_uuid(req_arg(sub, "id")?)?;
            let state = with_write_lock(conn, |conn| {
                let mut store = SqliteStore::new(conn);
                Ok(toggle_paid(&mut store, id)?)
            })?;
            if state.is_paid {
                println!("Marked {} as paid", id);
            } else {
                println!("Marked {} as unpaid", id);
            }
        }
        Some(("record", sub)) => {
            let id = parse_uuid(req_arg(sub, "id")?)?;
            let date = match opt_arg(sub, "date") {
                Some(d) => parse_date(d)?,
                None => today(),
            };
            let method = opt_arg(sub, "method")
                .map(str::parse::<PaymentMethod>)
                .transpose()?;
            let source = opt_arg(sub, "source");
            let state = with_write_lock(conn, |conn| {
                let mut store = SqliteStore::new(conn);
                Ok(record_payment(&mut store, id, date, method, source)?)
            })?;
            println!(
                "Recorded payment for {} on {}{}{}",
                id,
                date,
                state
                    .payment_method
                    .map(|m| format!(" by {}", m.label()))
                    .unwrap_or_default(),
                state
                    .payment_source
                    .as_deref()
                    .map(|s| format!(" from {}", s))
                    .unwrap_or_default()
            );
        }
        _ => {}
    }
    Ok(())
}
