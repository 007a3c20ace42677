// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::{KNOWN_KEYS, effective_settings, set_setting};
use crate::utils::{pretty_table, req_arg};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("get", sub)) => {
            let key = req_arg(sub, "key")?;
            let value = effective_settings(conn)?
                .into_iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v)
                .ok_or_else(|| {
                    anyhow!("Unknown setting '{}' (known: {})", key, KNOWN_KEYS.join(", "))
                })?;
            println!("{}", value);
        }
        Some(("set", sub)) => {
            let key = req_arg(sub, "key")?;
            let value = req_arg(sub, "value")?;
            set_setting(conn, key, value)?;
            println!("Set {} = {}", key, value);
        }
        Some(("list", _)) => {
            let rows = effective_settings(conn)?
                .into_iter()
                .map(|(k, v)| vec![k, v])
                .collect();
            println!("{}", pretty_table(&["Key", "Value"], rows));
        }
        _ => {}
    }
    Ok(())
}
