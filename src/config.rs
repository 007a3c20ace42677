// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::RebuildStrategy;

pub const PLAN_YEARS: &str = "plan_years";
pub const REBUILD_STRATEGY: &str = "rebuild_strategy";
pub const KNOWN_KEYS: [&str; 2] = [PLAN_YEARS, REBUILD_STRATEGY];

/// Tunables read by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSettings {
    /// Calendar years covered by a recurring series created without an end.
    pub plan_years: i32,
    pub rebuild_strategy: RebuildStrategy,
}

impl Default for PlanSettings {
    fn default() -> Self {
        Self {
            plan_years: 2,
            rebuild_strategy: RebuildStrategy::Incremental,
        }
    }
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key=?1",
            params![key],
            |r| r.get(0),
        )
        .optional()?;
    Ok(v)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    let key = key.trim();
    let value = value.trim();
    match key {
        PLAN_YEARS => {
            parse_plan_years(value)?;
        }
        REBUILD_STRATEGY => {
            value.parse::<RebuildStrategy>()?;
        }
        other => {
            return Err(anyhow!(
                "Unknown setting '{}' (known: {})",
                other,
                KNOWN_KEYS.join(", ")
            ));
        }
    }
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn load_settings(conn: &Connection) -> Result<PlanSettings> {
    let mut settings = PlanSettings::default();
    if let Some(v) = get_setting(conn, PLAN_YEARS)? {
        settings.plan_years = parse_plan_years(&v)?;
    }
    if let Some(v) = get_setting(conn, REBUILD_STRATEGY)? {
        settings.rebuild_strategy = v
            .parse()
            .with_context(|| format!("Stored {} is invalid", REBUILD_STRATEGY))?;
    }
    Ok(settings)
}

/// Effective value of every known key, defaults included.
pub fn effective_settings(conn: &Connection) -> Result<Vec<(String, String)>> {
    let s = load_settings(conn)?;
    Ok(vec![
        (PLAN_YEARS.to_string(), s.plan_years.to_string()),
        (
            REBUILD_STRATEGY.to_string(),
            s.rebuild_strategy.as_str().to_string(),
        ),
    ])
}

fn parse_plan_years(v: &str) -> Result<i32> {
    let years: i32 = v
        .trim()
        .parse()
        .with_context(|| format!("Invalid {} '{}'", PLAN_YEARS, v))?;
    if !(1..=10).contains(&years) {
        return Err(anyhow!("{} must be between 1 and 10, got {}", PLAN_YEARS, years));
    }
    Ok(years)
}
