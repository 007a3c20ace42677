// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use duebook::models::{Frequency, MonthYear};
use duebook::{cli, commands, config, db};
use rusqlite::{Connection, params};
use std::fs;
use tempfile::tempdir;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

fn run(conn: &mut Connection, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["duebook"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().try_get_matches_from(argv)?;
    match matches.subcommand() {
        Some(("expense", sub)) => commands::expenses::handle(conn, sub),
        Some(("pay", sub)) => commands::payments::handle(conn, sub),
        Some(("report", sub)) => commands::reports::handle(conn, sub),
        Some(("export", sub)) => commands::exporter::handle(conn, sub),
        Some(("config", sub)) => commands::settings::handle(conn, sub),
        Some(("doctor", _)) => commands::doctor::handle(conn),
        _ => Ok(()),
    }
}

fn list(conn: &mut Connection, args: &[&str]) -> Vec<duebook::models::InstanceRecord> {
    let mut argv = vec!["duebook", "expense", "list"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    let (_, expense) = matches.subcommand().unwrap();
    let (_, sub) = expense.subcommand().unwrap();
    commands::expenses::query_instances(conn, sub).unwrap()
}

fn add_rent(conn: &mut Connection) -> String {
    run(
        conn,
        &[
            "expense", "add", "--name", "Rent", "--amount", "1000", "--frequency", "monthly",
            "--start", "2025-01", "--end", "2025-06", "--due-day", "1",
        ],
    )
    .unwrap();
    list(conn, &[])[0].series_id.to_string()
}

#[test]
fn add_and_list_expenses() {
    let mut conn = setup();
    let series = add_rent(&mut conn);

    let all = list(&mut conn, &[]);
    assert_eq!(all.len(), 6);
    assert!(all.iter().all(|r| r.due_day == Some(1)));
    assert_eq!(all[0].start_month, Some(1));
    assert_eq!(all[0].end_month, Some(6));

    let feb = list(&mut conn, &["--month", "2025-02"]);
    assert_eq!(feb.len(), 1);
    assert_eq!((feb[0].month, feb[0].year), (2, 2025));

    assert_eq!(list(&mut conn, &["--series", series.as_str()]).len(), 6);
    assert!(list(&mut conn, &["--year", "2026"]).is_empty());

    let err = run(
        &mut conn,
        &["expense", "add", "--name", "Bad", "--amount", "10", "--start", "2025-13"],
    );
    assert!(err.is_err());
    assert_eq!(list(&mut conn, &[]).len(), 6);
}

#[test]
fn update_and_delete_through_the_cli() {
    let mut conn = setup();
    let series = add_rent(&mut conn);

    run(&mut conn, &["expense", "update", "--series", series.as_str(), "--name", "Flat"]).unwrap();
    assert!(list(&mut conn, &[]).iter().all(|r| r.name == "Flat"));

    run(
        &mut conn,
        &[
            "expense", "update", "--series", series.as_str(), "--scope", "this", "--at", "2025-03",
            "--amount", "1500",
        ],
    )
    .unwrap();
    let march = list(&mut conn, &["--month", "2025-03"]);
    assert_eq!(march[0].frequency, Frequency::OneTime);
    assert_eq!(march[0].amount.to_string(), "1500");

    // --scope this needs an occurrence
    assert!(
        run(&mut conn, &["expense", "update", "--series", series.as_str(), "--scope", "this"]).is_err()
    );

    run(&mut conn, &["expense", "update", "--series", series.as_str(), "--end", "2025-04"]).unwrap();
    let months: Vec<u32> = list(&mut conn, &[]).iter().map(|r| r.month).collect();
    assert_eq!(months, vec![1, 2, 3, 4]);

    run(&mut conn, &["expense", "delete", "--series", series.as_str()]).unwrap();
    let left = list(&mut conn, &[]);
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].month, 3);

    let view = commands::expenses::series_view(&mut conn, left[0].series_id).unwrap();
    assert_eq!(view.definition.frequency, Frequency::OneTime);
    assert_eq!(view.instances.len(), 1);
}

#[test]
fn pay_commands_update_instances() {
    let mut conn = setup();
    add_rent(&mut conn);
    let id = list(&mut conn, &["--month", "2025-01"])[0].id.to_string();

    run(
        &mut conn,
        &[
            "pay", "record", "--id", id.as_str(), "--date", "2025-01-02", "--method", "card", "--source",
            " Visa ",
        ],
    )
    .unwrap();
    let jan = &list(&mut conn, &["--month", "2025-01"])[0];
    assert!(jan.is_paid);
    assert_eq!(jan.payment_source.as_deref(), Some("Visa"));
    assert_eq!(jan.payment_date.map(|d| d.to_string()).as_deref(), Some("2025-01-02"));

    run(&mut conn, &["pay", "toggle", "--id", id.as_str()]).unwrap();
    let jan = &list(&mut conn, &["--month", "2025-01"])[0];
    assert!(!jan.is_paid);
    assert_eq!(jan.payment_method, None);

    let month = MonthYear::new(1, 2025).unwrap();
    let overview = commands::reports::month_report(&mut conn, month).unwrap();
    assert_eq!(overview.items, 1);
    let year = commands::reports::year_report(&mut conn, 2025).unwrap().unwrap();
    assert_eq!(year.items.len(), 1);
}

#[test]
fn export_json_and_csv() {
    let mut conn = setup();
    add_rent(&mut conn);
    let dir = tempdir().unwrap();

    let json_path = dir.path().join("out.json");
    run(
        &mut conn,
        &["export", "instances", "--format", "json", "--out", json_path.to_str().unwrap()],
    )
    .unwrap();
    let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    let arr = v.as_array().unwrap();
    assert_eq!(arr.len(), 6);
    assert!(arr[0].get("seriesId").is_some());
    assert_eq!(arr[0]["isPaid"], serde_json::Value::Bool(false));
    assert_eq!(arr[0]["type"], "fixed");

    let csv_path = dir.path().join("out.csv");
    run(&mut conn, &["export", "instances", "--out", csv_path.to_str().unwrap()]).unwrap();
    let text = fs::read_to_string(&csv_path).unwrap();
    assert_eq!(text.lines().count(), 7);
    assert!(text.lines().next().unwrap().contains("seriesId"));

    let bad_path = dir.path().join("out.xml");
    let err = run(
        &mut conn,
        &["export", "instances", "--format", "xml", "--out", bad_path.to_str().unwrap()],
    );
    assert!(err.is_err());
    assert!(!bad_path.exists());
}

#[test]
fn config_settings_are_validated() {
    let mut conn = setup();
    assert_eq!(config::load_settings(&conn).unwrap().plan_years, 2);

    run(&mut conn, &["config", "set", "--key", "plan_years", "--value", "3"]).unwrap();
    run(&mut conn, &["config", "set", "--key", "rebuild_strategy", "--value", "full"]).unwrap();
    let settings = config::load_settings(&conn).unwrap();
    assert_eq!(settings.plan_years, 3);
    assert_eq!(
        settings.rebuild_strategy,
        duebook::models::RebuildStrategy::Full
    );

    assert!(run(&mut conn, &["config", "set", "--key", "plan_years", "--value", "0"]).is_err());
    assert!(run(&mut conn, &["config", "set", "--key", "colour", "--value", "red"]).is_err());
    assert!(run(&mut conn, &["config", "get", "--key", "colour"]).is_err());
    assert_eq!(
        config::get_setting(&conn, "plan_years").unwrap().as_deref(),
        Some("3")
    );

    // the horizon setting drives open-ended series
    run(
        &mut conn,
        &["expense", "add", "--name", "Phone", "--amount", "20", "--start", "2099-01"],
    )
    .unwrap();
    assert_eq!(list(&mut conn, &[]).len(), 36);
}

#[test]
fn doctor_flags_drift_and_duplicates() {
    let mut conn = setup();
    let series = add_rent(&mut conn);
    let healthy = {
        let store = db::SqliteStore::new(&mut conn);
        duebook::store::InstanceStore::fetch_all(&store, &duebook::store::InstanceFilter::all())
            .unwrap()
    };
    assert!(commands::doctor::find_issues(&healthy).is_empty());

    conn.execute(
        "UPDATE expense_instances SET name='Rent!' WHERE series_id=?1 AND month=2",
        params![series],
    )
    .unwrap();
    conn.execute(
        "UPDATE expense_instances SET month=4 WHERE series_id=?1 AND month=5",
        params![series],
    )
    .unwrap();
    let drifted = {
        let store = db::SqliteStore::new(&mut conn);
        duebook::store::InstanceStore::fetch_all(&store, &duebook::store::InstanceFilter::all())
            .unwrap()
    };
    let kinds: Vec<&str> = commands::doctor::find_issues(&drifted)
        .iter()
        .map(|i| i.kind)
        .collect();
    assert!(kinds.contains(&"field_drift"));
    assert!(kinds.contains(&"duplicate_occurrence"));
    assert!(run(&mut conn, &["doctor"]).is_ok());
}

#[test]
fn one_time_update_keeps_an_explicit_end() {
    let mut conn = setup();
    let series = add_rent(&mut conn);

    // a one-time expense cannot end in a different month than it starts
    let err = run(
        &mut conn,
        &[
            "expense", "update", "--series", series.as_str(), "--frequency", "once", "--end",
            "2025-09",
        ],
    );
    assert!(err.is_err());
    let all = list(&mut conn, &[]);
    assert_eq!(all.len(), 6);
    assert!(all.iter().all(|r| r.frequency == Frequency::Monthly));

    run(
        &mut conn,
        &["expense", "update", "--series", series.as_str(), "--frequency", "once"],
    )
    .unwrap();
    let all = list(&mut conn, &[]);
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].frequency, Frequency::OneTime);
    assert_eq!((all[0].month, all[0].year), (1, 2025));
}
