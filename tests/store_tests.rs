// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use duebook::config::PlanSettings;
use duebook::db::{SqliteStore, init_schema, with_write_lock};
use duebook::error::PlanError;
use duebook::models::{
    EditScope, ExpenseType, Frequency, MonthYear, MutationRequest, PaymentMethod, PaymentState,
    RebuildStrategy, SeriesDefinition, SeriesFields,
};
use duebook::payments::{record_payment, toggle_paid};
use duebook::reconcile::Reconciler;
use duebook::store::{InstanceFilter, InstanceStore, WriteBatch};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use uuid::Uuid;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    init_schema(&conn).unwrap();
    conn
}

fn my(month: u32, year: i32) -> MonthYear {
    MonthYear::new(month, year).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
}

fn add(conn: &mut Connection, def: &SeriesDefinition) {
    let mut store = SqliteStore::new(conn);
    Reconciler::new(&mut store)
        .apply(&MutationRequest::add(def.clone()), today())
        .unwrap();
}

fn streaming() -> SeriesDefinition {
    let mut fields = SeriesFields::new("Streaming", Decimal::new(1299, 2), ExpenseType::Variable);
    fields.due_day = Some(12);
    fields.note = Some("family plan".into());
    SeriesDefinition::new(fields, Frequency::Monthly, my(11, 2025)).with_end(my(2, 2026))
}

fn count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM expense_instances", [], |r| r.get(0))
        .unwrap()
}

#[test]
fn instances_survive_a_round_trip_through_sqlite() {
    let mut conn = setup();
    let def = streaming();
    add(&mut conn, &def);

    let store = SqliteStore::new(&mut conn);
    let all = store.fetch_all(&InstanceFilter::series(def.series_id)).unwrap();
    assert_eq!(all.len(), 4);
    for inst in &all {
        assert_eq!(inst.fields(), &def.fields);
        assert_eq!(inst.amount(), Decimal::new(1299, 2));
        assert_eq!(inst.frequency(), Frequency::Monthly);
        let b = inst.boundary().unwrap();
        assert_eq!((b.start, b.end), (my(11, 2025), my(2, 2026)));
    }
    assert_eq!(all[0].occurrence(), my(11, 2025));
    assert_eq!(all[3].occurrence(), my(2, 2026));
    assert_eq!(store.get(all[1].id()).unwrap().as_ref(), Some(&all[1]));
    assert_eq!(store.get(Uuid::new_v4()).unwrap(), None);
}

#[test]
fn filters_narrow_the_query() {
    let mut conn = setup();
    let def = streaming();
    add(&mut conn, &def);
    let once = SeriesDefinition::new(
        SeriesFields::new("Flight", Decimal::new(430, 0), ExpenseType::Variable),
        Frequency::OneTime,
        my(12, 2025),
    );
    add(&mut conn, &once);

    let store = SqliteStore::new(&mut conn);
    assert_eq!(store.fetch_all(&InstanceFilter::all()).unwrap().len(), 5);
    assert_eq!(
        store
            .fetch_all(&InstanceFilter::all().in_year(2025))
            .unwrap()
            .len(),
        3
    );
    let december = store
        .fetch_all(&InstanceFilter::all().at(my(12, 2025)))
        .unwrap();
    let names: Vec<&str> = december.iter().map(|i| i.name()).collect();
    assert_eq!(names, vec!["Flight", "Streaming"]);
    assert_eq!(
        store
            .fetch_all(&InstanceFilter::all().recurring())
            .unwrap()
            .len(),
        4
    );
    assert_eq!(
        store
            .fetch_all(&InstanceFilter::series(once.series_id).with_frequency(Frequency::OneTime))
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn failed_transaction_rolls_back() {
    let mut conn = setup();
    add(&mut conn, &streaming());
    assert_eq!(count(&conn), 4);

    let mut store = SqliteStore::new(&mut conn);
    let mut batch = WriteBatch::new();
    batch.delete_where(InstanceFilter::all());
    batch.set_payment(Uuid::new_v4(), PaymentState::default());
    let err = store.commit(batch).unwrap_err();
    assert!(matches!(err, PlanError::InstanceNotFound(_)));
    assert_eq!(count(&conn), 4);
}

#[test]
fn full_rebuild_over_sqlite_restores_payments() {
    let mut conn = setup();
    let def = streaming();
    add(&mut conn, &def);

    let mut store = SqliteStore::new(&mut conn);
    let december = store
        .fetch_all(&InstanceFilter::series(def.series_id).at(my(12, 2025)))
        .unwrap()
        .remove(0);
    let paid_on = NaiveDate::from_ymd_opt(2025, 12, 12).unwrap();
    record_payment(&mut store, december.id(), paid_on, Some(PaymentMethod::CreditCard), None)
        .unwrap();

    let moved = SeriesDefinition {
        start: my(12, 2025),
        end: Some(my(5, 2026)),
        ..def.clone()
    };
    let settings = PlanSettings {
        rebuild_strategy: RebuildStrategy::Full,
        ..PlanSettings::default()
    };
    Reconciler::new(&mut store)
        .with_settings(settings)
        .apply(
            &MutationRequest::update(moved, EditScope::AllOccurrences),
            today(),
        )
        .unwrap();

    let after = store.fetch_all(&InstanceFilter::series(def.series_id)).unwrap();
    assert_eq!(after.len(), 6);
    assert_eq!(after[0].occurrence(), my(12, 2025));
    assert_eq!(after[0].payment.payment_date, Some(paid_on));
    assert_eq!(after[0].payment.payment_method, Some(PaymentMethod::CreditCard));
    assert!(after[1..].iter().all(|i| !i.payment.is_paid));
}

#[test]
fn payment_recording_and_toggling() {
    let mut conn = setup();
    let def = streaming();
    add(&mut conn, &def);
    let mut store = SqliteStore::new(&mut conn);
    let id = store
        .fetch_all(&InstanceFilter::series(def.series_id))
        .unwrap()[0]
        .id();

    let paid_on = NaiveDate::from_ymd_opt(2025, 11, 14).unwrap();
    let state = record_payment(
        &mut store,
        id,
        paid_on,
        Some(PaymentMethod::BankTransfer),
        Some("  Savings  "),
    )
    .unwrap();
    assert_eq!(state.payment_source.as_deref(), Some("Savings"));
    let stored = store.get(id).unwrap().unwrap();
    assert!(stored.payment.is_paid);
    assert_eq!(stored.payment.payment_source.as_deref(), Some("Savings"));
    assert_eq!(stored.payment.payment_method, Some(PaymentMethod::BankTransfer));

    let blank = record_payment(&mut store, id, paid_on, None, Some("   ")).unwrap();
    assert_eq!(blank.payment_source, None);

    // paid -> unpaid forgets the details
    let state = toggle_paid(&mut store, id).unwrap();
    assert_eq!(state, PaymentState::default());
    assert_eq!(store.get(id).unwrap().unwrap().payment, PaymentState::default());

    let state = toggle_paid(&mut store, id).unwrap();
    assert!(state.is_paid);
    assert_eq!(state.payment_date, None);

    let err = toggle_paid(&mut store, Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, PlanError::InstanceNotFound(_)));
}

#[test]
fn undecodable_rows_are_reported() {
    let mut conn = setup();
    conn.execute(
        "INSERT INTO expense_instances(id, series_id, name, amount, type, frequency, month, year) \
         VALUES (?1, ?2, 'Broken', 'lots', 'fixed', 'monthly', 3, 2025)",
        params![Uuid::new_v4().to_string(), Uuid::new_v4().to_string()],
    )
    .unwrap();
    let store = SqliteStore::new(&mut conn);
    let err = store.fetch_all(&InstanceFilter::all()).unwrap_err();
    assert!(matches!(err, PlanError::CorruptRow(_)));
}

#[test]
fn stored_amounts_beyond_the_limit_are_reported() {
    let mut conn = setup();
    conn.execute(
        "INSERT INTO expense_instances(id, series_id, name, amount, type, frequency, month, year) \
         VALUES (?1, ?2, 'Huge', ?3, 'fixed', 'monthly', 3, 2025)",
        params![
            Uuid::new_v4().to_string(),
            Uuid::new_v4().to_string(),
            Decimal::MAX.to_string()
        ],
    )
    .unwrap();
    let store = SqliteStore::new(&mut conn);
    let err = store.fetch_all(&InstanceFilter::all()).unwrap_err();
    assert!(matches!(err, PlanError::CorruptRow(_)));
}

#[test]
fn write_lock_excludes_other_writers_and_rolls_back_on_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("duebook.sqlite");
    let mut first = Connection::open(&path).unwrap();
    init_schema(&first).unwrap();
    let other = Connection::open(&path).unwrap();
    other.busy_timeout(std::time::Duration::ZERO).unwrap();
    let def = streaming();

    with_write_lock(&mut first, |conn| {
        let mut store = SqliteStore::new(conn);
        Reconciler::new(&mut store)
            .apply(&MutationRequest::add(def.clone()), today())?;
        // a second writer cannot start while the plan and commit are in flight
        assert!(other.execute_batch("BEGIN IMMEDIATE").is_err());
        Ok(())
    })
    .unwrap();
    assert_eq!(count(&other), 4);

    let err: anyhow::Result<()> = with_write_lock(&mut first, |conn| {
        let mut store = SqliteStore::new(conn);
        store.delete_where(&InstanceFilter::all())?;
        anyhow::bail!("abandon the change")
    });
    assert!(err.is_err());
    assert_eq!(count(&other), 4);

    other.execute_batch("BEGIN IMMEDIATE").unwrap();
    other.execute_batch("ROLLBACK").unwrap();
}
