#![cfg(feature = "storage-rocksdb")]

mod common;

use assert_cmd::cargo_bin;
use common::{admin, customer, desk_with, details, new_account};
use dispatchdesk::application::Stores;
use dispatchdesk::application::payments::Gateways;
use dispatchdesk::domain::booking::BookingStatus;
use std::process::Command;
use tempfile::tempdir;

#[tokio::test]
async fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // First run: create and approve a booking, register a default account.
    let (booking_id, account_id) = {
        let desk = desk_with(Stores::rocksdb(&db_path).unwrap(), Gateways::default());
        let booking = desk
            .bookings
            .create(&customer("u1"), details("Towing"))
            .await
            .unwrap();
        desk.bookings
            .approve(&admin(), booking.id, None, None, Some("KDA 123X".to_string()))
            .await
            .unwrap();
        let account = desk
            .admin
            .create_bank_account(&admin(), new_account("Main", true))
            .await
            .unwrap();
        (booking.id, account.id)
    };

    // Second run against the same path sees the committed state.
    let desk = desk_with(Stores::rocksdb(&db_path).unwrap(), Gateways::default());
    let booking = desk.bookings.get(&customer("u1"), booking_id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Approved);
    assert_eq!(booking.assigned_truck.as_deref(), Some("KDA 123X"));
    assert_eq!(desk.admin.default_bank_account().await.unwrap().id, account_id);

    let err = desk
        .bookings
        .approve(&admin(), booking_id, None, None, None)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_export_reads_persisted_bookings() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    {
        let desk = desk_with(Stores::rocksdb(&db_path).unwrap(), Gateways::default());
        desk.bookings
            .create(&customer("u7"), details("Oil change"))
            .await
            .unwrap();
    }

    let output = Command::new(cargo_bin!("dispatchdesk"))
        .arg("export-bookings")
        .arg("--db-path")
        .arg(&db_path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 2);
    assert!(stdout.contains(",u7,Oil change,normal,pending,"));
}
