//! Common test utilities for receipts-service integration tests.
//!
//! These tests need a real PostgreSQL instance; set TEST_DATABASE_URL to run
//! them. Without it every test skips early. Isolation comes from fresh
//! committee/trader/commodity UUIDs per test, so suites can run in parallel
//! against one database.

#![allow(dead_code)]

use chrono::NaiveDate;
use receipts_service::models::{
    CollectionLocation, CreateReceipt, NatureOfReceipt, QuantityUnit, NEW_COMMODITY_SENTINEL,
    NEW_TRADER_SENTINEL,
};
use receipts_service::services::{Database, ReceiptService};
use rust_decimal::Decimal;
use std::sync::Once;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,receipts_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub db: Database,
    pub service: ReceiptService,
    pub committee_id: Uuid,
}

/// Connect to the test database, run migrations, and seed one committee.
/// Returns `None` (test should skip) when TEST_DATABASE_URL is unset.
pub async fn spawn_app() -> Option<TestApp> {
    init_tracing();
    dotenvy::dotenv().ok();

    let database_url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set; skipping integration test");
            return None;
        }
    };

    let db = Database::new(&database_url, 5, 1)
        .await
        .expect("Failed to connect to test database");
    db.run_migrations().await.expect("Failed to run migrations");

    let committee_id = Uuid::new_v4();
    sqlx::query("INSERT INTO committees (committee_id, name) VALUES ($1, $2)")
        .bind(committee_id)
        .bind(format!("Test Committee {}", committee_id))
        .execute(db.pool())
        .await
        .expect("Failed to seed committee");

    Some(TestApp {
        service: ReceiptService::new(db.clone()),
        db,
        committee_id,
    })
}

pub fn unique_name(prefix: &str) -> String {
    format!("{} {}", prefix, Uuid::new_v4())
}

/// Payload for a market-fee receipt collected at the committee office:
/// 40 bags x 50 kg of a fresh commodity, value 100000, fees 1000, May 2024.
pub fn market_fee_receipt(committee_id: Uuid, trader_name: &str) -> CreateReceipt {
    CreateReceipt {
        committee_id,
        checkpost_id: None,
        receipt_date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
        trader_name: NEW_TRADER_SENTINEL.to_string(),
        new_trader_name: Some(trader_name.to_string()),
        commodity_name: Some(NEW_COMMODITY_SENTINEL.to_string()),
        new_commodity_name: Some(unique_name("Wheat")),
        quantity: Decimal::from(40),
        unit: QuantityUnit::Bags,
        weight_per_bag: Some(Decimal::from(50)),
        nature_of_receipt: NatureOfReceipt::MarketFee,
        collection_location: CollectionLocation::Office,
        value: Decimal::from(100_000),
        fees_paid: Decimal::from(1_000),
    }
}

/// Seed a checkpost for the committee; receipts collected there key the
/// daily aggregate separately from office collections.
pub async fn seed_checkpost(db: &Database, committee_id: Uuid) -> Uuid {
    let checkpost_id = Uuid::new_v4();
    sqlx::query("INSERT INTO checkposts (checkpost_id, committee_id, name) VALUES ($1, $2, $3)")
        .bind(checkpost_id)
        .bind(committee_id)
        .bind(format!("Checkpost {}", checkpost_id))
        .execute(db.pool())
        .await
        .expect("Failed to seed checkpost");
    checkpost_id
}

/// Seed a committee-wide market-fee target for the given month.
pub async fn seed_target(
    db: &Database,
    committee_id: Uuid,
    year: i32,
    month: i32,
    amount: Decimal,
) {
    sqlx::query(
        r#"
        INSERT INTO targets (target_id, committee_id, checkpost_id, year, month, target_type, target_amount)
        VALUES ($1, $2, NULL, $3, $4, 'mf', $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(committee_id)
    .bind(year)
    .bind(month)
    .bind(amount)
    .execute(db.pool())
    .await
    .expect("Failed to seed target");
}
