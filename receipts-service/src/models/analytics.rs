//! Read models for the six rolling-aggregate tables and monthly targets.
//!
//! Every row here is maintained incrementally by the receipt mutation
//! pipeline; for any key, the sums equal the corresponding sums over
//! non-cancelled receipts matching that key.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-day totals for a committee (optionally split per checkpost).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyAnalytics {
    pub id: Uuid,
    pub committee_id: Uuid,
    pub checkpost_id: Option<Uuid>,
    pub analytics_date: NaiveDate,
    pub total_receipts: i64,
    pub total_value: Decimal,
    pub total_weight_kg: Decimal,
    pub market_fees: Decimal,
    pub office_fees: Decimal,
    pub checkpost_fees: Decimal,
    pub other_fees: Decimal,
}

/// Per-month totals for a committee. The location fee buckets sum market
/// fees only; `total_receipts`/`total_value` count every nature.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CommitteeMonthlyAnalytics {
    pub id: Uuid,
    pub committee_id: Uuid,
    pub year: i32,
    pub month: i32,
    pub total_receipts: i64,
    pub total_value: Decimal,
    pub total_weight_kg: Decimal,
    pub market_fees: Decimal,
    pub office_fees: Decimal,
    pub checkpost_fees: Decimal,
    pub other_fees: Decimal,
}

/// Per-month totals for a trader within a committee. Fees here sum all
/// receipt natures, not just market fees.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TraderMonthlyAnalytics {
    pub id: Uuid,
    pub trader_id: Uuid,
    pub committee_id: Uuid,
    pub year: i32,
    pub month: i32,
    pub total_receipts: i64,
    pub total_value: Decimal,
    pub total_fees_paid: Decimal,
    pub total_weight_kg: Decimal,
}

/// Running totals for a trader within a committee across all time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TraderOverallAnalytics {
    pub id: Uuid,
    pub trader_id: Uuid,
    pub committee_id: Uuid,
    pub total_receipts: i64,
    pub total_value: Decimal,
    pub total_fees_paid: Decimal,
    pub total_weight_kg: Decimal,
    pub first_transaction_date: NaiveDate,
    pub last_transaction_date: NaiveDate,
}

/// Per-month totals for a commodity within a committee.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CommodityMonthlyAnalytics {
    pub id: Uuid,
    pub commodity_id: Uuid,
    pub committee_id: Uuid,
    pub year: i32,
    pub month: i32,
    pub total_receipts: i64,
    pub total_value: Decimal,
    pub total_fees_paid: Decimal,
    pub total_weight_kg: Decimal,
}

/// Running totals for a commodity within a committee across all time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CommodityOverallAnalytics {
    pub id: Uuid,
    pub commodity_id: Uuid,
    pub committee_id: Uuid,
    pub total_receipts: i64,
    pub total_value: Decimal,
    pub total_fees_paid: Decimal,
    pub total_weight_kg: Decimal,
    pub first_transaction_date: NaiveDate,
    pub last_transaction_date: NaiveDate,
}

/// Monthly goal set by supervisors; never written by the receipt pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Target {
    pub target_id: Uuid,
    pub committee_id: Uuid,
    pub checkpost_id: Option<Uuid>,
    pub year: i32,
    pub month: i32,
    pub target_type: String,
    pub target_amount: Decimal,
}

/// Collected market fees joined against the month's target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyAchievement {
    pub committee_id: Uuid,
    pub year: i32,
    pub month: i32,
    pub target_amount: Decimal,
    pub collected: Decimal,
    pub achievement_pct: Decimal,
}
