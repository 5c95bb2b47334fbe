//! Aggregate store: applies level deltas to the six analytics tables.
//!
//! Each level is one `INSERT ... ON CONFLICT ... DO UPDATE` statement: a
//! first-ever key is seeded directly from the delta values, an existing row
//! is incremented in SQL. The increment never reads the current value into
//! application code, so concurrent transactions on the same aggregate row
//! compose correctly at any isolation level. Callers own the transaction;
//! there is no ambient pool access here.

use service_core::error::AppError;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::services::analytics::{LevelDelta, ReceiptDeltas};

/// Apply every level of a receipt's deltas inside the caller's transaction.
/// Pass [`ReceiptDeltas::reversed`] output to remove a prior contribution.
pub async fn apply_deltas(
    tx: &mut Transaction<'_, Postgres>,
    deltas: &ReceiptDeltas,
) -> Result<(), AppError> {
    for level in deltas.levels() {
        apply_level(tx, level).await?;
    }
    Ok(())
}

async fn apply_level(
    tx: &mut Transaction<'_, Postgres>,
    level: &LevelDelta,
) -> Result<(), AppError> {
    match level {
        LevelDelta::Daily {
            committee_id,
            checkpost_id,
            date,
            delta,
        } => {
            sqlx::query(
                r#"
                INSERT INTO daily_analytics
                    (id, committee_id, checkpost_id, analytics_date,
                     total_receipts, total_value, total_weight_kg,
                     market_fees, office_fees, checkpost_fees, other_fees)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (committee_id, analytics_date,
                             COALESCE(checkpost_id, '00000000-0000-0000-0000-000000000000'::uuid))
                DO UPDATE SET
                    total_receipts = daily_analytics.total_receipts + EXCLUDED.total_receipts,
                    total_value = daily_analytics.total_value + EXCLUDED.total_value,
                    total_weight_kg = daily_analytics.total_weight_kg + EXCLUDED.total_weight_kg,
                    market_fees = daily_analytics.market_fees + EXCLUDED.market_fees,
                    office_fees = daily_analytics.office_fees + EXCLUDED.office_fees,
                    checkpost_fees = daily_analytics.checkpost_fees + EXCLUDED.checkpost_fees,
                    other_fees = daily_analytics.other_fees + EXCLUDED.other_fees
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(committee_id)
            .bind(checkpost_id)
            .bind(date)
            .bind(delta.receipts)
            .bind(delta.value)
            .bind(delta.weight)
            .bind(delta.market_fees)
            .bind(delta.office_fees)
            .bind(delta.checkpost_fees)
            .bind(delta.other_fees)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to upsert daily analytics: {}", e))
            })?;
        }
        LevelDelta::CommitteeMonthly {
            committee_id,
            year,
            month,
            delta,
        } => {
            sqlx::query(
                r#"
                INSERT INTO committee_monthly_analytics
                    (id, committee_id, year, month,
                     total_receipts, total_value, total_weight_kg,
                     market_fees, office_fees, checkpost_fees, other_fees)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (committee_id, year, month)
                DO UPDATE SET
                    total_receipts = committee_monthly_analytics.total_receipts + EXCLUDED.total_receipts,
                    total_value = committee_monthly_analytics.total_value + EXCLUDED.total_value,
                    total_weight_kg = committee_monthly_analytics.total_weight_kg + EXCLUDED.total_weight_kg,
                    market_fees = committee_monthly_analytics.market_fees + EXCLUDED.market_fees,
                    office_fees = committee_monthly_analytics.office_fees + EXCLUDED.office_fees,
                    checkpost_fees = committee_monthly_analytics.checkpost_fees + EXCLUDED.checkpost_fees,
                    other_fees = committee_monthly_analytics.other_fees + EXCLUDED.other_fees
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(committee_id)
            .bind(year)
            .bind(month)
            .bind(delta.receipts)
            .bind(delta.value)
            .bind(delta.weight)
            .bind(delta.market_fees)
            .bind(delta.office_fees)
            .bind(delta.checkpost_fees)
            .bind(delta.other_fees)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to upsert committee monthly analytics: {}",
                    e
                ))
            })?;
        }
        LevelDelta::TraderMonthly {
            trader_id,
            committee_id,
            year,
            month,
            delta,
        } => {
            sqlx::query(
                r#"
                INSERT INTO trader_monthly_analytics
                    (id, trader_id, committee_id, year, month,
                     total_receipts, total_value, total_fees_paid, total_weight_kg)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (trader_id, committee_id, year, month)
                DO UPDATE SET
                    total_receipts = trader_monthly_analytics.total_receipts + EXCLUDED.total_receipts,
                    total_value = trader_monthly_analytics.total_value + EXCLUDED.total_value,
                    total_fees_paid = trader_monthly_analytics.total_fees_paid + EXCLUDED.total_fees_paid,
                    total_weight_kg = trader_monthly_analytics.total_weight_kg + EXCLUDED.total_weight_kg
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(trader_id)
            .bind(committee_id)
            .bind(year)
            .bind(month)
            .bind(delta.receipts)
            .bind(delta.value)
            .bind(delta.fees_paid)
            .bind(delta.weight)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to upsert trader monthly analytics: {}",
                    e
                ))
            })?;
        }
        LevelDelta::TraderOverall {
            trader_id,
            committee_id,
            receipt_date,
            delta,
        } => {
            // first_transaction_date is written once at row creation;
            // last_transaction_date tracks every mutation that touches the row.
            sqlx::query(
                r#"
                INSERT INTO trader_overall_analytics
                    (id, trader_id, committee_id,
                     total_receipts, total_value, total_fees_paid, total_weight_kg,
                     first_transaction_date, last_transaction_date)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
                ON CONFLICT (trader_id, committee_id)
                DO UPDATE SET
                    total_receipts = trader_overall_analytics.total_receipts + EXCLUDED.total_receipts,
                    total_value = trader_overall_analytics.total_value + EXCLUDED.total_value,
                    total_fees_paid = trader_overall_analytics.total_fees_paid + EXCLUDED.total_fees_paid,
                    total_weight_kg = trader_overall_analytics.total_weight_kg + EXCLUDED.total_weight_kg,
                    last_transaction_date = EXCLUDED.last_transaction_date
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(trader_id)
            .bind(committee_id)
            .bind(delta.receipts)
            .bind(delta.value)
            .bind(delta.fees_paid)
            .bind(delta.weight)
            .bind(receipt_date)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to upsert trader overall analytics: {}",
                    e
                ))
            })?;
        }
        LevelDelta::CommodityMonthly {
            commodity_id,
            committee_id,
            year,
            month,
            delta,
        } => {
            sqlx::query(
                r#"
                INSERT INTO commodity_monthly_analytics
                    (id, commodity_id, committee_id, year, month,
                     total_receipts, total_value, total_fees_paid, total_weight_kg)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (commodity_id, committee_id, year, month)
                DO UPDATE SET
                    total_receipts = commodity_monthly_analytics.total_receipts + EXCLUDED.total_receipts,
                    total_value = commodity_monthly_analytics.total_value + EXCLUDED.total_value,
                    total_fees_paid = commodity_monthly_analytics.total_fees_paid + EXCLUDED.total_fees_paid,
                    total_weight_kg = commodity_monthly_analytics.total_weight_kg + EXCLUDED.total_weight_kg
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(commodity_id)
            .bind(committee_id)
            .bind(year)
            .bind(month)
            .bind(delta.receipts)
            .bind(delta.value)
            .bind(delta.fees_paid)
            .bind(delta.weight)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to upsert commodity monthly analytics: {}",
                    e
                ))
            })?;
        }
        LevelDelta::CommodityOverall {
            commodity_id,
            committee_id,
            receipt_date,
            delta,
        } => {
            sqlx::query(
                r#"
                INSERT INTO commodity_overall_analytics
                    (id, commodity_id, committee_id,
                     total_receipts, total_value, total_fees_paid, total_weight_kg,
                     first_transaction_date, last_transaction_date)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
                ON CONFLICT (commodity_id, committee_id)
                DO UPDATE SET
                    total_receipts = commodity_overall_analytics.total_receipts + EXCLUDED.total_receipts,
                    total_value = commodity_overall_analytics.total_value + EXCLUDED.total_value,
                    total_fees_paid = commodity_overall_analytics.total_fees_paid + EXCLUDED.total_fees_paid,
                    total_weight_kg = commodity_overall_analytics.total_weight_kg + EXCLUDED.total_weight_kg,
                    last_transaction_date = EXCLUDED.last_transaction_date
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(commodity_id)
            .bind(committee_id)
            .bind(delta.receipts)
            .bind(delta.value)
            .bind(delta.fees_paid)
            .bind(delta.weight)
            .bind(receipt_date)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to upsert commodity overall analytics: {}",
                    e
                ))
            })?;
        }
    }

    Ok(())
}
