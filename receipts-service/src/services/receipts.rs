//! Mutation coordinator: the only writer of the aggregate tables.
//!
//! Each operation is one database transaction covering the receipt row and
//! all six aggregate levels; a reader never observes a receipt without its
//! analytics contribution or vice versa. Nothing is retried; any failure
//! rolls the whole mutation back and the caller resubmits.

use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::models::{CreateReceipt, Receipt};
use crate::services::metrics::{ERRORS_TOTAL, RECEIPT_MUTATIONS_TOTAL};
use crate::services::{aggregates, analytics, database::Database};

/// Receipt mutation service.
#[derive(Clone)]
pub struct ReceiptService {
    db: Database,
}

impl ReceiptService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a new receipt and apply its contribution at all six aggregate
    /// levels.
    #[instrument(skip(self, input), fields(committee_id = %input.committee_id))]
    pub async fn create_receipt(&self, input: &CreateReceipt) -> Result<Receipt, AppError> {
        let result = self.create_receipt_inner(input).await;
        Self::observe("create", &result);
        result
    }

    async fn create_receipt_inner(&self, input: &CreateReceipt) -> Result<Receipt, AppError> {
        input.validate()?;
        validate_amounts(input)?;

        let mut tx = self.db.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let trader = self
            .db
            .resolve_trader(&mut tx, &input.trader_name, input.new_trader_name.as_deref())
            .await?;
        let commodity = self
            .db
            .resolve_commodity(
                &mut tx,
                input.commodity_name.as_deref(),
                input.new_commodity_name.as_deref(),
            )
            .await?;

        let total_weight_kg = input
            .unit
            .total_weight_kg(input.quantity, input.weight_per_bag)?;

        let receipt = self
            .db
            .insert_receipt(
                &mut tx,
                input,
                trader.trader_id,
                commodity.as_ref().map(|c| c.commodity_id),
                total_weight_kg,
            )
            .await?;

        let deltas = analytics::compute_deltas(&receipt.snapshot()?);
        aggregates::apply_deltas(&mut tx, &deltas).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        info!(
            receipt_id = %receipt.receipt_id,
            trader_id = %receipt.trader_id,
            nature = %receipt.nature_of_receipt,
            fees_paid = %receipt.fees_paid,
            "Receipt recorded"
        );

        Ok(receipt)
    }

    /// Replace a receipt's fields, moving its aggregate contribution from the
    /// old grouping keys to the new ones. When the update changes trader,
    /// commodity, committee or date, the reversal and the fresh application
    /// target different aggregate rows; both happen in this one transaction.
    #[instrument(skip(self, input), fields(receipt_id = %receipt_id))]
    pub async fn update_receipt(
        &self,
        receipt_id: Uuid,
        input: &CreateReceipt,
    ) -> Result<Receipt, AppError> {
        let result = self.update_receipt_inner(receipt_id, input).await;
        Self::observe("update", &result);
        result
    }

    async fn update_receipt_inner(
        &self,
        receipt_id: Uuid,
        input: &CreateReceipt,
    ) -> Result<Receipt, AppError> {
        input.validate()?;
        validate_amounts(input)?;

        let mut tx = self.db.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Snapshot the existing row before touching it; its field values are
        // the only record of what was previously added to the aggregates.
        let existing = self
            .db
            .load_receipt_for_update(&mut tx, receipt_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Receipt {} does not exist", receipt_id))
            })?;
        if existing.cancelled {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Receipt {} is cancelled and cannot be updated",
                receipt_id
            )));
        }
        let old_snapshot = existing.snapshot()?;

        let trader = self
            .db
            .resolve_trader(&mut tx, &input.trader_name, input.new_trader_name.as_deref())
            .await?;
        let commodity = self
            .db
            .resolve_commodity(
                &mut tx,
                input.commodity_name.as_deref(),
                input.new_commodity_name.as_deref(),
            )
            .await?;
        let total_weight_kg = input
            .unit
            .total_weight_kg(input.quantity, input.weight_per_bag)?;

        let updated = self
            .db
            .update_receipt_row(
                &mut tx,
                receipt_id,
                input,
                trader.trader_id,
                commodity.as_ref().map(|c| c.commodity_id),
                total_weight_kg,
            )
            .await?;

        aggregates::apply_deltas(&mut tx, &analytics::compute_deltas(&old_snapshot).reversed())
            .await?;
        aggregates::apply_deltas(&mut tx, &analytics::compute_deltas(&updated.snapshot()?)).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        info!(
            receipt_id = %updated.receipt_id,
            trader_id = %updated.trader_id,
            "Receipt updated"
        );

        Ok(updated)
    }

    /// Cancel a receipt (soft delete) and reverse its aggregate contribution.
    /// Cancelling twice is a conflict; the row lock taken while loading the
    /// snapshot guarantees the reversal happens at most once.
    #[instrument(skip(self), fields(receipt_id = %receipt_id))]
    pub async fn cancel_receipt(&self, receipt_id: Uuid) -> Result<Receipt, AppError> {
        let result = self.cancel_receipt_inner(receipt_id).await;
        Self::observe("cancel", &result);
        result
    }

    async fn cancel_receipt_inner(&self, receipt_id: Uuid) -> Result<Receipt, AppError> {
        let mut tx = self.db.pool().begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let existing = self
            .db
            .load_receipt_for_update(&mut tx, receipt_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Receipt {} does not exist", receipt_id))
            })?;
        if existing.cancelled {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Receipt {} is already cancelled",
                receipt_id
            )));
        }
        let snapshot = existing.snapshot()?;

        let cancelled = self.db.mark_cancelled(&mut tx, receipt_id).await?;
        aggregates::apply_deltas(&mut tx, &analytics::compute_deltas(&snapshot).reversed())
            .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        info!(receipt_id = %cancelled.receipt_id, "Receipt cancelled");

        Ok(cancelled)
    }

    fn observe(operation: &str, result: &Result<Receipt, AppError>) {
        match result {
            Ok(_) => {
                RECEIPT_MUTATIONS_TOTAL
                    .with_label_values(&[operation, "ok"])
                    .inc();
            }
            Err(e) => {
                RECEIPT_MUTATIONS_TOTAL
                    .with_label_values(&[operation, "error"])
                    .inc();
                ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
            }
        }
    }
}

/// Domain checks the schema-level validator cannot express.
fn validate_amounts(input: &CreateReceipt) -> Result<(), AppError> {
    if input.value < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "value must not be negative"
        )));
    }
    if input.fees_paid < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "fees_paid must not be negative"
        )));
    }
    if input.quantity < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "quantity must not be negative"
        )));
    }
    Ok(())
}
