//! Database service for receipts-service.
//!
//! Row-level operations only. Everything that participates in a receipt
//! mutation takes the caller's transaction handle; the pool is used directly
//! for the read side.

use crate::models::{
    Commodity, CommitteeMonthlyAnalytics, CommodityMonthlyAnalytics, CommodityOverallAnalytics,
    CreateReceipt, DailyAnalytics, ListReceiptsFilter, MonthlyAchievement, Receipt, Trader,
    TraderMonthlyAnalytics, TraderOverallAnalytics, NEW_COMMODITY_SENTINEL, NEW_TRADER_SENTINEL,
};
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const RECEIPT_COLUMNS: &str = "receipt_id, committee_id, checkpost_id, trader_id, commodity_id, \
     receipt_date, value, fees_paid, quantity, unit, weight_per_bag, total_weight_kg, \
     nature_of_receipt, collection_location, cancelled, created_utc, updated_utc, cancelled_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "receipts-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Trader / Commodity resolution (transaction-scoped)
    // -------------------------------------------------------------------------

    /// Resolve a trader by exact name, or create one when the payload carries
    /// the "New" sentinel. An unknown name without the sentinel is a client
    /// input error and aborts the caller's transaction.
    pub async fn resolve_trader(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        trader_name: &str,
        new_trader_name: Option<&str>,
    ) -> Result<Trader, AppError> {
        if trader_name == NEW_TRADER_SENTINEL {
            let name = new_trader_name.ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!(
                    "new_trader_name is required when trader_name is '{}'",
                    NEW_TRADER_SENTINEL
                ))
            })?;

            // DO UPDATE instead of DO NOTHING so RETURNING yields the row
            // even when a concurrent writer created it first.
            let trader = sqlx::query_as::<_, Trader>(
                r#"
                INSERT INTO traders (trader_id, name)
                VALUES ($1, $2)
                ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                RETURNING trader_id, name, created_utc
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(name)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create trader: {}", e))
            })?;

            return Ok(trader);
        }

        sqlx::query_as::<_, Trader>(
            "SELECT trader_id, name, created_utc FROM traders WHERE name = $1",
        )
        .bind(trader_name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to look up trader: {}", e)))?
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Unknown trader '{}'", trader_name))
        })
    }

    /// Resolve an optional commodity by exact name, with the "Other" sentinel
    /// triggering creation. `None` in means `None` out; receipts without a
    /// commodity skip the commodity aggregate levels entirely.
    pub async fn resolve_commodity(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        commodity_name: Option<&str>,
        new_commodity_name: Option<&str>,
    ) -> Result<Option<Commodity>, AppError> {
        let commodity_name = match commodity_name {
            Some(name) => name,
            None => return Ok(None),
        };

        if commodity_name == NEW_COMMODITY_SENTINEL {
            let name = new_commodity_name.ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!(
                    "new_commodity_name is required when commodity_name is '{}'",
                    NEW_COMMODITY_SENTINEL
                ))
            })?;

            let commodity = sqlx::query_as::<_, Commodity>(
                r#"
                INSERT INTO commodities (commodity_id, name)
                VALUES ($1, $2)
                ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                RETURNING commodity_id, name, created_utc
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(name)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create commodity: {}", e))
            })?;

            return Ok(Some(commodity));
        }

        let commodity = sqlx::query_as::<_, Commodity>(
            "SELECT commodity_id, name, created_utc FROM commodities WHERE name = $1",
        )
        .bind(commodity_name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to look up commodity: {}", e))
        })?
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Unknown commodity '{}'", commodity_name))
        })?;

        Ok(Some(commodity))
    }

    // -------------------------------------------------------------------------
    // Receipt row operations (transaction-scoped)
    // -------------------------------------------------------------------------

    /// Insert a new receipt row.
    pub async fn insert_receipt(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        input: &CreateReceipt,
        trader_id: Uuid,
        commodity_id: Option<Uuid>,
        total_weight_kg: Decimal,
    ) -> Result<Receipt, AppError> {
        let query = format!(
            r#"
            INSERT INTO receipts
                (receipt_id, committee_id, checkpost_id, trader_id, commodity_id,
                 receipt_date, value, fees_paid, quantity, unit, weight_per_bag,
                 total_weight_kg, nature_of_receipt, collection_location)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {RECEIPT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Receipt>(&query)
            .bind(Uuid::new_v4())
            .bind(input.committee_id)
            .bind(input.checkpost_id)
            .bind(trader_id)
            .bind(commodity_id)
            .bind(input.receipt_date)
            .bind(input.value)
            .bind(input.fees_paid)
            .bind(input.quantity)
            .bind(input.unit.as_str())
            .bind(input.weight_per_bag)
            .bind(total_weight_kg)
            .bind(input.nature_of_receipt.as_str())
            .bind(input.collection_location.as_str())
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert receipt: {}", e))
            })
    }

    /// Load a receipt row and lock it for the rest of the transaction. The
    /// row lock is what makes reversal at-most-once under concurrent
    /// update/cancel requests for the same receipt.
    pub async fn load_receipt_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        receipt_id: Uuid,
    ) -> Result<Option<Receipt>, AppError> {
        let query = format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE receipt_id = $1 FOR UPDATE");

        sqlx::query_as::<_, Receipt>(&query)
            .bind(receipt_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to load receipt: {}", e))
            })
    }

    /// Replace every mutable field of a receipt row.
    pub async fn update_receipt_row(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        receipt_id: Uuid,
        input: &CreateReceipt,
        trader_id: Uuid,
        commodity_id: Option<Uuid>,
        total_weight_kg: Decimal,
    ) -> Result<Receipt, AppError> {
        let query = format!(
            r#"
            UPDATE receipts
            SET committee_id = $2,
                checkpost_id = $3,
                trader_id = $4,
                commodity_id = $5,
                receipt_date = $6,
                value = $7,
                fees_paid = $8,
                quantity = $9,
                unit = $10,
                weight_per_bag = $11,
                total_weight_kg = $12,
                nature_of_receipt = $13,
                collection_location = $14,
                updated_utc = now()
            WHERE receipt_id = $1
            RETURNING {RECEIPT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Receipt>(&query)
            .bind(receipt_id)
            .bind(input.committee_id)
            .bind(input.checkpost_id)
            .bind(trader_id)
            .bind(commodity_id)
            .bind(input.receipt_date)
            .bind(input.value)
            .bind(input.fees_paid)
            .bind(input.quantity)
            .bind(input.unit.as_str())
            .bind(input.weight_per_bag)
            .bind(total_weight_kg)
            .bind(input.nature_of_receipt.as_str())
            .bind(input.collection_location.as_str())
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update receipt: {}", e))
            })
    }

    /// Flip the soft-delete flag. Rows are never physically removed.
    pub async fn mark_cancelled(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        receipt_id: Uuid,
    ) -> Result<Receipt, AppError> {
        let query = format!(
            r#"
            UPDATE receipts
            SET cancelled = TRUE, cancelled_utc = now(), updated_utc = now()
            WHERE receipt_id = $1
            RETURNING {RECEIPT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Receipt>(&query)
            .bind(receipt_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to cancel receipt: {}", e))
            })
    }

    // -------------------------------------------------------------------------
    // Read side
    // -------------------------------------------------------------------------

    /// Get a receipt by ID.
    #[instrument(skip(self), fields(receipt_id = %receipt_id))]
    pub async fn get_receipt(&self, receipt_id: Uuid) -> Result<Option<Receipt>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_receipt"])
            .start_timer();

        let query = format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE receipt_id = $1");
        let receipt = sqlx::query_as::<_, Receipt>(&query)
            .bind(receipt_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get receipt: {}", e))
            })?;

        timer.observe_duration();

        Ok(receipt)
    }

    /// List receipts with optional filters and cursor pagination.
    #[instrument(skip(self, filter))]
    pub async fn list_receipts(
        &self,
        filter: &ListReceiptsFilter,
    ) -> Result<Vec<Receipt>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_receipts"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;

        let query = format!(
            r#"
            SELECT {RECEIPT_COLUMNS}
            FROM receipts
            WHERE ($1::uuid IS NULL OR committee_id = $1)
              AND ($2::uuid IS NULL OR trader_id = $2)
              AND ($3::date IS NULL OR receipt_date >= $3)
              AND ($4::date IS NULL OR receipt_date <= $4)
              AND ($5 OR NOT cancelled)
              AND ($6::uuid IS NULL OR receipt_id > $6)
            ORDER BY receipt_id
            LIMIT $7
            "#
        );

        let receipts = sqlx::query_as::<_, Receipt>(&query)
            .bind(filter.committee_id)
            .bind(filter.trader_id)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(filter.include_cancelled)
            .bind(filter.page_token)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list receipts: {}", e))
            })?;

        timer.observe_duration();

        Ok(receipts)
    }

    /// Get the daily aggregate row for a committee/date/checkpost key.
    pub async fn get_daily_analytics(
        &self,
        committee_id: Uuid,
        analytics_date: NaiveDate,
        checkpost_id: Option<Uuid>,
    ) -> Result<Option<DailyAnalytics>, AppError> {
        sqlx::query_as::<_, DailyAnalytics>(
            r#"
            SELECT id, committee_id, checkpost_id, analytics_date,
                   total_receipts, total_value, total_weight_kg,
                   market_fees, office_fees, checkpost_fees, other_fees
            FROM daily_analytics
            WHERE committee_id = $1
              AND analytics_date = $2
              AND checkpost_id IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(committee_id)
        .bind(analytics_date)
        .bind(checkpost_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get daily analytics: {}", e))
        })
    }

    /// Get the monthly aggregate row for a committee.
    pub async fn get_committee_monthly_analytics(
        &self,
        committee_id: Uuid,
        year: i32,
        month: i32,
    ) -> Result<Option<CommitteeMonthlyAnalytics>, AppError> {
        sqlx::query_as::<_, CommitteeMonthlyAnalytics>(
            r#"
            SELECT id, committee_id, year, month,
                   total_receipts, total_value, total_weight_kg,
                   market_fees, office_fees, checkpost_fees, other_fees
            FROM committee_monthly_analytics
            WHERE committee_id = $1 AND year = $2 AND month = $3
            "#,
        )
        .bind(committee_id)
        .bind(year)
        .bind(month)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Failed to get committee monthly analytics: {}",
                e
            ))
        })
    }

    /// Get the monthly aggregate row for a trader within a committee.
    pub async fn get_trader_monthly_analytics(
        &self,
        trader_id: Uuid,
        committee_id: Uuid,
        year: i32,
        month: i32,
    ) -> Result<Option<TraderMonthlyAnalytics>, AppError> {
        sqlx::query_as::<_, TraderMonthlyAnalytics>(
            r#"
            SELECT id, trader_id, committee_id, year, month,
                   total_receipts, total_value, total_fees_paid, total_weight_kg
            FROM trader_monthly_analytics
            WHERE trader_id = $1 AND committee_id = $2 AND year = $3 AND month = $4
            "#,
        )
        .bind(trader_id)
        .bind(committee_id)
        .bind(year)
        .bind(month)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Failed to get trader monthly analytics: {}",
                e
            ))
        })
    }

    /// Get the overall aggregate row for a trader within a committee.
    pub async fn get_trader_overall_analytics(
        &self,
        trader_id: Uuid,
        committee_id: Uuid,
    ) -> Result<Option<TraderOverallAnalytics>, AppError> {
        sqlx::query_as::<_, TraderOverallAnalytics>(
            r#"
            SELECT id, trader_id, committee_id,
                   total_receipts, total_value, total_fees_paid, total_weight_kg,
                   first_transaction_date, last_transaction_date
            FROM trader_overall_analytics
            WHERE trader_id = $1 AND committee_id = $2
            "#,
        )
        .bind(trader_id)
        .bind(committee_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Failed to get trader overall analytics: {}",
                e
            ))
        })
    }

    /// Get the monthly aggregate row for a commodity within a committee.
    pub async fn get_commodity_monthly_analytics(
        &self,
        commodity_id: Uuid,
        committee_id: Uuid,
        year: i32,
        month: i32,
    ) -> Result<Option<CommodityMonthlyAnalytics>, AppError> {
        sqlx::query_as::<_, CommodityMonthlyAnalytics>(
            r#"
            SELECT id, commodity_id, committee_id, year, month,
                   total_receipts, total_value, total_fees_paid, total_weight_kg
            FROM commodity_monthly_analytics
            WHERE commodity_id = $1 AND committee_id = $2 AND year = $3 AND month = $4
            "#,
        )
        .bind(commodity_id)
        .bind(committee_id)
        .bind(year)
        .bind(month)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Failed to get commodity monthly analytics: {}",
                e
            ))
        })
    }

    /// Get the overall aggregate row for a commodity within a committee.
    pub async fn get_commodity_overall_analytics(
        &self,
        commodity_id: Uuid,
        committee_id: Uuid,
    ) -> Result<Option<CommodityOverallAnalytics>, AppError> {
        sqlx::query_as::<_, CommodityOverallAnalytics>(
            r#"
            SELECT id, commodity_id, committee_id,
                   total_receipts, total_value, total_fees_paid, total_weight_kg,
                   first_transaction_date, last_transaction_date
            FROM commodity_overall_analytics
            WHERE commodity_id = $1 AND committee_id = $2
            "#,
        )
        .bind(commodity_id)
        .bind(committee_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Failed to get commodity overall analytics: {}",
                e
            ))
        })
    }

    /// Join collected market fees against the committee-wide monthly target.
    /// Returns `None` when no target has been set for the month.
    #[instrument(skip(self), fields(committee_id = %committee_id))]
    pub async fn get_monthly_achievement(
        &self,
        committee_id: Uuid,
        year: i32,
        month: i32,
        target_type: &str,
    ) -> Result<Option<MonthlyAchievement>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_monthly_achievement"])
            .start_timer();

        let row: Option<(Decimal, Decimal)> = sqlx::query_as(
            r#"
            SELECT t.target_amount, COALESCE(a.market_fees, 0)
            FROM targets t
            LEFT JOIN committee_monthly_analytics a
              ON a.committee_id = t.committee_id
             AND a.year = t.year
             AND a.month = t.month
            WHERE t.committee_id = $1
              AND t.checkpost_id IS NULL
              AND t.year = $2
              AND t.month = $3
              AND t.target_type = $4
            "#,
        )
        .bind(committee_id)
        .bind(year)
        .bind(month)
        .bind(target_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get monthly achievement: {}", e))
        })?;

        timer.observe_duration();

        Ok(row.map(|(target_amount, collected)| {
            let achievement_pct = if target_amount > Decimal::ZERO {
                collected / target_amount * Decimal::ONE_HUNDRED
            } else {
                Decimal::ZERO
            };
            MonthlyAchievement {
                committee_id,
                year,
                month,
                target_amount,
                collected,
                achievement_pct,
            }
        }))
    }
}
