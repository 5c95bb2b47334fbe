//! Operational entrypoint: loads configuration, applies migrations, and
//! verifies database health. Transport layers live outside this crate and
//! embed [`receipts_service::services::ReceiptService`] directly.

use receipts_service::config::ReceiptsConfig;
use receipts_service::services::Database;
use service_core::error::AppError;
use service_core::observability::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = ReceiptsConfig::from_env()?;
    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    let db = Database::new(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await?;
    db.run_migrations().await?;
    db.health_check().await?;

    info!(
        service = %config.service_name,
        version = %config.service_version,
        "Receipts database ready"
    );

    Ok(())
}
