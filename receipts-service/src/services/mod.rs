//! Service layer: database access, the analytics delta engine, and the
//! receipt mutation coordinator.

pub mod aggregates;
pub mod analytics;
pub mod database;
pub mod metrics;
pub mod receipts;

pub use database::Database;
pub use receipts::ReceiptService;
