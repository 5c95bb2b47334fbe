//! Trader model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Sentinel trader name that requests creation of the trader named in
/// `new_trader_name` instead of a lookup.
pub const NEW_TRADER_SENTINEL: &str = "New";

/// Licensed trader paying fees to a committee.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trader {
    pub trader_id: Uuid,
    pub name: String,
    pub created_utc: DateTime<Utc>,
}
